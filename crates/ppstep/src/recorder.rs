//! Trace recording.
//!
//! When active, every tracker event is appended to a text file in the
//! preserved (whitespace-normalized) flavor, flushed after each record so
//! the file stays informative even if the process dies mid-session.

use crate::tokens::write_tokens_normalized;
use chrono::Local;
use ppstep_engine::Token;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Default)]
pub struct Recorder {
    file: Option<File>,
    path: Option<PathBuf>,
}

impl Recorder {
    /// Start recording to `path`, stopping any active recording first.
    /// Returns false (with no state change) if the file cannot be opened.
    pub fn start<P: AsRef<Path>>(&mut self, path: P) -> bool {
        if self.file.is_some() {
            self.stop();
        }
        let mut file = match File::create(path.as_ref()) {
            Ok(file) => file,
            Err(_) => return false,
        };
        let _ = write!(
            file,
            "=== PPSTEP TRACE ===\nStarted: {}\n===================\n\n",
            Local::now().format("%a %b %e %H:%M:%S %Y")
        );
        let _ = file.flush();
        self.file = Some(file);
        self.path = Some(path.as_ref().to_path_buf());
        true
    }

    pub fn stop(&mut self) {
        if let Some(mut file) = self.file.take() {
            let _ = write!(file, "\n=== END OF TRACE ===\n");
            let _ = file.flush();
        }
        self.path = None;
    }

    pub fn is_active(&self) -> bool {
        self.file.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn record_lexed(&mut self, token: &Token) {
        self.write_record(&format!("[LEXED] {}\n", token.text()));
    }

    pub fn record_call(&mut self, preserved_call: &[Token], preserved_args: &[Vec<Token>]) {
        let mut record = format!("[CALL] {}\n", write_tokens_normalized(preserved_call));
        for (i, arg) in preserved_args.iter().enumerate() {
            record.push_str(&format!("  ARG[{i}]: {}\n", write_tokens_normalized(arg)));
        }
        self.write_record(&record);
    }

    pub fn record_expanded(&mut self, preserved_initial: &[Token], preserved_result: &[Token]) {
        self.write_record(&format!(
            "[EXPANDED]\n  FROM: {}\n  TO:   {}\n",
            write_tokens_normalized(preserved_initial),
            write_tokens_normalized(preserved_result)
        ));
    }

    pub fn record_rescanned(
        &mut self,
        preserved_cause: &[Token],
        preserved_initial: &[Token],
        preserved_result: &[Token],
    ) {
        self.write_record(&format!(
            "[RESCANNED]\n  FROM:      {}\n  TO:        {}\n  CAUSED BY: {}\n",
            write_tokens_normalized(preserved_initial),
            write_tokens_normalized(preserved_result),
            write_tokens_normalized(preserved_cause)
        ));
    }

    // Mid-stream failures are best effort; the session must not abort over
    // a full disk.
    fn write_record(&mut self, record: &str) {
        if let Some(file) = self.file.as_mut() {
            let _ = file.write_all(record.as_bytes());
            let _ = file.flush();
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.stop();
    }
}
