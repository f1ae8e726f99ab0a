use clap::Parser;
use ppstep::debug::DebugHooks;
use ppstep::{Mode, Session, SessionOptions, Signal};
use ppstep_engine::Preprocessor;
use std::fs;
use std::path::PathBuf;

/// Interactive stepping debugger for the C preprocessor
#[derive(Parser)]
#[command(name = "ppstep")]
struct Opts {
    /// Input file
    input_file: PathBuf,

    /// Include path
    #[arg(short = 'I', long = "include")]
    include: Vec<PathBuf>,

    /// Specify a macro to define (as macro[=[value]])
    #[arg(short = 'D', long = "define")]
    define: Vec<String>,

    /// Specify a macro to undefine
    #[arg(short = 'U', long = "undefine")]
    undefine: Vec<String>,

    /// Print one line per preprocessor hook instead of running the
    /// interactive debugger
    #[arg(long)]
    debug: bool,
}

fn main() {
    let opts = match Opts::try_parse() {
        Ok(opts) => opts,
        Err(err) => {
            let _ = err.print();
            std::process::exit(if err.use_stderr() { 1 } else { 0 });
        }
    };
    if let Err(err) = run(&opts) {
        if err.downcast_ref::<Signal>() == Some(&Signal::Quit) {
            return;
        }
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run(opts: &Opts) -> anyhow::Result<()> {
    let file_name = opts.input_file.to_string_lossy().into_owned();
    let source = fs::read_to_string(&opts.input_file)?;
    let mut pp = Preprocessor::new(&file_name, &source);

    for path in &opts.include {
        pp.add_include_path(path.clone());
    }
    for spec in &opts.define {
        pp.define_cli(spec)?;
    }
    for name in &opts.undefine {
        pp.undefine(name);
    }

    if opts.debug {
        let mut hooks = DebugHooks;
        pp.run(&mut hooks)
    } else {
        let mut session = Session::new(SessionOptions {
            prefix: String::new(),
            initial_mode: Mode::Free,
            record_to: None,
        });
        pp.run(&mut session)
    }
}
