//! ppstep: an interactive stepping debugger for the C preprocessor.
//!
//! The debugger sits on the hook contract of [`ppstep_engine`] and maintains
//! a synchronized view of the evolving token stream: which macro was invoked,
//! what it rewrote to, what rescans followed, and where the emitted prefix
//! ends. A user drives it with `gdb`-style commands from a terminal prompt.
//!
//! The interesting machinery is in [`tracker`]: a match-and-splice algorithm
//! over reported token sequences, a stack of pending expansion frames, and
//! the separation of settled output from still-rescanning text. The other
//! modules are the collaborators around it: the [`session`] adapter that
//! feeds the tracker from engine hooks, the [`stepper`] that decides when to
//! pause, the [`repl`] prompt, and the [`recorder`] trace writer.

pub mod command;
pub mod debug;
pub mod event;
pub mod recorder;
pub mod repl;
pub mod session;
pub mod stepper;
pub mod tokens;
pub mod tracker;

pub use repl::Signal;
pub use session::{Session, SessionOptions};
pub use stepper::Mode;
