//! conncred TUI - interactive terminal prompter
//!
//! [`TerminalPrompter`] implements [`conncred_core::Prompter`] on stdin/stdout:
//! text questions go through rustyline, passwords are read in raw mode
//! without echo.

pub mod prompter;

pub use prompter::TerminalPrompter;
