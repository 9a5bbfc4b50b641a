//! Process-level helpers: shutdown signalling and terminal modes

pub mod signal;
pub mod terminal;

pub use signal::{listen_for_signals, Shutdown};
pub use terminal::{restore_terminal_state, TerminalGuard};

// vim: ts=4
