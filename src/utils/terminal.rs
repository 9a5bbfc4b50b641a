//! Terminal mode management for single-key prompts

use std::io::{Read, Write};
use termios::{tcsetattr, Termios, ECHO, ICANON, TCSANOW};

/// RAII guard for raw terminal input mode
/// Disables line buffering (ICANON) and character echo (ECHO)
/// Restores the saved settings on drop
pub struct TerminalGuard {
	fd: i32,
	original: Termios,
}

impl TerminalGuard {
	/// Enable raw terminal mode on stdin
	/// Returns None if not connected to a terminal
	pub fn new() -> Option<Self> {
		let fd = 0; // stdin
		let original = match Termios::from_fd(fd) {
			Ok(term) => term,
			Err(_) => return None, // Not a terminal
		};
		let mut raw = original;
		raw.c_lflag &= !(ICANON | ECHO);
		if tcsetattr(fd, TCSANOW, &raw).is_err() {
			return None;
		}
		Some(TerminalGuard { fd, original })
	}

	/// Block until one byte arrives on stdin; None on EOF or error
	pub fn read_key(&self) -> Option<u8> {
		let mut buf = [0u8; 1];
		match std::io::stdin().lock().read(&mut buf) {
			Ok(1) => Some(buf[0]),
			_ => None,
		}
	}
}

impl Drop for TerminalGuard {
	fn drop(&mut self) {
		let _ = tcsetattr(self.fd, TCSANOW, &self.original);
	}
}

/// Restore terminal to normal state
/// Called before exiting on quit or on a second signal
pub fn restore_terminal_state() {
	let _ = std::io::stdout().flush();
	let _ = std::io::stderr().flush();

	if let Ok(term) = Termios::from_fd(0) {
		// Reset flags to normal values (line buffering + echo)
		let mut normal_termios = term;
		normal_termios.c_lflag |= ICANON | ECHO;
		let _ = tcsetattr(0, TCSANOW, &normal_termios);
	}

	// Show cursor if it's hidden (ANSI escape sequence)
	let _ = write!(std::io::stdout(), "\x1B[?25h");
	let _ = std::io::stdout().flush();
}


// vim: ts=4
