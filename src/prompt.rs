//! Interactive conflict prompt on the controlling terminal

use async_trait::async_trait;
use std::io::{BufRead, Write};

use crate::conflict::{ConflictInfo, ConflictPrompt, Newer, PromptChoice};
use crate::events::format_size;
use crate::types::Entry;
use crate::utils::{Shutdown, TerminalGuard};

const KEYS_HINT: &str = "[l] keep local  [r] keep remote  [s] skip  [a] abort  [q] quit";

/// Asks the operator with single keypresses
///
/// Falls back to line input when stdin is not a terminal. End of input
/// answers skip. A shutdown while waiting answers quit.
pub struct TerminalPrompt {
	shutdown: Shutdown,
}

impl TerminalPrompt {
	pub fn new(shutdown: Shutdown) -> Self {
		TerminalPrompt { shutdown }
	}
}

#[async_trait]
impl ConflictPrompt for TerminalPrompt {
	async fn ask(&self, conflict: &ConflictInfo) -> PromptChoice {
		if self.shutdown.is_triggered() {
			return PromptChoice::Quit;
		}

		let text = render_conflict(conflict);
		{
			let mut out = std::io::stdout().lock();
			let _ = write!(out, "{}", text);
			let _ = out.flush();
		}

		let reader = tokio::task::spawn_blocking(read_choice);
		tokio::select! {
			choice = reader => choice.unwrap_or(PromptChoice::Skip),
			_ = self.shutdown.wait() => PromptChoice::Quit,
		}
	}
}

fn describe_side(entry: &Option<Entry>, newer: bool) -> String {
	match entry {
		Some(e) => {
			let when = chrono::DateTime::from_timestamp(e.mtime, 0)
				.map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S").to_string())
				.unwrap_or_else(|| e.mtime.to_string());
			format!("{}, {}{}", when, format_size(e.size), if newer { " (newer)" } else { "" })
		}
		None => "deleted".to_string(),
	}
}

/// Text shown before waiting for a key
pub fn render_conflict(conflict: &ConflictInfo) -> String {
	let newer = conflict.newer();
	format!(
		"  Conflict: {}\n    local : {}\n    remote: {}\n  {} ",
		conflict.path,
		describe_side(&conflict.local, newer == Newer::Local),
		describe_side(&conflict.remote, newer == Newer::Remote),
		KEYS_HINT
	)
}

fn choice_for_key(key: u8) -> Option<PromptChoice> {
	match key.to_ascii_lowercase() {
		b'l' => Some(PromptChoice::KeepLocal),
		b'r' => Some(PromptChoice::KeepRemote),
		b's' => Some(PromptChoice::Skip),
		b'a' => Some(PromptChoice::Abort),
		b'q' | 3 => Some(PromptChoice::Quit), // 3 = Ctrl+C
		_ => None,
	}
}

/// Parse a typed answer: a key letter or the full word
pub fn parse_answer(answer: &str) -> Option<PromptChoice> {
	match answer.trim().to_lowercase().as_str() {
		"local" => Some(PromptChoice::KeepLocal),
		"remote" => Some(PromptChoice::KeepRemote),
		"skip" => Some(PromptChoice::Skip),
		"abort" => Some(PromptChoice::Abort),
		"quit" => Some(PromptChoice::Quit),
		s if s.len() == 1 => choice_for_key(s.as_bytes()[0]),
		_ => None,
	}
}

fn read_choice() -> PromptChoice {
	let choice = match TerminalGuard::new() {
		Some(guard) => loop {
			match guard.read_key() {
				None => break PromptChoice::Skip,
				Some(key) => {
					if let Some(choice) = choice_for_key(key) {
						break choice;
					}
				}
			}
		},
		None => read_line_choice(),
	};
	println!();
	choice
}

fn read_line_choice() -> PromptChoice {
	let stdin = std::io::stdin();
	let mut line = String::new();
	loop {
		line.clear();
		match stdin.lock().read_line(&mut line) {
			Ok(0) | Err(_) => return PromptChoice::Skip,
			Ok(_) => {
				if let Some(choice) = parse_answer(&line) {
					return choice;
				}
				print!("  {} ", KEYS_HINT);
				let _ = std::io::stdout().flush();
			}
		}
	}
}


// vim: ts=4
