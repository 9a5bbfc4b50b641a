//! Watch events and the sinks that observe them
//!
//! The loop reports what it does through a [`WatchEventSink`]. The console
//! sink prints timestamped lines; tests and embedders can pass a closure.

use std::io::Write;

use crate::conflict::{ConflictDecision, Provenance, Resolution};
use crate::detect::ChangeOp;
use crate::types::Entry;

/// Where a watch cycle currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchPhase {
	Idle,
	Polling,
	Diffing,
	Resolving,
	Applying,
}

impl std::fmt::Display for WatchPhase {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			WatchPhase::Idle => write!(f, "idle"),
			WatchPhase::Polling => write!(f, "polling"),
			WatchPhase::Diffing => write!(f, "diffing"),
			WatchPhase::Resolving => write!(f, "resolving"),
			WatchPhase::Applying => write!(f, "applying"),
		}
	}
}

/// Counters for one finished cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
	pub cycle: u64,
	pub uploaded: usize,
	pub downloaded: usize,
	pub deleted_remote: usize,
	pub deleted_local: usize,
	pub converged: usize,
	pub conflicts: usize,
	pub skipped: usize,
	pub failed: usize,
	pub cancelled: usize,
}

impl CycleStats {
	/// Transfers and deletions that actually touched a side
	pub fn transfers(&self) -> usize {
		self.uploaded + self.downloaded + self.deleted_remote + self.deleted_local
	}

	pub fn is_quiet(&self) -> bool {
		self.transfers() == 0 && self.conflicts == 0 && self.failed == 0
	}
}

#[derive(Debug, Clone)]
pub enum WatchEvent {
	PhaseChanged(WatchPhase),

	/// Local version copied to the remote side
	Uploaded { path: String, op: ChangeOp },

	/// Remote version copied to the local side
	Downloaded { path: String, op: ChangeOp },

	DeletedRemote { path: String },
	DeletedLocal { path: String },

	/// Both sides already agree; only the baseline moved
	Converged { path: String },

	Conflict { path: String, local: Option<Entry>, remote: Option<Entry> },
	Resolved { path: String, decision: ConflictDecision },

	/// Operator aborted or quit with conflicts still undecided
	ResolutionStopped { remaining: usize, quit: bool },

	/// A single action failed; the path is retried next cycle
	Failed { path: String, message: String },

	/// A side could not be enumerated; the cycle was abandoned
	ListingFailed { message: String },

	CycleFinished(CycleStats),
	Stopping,
}

/// Observer for watch events
pub trait WatchEventSink: Send + Sync {
	fn on_event(&self, event: &WatchEvent);
}

impl<F> WatchEventSink for F
where
	F: Fn(&WatchEvent) + Send + Sync,
{
	fn on_event(&self, event: &WatchEvent) {
		self(event)
	}
}

impl std::fmt::Display for Resolution {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Resolution::KeepLocal => write!(f, "keeping local"),
			Resolution::KeepRemote => write!(f, "keeping remote"),
			Resolution::Skip => write!(f, "skipped"),
		}
	}
}

/// Render an event as a console line, without the timestamp
///
/// Events that only matter to the log return None.
pub fn format_event(event: &WatchEvent) -> Option<String> {
	let line = match event {
		WatchEvent::Uploaded { path, op: ChangeOp::Added } => format!("→ Added: {}", path),
		WatchEvent::Uploaded { path, op: ChangeOp::Modified } => format!("→ Updated: {}", path),
		WatchEvent::Downloaded { path, .. } => format!("← Downloaded: {}", path),
		WatchEvent::DeletedRemote { path } => format!("→ Deleted: {}", path),
		WatchEvent::DeletedLocal { path } => format!("← Deleted: {}", path),
		WatchEvent::Conflict { path, .. } => format!("⚠ CONFLICT: {}", path),
		WatchEvent::Resolved { decision, .. } => {
			let by = match decision.provenance {
				Provenance::Policy(mode) => format!("policy: {}", mode),
				Provenance::Operator => "operator".to_string(),
			};
			match decision.resolution {
				Resolution::Skip => format!("  ↳ skipped ({}), will be detected again", by),
				r => format!("  ↳ {} ({})", r, by),
			}
		}
		WatchEvent::ResolutionStopped { quit: true, .. } => "  ↳ quitting".to_string(),
		WatchEvent::ResolutionStopped { remaining, quit: false } => {
			format!("  ↳ aborted, {} conflict(s) left for the next cycle", remaining)
		}
		WatchEvent::Failed { path, message } => format!("✗ Failed: {} ({})", path, message),
		WatchEvent::ListingFailed { message } => format!("✗ Listing failed: {}", message),
		WatchEvent::Stopping => "Stopping watch...".to_string(),
		WatchEvent::PhaseChanged(_) | WatchEvent::Converged { .. } | WatchEvent::CycleFinished(_) => {
			return None
		}
	};
	Some(line)
}

/// Prints events to stdout as `HH:MM:SS <line>`
pub struct ConsoleEvents;

impl WatchEventSink for ConsoleEvents {
	fn on_event(&self, event: &WatchEvent) {
		if let Some(line) = format_event(event) {
			let now = chrono::Local::now().format("%H:%M:%S");
			let mut out = std::io::stdout().lock();
			let _ = writeln!(out, "{} {}", now, line);
			let _ = out.flush();
		}
	}
}

/// Human-readable byte count
pub fn format_size(bytes: u64) -> String {
	const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
	if bytes < 1024 {
		return format!("{} B", bytes);
	}
	let exp = (((bytes as f64).ln() / 1024f64.ln()).floor() as usize).min(UNITS.len() - 1);
	format!("{:.1} {}", bytes as f64 / 1024f64.powi(exp as i32), UNITS[exp])
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::conflict::ConflictMode;
	use std::sync::atomic::{AtomicUsize, Ordering};

	#[test]
	fn test_transfer_lines() {
		let p = || "dir/a.txt".to_string();
		let up = |op| WatchEvent::Uploaded { path: p(), op };
		assert_eq!(format_event(&up(ChangeOp::Added)).unwrap(), "→ Added: dir/a.txt");
		assert_eq!(format_event(&up(ChangeOp::Modified)).unwrap(), "→ Updated: dir/a.txt");
		let down = WatchEvent::Downloaded { path: p(), op: ChangeOp::Added };
		assert_eq!(format_event(&down).unwrap(), "← Downloaded: dir/a.txt");
		assert_eq!(format_event(&WatchEvent::DeletedRemote { path: p() }).unwrap(), "→ Deleted: dir/a.txt");
		assert_eq!(format_event(&WatchEvent::DeletedLocal { path: p() }).unwrap(), "← Deleted: dir/a.txt");
	}

	#[test]
	fn test_conflict_lines() {
		let conflict = WatchEvent::Conflict { path: "b.txt".to_string(), local: None, remote: None };
		assert_eq!(format_event(&conflict).unwrap(), "⚠ CONFLICT: b.txt");

		let resolved = WatchEvent::Resolved {
			path: "b.txt".to_string(),
			decision: ConflictDecision {
				resolution: Resolution::KeepRemote,
				provenance: Provenance::Policy(ConflictMode::Newer),
			},
		};
		assert_eq!(format_event(&resolved).unwrap(), "  ↳ keeping remote (policy: newer)");
	}

	#[test]
	fn test_quiet_events() {
		assert!(format_event(&WatchEvent::PhaseChanged(WatchPhase::Polling)).is_none());
		assert!(format_event(&WatchEvent::CycleFinished(CycleStats::default())).is_none());
	}

	#[test]
	fn test_closure_sink() {
		let count = AtomicUsize::new(0);
		let sink = |_: &WatchEvent| {
			count.fetch_add(1, Ordering::SeqCst);
		};
		sink.on_event(&WatchEvent::Stopping);
		sink.on_event(&WatchEvent::Stopping);
		assert_eq!(count.load(Ordering::SeqCst), 2);
	}

	#[test]
	fn test_format_size() {
		assert_eq!(format_size(512), "512 B");
		assert_eq!(format_size(2048), "2.0 KiB");
		assert_eq!(format_size(5 * 1024 * 1024), "5.0 MiB");
	}

	#[test]
	fn test_stats() {
		let stats = CycleStats { uploaded: 1, deleted_local: 2, ..Default::default() };
		assert_eq!(stats.transfers(), 3);
		assert!(!stats.is_quiet());
		assert!(CycleStats::default().is_quiet());
	}
}

// vim: ts=4
