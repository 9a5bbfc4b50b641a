//! Conflict policies and decisions
//!
//! A conflict is a path changed on both sides since the baseline with
//! different results. The configured [`ConflictMode`] turns each one into a
//! [`ConflictDecision`], asking the operator through a [`ConflictPrompt`]
//! in `ask` mode.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ConfigError;
use crate::types::Entry;

pub mod resolver;

pub use resolver::{ConflictResolver, ResolveOutcome, ResolveStop};

/// Conflict policy, chosen with `--on-conflict`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictMode {
	/// Prompt the operator for each conflict
	#[default]
	Ask,

	/// Always keep the local version
	Local,

	/// Always keep the remote version
	Remote,

	/// Keep the version with the later modification time
	Newer,

	/// Leave both sides alone; the conflict comes back next cycle
	Skip,
}

impl FromStr for ConflictMode {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_lowercase().as_str() {
			"ask" => Ok(Self::Ask),
			"local" => Ok(Self::Local),
			"remote" => Ok(Self::Remote),
			"newer" => Ok(Self::Newer),
			"skip" => Ok(Self::Skip),
			_ => Err(ConfigError::InvalidMode { value: s.to_string() }),
		}
	}
}

impl std::fmt::Display for ConflictMode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Ask => write!(f, "ask"),
			Self::Local => write!(f, "local"),
			Self::Remote => write!(f, "remote"),
			Self::Newer => write!(f, "newer"),
			Self::Skip => write!(f, "skip"),
		}
	}
}

impl ConflictMode {
	/// Whether the mode decides without operator input
	pub fn is_automatic(&self) -> bool {
		!matches!(self, ConflictMode::Ask)
	}

	pub fn description(&self) -> &'static str {
		match self {
			Self::Ask => "Prompt for each conflict",
			Self::Local => "Always keep local version",
			Self::Remote => "Always keep remote version",
			Self::Newer => "Keep the newer version (by timestamp)",
			Self::Skip => "Skip conflicting files",
		}
	}
}

/// Which side wins a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
	KeepLocal,
	KeepRemote,
	Skip,
}

/// Who made the decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
	Policy(ConflictMode),
	Operator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictDecision {
	pub resolution: Resolution,
	pub provenance: Provenance,
}

/// The two competing versions of a path
///
/// A missing side means that side deleted the file while the other side
/// modified it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictInfo {
	pub path: String,
	pub local: Option<Entry>,
	pub remote: Option<Entry>,
}

/// Which side holds the later version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Newer {
	Local,
	Remote,
	Same,
}

impl ConflictInfo {
	/// Compare modification times; a deleted side is older than any existing version
	pub fn newer(&self) -> Newer {
		match (&self.local, &self.remote) {
			(Some(l), Some(r)) if l.mtime > r.mtime => Newer::Local,
			(Some(l), Some(r)) if r.mtime > l.mtime => Newer::Remote,
			(Some(_), None) => Newer::Local,
			(None, Some(_)) => Newer::Remote,
			_ => Newer::Same,
		}
	}
}

/// Operator answer to a conflict prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptChoice {
	KeepLocal,
	KeepRemote,
	Skip,

	/// Stop resolving for this cycle; the watch continues
	Abort,

	/// Stop the whole watch
	Quit,
}

/// Interactive arbitration channel
///
/// `ask` blocks until the operator answers. Implementations must return
/// `Quit` when the watch is being shut down while waiting.
#[async_trait]
pub trait ConflictPrompt: Send + Sync {
	async fn ask(&self, conflict: &ConflictInfo) -> PromptChoice;
}

/// Prompt for automatic modes; never consulted, answers skip if it is
pub struct NoPrompt;

#[async_trait]
impl ConflictPrompt for NoPrompt {
	async fn ask(&self, _conflict: &ConflictInfo) -> PromptChoice {
		PromptChoice::Skip
	}
}


// vim: ts=4
