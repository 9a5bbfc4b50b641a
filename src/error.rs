//! Error types for watch-mode operations

use std::error::Error;
use std::fmt;
use std::io;

/// Top-level error for a watch session
#[derive(Debug)]
pub enum WatchError {
	/// Setup failed before the loop started (remote unreachable, local root unusable)
	Setup { message: String },

	/// Snapshot error (nested)
	Snapshot(SnapshotError),

	/// Action error (nested)
	Action(ActionError),

	/// State error (nested)
	State(StateError),

	/// Configuration error (nested)
	Config(ConfigError),

	/// I/O error
	Io(io::Error),
}

impl fmt::Display for WatchError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			WatchError::Setup { message } => write!(f, "Watch setup failed: {}", message),
			WatchError::Snapshot(e) => write!(f, "Snapshot error: {}", e),
			WatchError::Action(e) => write!(f, "Action error: {}", e),
			WatchError::State(e) => write!(f, "State error: {}", e),
			WatchError::Config(e) => write!(f, "Configuration error: {}", e),
			WatchError::Io(e) => write!(f, "I/O error: {}", e),
		}
	}
}

impl Error for WatchError {}

impl From<io::Error> for WatchError {
	fn from(e: io::Error) -> Self {
		WatchError::Io(e)
	}
}

impl From<SnapshotError> for WatchError {
	fn from(e: SnapshotError) -> Self {
		WatchError::Snapshot(e)
	}
}

impl From<ActionError> for WatchError {
	fn from(e: ActionError) -> Self {
		WatchError::Action(e)
	}
}

impl From<StateError> for WatchError {
	fn from(e: StateError) -> Self {
		WatchError::State(e)
	}
}

impl From<ConfigError> for WatchError {
	fn from(e: ConfigError) -> Self {
		WatchError::Config(e)
	}
}

/// Failures while enumerating one side of the pair
#[derive(Debug)]
pub enum SnapshotError {
	/// Local root does not exist
	RootMissing { path: String },

	/// Local walk failed
	LocalScan { path: String, source: io::Error },

	/// Remote listing command failed (connection lost, path not found)
	RemoteList { host: String, message: String },

	/// Listing did not finish in time
	Timeout { what: String },
}

impl fmt::Display for SnapshotError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SnapshotError::RootMissing { path } => write!(f, "Root does not exist: {}", path),
			SnapshotError::LocalScan { path, source } => {
				write!(f, "Cannot scan {}: {}", path, source)
			}
			SnapshotError::RemoteList { host, message } => {
				write!(f, "Remote listing on {} failed: {}", host, message)
			}
			SnapshotError::Timeout { what } => write!(f, "Listing timed out: {}", what),
		}
	}
}

impl Error for SnapshotError {}

/// Failure of a single copy/delete action
#[derive(Debug)]
pub enum ActionError {
	/// Local I/O failed
	Io { path: String, source: io::Error },

	/// Remote command exited unsuccessfully
	Remote { path: String, message: String },

	/// Could not start the transport subprocess
	Spawn { cmd: String, source: io::Error },

	/// Transfer did not finish in time
	Timeout { path: String },
}

impl fmt::Display for ActionError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ActionError::Io { path, source } => write!(f, "{}: {}", path, source),
			ActionError::Remote { path, message } => write!(f, "{}: remote: {}", path, message),
			ActionError::Spawn { cmd, source } => {
				write!(f, "Failed to spawn '{}': {}", cmd, source)
			}
			ActionError::Timeout { path } => write!(f, "{}: transfer timed out", path),
		}
	}
}

impl Error for ActionError {}

/// Baseline persistence errors
#[derive(Debug)]
pub enum StateError {
	/// Failed to read the state file
	LoadFailed { source: io::Error },

	/// Failed to write the state file or journal
	SaveFailed { source: Box<dyn Error + Send + Sync> },

	/// State file could not be parsed
	Corrupted { message: String },

	/// State file belongs to a different local/remote pair
	RootMismatch { expected: String, found: String },
}

impl fmt::Display for StateError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			StateError::LoadFailed { source } => write!(f, "Failed to load state: {}", source),
			StateError::SaveFailed { source } => write!(f, "Failed to save state: {}", source),
			StateError::Corrupted { message } => write!(f, "State corrupted: {}", message),
			StateError::RootMismatch { expected, found } => {
				write!(f, "State belongs to {}, expected {}", found, expected)
			}
		}
	}
}

impl Error for StateError {}

/// Invalid configuration, fatal at startup
#[derive(Debug)]
pub enum ConfigError {
	/// Interval is not a positive finite number of seconds
	InvalidInterval { value: String },

	/// Unknown conflict mode
	InvalidMode { value: String },

	/// Parallelism out of range
	InvalidParallelism { value: usize },

	/// Exclude pattern does not compile
	InvalidPattern { pattern: String, message: String },

	/// No host given and none selected
	NoServerSelected,

	/// Config file could not be parsed
	Parse { path: String, message: String },

	/// Config file could not be read
	Io { path: String, source: io::Error },
}

impl fmt::Display for ConfigError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConfigError::InvalidInterval { value } => {
				write!(f, "Invalid interval '{}': must be a positive number of seconds", value)
			}
			ConfigError::InvalidMode { value } => write!(
				f,
				"Invalid conflict mode: {}. Valid modes: ask, local, remote, newer, skip",
				value
			),
			ConfigError::InvalidParallelism { value } => {
				write!(f, "Invalid parallelism {}: must be between 1 and 64", value)
			}
			ConfigError::InvalidPattern { pattern, message } => {
				write!(f, "Invalid exclude pattern '{}': {}", pattern, message)
			}
			ConfigError::NoServerSelected => {
				write!(f, "No server selected. Run 'sshcp set' first or pass --host")
			}
			ConfigError::Parse { path, message } => write!(f, "Cannot parse {}: {}", path, message),
			ConfigError::Io { path, source } => write!(f, "Cannot read {}: {}", path, source),
		}
	}
}

impl Error for ConfigError {}


// vim: ts=4
