//! Exclusion system
//!
//! Glob-based exclusion applied identically to local walks and remote listings,
//! so both snapshots agree on which paths are under watch.

mod patterns;

pub use patterns::{PatternMatcher, TEMP_SUFFIX};

/// Errors that can occur while compiling exclusion patterns
#[derive(Debug)]
pub enum ExclusionError {
	/// Failed to parse a glob pattern
	InvalidPattern { pattern: String, message: String },
}

impl std::fmt::Display for ExclusionError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ExclusionError::InvalidPattern { pattern, message } => {
				write!(f, "Invalid exclusion pattern '{}': {}", pattern, message)
			}
		}
	}
}

impl std::error::Error for ExclusionError {}

impl From<ExclusionError> for crate::error::ConfigError {
	fn from(e: ExclusionError) -> Self {
		match e {
			ExclusionError::InvalidPattern { pattern, message } => {
				crate::error::ConfigError::InvalidPattern { pattern, message }
			}
		}
	}
}

// vim: ts=4
