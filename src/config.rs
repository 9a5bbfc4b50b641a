//! Configuration for watch mode
//!
//! The configuration follows a priority chain:
//! 1. Built-in defaults (Config::default())
//! 2. Shared config file (~/.config/sshcp/config.json, also holds the selected server)
//! 3. Environment variables (SSHCP_* prefix)
//! 4. CLI flags (highest priority, applied by the binary)

use crate::conflict::ConflictMode;
use crate::error::ConfigError;
use crate::exclusion::PatternMatcher;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Directory holding sshcp's shared files (~/.config/sshcp)
pub fn config_dir() -> PathBuf {
	std::env::var("HOME")
		.ok()
		.map(|h| PathBuf::from(h).join(".config").join("sshcp"))
		.unwrap_or_else(|| PathBuf::from(".sshcp"))
}

// ============================================================================
// MAIN CONFIGURATION STRUCT
// ============================================================================

/// Watch-mode configuration
///
/// Keys are snake_case because the file is shared with the server picker,
/// which writes `selected_host`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	/// Server chosen with `sshcp set`
	pub selected_host: Option<String>,

	/// Seconds between polling cycles
	pub interval_secs: f64,

	/// Conflict policy
	pub on_conflict: ConflictMode,

	/// Glob patterns to exclude from both sides (e.g., "*.tmp", "node_modules")
	pub exclude_patterns: Vec<String>,

	/// Number of concurrent per-path transfers
	pub parallel_transfers: usize,

	/// Compare content digests before reporting a same-size conflict
	pub verify_content: bool,

	/// Where baselines are kept
	pub state_dir: PathBuf,

	/// Default log filter when RUST_LOG is unset
	pub log_level: String,

	/// SSH-specific configuration
	pub ssh: SshConfig,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			selected_host: None,
			interval_secs: 5.0,
			on_conflict: ConflictMode::Ask,
			exclude_patterns: vec![],
			parallel_transfers: 4,
			verify_content: true,
			state_dir: config_dir().join("watch"),
			log_level: "warn".to_string(),
			ssh: SshConfig::default(),
		}
	}
}

/// SSH/Remote connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
	/// Custom SSH command (overrides default "ssh")
	pub ssh_command: Option<String>,

	/// Custom port (if not set in ~/.ssh/config)
	pub port: Option<u16>,

	/// Connection timeout in seconds, passed to ssh as ConnectTimeout
	pub connection_timeout: u64,

	/// Upper bound for listing and other short remote commands, in seconds
	pub command_timeout: u64,

	/// Extra arguments placed before the host
	pub extra_args: Vec<String>,
}

impl Default for SshConfig {
	fn default() -> Self {
		SshConfig {
			ssh_command: None,
			port: None,
			connection_timeout: 30,
			command_timeout: 120,
			extra_args: vec![],
		}
	}
}

impl Config {
	/// Defaults, overlaid with the shared config file and the environment
	pub fn load() -> Result<Config, ConfigError> {
		let mut config = Config::load_from(&config_dir().join("config.json"))?;
		config.apply_env(|key| std::env::var(key).ok())?;
		Ok(config)
	}

	/// Read a config file; a missing file yields the defaults
	pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
		let contents = match std::fs::read_to_string(path) {
			Ok(c) => c,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
			Err(e) => {
				return Err(ConfigError::Io { path: path.display().to_string(), source: e })
			}
		};

		serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
			path: path.display().to_string(),
			message: e.to_string(),
		})
	}

	/// Overlay SSHCP_* variables; `lookup` abstracts the environment for tests
	pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
		if let Some(v) = lookup("SSHCP_INTERVAL") {
			self.interval_secs = parse_interval(&v)?;
		}
		if let Some(v) = lookup("SSHCP_ON_CONFLICT") {
			self.on_conflict = ConflictMode::from_str(&v)?;
		}
		if let Some(v) = lookup("SSHCP_HOST") {
			if !v.is_empty() {
				self.selected_host = Some(v);
			}
		}
		if let Some(v) = lookup("SSHCP_STATE_DIR") {
			self.state_dir = PathBuf::from(v);
		}
		Ok(())
	}

	/// Reject values the watch loop cannot run with
	pub fn validate(&self) -> Result<(), ConfigError> {
		if !self.interval_secs.is_finite() || self.interval_secs <= 0.0 {
			return Err(ConfigError::InvalidInterval { value: self.interval_secs.to_string() });
		}
		if self.parallel_transfers == 0 || self.parallel_transfers > 64 {
			return Err(ConfigError::InvalidParallelism { value: self.parallel_transfers });
		}
		PatternMatcher::new(&self.exclude_patterns)?;
		Ok(())
	}

	pub fn interval(&self) -> Duration {
		Duration::from_secs_f64(self.interval_secs)
	}
}

/// Parse an interval given in (possibly fractional) seconds
pub fn parse_interval(value: &str) -> Result<f64, ConfigError> {
	match value.trim().parse::<f64>() {
		Ok(v) if v.is_finite() && v > 0.0 => Ok(v),
		_ => Err(ConfigError::InvalidInterval { value: value.to_string() }),
	}
}


// vim: ts=4
