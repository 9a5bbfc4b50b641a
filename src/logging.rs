//! Logging prelude module for convenient access to tracing macros.
//!
//! Diagnostics go to stderr through tracing; the watch event lines on stdout
//! come from the event sink instead.
//!
//! ```ignore
//! use crate::logging::*;
//!
//! info!("Preflight ok");
//! warn!("Baseline compaction failed");
//! ```

pub use tracing::{debug, error, info, warn};

/// Initialize the tracing subscriber with environment filter support.
///
/// `default_level` applies when `RUST_LOG` is unset:
///
/// ```bash
/// RUST_LOG=debug sshcp watch ./site /var/www
/// RUST_LOG=sshcp::transport=debug sshcp watch ./site web:/var/www
/// ```
pub fn init_tracing(default_level: &str) {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
		)
		.with_writer(std::io::stderr)
		.init();
}

// vim: ts=4
