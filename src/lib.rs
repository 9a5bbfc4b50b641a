//! # sshcp - SSH file copy with two-way watch mode
//!
//! The watch engine keeps a local directory and a directory on an SSH server
//! in sync by polling both sides. Each side is compared against the
//! baseline left by the last successful sync, so one-sided edits propagate
//! and edits on both sides surface as conflicts for a policy or the operator
//! to settle.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sshcp::{ConflictMode, SshConfig, SshTransport, WatchBuilder, WatchPair};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = WatchBuilder::new(WatchPair::new("./site", "/var/www"))
//!         .transport(Arc::new(SshTransport::new("web", SshConfig::default())))
//!         .on_conflict(ConflictMode::Newer)
//!         .build()
//!         .await?;
//!     session.preflight().await?;
//!     let summary = session.run().await?;
//!     println!("{} transfers", summary.transfers);
//!     Ok(())
//! }
//! ```

pub mod bookmarks;
pub mod config;
pub mod conflict;
pub mod detect;
pub mod error;
pub mod events;
pub mod exclusion;
pub mod executor;
pub mod logging;
pub mod prompt;
pub mod snapshot;
pub mod state;
pub mod transport;
pub mod types;
pub mod utils;
pub mod watch;

// Re-export commonly used types and functions
pub use config::{Config, SshConfig};
pub use conflict::{ConflictDecision, ConflictMode, ConflictPrompt, PromptChoice, Resolution};
pub use error::{ActionError, ConfigError, SnapshotError, StateError, WatchError};
pub use events::{WatchEvent, WatchEventSink};
pub use transport::{LocalTransport, SshTransport, Transport};
pub use types::{Entry, EntryState, Snapshot, WatchPair};
pub use utils::Shutdown;
pub use watch::{CycleOutcome, WatchBuilder, WatchSession};

// vim: ts=4
