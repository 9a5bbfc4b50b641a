//! File transfer capabilities used by the watch loop
//!
//! The engine never talks to SSH directly. It lists, copies, deletes and
//! fingerprints files through [`Transport`], which the SSH client and the
//! local-mirror implementation both provide.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{ActionError, SnapshotError};
use crate::exclusion::{PatternMatcher, TEMP_SUFFIX};
use crate::snapshot;
use crate::types::Entry;

mod local;
mod ssh;

pub use local::LocalTransport;
pub use ssh::SshTransport;

/// Operations the watch loop needs on both sides of a pair
///
/// Remote paths are absolute or home-relative path strings on the remote
/// side; local paths are filesystem paths. Copies land under a temporary
/// name and are renamed into place with the source entry's mtime.
#[async_trait]
pub trait Transport: Send + Sync {
	/// Short label for logs and errors (usually the host)
	fn describe(&self) -> String;

	/// Enumerate files under a remote root, minus exclusions
	async fn list_remote(
		&self,
		root: &str,
		matcher: Arc<PatternMatcher>,
	) -> Result<Vec<Entry>, SnapshotError>;

	async fn copy_to_remote(&self, local: &Path, remote: &str, entry: &Entry) -> Result<(), ActionError>;

	async fn copy_to_local(&self, remote: &str, local: &Path, entry: &Entry) -> Result<(), ActionError>;

	/// Remove a remote file; a missing file is not an error
	async fn delete_remote(&self, remote: &str) -> Result<(), ActionError>;

	/// Hex SHA-256 of a remote file
	async fn remote_digest(&self, remote: &str) -> Result<String, ActionError>;

	async fn list_local(
		&self,
		root: &Path,
		matcher: Arc<PatternMatcher>,
	) -> Result<Vec<Entry>, SnapshotError> {
		snapshot::list_local_tree(root, matcher).await
	}

	/// Remove a local file; a missing file is not an error
	async fn delete_local(&self, local: &Path) -> Result<(), ActionError> {
		remove_file_idempotent(local).await
	}

	/// Hex SHA-256 of a local file
	async fn local_digest(&self, local: &Path) -> Result<String, ActionError> {
		let path = local.to_path_buf();
		tokio::task::spawn_blocking(move || file_digest(&path))
			.await
			.map_err(|e| ActionError::Io {
				path: local.display().to_string(),
				source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
			})?
	}
}

/// Split `host:path` into its parts
///
/// Paths starting with `/`, `.` or `~` are never treated as remote, so a
/// local path containing a colon stays local.
pub fn split_host(location: &str) -> Option<(String, String)> {
	if location.starts_with('/') || location.starts_with('.') || location.starts_with('~') {
		return None;
	}
	let colon = location.find(':')?;
	let host = &location[..colon];
	if host.is_empty() {
		return None;
	}
	Some((host.to_string(), location[colon + 1..].to_string()))
}

/// Stream a file through SHA-256
pub fn file_digest(path: &Path) -> Result<String, ActionError> {
	let io_err = |e| ActionError::Io { path: path.display().to_string(), source: e };
	let mut file = std::fs::File::open(path).map_err(io_err)?;
	let mut hasher = Sha256::new();
	let mut buf = [0u8; 64 * 1024];
	loop {
		let n = file.read(&mut buf).map_err(io_err)?;
		if n == 0 {
			break;
		}
		hasher.update(&buf[..n]);
	}
	Ok(hex::encode(hasher.finalize()))
}

/// Temporary sibling name used while a copy is in flight
pub fn temp_path(dest: &Path) -> PathBuf {
	let mut name = dest.as_os_str().to_os_string();
	name.push(TEMP_SUFFIX);
	PathBuf::from(name)
}

/// Set a file's mtime to whole seconds since the epoch
pub fn set_mtime(path: &Path, mtime: i64) -> Result<(), ActionError> {
	filetime::set_file_mtime(path, filetime::FileTime::from_unix_time(mtime, 0))
		.map_err(|e| ActionError::Io { path: path.display().to_string(), source: e })
}

/// Finish a download or local copy: pin the mtime, then rename into place
pub async fn commit_temp(tmp: &Path, dest: &Path, mtime: i64) -> Result<(), ActionError> {
	let result = match set_mtime(tmp, mtime) {
		Ok(()) => tokio::fs::rename(tmp, dest)
			.await
			.map_err(|e| ActionError::Io { path: dest.display().to_string(), source: e }),
		Err(e) => Err(e),
	};
	if result.is_err() {
		let _ = tokio::fs::remove_file(tmp).await;
	}
	result
}

/// Make sure the destination's parent directory exists
pub async fn ensure_parent(dest: &Path) -> Result<(), ActionError> {
	if let Some(parent) = dest.parent() {
		tokio::fs::create_dir_all(parent)
			.await
			.map_err(|e| ActionError::Io { path: parent.display().to_string(), source: e })?;
	}
	Ok(())
}

pub async fn remove_file_idempotent(path: &Path) -> Result<(), ActionError> {
	match tokio::fs::remove_file(path).await {
		Ok(()) => Ok(()),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
		Err(e) => Err(ActionError::Io { path: path.display().to_string(), source: e }),
	}
}

/// Quote a path for a POSIX shell
///
/// A leading `~/` is left outside the quotes so the remote shell still
/// expands it.
pub fn shell_quote(s: &str) -> String {
	let (prefix, rest) = match s.strip_prefix("~/") {
		Some(rest) => ("~/", rest),
		None => ("", s),
	};
	format!("{}'{}'", prefix, rest.replace('\'', "'\\''"))
}


// vim: ts=4
