//! Transport whose "remote" side is another local directory

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use super::{commit_temp, ensure_parent, file_digest, remove_file_idempotent, temp_path, Transport};
use crate::error::{ActionError, SnapshotError};
use crate::exclusion::PatternMatcher;
use crate::snapshot;
use crate::types::Entry;

/// Mirror between two directories on this machine
#[derive(Debug, Default, Clone)]
pub struct LocalTransport;

impl LocalTransport {
	pub fn new() -> Self {
		LocalTransport
	}
}

async fn copy_file(src: &Path, dest: &Path, entry: &Entry) -> Result<(), ActionError> {
	ensure_parent(dest).await?;
	let tmp = temp_path(dest);
	if let Err(e) = tokio::fs::copy(src, &tmp).await {
		let _ = tokio::fs::remove_file(&tmp).await;
		return Err(ActionError::Io { path: src.display().to_string(), source: e });
	}
	commit_temp(&tmp, dest, entry.mtime).await
}

#[async_trait]
impl Transport for LocalTransport {
	fn describe(&self) -> String {
		"localhost".to_string()
	}

	async fn list_remote(
		&self,
		root: &str,
		matcher: Arc<PatternMatcher>,
	) -> Result<Vec<Entry>, SnapshotError> {
		snapshot::list_local_tree(Path::new(root), matcher)
			.await
			.map_err(|e| SnapshotError::RemoteList { host: self.describe(), message: e.to_string() })
	}

	async fn copy_to_remote(&self, local: &Path, remote: &str, entry: &Entry) -> Result<(), ActionError> {
		copy_file(local, Path::new(remote), entry).await
	}

	async fn copy_to_local(&self, remote: &str, local: &Path, entry: &Entry) -> Result<(), ActionError> {
		copy_file(Path::new(remote), local, entry).await
	}

	async fn delete_remote(&self, remote: &str) -> Result<(), ActionError> {
		remove_file_idempotent(Path::new(remote)).await
	}

	async fn remote_digest(&self, remote: &str) -> Result<String, ActionError> {
		let path = Path::new(remote).to_path_buf();
		tokio::task::spawn_blocking(move || file_digest(&path)).await.map_err(|e| ActionError::Io {
			path: remote.to_string(),
			source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
		})?
	}
}


// vim: ts=4
