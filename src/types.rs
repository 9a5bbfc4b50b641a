//! Core data types shared by the watch engine

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryKind {
	File,
	Directory,
}

/// The comparable part of an entry: what the change detector looks at
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct EntryState {
	pub size: u64,
	pub mtime: i64,
}

/// One filesystem object under watch
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Entry {
	/// Relative, `/`-separated path from the watched root
	pub path: String,
	pub size: u64,
	/// Whole seconds since the Unix epoch
	pub mtime: i64,
	pub kind: EntryKind,
}

impl Entry {
	pub fn file(path: impl Into<String>, size: u64, mtime: i64) -> Self {
		Entry { path: path.into(), size, mtime, kind: EntryKind::File }
	}

	pub fn state(&self) -> EntryState {
		EntryState { size: self.size, mtime: self.mtime }
	}
}

/// Point-in-time enumeration of one side's files
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
	entries: BTreeMap<String, Entry>,
}

impl Snapshot {
	pub fn new() -> Self {
		Snapshot::default()
	}

	/// Build from listing rows. Directory rows are dropped: they are implied by their files.
	pub fn from_entries(entries: impl IntoIterator<Item = Entry>) -> Self {
		let entries = entries
			.into_iter()
			.filter(|e| e.kind == EntryKind::File)
			.map(|e| (e.path.clone(), e))
			.collect();
		Snapshot { entries }
	}

	pub fn get(&self, path: &str) -> Option<&Entry> {
		self.entries.get(path)
	}

	pub fn paths(&self) -> impl Iterator<Item = &String> {
		self.entries.keys()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

/// The local/remote root pair a watch session keeps in sync
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchPair {
	pub local_root: PathBuf,
	pub remote_root: String,
}

impl WatchPair {
	pub fn new(local_root: impl Into<PathBuf>, remote_root: impl Into<String>) -> Self {
		let remote_root: String = remote_root.into();
		let trimmed = remote_root.trim_end_matches('/');
		let remote_root = if trimmed.is_empty() { "/".to_string() } else { trimmed.to_string() };
		WatchPair { local_root: local_root.into(), remote_root }
	}

	pub fn local_path(&self, rel: &str) -> PathBuf {
		rel.split('/').fold(self.local_root.clone(), |acc, part| acc.join(part))
	}

	pub fn remote_path(&self, rel: &str) -> String {
		if self.remote_root == "/" {
			format!("/{}", rel)
		} else {
			format!("{}/{}", self.remote_root, rel)
		}
	}
}

/// Normalize a relative path to the `a/b/c` form used as snapshot key
///
/// Returns None for paths that escape the root or are empty.
pub fn normalize_rel_path(path: &Path) -> Option<String> {
	let mut parts: Vec<String> = Vec::new();
	for comp in path.components() {
		match comp {
			Component::Normal(s) => parts.push(s.to_str()?.to_string()),
			Component::CurDir => {}
			Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
		}
	}
	if parts.is_empty() {
		None
	} else {
		Some(parts.join("/"))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_normalize_rel_path() {
		assert_eq!(normalize_rel_path(Path::new("./a/b.txt")), Some("a/b.txt".to_string()));
		assert_eq!(normalize_rel_path(Path::new("a//b")), Some("a/b".to_string()));
		assert_eq!(normalize_rel_path(Path::new("../x")), None);
		assert_eq!(normalize_rel_path(Path::new("/etc/passwd")), None);
		assert_eq!(normalize_rel_path(Path::new(".")), None);
	}

	#[test]
	fn test_snapshot_drops_directories() {
		let snap = Snapshot::from_entries(vec![
			Entry::file("a.txt", 3, 10),
			Entry { path: "dir".to_string(), size: 4096, mtime: 10, kind: EntryKind::Directory },
		]);
		assert_eq!(snap.len(), 1);
		assert!(snap.get("dir").is_none());
	}

	#[test]
	fn test_watch_pair_paths() {
		let pair = WatchPair::new("/home/me/site", "/var/www/");
		assert_eq!(pair.remote_root, "/var/www");
		assert_eq!(pair.remote_path("css/app.css"), "/var/www/css/app.css");
		assert_eq!(pair.local_path("css/app.css"), PathBuf::from("/home/me/site/css/app.css"));

		let root = WatchPair::new("/tmp/x", "/");
		assert_eq!(root.remote_path("a"), "/a");
	}
}

// vim: ts=4
