//! Filesystem snapshot building for both sides of a watch pair
//!
//! The local side is walked directly. The remote side is listed by the
//! transport with `find -printf` and parsed here, so both sides go through
//! the same normalization and exclusion rules.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use crate::error::SnapshotError;
use crate::exclusion::PatternMatcher;
use crate::logging::*;
use crate::types::{normalize_rel_path, Entry, EntryKind};

/// `find` format producing NUL-terminated `relpath mtime size type` fields
///
/// NUL is the one byte a file name cannot contain, so names with newlines
/// or separators survive the round trip.
pub const REMOTE_LIST_FORMAT: &str = "%P\\0%T@\\0%s\\0%y\\0";

/// List all files under `root` that are not excluded
///
/// The walk is blocking filesystem work and runs on the blocking pool.
pub async fn list_local_tree(
	root: &Path,
	matcher: Arc<PatternMatcher>,
) -> Result<Vec<Entry>, SnapshotError> {
	let root = root.to_path_buf();
	let display = root.display().to_string();
	tokio::task::spawn_blocking(move || walk_local(&root, &matcher)).await.map_err(|e| {
		SnapshotError::LocalScan {
			path: display,
			source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
		}
	})?
}

/// Synchronous walk, used by the async wrapper and by local-mirror transports
pub fn walk_local(root: &Path, matcher: &PatternMatcher) -> Result<Vec<Entry>, SnapshotError> {
	match fs::metadata(root) {
		Ok(meta) if meta.is_dir() => {}
		Ok(_) => {
			return Err(SnapshotError::LocalScan {
				path: root.display().to_string(),
				source: std::io::Error::new(
					std::io::ErrorKind::InvalidInput,
					"not a directory",
				),
			})
		}
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
			return Err(SnapshotError::RootMissing { path: root.display().to_string() })
		}
		Err(e) => return Err(SnapshotError::LocalScan { path: root.display().to_string(), source: e }),
	}

	let mut entries = Vec::new();
	scan_dir(root, PathBuf::new(), matcher, &mut entries)?;
	debug!("Scanned {} files under {}", entries.len(), root.display());
	Ok(entries)
}

fn scan_dir(
	dir: &Path,
	rel: PathBuf,
	matcher: &PatternMatcher,
	entries: &mut Vec<Entry>,
) -> Result<(), SnapshotError> {
	let read = fs::read_dir(dir)
		.map_err(|e| SnapshotError::LocalScan { path: dir.display().to_string(), source: e })?;

	for entry_result in read {
		// A partial listing would read as deletions, so any error fails the scan
		let entry = entry_result
			.map_err(|e| SnapshotError::LocalScan { path: dir.display().to_string(), source: e })?;

		let child_rel = rel.join(entry.file_name());
		let key = match normalize_rel_path(&child_rel) {
			Some(k) => k,
			None => {
				debug!("Skipping non-UTF-8 or invalid path {:?}", child_rel);
				continue;
			}
		};
		if matcher.is_excluded(&key) {
			continue;
		}

		let path = entry.path();
		let meta = match fs::symlink_metadata(&path) {
			Ok(m) => m,
			// Vanished between readdir and stat
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
			Err(e) => return Err(SnapshotError::LocalScan { path: path.display().to_string(), source: e }),
		};

		if meta.is_dir() {
			scan_dir(&path, child_rel, matcher, entries)?;
		} else if meta.is_file() {
			let mtime = meta
				.modified()
				.ok()
				.and_then(|t| t.duration_since(UNIX_EPOCH).ok())
				.map(|d| d.as_secs() as i64)
				.unwrap_or(0);
			entries.push(Entry { path: key, size: meta.len(), mtime, kind: EntryKind::File });
		} else {
			debug!("Skipping symlink or special file {}", path.display());
		}
	}
	Ok(())
}

/// Parse output of `find <root> -mindepth 1 -printf REMOTE_LIST_FORMAT`
///
/// Symlinks, special files and non-UTF-8 names are skipped, as the local walk
/// skips them. A truncated or garbled record fails the whole listing: a row
/// that cannot be read must never turn into an absent file.
/// `%T@` fractions are truncated to whole seconds.
pub fn parse_remote_listing(output: &[u8], matcher: &PatternMatcher) -> Result<Vec<Entry>, String> {
	let mut entries = Vec::new();
	if output.is_empty() {
		return Ok(entries);
	}

	let fields: Vec<&[u8]> = output.split(|b| *b == 0).collect();
	// Every field is terminated, so the split ends with one empty piece
	let (last, fields) = fields.split_last().ok_or_else(|| "empty listing".to_string())?;
	if !last.is_empty() || fields.len() % 4 != 0 {
		return Err(format!("truncated listing ({} fields)", fields.len()));
	}

	for record in fields.chunks(4) {
		let text = |b: &[u8]| String::from_utf8_lossy(b).into_owned();
		let (path, mtime, size, kind) = (record[0], text(record[1]), text(record[2]), text(record[3]));

		let kind = match kind.as_str() {
			"f" => EntryKind::File,
			"d" => EntryKind::Directory,
			other => {
				debug!("Skipping {} entry {}", other, String::from_utf8_lossy(path));
				continue;
			}
		};
		let size: u64 = size.parse().map_err(|_| format!("bad size {:?} in listing", size))?;
		let mtime: i64 = mtime
			.split('.')
			.next()
			.and_then(|m| m.parse().ok())
			.ok_or_else(|| format!("bad mtime {:?} in listing", mtime))?;

		let path = match std::str::from_utf8(path) {
			Ok(p) => p,
			Err(_) => {
				debug!("Skipping non-UTF-8 remote path {:?}", String::from_utf8_lossy(path));
				continue;
			}
		};
		let key = match normalize_rel_path(Path::new(path)) {
			Some(k) => k,
			None => continue,
		};
		if matcher.is_excluded(&key) {
			continue;
		}
		entries.push(Entry { path: key, size, mtime, kind });
	}
	Ok(entries)
}


// vim: ts=4
