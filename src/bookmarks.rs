//! Read-only access to saved remote-path bookmarks
//!
//! Bookmarks live in `~/.config/sshcp/bookmarks.json` as
//! `{"bookmarks": {"logs": "/var/log/app"}}`. Watch mode only expands them;
//! managing them is the job of the bookmark commands.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::config_dir;
use crate::logging::*;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BookmarksFile {
	bookmarks: BTreeMap<String, String>,
}

pub fn bookmarks_file() -> PathBuf {
	config_dir().join("bookmarks.json")
}

/// Load all bookmarks; a missing or unreadable file yields none
pub fn load_bookmarks(file: &Path) -> BTreeMap<String, String> {
	let contents = match std::fs::read_to_string(file) {
		Ok(c) => c,
		Err(_) => return BTreeMap::new(),
	};
	match serde_json::from_str::<BookmarksFile>(&contents) {
		Ok(f) => f.bookmarks,
		Err(e) => {
			warn!("Ignoring unreadable bookmarks file {}: {}", file.display(), e);
			BTreeMap::new()
		}
	}
}

/// Expand `@name[/rest]` using the bookmarks in `file`
///
/// Anything else, or an unknown name, is returned unchanged.
pub fn expand_bookmark(path: &str, file: &Path) -> String {
	let reference = match path.strip_prefix('@') {
		Some(r) => r,
		None => return path.to_string(),
	};
	let (name, rest) = match reference.find('/') {
		Some(idx) => (&reference[..idx], &reference[idx..]),
		None => (reference, ""),
	};

	let bookmarks = load_bookmarks(file);
	match bookmarks.get(name) {
		Some(base) if base.ends_with('/') && rest.starts_with('/') => format!("{}{}", base, &rest[1..]),
		Some(base) => format!("{}{}", base, rest),
		None => {
			debug!("No bookmark named '{}'", name);
			path.to_string()
		}
	}
}


// vim: ts=4
