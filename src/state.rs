//! Baseline persistence for watch pairs
//!
//! The baseline is the last-known-synchronized state of every path on both
//! sides. It lives in `<state_dir>/<pair-id>.json`. Per-path updates are
//! appended to `<pair-id>.journal` as they happen, so a crash mid-cycle keeps
//! every completed action; `persist` folds the journal back into the main file.

use crate::error::StateError;
use crate::logging::*;
use crate::types::{EntryState, WatchPair};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Both sides of one path as of its last successful sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BaselineEntry {
	pub local: Option<EntryState>,
	pub remote: Option<EntryState>,
}

/// Persisted baseline for one local/remote pair
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Baseline {
	pub local_root: String,
	pub remote_root: String,

	/// Unix time of the last compaction
	pub updated_at: u64,

	pub entries: BTreeMap<String, BaselineEntry>,
}

impl Baseline {
	pub fn get(&self, path: &str) -> Option<&BaselineEntry> {
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

	fn apply(&mut self, path: &str, local: Option<EntryState>, remote: Option<EntryState>) {
		if local.is_none() && remote.is_none() {
			self.entries.remove(path);
		} else {
			self.entries.insert(path.to_string(), BaselineEntry { local, remote });
		}
	}
}

/// One journal line
#[derive(Debug, Serialize, Deserialize)]
struct JournalRecord {
	path: String,
	local: Option<EntryState>,
	remote: Option<EntryState>,
}

/// Baseline store for one watch pair
///
/// Reads happen during detection; all writes come from the executor's
/// result loop, one path at a time.
pub struct StateStore {
	state_path: PathBuf,
	journal_path: PathBuf,
	baseline: Baseline,
	pending: usize,
	recovered: Option<StateError>,
}

/// Stable identifier for a pair, used as the state file stem
pub fn pair_id(local_root: &str, remote_spec: &str) -> String {
	let mut hasher = Sha256::new();
	hasher.update(local_root.as_bytes());
	hasher.update(b"\n");
	hasher.update(remote_spec.as_bytes());
	hex::encode(&hasher.finalize()[..8])
}

impl StateStore {
	/// Load the baseline for `pair`, or start empty
	///
	/// `remote_spec` identifies the remote side including its host
	/// (`host:/path`). A missing file is a first run. An unreadable or corrupt
	/// file, or one recorded for another pair, is logged and replaced by an
	/// empty baseline; the first cycle's full comparison takes over from there.
	pub async fn load(state_dir: &Path, pair: &WatchPair, remote_spec: &str) -> StateStore {
		let local_root = pair.local_root.display().to_string();
		let id = pair_id(&local_root, remote_spec);
		let state_path = state_dir.join(format!("{}.json", id));
		let journal_path = state_dir.join(format!("{}.journal", id));

		let mut recovered = None;
		let mut baseline = match Self::read_baseline(&state_path).await {
			Ok(Some(b)) if b.local_root == local_root && b.remote_root == remote_spec => b,
			Ok(Some(b)) => {
				let err = StateError::RootMismatch {
					expected: format!("{} <-> {}", local_root, remote_spec),
					found: format!("{} <-> {}", b.local_root, b.remote_root),
				};
				warn!("{}; starting with an empty baseline", err);
				recovered = Some(err);
				Baseline::default()
			}
			Ok(None) => {
				info!("No baseline for this pair yet (first watch)");
				Baseline::default()
			}
			Err(err) => {
				warn!("{}; starting with an empty baseline", err);
				recovered = Some(err);
				Baseline::default()
			}
		};
		baseline.local_root = local_root;
		baseline.remote_root = remote_spec.to_string();

		let pending = Self::replay_journal(&journal_path, &mut baseline).await;
		if pending > 0 {
			info!("Replayed {} journal records from an interrupted session", pending);
		}

		StateStore { state_path, journal_path, baseline, pending, recovered }
	}

	async fn read_baseline(path: &Path) -> Result<Option<Baseline>, StateError> {
		let contents = match tokio::fs::read_to_string(path).await {
			Ok(c) => c,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(StateError::LoadFailed { source: e }),
		};

		serde_json::from_str(&contents).map(Some).map_err(|e| StateError::Corrupted {
			message: format!("Failed to parse {}: {}", path.display(), e),
		})
	}

	async fn replay_journal(path: &Path, baseline: &mut Baseline) -> usize {
		let contents = match tokio::fs::read_to_string(path).await {
			Ok(c) => c,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
			Err(e) => {
				warn!("Cannot read journal {}: {}", path.display(), e);
				return 0;
			}
		};

		let mut count = 0;
		for line in contents.lines().filter(|l| !l.trim().is_empty()) {
			match serde_json::from_str::<JournalRecord>(line) {
				Ok(rec) => {
					baseline.apply(&rec.path, rec.local, rec.remote);
					count += 1;
				}
				// A torn final line from a crash is expected; anything else is worth a warning
				Err(e) => warn!("Skipping corrupt journal line: {}", e),
			}
		}
		count
	}

	pub fn baseline(&self) -> &Baseline {
		&self.baseline
	}

	/// Error recovered from while loading, if any
	pub fn recovered_from(&self) -> Option<&StateError> {
		self.recovered.as_ref()
	}

	pub fn state_path(&self) -> &Path {
		&self.state_path
	}

	/// Number of journal records not yet compacted into the state file
	pub fn pending(&self) -> usize {
		self.pending
	}

	/// Record the post-action state of one path
	///
	/// `None` on both sides forgets the path.
	pub async fn record_success(
		&mut self,
		path: &str,
		local: Option<EntryState>,
		remote: Option<EntryState>,
	) -> Result<(), StateError> {
		self.baseline.apply(path, local, remote);
		self.pending += 1;

		let record = JournalRecord { path: path.to_string(), local, remote };
		let mut line = serde_json::to_string(&record)
			.map_err(|e| StateError::SaveFailed { source: Box::new(e) })?;
		line.push('\n');

		self.ensure_dir().await?;
		let mut file = tokio::fs::OpenOptions::new()
			.create(true)
			.append(true)
			.open(&self.journal_path)
			.await
			.map_err(|e| StateError::SaveFailed { source: Box::new(e) })?;
		file.write_all(line.as_bytes())
			.await
			.map_err(|e| StateError::SaveFailed { source: Box::new(e) })?;
		file.flush().await.map_err(|e| StateError::SaveFailed { source: Box::new(e) })
	}

	/// Write the full baseline and drop the journal
	pub async fn persist(&mut self) -> Result<(), StateError> {
		self.ensure_dir().await?;
		self.baseline.updated_at = std::time::SystemTime::now()
			.duration_since(std::time::UNIX_EPOCH)
			.map(|d| d.as_secs())
			.unwrap_or(0);

		let json = serde_json::to_string(&self.baseline)
			.map_err(|e| StateError::SaveFailed { source: Box::new(e) })?;

		let tmp = self.state_path.with_extension("json.tmp");
		tokio::fs::write(&tmp, json).await.map_err(|e| StateError::SaveFailed { source: Box::new(e) })?;
		tokio::fs::rename(&tmp, &self.state_path)
			.await
			.map_err(|e| StateError::SaveFailed { source: Box::new(e) })?;

		match tokio::fs::remove_file(&self.journal_path).await {
			Ok(()) => {}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
			Err(e) => return Err(StateError::SaveFailed { source: Box::new(e) }),
		}
		self.pending = 0;
		debug!("Persisted baseline with {} paths to {}", self.baseline.len(), self.state_path.display());
		Ok(())
	}

	async fn ensure_dir(&self) -> Result<(), StateError> {
		let dir = self.state_path.parent().unwrap_or(Path::new("."));
		tokio::fs::create_dir_all(dir).await.map_err(|e| StateError::SaveFailed { source: Box::new(e) })
	}
}


// vim: ts=4
