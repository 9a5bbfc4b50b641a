//! Baseline-relative change detection
//!
//! Each side is compared against its own half of the baseline, never against
//! the other side. Only when both sides moved does the other side matter: if
//! they landed on the same content the path has converged, otherwise it is a
//! conflict.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::logging::*;
use crate::state::Baseline;
use crate::transport::Transport;
use crate::types::{Entry, EntryState, Snapshot, WatchPair};

/// Whether a one-sided change created or modified the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
	Added,
	Modified,
}

/// Classification of one path for this cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
	/// Neither side moved since the baseline
	Unchanged,

	/// Both sides agree, but the baseline is stale; refresh it, copy nothing
	Converged,

	LocalOnly(ChangeOp),
	RemoteOnly(ChangeOp),

	/// Both sides changed to different content
	Conflict,

	LocalDeleted,
	RemoteDeleted,
	BothDeleted,
}

impl Change {
	pub fn is_conflict(&self) -> bool {
		matches!(self, Change::Conflict)
	}
}

/// Outcome of comparing one path across local, remote and baseline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
	pub path: String,
	pub change: Change,
	pub local: Option<Entry>,
	pub remote: Option<Entry>,
}

fn one_sided(current: Option<EntryState>, base: Option<EntryState>, other: Option<EntryState>) -> OneSided {
	if current == other {
		OneSided::Converged
	} else if current.is_none() {
		OneSided::Deleted
	} else if base.is_none() {
		OneSided::Changed(ChangeOp::Added)
	} else {
		OneSided::Changed(ChangeOp::Modified)
	}
}

enum OneSided {
	Converged,
	Deleted,
	Changed(ChangeOp),
}

/// Classify a single path from its three states
pub fn classify(
	local: Option<EntryState>,
	remote: Option<EntryState>,
	base_local: Option<EntryState>,
	base_remote: Option<EntryState>,
) -> Change {
	let local_changed = local != base_local;
	let remote_changed = remote != base_remote;

	match (local_changed, remote_changed) {
		(false, false) => Change::Unchanged,
		(true, false) => match one_sided(local, base_local, remote) {
			OneSided::Converged => Change::Converged,
			OneSided::Deleted => Change::LocalDeleted,
			OneSided::Changed(op) => Change::LocalOnly(op),
		},
		(false, true) => match one_sided(remote, base_remote, local) {
			OneSided::Converged => Change::Converged,
			OneSided::Deleted => Change::RemoteDeleted,
			OneSided::Changed(op) => Change::RemoteOnly(op),
		},
		(true, true) => {
			if local == remote {
				if local.is_none() {
					Change::BothDeleted
				} else {
					Change::Converged
				}
			} else {
				Change::Conflict
			}
		}
	}
}

/// Compare both snapshots against the baseline
///
/// Covers every path seen in either snapshot or in the baseline.
pub fn detect_changes(
	local: &Snapshot,
	remote: &Snapshot,
	baseline: &Baseline,
) -> BTreeMap<String, ChangeRecord> {
	let paths: BTreeSet<&String> = local.paths().chain(remote.paths()).chain(baseline.paths()).collect();

	let mut records = BTreeMap::new();
	for path in paths {
		let l = local.get(path);
		let r = remote.get(path);
		let base = baseline.get(path).copied().unwrap_or_default();

		let change = classify(l.map(Entry::state), r.map(Entry::state), base.local, base.remote);
		records.insert(
			path.clone(),
			ChangeRecord { path: path.clone(), change, local: l.cloned(), remote: r.cloned() },
		);
	}
	records
}

/// Downgrade conflicts whose two sides hold identical bytes
///
/// Only same-size pairs are checked; a size difference is already proof of
/// different content. A digest that cannot be computed keeps the conflict.
pub async fn verify_conflicts(
	records: &mut BTreeMap<String, ChangeRecord>,
	transport: &Arc<dyn Transport>,
	pair: &WatchPair,
) -> usize {
	let mut converged = 0;
	for record in records.values_mut() {
		if !record.change.is_conflict() {
			continue;
		}
		let (l, r) = match (&record.local, &record.remote) {
			(Some(l), Some(r)) if l.size == r.size => (l, r),
			_ => continue,
		};

		let local_digest = transport.local_digest(&pair.local_path(&l.path)).await;
		let remote_digest = transport.remote_digest(&pair.remote_path(&r.path)).await;
		match (local_digest, remote_digest) {
			(Ok(a), Ok(b)) if a == b => {
				debug!("{}: both sides changed to identical content", record.path);
				record.change = Change::Converged;
				converged += 1;
			}
			(Ok(_), Ok(_)) => {}
			(Err(e), _) | (_, Err(e)) => {
				debug!("{}: cannot compare content, keeping conflict: {}", record.path, e);
			}
		}
	}
	converged
}


// vim: ts=4
