//! Sync execution: turning decisions into transfers
//!
//! Actions run concurrently up to the configured limit, but their results
//! are consumed one at a time here, which makes this loop the only writer
//! of the baseline.

use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::conflict::{ConflictDecision, Resolution};
use crate::detect::{Change, ChangeOp, ChangeRecord};
use crate::error::ActionError;
use crate::events::{WatchEvent, WatchEventSink};
use crate::logging::*;
use crate::state::StateStore;
use crate::transport::Transport;
use crate::types::{Entry, EntryState, WatchPair};
use crate::utils::Shutdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
	CopyToRemote,
	CopyToLocal,
	DeleteRemote,
	DeleteLocal,

	/// Sides already agree; only the baseline is refreshed
	NoOp,
}

/// One planned change to one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncAction {
	pub path: String,
	pub kind: ActionKind,

	/// Whether a copy creates the file on the target side or replaces it
	pub op: ChangeOp,
	pub local: Option<Entry>,
	pub remote: Option<Entry>,
}

impl SyncAction {
	/// Entry being copied, for copy actions
	pub fn source(&self) -> Option<&Entry> {
		match self.kind {
			ActionKind::CopyToRemote => self.local.as_ref(),
			ActionKind::CopyToLocal => self.remote.as_ref(),
			_ => None,
		}
	}

	/// Baseline states to record once the action succeeded
	///
	/// A copy leaves both sides equal to the source, a deletion leaves
	/// nothing, and a no-op records the pair as observed.
	pub fn post_state(&self) -> (Option<EntryState>, Option<EntryState>) {
		match self.kind {
			ActionKind::CopyToRemote | ActionKind::CopyToLocal => {
				let s = self.source().map(Entry::state);
				(s, s)
			}
			ActionKind::DeleteRemote | ActionKind::DeleteLocal => (None, None),
			ActionKind::NoOp => (self.local.as_ref().map(Entry::state), self.remote.as_ref().map(Entry::state)),
		}
	}
}

#[derive(Debug)]
pub enum ActionOutcome {
	Success,
	Failed(ActionError),

	/// Not started because the watch is stopping
	Cancelled,
}

fn keep_local(record: &ChangeRecord) -> ActionKind {
	if record.local.is_some() {
		ActionKind::CopyToRemote
	} else {
		ActionKind::DeleteRemote
	}
}

fn keep_remote(record: &ChangeRecord) -> ActionKind {
	if record.remote.is_some() {
		ActionKind::CopyToLocal
	} else {
		ActionKind::DeleteLocal
	}
}

fn change_op(record: &ChangeRecord, kind: ActionKind) -> ChangeOp {
	let target = match (record.change, kind) {
		(Change::LocalOnly(op) | Change::RemoteOnly(op), _) => return op,
		(_, ActionKind::CopyToRemote) => &record.remote,
		(_, ActionKind::CopyToLocal) => &record.local,
		_ => return ChangeOp::Modified,
	};
	if target.is_some() {
		ChangeOp::Modified
	} else {
		ChangeOp::Added
	}
}

/// Plan at most one action per path
///
/// Unchanged paths, skipped conflicts and conflicts without a decision get
/// no action, so their baseline stays as it was.
pub fn plan(
	records: &BTreeMap<String, ChangeRecord>,
	decisions: &BTreeMap<String, ConflictDecision>,
) -> Vec<SyncAction> {
	records
		.values()
		.filter_map(|record| {
			let kind = match record.change {
				Change::Unchanged => return None,
				Change::Converged | Change::BothDeleted => ActionKind::NoOp,
				Change::LocalOnly(_) | Change::LocalDeleted => keep_local(record),
				Change::RemoteOnly(_) | Change::RemoteDeleted => keep_remote(record),
				Change::Conflict => match decisions.get(&record.path)?.resolution {
					Resolution::KeepLocal => keep_local(record),
					Resolution::KeepRemote => keep_remote(record),
					Resolution::Skip => return None,
				},
			};
			Some(SyncAction {
				path: record.path.clone(),
				kind,
				op: change_op(record, kind),
				local: record.local.clone(),
				remote: record.remote.clone(),
			})
		})
		.collect()
}

/// What one apply pass did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyReport {
	pub uploaded: usize,
	pub downloaded: usize,
	pub deleted_remote: usize,
	pub deleted_local: usize,
	pub converged: usize,
	pub failed: usize,
	pub cancelled: usize,
}

impl ApplyReport {
	fn count(&mut self, kind: ActionKind) {
		match kind {
			ActionKind::CopyToRemote => self.uploaded += 1,
			ActionKind::CopyToLocal => self.downloaded += 1,
			ActionKind::DeleteRemote => self.deleted_remote += 1,
			ActionKind::DeleteLocal => self.deleted_local += 1,
			ActionKind::NoOp => self.converged += 1,
		}
	}
}

fn success_event(action: &SyncAction) -> WatchEvent {
	let path = action.path.clone();
	match action.kind {
		ActionKind::CopyToRemote => WatchEvent::Uploaded { path, op: action.op },
		ActionKind::CopyToLocal => WatchEvent::Downloaded { path, op: action.op },
		ActionKind::DeleteRemote => WatchEvent::DeletedRemote { path },
		ActionKind::DeleteLocal => WatchEvent::DeletedLocal { path },
		ActionKind::NoOp => WatchEvent::Converged { path },
	}
}

/// Applies planned actions through a transport
pub struct Executor {
	transport: Arc<dyn Transport>,
	pair: WatchPair,
	parallel: usize,
	shutdown: Shutdown,
}

impl Executor {
	pub fn new(transport: Arc<dyn Transport>, pair: WatchPair, parallel: usize, shutdown: Shutdown) -> Self {
		Executor { transport, pair, parallel: parallel.max(1), shutdown }
	}

	/// Run all actions, recording each success in the baseline as it lands
	pub async fn apply(
		&self,
		actions: Vec<SyncAction>,
		store: &mut StateStore,
		events: &dyn WatchEventSink,
	) -> ApplyReport {
		let mut report = ApplyReport::default();
		if actions.is_empty() {
			return report;
		}
		debug!("Applying {} actions ({} at a time)", actions.len(), self.parallel);

		let mut results =
			stream::iter(actions.into_iter().map(|action| self.run_action(action))).buffer_unordered(self.parallel);

		while let Some((action, outcome)) = results.next().await {
			match outcome {
				ActionOutcome::Success => {
					let (local, remote) = action.post_state();
					if let Err(e) = store.record_success(&action.path, local, remote).await {
						warn!("{}: applied but baseline not updated: {}", action.path, e);
					}
					report.count(action.kind);
					events.on_event(&success_event(&action));
				}
				ActionOutcome::Failed(err) => {
					warn!("{:?} {} failed: {}", action.kind, action.path, err);
					report.failed += 1;
					events.on_event(&WatchEvent::Failed { path: action.path.clone(), message: err.to_string() });
				}
				ActionOutcome::Cancelled => {
					debug!("{}: cancelled before start", action.path);
					report.cancelled += 1;
				}
			}
		}

		report
	}

	async fn run_action(&self, action: SyncAction) -> (SyncAction, ActionOutcome) {
		if self.shutdown.is_triggered() {
			return (action, ActionOutcome::Cancelled);
		}

		let outcome = match self.execute(&action).await {
			Ok(()) => ActionOutcome::Success,
			Err(e) => ActionOutcome::Failed(e),
		};
		(action, outcome)
	}

	async fn execute(&self, action: &SyncAction) -> Result<(), ActionError> {
		let local = self.pair.local_path(&action.path);
		let remote = self.pair.remote_path(&action.path);

		match action.kind {
			ActionKind::CopyToRemote | ActionKind::CopyToLocal => {
				let entry = action.source().ok_or_else(|| ActionError::Io {
					path: action.path.clone(),
					source: std::io::Error::new(std::io::ErrorKind::NotFound, "no source entry"),
				})?;
				if action.kind == ActionKind::CopyToRemote {
					self.transport.copy_to_remote(&local, &remote, entry).await
				} else {
					self.transport.copy_to_local(&remote, &local, entry).await
				}
			}
			ActionKind::DeleteRemote => self.transport.delete_remote(&remote).await,
			ActionKind::DeleteLocal => self.transport.delete_local(&local).await,
			ActionKind::NoOp => Ok(()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::conflict::{ConflictMode, Provenance};

	fn record(path: &str, change: Change, local: Option<Entry>, remote: Option<Entry>) -> ChangeRecord {
		ChangeRecord { path: path.to_string(), change, local, remote }
	}

	fn decision(resolution: Resolution) -> ConflictDecision {
		ConflictDecision { resolution, provenance: Provenance::Policy(ConflictMode::Newer) }
	}

	fn kinds(actions: &[SyncAction]) -> Vec<(&str, ActionKind)> {
		actions.iter().map(|a| (a.path.as_str(), a.kind)).collect()
	}

	#[test]
	fn test_plan_one_sided() {
		let f = |p: &str| Some(Entry::file(p, 1, 1));
		let mut records = BTreeMap::new();
		for r in [
			record("a", Change::LocalOnly(ChangeOp::Added), f("a"), None),
			record("b", Change::RemoteOnly(ChangeOp::Modified), f("b"), f("b")),
			record("c", Change::LocalDeleted, None, f("c")),
			record("d", Change::RemoteDeleted, f("d"), None),
			record("e", Change::Unchanged, f("e"), f("e")),
			record("f", Change::Converged, f("f"), f("f")),
			record("g", Change::BothDeleted, None, None),
		] {
			records.insert(r.path.clone(), r);
		}

		let actions = plan(&records, &BTreeMap::new());
		assert_eq!(
			kinds(&actions),
			vec![
				("a", ActionKind::CopyToRemote),
				("b", ActionKind::CopyToLocal),
				("c", ActionKind::DeleteRemote),
				("d", ActionKind::DeleteLocal),
				("f", ActionKind::NoOp),
				("g", ActionKind::NoOp),
			]
		);
	}

	#[test]
	fn test_plan_conflicts_follow_decisions() {
		let mut records = BTreeMap::new();
		records.insert("x".to_string(), record("x", Change::Conflict, Some(Entry::file("x", 1, 1)), None));
		records.insert("y".to_string(), record("y", Change::Conflict, None, Some(Entry::file("y", 1, 1))));
		records.insert(
			"z".to_string(),
			record("z", Change::Conflict, Some(Entry::file("z", 1, 1)), Some(Entry::file("z", 2, 2))),
		);
		records.insert(
			"undecided".to_string(),
			record("undecided", Change::Conflict, Some(Entry::file("u", 1, 1)), None),
		);

		let mut decisions = BTreeMap::new();
		decisions.insert("x".to_string(), decision(Resolution::KeepRemote));
		decisions.insert("y".to_string(), decision(Resolution::KeepRemote));
		decisions.insert("z".to_string(), decision(Resolution::Skip));

		let actions = plan(&records, &decisions);
		// Remote deleted x and wins; remote modified y and wins; z skipped; undecided untouched
		assert_eq!(kinds(&actions), vec![("x", ActionKind::DeleteLocal), ("y", ActionKind::CopyToLocal)]);
	}

	#[test]
	fn test_plan_keeps_change_op() {
		let mut records = BTreeMap::new();
		for r in [
			record("new", Change::LocalOnly(ChangeOp::Added), Some(Entry::file("new", 1, 1)), None),
			record("edit", Change::RemoteOnly(ChangeOp::Modified), None, Some(Entry::file("edit", 1, 1))),
			record("gone", Change::Conflict, Some(Entry::file("gone", 1, 1)), None),
			record("both", Change::Conflict, Some(Entry::file("both", 1, 1)), Some(Entry::file("both", 2, 2))),
		] {
			records.insert(r.path.clone(), r);
		}
		let mut decisions = BTreeMap::new();
		decisions.insert("gone".to_string(), decision(Resolution::KeepLocal));
		decisions.insert("both".to_string(), decision(Resolution::KeepLocal));

		let ops: Vec<(String, ChangeOp)> = plan(&records, &decisions).into_iter().map(|a| (a.path, a.op)).collect();
		assert_eq!(
			ops,
			vec![
				("both".to_string(), ChangeOp::Modified),
				("edit".to_string(), ChangeOp::Modified),
				("gone".to_string(), ChangeOp::Added),
				("new".to_string(), ChangeOp::Added),
			]
		);
	}

	#[test]
	fn test_post_state() {
		let local = Entry::file("a", 10, 100);
		let remote = Entry::file("a", 20, 200);
		let mut action = SyncAction {
			path: "a".to_string(),
			kind: ActionKind::CopyToLocal,
			op: ChangeOp::Modified,
			local: Some(local.clone()),
			remote: Some(remote.clone()),
		};
		assert_eq!(action.post_state(), (Some(remote.state()), Some(remote.state())));

		action.kind = ActionKind::DeleteRemote;
		assert_eq!(action.post_state(), (None, None));

		action.kind = ActionKind::NoOp;
		assert_eq!(action.post_state(), (Some(local.state()), Some(remote.state())));
	}
}

// vim: ts=4
