//! End-to-end watch cycles between two local directories

mod common;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use common::*;
use sshcp::conflict::ConflictMode;
use sshcp::error::{ActionError, SnapshotError};
use sshcp::exclusion::PatternMatcher;
use sshcp::state::BaselineEntry;
use sshcp::types::{Entry, EntryState};
use sshcp::{CycleOutcome, LocalTransport, Transport};

fn st(size: u64, mtime: i64) -> Option<EntryState> {
	Some(EntryState { size, mtime })
}

#[tokio::test]
async fn test_first_sync_uploads_new_local_file() {
	let fx = Fixture::new();
	write_file(&fx.local, "a.txt", "0123456789", 1_700_000_000);

	let mut session = fx.session(ConflictMode::Ask).await;
	let report = session.run_cycle().await;

	assert_eq!(report.outcome, CycleOutcome::Completed);
	assert_eq!(report.stats.uploaded, 1);
	assert_eq!(read_file(&fx.remote, "a.txt").as_deref(), Some("0123456789"));
	assert_eq!(mtime_of(&fx.remote, "a.txt"), 1_700_000_000);
	assert_eq!(
		session.store().baseline().get("a.txt"),
		Some(&BaselineEntry { local: st(10, 1_700_000_000), remote: st(10, 1_700_000_000) })
	);
	assert_eq!(fx.take_lines(), vec!["→ Added: a.txt".to_string()]);

	write_file(&fx.local, "a.txt", "0123456789abc", 1_700_000_100);
	session.run_cycle().await;
	assert_eq!(fx.take_lines(), vec!["→ Updated: a.txt".to_string()]);
}

#[tokio::test]
async fn test_unchanged_cycle_is_idempotent() {
	let fx = Fixture::new();
	write_file(&fx.local, "a.txt", "hello", 1_600_000_000);
	write_file(&fx.remote, "dir/b.txt", "world", 1_600_000_100);

	let mut session = fx.session(ConflictMode::Ask).await;
	let first = session.run_cycle().await;
	assert_eq!(first.stats.transfers(), 2);
	let baseline_after_first = session.store().baseline().entries.clone();

	let second = session.run_cycle().await;
	assert_eq!(second.outcome, CycleOutcome::Completed);
	assert!(second.stats.is_quiet());
	assert_eq!(second.stats.converged, 0);
	assert_eq!(session.store().baseline().entries, baseline_after_first);
	assert_eq!(read_file(&fx.local, "dir/b.txt").as_deref(), Some("world"));
}

#[tokio::test]
async fn test_remote_edit_downloads_with_mtime() {
	let fx = Fixture::new();
	write_file(&fx.local, "notes.md", "v1", 1_600_000_000);
	let mut session = fx.session(ConflictMode::Ask).await;
	session.run_cycle().await;

	write_file(&fx.remote, "notes.md", "version 2", 1_600_000_500);
	let report = session.run_cycle().await;

	assert_eq!(report.stats.downloaded, 1);
	assert_eq!(read_file(&fx.local, "notes.md").as_deref(), Some("version 2"));
	assert_eq!(mtime_of(&fx.local, "notes.md"), 1_600_000_500);
}

#[tokio::test]
async fn test_deletions_propagate_both_ways() {
	let fx = Fixture::new();
	write_file(&fx.local, "l.txt", "l", 1_600_000_000);
	write_file(&fx.local, "r.txt", "r", 1_600_000_000);
	let mut session = fx.session(ConflictMode::Ask).await;
	session.run_cycle().await;
	fx.take_lines();

	std::fs::remove_file(fx.local.join("l.txt")).unwrap();
	std::fs::remove_file(fx.remote.join("r.txt")).unwrap();
	let report = session.run_cycle().await;

	assert_eq!(report.stats.deleted_remote, 1);
	assert_eq!(report.stats.deleted_local, 1);
	assert!(read_file(&fx.remote, "l.txt").is_none());
	assert!(read_file(&fx.local, "r.txt").is_none());
	assert!(session.store().baseline().is_empty());
	let mut lines = fx.take_lines();
	lines.sort();
	assert_eq!(lines, vec!["← Deleted: r.txt".to_string(), "→ Deleted: l.txt".to_string()]);
}

#[tokio::test]
async fn test_newer_policy_lets_remote_win() {
	let fx = Fixture::new();
	write_file(&fx.local, "b.txt", "base", 1_600_000_000);
	let mut session = fx.session(ConflictMode::Newer).await;
	session.run_cycle().await;
	fx.take_lines();

	write_file(&fx.local, "b.txt", "local edit", 1_600_001_000);
	write_file(&fx.remote, "b.txt", "remote edit, later", 1_600_002_000);
	let report = session.run_cycle().await;

	assert_eq!(report.stats.conflicts, 1);
	assert_eq!(report.stats.downloaded, 1);
	assert_eq!(read_file(&fx.local, "b.txt").as_deref(), Some("remote edit, later"));
	assert_eq!(mtime_of(&fx.local, "b.txt"), 1_600_002_000);
	assert_eq!(
		fx.take_lines(),
		vec![
			"⚠ CONFLICT: b.txt".to_string(),
			"  ↳ keeping remote (policy: newer)".to_string(),
			"← Downloaded: b.txt".to_string(),
		]
	);

	// Settled: nothing left to do
	assert!(session.run_cycle().await.stats.is_quiet());
}

#[tokio::test]
async fn test_newer_tie_keeps_local() {
	let fx = Fixture::new();
	write_file(&fx.local, "t.txt", "base", 1_600_000_000);
	let mut session = fx.session(ConflictMode::Newer).await;
	session.run_cycle().await;

	write_file(&fx.local, "t.txt", "AAAA", 1_600_000_900);
	write_file(&fx.remote, "t.txt", "BBBBBB", 1_600_000_900);
	let report = session.run_cycle().await;

	assert_eq!(report.stats.conflicts, 1);
	assert_eq!(report.stats.uploaded, 1);
	assert_eq!(read_file(&fx.remote, "t.txt").as_deref(), Some("AAAA"));
}

#[tokio::test]
async fn test_skip_keeps_baseline_and_redetects() {
	let fx = Fixture::new();
	write_file(&fx.local, "c.txt", "base", 1_600_000_000);
	let mut session = fx.session(ConflictMode::Skip).await;
	session.run_cycle().await;
	let before = *session.store().baseline().get("c.txt").unwrap();

	write_file(&fx.local, "c.txt", "mine", 1_600_000_100);
	write_file(&fx.remote, "c.txt", "theirs!", 1_600_000_200);

	for _ in 0..2 {
		let report = session.run_cycle().await;
		assert_eq!(report.stats.conflicts, 1);
		assert_eq!(report.stats.skipped, 1);
		assert_eq!(report.stats.transfers(), 0);
		assert_eq!(session.store().baseline().get("c.txt"), Some(&before));
	}
	assert_eq!(read_file(&fx.local, "c.txt").as_deref(), Some("mine"));
	assert_eq!(read_file(&fx.remote, "c.txt").as_deref(), Some("theirs!"));
}

#[tokio::test]
async fn test_identical_edits_converge_without_transfer() {
	let fx = Fixture::new();
	write_file(&fx.local, "same.txt", "old", 1_600_000_000);
	let mut session = fx.session(ConflictMode::Ask).await;
	session.run_cycle().await;

	// Same bytes, different mtimes: digests match
	write_file(&fx.local, "same.txt", "new content", 1_600_000_300);
	write_file(&fx.remote, "same.txt", "new content", 1_600_000_400);
	let report = session.run_cycle().await;

	assert_eq!(report.stats.conflicts, 0);
	assert_eq!(report.stats.converged, 1);
	assert_eq!(report.stats.transfers(), 0);
	assert_eq!(
		session.store().baseline().get("same.txt"),
		Some(&BaselineEntry { local: st(11, 1_600_000_300), remote: st(11, 1_600_000_400) })
	);
	assert!(session.run_cycle().await.stats.is_quiet());
}

#[tokio::test]
async fn test_without_verification_identical_edits_conflict() {
	let fx = Fixture::new();
	write_file(&fx.local, "same.txt", "old", 1_600_000_000);
	let mut session = fx.builder(ConflictMode::Skip).verify_content(false).build().await.unwrap();
	session.run_cycle().await;

	write_file(&fx.local, "same.txt", "new", 1_600_000_300);
	write_file(&fx.remote, "same.txt", "new", 1_600_000_400);
	assert_eq!(session.run_cycle().await.stats.conflicts, 1);
}

#[tokio::test]
async fn test_listing_failure_leaves_baseline_and_retries() {
	let fx = Fixture::new();
	write_file(&fx.local, "keep.txt", "x", 1_600_000_000);
	let mut session = fx.session(ConflictMode::Ask).await;
	session.run_cycle().await;
	let baseline = session.store().baseline().entries.clone();

	let parked = fx.remote.with_extension("parked");
	std::fs::rename(&fx.remote, &parked).unwrap();
	write_file(&fx.local, "later.txt", "y", 1_600_000_100);

	let failed = session.run_cycle().await;
	assert_eq!(failed.outcome, CycleOutcome::SnapshotFailed);
	assert_eq!(session.store().baseline().entries, baseline);
	assert!(read_file(&fx.local, "keep.txt").is_some());
	assert!(fx.take_lines().iter().any(|l| l.starts_with("✗ Listing failed:")));

	std::fs::rename(&parked, &fx.remote).unwrap();
	let retried = session.run_cycle().await;
	assert_eq!(retried.outcome, CycleOutcome::Completed);
	assert_eq!(retried.stats.uploaded, 1);
	assert_eq!(read_file(&fx.remote, "later.txt").as_deref(), Some("y"));
}

#[tokio::test]
async fn test_excluded_paths_are_ignored() {
	let fx = Fixture::new();
	write_file(&fx.local, "node_modules/pkg/index.js", "x", 1_600_000_000);
	write_file(&fx.local, "src/debug.log", "x", 1_600_000_000);
	write_file(&fx.local, "src/main.rs", "fn main() {}", 1_600_000_000);
	write_file(&fx.local, ".DS_Store", "x", 1_600_000_000);

	let mut session = fx
		.builder(ConflictMode::Ask)
		.exclude(vec!["node_modules".to_string(), "*.log".to_string()])
		.build()
		.await
		.unwrap();
	let report = session.run_cycle().await;

	assert_eq!(report.stats.uploaded, 1);
	assert!(read_file(&fx.remote, "src/main.rs").is_some());
	assert!(!fx.remote.join("node_modules").exists());
	assert!(read_file(&fx.remote, "src/debug.log").is_none());
	assert!(read_file(&fx.remote, ".DS_Store").is_none());
}

#[tokio::test]
async fn test_baseline_survives_restart() {
	let fx = Fixture::new();
	write_file(&fx.local, "a.txt", "a", 1_600_000_000);
	write_file(&fx.remote, "b.txt", "b", 1_600_000_000);
	{
		let mut session = fx.session(ConflictMode::Ask).await;
		session.run_cycle().await;
	}

	// Local delete while the watcher was down must not be undone by a re-download
	std::fs::remove_file(fx.local.join("b.txt")).unwrap();
	let mut session = fx.session(ConflictMode::Ask).await;
	assert!(session.store().recovered_from().is_none());
	let report = session.run_cycle().await;

	assert_eq!(report.stats.deleted_remote, 1);
	assert!(read_file(&fx.remote, "b.txt").is_none());
}

#[tokio::test]
async fn test_preflight_creates_local_root() {
	let fx = Fixture::new();
	std::fs::remove_dir_all(&fx.local).unwrap();
	write_file(&fx.remote, "r.txt", "r", 1_600_000_000);

	let session = fx.session(ConflictMode::Ask).await;
	assert_eq!(session.preflight().await.unwrap(), 1);
	assert!(fx.local.is_dir());
}

#[tokio::test]
async fn test_preflight_fails_on_missing_remote() {
	let fx = Fixture::new();
	std::fs::remove_dir_all(&fx.remote).unwrap();
	let session = fx.session(ConflictMode::Ask).await;
	assert!(matches!(session.preflight().await, Err(sshcp::WatchError::Setup { .. })));
}

/// Local mirror that refuses to upload paths containing "bad"
struct FlakyTransport(LocalTransport);

#[async_trait]
impl Transport for FlakyTransport {
	fn describe(&self) -> String {
		"flaky".to_string()
	}

	async fn list_remote(&self, root: &str, matcher: Arc<PatternMatcher>) -> Result<Vec<Entry>, SnapshotError> {
		self.0.list_remote(root, matcher).await
	}

	async fn copy_to_remote(&self, local: &Path, remote: &str, entry: &Entry) -> Result<(), ActionError> {
		if entry.path.contains("bad") {
			return Err(ActionError::Remote { path: remote.to_string(), message: "disk full".to_string() });
		}
		self.0.copy_to_remote(local, remote, entry).await
	}

	async fn copy_to_local(&self, remote: &str, local: &Path, entry: &Entry) -> Result<(), ActionError> {
		self.0.copy_to_local(remote, local, entry).await
	}

	async fn delete_remote(&self, remote: &str) -> Result<(), ActionError> {
		self.0.delete_remote(remote).await
	}

	async fn remote_digest(&self, remote: &str) -> Result<String, ActionError> {
		self.0.remote_digest(remote).await
	}
}

#[tokio::test]
async fn test_failed_action_leaves_path_for_next_cycle() {
	let fx = Fixture::new();
	write_file(&fx.local, "good.txt", "g", 1_600_000_000);
	write_file(&fx.local, "bad.txt", "b", 1_600_000_000);

	let mut session = fx
		.builder_with(ConflictMode::Ask, Arc::new(FlakyTransport(LocalTransport::new())))
		.build()
		.await
		.unwrap();

	for _ in 0..2 {
		let report = session.run_cycle().await;
		assert_eq!(report.outcome, CycleOutcome::Completed);
		assert_eq!(report.stats.failed, 1);
		assert!(session.store().baseline().get("bad.txt").is_none());
		assert!(fx.take_lines().iter().any(|l| l.starts_with("✗ Failed: bad.txt")));
	}
	assert!(session.store().baseline().get("good.txt").is_some());
	assert!(read_file(&fx.remote, "good.txt").is_some());
}

#[tokio::test]
async fn test_parallel_apply_records_every_path() {
	let fx = Fixture::new();
	for i in 0..20 {
		write_file(&fx.local, &format!("batch/f{:02}.txt", i), &"x".repeat(i + 1), 1_600_000_000 + i as i64);
	}

	let mut session = fx.builder(ConflictMode::Ask).parallel(8).build().await.unwrap();
	let report = session.run_cycle().await;

	assert_eq!(report.stats.uploaded, 20);
	assert_eq!(session.store().baseline().len(), 20);
	assert_eq!(session.store().pending(), 0);
	assert!(session.run_cycle().await.stats.is_quiet());
}

// vim: ts=4
