//! Watch loop controller
//!
//! One cycle polls both sides, diffs them against the baseline, resolves
//! conflicts and applies the result. Cycles repeat at a fixed interval until
//! a signal or the operator stops the loop.
//!
//! ```rust,ignore
//! use sshcp::watch::WatchBuilder;
//!
//! let mut session = WatchBuilder::new(WatchPair::new("./site", "/var/www"))
//!     .transport(Arc::new(SshTransport::new("web", SshConfig::default())))
//!     .on_conflict(ConflictMode::Newer)
//!     .build()
//!     .await?;
//! session.preflight().await?;
//! session.run().await?;
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{config_dir, Config};
use crate::conflict::{ConflictInfo, ConflictMode, ConflictPrompt, ConflictResolver, NoPrompt, Resolution, ResolveStop};
use crate::detect::{detect_changes, verify_conflicts};
use crate::error::{ConfigError, WatchError};
use crate::events::{ConsoleEvents, CycleStats, WatchEvent, WatchEventSink, WatchPhase};
use crate::exclusion::PatternMatcher;
use crate::executor::{plan, Executor};
use crate::logging::*;
use crate::prompt::TerminalPrompt;
use crate::state::StateStore;
use crate::transport::Transport;
use crate::types::{Snapshot, WatchPair};
use crate::utils::Shutdown;

/// How a single cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
	Completed,

	/// A side could not be listed; nothing was applied
	SnapshotFailed,

	/// Stop requested; the cycle ended early
	Cancelled,

	/// Operator chose quit at a conflict prompt
	Quit,
}

#[derive(Debug, Clone, Copy)]
pub struct CycleReport {
	pub outcome: CycleOutcome,
	pub stats: CycleStats,
}

/// Totals over a whole session
#[derive(Debug, Default, Clone, Copy)]
pub struct WatchSummary {
	pub cycles: u64,
	pub transfers: usize,
	pub conflicts: usize,
	pub failed: usize,
}

impl WatchSummary {
	fn add(&mut self, report: &CycleReport) {
		self.cycles += 1;
		self.transfers += report.stats.transfers();
		self.conflicts += report.stats.conflicts;
		self.failed += report.stats.failed;
	}
}

/// Builder for a watch session
pub struct WatchBuilder {
	pair: WatchPair,
	remote_spec: Option<String>,
	transport: Option<Arc<dyn Transport>>,
	mode: ConflictMode,
	exclude: Vec<String>,
	interval: Duration,
	parallel: usize,
	verify_content: bool,
	state_dir: Option<PathBuf>,
	prompt: Option<Arc<dyn ConflictPrompt>>,
	events: Option<Arc<dyn WatchEventSink>>,
	shutdown: Shutdown,
}

impl WatchBuilder {
	pub fn new(pair: WatchPair) -> Self {
		WatchBuilder {
			pair,
			remote_spec: None,
			transport: None,
			mode: ConflictMode::Ask,
			exclude: vec![],
			interval: Duration::from_secs(5),
			parallel: 4,
			verify_content: true,
			state_dir: None,
			prompt: None,
			events: None,
			shutdown: Shutdown::new(),
		}
	}

	/// Start from a loaded configuration
	pub fn from_config(pair: WatchPair, config: &Config) -> Self {
		WatchBuilder::new(pair)
			.on_conflict(config.on_conflict)
			.exclude(config.exclude_patterns.clone())
			.interval(config.interval())
			.parallel(config.parallel_transfers)
			.verify_content(config.verify_content)
			.state_dir(config.state_dir.clone())
	}

	pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
		self.transport = Some(transport);
		self
	}

	/// Identity of the remote side used to key the baseline (`host:/path`)
	pub fn remote_spec(mut self, spec: impl Into<String>) -> Self {
		self.remote_spec = Some(spec.into());
		self
	}

	pub fn on_conflict(mut self, mode: ConflictMode) -> Self {
		self.mode = mode;
		self
	}

	pub fn exclude(mut self, patterns: Vec<String>) -> Self {
		self.exclude = patterns;
		self
	}

	pub fn interval(mut self, interval: Duration) -> Self {
		self.interval = interval;
		self
	}

	pub fn parallel(mut self, parallel: usize) -> Self {
		self.parallel = parallel;
		self
	}

	pub fn verify_content(mut self, verify: bool) -> Self {
		self.verify_content = verify;
		self
	}

	pub fn state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.state_dir = Some(dir.into());
		self
	}

	pub fn prompt(mut self, prompt: Arc<dyn ConflictPrompt>) -> Self {
		self.prompt = Some(prompt);
		self
	}

	pub fn events(mut self, events: Arc<dyn WatchEventSink>) -> Self {
		self.events = Some(events);
		self
	}

	pub fn shutdown(mut self, shutdown: Shutdown) -> Self {
		self.shutdown = shutdown;
		self
	}

	/// Compile exclusions and load the baseline
	pub async fn build(self) -> Result<WatchSession, WatchError> {
		let transport = self
			.transport
			.ok_or_else(|| WatchError::Setup { message: "no transport configured".to_string() })?;
		if self.interval.is_zero() {
			return Err(ConfigError::InvalidInterval { value: "0".to_string() }.into());
		}
		if self.parallel == 0 || self.parallel > 64 {
			return Err(ConfigError::InvalidParallelism { value: self.parallel }.into());
		}

		let matcher = Arc::new(PatternMatcher::new(&self.exclude).map_err(ConfigError::from)?);
		let remote_spec = self
			.remote_spec
			.unwrap_or_else(|| format!("{}:{}", transport.describe(), self.pair.remote_root));
		let state_dir = self.state_dir.unwrap_or_else(|| config_dir().join("watch"));
		let store = StateStore::load(&state_dir, &self.pair, &remote_spec).await;

		let prompt: Arc<dyn ConflictPrompt> = match self.prompt {
			Some(p) => p,
			None if self.mode.is_automatic() => Arc::new(NoPrompt),
			None => Arc::new(TerminalPrompt::new(self.shutdown.clone())),
		};
		let events = self.events.unwrap_or_else(|| Arc::new(ConsoleEvents));
		let executor =
			Executor::new(transport.clone(), self.pair.clone(), self.parallel, self.shutdown.clone());

		Ok(WatchSession {
			pair: self.pair,
			remote_spec,
			transport,
			matcher,
			resolver: ConflictResolver::new(self.mode),
			prompt,
			events,
			executor,
			store,
			shutdown: self.shutdown,
			interval: self.interval,
			verify_content: self.verify_content,
			phase: WatchPhase::Idle,
			cycle: 0,
		})
	}
}

/// A running watch over one local/remote pair
pub struct WatchSession {
	pair: WatchPair,
	remote_spec: String,
	transport: Arc<dyn Transport>,
	matcher: Arc<PatternMatcher>,
	resolver: ConflictResolver,
	prompt: Arc<dyn ConflictPrompt>,
	events: Arc<dyn WatchEventSink>,
	executor: Executor,
	store: StateStore,
	shutdown: Shutdown,
	interval: Duration,
	verify_content: bool,
	phase: WatchPhase,
	cycle: u64,
}

impl WatchSession {
	pub fn pair(&self) -> &WatchPair {
		&self.pair
	}

	pub fn remote_spec(&self) -> &str {
		&self.remote_spec
	}

	pub fn phase(&self) -> WatchPhase {
		self.phase
	}

	pub fn store(&self) -> &StateStore {
		&self.store
	}

	pub fn shutdown_handle(&self) -> Shutdown {
		self.shutdown.clone()
	}

	fn set_phase(&mut self, phase: WatchPhase) {
		if self.phase != phase {
			debug!("Cycle {}: {} -> {}", self.cycle, self.phase, phase);
			self.phase = phase;
			self.events.on_event(&WatchEvent::PhaseChanged(phase));
		}
	}

	/// Check both roots before the first cycle
	///
	/// Creates the local root if missing and lists the remote once; the
	/// remote file count is returned for the banner.
	pub async fn preflight(&self) -> Result<usize, WatchError> {
		tokio::fs::create_dir_all(&self.pair.local_root).await.map_err(|e| WatchError::Setup {
			message: format!("cannot create {}: {}", self.pair.local_root.display(), e),
		})?;

		let remote = self
			.transport
			.list_remote(&self.pair.remote_root, self.matcher.clone())
			.await
			.map_err(|e| WatchError::Setup { message: e.to_string() })?;
		info!("Preflight ok: {} files on {}", remote.len(), self.remote_spec);
		Ok(remote.len())
	}

	fn finish(&mut self, outcome: CycleOutcome, stats: CycleStats) -> CycleReport {
		self.set_phase(WatchPhase::Idle);
		if outcome == CycleOutcome::Completed {
			self.events.on_event(&WatchEvent::CycleFinished(stats));
		}
		CycleReport { outcome, stats }
	}

	/// One poll → diff → resolve → apply pass
	pub async fn run_cycle(&mut self) -> CycleReport {
		self.cycle += 1;
		let mut stats = CycleStats { cycle: self.cycle, ..Default::default() };

		if self.shutdown.is_triggered() {
			return self.finish(CycleOutcome::Cancelled, stats);
		}

		self.set_phase(WatchPhase::Polling);
		let (local, remote) = tokio::join!(
			self.transport.list_local(&self.pair.local_root, self.matcher.clone()),
			self.transport.list_remote(&self.pair.remote_root, self.matcher.clone()),
		);
		let (local, remote) = match (local, remote) {
			(Ok(l), Ok(r)) => (Snapshot::from_entries(l), Snapshot::from_entries(r)),
			(Err(e), _) | (_, Err(e)) => {
				warn!("Cycle {} abandoned: {}", self.cycle, e);
				self.events.on_event(&WatchEvent::ListingFailed { message: e.to_string() });
				return self.finish(CycleOutcome::SnapshotFailed, stats);
			}
		};

		if self.shutdown.is_triggered() {
			return self.finish(CycleOutcome::Cancelled, stats);
		}

		self.set_phase(WatchPhase::Diffing);
		let mut records = detect_changes(&local, &remote, self.store.baseline());
		if self.verify_content {
			let converged = verify_conflicts(&mut records, &self.transport, &self.pair).await;
			if converged > 0 {
				debug!("{} conflicts had identical content", converged);
			}
		}

		let conflicts: Vec<ConflictInfo> = records
			.values()
			.filter(|r| r.change.is_conflict())
			.map(|r| ConflictInfo { path: r.path.clone(), local: r.local.clone(), remote: r.remote.clone() })
			.collect();
		stats.conflicts = conflicts.len();

		let mut decisions = BTreeMap::new();
		if !conflicts.is_empty() {
			self.set_phase(WatchPhase::Resolving);
			let outcome = self.resolver.resolve_all(&conflicts, self.prompt.as_ref(), self.events.as_ref()).await;
			if outcome.stop == Some(ResolveStop::Quit) {
				self.shutdown.trigger();
				return self.finish(CycleOutcome::Quit, stats);
			}
			stats.skipped = outcome.decisions.values().filter(|d| d.resolution == Resolution::Skip).count();
			decisions = outcome.decisions;
		}

		self.set_phase(WatchPhase::Applying);
		let actions = plan(&records, &decisions);
		let report = self.executor.apply(actions, &mut self.store, self.events.as_ref()).await;
		stats.uploaded = report.uploaded;
		stats.downloaded = report.downloaded;
		stats.deleted_remote = report.deleted_remote;
		stats.deleted_local = report.deleted_local;
		stats.converged = report.converged;
		stats.failed = report.failed;
		stats.cancelled = report.cancelled;

		if self.store.pending() > 0 {
			if let Err(e) = self.store.persist().await {
				warn!("Baseline compaction failed, journal kept: {}", e);
			}
		}

		let outcome = if report.cancelled > 0 { CycleOutcome::Cancelled } else { CycleOutcome::Completed };
		self.finish(outcome, stats)
	}

	/// Run cycles until stopped, then persist the baseline
	pub async fn run(&mut self) -> Result<WatchSummary, WatchError> {
		let mut summary = WatchSummary::default();

		loop {
			if self.shutdown.is_triggered() {
				break;
			}

			let report = self.run_cycle().await;
			summary.add(&report);
			if report.outcome == CycleOutcome::Quit || self.shutdown.is_triggered() {
				break;
			}

			tokio::select! {
				_ = tokio::time::sleep(self.interval) => {}
				_ = self.shutdown.wait() => break,
			}
		}

		self.events.on_event(&WatchEvent::Stopping);
		self.store.persist().await?;
		info!(
			"Watch stopped after {} cycles ({} transfers, {} conflicts, {} failures)",
			summary.cycles, summary.transfers, summary.conflicts, summary.failed
		);
		Ok(summary)
	}
}

// vim: ts=4
