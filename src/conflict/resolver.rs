//! Conflict resolution logic

use std::collections::BTreeMap;

use super::{ConflictDecision, ConflictInfo, ConflictMode, ConflictPrompt, Newer, PromptChoice, Provenance, Resolution};
use crate::events::{WatchEvent, WatchEventSink};
use crate::logging::*;

/// Why resolution stopped before every conflict was decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStop {
	/// Operator aborted this cycle's conflicts; undecided paths wait for the next cycle
	Aborted,

	/// Operator asked to stop watching
	Quit,
}

/// Decisions reached for one cycle's conflicts
#[derive(Debug, Default)]
pub struct ResolveOutcome {
	pub decisions: BTreeMap<String, ConflictDecision>,
	pub stop: Option<ResolveStop>,
}

/// Resolves conflicts using the configured mode
pub struct ConflictResolver {
	mode: ConflictMode,
}

impl ConflictResolver {
	pub fn new(mode: ConflictMode) -> Self {
		ConflictResolver { mode }
	}

	pub fn mode(&self) -> ConflictMode {
		self.mode
	}

	/// Decide a conflict by policy alone
	///
	/// Returns None in `ask` mode, where the operator decides.
	pub fn decide(&self, conflict: &ConflictInfo) -> Option<ConflictDecision> {
		let resolution = match self.mode {
			ConflictMode::Ask => return None,
			ConflictMode::Local => Resolution::KeepLocal,
			ConflictMode::Remote => Resolution::KeepRemote,
			ConflictMode::Skip => Resolution::Skip,
			// Exact tie keeps local so the loop never stalls on ordering
			ConflictMode::Newer => match conflict.newer() {
				Newer::Remote => Resolution::KeepRemote,
				Newer::Local | Newer::Same => Resolution::KeepLocal,
			},
		};
		Some(ConflictDecision { resolution, provenance: Provenance::Policy(self.mode) })
	}

	/// Decide every conflict of a cycle, one at a time
	///
	/// In `ask` mode each conflict waits on the prompt before the next is shown.
	pub async fn resolve_all(
		&self,
		conflicts: &[ConflictInfo],
		prompt: &dyn ConflictPrompt,
		events: &dyn WatchEventSink,
	) -> ResolveOutcome {
		let mut outcome = ResolveOutcome::default();

		for (idx, conflict) in conflicts.iter().enumerate() {
			events.on_event(&WatchEvent::Conflict {
				path: conflict.path.clone(),
				local: conflict.local.clone(),
				remote: conflict.remote.clone(),
			});

			let decision = match self.decide(conflict) {
				Some(d) => d,
				None => {
					let choice = prompt.ask(conflict).await;
					let resolution = match choice {
						PromptChoice::KeepLocal => Resolution::KeepLocal,
						PromptChoice::KeepRemote => Resolution::KeepRemote,
						PromptChoice::Skip => Resolution::Skip,
						PromptChoice::Abort | PromptChoice::Quit => {
							let remaining = conflicts.len() - idx;
							info!("Conflict resolution stopped with {} undecided", remaining);
							events.on_event(&WatchEvent::ResolutionStopped {
								remaining,
								quit: choice == PromptChoice::Quit,
							});
							outcome.stop = Some(if choice == PromptChoice::Quit {
								ResolveStop::Quit
							} else {
								ResolveStop::Aborted
							});
							break;
						}
					};
					ConflictDecision { resolution, provenance: Provenance::Operator }
				}
			};

			debug!("{}: {:?}", conflict.path, decision);
			events.on_event(&WatchEvent::Resolved { path: conflict.path.clone(), decision });
			outcome.decisions.insert(conflict.path.clone(), decision);
		}

		outcome
	}
}


// vim: ts=4
