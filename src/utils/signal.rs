//! Shutdown coordination and signal handling

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Cooperative stop flag shared by the watch loop, the executor and the prompt
///
/// Triggered by SIGINT/SIGTERM or by the operator choosing quit. Work in
/// flight is allowed to finish; new work checks the flag first.
#[derive(Clone, Default)]
pub struct Shutdown {
	inner: Arc<ShutdownInner>,
}

#[derive(Default)]
struct ShutdownInner {
	triggered: AtomicBool,
	notify: Notify,
}

impl Shutdown {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn trigger(&self) {
		if !self.inner.triggered.swap(true, Ordering::SeqCst) {
			self.inner.notify.notify_waiters();
		}
	}

	pub fn is_triggered(&self) -> bool {
		self.inner.triggered.load(Ordering::SeqCst)
	}

	/// Resolve once the stop has been requested
	pub async fn wait(&self) {
		let notified = self.inner.notify.notified();
		if self.is_triggered() {
			return;
		}
		notified.await;
	}
}

impl std::fmt::Debug for Shutdown {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Shutdown").field("triggered", &self.is_triggered()).finish()
	}
}

/// Route SIGINT/SIGTERM into `shutdown`
///
/// The first signal asks the loop to stop after in-flight transfers; a
/// second one exits immediately with 128 + signal number.
pub fn listen_for_signals(shutdown: Shutdown) {
	tokio::spawn(async move {
		use tokio::signal;

		let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(stream) => stream,
			Err(e) => {
				warn!("Failed to setup SIGTERM handler: {}. Process will not handle SIGTERM gracefully.", e);
				return;
			}
		};

		let mut sigint = match signal::unix::signal(signal::unix::SignalKind::interrupt()) {
			Ok(stream) => stream,
			Err(e) => {
				warn!("Failed to setup SIGINT handler: {}. Process will not handle SIGINT gracefully.", e);
				return;
			}
		};

		loop {
			let code = tokio::select! {
				_ = sigterm.recv() => 143, // 128 + SIGTERM(15)
				_ = sigint.recv() => 130,  // 128 + SIGINT(2)
			};

			if shutdown.is_triggered() {
				debug!("Second signal, exiting immediately");
				super::terminal::restore_terminal_state();
				std::process::exit(code);
			}
			debug!("Received signal, stopping after in-flight transfers");
			shutdown.trigger();
		}
	});
}


// vim: ts=4
