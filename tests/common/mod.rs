//! Shared fixtures: two temp directories mirrored through LocalTransport

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use sshcp::conflict::{ConflictInfo, ConflictMode, ConflictPrompt, PromptChoice};
use sshcp::events::WatchEvent;
use sshcp::{LocalTransport, Transport, WatchBuilder, WatchPair, WatchSession};

pub struct Fixture {
	_dir: TempDir,
	pub local: PathBuf,
	pub remote: PathBuf,
	pub state: PathBuf,
	pub events: Arc<Mutex<Vec<WatchEvent>>>,
}

impl Fixture {
	pub fn new() -> Self {
		let dir = TempDir::new().unwrap();
		let local = dir.path().join("local");
		let remote = dir.path().join("remote");
		let state = dir.path().join("state");
		std::fs::create_dir_all(&local).unwrap();
		std::fs::create_dir_all(&remote).unwrap();
		Fixture { _dir: dir, local, remote, state, events: Arc::new(Mutex::new(Vec::new())) }
	}

	pub fn pair(&self) -> WatchPair {
		WatchPair::new(self.local.clone(), self.remote.to_str().unwrap())
	}

	pub fn builder(&self, mode: ConflictMode) -> WatchBuilder {
		self.builder_with(mode, Arc::new(LocalTransport::new()))
	}

	pub fn builder_with(&self, mode: ConflictMode, transport: Arc<dyn Transport>) -> WatchBuilder {
		let log = self.events.clone();
		WatchBuilder::new(self.pair())
			.transport(transport)
			.remote_spec(format!("test:{}", self.remote.display()))
			.on_conflict(mode)
			.state_dir(self.state.clone())
			.events(Arc::new(move |e: &WatchEvent| log.lock().unwrap().push(e.clone())))
	}

	pub async fn session(&self, mode: ConflictMode) -> WatchSession {
		self.builder(mode).build().await.unwrap()
	}

	/// Console lines emitted so far, then cleared
	pub fn take_lines(&self) -> Vec<String> {
		let mut events = self.events.lock().unwrap();
		let lines = events.iter().filter_map(sshcp::events::format_event).collect();
		events.clear();
		lines
	}
}

pub fn write_file(root: &Path, rel: &str, content: &str, mtime: i64) {
	let path = root.join(rel);
	std::fs::create_dir_all(path.parent().unwrap()).unwrap();
	std::fs::write(&path, content).unwrap();
	filetime::set_file_mtime(&path, filetime::FileTime::from_unix_time(mtime, 0)).unwrap();
}

pub fn read_file(root: &Path, rel: &str) -> Option<String> {
	std::fs::read_to_string(root.join(rel)).ok()
}

pub fn mtime_of(root: &Path, rel: &str) -> i64 {
	let meta = std::fs::metadata(root.join(rel)).unwrap();
	filetime::FileTime::from_last_modification_time(&meta).unix_seconds()
}

/// Prompt answering from a fixed script; skips once the script runs out
pub struct ScriptedPrompt {
	answers: Mutex<VecDeque<PromptChoice>>,
	pub asked: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
	pub fn new(answers: Vec<PromptChoice>) -> Self {
		ScriptedPrompt { answers: Mutex::new(answers.into()), asked: Mutex::new(Vec::new()) }
	}
}

#[async_trait]
impl ConflictPrompt for ScriptedPrompt {
	async fn ask(&self, conflict: &ConflictInfo) -> PromptChoice {
		self.asked.lock().unwrap().push(conflict.path.clone());
		self.answers.lock().unwrap().pop_front().unwrap_or(PromptChoice::Skip)
	}
}

// vim: ts=4
