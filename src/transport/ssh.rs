//! SSH transport built on the system `ssh` client
//!
//! Every operation is one `ssh host <command>` subprocess. Authentication,
//! host keys and multiplexing are left to the user's ssh configuration.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{commit_temp, ensure_parent, shell_quote, temp_path, Transport};
use crate::config::SshConfig;
use crate::error::{ActionError, SnapshotError};
use crate::exclusion::{PatternMatcher, TEMP_SUFFIX};
use crate::logging::*;
use crate::snapshot::{parse_remote_listing, REMOTE_LIST_FORMAT};
use crate::types::Entry;

pub struct SshTransport {
	host: String,
	config: SshConfig,
}

impl SshTransport {
	pub fn new(host: impl Into<String>, config: SshConfig) -> Self {
		SshTransport { host: host.into(), config }
	}

	/// Build the ssh invocation for one remote shell command
	fn command(&self, remote_cmd: &str) -> Command {
		let mut parts = self.config.ssh_command.as_deref().unwrap_or("ssh").split_whitespace();
		let program = parts.next().unwrap_or("ssh");

		let mut cmd = Command::new(program);
		cmd.args(parts);
		cmd.arg("-o").arg(format!("ConnectTimeout={}", self.config.connection_timeout));
		if let Some(port) = self.config.port {
			cmd.arg("-p").arg(port.to_string());
		}
		cmd.args(&self.config.extra_args);
		cmd.arg(&self.host).arg(remote_cmd);
		cmd.kill_on_drop(true);
		cmd
	}

	fn command_timeout(&self) -> Duration {
		Duration::from_secs(self.config.command_timeout)
	}

	/// Run a short command and collect stdout
	async fn run(&self, remote_cmd: &str, path: &str) -> Result<Vec<u8>, ActionError> {
		debug!("ssh {}: {}", self.host, remote_cmd);
		let mut cmd = self.command(remote_cmd);
		cmd.stdin(Stdio::null());
		let output = tokio::time::timeout(self.command_timeout(), cmd.output())
			.await
			.map_err(|_| ActionError::Timeout { path: path.to_string() })?
			.map_err(|e| ActionError::Spawn { cmd: "ssh".to_string(), source: e })?;

		if !output.status.success() {
			return Err(ActionError::Remote {
				path: path.to_string(),
				message: stderr_message(&output.stderr, output.status.code()),
			});
		}
		Ok(output.stdout)
	}
}

fn stderr_message(stderr: &[u8], code: Option<i32>) -> String {
	let text = String::from_utf8_lossy(stderr).trim().to_string();
	match (text.is_empty(), code) {
		(false, _) => text,
		(true, Some(c)) => format!("exit status {}", c),
		(true, None) => "terminated by signal".to_string(),
	}
}

/// Parent directory of a remote path, if it has one
fn remote_parent(path: &str) -> Option<&str> {
	match path.rfind('/') {
		Some(0) => Some("/"),
		Some(idx) => Some(&path[..idx]),
		None => None,
	}
}

/// Listing command; `-H` follows a root that is itself a symlink
fn list_script(root: &str) -> String {
	format!(
		"find -H {} -mindepth 1 \\( -type f -o -type d \\) -printf '{}'",
		shell_quote(root),
		REMOTE_LIST_FORMAT
	)
}

/// Upload command reading the file from stdin
///
/// The temp file only replaces the destination once it holds exactly
/// `entry.size` bytes; on any failure it is removed.
fn upload_script(remote: &str, entry: &Entry) -> String {
	let tmp = shell_quote(&format!("{}{}", remote, TEMP_SUFFIX));
	let mkdir = match remote_parent(remote) {
		Some(dir) => format!("mkdir -p {} && ", shell_quote(dir)),
		None => String::new(),
	};
	format!(
		"{mkdir}cat > {tmp} && [ $(wc -c < {tmp}) -eq {size} ] && touch -d @{mtime} {tmp} && mv -f {tmp} {dest} || {{ rm -f {tmp}; exit 1; }}",
		mkdir = mkdir,
		tmp = tmp,
		size = entry.size,
		mtime = entry.mtime,
		dest = shell_quote(remote),
	)
}

#[async_trait]
impl Transport for SshTransport {
	fn describe(&self) -> String {
		self.host.clone()
	}

	async fn list_remote(
		&self,
		root: &str,
		matcher: Arc<PatternMatcher>,
	) -> Result<Vec<Entry>, SnapshotError> {
		let script = list_script(root);
		let stdout = self.run(&script, root).await.map_err(|e| match e {
			ActionError::Timeout { .. } => SnapshotError::Timeout { what: format!("{}:{}", self.host, root) },
			ActionError::Remote { message, .. } => {
				SnapshotError::RemoteList { host: self.host.clone(), message }
			}
			other => SnapshotError::RemoteList { host: self.host.clone(), message: other.to_string() },
		})?;

		parse_remote_listing(&stdout, &matcher)
			.map_err(|message| SnapshotError::RemoteList { host: self.host.clone(), message })
	}

	async fn copy_to_remote(&self, local: &Path, remote: &str, entry: &Entry) -> Result<(), ActionError> {
		let script = upload_script(remote, entry);
		let mut file = tokio::fs::File::open(local)
			.await
			.map_err(|e| ActionError::Io { path: local.display().to_string(), source: e })?;

		let mut child = self
			.command(&script)
			.stdin(Stdio::piped())
			.stdout(Stdio::null())
			.stderr(Stdio::piped())
			.spawn()
			.map_err(|e| ActionError::Spawn { cmd: "ssh".to_string(), source: e })?;

		let mut stdin = child
			.stdin
			.take()
			.ok_or_else(|| ActionError::Remote { path: remote.to_string(), message: "stdin unavailable".into() })?;
		let sent = tokio::io::copy(&mut file, &mut stdin).await;

		// Kill before stdin closes, so a short read never reaches the remote as EOF
		if !matches!(sent, Ok(n) if n == entry.size) {
			let _ = child.start_kill();
			drop(stdin);
			let _ = child.wait().await;
			return Err(match sent {
				Err(e) => ActionError::Io { path: local.display().to_string(), source: e },
				Ok(n) => ActionError::Io {
					path: local.display().to_string(),
					source: std::io::Error::new(
						std::io::ErrorKind::UnexpectedEof,
						format!("changed during upload ({} of {} bytes)", n, entry.size),
					),
				},
			});
		}
		let _ = stdin.shutdown().await;
		drop(stdin);

		let output = child
			.wait_with_output()
			.await
			.map_err(|e| ActionError::Spawn { cmd: "ssh".to_string(), source: e })?;
		if !output.status.success() {
			return Err(ActionError::Remote {
				path: remote.to_string(),
				message: stderr_message(&output.stderr, output.status.code()),
			});
		}
		debug!("Uploaded {} bytes to {}:{}", entry.size, self.host, remote);
		Ok(())
	}

	async fn copy_to_local(&self, remote: &str, local: &Path, entry: &Entry) -> Result<(), ActionError> {
		ensure_parent(local).await?;
		let tmp = temp_path(local);
		let io_err = |e| ActionError::Io { path: local.display().to_string(), source: e };

		let mut child = self
			.command(&format!("cat {}", shell_quote(remote)))
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.spawn()
			.map_err(|e| ActionError::Spawn { cmd: "ssh".to_string(), source: e })?;

		let mut stdout = child
			.stdout
			.take()
			.ok_or_else(|| ActionError::Remote { path: remote.to_string(), message: "stdout unavailable".into() })?;
		let mut file = tokio::fs::File::create(&tmp).await.map_err(io_err)?;
		let received = tokio::io::copy(&mut stdout, &mut file).await;
		let flushed = file.flush().await;
		drop(file);
		drop(stdout);

		let output = child
			.wait_with_output()
			.await
			.map_err(|e| ActionError::Spawn { cmd: "ssh".to_string(), source: e })?;

		let failure = if !output.status.success() {
			Some(ActionError::Remote {
				path: remote.to_string(),
				message: stderr_message(&output.stderr, output.status.code()),
			})
		} else {
			match received.and_then(|n| flushed.map(|_| n)) {
				Err(e) => Some(io_err(e)),
				Ok(n) if n != entry.size => Some(ActionError::Remote {
					path: remote.to_string(),
					message: format!("changed during download ({} of {} bytes)", n, entry.size),
				}),
				Ok(_) => None,
			}
		};
		if let Some(err) = failure {
			let _ = tokio::fs::remove_file(&tmp).await;
			return Err(err);
		}

		commit_temp(&tmp, local, entry.mtime).await
	}

	async fn delete_remote(&self, remote: &str) -> Result<(), ActionError> {
		self.run(&format!("rm -f {}", shell_quote(remote)), remote).await.map(|_| ())
	}

	async fn remote_digest(&self, remote: &str) -> Result<String, ActionError> {
		let stdout = self.run(&format!("sha256sum {}", shell_quote(remote)), remote).await?;
		let text = String::from_utf8_lossy(&stdout);
		match text.split_whitespace().next() {
			Some(digest) if digest.len() == 64 => Ok(digest.to_lowercase()),
			_ => Err(ActionError::Remote {
				path: remote.to_string(),
				message: format!("unexpected sha256sum output: {}", text.trim()),
			}),
		}
	}
}


// vim: ts=4
