use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sshcp::bookmarks::{bookmarks_file, expand_bookmark};
use sshcp::config::{parse_interval, Config};
use sshcp::conflict::ConflictMode;
use sshcp::error::{ConfigError, WatchError};
use sshcp::logging::init_tracing;
use sshcp::transport::{split_host, SshTransport};
use sshcp::types::WatchPair;
use sshcp::utils::{listen_for_signals, restore_terminal_state, Shutdown};
use sshcp::watch::WatchBuilder;

fn build_cli() -> Command {
	Command::new("sshcp")
		.version(env!("CARGO_PKG_VERSION"))
		.about("SSH file copy helper")
		.subcommand_required(true)
		.subcommand(
			Command::new("watch")
				.about("Keep a local directory and a remote directory in sync")
				.arg(Arg::new("local").required(true).help("Local directory"))
				.arg(
					Arg::new("remote")
						.required(true)
						.help("Remote directory: host:/path, @bookmark[/rest] or a path on the selected server"),
				)
				.arg(
					Arg::new("interval")
						.short('i')
						.long("interval")
						.value_name("SECONDS")
						.help("Polling interval (default 5)"),
				)
				.arg(
					Arg::new("on-conflict")
						.short('c')
						.long("on-conflict")
						.value_name("MODE")
						.help("Conflict policy: ask, local, remote, newer, skip"),
				)
				.arg(
					Arg::new("exclude")
						.short('e')
						.long("exclude")
						.value_name("PATTERN")
						.action(ArgAction::Append)
						.help("Glob pattern to exclude (repeatable)"),
				)
				.arg(Arg::new("host").long("host").value_name("HOST").help("Server to use instead of the selected one"))
				.arg(
					Arg::new("parallel")
						.short('j')
						.long("parallel")
						.value_name("N")
						.value_parser(value_parser!(usize))
						.help("Concurrent transfers (default 4)"),
				)
				.arg(
					Arg::new("state-dir")
						.long("state-dir")
						.value_name("DIR")
						.value_parser(value_parser!(PathBuf))
						.help("Where baselines are stored"),
				)
				.arg(
					Arg::new("no-verify")
						.long("no-verify")
						.action(ArgAction::SetTrue)
						.help("Do not compare content of same-size conflicts"),
				),
		)
}

/// Overlay command-line flags on the loaded configuration
fn apply_cli(config: &mut Config, matches: &ArgMatches) -> Result<(), ConfigError> {
	if let Some(v) = matches.get_one::<String>("interval") {
		config.interval_secs = parse_interval(v)?;
	}
	if let Some(v) = matches.get_one::<String>("on-conflict") {
		config.on_conflict = v.parse::<ConflictMode>()?;
	}
	if let Some(patterns) = matches.get_many::<String>("exclude") {
		config.exclude_patterns.extend(patterns.cloned());
	}
	if let Some(host) = matches.get_one::<String>("host") {
		config.selected_host = Some(host.clone());
	}
	if let Some(n) = matches.get_one::<usize>("parallel") {
		config.parallel_transfers = *n;
	}
	if let Some(dir) = matches.get_one::<PathBuf>("state-dir") {
		config.state_dir = dir.clone();
	}
	if matches.get_flag("no-verify") {
		config.verify_content = false;
	}
	config.validate()
}

/// Work out host and path for the remote argument
///
/// `host:path` names the host explicitly; otherwise bookmarks are expanded
/// and the selected server is used.
fn resolve_remote(
	arg: &str,
	selected_host: Option<&str>,
	bookmarks: &Path,
) -> Result<(String, String), ConfigError> {
	let (host, path) = match split_host(arg) {
		Some((host, path)) => (host, expand_bookmark(&path, bookmarks)),
		None => {
			let host = selected_host.filter(|h| !h.is_empty()).ok_or(ConfigError::NoServerSelected)?;
			(host.to_string(), expand_bookmark(arg, bookmarks))
		}
	};
	let path = if path.is_empty() { ".".to_string() } else { path };
	Ok((host, path))
}

async fn run_watch(matches: &ArgMatches) -> Result<(), WatchError> {
	let mut config = Config::load()?;
	apply_cli(&mut config, matches)?;
	init_tracing(&config.log_level);

	let local = matches.get_one::<String>("local").map(PathBuf::from).unwrap_or_default();
	let local = if local.is_absolute() { local } else { std::env::current_dir()?.join(local) };
	let remote_arg = matches.get_one::<String>("remote").map(String::as_str).unwrap_or_default();
	let (host, remote_path) = resolve_remote(remote_arg, config.selected_host.as_deref(), &bookmarks_file())?;

	let pair = WatchPair::new(local, remote_path);
	let remote_spec = format!("{}:{}", host, pair.remote_root);
	let shutdown = Shutdown::new();
	listen_for_signals(shutdown.clone());

	println!("Watching {} <-> {}", pair.local_root.display(), remote_spec);
	println!(
		"  every {}s, on conflict: {} ({})",
		config.interval_secs,
		config.on_conflict,
		config.on_conflict.description()
	);
	if !config.exclude_patterns.is_empty() {
		println!("  excluding: {}", config.exclude_patterns.join(", "));
	}

	let mut session = WatchBuilder::from_config(pair, &config)
		.transport(Arc::new(SshTransport::new(host, config.ssh.clone())))
		.remote_spec(remote_spec)
		.shutdown(shutdown)
		.build()
		.await?;
	if let Some(err) = session.store().recovered_from() {
		println!("  baseline reset: {}", err);
	}

	let remote_files = session.preflight().await?;
	println!("  {} files on remote. Press Ctrl+C to stop.", remote_files);

	let summary = session.run().await?;
	if config.on_conflict == ConflictMode::Ask {
		restore_terminal_state();
	}
	println!(
		"Stopped after {} cycles: {} transfers, {} conflicts, {} failures",
		summary.cycles, summary.transfers, summary.conflicts, summary.failed
	);
	Ok(())
}

#[tokio::main]
async fn main() {
	let matches = build_cli().get_matches();

	let code = match matches.subcommand() {
		Some(("watch", m)) => match run_watch(m).await {
			Ok(()) => 0,
			Err(e) => {
				eprintln!("Error: {}", e);
				1
			}
		},
		_ => 2,
	};
	// A prompt still blocked on stdin would otherwise keep the runtime alive
	std::process::exit(code);
}


// vim: ts=4
