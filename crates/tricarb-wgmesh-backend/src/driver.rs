// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Host tooling used to bring tunnels up and down.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, trace, warn};

use crate::error::{BackendError, Result};

/// Trait abstracting host networking commands for testability.
#[async_trait]
pub trait TunnelDriver: Send + Sync {
	/// Bring up the tunnel described by the wg-quick file at `config`.
	async fn up(&self, config: &Path) -> Result<()>;

	async fn down(&self, config: &Path) -> Result<()>;

	/// Whether a network link called `name` currently exists and is up.
	async fn is_up(&self, name: &str) -> bool;

	/// Whether a network link called `name` exists on this host.
	async fn link_exists(&self, name: &str) -> bool;
}

/// Driver backed by `wg-quick` and `ip`.
pub struct WgQuickDriver;

impl WgQuickDriver {
	pub fn new() -> Self {
		Self
	}
}

impl Default for WgQuickDriver {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl TunnelDriver for WgQuickDriver {
	async fn up(&self, config: &Path) -> Result<()> {
		run("wg-quick", &["up", &config.display().to_string()]).await?;
		debug!(config = %config.display(), "tunnel up");
		Ok(())
	}

	async fn down(&self, config: &Path) -> Result<()> {
		run("wg-quick", &["down", &config.display().to_string()]).await?;
		debug!(config = %config.display(), "tunnel down");
		Ok(())
	}

	async fn is_up(&self, name: &str) -> bool {
		match run("ip", &["-o", "link", "show", "dev", name]).await {
			Ok(line) => link_line_is_up(&line),
			Err(_) => false,
		}
	}

	async fn link_exists(&self, name: &str) -> bool {
		run("ip", &["link", "show", "dev", name]).await.is_ok()
	}
}

/// Interprets one line of `ip -o link show`. WireGuard links report
/// `state UNKNOWN`, so the `UP` flag is what counts.
fn link_line_is_up(line: &str) -> bool {
	line
		.split_once('<')
		.and_then(|(_, rest)| rest.split_once('>'))
		.map(|(flags, _)| flags.split(',').any(|flag| flag == "UP"))
		.unwrap_or(false)
}

async fn run(cmd: &'static str, args: &[&str]) -> Result<String> {
	trace!(cmd = %format!("{cmd} {}", args.join(" ")), "running command");

	let output = Command::new(cmd).args(args).output().await.map_err(|e| {
		if e.kind() == std::io::ErrorKind::NotFound {
			warn!(cmd, "command not found in PATH");
			BackendError::ToolNotInstalled(cmd)
		} else {
			BackendError::Io(e)
		}
	})?;

	if output.status.success() {
		Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
	} else {
		let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
		Err(BackendError::CommandFailed {
			cmd,
			args: args.iter().map(|s| s.to_string()).collect(),
			stderr,
		})
	}
}
