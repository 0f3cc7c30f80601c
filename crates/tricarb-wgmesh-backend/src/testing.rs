// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory tunnel driver for tests and for running a daemon without
//! touching host networking.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::driver::TunnelDriver;
use crate::error::{BackendError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
	Up(PathBuf),
	Down(PathBuf),
}

/// Records every call. A tunnel counts as up between `up` and `down` of a
/// config file whose stem is the tunnel name, the way wg-quick names links.
#[derive(Default)]
pub struct RecordingDriver {
	calls: Mutex<Vec<DriverCall>>,
	up: Mutex<HashSet<String>>,
	links: Mutex<HashSet<String>>,
	/// Config file contents captured on each successful `up`.
	configs: Mutex<Vec<String>>,
	fail_up: AtomicBool,
}

impl RecordingDriver {
	pub fn new() -> Self {
		Self::default()
	}

	/// Pretends a physical link called `name` exists.
	pub fn with_link(self, name: &str) -> Self {
		self.links
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.insert(name.to_string());
		self
	}

	/// Makes subsequent `up` calls fail until reset.
	pub fn set_fail_up(&self, fail: bool) {
		self.fail_up.store(fail, Ordering::SeqCst);
	}

	pub fn calls(&self) -> Vec<DriverCall> {
		self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
	}

	pub fn last_config(&self) -> Option<String> {
		self.configs
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.last()
			.cloned()
	}

	fn record(&self, call: DriverCall) {
		self.calls
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.push(call);
	}
}

fn link_name(config: &Path) -> String {
	config
		.file_stem()
		.map(|s| s.to_string_lossy().into_owned())
		.unwrap_or_default()
}

#[async_trait]
impl TunnelDriver for RecordingDriver {
	async fn up(&self, config: &Path) -> Result<()> {
		self.record(DriverCall::Up(config.to_path_buf()));
		if self.fail_up.load(Ordering::SeqCst) {
			return Err(BackendError::CommandFailed {
				cmd: "wg-quick",
				args: vec!["up".to_string(), config.display().to_string()],
				stderr: "simulated failure".to_string(),
			});
		}
		let name = link_name(config);
		let mut up = self.up.lock().unwrap_or_else(|e| e.into_inner());
		if up.contains(&name) {
			return Err(BackendError::CommandFailed {
				cmd: "wg-quick",
				args: vec!["up".to_string(), config.display().to_string()],
				stderr: format!("`{name}' already exists"),
			});
		}
		let content = std::fs::read_to_string(config)?;
		self.configs
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.push(content);
		up.insert(name);
		Ok(())
	}

	async fn down(&self, config: &Path) -> Result<()> {
		self.record(DriverCall::Down(config.to_path_buf()));
		let name = link_name(config);
		if !self
			.up
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.remove(&name)
		{
			return Err(BackendError::CommandFailed {
				cmd: "wg-quick",
				args: vec!["down".to_string(), config.display().to_string()],
				stderr: format!("`{name}' is not a WireGuard interface"),
			});
		}
		Ok(())
	}

	async fn is_up(&self, name: &str) -> bool {
		self.up
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.contains(name)
	}

	async fn link_exists(&self, name: &str) -> bool {
		let physical = self
			.links
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.contains(name);
		physical || self.is_up(name).await
	}
}
