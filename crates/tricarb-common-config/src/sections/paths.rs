// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! On-disk locations for daemon state and the generated tunnel config.

use serde::Deserialize;
use std::path::PathBuf;

use crate::error::ConfigError;

const DEFAULT_TUNNEL_NAME: &str = "tricarb0";
const STATE_FILE: &str = "state.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathsConfig {
	pub state_dir: PathBuf,
	/// WireGuard interface name; also the config file stem.
	pub tunnel_name: String,
}

impl PathsConfig {
	pub fn state_file(&self) -> PathBuf {
		self.state_dir.join(STATE_FILE)
	}

	/// `<state_dir>/<tunnel_name>.conf`, the path handed to `wg-quick`.
	pub fn tunnel_config_file(&self) -> PathBuf {
		self.state_dir.join(format!("{}.conf", self.tunnel_name))
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfigLayer {
	#[serde(default)]
	pub state_dir: Option<PathBuf>,
	#[serde(default)]
	pub tunnel_name: Option<String>,
}

impl PathsConfigLayer {
	pub fn merge(&mut self, other: PathsConfigLayer) {
		if other.state_dir.is_some() {
			self.state_dir = other.state_dir;
		}
		if other.tunnel_name.is_some() {
			self.tunnel_name = other.tunnel_name;
		}
	}

	pub fn finalize(self) -> Result<PathsConfig, ConfigError> {
		let state_dir = match self.state_dir {
			Some(dir) => dir,
			None => dirs::home_dir()
				.map(|h| h.join(".tricarb"))
				.ok_or(ConfigError::HomeDirNotFound)?,
		};

		let tunnel_name = self
			.tunnel_name
			.unwrap_or_else(|| DEFAULT_TUNNEL_NAME.to_string());
		// Linux caps interface names at 15 bytes.
		if tunnel_name.is_empty()
			|| tunnel_name.len() > 15
			|| !tunnel_name
				.chars()
				.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
		{
			return Err(ConfigError::invalid_value(
				"paths.tunnel_name",
				format!("'{tunnel_name}' is not a valid interface name"),
			));
		}

		Ok(PathsConfig {
			state_dir,
			tunnel_name,
		})
	}
}
