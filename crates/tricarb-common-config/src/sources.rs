// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, a TOML file and environment variables.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::DaemonConfigLayer;
use crate::sections::{
	HttpConfigLayer, LogFormat, LoggingConfigLayer, MeshConfigLayer, PathsConfigLayer,
};

pub const SYSTEM_CONFIG_PATH: &str = "/etc/tricarb/daemon.toml";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<DaemonConfigLayer, ConfigError>;
}

pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<DaemonConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(DaemonConfigLayer::default())
	}
}

pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new(SYSTEM_CONFIG_PATH)
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<DaemonConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(DaemonConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: DaemonConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: TRICARB_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<DaemonConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(DaemonConfigLayer {
			http: Some(load_http_from_env()?),
			mesh: Some(load_mesh_from_env()?),
			paths: Some(load_paths_from_env()),
			logging: Some(load_logging_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_u16(name: &str) -> Result<Option<u16>, ConfigError> {
	match env_var(name) {
		Some(v) => v
			.parse()
			.map(Some)
			.map_err(|_| ConfigError::invalid_value(name, format!("invalid u16 value '{v}'"))),
		None => Ok(None),
	}
}

fn env_u64(name: &str) -> Result<Option<u64>, ConfigError> {
	match env_var(name) {
		Some(v) => v
			.parse()
			.map(Some)
			.map_err(|_| ConfigError::invalid_value(name, format!("invalid u64 value '{v}'"))),
		None => Ok(None),
	}
}

fn load_http_from_env() -> Result<HttpConfigLayer, ConfigError> {
	Ok(HttpConfigLayer {
		host: env_var("TRICARB_HTTP_HOST"),
		port: env_u16("TRICARB_HTTP_PORT")?,
	})
}

fn load_mesh_from_env() -> Result<MeshConfigLayer, ConfigError> {
	Ok(MeshConfigLayer {
		cidr: env_var("TRICARB_MESH_CIDR"),
		port: env_u16("TRICARB_MESH_PORT")?,
		nic: env_var("TRICARB_MESH_NIC"),
		backend: env_var("TRICARB_MESH_BACKEND"),
		legacy_peer_match: env_bool("TRICARB_MESH_LEGACY_PEER_MATCH"),
		remote_timeout_ms: env_u64("TRICARB_MESH_REMOTE_TIMEOUT_MS")?,
	})
}

fn load_paths_from_env() -> PathsConfigLayer {
	PathsConfigLayer {
		state_dir: env_var("TRICARB_PATHS_STATE_DIR").map(PathBuf::from),
		tunnel_name: env_var("TRICARB_PATHS_TUNNEL_NAME"),
	}
}

fn load_logging_from_env() -> Result<LoggingConfigLayer, ConfigError> {
	let format = match env_var("TRICARB_LOGGING_FORMAT") {
		Some(v) => Some(LogFormat::parse(&v).ok_or_else(|| {
			ConfigError::invalid_value("TRICARB_LOGGING_FORMAT", format!("unknown format '{v}'"))
		})?),
		None => None,
	};
	Ok(LoggingConfigLayer {
		level: env_var("TRICARB_LOGGING_LEVEL"),
		format,
	})
}
