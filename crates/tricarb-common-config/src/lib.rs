// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the tricarb daemon.
//!
//! This crate provides:
//! - Layered configuration from defaults, a TOML file and `TRICARB_*` environment variables
//! - [`StateStore`], the persisted key/value document holding runtime state
//!
//! # Usage
//!
//! ```ignore
//! use tricarb_common_config::load_config;
//!
//! let config = load_config()?;
//! println!("RPC listening on {}", config.socket_addr());
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;
pub mod store;

pub use error::ConfigError;
pub use layer::DaemonConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};
pub use store::StateStore;

use std::path::PathBuf;
use tracing::{debug, info};

/// Fully resolved daemon configuration.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
	pub http: HttpConfig,
	pub mesh: MeshConfig,
	pub paths: PathsConfig,
	pub logging: LoggingConfig,
}

impl DaemonConfig {
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}
}

/// Load configuration with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`TRICARB_*`)
/// 2. Config file (`/etc/tricarb/daemon.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<DaemonConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Same as [`load_config`] but reads the given file instead of the system one.
pub fn load_config_with_file(config_path: impl Into<PathBuf>) -> Result<DaemonConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<DaemonConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = DaemonConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Resolve a merged layer, applying defaults and validation.
pub fn finalize(layer: DaemonConfigLayer) -> Result<DaemonConfig, ConfigError> {
	let http = layer.http.unwrap_or_default().finalize();
	let mesh = layer.mesh.unwrap_or_default().finalize()?;
	let paths = layer.paths.unwrap_or_default().finalize()?;
	let logging = layer.logging.unwrap_or_default().finalize();

	if mesh.backend.trim().is_empty() {
		return Err(ConfigError::validation("mesh.backend must not be empty"));
	}

	info!(
		host = %http.host,
		port = http.port,
		backend = %mesh.backend,
		state_dir = %paths.state_dir.display(),
		tunnel = %paths.tunnel_name,
		legacy_peer_match = mesh.legacy_peer_match,
		"Daemon configuration loaded"
	);

	Ok(DaemonConfig {
		http,
		mesh,
		paths,
		logging,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	struct FixedSource(&'static str, Precedence);

	impl ConfigSource for FixedSource {
		fn name(&self) -> &'static str {
			"fixed"
		}

		fn precedence(&self) -> Precedence {
			self.1
		}

		fn load(&self) -> Result<DaemonConfigLayer, ConfigError> {
			Ok(toml::from_str(self.0).unwrap())
		}
	}

	#[test]
	fn test_higher_precedence_wins_regardless_of_order() {
		let config = load_from_sources(vec![
			Box::new(FixedSource(
				"[http]\nport = 7000\n[paths]\nstate_dir = \"/tmp/env\"",
				Precedence::Environment,
			)),
			Box::new(FixedSource(
				"[http]\nport = 6000\nhost = \"127.0.0.1\"",
				Precedence::ConfigFile,
			)),
		])
		.unwrap();
		assert_eq!(config.socket_addr(), "127.0.0.1:7000");
		assert_eq!(config.paths.state_dir, PathBuf::from("/tmp/env"));
	}

	#[test]
	fn test_empty_backend_rejected() {
		let result = load_from_sources(vec![Box::new(FixedSource(
			"[mesh]\nbackend = \" \"\n[paths]\nstate_dir = \"/tmp\"",
			Precedence::ConfigFile,
		))]);
		assert!(matches!(result, Err(ConfigError::Validation(_))));
	}

	#[test]
	fn test_load_config_with_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			"[mesh]\ncidr = \"10.9.0.0/16\"\nport = 15000\n[paths]\nstate_dir = \"/tmp/tricarb-test\""
		)
		.unwrap();
		let config = load_from_sources(vec![
			Box::new(DefaultsSource),
			Box::new(TomlSource::new(file.path())),
		])
		.unwrap();
		assert_eq!(config.mesh.cidr.as_deref(), Some("10.9.0.0/16"));
		assert_eq!(config.mesh.port, Some(15000));
		assert_eq!(
			config.paths.tunnel_config_file(),
			PathBuf::from("/tmp/tricarb-test/tricarb0.conf")
		);
	}
}
