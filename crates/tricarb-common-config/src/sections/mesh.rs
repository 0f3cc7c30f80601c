// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Mesh defaults: block, listen port, physical interface and backend choice.
//!
//! The CIDR, port and interface here are only the operator's defaults. Values
//! set at runtime through the daemon's config calls are persisted in the state
//! store and take priority.

use serde::Deserialize;
use std::ops::Range;

use crate::error::ConfigError;

/// Accepted and generated WireGuard listen ports.
pub const PORT_RANGE: Range<u16> = 10000..20000;

const DEFAULT_BACKEND: &str = "wireguard";
const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshConfig {
	pub cidr: Option<String>,
	pub port: Option<u16>,
	pub nic: Option<String>,
	pub backend: String,
	/// Remove peers by key fragment instead of the full key.
	pub legacy_peer_match: bool,
	/// Budget for calls to the counterpart daemon.
	pub remote_timeout_ms: u64,
}

impl Default for MeshConfig {
	fn default() -> Self {
		Self {
			cidr: None,
			port: None,
			nic: None,
			backend: DEFAULT_BACKEND.to_string(),
			legacy_peer_match: false,
			remote_timeout_ms: DEFAULT_REMOTE_TIMEOUT_MS,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeshConfigLayer {
	#[serde(default)]
	pub cidr: Option<String>,
	#[serde(default)]
	pub port: Option<u16>,
	#[serde(default)]
	pub nic: Option<String>,
	#[serde(default)]
	pub backend: Option<String>,
	#[serde(default)]
	pub legacy_peer_match: Option<bool>,
	#[serde(default)]
	pub remote_timeout_ms: Option<u64>,
}

impl MeshConfigLayer {
	pub fn merge(&mut self, other: MeshConfigLayer) {
		if other.cidr.is_some() {
			self.cidr = other.cidr;
		}
		if other.port.is_some() {
			self.port = other.port;
		}
		if other.nic.is_some() {
			self.nic = other.nic;
		}
		if other.backend.is_some() {
			self.backend = other.backend;
		}
		if other.legacy_peer_match.is_some() {
			self.legacy_peer_match = other.legacy_peer_match;
		}
		if other.remote_timeout_ms.is_some() {
			self.remote_timeout_ms = other.remote_timeout_ms;
		}
	}

	pub fn finalize(self) -> Result<MeshConfig, ConfigError> {
		if let Some(port) = self.port {
			if !PORT_RANGE.contains(&port) {
				return Err(ConfigError::invalid_value(
					"mesh.port",
					format!(
						"{port} outside {}-{}",
						PORT_RANGE.start,
						PORT_RANGE.end - 1
					),
				));
			}
		}

		let remote_timeout_ms = self.remote_timeout_ms.unwrap_or(DEFAULT_REMOTE_TIMEOUT_MS);
		if remote_timeout_ms == 0 {
			return Err(ConfigError::invalid_value(
				"mesh.remote_timeout_ms",
				"must be greater than zero",
			));
		}

		Ok(MeshConfig {
			cidr: self.cidr.filter(|s| !s.trim().is_empty()),
			port: self.port,
			nic: self.nic.filter(|s| !s.trim().is_empty()),
			backend: self
				.backend
				.unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
			legacy_peer_match: self.legacy_peer_match.unwrap_or(false),
			remote_timeout_ms,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = MeshConfigLayer::default().finalize().unwrap();
		assert_eq!(config, MeshConfig::default());
		assert_eq!(config.backend, "wireguard");
		assert_eq!(config.remote_timeout_ms, 1000);
		assert!(!config.legacy_peer_match);
	}

	#[test]
	fn test_port_out_of_range_rejected() {
		for port in [9999u16, 20000, 50101] {
			let layer = MeshConfigLayer {
				port: Some(port),
				..Default::default()
			};
			assert!(matches!(
				layer.finalize(),
				Err(ConfigError::InvalidValue { .. })
			));
		}
	}

	#[test]
	fn test_blank_overrides_are_dropped() {
		let layer = MeshConfigLayer {
			cidr: Some("  ".to_string()),
			nic: Some(String::new()),
			port: Some(10000),
			..Default::default()
		};
		let config = layer.finalize().unwrap();
		assert!(config.cidr.is_none());
		assert!(config.nic.is_none());
		assert_eq!(config.port, Some(10000));
	}

	#[test]
	fn test_zero_timeout_rejected() {
		let layer = MeshConfigLayer {
			remote_timeout_ms: Some(0),
			..Default::default()
		};
		assert!(layer.finalize().is_err());
	}
}
