// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::Deserialize;

use crate::sections::{HttpConfigLayer, LoggingConfigLayer, MeshConfigLayer, PathsConfigLayer};

/// Partial daemon configuration as read from a single source.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DaemonConfigLayer {
	#[serde(default)]
	pub http: Option<HttpConfigLayer>,
	#[serde(default)]
	pub mesh: Option<MeshConfigLayer>,
	#[serde(default)]
	pub paths: Option<PathsConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

fn merge_section<T>(base: &mut Option<T>, other: Option<T>, merge: impl FnOnce(&mut T, T)) {
	match (base.as_mut(), other) {
		(Some(existing), Some(incoming)) => merge(existing, incoming),
		(None, Some(incoming)) => *base = Some(incoming),
		(_, None) => {}
	}
}

impl DaemonConfigLayer {
	/// Overlays `other` on top of `self`; set fields in `other` win.
	pub fn merge(&mut self, other: DaemonConfigLayer) {
		merge_section(&mut self.http, other.http, HttpConfigLayer::merge);
		merge_section(&mut self.mesh, other.mesh, MeshConfigLayer::merge);
		merge_section(&mut self.paths, other.paths, PathsConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_toml_layer() {
		let layer: DaemonConfigLayer = toml::from_str(
			r#"
			[http]
			port = 6000

			[mesh]
			cidr = "10.8.0.0/16"
			legacy_peer_match = true

			[logging]
			format = "json"
			"#,
		)
		.unwrap();
		assert_eq!(layer.http.unwrap().port, Some(6000));
		let mesh = layer.mesh.unwrap();
		assert_eq!(mesh.cidr.as_deref(), Some("10.8.0.0/16"));
		assert_eq!(mesh.legacy_peer_match, Some(true));
		assert!(layer.paths.is_none());
	}

	#[test]
	fn test_merge_keeps_lower_values_when_unset() {
		let mut base: DaemonConfigLayer = toml::from_str(
			r#"
			[mesh]
			cidr = "10.8.0.0/16"
			nic = "eth0"
			"#,
		)
		.unwrap();
		let overlay: DaemonConfigLayer = toml::from_str(
			r#"
			[mesh]
			nic = "ens3"
			"#,
		)
		.unwrap();
		base.merge(overlay);
		let mesh = base.mesh.unwrap();
		assert_eq!(mesh.cidr.as_deref(), Some("10.8.0.0/16"));
		assert_eq!(mesh.nic.as_deref(), Some("ens3"));
	}
}
