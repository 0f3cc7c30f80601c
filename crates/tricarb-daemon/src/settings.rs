// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SetCIDR, SetPort and SetNetworkInterface.
//!
//! Values are validated before anything changes, then persisted under the
//! `default.*` store keys so they outlive a restart. They take effect on the
//! next ServerStart or ClientAttach.

use ipnet::Ipv4Net;
use tracing::{info, instrument};
use tricarb_common_config::PORT_RANGE;
use tricarb_wgmesh_common::{MeshError, Result};

use crate::state::{store_error, MeshDaemon, CIDR_KEY, NIC_KEY, PORT_KEY};

pub fn parse_cidr(value: &str) -> Result<String> {
	let value = value.trim();
	value
		.parse::<Ipv4Net>()
		.map_err(|_| MeshError::format(format!("failed to parse the given CIDR '{value}'")))?;
	Ok(value.to_string())
}

pub fn parse_port(value: &str) -> Result<u16> {
	let port: u16 = value
		.trim()
		.parse()
		.map_err(|_| MeshError::format(format!("'{}' is not a port number", value.trim())))?;
	if !PORT_RANGE.contains(&port) {
		return Err(MeshError::format(format!(
			"port {port} is outside {}-{}",
			PORT_RANGE.start,
			PORT_RANGE.end - 1
		)));
	}
	Ok(port)
}

impl MeshDaemon {
	#[instrument(skip(self))]
	pub async fn set_cidr(&self, value: &str) -> Result<()> {
		let cidr = parse_cidr(value)?;
		let mut state = self.lock().await;
		self.store().set(CIDR_KEY, &cidr).map_err(store_error)?;
		info!(%cidr, "default CIDR set");
		state.settings.cidr = Some(cidr);
		Ok(())
	}

	#[instrument(skip(self))]
	pub async fn set_port(&self, value: &str) -> Result<()> {
		let port = parse_port(value)?;
		let mut state = self.lock().await;
		self.store().set(PORT_KEY, &port).map_err(store_error)?;
		info!(port, "default listen port set");
		state.settings.port = Some(port);
		Ok(())
	}

	#[instrument(skip(self))]
	pub async fn set_network_interface(&self, value: &str) -> Result<()> {
		let name = value.trim();
		if name.is_empty() {
			return Err(MeshError::format("network interface name is empty"));
		}
		let mut state = self.lock().await;
		if !state.backend.link_exists(name).await {
			return Err(MeshError::format(format!(
				"network interface '{name}' does not exist"
			)));
		}
		self.store().set(NIC_KEY, name).map_err(store_error)?;
		info!(nic = name, "forwarding interface set");
		state.settings.nic = Some(name.to_string());
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{daemon_with, NoRemote};
	use std::sync::Arc;
	use tempfile::TempDir;
	use tricarb_common_config::StateStore;
	use tricarb_wgmesh_backend::testing::RecordingDriver;
	use tricarb_wgmesh_common::ErrorKind;

	#[test]
	fn cidr_must_parse() {
		assert_eq!(parse_cidr(" 10.8.0.0/16 ").unwrap(), "10.8.0.0/16");
		for bad in ["", "10.8.0.0", "10.8.0.0/33", "300.1.1.1/24", "fd00::/64"] {
			let err = parse_cidr(bad).unwrap_err();
			assert_eq!(err.kind(), ErrorKind::Format, "{bad}");
		}
	}

	#[test]
	fn port_must_be_numeric_and_in_range() {
		assert_eq!(parse_port("10000").unwrap(), 10000);
		assert_eq!(parse_port("19999").unwrap(), 19999);
		for bad in ["9999", "20000", "abc", "", "-1", "70000"] {
			assert_eq!(parse_port(bad).unwrap_err().kind(), ErrorKind::Format, "{bad}");
		}
	}

	#[tokio::test]
	async fn settings_are_persisted() {
		let dir = TempDir::new().unwrap();
		let store = StateStore::in_memory();
		let driver = Arc::new(RecordingDriver::new().with_link("eth0"));
		let daemon = daemon_with(dir.path(), store.clone(), driver, Arc::new(NoRemote)).unwrap();

		daemon.set_cidr("172.20.0.0/20").await.unwrap();
		daemon.set_port("15000").await.unwrap();
		daemon.set_network_interface("eth0").await.unwrap();

		assert_eq!(store.get_string(CIDR_KEY).as_deref(), Some("172.20.0.0/20"));
		assert_eq!(store.get::<u16>(PORT_KEY).unwrap(), Some(15000));
		assert_eq!(store.get_string(NIC_KEY).as_deref(), Some("eth0"));

		let state = daemon.lock().await;
		assert_eq!(state.settings.port, Some(15000));
		assert_eq!(state.settings.nic.as_deref(), Some("eth0"));
	}

	#[tokio::test]
	async fn invalid_values_leave_settings_untouched() {
		let dir = TempDir::new().unwrap();
		let store = StateStore::in_memory();
		let daemon = daemon_with(
			dir.path(),
			store.clone(),
			Arc::new(RecordingDriver::new()),
			Arc::new(NoRemote),
		)
		.unwrap();

		assert!(daemon.set_cidr("nonsense").await.is_err());
		assert!(daemon.set_port("80").await.is_err());
		let err = daemon.set_network_interface("eth9").await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Format);

		assert!(store.get_string(PORT_KEY).is_none());
		assert!(store.get_string(NIC_KEY).is_none());
		let state = daemon.lock().await;
		assert_eq!(state.settings.port, None);
		assert_eq!(state.settings.nic, None);
	}
}
