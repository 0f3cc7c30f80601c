// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! WireGuard backend.
//!
//! Records live in memory and are written back to the state store under
//! `wg.iface` and `wg.peers` after every mutation, so a restarted daemon comes
//! back with the same identity, block and peers.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument};
use tricarb_common_config::StateStore;
use tricarb_wgmesh_common::{
	InterfaceRecord, InterfaceSpec, PeerMatch, PeerRecord, WgKeyPair, WgPrivateKey,
};

use crate::driver::TunnelDriver;
use crate::error::{BackendError, Result};
use crate::render::render_wg_quick;
use crate::{BackendSnapshot, VpnBackend, WIREGUARD};

pub const IFACE_KEY: &str = "wg.iface";
pub const PEERS_KEY: &str = "wg.peers";

pub struct WireGuard {
	store: StateStore,
	driver: Arc<dyn TunnelDriver>,
	tunnel_name: String,
	keypair: Option<WgKeyPair>,
	interface: Option<InterfaceRecord>,
	peers: Vec<PeerRecord>,
}

impl WireGuard {
	/// Loads any persisted interface and peers from `store`.
	#[instrument(skip(store, driver))]
	pub fn load(store: StateStore, driver: Arc<dyn TunnelDriver>, tunnel_name: &str) -> Result<Self> {
		let interface: Option<InterfaceRecord> = store.get(IFACE_KEY)?;
		let peers: Vec<PeerRecord> = store.get(PEERS_KEY)?.unwrap_or_default();

		let keypair = match &interface {
			Some(iface) if !iface.private_key.is_empty() => Some(WgKeyPair::from_private_key(
				WgPrivateKey::from_base64(&iface.private_key)?,
			)),
			_ => None,
		};

		if let Some(iface) = &interface {
			info!(address = %iface.address, peers = peers.len(), "restored WireGuard state");
		}

		Ok(Self {
			store,
			driver,
			tunnel_name: tunnel_name.to_string(),
			keypair,
			interface,
			peers,
		})
	}

	fn save(&self) -> Result<()> {
		match &self.interface {
			Some(iface) => self.store.set(IFACE_KEY, iface)?,
			None => self.store.remove(IFACE_KEY)?,
		}
		self.store.set(PEERS_KEY, &self.peers)?;
		Ok(())
	}
}

#[async_trait]
impl VpnBackend for WireGuard {
	fn name(&self) -> &'static str {
		WIREGUARD
	}

	fn tunnel_name(&self) -> &str {
		&self.tunnel_name
	}

	fn new_key_pair(&mut self) -> Result<()> {
		let keypair = WgKeyPair::generate();
		debug!(public_key = %keypair.public_key(), "generated key pair");
		self.keypair = Some(keypair);
		Ok(())
	}

	fn public_key(&self) -> Option<String> {
		self.keypair.as_ref().map(|kp| kp.public_key().to_base64())
	}

	#[instrument(skip(self), fields(address = %spec.address))]
	fn new_interface(&mut self, spec: InterfaceSpec) -> Result<()> {
		let keypair = self.keypair.as_ref().ok_or(BackendError::NoKeyPair)?;
		let private_key = keypair.private_key().to_base64();
		self.interface = Some(InterfaceRecord {
			listen_port: spec.listen_port,
			address: spec.address,
			private_key: private_key.to_string(),
			local_interface: spec.local_interface,
		});
		self.save()
	}

	#[instrument(skip(self), fields(public_key = %peer.public_key, allowed_ips = %peer.allowed_ips))]
	fn add_peer(&mut self, peer: PeerRecord) -> Result<()> {
		self.peers.push(peer);
		self.save()
	}

	#[instrument(skip(self))]
	fn del_peer(&mut self, public_key: &str, matching: PeerMatch) -> Result<Option<PeerRecord>> {
		let Some(index) = self
			.peers
			.iter()
			.position(|p| matching.matches(&p.public_key, public_key))
		else {
			debug!("no matching peer");
			return Ok(None);
		};
		let removed = self.peers.remove(index);
		self.save()?;
		info!(removed = %removed.public_key, "peer removed");
		Ok(Some(removed))
	}

	fn clear_peers(&mut self) -> Result<()> {
		if self.peers.is_empty() {
			return Ok(());
		}
		self.peers.clear();
		self.save()
	}

	fn snapshot(&self) -> BackendSnapshot {
		BackendSnapshot {
			keypair: self.keypair.clone(),
			interface: self.interface.clone(),
			peers: self.peers.clone(),
		}
	}

	fn restore(&mut self, snapshot: BackendSnapshot) -> Result<()> {
		self.keypair = snapshot.keypair;
		self.interface = snapshot.interface;
		self.peers = snapshot.peers;
		self.save()
	}

	fn config(&self) -> Result<String> {
		let iface = self.interface.as_ref().ok_or(BackendError::NoInterface)?;
		Ok(render_wg_quick(iface, &self.peers))
	}

	fn cidr(&self) -> Option<String> {
		self.interface.as_ref().map(|i| i.address.clone())
	}

	fn port(&self) -> Option<u16> {
		self.interface.as_ref().and_then(|i| i.listen_port)
	}

	fn peers(&self) -> &[PeerRecord] {
		&self.peers
	}

	fn interface(&self) -> Option<&InterfaceRecord> {
		self.interface.as_ref()
	}

	async fn up_interface(&self, path: &Path) -> Result<()> {
		self.driver.up(path).await
	}

	async fn down_interface(&self, path: &Path) -> Result<()> {
		self.driver.down(path).await
	}

	async fn is_interface_up(&self) -> bool {
		self.driver.is_up(&self.tunnel_name).await
	}

	async fn link_exists(&self, name: &str) -> bool {
		self.driver.link_exists(name).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::RecordingDriver;
	use tempfile::TempDir;

	fn backend(store: StateStore) -> WireGuard {
		WireGuard::load(store, Arc::new(RecordingDriver::new()), "tricarb0").unwrap()
	}

	fn server_spec() -> InterfaceSpec {
		InterfaceSpec {
			listen_port: Some(12000),
			address: "10.0.0.1/24".to_string(),
			local_interface: Some("eth0".to_string()),
		}
	}

	#[test]
	fn interface_requires_key_pair() {
		let mut wg = backend(StateStore::in_memory());
		assert!(matches!(
			wg.new_interface(server_spec()),
			Err(BackendError::NoKeyPair)
		));
		assert!(wg.interface().is_none());
	}

	#[test]
	fn interface_uses_generated_private_key() {
		let mut wg = backend(StateStore::in_memory());
		wg.new_key_pair().unwrap();
		wg.new_interface(server_spec()).unwrap();

		let iface = wg.interface().unwrap();
		let derived = WgKeyPair::from_private_key(WgPrivateKey::from_base64(&iface.private_key).unwrap());
		assert_eq!(Some(derived.public_key().to_base64()), wg.public_key());
		assert_eq!(wg.cidr().as_deref(), Some("10.0.0.1/24"));
		assert_eq!(wg.port(), Some(12000));
	}

	#[test]
	fn config_requires_interface() {
		let wg = backend(StateStore::in_memory());
		assert!(matches!(wg.config(), Err(BackendError::NoInterface)));
	}

	#[test]
	fn exact_delete_ignores_fragments() {
		let mut wg = backend(StateStore::in_memory());
		wg.add_peer(PeerRecord::new("AAAAkey1=", "10.0.0.2/32")).unwrap();
		wg.add_peer(PeerRecord::new("AAAAkey2=", "10.0.0.3/32")).unwrap();

		assert!(wg.del_peer("AAAA", PeerMatch::Exact).unwrap().is_none());
		assert_eq!(wg.peers().len(), 2);

		let removed = wg.del_peer("AAAAkey2=", PeerMatch::Exact).unwrap().unwrap();
		assert_eq!(removed.allowed_ips, "10.0.0.3/32");
		assert_eq!(wg.peers().len(), 1);
	}

	#[test]
	fn substring_delete_removes_first_match_only() {
		let mut wg = backend(StateStore::in_memory());
		wg.add_peer(PeerRecord::new("AAAAkey1=", "10.0.0.2/32")).unwrap();
		wg.add_peer(PeerRecord::new("AAAAkey2=", "10.0.0.3/32")).unwrap();

		let removed = wg.del_peer("AAAA", PeerMatch::Substring).unwrap().unwrap();
		assert_eq!(removed.public_key, "AAAAkey1=");
		assert_eq!(wg.peers().len(), 1);
		assert_eq!(wg.peers()[0].public_key, "AAAAkey2=");
	}

	#[test]
	fn state_survives_reload() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("state.toml");

		let public_key = {
			let mut wg = backend(StateStore::open(&path).unwrap());
			wg.new_key_pair().unwrap();
			wg.new_interface(server_spec()).unwrap();
			wg.add_peer(PeerRecord::new("cGVlcg==", "10.0.0.2/32")).unwrap();
			wg.add_peer(PeerRecord::new("c2VydmVy", "10.0.0.0/24").with_endpoint("192.0.2.1", 12000))
				.unwrap();
			wg.public_key()
		};

		let reloaded = backend(StateStore::open(&path).unwrap());
		assert_eq!(reloaded.public_key(), public_key);
		assert_eq!(reloaded.cidr().as_deref(), Some("10.0.0.1/24"));
		assert_eq!(reloaded.peers().len(), 2);
		assert_eq!(
			reloaded.peers()[1].endpoint.as_ref().map(|e| e.port),
			Some(12000)
		);
	}

	#[test]
	fn restore_reverts_records_and_store() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("state.toml");
		let mut wg = backend(StateStore::open(&path).unwrap());
		wg.new_key_pair().unwrap();
		wg.new_interface(server_spec()).unwrap();

		let snapshot = wg.snapshot();
		let before = wg.public_key();
		wg.new_key_pair().unwrap();
		wg.add_peer(PeerRecord::new("x", "10.0.0.2/32")).unwrap();
		wg.restore(snapshot).unwrap();

		assert_eq!(wg.public_key(), before);
		assert!(wg.peers().is_empty());
		assert!(backend(StateStore::open(&path).unwrap()).peers().is_empty());
	}

	#[tokio::test]
	async fn up_and_down_go_through_driver() {
		let dir = TempDir::new().unwrap();
		let conf = dir.path().join("tricarb0.conf");

		let driver = Arc::new(RecordingDriver::new());
		let mut wg = WireGuard::load(StateStore::in_memory(), driver.clone(), "tricarb0").unwrap();
		wg.new_key_pair().unwrap();
		wg.new_interface(server_spec()).unwrap();
		std::fs::write(&conf, wg.config().unwrap()).unwrap();

		wg.up_interface(&conf).await.unwrap();
		assert!(wg.is_interface_up().await);
		assert!(driver.last_config().unwrap().contains("ListenPort = 12000"));

		wg.down_interface(&conf).await.unwrap();
		assert!(!wg.is_interface_up().await);
	}
}
