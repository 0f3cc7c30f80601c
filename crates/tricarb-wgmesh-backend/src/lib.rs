// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! VPN backend contract for the tricarb mesh.
//!
//! The handshake logic only talks to [`VpnBackend`]; the WireGuard
//! implementation keeps its records in the [`StateStore`] and drives the host
//! through a [`TunnelDriver`].

pub mod driver;
pub mod error;
pub mod render;
pub mod testing;
pub mod wireguard;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tricarb_common_config::StateStore;
use tricarb_wgmesh_common::{InterfaceRecord, InterfaceSpec, PeerMatch, PeerRecord, WgKeyPair};

pub use driver::{TunnelDriver, WgQuickDriver};
pub use error::{BackendError, Result};
pub use wireguard::WireGuard;

pub const WIREGUARD: &str = "wireguard";

/// Saved backend state, used to undo a failed multi-step change.
#[derive(Debug, Clone, Default)]
pub struct BackendSnapshot {
	pub keypair: Option<WgKeyPair>,
	pub interface: Option<InterfaceRecord>,
	pub peers: Vec<PeerRecord>,
}

#[async_trait]
pub trait VpnBackend: Send + Sync {
	fn name(&self) -> &'static str;

	/// Tunnel link name, also the stem of the generated config file.
	fn tunnel_name(&self) -> &str;

	/// Generates and stores a fresh key pair.
	fn new_key_pair(&mut self) -> Result<()>;

	fn public_key(&self) -> Option<String>;

	/// Replaces the interface record. Requires a key pair.
	fn new_interface(&mut self, spec: InterfaceSpec) -> Result<()>;

	fn add_peer(&mut self, peer: PeerRecord) -> Result<()>;

	/// Removes the first peer matching `public_key` and returns it.
	fn del_peer(&mut self, public_key: &str, matching: PeerMatch) -> Result<Option<PeerRecord>>;

	fn clear_peers(&mut self) -> Result<()>;

	fn snapshot(&self) -> BackendSnapshot;

	fn restore(&mut self, snapshot: BackendSnapshot) -> Result<()>;

	/// Serializes the interface and peers into the format `up_interface` reads.
	fn config(&self) -> Result<String>;

	fn cidr(&self) -> Option<String>;

	fn port(&self) -> Option<u16>;

	fn peers(&self) -> &[PeerRecord];

	fn interface(&self) -> Option<&InterfaceRecord>;

	async fn up_interface(&self, path: &Path) -> Result<()>;

	async fn down_interface(&self, path: &Path) -> Result<()>;

	async fn is_interface_up(&self) -> bool;

	/// Whether a physical link exists on the host, for validating the
	/// forwarding interface.
	async fn link_exists(&self, name: &str) -> bool;
}

/// Builds the backend named `name`. Unknown names fail instead of yielding
/// an unusable handle.
pub fn create_backend(
	name: &str,
	store: StateStore,
	driver: Arc<dyn TunnelDriver>,
	tunnel_name: &str,
) -> Result<Box<dyn VpnBackend>> {
	match name.trim().to_ascii_lowercase().as_str() {
		WIREGUARD => Ok(Box::new(WireGuard::load(store, driver, tunnel_name)?)),
		_ => Err(BackendError::Unsupported(name.to_string())),
	}
}
