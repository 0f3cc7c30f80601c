// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-process daemons for tests: a recording tunnel driver instead of
//! wg-quick, and remotes that never touch the network.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tricarb_common_config::StateStore;
use tricarb_wgmesh_backend::testing::RecordingDriver;
use tricarb_wgmesh_backend::{create_backend, WIREGUARD};
use tricarb_wgmesh_common::protocol::{AttachReply, DetachReply, PeerInfo};
use tricarb_wgmesh_common::{MeshError, PeerMatch, Result};

use crate::remote::MeshRemote;
use crate::state::{DaemonOptions, MeshDaemon, MeshSettings};

pub const TEST_TUNNEL: &str = "tricarb0";
pub const TEST_CIDR: &str = "10.77.0.0/24";

pub fn test_options(dir: &Path) -> DaemonOptions {
	DaemonOptions {
		conf_path: dir.join(format!("{TEST_TUNNEL}.conf")),
		peer_match: PeerMatch::Exact,
		defaults: MeshSettings {
			cidr: Some(TEST_CIDR.to_string()),
			port: None,
			nic: None,
		},
	}
}

/// A WireGuard daemon whose config file lives in `dir`.
pub fn daemon_with(
	dir: &Path,
	store: StateStore,
	driver: Arc<RecordingDriver>,
	remote: Arc<dyn MeshRemote>,
) -> Result<Arc<MeshDaemon>> {
	daemon_with_options(test_options(dir), store, driver, remote)
}

pub fn daemon_with_options(
	options: DaemonOptions,
	store: StateStore,
	driver: Arc<RecordingDriver>,
	remote: Arc<dyn MeshRemote>,
) -> Result<Arc<MeshDaemon>> {
	let backend = create_backend(WIREGUARD, store.clone(), driver, TEST_TUNNEL)?;
	Ok(Arc::new(MeshDaemon::new(options, store, backend, remote)?))
}

/// Fails every call as if the server were unreachable.
pub struct NoRemote;

#[async_trait]
impl MeshRemote for NoRemote {
	async fn server_attach(&self, host: &str, port: u16, _peer: &PeerInfo) -> Result<AttachReply> {
		Err(MeshError::Transport(format!("{host}:{port} unreachable")))
	}

	async fn server_detach(&self, host: &str, port: u16, _peer: &PeerInfo) -> Result<DetachReply> {
		Err(MeshError::Transport(format!("{host}:{port} unreachable")))
	}
}

/// Routes calls straight into registered daemons by host and port.
#[derive(Default)]
pub struct LoopbackRemote {
	servers: Mutex<HashMap<(String, u16), Arc<MeshDaemon>>>,
}

impl LoopbackRemote {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&self, host: &str, port: u16, daemon: Arc<MeshDaemon>) {
		self.servers
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.insert((host.to_string(), port), daemon);
	}

	fn lookup(&self, host: &str, port: u16) -> Result<Arc<MeshDaemon>> {
		self.servers
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.get(&(host.to_string(), port))
			.cloned()
			.ok_or_else(|| MeshError::Transport(format!("{host}:{port} unreachable")))
	}
}

#[async_trait]
impl MeshRemote for LoopbackRemote {
	async fn server_attach(&self, host: &str, port: u16, peer: &PeerInfo) -> Result<AttachReply> {
		let daemon = self.lookup(host, port)?;
		daemon.server_attach(peer).await.map_err(relay)
	}

	async fn server_detach(&self, host: &str, port: u16, peer: &PeerInfo) -> Result<DetachReply> {
		let daemon = self.lookup(host, port)?;
		daemon.server_detach(peer).await.map_err(relay)
	}
}

/// What the HTTP transport would turn the error into on the far side.
fn relay(err: MeshError) -> MeshError {
	MeshError::Remote {
		kind: err.kind(),
		message: err.to_string(),
	}
}
