// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Mesh membership handshake.
//!
//! Server side: ServerStart, ServerStop, ServerAttach, ServerDetach.
//! Client side: ClientAttach, ClientDetach, which call the server daemon
//! through [`MeshRemote`](crate::remote::MeshRemote).
//!
//! Every mutation follows the same shape: snapshot the backend, change its
//! records, render and write the config file, restart the tunnel. If the
//! restart fails the snapshot is restored and the config file rewritten, so
//! the stored records never describe a tunnel that did not come up.
//!
//! ClientDetach is the exception: once the server has dropped the peer the
//! local server peer is removed for good, even if the restart then fails.

use std::path::Path;

use rand::Rng;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};
use tricarb_common_config::PORT_RANGE;
use tricarb_wgmesh_backend::{BackendSnapshot, VpnBackend};
use tricarb_wgmesh_common::protocol::{
	AttachReply, DetachReply, PeerInfo, ServerInfo, ServerStartReply, StatusReply,
};
use tricarb_wgmesh_common::{
	allocate_dynamic_address, derive_network_block, AddressPool, InterfaceSpec, MeshError,
	NetworkBlock, PeerMatch, PeerRecord, Result, WgPublicKey,
};

use crate::state::{MeshDaemon, MeshState};

const NO_SERVER: &str = "no server was started";
const NO_CLIENT: &str = "no client detected";

/// Writes `contents` to `path` readable by the owner only, replacing any
/// previous file in one rename.
pub async fn write_config(path: &Path, contents: &str) -> Result<()> {
	let io_err = |e: std::io::Error| MeshError::Backend(format!("{}: {e}", path.display()));

	if let Some(parent) = path.parent() {
		tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
	}
	let tmp = path.with_extension("conf.tmp");

	let mut options = tokio::fs::OpenOptions::new();
	options.write(true).create(true).truncate(true);
	#[cfg(unix)]
	options.mode(0o600);

	let mut file = options.open(&tmp).await.map_err(io_err)?;
	file.write_all(contents.as_bytes()).await.map_err(io_err)?;
	file.sync_all().await.map_err(io_err)?;
	tokio::fs::rename(&tmp, path).await.map_err(io_err)
}

fn stage_interface(
	backend: &mut dyn VpnBackend,
	spec: InterfaceSpec,
	fresh_keys: bool,
) -> Result<()> {
	if fresh_keys {
		backend.new_key_pair()?;
	}
	backend.new_interface(spec)?;
	backend.clear_peers()?;
	Ok(())
}

fn discard_staged(backend: &mut dyn VpnBackend, snapshot: BackendSnapshot) {
	if let Err(err) = backend.restore(snapshot) {
		warn!(error = %err, "failed to restore previous backend state");
	}
}

impl MeshDaemon {
	/// Renders the backend config, writes it and restarts the tunnel.
	async fn apply(&self, backend: &dyn VpnBackend) -> Result<()> {
		let config = backend.config()?;
		write_config(self.conf_path(), &config).await?;
		if backend.is_interface_up().await {
			backend.down_interface(self.conf_path()).await?;
		}
		backend.up_interface(self.conf_path()).await?;
		Ok(())
	}

	async fn apply_or_rollback(
		&self,
		backend: &mut dyn VpnBackend,
		snapshot: BackendSnapshot,
		was_up: bool,
	) -> Result<()> {
		let Err(err) = self.apply(&*backend).await else {
			return Ok(());
		};
		warn!(error = %err, "tunnel restart failed, restoring previous state");

		if let Err(restore_err) = backend.restore(snapshot) {
			warn!(error = %restore_err, "failed to persist restored state");
			return Err(err);
		}

		if backend.interface().is_some() {
			match backend.config() {
				Ok(config) => {
					if let Err(write_err) = write_config(self.conf_path(), &config).await {
						warn!(error = %write_err, "failed to rewrite config file");
					} else if was_up && !backend.is_interface_up().await {
						if let Err(up_err) = backend.up_interface(self.conf_path()).await {
							warn!(error = %up_err, "failed to bring previous tunnel back up");
						}
					}
				}
				Err(config_err) => warn!(error = %config_err, "failed to render restored config"),
			}
		}
		Err(err)
	}

	/// Checks the presented code, then that this daemon is serving.
	fn authorize(&self, state: &MeshState, access_code: &str) -> Result<()> {
		if !self.access_code().verify(access_code) {
			warn!("rejected request with invalid access code");
			return Err(MeshError::Auth);
		}
		if !state.server_running {
			return Err(MeshError::precondition(NO_SERVER));
		}
		Ok(())
	}

	#[instrument(skip(self))]
	pub async fn status(&self) -> Result<StatusReply> {
		let state = self.lock().await;
		if state.backend.interface().is_none() {
			return Ok(StatusReply {
				config: String::new(),
			});
		}
		let config = state.backend.config()?;
		Ok(StatusReply {
			config: tricarb_wgmesh_backend::render::redact_private_key(&config),
		})
	}

	/// Generates a key pair and a fresh mesh block, then brings the tunnel up
	/// as the server at host number 1.
	#[instrument(skip(self))]
	pub async fn server_start(&self) -> Result<ServerStartReply> {
		let mut guard = self.lock().await;
		let state = &mut *guard;

		let listen_port = state
			.settings
			.port
			.unwrap_or_else(|| rand::thread_rng().gen_range(PORT_RANGE));
		let (address, pool) = derive_network_block(state.settings.cidr.as_deref().unwrap_or(""))?;

		let was_up = state.backend.is_interface_up().await;
		let snapshot = state.backend.snapshot();
		let spec = InterfaceSpec {
			listen_port: Some(listen_port),
			address: address.clone(),
			local_interface: state.settings.nic.clone(),
		};
		if let Err(err) = stage_interface(state.backend.as_mut(), spec, true) {
			discard_staged(state.backend.as_mut(), snapshot);
			return Err(err);
		}

		self
			.apply_or_rollback(state.backend.as_mut(), snapshot, was_up)
			.await?;

		state.pool = Some(pool);
		state.server_running = true;
		self.persist_running(true)?;

		info!(%address, listen_port, "server started");
		Ok(ServerStartReply {
			access_code: self.access_code().expose().to_string(),
			address,
			listen_port,
		})
	}

	#[instrument(skip(self))]
	pub async fn server_stop(&self) -> Result<()> {
		let mut guard = self.lock().await;
		let state = &mut *guard;
		if !state.server_running {
			return Err(MeshError::precondition(NO_SERVER));
		}

		if state.backend.is_interface_up().await {
			state.backend.down_interface(self.conf_path()).await?;
		}

		state.pool = None;
		state.server_running = false;
		self.persist_running(false)?;
		info!("server stopped");
		Ok(())
	}

	/// Admits a client: allocates the lowest free host, records the peer and
	/// restarts the tunnel, all under the state lock.
	#[instrument(skip(self, peer), fields(peer_public_key = %peer.peer_public_key))]
	pub async fn server_attach(&self, peer: &PeerInfo) -> Result<AttachReply> {
		let mut guard = self.lock().await;
		let state = &mut *guard;
		self.authorize(state, &peer.access_code)?;

		WgPublicKey::from_base64(&peer.peer_public_key)
			.map_err(|e| MeshError::format(format!("peer public key: {e}")))?;
		if state
			.backend
			.peers()
			.iter()
			.any(|p| p.public_key == peer.peer_public_key)
		{
			return Err(MeshError::precondition("peer already attached"));
		}

		let server_public_key = state
			.backend
			.public_key()
			.ok_or_else(|| MeshError::precondition(NO_SERVER))?;
		let listen_port = state
			.backend
			.port()
			.ok_or_else(|| MeshError::precondition(NO_SERVER))?;
		let cidr = state
			.backend
			.cidr()
			.ok_or_else(|| MeshError::precondition(NO_SERVER))?;
		let block: NetworkBlock = cidr.parse()?;

		let pool = state.pool.get_or_insert_with(|| {
			debug!(%block, "rebuilding pool after restart");
			AddressPool::new(block)
		});
		let address = allocate_dynamic_address(&cidr, state.backend.peers(), pool)?;

		let was_up = state.backend.is_interface_up().await;
		let snapshot = state.backend.snapshot();
		state
			.backend
			.add_peer(PeerRecord::new(peer.peer_public_key.clone(), format!("{address}/32")))?;
		self
			.apply_or_rollback(state.backend.as_mut(), snapshot, was_up)
			.await?;

		if let Some(pool) = state.pool.as_mut() {
			pool.claim_address(&address)?;
		}

		let assigned_cidr = format!("{address}/{}", block.prefix());
		info!(%assigned_cidr, "peer attached");
		Ok(AttachReply {
			assigned_cidr,
			server_public_key,
			server_listen_port: listen_port,
		})
	}

	/// Removes a client's peer record. Detaching a key that is not attached
	/// succeeds without touching the tunnel.
	#[instrument(skip(self, peer), fields(peer_public_key = %peer.peer_public_key))]
	pub async fn server_detach(&self, peer: &PeerInfo) -> Result<DetachReply> {
		let mut guard = self.lock().await;
		let state = &mut *guard;
		self.authorize(state, &peer.access_code)?;

		let server_public_key = state
			.backend
			.public_key()
			.ok_or_else(|| MeshError::precondition(NO_SERVER))?;

		let was_up = state.backend.is_interface_up().await;
		let snapshot = state.backend.snapshot();
		let Some(removed) = state
			.backend
			.del_peer(&peer.peer_public_key, self.peer_match())?
		else {
			info!("peer was not attached");
			return Ok(DetachReply { server_public_key });
		};
		self
			.apply_or_rollback(state.backend.as_mut(), snapshot, was_up)
			.await?;

		if let Some(pool) = state.pool.as_mut() {
			for host in removed.allowed_hosts() {
				pool.release_address(host)?;
			}
		}

		info!(removed = %removed.public_key, "peer detached");
		Ok(DetachReply { server_public_key })
	}

	/// Joins the mesh served at `server`: new key pair, remote attach, then
	/// the local interface and a single peer for the whole mesh block.
	#[instrument(skip(self, server), fields(host = %server.host, port = server.port))]
	pub async fn client_attach(&self, server: &ServerInfo) -> Result<()> {
		let mut guard = self.lock().await;
		let state = &mut *guard;
		if state.server_running {
			return Err(MeshError::precondition(
				"this daemon is running a server; stop it before attaching",
			));
		}
		if state.backend.peers().iter().any(|p| p.endpoint.is_some()) {
			return Err(MeshError::precondition("client already attached"));
		}

		let was_up = state.backend.is_interface_up().await;
		let snapshot = state.backend.snapshot();
		state.backend.new_key_pair()?;
		let public_key = state
			.backend
			.public_key()
			.ok_or_else(|| MeshError::precondition("no key pair has been generated"))?;
		let peer = PeerInfo {
			access_code: server.access_code.clone(),
			peer_public_key: public_key,
		};

		let reply = match self
			.remote()
			.server_attach(&server.host, server.port, &peer)
			.await
		{
			Ok(reply) => reply,
			Err(err) => {
				discard_staged(state.backend.as_mut(), snapshot);
				warn!(error = %err, "server refused attach");
				return Err(err);
			}
		};

		let local = self
			.materialize_client(state, server, &reply, snapshot, was_up)
			.await;
		if let Err(err) = local {
			// The server already holds a peer for us; ask it to drop it.
			if let Err(detach_err) = self
				.remote()
				.server_detach(&server.host, server.port, &peer)
				.await
			{
				warn!(error = %detach_err, "failed to withdraw attach from server");
			}
			return Err(err);
		}

		info!(assigned_cidr = %reply.assigned_cidr, "attached to mesh");
		Ok(())
	}

	async fn materialize_client(
		&self,
		state: &mut MeshState,
		server: &ServerInfo,
		reply: &AttachReply,
		snapshot: BackendSnapshot,
		was_up: bool,
	) -> Result<()> {
		let mesh_block = match reply.assigned_cidr.parse::<NetworkBlock>() {
			Ok(block) => block.network_block(),
			Err(err) => {
				discard_staged(state.backend.as_mut(), snapshot);
				return Err(err);
			}
		};

		let spec = InterfaceSpec {
			listen_port: None,
			address: reply.assigned_cidr.clone(),
			local_interface: state.settings.nic.clone(),
		};
		let server_peer = PeerRecord::new(reply.server_public_key.clone(), mesh_block.to_string())
			.with_endpoint(server.host.clone(), reply.server_listen_port);
		let staged = stage_interface(state.backend.as_mut(), spec, false)
			.and_then(|()| state.backend.add_peer(server_peer).map_err(MeshError::from));
		if let Err(err) = staged {
			discard_staged(state.backend.as_mut(), snapshot);
			return Err(err);
		}

		self
			.apply_or_rollback(state.backend.as_mut(), snapshot, was_up)
			.await
	}

	/// Leaves the mesh served at `server`.
	#[instrument(skip(self, server), fields(host = %server.host, port = server.port))]
	pub async fn client_detach(&self, server: &ServerInfo) -> Result<()> {
		let mut guard = self.lock().await;
		let state = &mut *guard;
		let Some(public_key) = state.backend.public_key() else {
			return Err(MeshError::precondition(NO_CLIENT));
		};

		let peer = PeerInfo {
			access_code: server.access_code.clone(),
			peer_public_key: public_key,
		};
		let reply = self
			.remote()
			.server_detach(&server.host, server.port, &peer)
			.await?;

		// The server peer is the only one a client records with an endpoint.
		// Its key may no longer match the server's if that role was restarted.
		let stale: Vec<String> = state
			.backend
			.peers()
			.iter()
			.filter(|p| p.endpoint.is_some() || p.public_key == reply.server_public_key)
			.map(|p| p.public_key.clone())
			.collect();
		if stale.is_empty() {
			debug!("server peer was already gone locally");
		}
		for key in &stale {
			state.backend.del_peer(key, PeerMatch::Exact)?;
		}
		if !stale.is_empty() && state.backend.interface().is_some() {
			self.apply(&*state.backend).await?;
		}

		info!("detached from mesh");
		Ok(())
	}
}
