// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Daemon state shared by every RPC handler.
//!
//! The backend, the server's address pool, the operator's runtime defaults
//! and the server-running flag sit behind a single async mutex. Handshake
//! calls hold it for their whole duration, so at most one mutation of the
//! tunnel is in flight at any time.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, instrument};
use tricarb_common_config::{ConfigError, DaemonConfig, StateStore};
use tricarb_wgmesh_backend::VpnBackend;
use tricarb_wgmesh_common::{AccessCode, AddressPool, MeshError, PeerMatch, Result};

use crate::remote::MeshRemote;

pub const ACCESS_KEY: &str = "access";
pub const CIDR_KEY: &str = "default.cidr";
pub const PORT_KEY: &str = "default.port";
pub const NIC_KEY: &str = "default.nic";
pub const RUNNING_KEY: &str = "server.running";

/// Operator defaults consulted by ServerStart and ClientAttach.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeshSettings {
	pub cidr: Option<String>,
	pub port: Option<u16>,
	pub nic: Option<String>,
}

/// Construction parameters that do not come from the state store.
#[derive(Debug, Clone)]
pub struct DaemonOptions {
	/// Where the rendered tunnel config is written before each restart.
	pub conf_path: PathBuf,
	pub peer_match: PeerMatch,
	/// Used when the store holds no runtime value for a setting.
	pub defaults: MeshSettings,
}

impl DaemonOptions {
	pub fn from_config(config: &DaemonConfig) -> Self {
		Self {
			conf_path: config.paths.tunnel_config_file(),
			peer_match: if config.mesh.legacy_peer_match {
				PeerMatch::Substring
			} else {
				PeerMatch::Exact
			},
			defaults: MeshSettings {
				cidr: config.mesh.cidr.clone(),
				port: config.mesh.port,
				nic: config.mesh.nic.clone(),
			},
		}
	}
}

pub struct MeshState {
	pub backend: Box<dyn VpnBackend>,
	/// Present while this daemon acts as the server.
	pub pool: Option<AddressPool>,
	pub settings: MeshSettings,
	pub server_running: bool,
}

pub struct MeshDaemon {
	state: Mutex<MeshState>,
	access_code: AccessCode,
	store: StateStore,
	conf_path: PathBuf,
	peer_match: PeerMatch,
	remote: Arc<dyn MeshRemote>,
	backend_name: &'static str,
}

pub(crate) fn store_error(err: ConfigError) -> MeshError {
	MeshError::Backend(err.to_string())
}

impl MeshDaemon {
	/// Restores runtime settings and the access code from `store`, generating
	/// and persisting a new access code on first start.
	#[instrument(skip_all, fields(backend = backend.name(), conf = %options.conf_path.display()))]
	pub fn new(
		options: DaemonOptions,
		store: StateStore,
		backend: Box<dyn VpnBackend>,
		remote: Arc<dyn MeshRemote>,
	) -> Result<Self> {
		let access_code = match store.get::<AccessCode>(ACCESS_KEY).map_err(store_error)? {
			Some(code) => code,
			None => {
				let code = AccessCode::generate();
				store.set(ACCESS_KEY, &code).map_err(store_error)?;
				info!("generated a new access code");
				code
			}
		};

		let defaults = options.defaults;
		let settings = MeshSettings {
			cidr: store.get_string(CIDR_KEY).or(defaults.cidr),
			port: store
				.get::<u16>(PORT_KEY)
				.map_err(store_error)?
				.or(defaults.port),
			nic: store.get_string(NIC_KEY).or(defaults.nic),
		};

		let server_running = store
			.get::<bool>(RUNNING_KEY)
			.map_err(store_error)?
			.unwrap_or_else(|| backend.port().is_some());

		let backend_name = backend.name();
		info!(
			server_running,
			peers = backend.peers().len(),
			"daemon state restored"
		);

		Ok(Self {
			state: Mutex::new(MeshState {
				backend,
				pool: None,
				settings,
				server_running,
			}),
			access_code,
			store,
			conf_path: options.conf_path,
			peer_match: options.peer_match,
			remote,
			backend_name,
		})
	}

	pub async fn lock(&self) -> MutexGuard<'_, MeshState> {
		self.state.lock().await
	}

	pub fn access_code(&self) -> &AccessCode {
		&self.access_code
	}

	pub fn store(&self) -> &StateStore {
		&self.store
	}

	pub fn conf_path(&self) -> &std::path::Path {
		&self.conf_path
	}

	pub fn peer_match(&self) -> PeerMatch {
		self.peer_match
	}

	pub fn remote(&self) -> &dyn MeshRemote {
		self.remote.as_ref()
	}

	pub fn backend_name(&self) -> &'static str {
		self.backend_name
	}

	pub(crate) fn persist_running(&self, running: bool) -> Result<()> {
		self.store.set(RUNNING_KEY, &running).map_err(store_error)
	}
}
