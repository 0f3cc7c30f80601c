// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Calls from a client daemon to the server daemon.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument};
use tricarb_wgmesh_common::protocol::{routes, AttachReply, DetachReply, ErrorReply, PeerInfo};
use tricarb_wgmesh_common::{MeshError, Result};

/// Trait for reaching a server daemon, allowing the transport to be swapped in tests.
#[async_trait]
pub trait MeshRemote: Send + Sync {
	async fn server_attach(&self, host: &str, port: u16, peer: &PeerInfo) -> Result<AttachReply>;

	async fn server_detach(&self, host: &str, port: u16, peer: &PeerInfo) -> Result<DetachReply>;
}

/// JSON over HTTP, bounded by a per-call timeout.
#[derive(Debug, Clone)]
pub struct HttpMeshRemote {
	client: Client,
}

impl HttpMeshRemote {
	pub fn new(timeout: Duration) -> Result<Self> {
		let client = tricarb_common_http::new_client_with_timeout(timeout)
			.map_err(|e| MeshError::Transport(e.to_string()))?;
		Ok(Self { client })
	}

	async fn call<B, R>(&self, host: &str, port: u16, route: &str, body: &B) -> Result<R>
	where
		B: Serialize + Sync + ?Sized,
		R: DeserializeOwned,
	{
		let url = rpc_url(host, port, route);
		debug!(%url, "calling server daemon");

		let response = self
			.client
			.post(&url)
			.json(body)
			.send()
			.await
			.map_err(|e| MeshError::Transport(e.to_string()))?;

		let status = response.status();
		if status.is_success() {
			return response
				.json::<R>()
				.await
				.map_err(|e| MeshError::Transport(format!("malformed reply from {url}: {e}")));
		}

		// Relay the server's own error when it sent one.
		match response.json::<ErrorReply>().await {
			Ok(reply) => Err(reply.into()),
			Err(_) => Err(MeshError::Transport(format!("{url} returned {status}"))),
		}
	}
}

#[async_trait]
impl MeshRemote for HttpMeshRemote {
	#[instrument(skip(self, peer), fields(peer_public_key = %peer.peer_public_key))]
	async fn server_attach(&self, host: &str, port: u16, peer: &PeerInfo) -> Result<AttachReply> {
		self.call(host, port, routes::SERVER_ATTACH, peer).await
	}

	#[instrument(skip(self, peer), fields(peer_public_key = %peer.peer_public_key))]
	async fn server_detach(&self, host: &str, port: u16, peer: &PeerInfo) -> Result<DetachReply> {
		self.call(host, port, routes::SERVER_DETACH, peer).await
	}
}

pub fn rpc_url(host: &str, port: u16, route: &str) -> String {
	if host.contains(':') && !host.starts_with('[') {
		format!("http://[{host}]:{port}{route}")
	} else {
		format!("http://{host}:{port}{route}")
	}
}
