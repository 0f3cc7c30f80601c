// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument};
use tricarb_wgmesh_common::protocol::{
	routes, Ack, ConfigRequest, ErrorReply, ServerInfo, ServerStartReply, StatusReply,
	VersionReply,
};
use url::Url;

use crate::error::{CliError, Result};

pub const DEFAULT_DAEMON_URL: &str = "http://127.0.0.1:50101";

/// Talks to the local daemon's RPC surface.
pub struct DaemonClient {
	http: Client,
	base_url: Url,
}

impl DaemonClient {
	pub fn new(base_url: Url) -> Result<Self> {
		if !matches!(base_url.scheme(), "http" | "https") {
			return Err(CliError::Other(format!(
				"daemon URL must be http:// or https://, got {base_url}"
			)));
		}
		let http = tricarb_common_http::new_client()?;
		Ok(Self { http, base_url })
	}

	fn api_url(&self, path: &str) -> Result<Url> {
		Ok(self.base_url.join(path)?)
	}

	async fn get<R: DeserializeOwned>(&self, route: &str) -> Result<R> {
		let url = self.api_url(route)?;
		debug!(%url, "GET");
		decode(self.http.get(url).send().await?).await
	}

	async fn post<B, R>(&self, route: &str, body: Option<&B>) -> Result<R>
	where
		B: Serialize + ?Sized,
		R: DeserializeOwned,
	{
		let url = self.api_url(route)?;
		debug!(%url, "POST");
		let request = self.http.post(url);
		let request = match body {
			Some(body) => request.json(body),
			None => request,
		};
		decode(request.send().await?).await
	}

	pub async fn version(&self) -> Result<VersionReply> {
		self.get(routes::VERSION).await
	}

	pub async fn status(&self) -> Result<StatusReply> {
		self.get(routes::STATUS).await
	}

	#[instrument(skip(self))]
	pub async fn set_cidr(&self, value: &str) -> Result<Ack> {
		self.set(routes::SET_CIDR, value).await
	}

	#[instrument(skip(self))]
	pub async fn set_port(&self, value: &str) -> Result<Ack> {
		self.set(routes::SET_PORT, value).await
	}

	#[instrument(skip(self))]
	pub async fn set_network_interface(&self, value: &str) -> Result<Ack> {
		self.set(routes::SET_NETWORK_INTERFACE, value).await
	}

	async fn set(&self, route: &str, value: &str) -> Result<Ack> {
		let body = ConfigRequest {
			value: value.to_string(),
		};
		self.post(route, Some(&body)).await
	}

	pub async fn server_start(&self) -> Result<ServerStartReply> {
		self.post::<(), _>(routes::SERVER_START, None).await
	}

	pub async fn server_stop(&self) -> Result<Ack> {
		self.post::<(), _>(routes::SERVER_STOP, None).await
	}

	#[instrument(skip(self))]
	pub async fn client_attach(&self, server: &ServerInfo) -> Result<Ack> {
		self.post(routes::CLIENT_ATTACH, Some(server)).await
	}

	#[instrument(skip(self))]
	pub async fn client_detach(&self, server: &ServerInfo) -> Result<Ack> {
		self.post(routes::CLIENT_DETACH, Some(server)).await
	}
}

async fn decode<R: DeserializeOwned>(response: Response) -> Result<R> {
	let status = response.status();
	if status.is_success() {
		return Ok(response.json().await?);
	}

	let body = response.text().await.unwrap_or_default();
	match serde_json::from_str::<ErrorReply>(&body) {
		Ok(reply) => Err(CliError::Daemon {
			kind: reply.error,
			message: reply.message,
		}),
		Err(_) => Err(CliError::Api {
			status: status.as_u16(),
			message: body,
		}),
	}
}
