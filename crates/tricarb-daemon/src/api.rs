// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP surface of the daemon.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::warn;
use tricarb_common_http::BuildInfo;
use tricarb_wgmesh_common::protocol::{
	routes, Ack, AttachReply, ConfigRequest, DetachReply, ErrorReply, PeerInfo, ServerInfo,
	ServerStartReply, StatusReply, VersionReply,
};
use tricarb_wgmesh_common::{ErrorKind, MeshError};

use crate::state::MeshDaemon;

pub type AppState = Arc<MeshDaemon>;

/// Wraps a [`MeshError`] so handlers can return it directly.
#[derive(Debug)]
pub struct ApiError(pub MeshError);

impl From<MeshError> for ApiError {
	fn from(err: MeshError) -> Self {
		Self(err)
	}
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
	match kind {
		ErrorKind::Format => StatusCode::BAD_REQUEST,
		ErrorKind::Auth => StatusCode::UNAUTHORIZED,
		ErrorKind::Precondition => StatusCode::CONFLICT,
		ErrorKind::PoolExhausted => StatusCode::SERVICE_UNAVAILABLE,
		ErrorKind::Backend => StatusCode::INTERNAL_SERVER_ERROR,
		ErrorKind::Transport => StatusCode::BAD_GATEWAY,
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = status_for(self.0.kind());
		if status.is_server_error() {
			tracing::error!(error = %self.0, "request failed");
		} else {
			tracing::debug!(error = %self.0, "request rejected");
		}
		(status, Json(ErrorReply::from(&self.0))).into_response()
	}
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Operator routes answer loopback callers only. ServerStart hands out the
/// access code, so it must never be reachable from the mesh side.
///
/// Requests without a peer address are refused; serve the router with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub async fn require_loopback(request: Request, next: Next) -> Result<Response, StatusCode> {
	let caller = request
		.extensions()
		.get::<ConnectInfo<SocketAddr>>()
		.map(|ConnectInfo(addr)| *addr);

	match caller {
		Some(addr) if addr.ip().to_canonical().is_loopback() => Ok(next.run(request).await),
		Some(addr) => {
			warn!(%addr, path = %request.uri().path(), "refused operator request from remote host");
			Err(StatusCode::FORBIDDEN)
		}
		None => {
			warn!(path = %request.uri().path(), "refused operator request without peer address");
			Err(StatusCode::FORBIDDEN)
		}
	}
}

pub fn create_router(state: AppState) -> Router {
	let operator = Router::new()
		.route(routes::STATUS, get(status))
		.route(routes::SET_CIDR, post(set_cidr))
		.route(routes::SET_PORT, post(set_port))
		.route(routes::SET_NETWORK_INTERFACE, post(set_network_interface))
		.route(routes::SERVER_START, post(server_start))
		.route(routes::SERVER_STOP, post(server_stop))
		.route(routes::CLIENT_ATTACH, post(client_attach))
		.route(routes::CLIENT_DETACH, post(client_detach))
		.layer(middleware::from_fn(require_loopback));

	Router::new()
		.route(routes::VERSION, get(version))
		.route(routes::SERVER_ATTACH, post(server_attach))
		.route(routes::SERVER_DETACH, post(server_detach))
		.merge(operator)
		.with_state(state)
}

/// GET /rpc/version - Package version, backend and platform.
pub async fn version(State(daemon): State<AppState>) -> Json<VersionReply> {
	let info = BuildInfo::current();
	Json(VersionReply {
		version: info.version.to_string(),
		backend: daemon.backend_name().to_string(),
		platform: info.platform,
	})
}

/// GET /rpc/status - Current tunnel config with the private key redacted.
pub async fn status(State(daemon): State<AppState>) -> ApiResult<StatusReply> {
	Ok(Json(daemon.status().await?))
}

pub async fn set_cidr(
	State(daemon): State<AppState>,
	Json(req): Json<ConfigRequest>,
) -> ApiResult<Ack> {
	daemon.set_cidr(&req.value).await?;
	Ok(Json(Ack::ok()))
}

pub async fn set_port(
	State(daemon): State<AppState>,
	Json(req): Json<ConfigRequest>,
) -> ApiResult<Ack> {
	daemon.set_port(&req.value).await?;
	Ok(Json(Ack::ok()))
}

pub async fn set_network_interface(
	State(daemon): State<AppState>,
	Json(req): Json<ConfigRequest>,
) -> ApiResult<Ack> {
	daemon.set_network_interface(&req.value).await?;
	Ok(Json(Ack::ok()))
}

/// POST /rpc/server/start - Returns the access code clients must present.
pub async fn server_start(State(daemon): State<AppState>) -> ApiResult<ServerStartReply> {
	Ok(Json(daemon.server_start().await?))
}

pub async fn server_stop(State(daemon): State<AppState>) -> ApiResult<Ack> {
	daemon.server_stop().await?;
	Ok(Json(Ack::ok()))
}

/// POST /rpc/server/attach - Called by a client daemon.
pub async fn server_attach(
	State(daemon): State<AppState>,
	Json(peer): Json<PeerInfo>,
) -> ApiResult<AttachReply> {
	Ok(Json(daemon.server_attach(&peer).await?))
}

/// POST /rpc/server/detach - Called by a client daemon.
pub async fn server_detach(
	State(daemon): State<AppState>,
	Json(peer): Json<PeerInfo>,
) -> ApiResult<DetachReply> {
	Ok(Json(daemon.server_detach(&peer).await?))
}

/// POST /rpc/client/attach - Called by the operator's controller.
pub async fn client_attach(
	State(daemon): State<AppState>,
	Json(server): Json<ServerInfo>,
) -> ApiResult<Ack> {
	daemon.client_attach(&server).await?;
	Ok(Json(Ack::ok()))
}

pub async fn client_detach(
	State(daemon): State<AppState>,
	Json(server): Json<ServerInfo>,
) -> ApiResult<Ack> {
	daemon.client_detach(&server).await?;
	Ok(Json(Ack::ok()))
}
