// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! JSON request and reply bodies for the daemon RPC surface.
//!
//! Every call is a `POST` (or `GET` for read-only calls) to one of the paths
//! below. Failures come back with a non-2xx status and an [`ErrorReply`].

use crate::error::{ErrorKind, MeshError};
use serde::{Deserialize, Serialize};

pub mod routes {
	pub const VERSION: &str = "/rpc/version";
	pub const STATUS: &str = "/rpc/status";
	pub const SET_CIDR: &str = "/rpc/config/cidr";
	pub const SET_PORT: &str = "/rpc/config/port";
	pub const SET_NETWORK_INTERFACE: &str = "/rpc/config/nic";
	pub const SERVER_START: &str = "/rpc/server/start";
	pub const SERVER_STOP: &str = "/rpc/server/stop";
	pub const SERVER_ATTACH: &str = "/rpc/server/attach";
	pub const SERVER_DETACH: &str = "/rpc/server/detach";
	pub const CLIENT_ATTACH: &str = "/rpc/client/attach";
	pub const CLIENT_DETACH: &str = "/rpc/client/detach";
}

/// Body of the SetCIDR, SetPort and SetNetworkInterface calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRequest {
	pub value: String,
}

/// Sent by a client daemon to the server daemon.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
	pub access_code: String,
	pub peer_public_key: String,
}

impl std::fmt::Debug for PeerInfo {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PeerInfo")
			.field("access_code", &"[REDACTED]")
			.field("peer_public_key", &self.peer_public_key)
			.finish()
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachReply {
	/// Host address inside the mesh block, with the block's prefix length.
	pub assigned_cidr: String,
	pub server_public_key: String,
	pub server_listen_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetachReply {
	pub server_public_key: String,
}

/// Sent by the controller to a client daemon.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
	pub host: String,
	pub port: u16,
	pub access_code: String,
}

impl std::fmt::Debug for ServerInfo {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ServerInfo")
			.field("host", &self.host)
			.field("port", &self.port)
			.field("access_code", &"[REDACTED]")
			.finish()
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReply {
	pub config: String,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStartReply {
	pub access_code: String,
	pub address: String,
	pub listen_port: u16,
}

impl std::fmt::Debug for ServerStartReply {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ServerStartReply")
			.field("access_code", &"[REDACTED]")
			.field("address", &self.address)
			.field("listen_port", &self.listen_port)
			.finish()
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionReply {
	pub version: String,
	pub backend: String,
	pub platform: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
	pub ok: bool,
}

impl Ack {
	pub fn ok() -> Self {
		Self { ok: true }
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
	pub error: ErrorKind,
	pub message: String,
}

impl From<&MeshError> for ErrorReply {
	fn from(err: &MeshError) -> Self {
		Self {
			error: err.kind(),
			message: err.to_string(),
		}
	}
}

impl From<ErrorReply> for MeshError {
	fn from(reply: ErrorReply) -> Self {
		MeshError::Remote {
			kind: reply.error,
			message: reply.message,
		}
	}
}
