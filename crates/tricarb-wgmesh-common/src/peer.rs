// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};
use std::fmt;

/// The local tunnel interface. One per daemon, server or client.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceRecord {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub listen_port: Option<u16>,
	/// Address block in CIDR form, e.g. `10.0.0.1/24`.
	pub address: String,
	pub private_key: String,
	/// Physical interface used for forwarding and masquerade.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub local_interface: Option<String>,
}

impl fmt::Debug for InterfaceRecord {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("InterfaceRecord")
			.field("listen_port", &self.listen_port)
			.field("address", &self.address)
			.field("private_key", &"[REDACTED]")
			.field("local_interface", &self.local_interface)
			.finish()
	}
}

/// Fields accepted by `new_interface`; the private key comes from the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceSpec {
	pub listen_port: Option<u16>,
	pub address: String,
	pub local_interface: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerEndpoint {
	pub host: String,
	pub port: u16,
}

impl fmt::Display for PeerEndpoint {
	/// IPv6 hosts are bracketed, as wg-quick expects `[fd00::1]:51820`.
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.host.contains(':') && !self.host.starts_with('[') {
			write!(f, "[{}]:{}", self.host, self.port)
		} else {
			write!(f, "{}:{}", self.host, self.port)
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
	pub public_key: String,
	/// Comma-separated CIDR list, normally a single `/32` on the server side.
	pub allowed_ips: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub endpoint: Option<PeerEndpoint>,
}

impl PeerRecord {
	pub fn new(public_key: impl Into<String>, allowed_ips: impl Into<String>) -> Self {
		Self {
			public_key: public_key.into(),
			allowed_ips: allowed_ips.into(),
			endpoint: None,
		}
	}

	pub fn with_endpoint(mut self, host: impl Into<String>, port: u16) -> Self {
		self.endpoint = Some(PeerEndpoint {
			host: host.into(),
			port,
		});
		self
	}

	/// Host part of every allowed-ip entry, prefix stripped.
	pub fn allowed_hosts(&self) -> impl Iterator<Item = &str> {
		self
			.allowed_ips
			.split(',')
			.map(str::trim)
			.filter(|entry| !entry.is_empty())
			.map(|entry| entry.split('/').next().unwrap_or(entry))
	}
}

/// How `del_peer` compares the supplied key against stored peers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerMatch {
	#[default]
	Exact,
	/// Deprecated: first peer whose key contains the fragment.
	Substring,
}

impl PeerMatch {
	pub fn matches(&self, stored: &str, supplied: &str) -> bool {
		match self {
			PeerMatch::Exact => stored == supplied,
			PeerMatch::Substring => !supplied.is_empty() && stored.contains(supplied),
		}
	}
}
