// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! wg-quick configuration rendering.

use std::fmt::Write;

use tricarb_wgmesh_common::{InterfaceRecord, PeerRecord};

const KEEPALIVE_SECS: u16 = 10;

/// Renders the interface followed by each peer in insertion order.
///
/// When a physical interface is configured the tunnel forwards traffic and
/// masquerades it out through that interface. `%i` is expanded by wg-quick to
/// the tunnel name.
pub fn render_wg_quick(interface: &InterfaceRecord, peers: &[PeerRecord]) -> String {
	let mut out = String::new();

	out.push_str("[Interface]\n");
	if let Some(port) = interface.listen_port {
		let _ = writeln!(out, "ListenPort = {port}");
	}
	let _ = writeln!(out, "Address = {}", interface.address);
	let _ = writeln!(out, "PrivateKey = {}", interface.private_key);
	if let Some(nic) = interface.local_interface.as_deref() {
		let _ = writeln!(
			out,
			"PostUp = iptables -A FORWARD -i %i -j ACCEPT; iptables -A FORWARD -o %i -j ACCEPT; iptables -t nat -A POSTROUTING -o {nic} -j MASQUERADE"
		);
		let _ = writeln!(
			out,
			"PostDown = iptables -D FORWARD -i %i -j ACCEPT; iptables -D FORWARD -o %i -j ACCEPT; iptables -t nat -D POSTROUTING -o {nic} -j MASQUERADE"
		);
	}

	for peer in peers {
		out.push_str("\n[Peer]\n");
		let _ = writeln!(out, "PublicKey = {}", peer.public_key);
		let _ = writeln!(out, "AllowedIPs = {}", peer.allowed_ips);
		if let Some(endpoint) = &peer.endpoint {
			let _ = writeln!(out, "Endpoint = {endpoint}");
			let _ = writeln!(out, "PersistentKeepalive = {KEEPALIVE_SECS}");
		}
	}

	out
}

/// Replaces the value of every `PrivateKey` line.
pub fn redact_private_key(config: &str) -> String {
	config
		.lines()
		.map(|line| {
			if line.trim_start().starts_with("PrivateKey") {
				"PrivateKey = [REDACTED]"
			} else {
				line
			}
		})
		.fold(String::with_capacity(config.len()), |mut out, line| {
			out.push_str(line);
			out.push('\n');
			out
		})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn server_interface() -> InterfaceRecord {
		InterfaceRecord {
			listen_port: Some(12345),
			address: "10.1.2.1/24".to_string(),
			private_key: "cHJpdmF0ZQ==".to_string(),
			local_interface: Some("eth0".to_string()),
		}
	}

	#[test]
	fn renders_server_with_peers() {
		let peers = vec![
			PeerRecord::new("cGVlcjE=", "10.1.2.2/32"),
			PeerRecord::new("cGVlcjI=", "10.1.2.3/32"),
		];
		let expected = "\
[Interface]
ListenPort = 12345
Address = 10.1.2.1/24
PrivateKey = cHJpdmF0ZQ==
PostUp = iptables -A FORWARD -i %i -j ACCEPT; iptables -A FORWARD -o %i -j ACCEPT; iptables -t nat -A POSTROUTING -o eth0 -j MASQUERADE
PostDown = iptables -D FORWARD -i %i -j ACCEPT; iptables -D FORWARD -o %i -j ACCEPT; iptables -t nat -D POSTROUTING -o eth0 -j MASQUERADE

[Peer]
PublicKey = cGVlcjE=
AllowedIPs = 10.1.2.2/32

[Peer]
PublicKey = cGVlcjI=
AllowedIPs = 10.1.2.3/32
";
		assert_eq!(render_wg_quick(&server_interface(), &peers), expected);
	}

	#[test]
	fn renders_client_with_endpoint() {
		let iface = InterfaceRecord {
			listen_port: None,
			address: "10.1.2.2/24".to_string(),
			private_key: "Y2xpZW50".to_string(),
			local_interface: None,
		};
		let peers = vec![PeerRecord::new("c2VydmVy", "10.1.2.0/24").with_endpoint("198.51.100.4", 12345)];
		let rendered = render_wg_quick(&iface, &peers);
		assert!(!rendered.contains("ListenPort"));
		assert!(!rendered.contains("PostUp"));
		assert!(rendered.contains("Endpoint = 198.51.100.4:12345\nPersistentKeepalive = 10\n"));
	}

	#[test]
	fn rendering_is_deterministic() {
		let peers = vec![PeerRecord::new("a", "10.1.2.2/32")];
		assert_eq!(
			render_wg_quick(&server_interface(), &peers),
			render_wg_quick(&server_interface(), &peers)
		);
	}

	#[test]
	fn redaction_hides_only_private_key() {
		let rendered = render_wg_quick(&server_interface(), &[]);
		let redacted = redact_private_key(&rendered);
		assert!(!redacted.contains("cHJpdmF0ZQ=="));
		assert!(redacted.contains("PrivateKey = [REDACTED]"));
		assert!(redacted.contains("ListenPort = 12345"));
	}
}
