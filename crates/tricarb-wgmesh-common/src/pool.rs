// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Host-address pool for the server's mesh block.
//!
//! Host number 0 is the network address, 1 belongs to the server and the
//! all-ones host number is treated as broadcast. None of them is ever handed
//! out. The pool is reconciled against the backend's peer list before every
//! allocation, so it can be rebuilt from scratch after a restart.

use crate::addr::{address_to_integer, integer_to_address, NetworkBlock};
use crate::error::{MeshError, Result};
use crate::peer::PeerRecord;
use ipnet::Ipv4Net;
use rand::Rng;
use std::collections::BTreeSet;
use tracing::debug;

pub const SERVER_HOST: u32 = 1;
pub const DEFAULT_PREFIX: u8 = 24;

const FIRST_CLIENT_HOST: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressPool {
	block: NetworkBlock,
	unavailable: BTreeSet<u32>,
}

impl AddressPool {
	/// Fresh pool for `block`; only the server host is taken.
	pub fn new(block: NetworkBlock) -> Self {
		let mut unavailable = BTreeSet::new();
		unavailable.insert(SERVER_HOST);
		Self {
			block: block.network_block(),
			unavailable,
		}
	}

	pub fn block(&self) -> NetworkBlock {
		self.block
	}

	pub fn is_available(&self, host: u32) -> bool {
		host >= FIRST_CLIENT_HOST
			&& host < self.block.broadcast_host()
			&& !self.unavailable.contains(&host)
	}

	pub fn mark_unavailable(&mut self, host: u32) {
		self.unavailable.insert(host);
	}

	/// Returns a client host to the pool. The server host stays reserved.
	pub fn release(&mut self, host: u32) {
		if host != SERVER_HOST {
			self.unavailable.remove(&host);
		}
	}

	/// Marks the host behind `address` taken if it lies in this block.
	pub fn claim_address(&mut self, address: &str) -> Result<()> {
		let value = address_to_integer(strip_prefix(address))?;
		if self.block.contains(value) {
			self.mark_unavailable(self.block.host_number(value));
		}
		Ok(())
	}

	pub fn release_address(&mut self, address: &str) -> Result<()> {
		let value = address_to_integer(strip_prefix(address))?;
		if self.block.contains(value) {
			self.release(self.block.host_number(value));
		}
		Ok(())
	}

	fn reconcile(&mut self, peers: &[PeerRecord]) -> Result<()> {
		for peer in peers {
			for host in peer.allowed_hosts() {
				self.claim_address(host)?;
			}
		}
		Ok(())
	}

	fn lowest_available(&self) -> Option<u32> {
		(FIRST_CLIENT_HOST..self.block.broadcast_host()).find(|host| self.is_available(*host))
	}
}

fn strip_prefix(address: &str) -> &str {
	address.split('/').next().unwrap_or(address).trim()
}

/// Picks a random prefix-aligned block and returns it with a fresh pool.
///
/// Only the prefix length of `requested` is used; an empty or unparsable
/// value falls back to /24.
pub fn derive_network_block(requested: &str) -> Result<(String, AddressPool)> {
	derive_network_block_with(requested, &mut rand::thread_rng())
}

pub fn derive_network_block_with<R: Rng + ?Sized>(
	requested: &str,
	rng: &mut R,
) -> Result<(String, AddressPool)> {
	let prefix = requested
		.trim()
		.parse::<Ipv4Net>()
		.map(|net| net.prefix_len())
		.unwrap_or(DEFAULT_PREFIX);

	let mut mask = 1u32;
	let mut leading = 1u32;
	for _ in 1..prefix {
		mask = (mask << 1) | 1;
		leading <<= 1;
	}
	let network_bits = (rng.gen::<u32>() & mask) | leading;
	let base = network_bits.checked_shl(32 - u32::from(prefix)).unwrap_or(0) | SERVER_HOST;

	let block = NetworkBlock::new(base, prefix)?;
	debug!(block = %block, "derived network block");
	Ok((block.to_string(), AddressPool::new(block)))
}

/// Lowest free host address under `interface_cidr`, as plain dotted text.
///
/// The pool is first reconciled against `peers`. The chosen host is not
/// marked taken here; the caller claims it once the peer record exists.
pub fn allocate_dynamic_address(
	interface_cidr: &str,
	peers: &[PeerRecord],
	pool: &mut AddressPool,
) -> Result<String> {
	let block = interface_cidr.parse::<NetworkBlock>()?.network_block();
	if pool.block() != block {
		debug!(from = %pool.block(), to = %block, "rebuilding address pool");
		*pool = AddressPool::new(block);
	}

	pool.reconcile(peers)?;

	let host = pool
		.lowest_available()
		.ok_or_else(|| MeshError::PoolExhausted(block.to_string()))?;
	Ok(integer_to_address(block.address_of(host)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use rand::rngs::StdRng;
	use rand::SeedableRng;
	use std::collections::HashSet;

	fn pool_for(cidr: &str) -> AddressPool {
		AddressPool::new(cidr.parse().unwrap())
	}

	#[test]
	fn empty_request_derives_slash_24() {
		let (cidr, pool) = derive_network_block("").unwrap();
		assert!(cidr.ends_with("/24"));
		assert!(cidr.split('/').next().unwrap().ends_with(".1"));
		assert!(!pool.is_available(SERVER_HOST));
		for host in 2..=254 {
			assert!(pool.is_available(host), "host {host} should be free");
		}
		assert!(!pool.is_available(255));
	}

	#[test]
	fn unparsable_request_falls_back_to_slash_24() {
		let (cidr, _) = derive_network_block("not-a-cidr").unwrap();
		assert!(cidr.ends_with("/24"));
	}

	#[test]
	fn requested_prefix_is_kept() {
		for (requested, suffix) in [("10.0.0.0/16", "/16"), ("192.168.0.0/28", "/28")] {
			let (cidr, pool) = derive_network_block(requested).unwrap();
			assert!(cidr.ends_with(suffix), "{cidr}");
			assert_eq!(format!("/{}", pool.block().prefix()), suffix);
		}
	}

	#[test]
	fn derived_block_is_server_address_in_aligned_network() {
		let mut rng = StdRng::seed_from_u64(7);
		let (cidr, pool) = derive_network_block_with("", &mut rng).unwrap();
		let block: NetworkBlock = cidr.parse().unwrap();
		assert_eq!(block.host_number(block.base()), SERVER_HOST);
		assert_eq!(block.network_block(), pool.block());
		// The leading network bit is always set.
		assert!(block.base() & 0x8000_0000 != 0);
	}

	#[test]
	fn derived_networks_rarely_collide() {
		let networks: HashSet<String> = (0..100)
			.map(|_| derive_network_block("").unwrap().0)
			.collect();
		assert!(networks.len() >= 95, "only {} distinct", networks.len());
	}

	#[test]
	fn allocates_lowest_free_host() {
		let mut pool = pool_for("10.0.0.0/24");
		let address = allocate_dynamic_address("10.0.0.1/24", &[], &mut pool).unwrap();
		assert_eq!(address, "10.0.0.2");
	}

	#[test]
	fn allocation_does_not_claim_until_peer_exists() {
		let mut pool = pool_for("10.0.0.0/24");
		let first = allocate_dynamic_address("10.0.0.1/24", &[], &mut pool).unwrap();
		let again = allocate_dynamic_address("10.0.0.1/24", &[], &mut pool).unwrap();
		assert_eq!(first, again);

		let peers = vec![PeerRecord::new("a", format!("{first}/32"))];
		let next = allocate_dynamic_address("10.0.0.1/24", &peers, &mut pool).unwrap();
		assert_eq!(next, "10.0.0.3");
	}

	#[test]
	fn reconciliation_skips_existing_peer_addresses() {
		let mut pool = pool_for("10.0.0.0/24");
		let peers: Vec<PeerRecord> = (2..=4)
			.map(|h| PeerRecord::new(format!("k{h}"), format!("10.0.0.{h}/32")))
			.chain(std::iter::once(PeerRecord::new("x", "10.0.0.5/32")))
			.collect();
		for _ in 0..10 {
			let address = allocate_dynamic_address("10.0.0.1/24", &peers, &mut pool).unwrap();
			assert_ne!(address, "10.0.0.5");
			assert_eq!(address, "10.0.0.6");
		}
	}

	#[test]
	fn peers_outside_block_are_ignored() {
		let mut pool = pool_for("10.0.0.0/24");
		let peers = vec![PeerRecord::new("other", "10.0.1.2/32")];
		let address = allocate_dynamic_address("10.0.0.1/24", &peers, &mut pool).unwrap();
		assert_eq!(address, "10.0.0.2");
	}

	#[test]
	fn slash_30_exhausts_after_single_client() {
		let mut pool = pool_for("10.0.0.0/30");
		let address = allocate_dynamic_address("10.0.0.1/30", &[], &mut pool).unwrap();
		assert_eq!(address, "10.0.0.2");

		let peers = vec![PeerRecord::new("a", format!("{address}/32"))];
		let err = allocate_dynamic_address("10.0.0.1/30", &peers, &mut pool).unwrap_err();
		assert!(matches!(err, MeshError::PoolExhausted(_)));
	}

	#[test]
	fn broadcast_host_is_never_allocated() {
		let mut pool = pool_for("10.0.0.0/29");
		let mut peers = Vec::new();
		loop {
			match allocate_dynamic_address("10.0.0.1/29", &peers, &mut pool) {
				Ok(address) => {
					assert_ne!(address, "10.0.0.7");
					peers.push(PeerRecord::new(address.clone(), format!("{address}/32")));
				}
				Err(MeshError::PoolExhausted(_)) => break,
				Err(other) => panic!("unexpected error: {other}"),
			}
		}
		assert_eq!(peers.len(), 5);
	}

	#[test]
	fn pool_is_rebuilt_for_a_new_block() {
		let mut pool = pool_for("10.0.0.0/24");
		pool.mark_unavailable(2);
		let address = allocate_dynamic_address("172.16.5.1/24", &[], &mut pool).unwrap();
		assert_eq!(address, "172.16.5.2");
		assert_eq!(pool.block().to_string(), "172.16.5.0/24");
	}

	#[test]
	fn released_host_becomes_available_again() {
		let mut pool = pool_for("10.0.0.0/24");
		pool.claim_address("10.0.0.2/32").unwrap();
		assert!(!pool.is_available(2));
		pool.release_address("10.0.0.2/32").unwrap();
		assert!(pool.is_available(2));

		pool.release(SERVER_HOST);
		assert!(!pool.is_available(SERVER_HOST));
	}

	#[test]
	fn malformed_interface_cidr_is_format_error() {
		let mut pool = pool_for("10.0.0.0/24");
		let err = allocate_dynamic_address("10.0.0/24", &[], &mut pool).unwrap_err();
		assert!(matches!(err, MeshError::Format(_)));
	}
}
