// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! IPv4 address codec and network block arithmetic.
//!
//! Addresses are handled as `u32` values, most-significant octet first, so
//! that host numbers can be isolated and recombined with plain bit masks.

use crate::error::{MeshError, Result};
use std::fmt;
use std::str::FromStr;

/// Parses dotted-decimal text into its 32-bit representation.
///
/// Exactly four octets are required and each must fit in a byte.
pub fn address_to_integer(text: &str) -> Result<u32> {
	let octets: Vec<&str> = text.trim().split('.').collect();
	if octets.len() != 4 {
		return Err(MeshError::format(format!(
			"address '{text}' must have four octets"
		)));
	}

	let mut value = 0u32;
	for octet in octets {
		let byte: u8 = octet
			.parse()
			.map_err(|_| MeshError::format(format!("invalid octet '{octet}' in '{text}'")))?;
		value = (value << 8) | u32::from(byte);
	}
	Ok(value)
}

pub fn integer_to_address(value: u32) -> String {
	let [a, b, c, d] = value.to_be_bytes();
	format!("{a}.{b}.{c}.{d}")
}

/// Mask with the low `32 - prefix` bits set.
pub fn prefix_to_host_mask(prefix: u8) -> u32 {
	u32::MAX.checked_shr(u32::from(prefix)).unwrap_or(0)
}

pub fn prefix_to_network_mask(prefix: u8) -> u32 {
	!prefix_to_host_mask(prefix)
}

/// A `(base address, prefix length)` pair.
///
/// The base keeps whatever host bits it was created with; the server's own
/// tunnel address is stored this way (`x.y.z.1/24`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkBlock {
	base: u32,
	prefix: u8,
}

impl NetworkBlock {
	pub fn new(base: u32, prefix: u8) -> Result<Self> {
		if prefix > 32 {
			return Err(MeshError::format(format!(
				"prefix length {prefix} out of range"
			)));
		}
		Ok(Self { base, prefix })
	}

	pub fn base(&self) -> u32 {
		self.base
	}

	pub fn prefix(&self) -> u8 {
		self.prefix
	}

	pub fn network(&self) -> u32 {
		self.base & prefix_to_network_mask(self.prefix)
	}

	pub fn host_mask(&self) -> u32 {
		prefix_to_host_mask(self.prefix)
	}

	/// Size of the host-number space, `2^(32 - prefix)`.
	pub fn host_count(&self) -> u64 {
		1u64 << (32 - u32::from(self.prefix))
	}

	/// The all-ones host number.
	pub fn broadcast_host(&self) -> u32 {
		self.host_mask()
	}

	pub fn contains(&self, address: u32) -> bool {
		address & prefix_to_network_mask(self.prefix) == self.network()
	}

	pub fn host_number(&self, address: u32) -> u32 {
		address & self.host_mask()
	}

	pub fn address_of(&self, host: u32) -> u32 {
		self.network() | (host & self.host_mask())
	}

	/// The same block with host bits cleared, e.g. `10.0.0.0/24`.
	pub fn network_block(&self) -> NetworkBlock {
		NetworkBlock {
			base: self.network(),
			prefix: self.prefix,
		}
	}
}

impl FromStr for NetworkBlock {
	type Err = MeshError;

	fn from_str(s: &str) -> Result<Self> {
		let (address, prefix) = s
			.trim()
			.split_once('/')
			.ok_or_else(|| MeshError::format(format!("'{s}' is not in CIDR notation")))?;
		let base = address_to_integer(address)?;
		let prefix: u8 = prefix
			.parse()
			.map_err(|_| MeshError::format(format!("invalid prefix length in '{s}'")))?;
		NetworkBlock::new(base, prefix)
	}
}

impl fmt::Display for NetworkBlock {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", integer_to_address(self.base), self.prefix)
	}
}
