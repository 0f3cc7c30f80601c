// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared types for the tricarb WireGuard mesh.
//!
//! Address arithmetic, the server's address pool, key material, the
//! interface and peer records, and the RPC wire types used between daemons.

pub mod access;
pub mod addr;
pub mod error;
pub mod keys;
pub mod peer;
pub mod pool;
pub mod protocol;

pub use access::AccessCode;
pub use addr::{
	address_to_integer, integer_to_address, prefix_to_host_mask, prefix_to_network_mask,
	NetworkBlock,
};
pub use error::{ErrorKind, MeshError, Result};
pub use keys::{KeyError, WgKeyPair, WgPrivateKey, WgPublicKey};
pub use peer::{InterfaceRecord, InterfaceSpec, PeerEndpoint, PeerMatch, PeerRecord};
pub use pool::{allocate_dynamic_address, derive_network_block, AddressPool};
