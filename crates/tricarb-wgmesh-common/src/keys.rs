// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Curve25519 key material in the base64 form `wg genkey` and `wg pubkey` use.

use base64::{engine::general_purpose::STANDARD, Engine};
use std::fmt;
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum KeyError {
	#[error("invalid base64: {0}")]
	Base64(String),

	#[error("key must be 32 bytes, got {0}")]
	Length(usize),
}

fn decode_key(encoded: &str) -> Result<[u8; 32], KeyError> {
	let bytes = Zeroizing::new(
		STANDARD
			.decode(encoded.trim())
			.map_err(|e| KeyError::Base64(e.to_string()))?,
	);
	let array: [u8; 32] = bytes
		.as_slice()
		.try_into()
		.map_err(|_| KeyError::Length(bytes.len()))?;
	Ok(array)
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct WgPublicKey([u8; 32]);

impl WgPublicKey {
	pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
		decode_key(encoded).map(Self)
	}

	pub fn to_base64(&self) -> String {
		STANDARD.encode(self.0)
	}

	pub fn as_bytes(&self) -> &[u8; 32] {
		&self.0
	}
}

impl fmt::Display for WgPublicKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.to_base64())
	}
}

impl fmt::Debug for WgPublicKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "WgPublicKey({})", self.to_base64())
	}
}

/// Private half. Zeroed on drop by `StaticSecret`.
#[derive(Clone)]
pub struct WgPrivateKey(StaticSecret);

impl WgPrivateKey {
	pub fn generate() -> Self {
		Self(StaticSecret::random_from_rng(rand::rngs::OsRng))
	}

	pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
		let bytes = Zeroizing::new(decode_key(encoded)?);
		Ok(Self(StaticSecret::from(*bytes)))
	}

	pub fn to_base64(&self) -> Zeroizing<String> {
		Zeroizing::new(STANDARD.encode(self.0.to_bytes()))
	}

	pub fn public_key(&self) -> WgPublicKey {
		WgPublicKey(PublicKey::from(&self.0).to_bytes())
	}
}

impl fmt::Debug for WgPrivateKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("WgPrivateKey([REDACTED])")
	}
}

#[derive(Clone, Debug)]
pub struct WgKeyPair {
	private: WgPrivateKey,
	public: WgPublicKey,
}

impl WgKeyPair {
	pub fn generate() -> Self {
		Self::from_private_key(WgPrivateKey::generate())
	}

	pub fn from_private_key(private: WgPrivateKey) -> Self {
		let public = private.public_key();
		Self { private, public }
	}

	pub fn private_key(&self) -> &WgPrivateKey {
		&self.private
	}

	pub fn public_key(&self) -> &WgPublicKey {
		&self.public
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn generated_keys_differ() {
		let a = WgKeyPair::generate();
		let b = WgKeyPair::generate();
		assert_ne!(a.public_key(), b.public_key());
	}

	#[test]
	fn private_key_roundtrips_through_base64() {
		let pair = WgKeyPair::generate();
		let encoded = pair.private_key().to_base64();
		assert_eq!(encoded.len(), 44);

		let restored = WgKeyPair::from_private_key(WgPrivateKey::from_base64(&encoded).unwrap());
		assert_eq!(restored.public_key(), pair.public_key());
	}

	#[test]
	fn public_key_parses_its_own_encoding() {
		let public = *WgKeyPair::generate().public_key();
		assert_eq!(WgPublicKey::from_base64(&public.to_base64()).unwrap(), public);
	}

	#[test]
	fn rejects_short_and_malformed_keys() {
		assert_eq!(
			WgPublicKey::from_base64("AAAA").unwrap_err(),
			KeyError::Length(3)
		);
		assert!(matches!(
			WgPrivateKey::from_base64("not base64!"),
			Err(KeyError::Base64(_))
		));
	}

	#[test]
	fn debug_never_prints_private_material() {
		let pair = WgKeyPair::generate();
		let secret = pair.private_key().to_base64();
		let debug = format!("{pair:?}");
		assert!(debug.contains("[REDACTED]"));
		assert!(!debug.contains(secret.as_str()));
	}
}
