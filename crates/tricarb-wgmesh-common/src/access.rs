// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const ACCESS_CODE_LEN: usize = 32;

/// Shared secret presented on every attach/detach call.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessCode(String);

impl AccessCode {
	pub fn generate() -> Self {
		let code: String = OsRng
			.sample_iter(&Alphanumeric)
			.take(ACCESS_CODE_LEN)
			.map(char::from)
			.collect();
		Self(code)
	}

	pub fn new(code: impl Into<String>) -> Self {
		Self(code.into())
	}

	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Exact comparison without an early exit on the first differing byte.
	pub fn verify(&self, presented: &str) -> bool {
		let expected = self.0.as_bytes();
		let presented = presented.as_bytes();
		if expected.len() != presented.len() {
			return false;
		}
		expected
			.iter()
			.zip(presented)
			.fold(0u8, |acc, (a, b)| acc | (a ^ b))
			== 0
	}
}

impl fmt::Debug for AccessCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("AccessCode([REDACTED])")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn generated_code_is_alphanumeric_and_fixed_length() {
		let code = AccessCode::generate();
		assert_eq!(code.expose().len(), ACCESS_CODE_LEN);
		assert!(code.expose().chars().all(|c| c.is_ascii_alphanumeric()));
	}

	#[test]
	fn generated_codes_are_unique() {
		assert_ne!(AccessCode::generate(), AccessCode::generate());
	}

	#[test]
	fn verify_requires_exact_match() {
		let code = AccessCode::new("abcDEF123");
		assert!(code.verify("abcDEF123"));
		assert!(!code.verify("abcdef123"));
		assert!(!code.verify("abcDEF12"));
		assert!(!code.verify(""));
	}

	#[test]
	fn debug_is_redacted() {
		let code = AccessCode::new("hunter2hunter2");
		assert!(!format!("{code:?}").contains("hunter2"));
	}
}
