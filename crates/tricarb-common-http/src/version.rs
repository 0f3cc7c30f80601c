// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::Serialize;

/// Build information shared by `tricarbd` and `tricarb`.
#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
	pub version: &'static str,
	/// `{os}-{arch}`, e.g. `linux-x86_64`.
	pub platform: String,
}

impl BuildInfo {
	pub fn current() -> Self {
		Self {
			version: env!("CARGO_PKG_VERSION"),
			platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn platform_has_os_and_arch() {
		let info = BuildInfo::current();
		assert!(info.platform.split('-').count() >= 2);
		assert!(info.platform.starts_with(std::env::consts::OS));
		assert!(!info.version.is_empty());
	}

	#[test]
	fn serializes_for_version_replies() {
		let json = serde_json::to_value(BuildInfo::current()).unwrap();
		assert!(json.get("version").is_some());
		assert!(json.get("platform").is_some());
	}
}
