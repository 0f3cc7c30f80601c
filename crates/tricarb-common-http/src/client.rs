// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared HTTP client with consistent User-Agent header.

use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use tracing::debug;

use crate::version::BuildInfo;

/// Creates a new HTTP client with the standard tricarb User-Agent header.
pub fn new_client() -> reqwest::Result<Client> {
	builder().build()
}

/// Creates a new HTTP client builder with the standard tricarb User-Agent header.
///
/// # Example
/// ```ignore
/// let client = tricarb_common_http::builder()
///     .connect_timeout(Duration::from_millis(500))
///     .build()?;
/// ```
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Creates a client whose every request, connect included, is bounded by `timeout`.
pub fn new_client_with_timeout(timeout: Duration) -> reqwest::Result<Client> {
	debug!(timeout_ms = timeout.as_millis() as u64, "building HTTP client");
	builder().timeout(timeout).connect_timeout(timeout).build()
}

/// Format: `tricarb/{version}/{platform}`
pub fn user_agent() -> String {
	let info = BuildInfo::current();
	format!("tricarb/{}/{}", info.version, info.platform)
}
