// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for tricarb.
//!
//! This crate provides:
//! - A pre-configured HTTP client with a consistent User-Agent header
//! - Build information reported by the daemon and the CLI

mod client;
mod version;

pub use client::{builder, new_client, new_client_with_timeout, user_agent};
pub use version::BuildInfo;
