// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Controller for a local tricarb daemon.

pub mod client;
pub mod commands;
pub mod error;

pub use client::{DaemonClient, DEFAULT_DAEMON_URL};
pub use error::{CliError, Result};
