// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;
use tricarb_wgmesh_common::ErrorKind;

#[derive(Error, Debug)]
pub enum CliError {
	#[error("HTTP request failed: {0}")]
	Http(#[from] reqwest::Error),

	/// The daemon answered with a structured error.
	#[error("{message}")]
	Daemon { kind: ErrorKind, message: String },

	#[error("API error: {status} - {message}")]
	Api { status: u16, message: String },

	#[error("URL parse error: {0}")]
	UrlParse(#[from] url::ParseError),

	#[error("{0}")]
	Other(String),
}

pub type Result<T> = std::result::Result<T, CliError>;
