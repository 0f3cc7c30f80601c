// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;
use tricarb_common_config::ConfigError;
use tricarb_wgmesh_common::{KeyError, MeshError};

#[derive(Error, Debug)]
pub enum BackendError {
	#[error("backend '{0}' is not supported")]
	Unsupported(String),

	#[error("no key pair has been generated")]
	NoKeyPair,

	#[error("no interface has been configured")]
	NoInterface,

	#[error("{0} not found in PATH")]
	ToolNotInstalled(&'static str),

	#[error("{cmd} {} failed: {stderr}", .args.join(" "))]
	CommandFailed {
		cmd: &'static str,
		args: Vec<String>,
		stderr: String,
	},

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("state store error: {0}")]
	Store(#[from] ConfigError),

	#[error("invalid key: {0}")]
	Key(#[from] KeyError),
}

pub type Result<T> = std::result::Result<T, BackendError>;

impl From<BackendError> for MeshError {
	fn from(err: BackendError) -> Self {
		match err {
			BackendError::NoKeyPair | BackendError::NoInterface => {
				MeshError::Precondition(err.to_string())
			}
			other => MeshError::Backend(other.to_string()),
		}
	}
}
