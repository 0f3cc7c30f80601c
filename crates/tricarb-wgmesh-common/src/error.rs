// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failure categories shared by both daemons and carried over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
	Format,
	Auth,
	Precondition,
	PoolExhausted,
	Backend,
	Transport,
}

impl ErrorKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			ErrorKind::Format => "format",
			ErrorKind::Auth => "auth",
			ErrorKind::Precondition => "precondition",
			ErrorKind::PoolExhausted => "pool_exhausted",
			ErrorKind::Backend => "backend",
			ErrorKind::Transport => "transport",
		}
	}
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Error)]
pub enum MeshError {
	#[error("invalid format: {0}")]
	Format(String),

	#[error("invalid access code")]
	Auth,

	#[error("{0}")]
	Precondition(String),

	#[error("no free address under {0}")]
	PoolExhausted(String),

	#[error("backend error: {0}")]
	Backend(String),

	#[error("transport error: {0}")]
	Transport(String),

	/// An error reported by the counterpart daemon, relayed unchanged.
	#[error("{message}")]
	Remote { kind: ErrorKind, message: String },
}

impl MeshError {
	pub fn format(message: impl Into<String>) -> Self {
		Self::Format(message.into())
	}

	pub fn precondition(message: impl Into<String>) -> Self {
		Self::Precondition(message.into())
	}

	pub fn kind(&self) -> ErrorKind {
		match self {
			MeshError::Format(_) => ErrorKind::Format,
			MeshError::Auth => ErrorKind::Auth,
			MeshError::Precondition(_) => ErrorKind::Precondition,
			MeshError::PoolExhausted(_) => ErrorKind::PoolExhausted,
			MeshError::Backend(_) => ErrorKind::Backend,
			MeshError::Transport(_) => ErrorKind::Transport,
			MeshError::Remote { kind, .. } => *kind,
		}
	}
}

pub type Result<T> = std::result::Result<T, MeshError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn remote_error_keeps_kind_and_message() {
		let err = MeshError::Remote {
			kind: ErrorKind::Auth,
			message: "invalid access code".to_string(),
		};
		assert_eq!(err.kind(), ErrorKind::Auth);
		assert_eq!(err.to_string(), "invalid access code");
	}

	#[test]
	fn error_kind_serializes_snake_case() {
		let json = serde_json::to_string(&ErrorKind::PoolExhausted).unwrap();
		assert_eq!(json, "\"pool_exhausted\"");
		let parsed: ErrorKind = serde_json::from_str("\"precondition\"").unwrap();
		assert_eq!(parsed, ErrorKind::Precondition);
	}
}
