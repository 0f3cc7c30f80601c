// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections. Each has a resolved form and a partial layer.

mod http;
mod logging;
mod mesh;
mod paths;

pub use http::{HttpConfig, HttpConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use mesh::{MeshConfig, MeshConfigLayer, PORT_RANGE};
pub use paths::{PathsConfig, PathsConfigLayer};
