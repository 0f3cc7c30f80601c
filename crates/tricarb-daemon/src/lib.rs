// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The tricarb control-plane daemon.
//!
//! One daemon runs per host. It can serve a mesh (ServerStart, then
//! ServerAttach/ServerDetach from other daemons) or join one
//! (ClientAttach/ClientDetach, issued by the local controller). All calls
//! arrive over the HTTP router in [`api`].

pub mod api;
pub mod handshake;
pub mod remote;
pub mod settings;
pub mod state;
pub mod testing;

pub use api::{create_router, ApiError, AppState};
pub use remote::{HttpMeshRemote, MeshRemote};
pub use state::{DaemonOptions, MeshDaemon, MeshSettings, MeshState};
