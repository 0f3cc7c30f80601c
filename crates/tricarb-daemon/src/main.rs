// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! tricarbd - WireGuard mesh control-plane daemon.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tricarb_common_config::{LogFormat, StateStore};
use tricarb_common_http::BuildInfo;
use tricarb_daemon::{create_router, DaemonOptions, HttpMeshRemote, MeshDaemon};
use tricarb_wgmesh_backend::{create_backend, WgQuickDriver};

#[derive(Parser, Debug)]
#[command(name = "tricarbd", about = "WireGuard mesh control-plane daemon", version)]
struct Args {
	/// Config file to read instead of /etc/tricarb/daemon.toml
	#[arg(long, env = "TRICARB_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version and build information
	Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		let info = BuildInfo::current();
		println!("tricarbd {} ({})", info.version, info.platform);
		return Ok(());
	}

	let config = match &args.config {
		Some(path) => tricarb_common_config::load_config_with_file(path),
		None => tricarb_common_config::load_config(),
	}
	.context("loading configuration")?;

	let json = config.logging.format == LogFormat::Json;
	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| config.logging.level.clone().into()),
		)
		.with((!json).then(|| tracing_subscriber::fmt::layer()))
		.with(json.then(|| tracing_subscriber::fmt::layer().json()))
		.init();

	tracing::info!(
		host = %config.http.host,
		port = config.http.port,
		state_dir = %config.paths.state_dir.display(),
		"starting tricarbd"
	);

	let store = StateStore::open(config.paths.state_file()).context("opening state store")?;
	let backend = create_backend(
		&config.mesh.backend,
		store.clone(),
		Arc::new(WgQuickDriver::new()),
		&config.paths.tunnel_name,
	)?;
	let remote = HttpMeshRemote::new(Duration::from_millis(config.mesh.remote_timeout_ms))?;
	let daemon = MeshDaemon::new(
		DaemonOptions::from_config(&config),
		store,
		backend,
		Arc::new(remote),
	)?;

	let app = create_router(Arc::new(daemon))
		.layer(TraceLayer::new_for_http())
		.into_make_service_with_connect_info::<SocketAddr>();

	let addr = config.socket_addr();
	let listener = tokio::net::TcpListener::bind(&addr)
		.await
		.with_context(|| format!("binding {addr}"))?;
	tracing::info!(%addr, "listening");

	tokio::select! {
		result = axum::serve(listener, app) => {
			if let Err(e) = result {
				tracing::error!(error = %e, "Server error");
			}
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("Received shutdown signal");
		}
	}

	tracing::info!("Daemon shutdown complete");
	Ok(())
}
