// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! tricarb - controller for the mesh daemon.

use clap::Parser;
use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tricarb_cli::commands::{self, Command};
use tricarb_cli::{DaemonClient, DEFAULT_DAEMON_URL};
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "tricarb", about = "Control a tricarb mesh daemon", version)]
struct Cli {
	/// Daemon RPC endpoint
	#[arg(long, global = true, env = "TRICARB_DAEMON_URL", default_value = DEFAULT_DAEMON_URL)]
	daemon: Url,

	#[command(subcommand)]
	command: Command,
}

#[tokio::main]
async fn main() {
	let cli = Cli::parse();

	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| "warn".into()),
		)
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.init();

	if let Err(e) = run(cli).await {
		eprintln!("{} {e}", style("✗").red().bold());
		std::process::exit(1);
	}
}

async fn run(cli: Cli) -> anyhow::Result<()> {
	let client = DaemonClient::new(cli.daemon)?;
	commands::run(cli.command, &client).await?;
	Ok(())
}
