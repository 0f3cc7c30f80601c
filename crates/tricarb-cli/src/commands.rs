// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use clap::{Args, Subcommand};
use console::style;
use tricarb_common_http::BuildInfo;
use tricarb_wgmesh_common::protocol::ServerInfo;

use crate::client::DaemonClient;
use crate::error::Result;

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Show the daemon's tunnel configuration
	Status,
	/// Show CLI and daemon versions
	Version,
	/// Change the daemon's mesh defaults
	#[command(subcommand)]
	Config(ConfigCommand),
	/// Serve a mesh from this host
	#[command(subcommand)]
	Server(ServerCommand),
	/// Join or leave a mesh served elsewhere
	#[command(subcommand)]
	Client(ClientCommand),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
	/// Mesh block to derive on the next server start, e.g. 10.8.0.0/24
	SetCidr { value: String },
	/// WireGuard listen port, 10000-19999
	SetPort { value: String },
	/// Physical interface used for forwarding
	SetNic { value: String },
}

#[derive(Debug, Subcommand)]
pub enum ServerCommand {
	Start,
	Stop,
}

#[derive(Debug, Subcommand)]
pub enum ClientCommand {
	Attach(ServerArgs),
	Detach(ServerArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ServerArgs {
	/// Address of the server daemon
	#[arg(long)]
	pub host: String,

	/// RPC port of the server daemon
	#[arg(long, default_value_t = 50101)]
	pub port: u16,

	/// Access code printed by `tricarb server start`
	#[arg(long, env = "TRICARB_ACCESS_CODE", hide_env_values = true)]
	pub code: String,
}

impl From<ServerArgs> for ServerInfo {
	fn from(args: ServerArgs) -> Self {
		ServerInfo {
			host: args.host,
			port: args.port,
			access_code: args.code,
		}
	}
}

fn done(message: &str) {
	println!("{} {message}", style("✓").green().bold());
}

pub async fn run(command: Command, client: &DaemonClient) -> Result<()> {
	match command {
		Command::Status => {
			let status = client.status().await?;
			if status.config.is_empty() {
				println!("{} No interface configured", style("!").yellow().bold());
			} else {
				print!("{}", status.config);
			}
		}
		Command::Version => {
			let local = BuildInfo::current();
			println!("tricarb   {} ({})", style(local.version).cyan(), local.platform);
			let remote = client.version().await?;
			println!(
				"tricarbd  {} ({}, backend {})",
				style(&remote.version).cyan(),
				remote.platform,
				remote.backend
			);
		}
		Command::Config(ConfigCommand::SetCidr { value }) => {
			client.set_cidr(&value).await?;
			done(&format!("CIDR set to {}", style(&value).cyan()));
		}
		Command::Config(ConfigCommand::SetPort { value }) => {
			client.set_port(&value).await?;
			done(&format!("Port set to {}", style(&value).cyan()));
		}
		Command::Config(ConfigCommand::SetNic { value }) => {
			client.set_network_interface(&value).await?;
			done(&format!("Network interface set to {}", style(&value).cyan()));
		}
		Command::Server(ServerCommand::Start) => {
			let reply = client.server_start().await?;
			done("Server started");
			println!("  Address:     {}", style(&reply.address).cyan());
			println!("  Listen port: {}", style(reply.listen_port).cyan());
			println!("  Access code: {}", style(&reply.access_code).bold());
		}
		Command::Server(ServerCommand::Stop) => {
			client.server_stop().await?;
			done("Server stopped");
		}
		Command::Client(ClientCommand::Attach(args)) => {
			let host = args.host.clone();
			client.client_attach(&args.into()).await?;
			done(&format!("Attached to {}", style(host).cyan()));
		}
		Command::Client(ClientCommand::Detach(args)) => {
			let host = args.host.clone();
			client.client_detach(&args.into()).await?;
			done(&format!("Detached from {}", style(host).cyan()));
		}
	}
	Ok(())
}
