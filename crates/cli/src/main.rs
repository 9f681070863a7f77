// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! chatty - command-line client for the Chatty daemon

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;
mod error;
mod output;

#[cfg(test)]
mod test_support;

use std::path::PathBuf;

use anyhow::Result;
use chatty_core::{ChattyConfig, ReconnectPolicy};
use clap::{Parser, Subcommand};
use commands::{daemon, group, message, user, watch};

use crate::client::{resolve_socket_path, ClientError, DaemonClient};
use crate::error::CliError;
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "chatty", version, about = "Chatty - group chat from the terminal")]
struct Cli {
    /// Daemon socket (defaults to the daemon's own resolution)
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    /// Config file (defaults to $CHATTY_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// User management
    User(user::UserArgs),
    /// Friendships
    Friend(user::FriendArgs),
    /// Group management
    Group(group::GroupArgs),
    /// Post a message to a group
    Send(message::SendArgs),
    /// Read a group's messages
    Messages(message::MessagesArgs),
    /// Stream live events, reconnecting as needed
    Watch(watch::WatchArgs),
    /// Show daemon status
    Status,
    /// Stop the daemon
    Shutdown,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging();

    let settings = ChattyConfig::load(cli.config.as_deref())?;
    let socket_path = resolve_socket_path(cli.socket, &settings)?;
    let client = DaemonClient::new(socket_path.clone());
    let format = cli.format;

    let result = match cli.command {
        Commands::User(args) => user::handle(args.command, &client, format).await,
        Commands::Friend(args) => user::handle_friend(args.command, &client, format).await,
        Commands::Group(args) => group::handle(args.command, &client, format).await,
        Commands::Send(args) => message::send(args, &client, format).await,
        Commands::Messages(args) => message::list(args, &client, format).await,
        Commands::Watch(args) => {
            let policy = ReconnectPolicy::from(&settings.reconnect);
            watch::handle(args, client, policy, format).await
        }
        Commands::Status => daemon::status(&client, format).await,
        Commands::Shutdown => daemon::shutdown(&client).await,
    };

    result.map_err(|e: ClientError| CliError::from_client(e, &socket_path).into())
}

fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
