// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process daemon for client tests

use chatty_core::ChattyConfig;
use chatty_server::lifecycle::{self, Config};
use chatty_server::server;
use tempfile::{tempdir, TempDir};

use crate::client::DaemonClient;

/// Start a daemon in a temp state dir, serving connections on a task
pub async fn start_daemon() -> (TempDir, DaemonClient) {
    let dir = tempdir().unwrap();
    let config =
        Config::from_parts(&ChattyConfig::default(), dir.path().to_path_buf(), None).unwrap();
    let daemon = lifecycle::startup(&config).await.unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = daemon.listener.accept().await {
            server::spawn_connection(daemon.ctx.clone(), stream);
        }
    });

    (dir, DaemonClient::new(config.socket_path))
}
