// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon status and shutdown

use std::fmt;

use chatty_engine::ServiceStats;
use serde::Serialize;

use crate::client::{ClientError, DaemonClient};
use crate::output::{self, OutputFormat};

#[derive(Serialize)]
struct StatusInfo {
    version: String,
    uptime_secs: u64,
    #[serde(flatten)]
    stats: ServiceStats,
}

impl fmt::Display for StatusInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "chattyd {}", self.version)?;
        writeln!(f, "  Uptime: {}s", self.uptime_secs)?;
        writeln!(
            f,
            "  Users: {}  Groups: {}  Messages: {}",
            self.stats.users, self.stats.groups, self.stats.messages
        )?;
        writeln!(f, "  Subscribers: {}", self.stats.subscribers)?;
        write!(f, "  WAL sequence: {}", self.stats.wal_sequence)
    }
}

pub async fn status(client: &DaemonClient, format: OutputFormat) -> Result<(), ClientError> {
    let version = client.hello().await?;
    let (uptime_secs, stats) = client.status().await?;
    let info = StatusInfo {
        version,
        uptime_secs,
        stats,
    };
    output::print(&info, format);
    Ok(())
}

pub async fn shutdown(client: &DaemonClient) -> Result<(), ClientError> {
    client.shutdown().await?;
    println!("Daemon shutting down");
    Ok(())
}
