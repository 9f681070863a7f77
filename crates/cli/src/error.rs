// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-friendly error display with context and suggestions.

use std::fmt;
use std::path::Path;

use crate::client::ClientError;

/// Error with context and recovery suggestions for user-friendly display.
#[derive(Debug)]
pub struct CliError {
    /// What went wrong
    pub message: String,
    /// Why it might have happened
    pub context: Vec<String>,
    /// How to fix it
    pub suggestions: Vec<String>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Error for when no daemon is listening on the socket.
    pub fn daemon_not_running(socket_path: &Path) -> Self {
        CliError::new("Daemon not running")
            .with_context(format!("No socket at {}", socket_path.display()))
            .with_suggestion("Start the daemon: chattyd")
            .with_suggestion("Point at a running daemon: chatty --socket <PATH> ...")
    }

    /// Error for when the daemon refused a request.
    pub fn rejected(message: &str) -> Self {
        CliError::new(format!("Request rejected: {}", message))
    }

    /// Error for when `watch` gave up reconnecting.
    pub fn retries_exhausted(attempts: u32) -> Self {
        CliError::new("Lost connection to the daemon")
            .with_context(format!("Gave up after {} reconnect attempts", attempts))
            .with_suggestion("Check the daemon is running: chatty status")
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            for ctx in &self.context {
                writeln!(f, "  -> {}", ctx)?;
            }
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            writeln!(f, "suggestions:")?;
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for CliError {}

impl CliError {
    /// Translate a client failure into something a person can act on
    pub fn from_client(err: ClientError, socket_path: &Path) -> Self {
        match err {
            ClientError::DaemonNotRunning => CliError::daemon_not_running(socket_path),
            ClientError::Rejected(message) => CliError::rejected(&message),
            ClientError::RetriesExhausted(attempts) => CliError::retries_exhausted(attempts),
            other => CliError::new(other.to_string()),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
