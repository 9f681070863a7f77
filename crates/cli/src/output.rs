// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output formatting for CLI commands

use std::fmt;

use chatty_core::{Event, Group, Message, User};
use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Print output in the specified format
pub fn print<T: Serialize + fmt::Display>(value: &T, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", value),
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(value) {
                println!("{}", json);
            }
        }
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + fmt::Display>(items: &[T], format: OutputFormat, empty: &str) {
    match format {
        OutputFormat::Text if items.is_empty() => println!("{}", empty),
        OutputFormat::Text => {
            for item in items {
                println!("{}", item);
            }
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(items) {
                println!("{}", json);
            }
        }
    }
}

/// Print one line per streamed item; JSON output is one compact object per line
pub fn print_line<T: Serialize + fmt::Display>(value: &T, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", value),
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string(value) {
                println!("{}", json);
            }
        }
    }
}

#[derive(Serialize)]
#[serde(transparent)]
pub struct UserRow(pub User);

impl fmt::Display for UserRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<6} {:<20} {}",
            self.0.id, self.0.username, self.0.email
        )
    }
}

#[derive(Serialize)]
#[serde(transparent)]
pub struct GroupRow(pub Group);

impl fmt::Display for GroupRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let members: Vec<String> = self.0.members.iter().map(|m| m.to_string()).collect();
        write!(
            f,
            "{:<6} {:<20} members: {}",
            self.0.id,
            self.0.name,
            members.join(",")
        )
    }
}

#[derive(Serialize)]
#[serde(transparent)]
pub struct MessageRow(pub Message);

impl fmt::Display for MessageRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] #{} <{}> {}",
            self.0.created_at.format("%Y-%m-%d %H:%M:%S"),
            self.0.id,
            self.0.author,
            self.0.text
        )
    }
}

#[derive(Serialize)]
#[serde(transparent)]
pub struct EventRow(pub Event);

impl fmt::Display for EventRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Event::MessageAdded { message } => {
                write!(f, "message in {}: {}", message.group_id, MessageRow(message.clone()))
            }
            Event::GroupAdded { group } => write!(f, "added to {}", GroupRow(group.clone())),
        }
    }
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
