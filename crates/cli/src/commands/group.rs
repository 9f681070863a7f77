// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Group commands

use chatty_core::{GroupId, UserId};
use clap::Subcommand;

use crate::client::{ClientError, DaemonClient};
use crate::output::{self, GroupRow, OutputFormat};

#[derive(clap::Args)]
pub struct GroupArgs {
    #[command(subcommand)]
    pub command: GroupCommand,
}

#[derive(Subcommand)]
pub enum GroupCommand {
    /// Create a group; the creator is always a member
    Create {
        name: String,
        /// Creator
        #[arg(long = "as")]
        user: UserId,
        /// Friends of the creator to add (repeatable)
        #[arg(long = "member")]
        members: Vec<UserId>,
    },
    /// Show one group
    Show { group: GroupId },
    /// List the groups a user belongs to
    List {
        #[arg(long = "as")]
        user: UserId,
    },
    /// Rename a group
    Rename { group: GroupId, name: String },
    /// Leave a group; the last member leaving deletes it
    Leave {
        group: GroupId,
        #[arg(long = "as")]
        user: UserId,
    },
    /// Delete a group and its messages
    Delete { group: GroupId },
}

pub async fn handle(
    command: GroupCommand,
    client: &DaemonClient,
    format: OutputFormat,
) -> Result<(), ClientError> {
    match command {
        GroupCommand::Create {
            name,
            user,
            members,
        } => {
            let group = client.create_group(user, &name, members).await?;
            output::print(&GroupRow(group), format);
        }
        GroupCommand::Show { group } => {
            let group = client.group(group).await?;
            output::print(&GroupRow(group), format);
        }
        GroupCommand::List { user } => {
            let groups: Vec<_> = client
                .groups_for_user(user)
                .await?
                .into_iter()
                .map(GroupRow)
                .collect();
            output::print_list(&groups, format, "No groups");
        }
        GroupCommand::Rename { group, name } => {
            let group = client.rename_group(group, &name).await?;
            output::print(&GroupRow(group), format);
        }
        GroupCommand::Leave { group, user } => {
            let left = client.leave_group(user, group).await?;
            if left.members.is_empty() {
                println!("Left group {}; it had no members left and was deleted", group);
            } else {
                output::print(&GroupRow(left), format);
            }
        }
        GroupCommand::Delete { group } => {
            client.delete_group(group).await?;
            println!("Deleted group {}", group);
        }
    }
    Ok(())
}
