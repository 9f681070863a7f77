// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User and friendship commands

use chatty_core::UserId;
use clap::Subcommand;

use crate::client::{ClientError, DaemonClient};
use crate::output::{self, OutputFormat, UserRow};

#[derive(clap::Args)]
pub struct UserArgs {
    #[command(subcommand)]
    pub command: UserCommand,
}

#[derive(Subcommand)]
pub enum UserCommand {
    /// Register a user
    Add {
        username: String,
        email: String,
    },
    /// Show a user by id or email
    Show {
        /// Numeric id, or an email address
        user: String,
    },
    /// List all users
    List,
    /// List a user's friends
    Friends { user: UserId },
}

#[derive(clap::Args)]
pub struct FriendArgs {
    #[command(subcommand)]
    pub command: FriendCommand,
}

#[derive(Subcommand)]
pub enum FriendCommand {
    /// Make two users friends (in both directions)
    Add { user: UserId, friend: UserId },
}

pub async fn handle(
    command: UserCommand,
    client: &DaemonClient,
    format: OutputFormat,
) -> Result<(), ClientError> {
    match command {
        UserCommand::Add { username, email } => {
            let user = client.create_user(&username, &email).await?;
            output::print(&UserRow(user), format);
        }
        UserCommand::Show { user } => {
            let user = match user.parse::<UserId>() {
                Ok(id) => client.user(id).await?,
                Err(_) => client.user_by_email(&user).await?,
            };
            output::print(&UserRow(user), format);
        }
        UserCommand::List => {
            let users: Vec<_> = client.users().await?.into_iter().map(UserRow).collect();
            output::print_list(&users, format, "No users");
        }
        UserCommand::Friends { user } => {
            let friends: Vec<_> = client.friends(user).await?.into_iter().map(UserRow).collect();
            output::print_list(&friends, format, "No friends");
        }
    }
    Ok(())
}

pub async fn handle_friend(
    command: FriendCommand,
    client: &DaemonClient,
    format: OutputFormat,
) -> Result<(), ClientError> {
    match command {
        FriendCommand::Add { user, friend } => {
            let user = client.add_friend(user, friend).await?;
            output::print(&UserRow(user), format);
        }
    }
    Ok(())
}
