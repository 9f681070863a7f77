// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Posting and reading messages

use chatty_core::{GroupId, MessageId, UserId};
use chatty_engine::Page;

use crate::client::{ClientError, DaemonClient};
use crate::output::{self, MessageRow, OutputFormat};

#[derive(clap::Args)]
pub struct SendArgs {
    pub group: GroupId,
    pub text: String,
    /// Author; must be a member of the group
    #[arg(long = "as")]
    pub user: UserId,
}

#[derive(clap::Args)]
pub struct MessagesArgs {
    pub group: GroupId,
    /// Page size
    #[arg(long)]
    pub first: Option<usize>,
    /// Only messages older than this id
    #[arg(long)]
    pub before: Option<MessageId>,
}

pub async fn send(
    args: SendArgs,
    client: &DaemonClient,
    format: OutputFormat,
) -> Result<(), ClientError> {
    let message = client.send_message(args.user, args.group, &args.text).await?;
    output::print(&MessageRow(message), format);
    Ok(())
}

pub async fn list(
    args: MessagesArgs,
    client: &DaemonClient,
    format: OutputFormat,
) -> Result<(), ClientError> {
    let page = Page {
        first: args.first,
        before: args.before,
    };
    // newest first on the wire, oldest first on screen
    let mut messages = client.messages(args.group, page).await?;
    if matches!(format, OutputFormat::Text) {
        messages.reverse();
    }
    let rows: Vec<_> = messages.into_iter().map(MessageRow).collect();
    output::print_list(&rows, format, "No messages");
    Ok(())
}
