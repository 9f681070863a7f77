// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! chatty-server: the Chatty daemon
//!
//! Owns the state, the WAL, and the event bus, and serves the CLI over a
//! Unix socket. The library half exposes the wire protocol so clients can
//! speak it.

pub mod lifecycle;
pub mod protocol;
pub mod server;

pub use lifecycle::{Config, DaemonState, LifecycleError};
pub use protocol::{Mutation, ProtocolError, Query, Request, Response, SubscriptionRequest};
pub use server::{ServerContext, ServerError};
