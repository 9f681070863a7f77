// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! chatty-core: Core library for the Chatty messaging backend
//!
//! This crate provides:
//! - Chat domain records (users, groups, messages) and the operations that mutate them
//! - Typed events and topics for real-time pushes
//! - An in-process event bus with per-subscriber filtering
//! - The client-side reconnection recovery state machine
//! - TOML configuration

pub mod clock;
pub mod config;
pub mod connection;
pub mod event;
pub mod events;
pub mod model;
pub mod operation;

// Re-exports
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{
    BusConfig, ChattyConfig, ConfigError, LogConfig, PolicyConfig, ReconnectConfig, ServerConfig,
};
pub use connection::{
    Connection, ConnectionEvent, ConnectionState, RecoveryEffect, ReconnectPolicy, View,
};
pub use event::{Event, Topic, UnknownTopic};
pub use events::{
    with_filter, CloseReason, EventBus, EventReceiver, Filter, FilterArgs, FilterPolicy,
    PublishReport, SubscriberId, Subscription, TryRecvError,
};
pub use model::{Group, GroupId, Message, MessageId, User, UserId};
pub use operation::Operation;
