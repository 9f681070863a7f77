// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Real-time event dispatch
//!
//! This module provides:
//! - `EventBus` - Fan published events out to registered subscribers
//! - `Filter` / `FilterPolicy` - Per-subscriber delivery decisions
//! - `Subscription` - The consumer's cancellable stream of matching events

mod bus;
mod filter;
mod subscription;

pub use bus::{EventBus, EventReceiver, EventSender, PublishReport};
pub use filter::{
    group_added_predicate, message_added_predicate, with_filter, Filter, FilterPolicy,
};
pub use subscription::{CloseReason, FilterArgs, SubscriberId, Subscription, TryRecvError};
