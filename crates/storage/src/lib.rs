// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! chatty-storage: Durable chat state
//!
//! Every mutation is appended to a write-ahead log before it is applied to
//! the in-memory [`ChatState`]; replaying the log on startup rebuilds it.

mod state;
mod wal;

pub use state::ChatState;
pub use wal::{Wal, WalError};
