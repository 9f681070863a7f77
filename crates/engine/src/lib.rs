// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Chatty resolvers: validation, persistence, and event publication

mod error;
mod service;

pub use error::ServiceError;
pub use service::{ChatService, Page, ServiceDeps, ServiceStats, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
