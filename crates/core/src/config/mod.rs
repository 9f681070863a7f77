// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration modules

mod settings;

pub use settings::{
    BusConfig, ChattyConfig, ConfigError, LogConfig, PolicyConfig, ReconnectConfig,
    ServerConfig, CONFIG_ENV,
};
