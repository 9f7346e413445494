// Copyright 2025 Beanwatch Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Beanwatch CLI
//!
//! Command-line interface for the beanwatch bean server.
//!
//! The binary wraps the library crates:
//!
//! - `beanwatch serve`: run the HTTP query endpoint and count requests
//! - `beanwatch query`: answer a query locally against the store
//! - `beanwatch record`: add one unit of work without a running server
//! - `beanwatch reset`: delete the counter store
//!
//! The offline commands live in [`commands`] so they can be tested without
//! spawning the binary.

use anyhow::Result;
use beanwatch_server::{LogConfig, LogFormat};
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub mod commands;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` overrides the configured level. Logs go to stderr so command
/// output on stdout stays clean for piping.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.level.as_str()))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Console => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init(),
    }
    .map_err(|e| anyhow::anyhow!("failed to install logger: {}", e))
}
