//! Beanwatch Server
//!
//! This crate hosts the bean providers behind a plain-text HTTP endpoint and
//! owns the configuration and lifecycle that drive the vhost counters.

pub mod config;
pub mod example;
pub mod host;
pub mod http_router;
pub mod http_server;
pub mod render;
pub mod status;

pub use config::{Config, ConfigError, LogConfig, LogFormat, LogLevel};
pub use example::ExampleProvider;
pub use host::Host;
pub use http_router::BeanRouter;
pub use http_server::{HostHandle, HttpServer};
pub use render::render_text;
pub use status::{Scoreboard, StatusProvider};
