//! Beanwatch Persistent Request Counters
//!
//! This crate keeps per-entity request/response counters in a durable store
//! shared by every worker process, and publishes them as beans.
//!
//! # Architecture
//!
//! The counters engine is built from four layers:
//!
//! - [`TimespanCounters`]: Fixed-shape counters for one measurement window
//! - [`EntityRecord`]: The `forever`, `since-start` and `since-restart` windows of one entity
//! - [`MetricsStore`]: `reset`/`update`/`read` on top of a [`TransactionalStore`]
//! - [`VhostProvider`]: Classifies units of work and answers vhost bean queries
//!
//! # Features
//!
//! - **Crash-safe persistence**: [`FileStore`] commits each critical section with
//!   a single atomic file replace
//! - **Cross-process locking**: An advisory lock file serializes every read and write
//! - **Self-healing records**: Blobs of unexpected size are treated as absent
//! - **Lifecycle-driven resets**: [`Lifecycle`] decides which windows restart
//!
//! # Usage Example
//!
//! ```rust
//! use std::sync::Arc;
//! use beanwatch_common::BeanProvider;
//! use beanwatch_metrics::{
//!     Lifecycle, MemoryStore, Method, MetricsStore, VhostProvider, VhostSpec, WorkUnit,
//! };
//!
//! let store = Arc::new(MetricsStore::new(MemoryStore::new()));
//! let vhosts = [VhostSpec::new("example.com", 80)];
//! let provider = VhostProvider::new(store, &vhosts);
//! provider.on_lifecycle(Lifecycle::Startup).unwrap();
//!
//! let unit = WorkUnit::new(Method::Get, 200).with_bytes_in(100).with_bytes_out(500);
//! provider.record_request(Some("example.com"), 80, &unit).unwrap();
//!
//! let query = "query=beanwatch_vhost:Type=since-start".parse().unwrap();
//! let reply = provider.query(&query).unwrap();
//! ```
//!
//! # Thread Safety
//!
//! Stores are `Send + Sync` and are shared behind `Arc`. All access funnels
//! through one lock: an in-process mutex plus the advisory file lock for
//! [`FileStore`]. The lock is never held while beans are rendered.

mod metrics_store;
mod record;
mod store;
mod timespan;
mod vhost;

pub use metrics_store::MetricsStore;
pub use record::{EntityRecord, Window};
pub use store::{FileStore, MemoryStore, Table, TransactionalStore};
pub use timespan::{now_micros, Method, TimespanCounters, WorkUnit, START_DATE_FORMAT, TRACKED_STATUSES};
pub use vhost::{
    global_key, Lifecycle, VhostProvider, VhostSpec, ANY_PORT, GLOBAL_HOST, INFO_TYPE, KEY_PREFIX,
    VHOST_DOMAIN,
};
