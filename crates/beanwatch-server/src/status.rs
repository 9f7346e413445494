//! Server status provider
//!
//! Publishes a single `beanwatch_status` bean describing the running server:
//! identity, uptime, restart generation and worker occupancy. With extended
//! status enabled it also carries access and traffic totals plus rates.
//!
//! The figures come from a [`Scoreboard`] the HTTP server updates as it
//! accepts connections and finishes requests.

use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use beanwatch_common::{Bean, BeanProvider, Objectname, Property, Query, QueryReply, Result};
use beanwatch_metrics::{now_micros, START_DATE_FORMAT};
use chrono::{DateTime, Utc};

pub const STATUS_DOMAIN: &str = "beanwatch_status";

/// Live occupancy and traffic figures shared between the server and the
/// status provider.
#[derive(Debug)]
pub struct Scoreboard {
    /// Upper bound on concurrently served requests
    capacity: u32,
    busy: AtomicU32,
    total_accesses: AtomicU64,
    total_bytes: AtomicU64,
    generation: AtomicU32,
    started_at: i64,
    restarted_at: AtomicI64,
}

/// Marks a request as in flight until dropped.
pub struct BusyGuard<'a> {
    scoreboard: &'a Scoreboard,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.scoreboard.busy.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Scoreboard {
    pub fn new(capacity: u32) -> Self {
        let now = now_micros();
        Self {
            capacity,
            busy: AtomicU32::new(0),
            total_accesses: AtomicU64::new(0),
            total_bytes: AtomicU64::new(0),
            generation: AtomicU32::new(0),
            started_at: now,
            restarted_at: AtomicI64::new(now),
        }
    }

    /// Scoreboard sized to the machine's available parallelism.
    pub fn with_default_capacity() -> Self {
        let capacity = std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(1);
        Self::new(capacity)
    }

    pub fn begin_request(&self) -> BusyGuard<'_> {
        self.busy.fetch_add(1, Ordering::AcqRel);
        BusyGuard { scoreboard: self }
    }

    pub fn record_access(&self, bytes: u64) {
        self.total_accesses.fetch_add(1, Ordering::Relaxed);
        self.total_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Bumps the generation after a configuration reload.
    pub fn record_restart(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.restarted_at.store(now_micros(), Ordering::Release);
    }

    pub fn busy(&self) -> u32 {
        self.busy.load(Ordering::Acquire)
    }

    pub fn idle(&self) -> u32 {
        self.capacity.saturating_sub(self.busy())
    }

    pub fn total_accesses(&self) -> u64 {
        self.total_accesses.load(Ordering::Relaxed)
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes.load(Ordering::Relaxed)
    }

    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }
}

impl Default for Scoreboard {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Provider for the `Name=ServerStatus` bean.
pub struct StatusProvider {
    objectname: Objectname,
    server_name: String,
    extended: bool,
    scoreboard: Arc<Scoreboard>,
}

impl StatusProvider {
    pub fn new(server_name: impl Into<String>, extended: bool, scoreboard: Arc<Scoreboard>) -> Self {
        let objectname = Objectname::new(STATUS_DOMAIN)
            .with_constraint("Name", "ServerStatus")
            .with_constraint("Type", if extended { "Extended" } else { "Normal" });
        Self {
            objectname,
            server_name: server_name.into(),
            extended,
            scoreboard,
        }
    }

    fn bean(&self) -> Bean {
        let sb = &self.scoreboard;
        let now = now_micros();
        let uptime = (now.saturating_sub(sb.started_at) / 1_000_000).max(0) as u64;

        let mut bean = Bean::new(self.objectname.clone())
            .with(Property::string("ServerName", self.server_name.clone()))
            .with(Property::string("ServerVersion", concat!("beanwatch/", env!("CARGO_PKG_VERSION"))))
            .with(Property::string("ServerBuilt", format_time(built_at())))
            .with(Property::string("CurrentTime", format_time(now)))
            .with(Property::string("RestartTime", format_time(sb.restarted_at.load(Ordering::Acquire))))
            .with(Property::i32("ParentServerGeneration", sb.generation() as i32))
            .with(Property::u64("ServerUptimeSeconds", uptime));

        if self.extended {
            let accesses = sb.total_accesses();
            let kilobytes = sb.total_bytes() / 1024;
            bean.push(Property::u64("TotalAccesses", accesses));
            bean.push(Property::u64("TotalTrafficKilobytes", kilobytes));
            if uptime > 0 {
                bean.push(Property::f32("ReqPerSec", accesses as f32 / uptime as f32));
                bean.push(Property::f32("KilobytesPerSec", kilobytes as f32 / uptime as f32));
            }
            if accesses > 0 {
                bean.push(Property::u64("KilobytesPerReq", kilobytes / accesses));
            }
        }

        bean.with(Property::u32("BusyWorkers", sb.busy()))
            .with(Property::u32("IdleWorkers", sb.idle()))
    }
}

/// Build time of this binary, microseconds since the Unix epoch.
fn built_at() -> i64 {
    env!("BEANWATCH_BUILT_MICROS").parse().unwrap_or(0)
}

fn format_time(micros: i64) -> String {
    DateTime::<Utc>::from_timestamp_micros(micros)
        .map(|dt| dt.format(START_DATE_FORMAT).to_string())
        .unwrap_or_default()
}

impl BeanProvider for StatusProvider {
    fn name(&self) -> &str {
        "status"
    }

    fn query(&self, query: &Query) -> Result<QueryReply> {
        if !query.matches(&self.objectname) {
            return Ok(QueryReply::NoMatch);
        }
        Ok(QueryReply::Beans(vec![self.bean()]))
    }
}
