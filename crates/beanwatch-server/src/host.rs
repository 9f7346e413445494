//! Host wiring
//!
//! A [`Host`] is everything one server generation needs: the loaded
//! configuration, the metrics store, the provider registry and the status
//! scoreboard. It is built once at startup and rebuilt on every reload; the
//! scoreboard survives reloads so uptime and totals keep counting.

use std::sync::Arc;

use beanwatch_common::{Dispatch, ProviderRegistry, Query, Result};
use beanwatch_metrics::{FileStore, Lifecycle, MetricsStore, VhostProvider, WorkUnit};

use crate::config::Config;
use crate::example::ExampleProvider;
use crate::status::{Scoreboard, StatusProvider};

pub struct Host {
    config: Config,
    vhosts: Arc<VhostProvider>,
    scoreboard: Arc<Scoreboard>,
    registry: ProviderRegistry,
}

impl Host {
    /// Opens the store and registers every provider without touching any
    /// counters. Use [`Host::start`] for a serving process.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store directory or lock file cannot
    /// be created.
    pub fn open(config: Config, scoreboard: Arc<Scoreboard>) -> Result<Self> {
        let store = FileStore::open(config.store_path(), config.lock_path())?;
        let vhosts = Arc::new(VhostProvider::new(
            Arc::new(MetricsStore::new(store)),
            &config.vhost_specs(),
        ));

        let mut registry = ProviderRegistry::new();
        registry.register(vhosts.clone());
        registry.register(Arc::new(StatusProvider::new(
            config.server.server_name.clone(),
            config.server.extended_status,
            scoreboard.clone(),
        )));
        registry.register(Arc::new(ExampleProvider::new()));

        Ok(Self {
            config,
            vhosts,
            scoreboard,
            registry,
        })
    }

    /// Opens the host and applies `lifecycle` to every vhost record.
    pub fn start(config: Config, scoreboard: Arc<Scoreboard>, lifecycle: Lifecycle) -> Result<Self> {
        let host = Self::open(config, scoreboard)?;
        host.vhosts.on_lifecycle(lifecycle)?;
        tracing::info!(
            ?lifecycle,
            store = %host.config.store_path().display(),
            providers = host.registry.len(),
            "host started"
        );
        Ok(host)
    }

    /// Builds the next generation from `config` after a graceful restart.
    pub fn reload(&self, config: Config) -> Result<Self> {
        let host = Self::start(config, self.scoreboard.clone(), Lifecycle::Restart)?;
        self.scoreboard.record_restart();
        Ok(host)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn vhosts(&self) -> &VhostProvider {
        &self.vhosts
    }

    pub fn scoreboard(&self) -> &Arc<Scoreboard> {
        &self.scoreboard
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Parses raw query arguments and runs them across all providers.
    pub fn query(&self, args: Option<&str>) -> Result<Dispatch> {
        let query = Query::parse(args)?;
        self.registry.dispatch(&query)
    }

    /// Records a completed request against its vhost and the global
    /// aggregate. Failures are logged; the request itself already completed.
    pub fn record(&self, host_header: Option<&str>, port: u16, unit: &WorkUnit) {
        self.scoreboard.record_access(unit.effective_bytes_out());
        if let Err(e) = self.vhosts.record_request(host_header, port, unit) {
            tracing::error!(error = %e, host = host_header.unwrap_or("-"), "failed to record request metrics");
        }
    }
}
