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

//! Per-virtual-host request counters exposed as beans.
//!
//! Each configured virtual host, plus one global aggregate, owns a record in
//! the [`MetricsStore`]. Every completed unit of work updates the owning
//! vhost and the aggregate together. Queries render one bean per selected
//! window, and a static `info` bean per vhost that never touches the store.

use std::sync::Arc;

use beanwatch_common::{Bean, BeanProvider, Objectname, Property, Query, QueryReply, Result};

use crate::metrics_store::MetricsStore;
use crate::record::{EntityRecord, Window};
use crate::store::{FileStore, TransactionalStore};
use crate::timespan::{now_micros, WorkUnit};

/// Domain of every bean published by [`VhostProvider`].
pub const VHOST_DOMAIN: &str = "beanwatch_vhost";
/// Prefix of every store key written by [`VhostProvider`].
pub const KEY_PREFIX: &str = "beanwatch_vhost";
/// Host name reserved for the global aggregate.
pub const GLOBAL_HOST: &str = "_GLOBAL_";
/// Rendering of port 0 in objectnames.
pub const ANY_PORT: &str = "_ANY_";
/// `Type` constraint of the static configuration bean.
pub const INFO_TYPE: &str = "info";

/// Host lifecycle events that drive window resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Fresh process start: since-start and since-restart are zeroed.
    Startup,
    /// Configuration reload: since-restart is zeroed.
    Restart,
    /// A worker was spawned from an already initialized parent.
    WorkerFork,
}

/// Static description of one virtual host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VhostSpec {
    pub hostname: String,
    /// 0 means "any port".
    pub port: u16,
    pub aliases: Vec<String>,
    /// Listen addresses as `addr:port`.
    pub listen: Vec<String>,
}

impl VhostSpec {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
            aliases: Vec::new(),
            listen: Vec::new(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn with_listen(mut self, addr: impl Into<String>) -> Self {
        self.listen.push(addr.into());
        self
    }

    /// Store key of this vhost.
    pub fn store_key(&self) -> String {
        format!("{}-{}:{}", KEY_PREFIX, self.hostname, self.port)
    }

    fn answers_to(&self, host: &str, port: u16) -> bool {
        let name_matches = self.hostname.eq_ignore_ascii_case(host)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(host));
        name_matches && (self.port == 0 || port == 0 || self.port == port)
    }
}

/// Store key of the global aggregate.
pub fn global_key() -> String {
    format!("{}-{}", KEY_PREFIX, GLOBAL_HOST)
}

fn port_label(port: u16) -> String {
    if port == 0 {
        ANY_PORT.to_string()
    } else {
        port.to_string()
    }
}

fn objectname(kind: &str, host: &str, port: u16) -> Objectname {
    Objectname::new(VHOST_DOMAIN)
        .with_constraint("Type", kind)
        .with_constraint("Host", host)
        .with_constraint("Port", port_label(port))
}

/// One countable subject: a vhost or the global aggregate.
#[derive(Debug)]
struct Entity {
    key: String,
    windows: [(Window, Objectname); 3],
    info: Option<Bean>,
}

impl Entity {
    fn new(key: String, host: &str, port: u16, info: Option<Bean>) -> Self {
        let windows = Window::ALL.map(|w| (w, objectname(w.type_name(), host, port)));
        Self { key, windows, info }
    }

    fn global() -> Self {
        Self::new(global_key(), GLOBAL_HOST, 0, None)
    }

    fn vhost(spec: &VhostSpec) -> Self {
        let server_name = if spec.port == 0 {
            spec.hostname.clone()
        } else {
            format!("{}:{}", spec.hostname, spec.port)
        };
        let info = Bean::new(objectname(INFO_TYPE, &spec.hostname, spec.port))
            .with(Property::string("ServerName", server_name))
            .with(Property::string("ServerAliases", spec.aliases.join(",")))
            .with(Property::string("ListenAddresses", spec.listen.join(",")));
        Self::new(spec.store_key(), &spec.hostname, spec.port, Some(info))
    }
}

/// Bean provider and update path for virtual host counters.
pub struct VhostProvider<S = FileStore> {
    store: Arc<MetricsStore<S>>,
    global: Entity,
    vhosts: Vec<(VhostSpec, Entity)>,
}

impl<S: TransactionalStore> VhostProvider<S> {
    /// Creates a provider for `vhosts`, in configuration order.
    ///
    /// No store access happens here; call [`VhostProvider::on_lifecycle`]
    /// before recording any work.
    pub fn new(store: Arc<MetricsStore<S>>, vhosts: &[VhostSpec]) -> Self {
        let vhosts = vhosts
            .iter()
            .map(|spec| (spec.clone(), Entity::vhost(spec)))
            .collect();
        Self {
            store,
            global: Entity::global(),
            vhosts,
        }
    }

    pub fn store(&self) -> &Arc<MetricsStore<S>> {
        &self.store
    }

    /// Store keys of every entity, global aggregate first.
    pub fn entity_keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.global.key.as_str())
            .chain(self.vhosts.iter().map(|(_, e)| e.key.as_str()))
    }

    /// Applies the reset rules for `lifecycle` to every entity.
    ///
    /// # Errors
    ///
    /// Stops at the first entity whose reset fails.
    pub fn on_lifecycle(&self, lifecycle: Lifecycle) -> Result<()> {
        let is_process_start = match lifecycle {
            Lifecycle::Startup => true,
            Lifecycle::Restart => false,
            Lifecycle::WorkerFork => return self.store.reopen(),
        };

        for key in self.entity_keys() {
            self.store.reset(key, is_process_start)?;
        }

        tracing::info!(
            ?lifecycle,
            entities = self.vhosts.len() + 1,
            "reset vhost metrics windows"
        );
        Ok(())
    }

    /// Store key of the vhost serving `host` on `port`, falling back to the
    /// first configured vhost. A `port` of 0 means the port is unknown.
    /// `None` when no vhost is configured.
    pub fn resolve(&self, host: Option<&str>, port: u16) -> Option<&str> {
        let host = host.map(strip_port);
        host.and_then(|h| self.vhosts.iter().find(|(spec, _)| spec.answers_to(h, port)))
            .or_else(|| self.vhosts.first())
            .map(|(_, entity)| entity.key.as_str())
    }

    /// Records one unit of work against `entity_key` and the global aggregate.
    pub fn record(&self, entity_key: &str, unit: &WorkUnit) -> Result<()> {
        self.store.update_pair(entity_key, &self.global.key, unit)
    }

    /// Resolves the owning vhost from a `Host` header and records `unit`.
    /// With no vhost configured only the global aggregate is updated.
    pub fn record_request(&self, host: Option<&str>, port: u16, unit: &WorkUnit) -> Result<()> {
        match self.resolve(host, port) {
            Some(key) => self.record(key, unit),
            None => self.store.update(&self.global.key, unit),
        }
    }

    fn collect(&self, entity: &Entity, query: &Query, beans: &mut Vec<Bean>) -> Result<()> {
        let selected: Vec<_> = entity
            .windows
            .iter()
            .filter(|(_, name)| query.matches(name))
            .collect();

        if !selected.is_empty() {
            let now = now_micros();
            let record = match self.store.read(&entity.key)? {
                Some(record) => record,
                None => {
                    tracing::warn!(key = %entity.key, "no metrics record, reporting an empty one");
                    EntityRecord::fresh(now)
                }
            };

            for (window, name) in selected {
                let mut bean = Bean::new(name.clone());
                bean.extend(record.window(*window).properties(now));
                beans.push(bean);
            }
        }

        if let Some(info) = &entity.info {
            if query.matches(info.objectname()) {
                beans.push(info.clone());
            }
        }

        Ok(())
    }
}

fn strip_port(host: &str) -> &str {
    // Bracketed IPv6 literals keep their colons.
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    host.split(':').next().unwrap_or(host)
}

impl<S: TransactionalStore> BeanProvider for VhostProvider<S> {
    fn name(&self) -> &str {
        "vhost"
    }

    fn query(&self, query: &Query) -> Result<QueryReply> {
        let mut beans = Vec::new();
        self.collect(&self.global, query, &mut beans)?;
        for (_, entity) in &self.vhosts {
            self.collect(entity, query, &mut beans)?;
        }
        Ok(QueryReply::from_beans(beans))
    }
}
