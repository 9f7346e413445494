//! Offline commands operating directly on the store.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use beanwatch_common::BeanwatchError;
use beanwatch_metrics::{FileStore, Lifecycle, Method, WorkUnit};
use beanwatch_server::{render_text, Config, Host, Scoreboard};

/// One unit of work as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRequest {
    pub host: String,
    pub port: u16,
    pub method: String,
    pub status: u16,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

impl RecordRequest {
    fn work_unit(&self) -> WorkUnit {
        let method = Method::from_token(&self.method.to_ascii_uppercase());
        WorkUnit::new(method, self.status)
            .with_header_only(self.method.eq_ignore_ascii_case("HEAD"))
            .with_bytes_in(self.bytes_in)
            .with_bytes_out(self.bytes_out)
    }
}

/// Loads the configuration file, or the defaults when none is given.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    Config::load(path).with_context(|| match path {
        Some(p) => format!("failed to load configuration from {}", p.display()),
        None => "invalid default configuration".to_string(),
    })
}

/// Loads the configuration for `serve`, applying a `--bind` override.
///
/// Called again on every reload so the override outlives the file's
/// `server.bind`.
pub fn serve_config(path: Option<&Path>, bind: Option<SocketAddr>) -> Result<Config> {
    let mut config = load_config(path)?;
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    Ok(config)
}

/// Runs `query` against every provider and returns the text rendering.
///
/// The store is read without resetting any window. A malformed query comes
/// back as the underlying [`BeanwatchError::BadQuery`] so callers can map it
/// to its own exit status.
pub fn query(config: Config, query: Option<&str>) -> Result<String> {
    let host = Host::open(config, Arc::new(Scoreboard::new(0))).context("failed to open store")?;
    let result = host.query(query)?;
    Ok(render_text(result.beans()))
}

/// Adds one unit of work to the owning vhost and the global aggregate.
pub fn record(config: Config, request: &RecordRequest) -> Result<()> {
    let host = Host::start(config, Arc::new(Scoreboard::new(0)), Lifecycle::WorkerFork)
        .context("failed to open store")?;
    host.vhosts()
        .record_request(Some(&request.host), request.port, &request.work_unit())
        .map_err(|e| match e {
            BeanwatchError::MissingRecord { .. } => {
                anyhow::Error::new(e).context("store is not initialized; start the server once first")
            }
            e => anyhow::Error::new(e),
        })
}

/// Deletes the store file named by `config`. The lock file stays so that
/// running servers and later processes keep sharing one lock.
pub fn reset(config: &Config) -> Result<()> {
    let path = config.store_path();
    FileStore::destroy(&path, &config.lock_path())
        .with_context(|| format!("failed to remove store {}", path.display()))
}

/// True when `err` was caused by a malformed query.
pub fn is_bad_query(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<BeanwatchError>(), Some(BeanwatchError::BadQuery(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_request_maps_method() {
        let request = RecordRequest {
            host: "a".into(),
            port: 80,
            method: "head".into(),
            status: 200,
            bytes_in: 1,
            bytes_out: 2,
        };
        let unit = request.work_unit();
        assert_eq!(unit.method, Method::Head);
        assert!(unit.header_only);
        assert_eq!(unit.bytes_out, 2);
    }

    #[test]
    fn test_serve_config_keeps_bind_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bw.toml");
        std::fs::write(&path, "[server]\nbind = \"127.0.0.1:8080\"\n").unwrap();

        let bind: SocketAddr = "127.0.0.1:9100".parse().unwrap();
        let first = serve_config(Some(&path), Some(bind)).unwrap();
        assert_eq!(first.vhost_specs()[0].port, 9100);

        // A later reload re-reads the file and must still honour the override.
        std::fs::write(&path, "[server]\nbind = \"127.0.0.1:8081\"\nserver_name = \"reloaded\"\n").unwrap();
        let reloaded = serve_config(Some(&path), Some(bind)).unwrap();
        assert_eq!(reloaded.server.bind, bind);
        assert_eq!(reloaded.server.server_name, "reloaded");
        assert_eq!(reloaded.vhost_specs()[0].port, 9100);

        assert_eq!(serve_config(Some(&path), None).unwrap().server.bind.port(), 8081);
    }

    #[test]
    fn test_bad_query_detection() {
        let err = anyhow::Error::new(BeanwatchError::BadQuery("x".into()));
        assert!(is_bad_query(&err));
        assert!(!is_bad_query(&anyhow::anyhow!("other")));
    }
}
