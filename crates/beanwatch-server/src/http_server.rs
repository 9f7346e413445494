//! HTTP Server for beanwatch
//!
//! This module provides the HTTP server using hyper for HTTP/1.1. Every
//! request is answered through the [`BeanRouter`] and then recorded as one
//! unit of work against the vhost named by its `Host` header.
//!
//! # Architecture
//!
//! The HTTP server:
//! - Listens on a TCP socket for incoming HTTP connections
//! - Spawns a tokio task for each connection
//! - Routes each request through the current [`Host`] generation
//! - Records the finished request in the vhost counters
//!
//! The current host sits behind a lock so a reload can swap in a new
//! generation while connections are being served.
//!
//! # Example
//!
//! ```no_run
//! use beanwatch_server::{Config, Host, HttpServer, Scoreboard};
//! use beanwatch_metrics::Lifecycle;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::default();
//!     let bind = config.server.bind;
//!     let host = Host::start(config, Arc::new(Scoreboard::default()), Lifecycle::Startup).unwrap();
//!     let server = HttpServer::new(host);
//!     server.run(bind).await.unwrap();
//! }
//! ```

use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};

use beanwatch_common::{BeanwatchError, Result};
use beanwatch_metrics::{Method as WorkMethod, WorkUnit};
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE, HOST};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use crate::config::Config;
use crate::host::Host;
use crate::http_router::{BeanRouter, RoutedResponse};
use crate::render::TEXT_CONTENT_TYPE;

/// Shared, swappable reference to the current host generation.
#[derive(Clone)]
pub struct HostHandle {
    current: Arc<RwLock<Arc<Host>>>,
}

impl HostHandle {
    pub fn new(host: Host) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(host))),
        }
    }

    /// Snapshot of the current generation.
    pub fn get(&self) -> Arc<Host> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Builds the next generation from `config` and swaps it in. On error
    /// the current generation keeps serving.
    pub fn reload(&self, config: Config) -> Result<()> {
        let next = self.get().reload(config)?;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
        tracing::info!("configuration reloaded");
        Ok(())
    }
}

/// HTTP server answering bean queries.
pub struct HttpServer {
    host: HostHandle,
}

impl HttpServer {
    pub fn new(host: Host) -> Self {
        Self {
            host: HostHandle::new(host),
        }
    }

    /// Handle for reloading the served host from another task.
    pub fn handle(&self) -> HostHandle {
        self.host.clone()
    }

    /// Binds `addr` and serves until the accept loop fails.
    pub async fn run(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serves connections from an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let local = listener.local_addr()?;
        tracing::info!("HTTP server listening on {}", local);

        loop {
            let (stream, _) = listener.accept().await?;

            let io = TokioIo::new(stream);
            let handle = self.host.clone();
            let port = local.port();

            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    let handle = handle.clone();
                    async move { Self::handle_request(handle.get(), port, req).await }
                });

                if let Err(err) = http1::Builder::new()
                    .serve_connection(io, service)
                    .await
                {
                    tracing::error!("Error serving connection: {}", err);
                }
            });
        }
    }

    /// Handles one HTTP request and records it.
    ///
    /// Routing and recording take the store lock and may fsync, so they run
    /// on the blocking pool.
    async fn handle_request(
        host: Arc<Host>,
        port: u16,
        req: Request<Incoming>,
    ) -> std::result::Result<Response<Full<Bytes>>, BeanwatchError> {
        let _busy = host.scoreboard().begin_request();

        let (parts, body) = req.into_parts();
        let bytes_in = count_body(body).await;

        let worker = Arc::clone(&host);
        let routed = tokio::task::spawn_blocking(move || {
            let routed = BeanRouter::route(&worker, &parts.method, parts.uri.path(), parts.uri.query());
            let unit = WorkUnit::new(WorkMethod::from_token(parts.method.as_str()), routed.status.as_u16())
                .with_header_only(parts.method == Method::HEAD)
                .with_bytes_in(bytes_in)
                .with_bytes_out(routed.body.len() as u64);
            let host_header = parts.headers.get(HOST).and_then(|v| v.to_str().ok());
            worker.record(host_header, port, &unit);
            routed
        })
        .await;

        let routed = match routed {
            Ok(routed) => routed,
            Err(e) => {
                tracing::error!(error = %e, "request handler task failed");
                RoutedResponse {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    body: "Internal Server Error\n".to_string(),
                }
            }
        };

        let mut response = Response::new(Full::new(Bytes::from(routed.body)));
        *response.status_mut() = routed.status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_CONTENT_TYPE));
        Ok(response)
    }
}

/// Drains a request body, counting its data bytes without buffering them.
async fn count_body(mut body: Incoming) -> u64 {
    let mut total = 0u64;
    while let Some(frame) = body.frame().await {
        match frame {
            Ok(frame) => {
                if let Some(data) = frame.data_ref() {
                    total += data.len() as u64;
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "request body ended early");
                break;
            }
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Scoreboard;
    use beanwatch_metrics::Lifecycle;
    use http_body_util::Empty;
    use hyper::client::conn::http1 as client_http1;
    use tokio::net::TcpStream;

    async fn start_test_server(dir: &tempfile::TempDir) -> (SocketAddr, HostHandle) {
        let mut config = Config::default();
        config.server.server_root = dir.path().to_path_buf();
        let host = Host::start(config, Arc::new(Scoreboard::new(4)), Lifecycle::Startup).unwrap();
        let server = HttpServer::new(host);
        let handle = server.handle();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(server.serve(listener));
        (addr, handle)
    }

    async fn get(addr: SocketAddr, method: Method, uri: &str) -> (hyper::StatusCode, String, Option<String>) {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (mut sender, conn) = client_http1::handshake(TokioIo::new(stream)).await.unwrap();
        tokio::spawn(conn);

        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(HOST, "localhost")
            .body(Empty::<Bytes>::new())
            .unwrap();
        let res = sender.send_request(req).await.unwrap();
        let status = res.status();
        let content_type = res
            .headers()
            .get(CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let body = res.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap(), content_type)
    }

    #[tokio::test]
    async fn test_serves_text_beans() {
        let dir = tempfile::tempdir().unwrap();
        let (addr, _) = start_test_server(&dir).await;

        let (status, body, content_type) = get(addr, Method::GET, "/bmx?query=beanwatch_example:*").await;
        assert_eq!(status, hyper::StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some(TEXT_CONTENT_TYPE));
        assert!(body.contains("SomeString: This is a string\n"));
    }

    #[tokio::test]
    async fn test_requests_are_counted() {
        let dir = tempfile::tempdir().unwrap();
        let (addr, handle) = start_test_server(&dir).await;

        get(addr, Method::GET, "/missing").await;
        get(addr, Method::GET, "/bmx?query=broken").await;

        let host = handle.get();
        let record = host
            .vhosts()
            .store()
            .read(&beanwatch_metrics::global_key())
            .unwrap()
            .unwrap();
        assert_eq!(record.forever.total_requests, 2);
        assert_eq!(record.forever.responses_for(404), 1);
        assert_eq!(record.forever.requests_for(WorkMethod::Get), 2);
        assert_eq!(host.scoreboard().busy(), 0);
    }

    #[tokio::test]
    async fn test_request_body_bytes_are_counted() {
        let dir = tempfile::tempdir().unwrap();
        let (addr, handle) = start_test_server(&dir).await;

        let stream = TcpStream::connect(addr).await.unwrap();
        let (mut sender, conn) = client_http1::handshake(TokioIo::new(stream)).await.unwrap();
        tokio::spawn(conn);

        let req = Request::builder()
            .method(Method::POST)
            .uri("/missing")
            .header(HOST, "localhost")
            .body(Full::new(Bytes::from(vec![b'x'; 256 * 1024])))
            .unwrap();
        let res = sender.send_request(req).await.unwrap();
        assert_eq!(res.status(), hyper::StatusCode::NOT_FOUND);
        res.into_body().collect().await.unwrap();

        let record = handle
            .get()
            .vhosts()
            .store()
            .read(&beanwatch_metrics::global_key())
            .unwrap()
            .unwrap();
        assert_eq!(record.forever.requests_for(WorkMethod::Post), 1);
        assert_eq!(record.forever.in_bytes[2], 256 * 1024);
        assert_eq!(record.forever.in_low_bytes, 256 * 1024);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_store_lock_wait_does_not_stall_runtime() {
        use beanwatch_metrics::{FileStore, TransactionalStore};
        use std::time::{Duration, Instant};

        let dir = tempfile::tempdir().unwrap();
        let (addr, handle) = start_test_server(&dir).await;
        let config = handle.get().config().clone();

        // Another process-level handle holds the store lock for a while.
        let (locked_tx, locked_rx) = std::sync::mpsc::channel();
        let holder = std::thread::spawn(move || {
            let store = FileStore::open(config.store_path(), config.lock_path()).unwrap();
            store
                .with_lock("hold", "test", |_| {
                    locked_tx.send(()).unwrap();
                    std::thread::sleep(Duration::from_millis(800));
                    Ok(())
                })
                .unwrap();
        });
        locked_rx.recv().unwrap();

        let request = tokio::spawn(get(addr, Method::GET, "/missing"));

        // The request waits on the lock; the runtime thread must stay free.
        let start = Instant::now();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(start.elapsed() < Duration::from_millis(500), "runtime stalled for {:?}", start.elapsed());

        let (status, _, _) = request.await.unwrap();
        assert_eq!(status, hyper::StatusCode::NOT_FOUND);
        holder.join().unwrap();
    }

    #[tokio::test]
    async fn test_reload_swaps_generation() {
        let dir = tempfile::tempdir().unwrap();
        let (_, handle) = start_test_server(&dir).await;

        let mut config = Config::default();
        config.server.server_root = dir.path().to_path_buf();
        config.server.handler_path = "/beans".to_string();
        handle.reload(config).unwrap();

        assert_eq!(handle.get().config().server.handler_path, "/beans");
        assert_eq!(handle.get().scoreboard().generation(), 1);
    }
}
