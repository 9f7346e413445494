//! HTTP Router for bean queries
//!
//! Maps one HTTP request onto the provider registry and back into a status
//! code and text body. The router knows nothing about connections; the
//! [`HttpServer`](crate::http_server::HttpServer) feeds it parsed requests.
//!
//! # Routing
//!
//! - `GET <handler_path>?query=...` - dispatch and render as text
//! - `HEAD <handler_path>?...` - same status and headers, no body
//! - any other method on the handler path - `405 Method Not Allowed`
//! - any other path - `404 Not Found`

use hyper::{Method, StatusCode};

use crate::host::Host;
use crate::render::render_text;

/// Status and body produced for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedResponse {
    pub status: StatusCode,
    pub body: String,
}

impl RoutedResponse {
    fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Stateless router; the host is passed per request so reloads take effect
/// immediately.
pub struct BeanRouter;

impl BeanRouter {
    /// Handles one request against `host`.
    ///
    /// `query` is the raw, undecoded query string of the request URI.
    pub fn route(host: &Host, method: &Method, path: &str, query: Option<&str>) -> RoutedResponse {
        if path != host.config().server.handler_path {
            return RoutedResponse::new(StatusCode::NOT_FOUND, "Not Found\n");
        }

        if method != Method::GET && method != Method::HEAD {
            return RoutedResponse::new(StatusCode::METHOD_NOT_ALLOWED, "Only GET is supported\n");
        }

        match host.query(query) {
            Ok(result) => {
                let body = if method == Method::HEAD {
                    String::new()
                } else {
                    render_text(result.beans())
                };
                RoutedResponse::new(StatusCode::OK, body)
            }
            Err(e) if e.is_client_error() => {
                tracing::debug!(error = %e, query = query.unwrap_or(""), "rejected query");
                RoutedResponse::new(StatusCode::BAD_REQUEST, format!("{}\n", e))
            }
            Err(e) => {
                tracing::error!(error = %e, query = query.unwrap_or(""), "query failed");
                RoutedResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error\n")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::status::Scoreboard;
    use beanwatch_metrics::Lifecycle;
    use std::sync::Arc;

    fn host(dir: &tempfile::TempDir) -> Host {
        let mut config = Config::default();
        config.server.server_root = dir.path().to_path_buf();
        Host::start(config, Arc::new(Scoreboard::new(1)), Lifecycle::Startup).unwrap()
    }

    #[test]
    fn test_get_renders_beans() {
        let dir = tempfile::tempdir().unwrap();
        let host = host(&dir);
        let res = BeanRouter::route(&host, &Method::GET, "/bmx", Some("query=beanwatch_example:*"));
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.body.starts_with("Name: beanwatch_example:"));
    }

    #[test]
    fn test_head_has_no_body() {
        let dir = tempfile::tempdir().unwrap();
        let host = host(&dir);
        let res = BeanRouter::route(&host, &Method::HEAD, "/bmx", None);
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.body.is_empty());
    }

    #[test]
    fn test_empty_result_is_ok_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let host = host(&dir);
        let res = BeanRouter::route(&host, &Method::GET, "/bmx", Some("query=nothing:*"));
        assert_eq!(res, RoutedResponse::new(StatusCode::OK, ""));
    }

    #[test]
    fn test_bad_query_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let host = host(&dir);
        let res = BeanRouter::route(&host, &Method::GET, "/bmx", Some("query=broken"));
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_store_failure_is_500() {
        let dir = tempfile::tempdir().unwrap();
        let host = host(&dir);
        let store = dir.path().join("logs/vhost.db");
        std::fs::remove_file(&store).unwrap();
        std::fs::create_dir(&store).unwrap();

        let res = BeanRouter::route(&host, &Method::GET, "/bmx", Some("query=beanwatch_vhost:*"));
        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);

        // Providers that never touch the store still answer.
        let res = BeanRouter::route(&host, &Method::GET, "/bmx", Some("query=beanwatch_example:*"));
        assert_eq!(res.status, StatusCode::OK);
    }

    #[test]
    fn test_wrong_method_and_path() {
        let dir = tempfile::tempdir().unwrap();
        let host = host(&dir);
        assert_eq!(
            BeanRouter::route(&host, &Method::POST, "/bmx", None).status,
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            BeanRouter::route(&host, &Method::GET, "/other", None).status,
            StatusCode::NOT_FOUND
        );
    }
}
