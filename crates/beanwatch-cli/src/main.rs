//! # Beanwatch CLI Entry Point
//!
//! ## Usage
//!
//! ```bash
//! # Serve bean queries on the configured address
//! beanwatch serve -c beanwatch.toml
//!
//! # Query the store without a running server
//! beanwatch query -c beanwatch.toml 'query=beanwatch_vhost:Type=forever'
//!
//! # Record one request offline
//! beanwatch record -c beanwatch.toml --host example.com --method GET --status 200
//!
//! # Start over with empty counters
//! beanwatch reset -c beanwatch.toml
//! ```
//!
//! Sending `SIGHUP` to a running server reloads the configuration and starts
//! a new since-restart window.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use argh::FromArgs;
use beanwatch_cli::commands::{self, RecordRequest};
use beanwatch_metrics::Lifecycle;
use beanwatch_server::{Host, HostHandle, HttpServer, Scoreboard};

/// Exit status for a malformed query.
const EXIT_BAD_QUERY: u8 = 2;

#[derive(FromArgs)]
/// beanwatch - live server beans over HTTP
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Serve(ServeArgs),
    Query(QueryArgs),
    Record(RecordArgs),
    Reset(ResetArgs),
}

#[derive(FromArgs)]
#[argh(subcommand, name = "serve")]
/// start the HTTP query endpoint
struct ServeArgs {
    /// path to the TOML configuration file
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// address to bind to, overriding `server.bind`
    #[argh(option, short = 'b')]
    bind: Option<String>,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "query")]
/// print the beans matching a query
struct QueryArgs {
    /// path to the TOML configuration file
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// query arguments, e.g. 'query=beanwatch_vhost:Type=forever'
    ///
    /// Omitting the query selects every bean.
    #[argh(positional)]
    query: Option<String>,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "record")]
/// record one unit of work without a running server
struct RecordArgs {
    /// path to the TOML configuration file
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// host the request was addressed to
    #[argh(option)]
    host: String,

    /// port the request arrived on
    #[argh(option, default = "0")]
    port: u16,

    /// request method (GET, HEAD, POST, PUT or anything else)
    #[argh(option)]
    method: String,

    /// response status code
    #[argh(option)]
    status: u16,

    /// request bytes received
    #[argh(option, long = "bytes-in", default = "0")]
    bytes_in: u64,

    /// response bytes sent
    #[argh(option, long = "bytes-out", default = "0")]
    bytes_out: u64,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "reset")]
/// delete the counter store
struct ResetArgs {
    /// path to the TOML configuration file
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,
}

impl Commands {
    fn config_path(&self) -> Option<&PathBuf> {
        match self {
            Commands::Serve(args) => args.config.as_ref(),
            Commands::Query(args) => args.config.as_ref(),
            Commands::Record(args) => args.config.as_ref(),
            Commands::Reset(args) => args.config.as_ref(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli: Cli = argh::from_env();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if commands::is_bad_query(&e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(EXIT_BAD_QUERY)
        }
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.command.config_path().cloned();
    let bind = match &cli.command {
        Commands::Serve(ServeArgs { bind: Some(bind), .. }) => Some(
            bind.parse::<SocketAddr>()
                .with_context(|| format!("invalid bind address {}", bind))?,
        ),
        _ => None,
    };
    let config = commands::serve_config(config_path.as_deref(), bind)?;
    beanwatch_cli::init_logging(&config.log)?;

    match cli.command {
        Commands::Serve(_) => serve(config, config_path, bind).await,
        Commands::Query(args) => {
            let text = commands::query(config, args.query.as_deref())?;
            print!("{}", text);
            Ok(())
        }
        Commands::Record(args) => {
            let request = RecordRequest {
                host: args.host,
                port: args.port,
                method: args.method,
                status: args.status,
                bytes_in: args.bytes_in,
                bytes_out: args.bytes_out,
            };
            commands::record(config, &request)
        }
        Commands::Reset(_) => commands::reset(&config),
    }
}

async fn serve(
    config: beanwatch_server::Config,
    config_path: Option<PathBuf>,
    bind: Option<SocketAddr>,
) -> Result<()> {
    let addr: SocketAddr = config.server.bind;
    tracing::info!("Starting beanwatch on {}", addr);

    let host = Host::start(config, Arc::new(Scoreboard::default()), Lifecycle::Startup)
        .context("failed to initialize metrics store")?;
    let server = HttpServer::new(host);
    spawn_reload_on_hangup(server.handle(), config_path, bind)?;

    server.run(addr).await?;
    Ok(())
}

/// Reloads the configuration whenever the process receives `SIGHUP`.
#[cfg(unix)]
fn spawn_reload_on_hangup(
    handle: HostHandle,
    config_path: Option<PathBuf>,
    bind: Option<SocketAddr>,
) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sig = signal(SignalKind::hangup()).context("failed to install SIGHUP handler")?;
    tokio::spawn(async move {
        while sig.recv().await.is_some() {
            let (path, handle) = (config_path.clone(), handle.clone());
            let reloaded = tokio::task::spawn_blocking(move || {
                commands::serve_config(path.as_deref(), bind)
                    .and_then(|config| handle.reload(config).map_err(anyhow::Error::from))
            })
            .await
            .map_err(anyhow::Error::from)
            .and_then(|result| result);
            if let Err(e) = reloaded {
                tracing::error!(error = %format!("{:#}", e), "SIGHUP: reload failed, keeping current configuration");
            }
        }
    });
    tracing::info!("SIGHUP handler installed for configuration reload");
    Ok(())
}

#[cfg(not(unix))]
fn spawn_reload_on_hangup(
    _handle: HostHandle,
    _config_path: Option<PathBuf>,
    _bind: Option<SocketAddr>,
) -> Result<()> {
    Ok(())
}

/// CLI argument parsing tests.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_serve_defaults() {
        let args: Cli = Cli::from_args(&["beanwatch"], &["serve"]).unwrap();
        match args.command {
            Commands::Serve(ServeArgs { config, bind }) => {
                assert!(config.is_none());
                assert!(bind.is_none());
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_cli_parse_serve_with_options() {
        let args: Cli =
            Cli::from_args(&["beanwatch"], &["serve", "-c", "bw.toml", "-b", "0.0.0.0:9000"]).unwrap();
        match args.command {
            Commands::Serve(ServeArgs { config, bind }) => {
                assert_eq!(config, Some(PathBuf::from("bw.toml")));
                assert_eq!(bind.as_deref(), Some("0.0.0.0:9000"));
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_cli_parse_query() {
        let args: Cli =
            Cli::from_args(&["beanwatch"], &["query", "query=beanwatch_vhost:Type=forever"]).unwrap();
        match args.command {
            Commands::Query(QueryArgs { config, query }) => {
                assert!(config.is_none());
                assert_eq!(query.as_deref(), Some("query=beanwatch_vhost:Type=forever"));
            }
            _ => panic!("Expected Query command"),
        }
    }

    #[test]
    fn test_cli_parse_query_without_argument() {
        let args: Cli = Cli::from_args(&["beanwatch"], &["query"]).unwrap();
        assert!(matches!(args.command, Commands::Query(QueryArgs { query: None, .. })));
    }

    #[test]
    fn test_cli_parse_record() {
        let args: Cli = Cli::from_args(
            &["beanwatch"],
            &[
                "record", "--host", "e.example", "--method", "GET", "--status", "200", "--bytes-in", "100",
                "--bytes-out", "500",
            ],
        )
        .unwrap();
        match args.command {
            Commands::Record(RecordArgs { host, port, method, status, bytes_in, bytes_out, .. }) => {
                assert_eq!(host, "e.example");
                assert_eq!(port, 0); // default
                assert_eq!(method, "GET");
                assert_eq!(status, 200);
                assert_eq!(bytes_in, 100);
                assert_eq!(bytes_out, 500);
            }
            _ => panic!("Expected Record command"),
        }
    }

    #[test]
    fn test_cli_record_requires_status() {
        assert!(Cli::from_args(&["beanwatch"], &["record", "--host", "a", "--method", "GET"]).is_err());
    }

    #[test]
    fn test_cli_parse_reset() {
        let args: Cli = Cli::from_args(&["beanwatch"], &["reset", "-c", "bw.toml"]).unwrap();
        assert_eq!(args.command.config_path(), Some(&PathBuf::from("bw.toml")));
    }
}
