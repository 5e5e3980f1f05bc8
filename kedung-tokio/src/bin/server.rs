//! `kedungd`: the kedung cache server binary. Loads `config.toml` from
//! the current working directory, initializes logging, and runs until an
//! interrupt signal (§4.D, §6).

use kedung_core::Config;
use kedung_tokio::Server;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = match Config::load_from_cwd() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load config.toml: {}", err);
            std::process::exit(1);
        }
    };

    let _log_guard = init_logging(&config);

    tracing::info!(
        socket = %config.socket_path().display(),
        log = %config.log_path().display(),
        cache_duration_minutes = config.cache_duration_minutes,
        "starting kedung server"
    );

    if let Err(err) = Server::new(config).run().await {
        tracing::error!(error = %err, "server exited with an error");
        std::process::exit(1);
    }
}

/// Wire up console logging plus the configured `log` destination (§6) as a
/// second, ANSI-free sink — the reference implementation's `LogPath`
/// creates/maintains a log file from the same config key. The returned
/// guard flushes the file writer's background thread on drop and must be
/// held for the life of `main`.
fn init_logging(config: &Config) -> WorkerGuard {
    let directive = tracing_directive(&config.logging);

    let log_path = config.log_path();
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let log_dir = log_path
        .parent()
        .map(std::path::Path::to_path_buf)
        .unwrap_or_else(|| std::path::PathBuf::from("."));
    let log_file_name = log_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "kedung.log".to_string());

    let file_appender = tracing_appender::rolling::never(log_dir, log_file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::new(directive))
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .init();

    guard
}

/// Map the config file's Python `logging`-module level names onto the
/// `tracing` directives `EnvFilter` understands; `WARNING`/`CRITICAL`
/// have no direct `tracing::Level` counterpart.
fn tracing_directive(logging: &str) -> &'static str {
    match logging.to_ascii_uppercase().as_str() {
        "DEBUG" => "debug",
        "WARNING" => "warn",
        "ERROR" => "error",
        "CRITICAL" => "error",
        _ => "info",
    }
}
