//! The Unix-domain-socket server: listen-socket lifecycle (§4.D), the
//! per-connection framing loop, and graceful shutdown.

use kedung_core::envelope::Envelope;
use kedung_core::{dispatcher, frame, Config, Store};
use serde_json::Value;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

use crate::sweeper;

/// 512 KiB, per §4.D.
const READ_BUFFER_SIZE: usize = 512 * 1024;

/// A running (or not-yet-started) kedung server. Owns the TTL store and
/// hands out connections to it; the store outlives any individual
/// connection.
pub struct Server {
    store: Arc<Store>,
    config: Config,
}

impl Server {
    /// Construct a server from `config`. Does not touch the filesystem or
    /// bind a socket until [`Server::run`] is called.
    pub fn new(config: Config) -> Self {
        Self {
            store: Arc::new(Store::new(config.cache_duration_minutes)),
            config,
        }
    }

    /// Run the server until an interrupt signal is received. Binds the
    /// listening socket, spawns the expiry sweeper, and accepts
    /// connections until `ctrl_c` fires, at which point accepting stops,
    /// the store is cleared, and this returns `Ok(())` (§4.D "Graceful
    /// shutdown").
    pub async fn run(self) -> io::Result<()> {
        let socket_path = resolve_socket_path(&self.config).await?;
        let listener = bind_with_retry(&socket_path)?;
        tracing::info!(path = %socket_path.display(), "kedung server listening");

        let sweeper_handle = sweeper::spawn(Arc::clone(&self.store));

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, _addr)) => {
                            let store = Arc::clone(&self.store);
                            let prefix_width = self.config.prefix_width;
                            tokio::spawn(async move {
                                tracing::info!("connection established");
                                if let Err(err) = handle_connection(stream, &store, prefix_width).await {
                                    tracing::debug!(error = %err, "connection closed");
                                } else {
                                    tracing::info!("connection closed");
                                }
                            });
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "accept failed");
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("received shutdown signal, stopping server");
                    break;
                }
            }
        }

        sweeper_handle.abort();
        self.store.flush();
        Ok(())
    }
}

/// Resolve the socket path to actually bind: the configured directory, or
/// the default `/tmp/kedung/` if the configured one isn't writable (§6
/// "If the directory is not writable, fall back to the default").
async fn resolve_socket_path(config: &kedung_core::Config) -> io::Result<std::path::PathBuf> {
    let configured = config.socket_path();
    match prepare_socket_file(&configured).await {
        Ok(()) => Ok(configured),
        Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
            let fallback = kedung_core::Config::default().socket_path();
            tracing::warn!(
                configured = %configured.display(),
                fallback = %fallback.display(),
                error = %err,
                "socket directory not writable, falling back to default"
            );
            prepare_socket_file(&fallback).await?;
            Ok(fallback)
        }
        Err(err) => Err(err),
    }
}

/// Create the socket's parent directory and touch the file if missing,
/// mirroring the reference implementation's `_prepare_socket_file`.
async fn prepare_socket_file(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    if !path.exists() {
        tracing::info!("creating socket file");
        tokio::fs::File::create(path).await?;
    }
    Ok(())
}

/// Bind the listening socket. If the path is already occupied (errno 98
/// `EADDRINUSE` or 106 `ECONNREFUSED` — the stale-socket-file case),
/// unlink it and retry exactly once; any other error, or a second
/// failure, is fatal (§4.D, §9).
fn bind_with_retry(path: &Path) -> io::Result<UnixListener> {
    match UnixListener::bind(path) {
        Ok(listener) => Ok(listener),
        Err(err) => match err.raw_os_error() {
            Some(98) | Some(106) => {
                tracing::warn!(error = %err, "stale socket file, unlinking and retrying once");
                std::fs::remove_file(path)?;
                UnixListener::bind(path)
            }
            _ => Err(err),
        },
    }
}

/// The per-connection framing loop (§4.D): read, deframe, dispatch,
/// frame, write, repeat until EOF or an I/O error.
async fn handle_connection(
    mut stream: UnixStream,
    store: &Store,
    prefix_width: usize,
) -> io::Result<()> {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut decoder = frame::Decoder::new(prefix_width);

    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }

        for raw_frame in decoder.push(&buf[..n]) {
            let reply = process_frame(store, &raw_frame);
            let encoded = serde_json::to_vec(&reply).expect("reply envelopes always serialize");
            let framed = frame::encode(&encoded, prefix_width)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
            stream.write_all(&framed).await?;
        }
    }
}

/// Decode one frame's JSON payload and dispatch it. A frame that isn't
/// valid JSON is treated as a `CommandError` against that frame (§7);
/// since the envelope couldn't be parsed at all there is no correlation
/// token to echo back.
fn process_frame(store: &Store, raw: &[u8]) -> Value {
    match serde_json::from_slice::<Value>(raw) {
        Ok(value) => dispatcher::dispatch(store, Envelope::from_value(value)),
        Err(err) => {
            tracing::debug!(error = %err, "malformed JSON frame");
            kedung_core::envelope::error_reply(vec!["invalid JSON payload".to_string()], None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_frame_dispatches_known_command() {
        let store = Store::new(10);
        let raw = br#"{"command":"SET","data":{"key_1":"value_1","injected_data":"SET_aaaaaaaa"}}"#;
        let reply = process_frame(&store, raw);
        assert_eq!(
            reply,
            serde_json::json!({"key_1": true, "injected_data": "SET_aaaaaaaa"})
        );
    }

    #[test]
    fn test_process_frame_invalid_json() {
        let store = Store::new(10);
        let reply = process_frame(&store, b"not json");
        assert_eq!(
            reply,
            serde_json::json!({"errors": ["invalid JSON payload"], "injected_data": null})
        );
    }
}
