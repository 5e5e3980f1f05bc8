//! The client connection and correlator (§4.F): one socket, many
//! concurrently in-flight requests, replies routed back to their caller by
//! correlation token.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kedung_core::envelope::{Verb, INJECTED_DATA_KEY};
use kedung_core::error::PrefixError;
use kedung_core::{frame, token};
use serde_json::{Map, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::net::unix::OwnedWriteHalf;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const READ_BUFFER_SIZE: usize = 512 * 1024;

/// Default per-request timeout. Not specified by the original; added per
/// §5 ("a reimplementation SHOULD add a per-request timeout ... to
/// prevent leaks from lost replies").
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// A client-side failure: either a precondition failure caught before the
/// request ever touched the socket, or a failure while sending/awaiting
/// it.
#[derive(Debug)]
pub enum ClientError {
    /// A non-`FLUSH` command was sent with empty `data` (§4.F, §7).
    MissingComponent,
    /// The payload could not be framed (too large for the prefix width).
    Frame(PrefixError),
    /// An I/O error while writing the request or reading replies.
    Io(std::io::Error),
    /// No reply arrived within the per-request timeout.
    Timeout,
    /// The reader task exited (the connection closed) before a reply for
    /// this request arrived.
    ConnectionClosed,
}

impl Display for ClientError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ClientError::MissingComponent => {
                write!(f, "missing component: non-FLUSH command requires non-empty data")
            }
            ClientError::Frame(err) => write!(f, "FrameError: {}", err),
            ClientError::Io(err) => write!(f, "IoError: {}", err),
            ClientError::Timeout => write!(f, "timed out waiting for a reply"),
            ClientError::ConnectionClosed => write!(f, "connection closed before a reply arrived"),
        }
    }
}

impl StdError for ClientError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ClientError::Frame(err) => Some(err),
            ClientError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PrefixError> for ClientError {
    fn from(err: PrefixError) -> Self {
        ClientError::Frame(err)
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Io(err)
    }
}

type PendingTable = Arc<Mutex<HashMap<String, oneshot::Sender<Value>>>>;

/// One connection to a kedung server, plus the reader task and pending
/// table that let many callers share it concurrently.
pub struct Client {
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    pending: PendingTable,
    prefix_width: usize,
    timeout: Duration,
    reader_task: JoinHandle<()>,
}

impl Client {
    /// Connect to the Unix socket at `path` and start the background
    /// reader task. `prefix_width` must match the server's configured
    /// value.
    pub async fn connect(path: &Path, prefix_width: usize) -> std::io::Result<Self> {
        Self::connect_with_timeout(path, prefix_width, DEFAULT_REQUEST_TIMEOUT).await
    }

    pub async fn connect_with_timeout(
        path: &Path,
        prefix_width: usize,
        timeout: Duration,
    ) -> std::io::Result<Self> {
        let stream = UnixStream::connect(path).await?;
        let (read_half, write_half) = stream.into_split();
        let pending: PendingTable = Arc::new(Mutex::new(HashMap::new()));

        let reader_task = tokio::spawn(reader_loop(read_half, prefix_width, Arc::clone(&pending)));

        Ok(Self {
            writer: tokio::sync::Mutex::new(write_half),
            pending,
            prefix_width,
            timeout,
            reader_task,
        })
    }

    /// Issue a request and await its matching reply. `data` carries the
    /// operation's keys, sans `injected_data` — the token is generated
    /// and injected here. Non-`FLUSH` commands must carry non-empty
    /// `data` (§4.F).
    pub async fn send(&self, verb: Verb, data: Map<String, Value>) -> Result<Value, ClientError> {
        if verb != Verb::Flush && data.is_empty() {
            return Err(ClientError::MissingComponent);
        }

        let (token_str, receiver) = self.register_pending(verb);

        let mut payload = data;
        payload.insert(INJECTED_DATA_KEY.to_string(), Value::String(token_str.clone()));
        let envelope = serde_json::json!({
            "command": verb.as_str(),
            "data": payload,
        });
        let encoded = serde_json::to_vec(&envelope).expect("request envelopes always serialize");
        let framed = frame::encode(&encoded, self.prefix_width)?;

        {
            let mut writer = self.writer.lock().await;
            if let Err(err) = writer.write_all(&framed).await {
                self.pending.lock().expect("pending table poisoned").remove(&token_str);
                return Err(err.into());
            }
        }

        match tokio::time::timeout(self.timeout, receiver).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(ClientError::ConnectionClosed),
            Err(_) => {
                self.pending.lock().expect("pending table poisoned").remove(&token_str);
                Err(ClientError::Timeout)
            }
        }
    }

    /// Generate a collision-free token, register its pending slot, and
    /// return both it and the receiving half of its oneshot channel.
    fn register_pending(&self, verb: Verb) -> (String, oneshot::Receiver<Value>) {
        let mut pending = self.pending.lock().expect("pending table poisoned");
        loop {
            let candidate = token::generate(verb.as_str());
            if !pending.contains_key(&candidate) {
                let (tx, rx) = oneshot::channel();
                pending.insert(candidate.clone(), tx);
                return (candidate, rx);
            }
            // §4.F: collisions are astronomically unlikely but the spec
            // asks implementations to detect and regenerate rather than
            // rely on luck.
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

/// Read frames off the socket forever, routing each decoded reply to its
/// pending waiter by `injected_data` token. Unknown tokens are dropped
/// (§4.F: "silently dropped, an implementation MAY warn").
async fn reader_loop(
    mut read_half: tokio::net::unix::OwnedReadHalf,
    prefix_width: usize,
    pending: PendingTable,
) {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut decoder = frame::Decoder::new(prefix_width);

    loop {
        let n = match read_half.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("server closed the connection");
                return;
            }
            Ok(n) => n,
            Err(err) => {
                tracing::warn!(error = %err, "client read error");
                return;
            }
        };

        for raw_frame in decoder.push(&buf[..n]) {
            let mut reply: Value = match serde_json::from_slice(&raw_frame) {
                Ok(value) => value,
                Err(err) => {
                    tracing::warn!(error = %err, "malformed reply frame");
                    continue;
                }
            };

            let token = reply
                .as_object_mut()
                .and_then(|map| map.remove(INJECTED_DATA_KEY))
                .and_then(|v| v.as_str().map(str::to_string));

            let token = match token {
                Some(token) => token,
                None => {
                    tracing::warn!("reply missing injected_data, dropping");
                    continue;
                }
            };

            let sender = pending.lock().expect("pending table poisoned").remove(&token);
            match sender {
                Some(sender) => {
                    let _ = sender.send(reply);
                }
                None => {
                    tracing::warn!(token = %token, "reply for unknown or already-fulfilled token");
                }
            }
        }
    }
}
