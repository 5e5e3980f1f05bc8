//! Runtime-agnostic core of the kedung in-memory TTL cache: the wire
//! framing codec, the command/reply envelope shapes, the TTL store, the
//! command dispatcher, and configuration loading. An async runtime crate
//! (e.g. `kedung-tokio`) wires these onto an actual Unix domain socket.

pub mod config;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod frame;
pub mod store;
pub mod token;

pub use config::Config;
pub use envelope::{Envelope, Verb};
pub use error::Error;
pub use store::Store;
