//! Tokio bindings for the kedung in-memory TTL cache: a Unix-domain-socket
//! server (§4.D, §4.E) and a single-connection client with a correlator
//! (§4.F).

pub mod client;
pub mod server;
pub mod sweeper;

pub use client::Client;
pub use server::Server;
