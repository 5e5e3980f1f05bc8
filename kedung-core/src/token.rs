//! Correlation token generation (§4.F): `VERB_<8 hex chars>`, derived from
//! hashing a fresh random UUID the same way the reference client does.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Generate a fresh correlation token for `command`. `command` is taken
/// verbatim (already uppercased by the caller) rather than restricted to
/// a known [`crate::envelope::Verb`], since a client may legitimately
/// send an unrecognized command and still needs a token the server can
/// echo back on the resulting error reply.
pub fn generate(command: &str) -> String {
    let id = Uuid::new_v4();
    let digest = Sha256::digest(id.to_string().as_bytes());
    let hex = hex_encode(&digest);
    format!("{}_{}", command, &hex[..8])
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        write!(out, "{:02x}", byte).expect("writing to a String never fails");
    }
    out
}
