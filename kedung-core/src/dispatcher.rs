//! Maps a decoded [`Envelope`] to a store operation and marshals the
//! result back into a reply envelope (§4.C).

use crate::envelope::{error_reply, success_reply, Envelope, Verb};
use crate::error::CommandError;
use crate::store::Store;
use serde_json::{Map, Value};

/// Dispatch a single decoded envelope against `store`, returning the
/// reply payload to frame and write back. Unlike [`crate::error::Error`],
/// a dispatch failure never propagates as `Err` — per §4.C and §7 the
/// token must still be echoed, so failures are folded into the returned
/// reply value instead.
pub fn dispatch(store: &Store, envelope: Envelope) -> Value {
    let token = envelope.token.as_deref();

    let verb = match &envelope.command {
        None => return error_reply(vec![CommandError::MissingCommand.wire_message()], token),
        Some(raw) => match Verb::parse(raw) {
            Some(verb) => verb,
            None => {
                return error_reply(
                    vec![CommandError::Unknown(raw.clone()).wire_message()],
                    token,
                )
            }
        },
    };

    let result = match verb {
        Verb::Get => single(&envelope.data, |key| {
            store.get(key).unwrap_or(Value::Null)
        }),
        Verb::Set => single(&envelope.data, |key| {
            let value = envelope.data.get(key).cloned().unwrap_or(Value::Null);
            Value::Bool(store.set(key, value))
        }),
        Verb::Del => single(&envelope.data, |key| Value::Bool(store.del(key))),
        Verb::Exist => single(&envelope.data, |key| Value::Bool(store.exists(key))),
        Verb::BGet => batch(&envelope.data, |key| {
            store.get(key).unwrap_or(Value::Null)
        }),
        Verb::BSet => batch(&envelope.data, |key| {
            let value = envelope.data.get(key).cloned().unwrap_or(Value::Null);
            Value::Bool(store.set(key, value))
        }),
        Verb::BDel => batch(&envelope.data, |key| Value::Bool(store.del(key))),
        Verb::BExists => batch(&envelope.data, |key| Value::Bool(store.exists(key))),
        Verb::Flush => {
            let mut result = Map::new();
            result.insert("flush".to_string(), Value::Bool(store.flush()));
            result
        }
    };

    success_reply(result, token)
}

/// Apply a single-key operation: the payload's sole key (besides the
/// already-stripped `injected_data`) is the operand.
fn single(data: &Map<String, Value>, op: impl Fn(&str) -> Value) -> Map<String, Value> {
    let mut result = Map::new();
    if let Some(key) = data.keys().next() {
        result.insert(key.clone(), op(key));
    }
    result
}

/// Apply `op` to every key in the payload independently (§4.B batch
/// semantics: not atomic, last write wins within the batch for repeated
/// keys — trivially true here since `Map` already dedupes keys).
fn batch(data: &Map<String, Value>, op: impl Fn(&str) -> Value) -> Map<String, Value> {
    data.keys().map(|key| (key.clone(), op(key))).collect()
}
