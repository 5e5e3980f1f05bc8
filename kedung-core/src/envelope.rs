//! Command/reply envelope types exchanged over the wire, and the verb
//! vocabulary the dispatcher understands.

use serde_json::{Map, Value};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// The reserved payload key carrying the client's correlation token.
pub const INJECTED_DATA_KEY: &str = "injected_data";

/// A command verb understood by the dispatcher.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Verb {
    Get,
    Set,
    Del,
    Exist,
    BGet,
    BSet,
    BDel,
    BExists,
    Flush,
}

impl Verb {
    /// Parse a verb from its wire-format string (case-sensitive, always
    /// uppercase on the wire).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "GET" => Some(Verb::Get),
            "SET" => Some(Verb::Set),
            "DEL" => Some(Verb::Del),
            "EXIST" => Some(Verb::Exist),
            "BGET" => Some(Verb::BGet),
            "BSET" => Some(Verb::BSet),
            "BDEL" => Some(Verb::BDel),
            "BEXISTS" => Some(Verb::BExists),
            "FLUSH" => Some(Verb::Flush),
            _ => None,
        }
    }

    /// The canonical wire-format string for this verb, used as the
    /// prefix of a freshly minted correlation token.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Set => "SET",
            Verb::Del => "DEL",
            Verb::Exist => "EXIST",
            Verb::BGet => "BGET",
            Verb::BSet => "BSET",
            Verb::BDel => "BDEL",
            Verb::BExists => "BEXISTS",
            Verb::Flush => "FLUSH",
        }
    }
}

impl Display for Verb {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// A decoded `{"command": ..., "data": {...}}` envelope, with the
/// correlation token already split out of `data`.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub command: Option<String>,
    pub data: Map<String, Value>,
    pub token: Option<String>,
}

impl Envelope {
    /// Decode a raw JSON object into an envelope, pulling `injected_data`
    /// out of `data` if present.
    pub fn from_value(mut value: Value) -> Self {
        let command = value
            .get("command")
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut data = match value.get_mut("data").map(Value::take) {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };

        let token = data
            .remove(INJECTED_DATA_KEY)
            .and_then(|v| v.as_str().map(str::to_string));

        Self {
            command,
            data,
            token,
        }
    }
}

/// Build a success reply: the handler's per-key results plus the echoed
/// correlation token.
pub fn success_reply(mut result: Map<String, Value>, token: Option<&str>) -> Value {
    result.insert(
        INJECTED_DATA_KEY.to_string(),
        token.map(Value::from).unwrap_or(Value::Null),
    );
    Value::Object(result)
}

/// Build an error reply: `{"errors": [...], "injected_data": token}`.
pub fn error_reply(messages: Vec<String>, token: Option<&str>) -> Value {
    let mut result = Map::new();
    result.insert(
        "errors".to_string(),
        Value::Array(messages.into_iter().map(Value::String).collect()),
    );
    result.insert(
        INJECTED_DATA_KEY.to_string(),
        token.map(Value::from).unwrap_or(Value::Null),
    );
    Value::Object(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verb_roundtrip() {
        for verb in [
            Verb::Get,
            Verb::Set,
            Verb::Del,
            Verb::Exist,
            Verb::BGet,
            Verb::BSet,
            Verb::BDel,
            Verb::BExists,
            Verb::Flush,
        ] {
            assert_eq!(Verb::parse(verb.as_str()), Some(verb));
        }
        assert_eq!(Verb::parse("XSET"), None);
    }

    #[test]
    fn test_envelope_extracts_token() {
        let raw = json!({
            "command": "SET",
            "data": {"key_1": "value_1", "injected_data": "SET_abcd1234"}
        });
        let envelope = Envelope::from_value(raw);
        assert_eq!(envelope.command.as_deref(), Some("SET"));
        assert_eq!(envelope.token.as_deref(), Some("SET_abcd1234"));
        assert!(!envelope.data.contains_key(INJECTED_DATA_KEY));
        assert_eq!(envelope.data.get("key_1"), Some(&Value::String("value_1".into())));
    }

    #[test]
    fn test_error_reply_shape() {
        let reply = error_reply(
            vec!["Perintah `XSET` tidak dikenali!".to_string()],
            Some("XSET_deadbeef"),
        );
        assert_eq!(
            reply,
            json!({"errors": ["Perintah `XSET` tidak dikenali!"], "injected_data": "XSET_deadbeef"})
        );
    }
}
