// ===============================
// src/codec.rs
// ===============================
//
// Frame = one JSON object terminated by a single '\n'.
// Decoding is a single discriminated parse over a closed set of kinds;
// line assembly is the session's job.
//
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Command, Dir, OrderId, Price, SymbolPosition};
use crate::error::CodecError;

pub const KINDS: [&str; 8] = ["hello", "close", "error", "reject", "fill", "trade", "add", "cancel"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    Hello {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        team: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        symbols: Vec<SymbolPosition>,
    },
    Close {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        symbols: Vec<String>,
    },
    Error { error: String },
    Reject {
        order_id: OrderId,
        #[serde(default)]
        error: String,
    },
    Fill { order_id: OrderId, symbol: String, dir: Dir, price: Price, size: i64 },
    Trade { symbol: String, price: Price, size: i64 },
    Add { order_id: OrderId, symbol: String, dir: Dir, price: Price, size: i64 },
    Cancel { order_id: OrderId },
}

impl Message {
    pub fn hello(team: &str) -> Self {
        Message::Hello { team: Some(team.to_string()), symbols: Vec::new() }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Message::Hello { .. } => "hello",
            Message::Close { .. } => "close",
            Message::Error { .. } => "error",
            Message::Reject { .. } => "reject",
            Message::Fill { .. } => "fill",
            Message::Trade { .. } => "trade",
            Message::Add { .. } => "add",
            Message::Cancel { .. } => "cancel",
        }
    }
}

impl From<Command> for Message {
    fn from(cmd: Command) -> Self {
        match cmd {
            Command::Add { order_id, symbol, dir, price, size } => {
                Message::Add { order_id, symbol, dir, price, size }
            }
            Command::Cancel { order_id } => Message::Cancel { order_id },
        }
    }
}

pub fn encode(msg: &Message) -> Result<Vec<u8>, CodecError> {
    let mut buf = serde_json::to_vec(msg)?;
    buf.push(b'\n');
    Ok(buf)
}

pub fn decode(line: &str) -> Result<Message, CodecError> {
    let value: Value = serde_json::from_str(line.trim_end_matches(['\r', '\n']))
        .map_err(|e| CodecError::MalformedFrame(e.to_string()))?;

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| CodecError::MalformedFrame("missing string `type` field".into()))?;
    if !KINDS.contains(&kind) {
        return Err(CodecError::UnknownType(kind.to_string()));
    }

    if let Some(dir) = value.get("dir") {
        if dir.as_str().and_then(Dir::parse).is_none() {
            return Err(CodecError::InvalidEnum { field: "dir", value: dir.to_string() });
        }
    }

    serde_json::from_value(value).map_err(|e| CodecError::MalformedFrame(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_add_as_single_line() {
        let msg = Message::Add { order_id: 3, symbol: "BOND".into(), dir: Dir::Buy, price: 999, size: 1 };
        let bytes = encode(&msg).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(text.matches('\n').count(), 1);
        let v: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["type"], "add");
        assert_eq!(v["dir"], "BUY");
        assert_eq!(v["order_id"], 3);
    }

    #[test]
    fn hello_carries_team_only() {
        let text = String::from_utf8(encode(&Message::hello("TEAM")).unwrap()).unwrap();
        assert_eq!(text, "{\"type\":\"hello\",\"team\":\"TEAM\"}\n");
    }

    #[test]
    fn decodes_trade_and_ignores_extra_fields() {
        let msg = decode(r#"{"type":"trade","symbol":"GS","price":5012,"size":3,"seq":9}"#).unwrap();
        assert_eq!(msg, Message::Trade { symbol: "GS".into(), price: 5012, size: 3 });
    }

    #[test]
    fn decodes_exchange_hello_with_positions() {
        let msg = decode(r#"{"type":"hello","symbols":[{"symbol":"BOND","position":4}]}"#).unwrap();
        match msg {
            Message::Hello { team, symbols } => {
                assert!(team.is_none());
                assert_eq!(symbols, vec![SymbolPosition { symbol: "BOND".into(), position: 4 }]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn every_variant_survives_a_round_trip() {
        let all = vec![
            Message::hello("TEAM"),
            Message::Close { symbols: vec!["BOND".into()] },
            Message::Error { error: "bad".into() },
            Message::Reject { order_id: 7, error: "UNKNOWN_ORDER".into() },
            Message::Fill { order_id: 2, symbol: "MS".into(), dir: Dir::Sell, price: 40, size: 1 },
            Message::Trade { symbol: "BOND".into(), price: 1000, size: 2 },
            Message::Add { order_id: 1, symbol: "BOND".into(), dir: Dir::Buy, price: 999, size: 1 },
            Message::Cancel { order_id: 1 },
        ];
        for m in all {
            let line = String::from_utf8(encode(&m).unwrap()).unwrap();
            assert_eq!(decode(&line).unwrap(), m);
        }
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(decode("{not json"), Err(CodecError::MalformedFrame(_))));
        assert!(matches!(decode(r#"{"symbol":"BOND"}"#), Err(CodecError::MalformedFrame(_))));
        assert!(matches!(decode(r#"{"type":7}"#), Err(CodecError::MalformedFrame(_))));
        assert!(matches!(decode(r#"[1,2]"#), Err(CodecError::MalformedFrame(_))));
        // known kind, missing required field
        assert!(matches!(decode(r#"{"type":"trade","symbol":"BOND"}"#), Err(CodecError::MalformedFrame(_))));
    }

    #[test]
    fn unknown_kind_is_reported_separately() {
        match decode(r#"{"type":"book","symbol":"BOND","buy":[],"sell":[]}"#) {
            Err(CodecError::UnknownType(k)) => assert_eq!(k, "book"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bad_direction_is_invalid_enum() {
        let r = decode(r#"{"type":"fill","order_id":1,"symbol":"BOND","dir":"HOLD","price":1,"size":1}"#);
        assert!(matches!(r, Err(CodecError::InvalidEnum { field: "dir", .. })));
    }
}
