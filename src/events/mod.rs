//! Finalized transaction records and log/event extraction
//!
//! A finalized transaction yields one raw log per executed message. Each raw
//! log holds named events, and each event is an ordered list of key/value
//! attributes. The pickers in this module are the only place that walks that
//! structure.

use crate::error::{TxError, TxResult};

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Single key/value attribute of an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Named event emitted while executing a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl Event {
    pub fn new(kind: impl Into<String>, attributes: Vec<Attribute>) -> Self {
        Self {
            kind: kind.into(),
            attributes,
        }
    }
}

/// Execution trace for one message of the transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLog {
    #[serde(default)]
    pub msg_index: usize,
    #[serde(default)]
    pub log: String,
    #[serde(default)]
    pub events: Vec<Event>,
}

/// The chain's settled outcome for a broadcast transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedRecord {
    pub tx_hash: String,
    pub height: u64,
    /// Zero on success; anything else is an execution failure
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub raw_log: String,
    #[serde(default)]
    pub logs: Vec<RawLog>,
}

impl FinalizedRecord {
    /// Build a record from the chain's JSON-encoded raw log.
    ///
    /// Failed transactions carry a plain-text raw log; it is kept as-is and
    /// `logs` stays empty.
    pub fn from_raw_log_json(
        tx_hash: impl Into<String>,
        height: u64,
        code: u32,
        raw_log: impl Into<String>,
    ) -> TxResult<Self> {
        let raw_log = raw_log.into();
        let logs = if code == 0 {
            serde_json::from_str::<Vec<RawLog>>(&raw_log)
                .map_err(|e| TxError::Query(format!("malformed raw log: {}", e)))?
        } else {
            Vec::new()
        };

        Ok(Self {
            tx_hash: tx_hash.into(),
            height,
            code,
            raw_log,
            logs,
        })
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// How an attribute is located inside an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeSelector {
    /// Fixed position; depends on the contract's emission order
    Position(usize),
    /// First attribute with this key
    Key(&'static str),
    /// Key lookup first, positional fallback when the key is absent
    KeyOrPosition(&'static str, usize),
}

impl fmt::Display for AttributeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeSelector::Position(i) => write!(f, "#{}", i),
            AttributeSelector::Key(k) => write!(f, "{:?}", k),
            AttributeSelector::KeyOrPosition(k, i) => write!(f, "{:?} (#{})", k, i),
        }
    }
}

/// Raw log at a fixed message index
pub fn pick_raw_log(record: &FinalizedRecord, index: usize) -> Option<&RawLog> {
    record.logs.get(index)
}

/// First event with the given name
pub fn pick_event<'a>(log: &'a RawLog, name: &str) -> Option<&'a Event> {
    log.events.iter().find(|e| e.kind == name)
}

/// Attribute value at a fixed position
pub fn pick_attribute_value(event: &Event, index: usize) -> Option<&str> {
    event.attributes.get(index).map(|a| a.value.as_str())
}

/// Value of the first attribute with the given key
pub fn pick_attribute_value_by_key<'a>(event: &'a Event, key: &str) -> Option<&'a str> {
    event
        .attributes
        .iter()
        .find(|a| a.key == key)
        .map(|a| a.value.as_str())
}

/// Resolve an attribute through a selector
pub fn pick_attribute<'a>(event: &'a Event, selector: AttributeSelector) -> Option<&'a str> {
    match selector {
        AttributeSelector::Position(index) => pick_attribute_value(event, index),
        AttributeSelector::Key(key) => pick_attribute_value_by_key(event, key),
        AttributeSelector::KeyOrPosition(key, index) => {
            if let Some(value) = pick_attribute_value_by_key(event, key) {
                return Some(value);
            }
            let fallback = event.attributes.get(index)?;
            warn!(
                event = %event.kind,
                expected_key = key,
                found_key = %fallback.key,
                index,
                "Attribute key not present, falling back to positional decoding"
            );
            Some(fallback.value.as_str())
        }
    }
}

/// Like [`pick_attribute`], failing with `AttributeNotFound`
pub fn require_attribute<'a>(event: &'a Event, selector: AttributeSelector) -> TxResult<&'a str> {
    pick_attribute(event, selector).ok_or_else(|| TxError::AttributeNotFound {
        event: event.kind.clone(),
        selector: selector.to_string(),
    })
}

/// Locate the event an operation reads its receipts from
pub fn locate_event<'a>(
    record: &'a FinalizedRecord,
    log_index: usize,
    event_name: &str,
) -> TxResult<&'a Event> {
    let raw_log =
        pick_raw_log(record, log_index).ok_or(TxError::RawLogNotFound { index: log_index })?;

    let event = pick_event(raw_log, event_name).ok_or_else(|| TxError::EventsNotFound {
        names: vec![event_name.to_string()],
    })?;

    debug!(
        "Found event {} with {} attributes in log {}",
        event_name,
        event.attributes.len(),
        log_index
    );
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW_LOG: &str = r#"[
        {"msg_index":0,"log":"","events":[
            {"type":"message","attributes":[{"key":"action","value":"/cosmwasm.wasm.v1.MsgExecuteContract"}]},
            {"type":"from_contract","attributes":[
                {"key":"_contract_address","value":"terra1hub"},
                {"key":"action","value":"mint"},
                {"key":"from","value":"terra1user"},
                {"key":"bonded","value":"9500000"},
                {"key":"minted","value":"9400000"}
            ]}
        ]}
    ]"#;

    fn record() -> FinalizedRecord {
        FinalizedRecord::from_raw_log_json("HASH", 100, 0, RAW_LOG).unwrap()
    }

    #[test]
    fn test_parse_raw_log() {
        let record = record();
        assert!(record.is_success());
        assert_eq!(record.logs.len(), 1);
        assert_eq!(record.logs[0].events.len(), 2);
    }

    #[test]
    fn test_failed_tx_keeps_text_log() {
        let record =
            FinalizedRecord::from_raw_log_json("HASH", 100, 5, "insufficient funds").unwrap();
        assert!(!record.is_success());
        assert!(record.logs.is_empty());
        assert_eq!(record.raw_log, "insufficient funds");
    }

    #[test]
    fn test_malformed_raw_log_is_query_error() {
        let err = FinalizedRecord::from_raw_log_json("HASH", 1, 0, "not json").unwrap_err();
        assert!(matches!(err, TxError::Query(_)));
    }

    #[test]
    fn test_selectors() {
        let record = record();
        let event = locate_event(&record, 0, "from_contract").unwrap();

        assert_eq!(pick_attribute(event, AttributeSelector::Position(3)), Some("9500000"));
        assert_eq!(pick_attribute(event, AttributeSelector::Key("minted")), Some("9400000"));
        assert_eq!(
            pick_attribute(event, AttributeSelector::KeyOrPosition("bonded", 0)),
            Some("9500000")
        );
        assert_eq!(
            pick_attribute(event, AttributeSelector::KeyOrPosition("renamed", 4)),
            Some("9400000")
        );
        assert_eq!(pick_attribute(event, AttributeSelector::Position(9)), None);
    }

    #[test]
    fn test_locate_event_errors() {
        let record = record();
        assert_eq!(
            locate_event(&record, 1, "from_contract").unwrap_err(),
            TxError::RawLogNotFound { index: 1 }
        );
        assert_eq!(
            locate_event(&record, 0, "wasm").unwrap_err(),
            TxError::EventsNotFound {
                names: vec!["wasm".to_string()]
            }
        );
    }

    #[test]
    fn test_require_attribute_error_names_selector() {
        let event = Event::new("from_contract", vec![]);
        let err = require_attribute(&event, AttributeSelector::Key("amount")).unwrap_err();
        assert_eq!(
            err,
            TxError::AttributeNotFound {
                event: "from_contract".to_string(),
                selector: "\"amount\"".to_string(),
            }
        );
    }
}
