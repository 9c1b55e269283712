//! Message to record conversion
//!
//! Two modes:
//! - **Structured**: wraps the body with its delivery metadata
//! - **Raw**: the body itself, parsed as a JSON object when possible

use crate::types::{RawMessage, Record};
use serde_json::Value;

/// Field holding the body when a raw message is not a JSON object
pub const RAW_FALLBACK_FIELD: &str = "message";

/// Transformation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformMode {
    /// Envelope with the six delivery fields
    Structured,
    /// Parsed body, falling back to a single text field
    Raw,
}

impl TransformMode {
    /// Mode selected by the `raw_message` option
    pub fn from_raw_flag(raw_message: bool) -> Self {
        if raw_message {
            TransformMode::Raw
        } else {
            TransformMode::Structured
        }
    }

    /// Convert a message into a record
    pub fn transform(self, message: &RawMessage) -> Record {
        match self {
            TransformMode::Structured => structured_record(message),
            TransformMode::Raw => raw_record(&message.body),
        }
    }
}

/// Envelope record with the body and delivery metadata
pub fn structured_record(message: &RawMessage) -> Record {
    let mut record = Record::new();
    record.insert("body".into(), Value::String(message.body.clone()));
    record.insert(
        "receipt_handle".into(),
        Value::String(message.receipt_handle.clone()),
    );
    record.insert("message_id".into(), Value::String(message.message_id.clone()));
    record.insert("md5_of_body".into(), Value::String(message.md5_of_body.clone()));
    record.insert("queue_url".into(), Value::String(message.queue_url.clone()));
    record.insert("sender_id".into(), Value::String(message.sender_id().to_string()));
    record
}

/// Body parsed as a JSON object, or `{"message": body}` for anything else
pub fn raw_record(body: &str) -> Record {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map,
        _ => fallback_record(body),
    }
}

fn fallback_record(body: &str) -> Record {
    let mut record = Record::new();
    record.insert(RAW_FALLBACK_FIELD.into(), Value::String(body.to_string()));
    record
}
