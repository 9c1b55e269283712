//! Type definitions for the SQS input

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Record handed to the router: field name to JSON value
pub type Record = serde_json::Map<String, serde_json::Value>;

/// System attribute carrying the sender's account or principal id
pub const SENDER_ID_ATTRIBUTE: &str = "SenderId";

/// Message as received from the queue, owned by a single poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    /// Message body
    pub body: String,

    /// Opaque token required for deletion
    pub receipt_handle: String,

    /// Queue-assigned message id
    pub message_id: String,

    /// MD5 digest of the body
    pub md5_of_body: String,

    /// URL of the queue the message came from
    pub queue_url: String,

    /// System attributes (`SenderId`, `SentTimestamp`, ...)
    pub attributes: HashMap<String, String>,
}

impl RawMessage {
    /// Create message with a body and receipt handle
    pub fn new(body: impl Into<String>, receipt_handle: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            receipt_handle: receipt_handle.into(),
            ..Default::default()
        }
    }

    /// Set message id
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = message_id.into();
        self
    }

    /// Set body digest
    pub fn with_md5_of_body(mut self, md5_of_body: impl Into<String>) -> Self {
        self.md5_of_body = md5_of_body.into();
        self
    }

    /// Set source queue url
    pub fn with_queue_url(mut self, queue_url: impl Into<String>) -> Self {
        self.queue_url = queue_url.into();
        self
    }

    /// Add system attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Sender id attribute, empty if the queue did not return one
    pub fn sender_id(&self) -> &str {
        self.attributes
            .get(SENDER_ID_ATTRIBUTE)
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Event emitted downstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Routing label
    pub tag: String,

    /// Emission time
    pub time: DateTime<Utc>,

    /// Record payload
    pub record: Record,
}

/// Outcome of one poll cycle (logging and metrics only)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollCycleResult {
    /// Every received message was emitted
    Processed {
        /// Messages returned by the receive call
        received: usize,
        /// Records emitted to the router
        emitted: usize,
    },
    /// Cycle abandoned at the point of failure
    Failed {
        /// Records emitted before the failure
        emitted: usize,
        /// Error class
        class: &'static str,
        /// Error message
        error: String,
    },
}

impl PollCycleResult {
    /// Status label for metrics
    pub fn status(&self) -> &'static str {
        match self {
            PollCycleResult::Processed { received: 0, .. } => "empty",
            PollCycleResult::Processed { .. } => "success",
            PollCycleResult::Failed { .. } => "error",
        }
    }

    /// Records emitted in this cycle
    pub fn emitted(&self) -> usize {
        match self {
            PollCycleResult::Processed { emitted, .. } | PollCycleResult::Failed { emitted, .. } => {
                *emitted
            }
        }
    }

    /// Whether the cycle was abandoned
    pub fn is_failed(&self) -> bool {
        matches!(self, PollCycleResult::Failed { .. })
    }
}
