//! Queue client adapters
//!
//! [`SqsQueueClient`] talks to Amazon SQS through the official SDK.
//! [`StubQueueClient`] is an in-memory queue used for `stub_responses` and tests.

use crate::{config::Config, types::RawMessage, Error, Result};
use async_trait::async_trait;
use aws_sdk_sqs::{
    config::{Credentials, Region},
    error::DisplayErrorContext,
    types::MessageSystemAttributeName,
    Client as SqsClient,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, info};
use uuid::Uuid;

/// Batch receive and single delete against a queue
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Receive up to `max` messages, long-polling for `wait_seconds`
    async fn receive(
        &self,
        max: i32,
        wait_seconds: i32,
        visibility_timeout: Option<i32>,
    ) -> Result<Vec<RawMessage>>;

    /// Delete (acknowledge) a received message
    async fn delete(&self, receipt_handle: &str) -> Result<()>;
}

/// Amazon SQS client bound to one queue
pub struct SqsQueueClient {
    client: SqsClient,
    queue_url: String,
}

impl SqsQueueClient {
    /// Wrap an existing SDK client
    pub fn new(client: SqsClient, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }

    /// Build the SDK client from configuration.
    ///
    /// Static credentials take precedence over the default provider chain
    /// (environment, profile, instance metadata).
    pub async fn from_config(config: &Config) -> Result<Self> {
        let queue_url = config
            .sqs_url
            .clone()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| Error::Config("sqs_url is required".to_string()))?;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(key_id), Some(secret)) = (&config.aws_key_id, &config.aws_sec_key) {
            loader = loader.credentials_provider(Credentials::new(
                key_id.clone(),
                secret.clone(),
                None,
                None,
                "sqs-input",
            ));
        }

        if let Some(endpoint) = config.endpoint_url.as_deref().filter(|e| !e.is_empty()) {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;

        info!(
            "SQS client configured for {} (region: {})",
            queue_url, config.region
        );

        Ok(Self::new(SqsClient::new(&sdk_config), queue_url))
    }

    /// Queue this client polls
    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    fn to_raw(&self, message: &aws_sdk_sqs::types::Message) -> RawMessage {
        let attributes = message
            .attributes()
            .map(|attrs| {
                attrs
                    .iter()
                    .map(|(k, v)| (k.as_str().to_string(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();

        RawMessage {
            body: message.body().unwrap_or_default().to_string(),
            receipt_handle: message.receipt_handle().unwrap_or_default().to_string(),
            message_id: message.message_id().unwrap_or_default().to_string(),
            md5_of_body: message.md5_of_body().unwrap_or_default().to_string(),
            queue_url: self.queue_url.clone(),
            attributes,
        }
    }
}

#[async_trait]
impl QueueClient for SqsQueueClient {
    async fn receive(
        &self,
        max: i32,
        wait_seconds: i32,
        visibility_timeout: Option<i32>,
    ) -> Result<Vec<RawMessage>> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max)
            .wait_time_seconds(wait_seconds)
            .set_visibility_timeout(visibility_timeout)
            .message_system_attribute_names(MessageSystemAttributeName::SenderId)
            .send()
            .await
            .map_err(|e| Error::Receive {
                message: DisplayErrorContext(&e).to_string(),
                cause: Some(Box::new(e)),
            })?;

        Ok(output.messages().iter().map(|m| self.to_raw(m)).collect())
    }

    async fn delete(&self, receipt_handle: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| Error::Delete {
                message: DisplayErrorContext(&e).to_string(),
                cause: Some(Box::new(e)),
            })?;

        Ok(())
    }
}

/// Arguments of one receive call: `(max, wait_seconds, visibility_timeout)`
pub type ReceiveArgs = (i32, i32, Option<i32>);

#[derive(Debug, Default)]
struct StubState {
    pending: VecDeque<RawMessage>,
    in_flight: HashMap<String, RawMessage>,
    deleted: Vec<String>,
    receive_calls: usize,
    last_receive: Option<ReceiveArgs>,
    receive_failures: VecDeque<String>,
    failing_deletes: HashSet<String>,
}

/// In-memory queue with SQS-like visibility semantics.
///
/// Received messages move in flight until deleted; [`StubQueueClient::expire_visibility`]
/// returns unacknowledged ones to the queue under fresh receipt handles.
#[derive(Debug)]
pub struct StubQueueClient {
    queue_url: String,
    state: Mutex<StubState>,
}

impl StubQueueClient {
    /// Create empty stub queue
    pub fn new(queue_url: impl Into<String>) -> Self {
        Self {
            queue_url: queue_url.into(),
            state: Mutex::new(StubState::default()),
        }
    }

    /// Enqueue a message; missing id, receipt handle and queue url are filled in
    pub fn push(&self, mut message: RawMessage) {
        if message.message_id.is_empty() {
            message.message_id = Uuid::new_v4().to_string();
        }
        if message.receipt_handle.is_empty() {
            message.receipt_handle = Uuid::new_v4().to_string();
        }
        if message.queue_url.is_empty() {
            message.queue_url = self.queue_url.clone();
        }
        self.state.lock().pending.push_back(message);
    }

    /// Enqueue a message with only a body
    pub fn push_body(&self, body: impl Into<String>) {
        self.push(RawMessage::new(body, ""));
    }

    /// Make the next receive call fail with `reason`
    pub fn fail_next_receive(&self, reason: impl Into<String>) {
        self.state.lock().receive_failures.push_back(reason.into());
    }

    /// Make deletes of the given message id fail
    pub fn fail_deletes_for(&self, message_id: impl Into<String>) {
        self.state.lock().failing_deletes.insert(message_id.into());
    }

    /// Return every in-flight message to the queue, as when the visibility timeout lapses
    pub fn expire_visibility(&self) -> usize {
        let mut state = self.state.lock();
        let mut expired: Vec<RawMessage> = state.in_flight.drain().map(|(_, m)| m).collect();
        expired.sort_by(|a, b| a.message_id.cmp(&b.message_id));

        let count = expired.len();
        for mut message in expired.into_iter().rev() {
            message.receipt_handle = Uuid::new_v4().to_string();
            state.pending.push_front(message);
        }
        count
    }

    /// Messages waiting to be received
    pub fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Messages received but not yet deleted
    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    /// Message ids deleted so far, in order
    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().deleted.clone()
    }

    /// Number of receive calls made
    pub fn receive_calls(&self) -> usize {
        self.state.lock().receive_calls
    }

    /// Arguments of the most recent receive call
    pub fn last_receive(&self) -> Option<ReceiveArgs> {
        self.state.lock().last_receive
    }
}

#[async_trait]
impl QueueClient for StubQueueClient {
    async fn receive(
        &self,
        max: i32,
        wait_seconds: i32,
        visibility_timeout: Option<i32>,
    ) -> Result<Vec<RawMessage>> {
        let mut state = self.state.lock();
        state.receive_calls += 1;
        state.last_receive = Some((max, wait_seconds, visibility_timeout));

        if let Some(reason) = state.receive_failures.pop_front() {
            return Err(Error::receive(reason));
        }

        let take = usize::try_from(max).unwrap_or(0).min(state.pending.len());
        let batch: Vec<RawMessage> = state.pending.drain(..take).collect();
        for message in &batch {
            state
                .in_flight
                .insert(message.receipt_handle.clone(), message.clone());
        }

        debug!("Stub queue returned {} messages", batch.len());
        Ok(batch)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<()> {
        let mut state = self.state.lock();

        let message_id = match state.in_flight.get(receipt_handle) {
            Some(message) => message.message_id.clone(),
            None => {
                return Err(Error::delete(format!(
                    "Receipt handle {} is not in flight",
                    receipt_handle
                )))
            }
        };

        if state.failing_deletes.contains(&message_id) {
            return Err(Error::delete(format!("Delete rejected for {}", message_id)));
        }

        state.in_flight.remove(receipt_handle);
        state.deleted.push(message_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_receive_respects_batch_size() {
        let stub = StubQueueClient::new("q1");
        for i in 0..12 {
            stub.push(RawMessage::new(format!("body-{}", i), "").with_message_id(format!("m{:02}", i)));
        }

        let batch = stub.receive(10, 10, None).await.unwrap();
        assert_eq!(batch.len(), 10);
        assert_eq!(batch[0].body, "body-0");
        assert_eq!(batch[0].queue_url, "q1");
        assert_eq!(stub.pending(), 2);
        assert_eq!(stub.in_flight(), 10);

        assert_eq!(stub.last_receive(), Some((10, 10, None)));

        let rest = stub.receive(10, 10, None).await.unwrap();
        assert_eq!(rest.len(), 2);
        assert!(stub.receive(10, 10, None).await.unwrap().is_empty());
        assert_eq!(stub.receive_calls(), 3);
    }

    #[tokio::test]
    async fn test_stub_delete_and_redelivery() {
        let stub = StubQueueClient::new("q1");
        stub.push(RawMessage::new("a", "").with_message_id("m1"));
        stub.push(RawMessage::new("b", "").with_message_id("m2"));

        let batch = stub.receive(10, 0, None).await.unwrap();
        stub.delete(&batch[0].receipt_handle).await.unwrap();
        assert_eq!(stub.deleted(), vec!["m1".to_string()]);

        // Stale handle after deletion
        assert!(stub.delete(&batch[0].receipt_handle).await.is_err());

        assert_eq!(stub.expire_visibility(), 1);
        let redelivered = stub.receive(10, 0, None).await.unwrap();
        assert_eq!(redelivered.len(), 1);
        assert_eq!(redelivered[0].message_id, "m2");
        assert_ne!(redelivered[0].receipt_handle, batch[1].receipt_handle);
    }

    #[tokio::test]
    async fn test_stub_failure_injection() {
        let stub = StubQueueClient::new("q1");
        stub.push(RawMessage::new("a", "").with_message_id("m1"));
        stub.fail_next_receive("AccessDenied");
        stub.fail_deletes_for("m1");

        let err = stub.receive(10, 0, None).await.unwrap_err();
        assert!(matches!(err, Error::Receive { .. }));

        let batch = stub.receive(10, 0, None).await.unwrap();
        let err = stub.delete(&batch[0].receipt_handle).await.unwrap_err();
        assert!(matches!(err, Error::Delete { .. }));
        assert_eq!(stub.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_sqs_client_requires_queue_url() {
        let config = Config {
            tag: "t".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            SqsQueueClient::from_config(&config).await,
            Err(Error::Config(_))
        ));
    }
}
