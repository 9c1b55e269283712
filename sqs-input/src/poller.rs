//! Poll cycle: receive, transform, acknowledge, tag, emit
//!
//! One call to [`Poller::run`] processes a single batch in receive order.
//! Any failure abandons the rest of the batch; unprocessed messages stay in
//! flight on the queue and are redelivered once their visibility timeout
//! lapses. Failures are logged and reported in the [`PollCycleResult`],
//! never returned as errors.

use crate::{
    client::QueueClient,
    config::Config,
    metrics::{
        MESSAGES_DELETED_TOTAL, MESSAGES_RECEIVED_TOTAL, POLL_CYCLES_TOTAL, POLL_CYCLE_DURATION,
        RECORDS_EMITTED_TOTAL,
    },
    router::Router,
    tag::TagResolver,
    transform::TransformMode,
    types::PollCycleResult,
    Error, Result,
};
use chrono::Utc;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Receive parameters and per-message behaviour
#[derive(Debug, Clone)]
pub struct PollSettings {
    /// Messages per receive call
    pub max_number_of_messages: i32,

    /// Long-poll duration in seconds
    pub wait_time_seconds: i32,

    /// Visibility timeout override
    pub visibility_timeout: Option<i32>,

    /// Delete each message after transform
    pub delete_message: bool,

    /// Record conversion mode
    pub mode: TransformMode,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            max_number_of_messages: 10,
            wait_time_seconds: 10,
            visibility_timeout: None,
            delete_message: false,
            mode: TransformMode::Structured,
        }
    }
}

impl From<&Config> for PollSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_number_of_messages: config.max_number_of_messages,
            wait_time_seconds: config.wait_time_seconds,
            visibility_timeout: config.visibility_timeout,
            delete_message: config.delete_message,
            mode: TransformMode::from_raw_flag(config.raw_message),
        }
    }
}

/// Poll cycle controller
pub struct Poller {
    client: Arc<dyn QueueClient>,
    router: Arc<dyn Router>,
    tags: TagResolver,
    settings: PollSettings,
}

impl Poller {
    /// Create poller over an injected client and router
    pub fn new(
        client: Arc<dyn QueueClient>,
        router: Arc<dyn Router>,
        tags: TagResolver,
        settings: PollSettings,
    ) -> Self {
        Self {
            client,
            router,
            tags,
            settings,
        }
    }

    /// Create poller with settings and tags taken from configuration
    pub fn from_config(
        config: &Config,
        client: Arc<dyn QueueClient>,
        router: Arc<dyn Router>,
    ) -> Self {
        Self::new(
            client,
            router,
            TagResolver::new(config.tag.clone(), config.tag_key.clone()),
            PollSettings::from(config),
        )
    }

    /// Poll settings
    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// Run one cycle
    pub async fn run(&self) -> PollCycleResult {
        let start = Instant::now();
        let mut emitted = 0;

        let result = match self.process_batch(&mut emitted).await {
            Ok(received) => PollCycleResult::Processed { received, emitted },
            Err(e) => {
                error!(
                    error = %e,
                    error_class = e.class(),
                    emitted,
                    "failed to emit or receive"
                );
                warn_source_chain(&e);

                PollCycleResult::Failed {
                    emitted,
                    class: e.class(),
                    error: e.to_string(),
                }
            }
        };

        POLL_CYCLES_TOTAL.with_label_values(&[result.status()]).inc();
        POLL_CYCLE_DURATION.observe(start.elapsed().as_secs_f64());

        result
    }

    async fn process_batch(&self, emitted: &mut usize) -> Result<usize> {
        let messages = self
            .client
            .receive(
                self.settings.max_number_of_messages,
                self.settings.wait_time_seconds,
                self.settings.visibility_timeout,
            )
            .await?;

        if messages.is_empty() {
            debug!("No messages received");
            return Ok(0);
        }
        MESSAGES_RECEIVED_TOTAL.inc_by(messages.len() as u64);

        for message in &messages {
            let mut record = self.settings.mode.transform(message);

            // Acknowledged before tagging and emission.
            if self.settings.delete_message {
                self.client.delete(&message.receipt_handle).await?;
                MESSAGES_DELETED_TOTAL.inc();
            }

            let (tag, source) = self.tags.resolve_with_source(&mut record);

            debug!(
                message_id = %message.message_id,
                record = ?record,
                "emitting record under tag {}",
                tag
            );
            self.router.emit(&tag, Utc::now(), record).await?;

            RECORDS_EMITTED_TOTAL
                .with_label_values(&[source.as_str()])
                .inc();
            *emitted += 1;
        }

        Ok(messages.len())
    }
}

fn warn_source_chain(err: &Error) {
    for cause in source_chain(err) {
        warn!("  caused by: {}", cause);
    }
}

fn source_chain(err: &Error) -> Vec<String> {
    let mut chain = Vec::new();
    let mut source = StdError::source(err);
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = StdError::source(cause);
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        client::StubQueueClient,
        router::ChannelRouter,
        types::{RawMessage, Record},
    };
    use async_trait::async_trait;
    use chrono::DateTime;
    use serde_json::{json, Value};

    struct FailingRouter;

    /// Client whose receive fails with a wrapped transport error
    struct UnreachableClient;

    #[async_trait]
    impl QueueClient for UnreachableClient {
        async fn receive(
            &self,
            _max: i32,
            _wait_seconds: i32,
            _visibility_timeout: Option<i32>,
        ) -> Result<Vec<RawMessage>> {
            Err(Error::Receive {
                message: "dispatch failure".to_string(),
                cause: Some(Box::new(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "connection refused",
                ))),
            })
        }

        async fn delete(&self, _receipt_handle: &str) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl Router for FailingRouter {
        async fn emit(&self, _tag: &str, _time: DateTime<Utc>, _record: Record) -> Result<()> {
            Err(Error::Emit("pipeline unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_empty_batch_is_idempotent() {
        let stub = Arc::new(StubQueueClient::new("q1"));
        let (router, mut rx) = ChannelRouter::new(8);
        let poller = Poller::new(
            stub.clone(),
            Arc::new(router),
            TagResolver::new("default", None),
            PollSettings::default(),
        );

        for _ in 0..2 {
            assert_eq!(
                poller.run().await,
                PollCycleResult::Processed { received: 0, emitted: 0 }
            );
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(stub.receive_calls(), 2);
    }

    #[tokio::test]
    async fn test_raw_mode_with_tag_key() {
        let stub = Arc::new(StubQueueClient::new("q1"));
        stub.push_body(r#"{"type": "alert", "v": 1}"#);
        stub.push_body("plain text");

        let (router, mut rx) = ChannelRouter::new(8);
        let settings = PollSettings {
            mode: TransformMode::Raw,
            ..Default::default()
        };
        let poller = Poller::new(
            stub.clone(),
            Arc::new(router),
            TagResolver::new("default", Some("type".to_string())),
            settings,
        );

        assert_eq!(
            poller.run().await,
            PollCycleResult::Processed { received: 2, emitted: 2 }
        );

        let first = rx.recv().await.unwrap();
        assert_eq!(first.tag, "alert");
        assert_eq!(Value::Object(first.record), json!({"v": 1}));

        let second = rx.recv().await.unwrap();
        assert_eq!(second.tag, "default");
        assert_eq!(Value::Object(second.record), json!({"message": "plain text"}));

        // Not deleted: both still in flight
        assert!(stub.deleted().is_empty());
        assert_eq!(stub.in_flight(), 2);
    }

    #[tokio::test]
    async fn test_emit_failure_is_contained_without_delete() {
        let stub = Arc::new(StubQueueClient::new("q1"));
        stub.push(RawMessage::new("hello", "").with_message_id("m1"));

        let poller = Poller::new(
            stub.clone(),
            Arc::new(FailingRouter),
            TagResolver::new("default", None),
            PollSettings::default(),
        );

        let result = poller.run().await;
        assert_eq!(
            result,
            PollCycleResult::Failed {
                emitted: 0,
                class: "Emit",
                error: "Emit error: pipeline unavailable".to_string(),
            }
        );
        assert!(stub.deleted().is_empty());
        assert_eq!(stub.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_delete_happens_before_emit() {
        let stub = Arc::new(StubQueueClient::new("q1"));
        stub.push(RawMessage::new("hello", "").with_message_id("m1"));

        let settings = PollSettings {
            delete_message: true,
            ..Default::default()
        };
        let poller = Poller::new(
            stub.clone(),
            Arc::new(FailingRouter),
            TagResolver::new("default", None),
            settings,
        );

        assert!(poller.run().await.is_failed());
        assert_eq!(stub.deleted(), vec!["m1".to_string()]);
    }

    #[tokio::test]
    async fn test_receive_failure_is_contained() {
        let stub = Arc::new(StubQueueClient::new("q1"));
        stub.fail_next_receive("InvalidClientTokenId");
        stub.push_body("later");

        let (router, mut rx) = ChannelRouter::new(8);
        let poller = Poller::new(
            stub.clone(),
            Arc::new(router),
            TagResolver::new("default", None),
            PollSettings::default(),
        );

        let failed = poller.run().await;
        assert!(matches!(failed, PollCycleResult::Failed { class: "Receive", .. }));

        assert_eq!(
            poller.run().await,
            PollCycleResult::Processed { received: 1, emitted: 1 }
        );
        assert_eq!(rx.recv().await.unwrap().record["body"], json!("later"));
    }

    #[test]
    fn test_settings_from_config() {
        let config = Config {
            tag: "t".to_string(),
            max_number_of_messages: 5,
            wait_time_seconds: 20,
            visibility_timeout: Some(60),
            delete_message: true,
            raw_message: true,
            ..Default::default()
        };

        let settings = PollSettings::from(&config);
        assert_eq!(settings.max_number_of_messages, 5);
        assert_eq!(settings.wait_time_seconds, 20);
        assert_eq!(settings.visibility_timeout, Some(60));
        assert!(settings.delete_message);
        assert_eq!(settings.mode, TransformMode::Raw);
    }

    #[tokio::test]
    async fn test_receive_arguments_reach_client() {
        let stub = Arc::new(StubQueueClient::new("q1"));
        let (router, _rx) = ChannelRouter::new(8);
        let router: Arc<dyn Router> = Arc::new(router);

        let poller = Poller::new(
            stub.clone(),
            router.clone(),
            TagResolver::new("default", None),
            PollSettings::default(),
        );
        poller.run().await;
        assert_eq!(stub.last_receive(), Some((10, 10, None)));

        let config = Config {
            tag: "t".to_string(),
            max_number_of_messages: 3,
            wait_time_seconds: 0,
            visibility_timeout: Some(120),
            ..Default::default()
        };
        let poller = Poller::from_config(&config, stub.clone(), router);
        poller.run().await;
        assert_eq!(stub.last_receive(), Some((3, 0, Some(120))));
    }

    #[tokio::test]
    async fn test_derived_tags_keep_metric_series_bounded() {
        let stub = Arc::new(StubQueueClient::new("q1"));
        for i in 0..50 {
            stub.push_body(format!(r#"{{"type": "t-{}"}}"#, i));
        }
        stub.push_body(r#"{"v": 1}"#);

        let (router, mut rx) = ChannelRouter::new(64);
        let settings = PollSettings {
            mode: TransformMode::Raw,
            delete_message: true,
            ..Default::default()
        };
        let poller = Poller::new(
            stub.clone(),
            Arc::new(router),
            TagResolver::new("default", Some("type".to_string())),
            settings,
        );

        for _ in 0..6 {
            assert!(!poller.run().await.is_failed());
        }
        let mut tags = std::collections::HashSet::new();
        while let Ok(event) = rx.try_recv() {
            tags.insert(event.tag);
        }
        assert_eq!(tags.len(), 51);

        let family = prometheus::gather()
            .into_iter()
            .find(|f| f.get_name() == "sqs_input_records_emitted_total")
            .unwrap();
        assert!(family.get_metric().len() <= 2);
        for metric in family.get_metric() {
            let label = &metric.get_label()[0];
            assert_eq!(label.get_name(), "source");
            assert!(["fixed", "derived"].contains(&label.get_value()));
        }
    }

    #[tokio::test]
    async fn test_failure_keeps_transport_cause() {
        let (router, _rx) = ChannelRouter::new(8);
        let poller = Poller::new(
            Arc::new(UnreachableClient),
            Arc::new(router),
            TagResolver::new("default", None),
            PollSettings::default(),
        );

        let result = poller.run().await;
        assert!(matches!(result, PollCycleResult::Failed { class: "Receive", .. }));

        let err = UnreachableClient.receive(10, 10, None).await.unwrap_err();
        assert_eq!(source_chain(&err), vec!["connection refused".to_string()]);
        assert!(source_chain(&Error::receive("throttled")).is_empty());
    }
}
