//! Configuration for the SQS input

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Largest batch SQS returns from a single receive call
pub const MAX_BATCH_SIZE: i32 = 10;

/// Longest long-poll wait SQS accepts
pub const MAX_WAIT_TIME_SECONDS: i32 = 20;

/// Longest visibility timeout SQS accepts (12 hours)
pub const MAX_VISIBILITY_TIMEOUT: i32 = 43_200;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// SQS input configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Static access key id (default credential chain when unset)
    pub aws_key_id: Option<String>,

    /// Static secret access key
    pub aws_sec_key: Option<String>,

    /// Routing label used when no tag key is configured or the field is absent
    pub tag: String,

    /// Record field to derive the routing label from
    pub tag_key: Option<String>,

    /// AWS region
    pub region: String,

    /// Queue to poll
    pub sqs_url: Option<String>,

    /// Endpoint override (LocalStack, ElasticMQ)
    pub endpoint_url: Option<String>,

    /// Seconds between poll cycles
    pub receive_interval: f64,

    /// Messages per receive call (1-10)
    pub max_number_of_messages: i32,

    /// Long-poll duration in seconds (0-20)
    pub wait_time_seconds: i32,

    /// Seconds a received message stays hidden (queue default when unset)
    pub visibility_timeout: Option<i32>,

    /// Delete each message right after it is transformed
    pub delete_message: bool,

    /// Use the in-memory queue instead of the network client
    pub stub_responses: bool,

    /// Parse the body as JSON instead of wrapping it with delivery metadata
    pub raw_message: bool,

    /// Log output format
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            aws_key_id: None,
            aws_sec_key: None,
            tag: String::new(),
            tag_key: None,
            region: "ap-northeast-1".to_string(),
            sqs_url: None,
            endpoint_url: None,
            receive_interval: 0.1,
            max_number_of_messages: MAX_BATCH_SIZE,
            wait_time_seconds: 10,
            visibility_timeout: None,
            delete_message: false,
            stub_responses: false,
            raw_message: false,
            log_format: LogFormat::Pretty,
        }
    }
}

// Credentials never reach logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("aws_key_id", &self.aws_key_id.as_ref().map(|_| "[REDACTED]"))
            .field("aws_sec_key", &self.aws_sec_key.as_ref().map(|_| "[REDACTED]"))
            .field("tag", &self.tag)
            .field("tag_key", &self.tag_key)
            .field("region", &self.region)
            .field("sqs_url", &self.sqs_url)
            .field("endpoint_url", &self.endpoint_url)
            .field("receive_interval", &self.receive_interval)
            .field("max_number_of_messages", &self.max_number_of_messages)
            .field("wait_time_seconds", &self.wait_time_seconds)
            .field("visibility_timeout", &self.visibility_timeout)
            .field("delete_message", &self.delete_message)
            .field("stub_responses", &self.stub_responses)
            .field("raw_message", &self.raw_message)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        Config::default().with_env_overrides()
    }

    /// Overlay `SQS_INPUT_*` environment variables
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("SQS_INPUT_{}", name));

        if let Some(v) = var("AWS_KEY_ID") {
            self.aws_key_id = Some(v);
        }
        if let Some(v) = var("AWS_SEC_KEY") {
            self.aws_sec_key = Some(v);
        }
        if let Some(v) = var("TAG") {
            self.tag = v;
        }
        if let Some(v) = var("TAG_KEY") {
            self.tag_key = Some(v);
        }
        if let Some(v) = var("REGION") {
            self.region = v;
        }
        if let Some(v) = var("SQS_URL") {
            self.sqs_url = Some(v);
        }
        if let Some(v) = var("ENDPOINT_URL") {
            self.endpoint_url = Some(v);
        }
        if let Some(v) = var("RECEIVE_INTERVAL") {
            self.receive_interval = parse_var("RECEIVE_INTERVAL", &v)?;
        }
        if let Some(v) = var("MAX_NUMBER_OF_MESSAGES") {
            self.max_number_of_messages = parse_var("MAX_NUMBER_OF_MESSAGES", &v)?;
        }
        if let Some(v) = var("WAIT_TIME_SECONDS") {
            self.wait_time_seconds = parse_var("WAIT_TIME_SECONDS", &v)?;
        }
        if let Some(v) = var("VISIBILITY_TIMEOUT") {
            self.visibility_timeout = Some(parse_var("VISIBILITY_TIMEOUT", &v)?);
        }
        if let Some(v) = var("DELETE_MESSAGE") {
            self.delete_message = parse_var("DELETE_MESSAGE", &v)?;
        }
        if let Some(v) = var("STUB_RESPONSES") {
            self.stub_responses = parse_var("STUB_RESPONSES", &v)?;
        }
        if let Some(v) = var("RAW_MESSAGE") {
            self.raw_message = parse_var("RAW_MESSAGE", &v)?;
        }
        if let Some(v) = var("LOG_FORMAT") {
            self.log_format = match v.to_ascii_lowercase().as_str() {
                "pretty" => LogFormat::Pretty,
                "json" => LogFormat::Json,
                other => {
                    return Err(Error::Config(format!("Invalid SQS_INPUT_LOG_FORMAT '{}'", other)))
                }
            };
        }

        Ok(self)
    }

    /// Check required options and SQS parameter ranges
    pub fn validate(&self) -> Result<()> {
        if self.tag.trim().is_empty() {
            return Err(Error::Config("tag is required".to_string()));
        }

        if matches!(self.tag_key.as_deref(), Some(key) if key.is_empty()) {
            return Err(Error::Config("tag_key must not be empty".to_string()));
        }

        if !self.stub_responses && self.sqs_url.as_deref().map_or(true, str::is_empty) {
            return Err(Error::Config(
                "sqs_url is required unless stub_responses is enabled".to_string(),
            ));
        }

        if self.aws_key_id.is_some() != self.aws_sec_key.is_some() {
            return Err(Error::Config(
                "aws_key_id and aws_sec_key must be set together".to_string(),
            ));
        }

        self.receive_interval()?;

        if !(1..=MAX_BATCH_SIZE).contains(&self.max_number_of_messages) {
            return Err(Error::Config(format!(
                "max_number_of_messages must be between 1 and {}, got {}",
                MAX_BATCH_SIZE, self.max_number_of_messages
            )));
        }

        if !(0..=MAX_WAIT_TIME_SECONDS).contains(&self.wait_time_seconds) {
            return Err(Error::Config(format!(
                "wait_time_seconds must be between 0 and {}, got {}",
                MAX_WAIT_TIME_SECONDS, self.wait_time_seconds
            )));
        }

        if let Some(timeout) = self.visibility_timeout {
            if !(0..=MAX_VISIBILITY_TIMEOUT).contains(&timeout) {
                return Err(Error::Config(format!(
                    "visibility_timeout must be between 0 and {}, got {}",
                    MAX_VISIBILITY_TIMEOUT, timeout
                )));
            }
        }

        Ok(())
    }

    /// Scheduler period; rejects non-positive, non-finite and overflowing values
    pub fn receive_interval(&self) -> Result<Duration> {
        match Duration::try_from_secs_f64(self.receive_interval) {
            Ok(period) if !period.is_zero() => Ok(period),
            _ => Err(Error::Config(format!(
                "receive_interval must be a positive number of seconds, got {}",
                self.receive_interval
            ))),
        }
    }

    /// Queue url, empty when only the stub client is used
    pub fn queue_url(&self) -> &str {
        self.sqs_url.as_deref().unwrap_or("")
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid SQS_INPUT_{} '{}': {}", name, value, e)))
}
