//! SQS input binary
//!
//! Usage: `sqs-input [CONFIG_PATH]`. Environment variables (`SQS_INPUT_*`)
//! override file values. Records are written to stdout as JSON lines.

use anyhow::Context;
use sqs_input::{
    config::LogFormat, Config, JsonLinesRouter, Poller, QueueClient, Scheduler, SqsQueueClient,
    StubQueueClient,
};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("failed to load config from {}", path))?
            .with_env_overrides()?,
        None => Config::from_env()?,
    };

    init_tracing(config.log_format);

    config.validate()?;
    info!("Starting SQS input: {:?}", config);

    let client: Arc<dyn QueueClient> = if config.stub_responses {
        info!("stub_responses enabled, using in-memory queue");
        Arc::new(StubQueueClient::new(config.queue_url()))
    } else {
        Arc::new(SqsQueueClient::from_config(&config).await?)
    };

    let router = Arc::new(JsonLinesRouter::stdout());
    let poller = Arc::new(Poller::from_config(&config, client, router));
    let handle = Scheduler::new(poller, config.receive_interval()?).start()?;

    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(err) => error!("Unable to listen for shutdown signal: {}", err),
    }

    handle.shutdown().await?;
    info!("SQS input stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // Logs go to stderr; stdout carries the emitted records.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
