//! Downstream routers receiving emitted events

use crate::{
    types::{Event, Record},
    Error, Result,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::io::Write;
use tokio::sync::mpsc;

/// Event sink for tagged records
#[async_trait]
pub trait Router: Send + Sync {
    /// Hand one record to the pipeline
    async fn emit(&self, tag: &str, time: DateTime<Utc>, record: Record) -> Result<()>;
}

/// Forwards events over a bounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelRouter {
    sender: mpsc::Sender<Event>,
}

impl ChannelRouter {
    /// Create router and the receiving end of its channel
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl Router for ChannelRouter {
    async fn emit(&self, tag: &str, time: DateTime<Utc>, record: Record) -> Result<()> {
        self.sender
            .send(Event {
                tag: tag.to_string(),
                time,
                record,
            })
            .await
            .map_err(|_| Error::Emit("Router channel closed".to_string()))
    }
}

/// Writes each event as one JSON line
pub struct JsonLinesRouter<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesRouter<W> {
    /// Create router over a writer
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl JsonLinesRouter<std::io::Stdout> {
    /// Router writing to standard output
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

#[async_trait]
impl<W: Write + Send> Router for JsonLinesRouter<W> {
    async fn emit(&self, tag: &str, time: DateTime<Utc>, record: Record) -> Result<()> {
        let event = Event {
            tag: tag.to_string(),
            time,
            record,
        };
        let line = serde_json::to_string(&event)?;

        let mut writer = self.writer.lock();
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> Record {
        let mut record = Record::new();
        record.insert("v".into(), json!(1));
        record
    }

    #[tokio::test]
    async fn test_channel_router() {
        let (router, mut rx) = ChannelRouter::new(4);
        let now = Utc::now();

        router.emit("alert", now, record()).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.tag, "alert");
        assert_eq!(event.time, now);
        assert_eq!(event.record, record());
    }

    #[tokio::test]
    async fn test_channel_router_closed() {
        let (router, rx) = ChannelRouter::new(1);
        drop(rx);

        let err = router.emit("alert", Utc::now(), record()).await.unwrap_err();
        assert!(matches!(err, Error::Emit(_)));
    }

    #[tokio::test]
    async fn test_json_lines_router() {
        let router = JsonLinesRouter::new(Vec::new());
        router.emit("a", Utc::now(), record()).await.unwrap();
        router.emit("b", Utc::now(), Record::new()).await.unwrap();

        let output = String::from_utf8(router.into_inner()).unwrap();
        let lines: Vec<Event> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].tag, "a");
        assert_eq!(lines[0].record, record());
        assert_eq!(lines[1].tag, "b");
        assert!(lines[1].record.is_empty());
    }
}
