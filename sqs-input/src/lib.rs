//! SQS input bridge
//!
//! Polls an Amazon SQS queue and feeds each message into an event pipeline:
//! - Fixed-interval scheduling with non-overlapping cycles
//! - Long-polling batch receive with tunable batch size and visibility timeout
//! - Structured (metadata envelope) or raw (parsed JSON body) records
//! - Routing labels fixed or derived from a record field
//! - Optional delete-on-receive acknowledgment
//! - Per-cycle failure isolation; the next tick is the only retry
//! - Observability via Prometheus metrics

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod poller;
pub mod router;
pub mod scheduler;
pub mod tag;
pub mod transform;
pub mod types;

pub use client::{QueueClient, SqsQueueClient, StubQueueClient};
pub use config::Config;
pub use error::{Error, Result};
pub use poller::{PollSettings, Poller};
pub use router::{ChannelRouter, JsonLinesRouter, Router};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use tag::{TagResolver, TagSource};
pub use transform::TransformMode;
pub use types::{Event, PollCycleResult, RawMessage, Record};
