//! Fixed-interval scheduler driving the poll cycle
//!
//! Cycles never overlap: a cycle that overruns the interval delays the next
//! tick instead of running concurrently. Shutdown stops future ticks and lets
//! an in-flight cycle finish.

use crate::{poller::Poller, Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Periodic poll scheduler
pub struct Scheduler {
    poller: Arc<Poller>,
    interval: Duration,
}

impl Scheduler {
    /// Create scheduler for a poller
    pub fn new(poller: Arc<Poller>, interval: Duration) -> Self {
        Self { poller, interval }
    }

    /// Spawn the polling loop
    pub fn start(self) -> Result<SchedulerHandle> {
        if self.interval.is_zero() {
            return Err(Error::Config("receive interval must be positive".to_string()));
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!("Starting SQS poll scheduler (interval: {:?})", self.interval);
        let task = tokio::spawn(run_loop(self.poller, self.interval, shutdown_rx));

        Ok(SchedulerHandle {
            shutdown: shutdown_tx,
            task,
        })
    }
}

async fn run_loop(poller: Arc<Poller>, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = interval.tick() => {}
        }

        // Outside select: shutdown never cancels a running cycle.
        let result = poller.run().await;
        debug!(status = result.status(), emitted = result.emitted(), "Poll cycle finished");

        if *shutdown.borrow() {
            break;
        }
    }

    info!("SQS poll scheduler stopped");
}

/// Handle to a running scheduler.
///
/// Dropping the handle also stops the loop once the current cycle ends.
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Whether the polling loop is still running
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop future cycles and wait for the current one to finish
    pub async fn shutdown(self) -> Result<()> {
        info!("Shutting down SQS poll scheduler");
        // Err only when the loop already exited and dropped its receiver.
        let _ = self.shutdown.send(true);

        self.task
            .await
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))
    }
}
