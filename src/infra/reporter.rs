//! Asynchronous status reporting to the coordinator.
//!
//! Callers hand a snapshot of the task's context to [`StatusReporter::send`],
//! which only enqueues it. A dedicated thread drains the channel into the
//! configured [`StatusSender`], so a slow or unreachable coordinator never
//! delays cancellation.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::{AppResult, DispatchError, ExecutionStatus, TaskExecutionContext, TaskInstanceId};
use crate::util::clock::now_ms;

/// Status notification for one task instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Unique id of this report, for de-duplication on the coordinator side.
    pub report_id: Uuid,
    /// Task the report is about.
    pub task_instance_id: TaskInstanceId,
    /// Owning workflow instance.
    pub workflow_instance_id: u64,
    /// Task name.
    pub task_name: String,
    /// Reported status.
    pub status: ExecutionStatus,
    /// Creation time in milliseconds since epoch.
    pub created_at_ms: u128,
}

impl StatusReport {
    /// Snapshot the context's current status.
    #[must_use]
    pub fn from_context(context: &TaskExecutionContext) -> Self {
        Self {
            report_id: Uuid::new_v4(),
            task_instance_id: context.task_instance_id(),
            workflow_instance_id: context.workflow_instance_id(),
            task_name: context.task_name().to_owned(),
            status: context.status(),
            created_at_ms: now_ms(),
        }
    }
}

/// Transport delivering reports to the coordinator.
pub trait StatusSender: Send + Sync + 'static {
    /// Deliver one report.
    ///
    /// # Errors
    ///
    /// Delivery failure. It is logged and counted; reports are not retried.
    fn send(&self, report: &StatusReport) -> AppResult<()>;
}

/// Sender that only logs reports. Used when the host wires no transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogStatusSender;

impl StatusSender for LogStatusSender {
    fn send(&self, report: &StatusReport) -> AppResult<()> {
        info!(
            task_instance_id = report.task_instance_id,
            status = ?report.status,
            report_id = %report.report_id,
            "Task status report"
        );
        Ok(())
    }
}

/// In-memory sender for testing and dev, keeping the most recent reports.
#[derive(Debug)]
pub struct InMemoryStatusSender {
    reports: Mutex<VecDeque<StatusReport>>,
    max_reports: usize,
}

impl InMemoryStatusSender {
    /// Create a sender retaining at most `max_reports` reports.
    #[must_use]
    pub fn new(max_reports: usize) -> Self {
        Self {
            reports: Mutex::new(VecDeque::with_capacity(max_reports)),
            max_reports,
        }
    }

    /// Snapshot of retained reports, oldest first.
    #[must_use]
    pub fn reports(&self) -> Vec<StatusReport> {
        self.reports.lock().iter().cloned().collect()
    }
}

impl StatusSender for InMemoryStatusSender {
    fn send(&self, report: &StatusReport) -> AppResult<()> {
        let mut reports = self.reports.lock();
        if reports.len() >= self.max_reports {
            reports.pop_front();
        }
        reports.push_back(report.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct ReporterCounters {
    sent: AtomicU64,
    failed: AtomicU64,
}

/// Fire-and-forget handoff of status reports to a background thread.
pub struct StatusReporter {
    tx: Mutex<Option<Sender<StatusReport>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<ReporterCounters>,
}

impl StatusReporter {
    /// Start the reporter thread draining into `sender`.
    ///
    /// # Errors
    ///
    /// `Internal` if the thread cannot be spawned.
    pub fn new(sender: Arc<dyn StatusSender>) -> Result<Self, DispatchError> {
        let (tx, rx) = unbounded::<StatusReport>();
        let counters = Arc::new(ReporterCounters::default());
        let worker = spawn_reporter(rx, sender, Arc::clone(&counters))
            .map_err(|e| DispatchError::Internal(format!("failed to spawn status reporter: {e}")))?;

        Ok(Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            counters,
        })
    }

    /// Enqueue a report of the context's current status. Never blocks.
    ///
    /// # Errors
    ///
    /// `ReporterClosed` after [`Self::shutdown`].
    pub fn send(&self, context: &TaskExecutionContext) -> Result<(), DispatchError> {
        let report = StatusReport::from_context(context);
        let task_instance_id = report.task_instance_id;
        let guard = self.tx.lock();
        let tx = guard.as_ref().ok_or(DispatchError::ReporterClosed)?;
        tx.send(report).map_err(|_| DispatchError::ReporterClosed)?;
        debug!(task_instance_id, "Status report enqueued");
        Ok(())
    }

    /// Reports delivered successfully.
    #[must_use]
    pub fn sent_count(&self) -> u64 {
        self.counters.sent.load(Ordering::Relaxed)
    }

    /// Reports whose delivery failed.
    #[must_use]
    pub fn failed_count(&self) -> u64 {
        self.counters.failed.load(Ordering::Relaxed)
    }

    /// Stop accepting reports, deliver what is already queued, and join the
    /// reporter thread.
    pub fn shutdown(&self) {
        let Some(tx) = self.tx.lock().take() else {
            return;
        };
        drop(tx);
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                warn!("Status reporter thread panicked");
            }
        }
    }
}

impl Drop for StatusReporter {
    fn drop(&mut self) {
        // Closing the channel lets the thread drain and exit on its own.
        self.tx.lock().take();
    }
}

fn spawn_reporter(
    rx: Receiver<StatusReport>,
    sender: Arc<dyn StatusSender>,
    counters: Arc<ReporterCounters>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("worker-status-reporter".into())
        .spawn(move || {
            for report in rx {
                match sender.send(&report) {
                    Ok(()) => {
                        counters.sent.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        counters.failed.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            task_instance_id = report.task_instance_id,
                            error = %e,
                            "Failed to send task status report"
                        );
                    }
                }
            }
            debug!("Status reporter exiting");
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    struct FailingSender;

    impl StatusSender for FailingSender {
        fn send(&self, _report: &StatusReport) -> AppResult<()> {
            anyhow::bail!("coordinator unreachable")
        }
    }

    #[test]
    fn test_reports_are_delivered_in_order() {
        let sink = Arc::new(InMemoryStatusSender::new(16));
        let reporter = StatusReporter::new(sink.clone()).unwrap();

        for id in 1..=3 {
            let ctx = TaskExecutionContext::new(id, "t");
            ctx.set_status(ExecutionStatus::Kill);
            reporter.send(&ctx).unwrap();
        }
        reporter.shutdown();

        let ids: Vec<_> = sink.reports().iter().map(|r| r.task_instance_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(sink.reports().iter().all(|r| r.status == ExecutionStatus::Kill));
        assert_eq!(reporter.sent_count(), 3);
    }

    #[test]
    fn test_failures_are_counted_not_retried() {
        let reporter = StatusReporter::new(Arc::new(FailingSender)).unwrap();
        reporter.send(&TaskExecutionContext::new(1, "t")).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while reporter.failed_count() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(reporter.failed_count(), 1);
        assert_eq!(reporter.sent_count(), 0);
    }

    #[test]
    fn test_send_after_shutdown_is_rejected() {
        let reporter = StatusReporter::new(Arc::new(LogStatusSender)).unwrap();
        reporter.shutdown();
        assert!(matches!(
            reporter.send(&TaskExecutionContext::new(1, "t")),
            Err(DispatchError::ReporterClosed)
        ));
    }

    #[test]
    fn test_in_memory_sender_is_bounded() {
        let sink = InMemoryStatusSender::new(2);
        for id in 1..=3 {
            sink.send(&StatusReport::from_context(&TaskExecutionContext::new(id, "t")))
                .unwrap();
        }
        let ids: Vec<_> = sink.reports().iter().map(|r| r.task_instance_id).collect();
        assert_eq!(ids, vec![2, 3]);
    }
}
