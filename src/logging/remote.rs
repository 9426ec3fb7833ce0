//! Remote Output Module
//!
//! Buffers entries and ships them as JSON arrays to an HTTP endpoint.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{LogError, LogResult};
use crate::logging::{LogEntry, LogOutput};

/// Buffered entries that trigger an immediate flush.
pub const MAX_BUFFERED_ENTRIES: usize = 100;

/// Period of the background flush.
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Upper bound on entries held for retry; the oldest are dropped beyond it.
pub const MAX_RETAINED_ENTRIES: usize = 1000;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

// == Log Transport ==
/// Ships a batch of entries to a URL.
#[async_trait]
pub trait LogTransport: Send + Sync {
    async fn post(&self, url: &str, entries: &[LogEntry]) -> LogResult<()>;
}

/// `reqwest`-backed transport posting the batch as a JSON array.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> LogResult<Self> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl LogTransport for HttpTransport {
    async fn post(&self, url: &str, entries: &[LogEntry]) -> LogResult<()> {
        let response = self.client.post(url).json(entries).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(LogError::Status(status.as_u16()))
        }
    }
}

// == Remote Output ==
struct RemoteShared {
    endpoint: String,
    transport: Arc<dyn LogTransport>,
    buffer: Mutex<VecDeque<LogEntry>>,
    /// Held for the duration of a send so batches go out in order
    send_lock: tokio::sync::Mutex<()>,
    /// Set while a threshold flush is spawned but not yet started
    flush_scheduled: AtomicBool,
    max_buffered: usize,
    max_retained: usize,
}

impl RemoteShared {
    /// Adds an entry and reports whether the flush threshold is reached.
    fn push(&self, entry: LogEntry) -> bool {
        let mut buffer = self.buffer.lock();
        buffer.push_back(entry);
        self.trim(&mut buffer);
        buffer.len() >= self.max_buffered
    }

    fn trim(&self, buffer: &mut VecDeque<LogEntry>) {
        let overflow = buffer.len().saturating_sub(self.max_retained);
        if overflow > 0 {
            buffer.drain(..overflow);
            warn!(dropped = overflow, "Remote log buffer full, dropping oldest entries");
        }
    }

    /// Returns a failed batch to the front of the buffer, ahead of entries
    /// written while it was in flight.
    fn requeue(&self, batch: Vec<LogEntry>) {
        let mut buffer = self.buffer.lock();
        for entry in batch.into_iter().rev() {
            buffer.push_front(entry);
        }
        self.trim(&mut buffer);
    }

    async fn flush(&self) -> LogResult<()> {
        let _sending = self.send_lock.lock().await;

        let batch: Vec<LogEntry> = self.buffer.lock().drain(..).collect();
        if batch.is_empty() {
            return Ok(());
        }

        let count = batch.len();
        match self.transport.post(&self.endpoint, &batch).await {
            Ok(()) => {
                debug!(count, endpoint = %self.endpoint, "Shipped log batch");
                Ok(())
            }
            Err(err) => {
                self.requeue(batch);
                Err(err)
            }
        }
    }
}

/// Output that batches entries for a remote collector.
///
/// A batch is sent when `max_buffered` entries are waiting or when the flush
/// timer fires, whichever comes first. Failed batches are kept for the next
/// attempt, up to `max_retained` entries.
pub struct RemoteOutput {
    shared: Arc<RemoteShared>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl RemoteOutput {
    /// Remote output with the default thresholds. Must be created inside a
    /// tokio runtime for the flush timer to run.
    pub fn new(endpoint: impl Into<String>, transport: Arc<dyn LogTransport>) -> Self {
        Self::with_limits(
            endpoint,
            transport,
            MAX_BUFFERED_ENTRIES,
            FLUSH_INTERVAL,
            MAX_RETAINED_ENTRIES,
        )
    }

    pub fn with_limits(
        endpoint: impl Into<String>,
        transport: Arc<dyn LogTransport>,
        max_buffered: usize,
        flush_interval: Duration,
        max_retained: usize,
    ) -> Self {
        let shared = Arc::new(RemoteShared {
            endpoint: endpoint.into(),
            transport,
            buffer: Mutex::new(VecDeque::new()),
            send_lock: tokio::sync::Mutex::new(()),
            flush_scheduled: AtomicBool::new(false),
            max_buffered: max_buffered.max(1),
            max_retained: max_retained.max(max_buffered.max(1)),
        });

        let timer = if tokio::runtime::Handle::try_current().is_ok() {
            Some(spawn_flush_timer(Arc::downgrade(&shared), flush_interval))
        } else {
            warn!("No tokio runtime available, remote log flush timer not started");
            None
        };

        Self {
            shared,
            timer: Mutex::new(timer),
        }
    }

    /// Entries waiting to be sent.
    pub fn buffered_len(&self) -> usize {
        self.shared.buffer.lock().len()
    }

    async fn schedule_flush(&self) {
        if self.shared.flush_scheduled.swap(true, Ordering::AcqRel) {
            return;
        }

        let shared = Arc::clone(&self.shared);
        if tokio::runtime::Handle::try_current().is_ok() {
            tokio::spawn(async move {
                shared.flush_scheduled.store(false, Ordering::Release);
                if let Err(err) = shared.flush().await {
                    warn!(error = %err, "Remote log flush failed, entries kept for retry");
                }
            });
        } else {
            shared.flush_scheduled.store(false, Ordering::Release);
            if let Err(err) = shared.flush().await {
                warn!(error = %err, "Remote log flush failed, entries kept for retry");
            }
        }
    }

    pub fn is_timer_running(&self) -> bool {
        self.timer
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

fn spawn_flush_timer(shared: Weak<RemoteShared>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;

            let Some(output) = shared.upgrade() else {
                break;
            };
            if let Err(err) = output.flush().await {
                warn!(error = %err, "Scheduled remote log flush failed, will retry");
            }
        }
    })
}

impl Drop for RemoteOutput {
    fn drop(&mut self) {
        if let Some(handle) = self.timer.get_mut().take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl LogOutput for RemoteOutput {
    fn name(&self) -> &str {
        "remote"
    }

    /// Buffers the entry. Reaching the threshold schedules a flush on the
    /// runtime; the write itself never waits on the transport.
    async fn write(&self, entry: &LogEntry) -> LogResult<()> {
        if self.shared.push(entry.clone()) {
            self.schedule_flush().await;
        }
        Ok(())
    }

    async fn flush(&self) -> LogResult<()> {
        self.shared.flush().await
    }

    /// Stops the timer, then sends whatever is buffered.
    async fn close(&self) -> LogResult<()> {
        if let Some(handle) = self.timer.lock().take() {
            handle.abort();
        }
        self.shared.flush().await
    }
}
