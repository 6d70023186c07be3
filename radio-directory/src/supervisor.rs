//! Scan completion and timeout supervision.
//!
//! A provider must report that a full-list scan has finished within a
//! bounded time. The supervisor tracks one scan generation at a time:
//!
//! ```text
//!            complete chunk
//! Scanning ─────────────────▶ Complete
//!    │
//!    │ deadline expires
//!    ▼
//!  Failed
//! ```
//!
//! A purge starts a new generation: the state returns to `Scanning` and the
//! deadline is re-armed. Exactly one timer task exists per generation; it is
//! aborted when the generation ends or is replaced. A complete chunk that
//! arrives once a generation has failed is ignored.
//!
//! Outside a tokio runtime no timer task is spawned. Expiry is then detected,
//! and `TimedOut` sent, only when the status is read or a completion arrives.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Capacity of the scan event channel.
const EVENT_CAPACITY: usize = 16;

/// State of the current scan generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    /// Scan in progress, deadline armed.
    Scanning,
    /// Provider reported completion in time.
    Complete,
    /// Deadline expired without completion. The list may be stale.
    Failed,
}

/// Snapshot of the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanStatus {
    pub state: ScanState,
    pub generation: u64,
}

/// Scan state transitions, as delivered to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEvent {
    /// A new generation started scanning.
    Started { generation: u64 },
    /// The generation completed.
    Completed { generation: u64 },
    /// The generation missed its deadline.
    TimedOut { generation: u64 },
}

struct Inner {
    state: ScanState,
    generation: u64,
    deadline: Option<Instant>,
    timer: Option<JoinHandle<()>>,
}

struct Shared {
    inner: Mutex<Inner>,
    events: broadcast::Sender<ScanEvent>,
}

impl Shared {
    /// Move `generation` to `Failed` if it is still scanning.
    fn expire(&self, generation: u64) {
        let mut inner = self.inner.lock();
        self.expire_locked(&mut inner, generation);
    }

    fn expire_locked(&self, inner: &mut Inner, generation: u64) {
        if inner.generation != generation || inner.state != ScanState::Scanning {
            return;
        }
        inner.state = ScanState::Failed;
        inner.deadline = None;
        inner.timer = None;
        warn!(
            "[ScanSupervisor] Scan generation {} did not complete in time; program list may be stale",
            generation
        );
        let _ = self.events.send(ScanEvent::TimedOut { generation });
    }
}

/// Tracks whether the current scan completes within its deadline.
pub struct ScanSupervisor {
    timeout: Duration,
    shared: Arc<Shared>,
}

impl ScanSupervisor {
    /// Create an idle supervisor. Call [`ScanSupervisor::start`] to arm it.
    pub fn new(timeout: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            timeout,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: ScanState::Scanning,
                    generation: 0,
                    deadline: None,
                    timer: None,
                }),
                events,
            }),
        }
    }

    /// Configured completion bound.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Begin a new scan generation with a fresh deadline.
    pub fn start(&self) {
        let mut inner = self.shared.inner.lock();
        inner.generation += 1;
        inner.state = ScanState::Scanning;
        self.arm(&mut inner);
        debug!(
            "[ScanSupervisor] Generation {} scanning (timeout {:?})",
            inner.generation, self.timeout
        );
        let _ = self.shared.events.send(ScanEvent::Started {
            generation: inner.generation,
        });
    }

    /// A purge chunk was folded: reset to `Scanning` with a fresh deadline.
    pub fn on_purge(&self) {
        self.start();
    }

    /// A complete chunk was folded.
    ///
    /// Returns `false` when the current generation already timed out; the
    /// completion is ignored and the list stays stale until the next purge.
    pub fn on_complete(&self) -> bool {
        let mut inner = self.shared.inner.lock();
        self.check_deadline(&mut inner);
        match inner.state {
            ScanState::Scanning => {
                inner.state = ScanState::Complete;
                inner.deadline = None;
                if let Some(timer) = inner.timer.take() {
                    timer.abort();
                }
                info!("[ScanSupervisor] Scan generation {} complete", inner.generation);
                let _ = self.shared.events.send(ScanEvent::Completed {
                    generation: inner.generation,
                });
                true
            }
            ScanState::Complete => true,
            ScanState::Failed => {
                warn!(
                    "[ScanSupervisor] Completion for generation {} arrived after its deadline",
                    inner.generation
                );
                false
            }
        }
    }

    /// Current state. An expired deadline is applied before returning.
    pub fn status(&self) -> ScanStatus {
        let mut inner = self.shared.inner.lock();
        self.check_deadline(&mut inner);
        ScanStatus {
            state: inner.state,
            generation: inner.generation,
        }
    }

    /// Subscribe to state transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.shared.events.subscribe()
    }

    /// Cancel the pending deadline without changing the state.
    pub fn stop(&self) {
        let mut inner = self.shared.inner.lock();
        inner.deadline = None;
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
    }

    fn arm(&self, inner: &mut Inner) {
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }

        let deadline = Instant::now() + self.timeout;
        inner.deadline = Some(deadline);

        // Without a runtime the deadline is only checked on access.
        match Handle::try_current() {
            Ok(handle) => {
                let shared = Arc::clone(&self.shared);
                let generation = inner.generation;
                inner.timer = Some(handle.spawn(async move {
                    tokio::time::sleep_until(deadline).await;
                    shared.expire(generation);
                }));
            }
            Err(_) => {
                debug!("[ScanSupervisor] No runtime; deadline will be checked lazily");
            }
        }
    }

    fn check_deadline(&self, inner: &mut Inner) {
        if let Some(deadline) = inner.deadline {
            if Instant::now() >= deadline {
                let generation = inner.generation;
                self.shared.expire_locked(inner, generation);
            }
        }
    }
}

impl Drop for ScanSupervisor {
    fn drop(&mut self) {
        if let Some(timer) = self.shared.inner.lock().timer.take() {
            timer.abort();
        }
    }
}

impl std::fmt::Debug for ScanSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanSupervisor")
            .field("timeout", &self.timeout)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[tokio::test(start_paused = true)]
    async fn test_complete_before_deadline() {
        let supervisor = ScanSupervisor::new(Duration::from_secs(30));
        let mut events = supervisor.subscribe();

        supervisor.start();
        assert_eq!(events.recv().await.unwrap(), ScanEvent::Started { generation: 1 });

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(supervisor.on_complete());
        assert_eq!(events.recv().await.unwrap(), ScanEvent::Completed { generation: 1 });

        // The cancelled deadline never fires
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(supervisor.status().state, ScanState::Complete);
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fires_exactly_once() {
        let supervisor = ScanSupervisor::new(Duration::from_secs(30));
        let mut events = supervisor.subscribe();
        supervisor.start();
        let _ = events.recv().await;

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(supervisor.status().state, ScanState::Failed);
        assert_eq!(events.recv().await.unwrap(), ScanEvent::TimedOut { generation: 1 });

        tokio::time::sleep(Duration::from_secs(120)).await;
        let _ = supervisor.status();
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_completion_keeps_failed() {
        let supervisor = ScanSupervisor::new(Duration::from_secs(5));
        supervisor.start();
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert!(!supervisor.on_complete());
        assert_eq!(supervisor.status().state, ScanState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_resets_to_scanning() {
        let supervisor = ScanSupervisor::new(Duration::from_secs(5));
        supervisor.start();
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(supervisor.status().state, ScanState::Failed);

        supervisor.on_purge();
        let status = supervisor.status();
        assert_eq!(status.state, ScanState::Scanning);
        assert_eq!(status.generation, 2);

        // Fresh deadline for the new generation
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(supervisor.status().state, ScanState::Scanning);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(supervisor.status().state, ScanState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_does_not_stack_timers() {
        let supervisor = ScanSupervisor::new(Duration::from_secs(10));
        let mut events = supervisor.subscribe();

        supervisor.start();
        tokio::time::sleep(Duration::from_secs(8)).await;
        supervisor.on_purge();
        tokio::time::sleep(Duration::from_secs(8)).await;

        // First generation's timer was aborted; second has 2s left
        assert_eq!(supervisor.status().state, ScanState::Scanning);
        tokio::time::sleep(Duration::from_secs(3)).await;

        let mut timeouts = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let ScanEvent::TimedOut { generation } = event {
                timeouts.push(generation);
            }
        }
        assert_eq!(timeouts, vec![2]);
    }

    #[test]
    fn test_lazy_deadline_without_runtime() {
        let supervisor = ScanSupervisor::new(Duration::ZERO);
        supervisor.start();
        assert_eq!(supervisor.status().state, ScanState::Failed);
    }

    #[test]
    fn test_lazy_deadline_reports_timeout_when_polled() {
        let supervisor = ScanSupervisor::new(Duration::ZERO);
        let mut events = supervisor.subscribe();
        supervisor.start();
        assert_eq!(events.try_recv().unwrap(), ScanEvent::Started { generation: 1 });

        // Nothing fires on its own without a runtime
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));

        let _ = supervisor.status();
        assert_eq!(events.try_recv().unwrap(), ScanEvent::TimedOut { generation: 1 });
        assert!(!supervisor.on_complete());
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }
}
