//! Read coalescing.
//!
//! HomeKit-style hosts fetch hue, saturation, brightness, and power as
//! separate characteristic reads, often all at once. Each of those maps to
//! the same 4-byte frame on the wire, so issuing four BLE reads back to back
//! is pure waste. [`ReadCoalescer`] collapses concurrent requests into a
//! single physical read: the first caller becomes the leader and performs the
//! read, every caller that arrives while it is in flight just waits for the
//! leader's result.
//!
//! The leader runs the read inside its own caller's future. If that future
//! is dropped mid-read (a host-side timeout or `select!` losing the race),
//! a guard drains the queue with a cancellation failure so parked waiters
//! resolve and the next request elects a fresh leader instead of hanging.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use superlight_types::HsvState;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{Error, Result};

/// A read failure as fanned out to coalesced waiters.
///
/// Mirrors the cloneable subset of [`Error`]; failures without a cloneable
/// payload (the adapter's own error type included) are flattened to their
/// display string.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ReadFailure {
    /// The frame came back with the wrong length.
    #[error(transparent)]
    MalformedFrame(superlight_types::ParseError),
    /// The physical read timed out.
    #[error("operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },
    /// The leading request was dropped before the read completed.
    #[error("read cancelled before completion")]
    Cancelled,
    /// Any other transport-level failure, flattened to its message.
    #[error("{0}")]
    Other(String),
}

impl From<Error> for ReadFailure {
    fn from(e: Error) -> Self {
        match e {
            Error::MalformedFrame(parse) => Self::MalformedFrame(parse),
            Error::Timeout {
                operation,
                duration,
            } => Self::Timeout {
                operation,
                duration,
            },
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<ReadFailure> for Error {
    fn from(failure: ReadFailure) -> Self {
        match failure {
            ReadFailure::MalformedFrame(parse) => Self::MalformedFrame(parse),
            ReadFailure::Timeout {
                operation,
                duration,
            } => Self::Timeout {
                operation,
                duration,
            },
            ReadFailure::Other(message) => Self::Transport(message),
            cancelled @ ReadFailure::Cancelled => Self::Transport(cancelled.to_string()),
        }
    }
}

type Outcome = std::result::Result<HsvState, ReadFailure>;

/// Collapses concurrent device reads into one physical read.
#[derive(Debug, Default)]
pub struct ReadCoalescer {
    /// Waiters enqueued since the last fan-out. The first entry belongs to
    /// the current leader. Held only for short synchronous sections, never
    /// across an await.
    pending: Mutex<Vec<oneshot::Sender<Outcome>>>,
    /// Number of physical reads performed.
    physical_reads: AtomicU64,
}

/// Drains the queue with [`ReadFailure::Cancelled`] if the leader's future
/// is dropped before it fanned the outcome out.
struct LeaderGuard<'a> {
    coalescer: &'a ReadCoalescer,
    armed: bool,
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let waiters = self.coalescer.take_waiters();
            debug!(
                waiters = waiters.len(),
                "leading read dropped, failing queued requests"
            );
            for waiter in waiters {
                let _ = waiter.send(Err(ReadFailure::Cancelled));
            }
        }
    }
}

impl ReadCoalescer {
    /// Create a new coalescer with no pending requests.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the device's current state.
    ///
    /// If no read is in flight, the caller becomes the leader: it awaits
    /// `read` and distributes the outcome to every request that queued up in
    /// the meantime. Otherwise the caller parks until the leader finishes.
    pub async fn request<F>(&self, read: F) -> Outcome
    where
        F: Future<Output = Result<HsvState>>,
    {
        let (tx, rx) = oneshot::channel();
        let leader = {
            let mut pending = self.lock_pending();
            pending.push(tx);
            pending.len() == 1
        };

        if leader {
            let mut guard = LeaderGuard {
                coalescer: self,
                armed: true,
            };
            self.physical_reads.fetch_add(1, Ordering::Relaxed);
            let outcome = read.await.map_err(ReadFailure::from);
            guard.armed = false;

            let waiters = self.take_waiters();
            debug!(waiters = waiters.len(), "read complete, fanning out");
            for waiter in waiters {
                // A waiter that gave up is fine to skip.
                let _ = waiter.send(outcome.clone());
            }
        } else {
            debug!("read already in flight, waiting for its result");
        }

        rx.await.unwrap_or(Err(ReadFailure::Cancelled))
    }

    /// Number of physical reads performed so far.
    pub fn physical_reads(&self) -> u64 {
        self.physical_reads.load(Ordering::Relaxed)
    }

    fn take_waiters(&self) -> Vec<oneshot::Sender<Outcome>> {
        std::mem::take(&mut *self.lock_pending())
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Vec<oneshot::Sender<Outcome>>> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    async fn slow_read(state: HsvState) -> Result<HsvState> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(state)
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_share_one_read() {
        let coalescer = Arc::new(ReadCoalescer::new());
        let state = HsvState::clamped(120, 100, 50);

        let mut handles = Vec::new();
        for _ in 0..3 {
            let c = Arc::clone(&coalescer);
            handles.push(tokio::spawn(
                async move { c.request(slow_read(state)).await },
            ));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), state);
        }
        assert_eq!(coalescer.physical_reads(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_fans_out_to_all_waiters() {
        let coalescer = Arc::new(ReadCoalescer::new());

        let mut handles = Vec::new();
        for _ in 0..3 {
            let c = Arc::clone(&coalescer);
            handles.push(tokio::spawn(async move {
                c.request(async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Err(Error::transport("read failed"))
                })
                .await
            }));
        }

        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert!(err.to_string().contains("read failed"));
        }
        assert_eq!(coalescer.physical_reads(), 1);
    }

    #[tokio::test]
    async fn test_sequential_requests_each_read() {
        let coalescer = ReadCoalescer::new();
        let state = HsvState::clamped(0, 0, 100);

        for _ in 0..3 {
            let got = coalescer.request(async { Ok(state) }).await.unwrap();
            assert_eq!(got, state);
        }
        assert_eq!(coalescer.physical_reads(), 3);
    }

    #[tokio::test]
    async fn test_typed_failures_survive_fan_out() {
        let coalescer = ReadCoalescer::new();

        let err = coalescer
            .request(async { Err(Error::timeout("read", Duration::from_secs(10))) })
            .await
            .unwrap_err();
        assert!(matches!(err, ReadFailure::Timeout { .. }));

        let err = coalescer
            .request(async {
                Err(superlight_types::ParseError::MalformedFrame {
                    expected: 4,
                    actual: 2,
                }
                .into())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ReadFailure::MalformedFrame(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_leader_releases_queue() {
        let coalescer = Arc::new(ReadCoalescer::new());
        let state = HsvState::clamped(200, 50, 50);

        let leader = {
            let c = Arc::clone(&coalescer);
            tokio::spawn(async move {
                c.request(async {
                    tokio::time::sleep(Duration::from_secs(600)).await;
                    Ok(state)
                })
                .await
            })
        };
        tokio::task::yield_now().await;

        let follower = {
            let c = Arc::clone(&coalescer);
            tokio::spawn(async move { c.request(async { Ok(state) }).await })
        };
        tokio::task::yield_now().await;

        // The host gives up on the leading request mid-read.
        leader.abort();
        let err = follower.await.unwrap().unwrap_err();
        assert!(matches!(err, ReadFailure::Cancelled));

        // The queue is clear: the next request elects a fresh leader. Only
        // the aborted leader and this request ever hit the wire.
        let got = coalescer.request(async { Ok(state) }).await.unwrap();
        assert_eq!(got, state);
        assert_eq!(coalescer.physical_reads(), 2);
    }
}
