//! Finality readiness: block until the source chain head reaches a height.

use std::future::Future;
use std::time::Duration;

use relay_source::{SourceChainReader, SourceError};
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use crate::error::{RelayError, Result};

/// Default delay between head height polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(20);

/// Receiver side of a cancellation flag. `true` means cancel.
pub type CancelSignal = watch::Receiver<bool>;

/// A signal that is never raised.
pub fn never_cancelled() -> CancelSignal {
    watch::channel(false).1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub interval: Duration,
    /// Upper bound on the whole wait; `None` waits indefinitely.
    pub deadline: Option<Duration>,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            deadline: None,
        }
    }
}

/// Head observed once the target was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyHead {
    pub height: u64,
    /// Number of poll intervals slept before the head was ready.
    pub ticks: u32,
}

/// Poll the head height until it is at least `target`.
///
/// Transient read failures count as "not ready yet". Any other reader
/// error ends the wait.
pub async fn wait_for_height(
    reader: &dyn SourceChainReader,
    target: u64,
    policy: &WaitPolicy,
    cancel: &mut CancelSignal,
) -> Result<ReadyHead> {
    let started = Instant::now();
    let mut ticks = 0u32;
    let mut last_seen = None;

    loop {
        if *cancel.borrow() {
            return Err(RelayError::Cancelled { target });
        }

        match read_or_cancel(reader, cancel, target).await? {
            Ok(height) if height >= target => {
                info!(height, target, ticks, "source chain reached target height");
                return Ok(ReadyHead { height, ticks });
            }
            Ok(height) => {
                last_seen = Some(height);
                info!(height, target, "waiting for target block to be produced");
            }
            Err(err) if err.is_transient() => {
                warn!(error = %err, target, "head height unavailable, retrying");
            }
            Err(err) => return Err(RelayError::Source(err)),
        }

        if let Some(deadline) = policy.deadline {
            if started.elapsed() + policy.interval > deadline {
                return Err(RelayError::DeadlineExceeded { target, last_seen });
            }
        }

        sleep_or_cancel(policy.interval, cancel, target).await?;
        ticks += 1;
    }
}

async fn read_or_cancel(
    reader: &dyn SourceChainReader,
    cancel: &mut CancelSignal,
    target: u64,
) -> Result<std::result::Result<u64, SourceError>> {
    until_cancelled(reader.head_height(), cancel, target).await
}

async fn sleep_or_cancel(interval: Duration, cancel: &mut CancelSignal, target: u64) -> Result<()> {
    until_cancelled(sleep(interval), cancel, target).await
}

/// Drive `work` to completion unless the cancel flag is raised first.
async fn until_cancelled<F: Future>(
    work: F,
    cancel: &mut CancelSignal,
    target: u64,
) -> Result<F::Output> {
    tokio::pin!(work);
    loop {
        tokio::select! {
            output = &mut work => return Ok(output),
            changed = cancel.changed() => {
                if changed.is_err() {
                    // sender dropped: cancellation can no longer happen
                    return Ok(work.as_mut().await);
                }
                if *cancel.borrow_and_update() {
                    return Err(RelayError::Cancelled { target });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSource;
    use relay_source::SourceError;

    const H: u64 = 1_000;

    fn policy() -> WaitPolicy {
        WaitPolicy {
            interval: Duration::from_secs(20),
            deadline: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn returns_after_three_ticks() {
        let source = MockSource::with_heads([H - 2, H - 2, H - 1, H, H + 1]);
        let started = Instant::now();
        let ready = wait_for_height(&source, H, &policy(), &mut never_cancelled())
            .await
            .unwrap();
        assert_eq!(ready, ReadyHead { height: H, ticks: 3 });
        assert_eq!(source.head_reads(), 4);
        assert_eq!(started.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn already_at_height_returns_immediately() {
        let source = MockSource::with_heads([H + 5]);
        let ready = wait_for_height(&source, H, &policy(), &mut never_cancelled())
            .await
            .unwrap();
        assert_eq!(ready, ReadyHead { height: H + 5, ticks: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_count_as_not_ready() {
        let source = MockSource::with_head_results(vec![
            Err(SourceError::Transient("timeout".into())),
            Ok(H - 1),
            Err(SourceError::Transient("reset".into())),
            Ok(H),
        ]);
        let ready = wait_for_height(&source, H, &policy(), &mut never_cancelled())
            .await
            .unwrap();
        assert_eq!(ready.ticks, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_transient_error_aborts() {
        let source = MockSource::with_head_results(vec![
            Ok(H - 1),
            Err(SourceError::Malformed("bad block number".into())),
        ]);
        let err = wait_for_height(&source, H, &policy(), &mut never_cancelled())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Source(SourceError::Malformed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_sleep() {
        let source = MockSource::with_heads([H - 1]);
        let (tx, mut rx) = watch::channel(false);
        tokio::spawn(async move {
            sleep(Duration::from_secs(30)).await;
            let _ = tx.send(true);
        });
        let started = Instant::now();
        let err = wait_for_height(&source, H, &policy(), &mut rx)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Cancelled { target: H }));
        assert_eq!(started.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_a_stalled_read() {
        let source = MockSource::with_heads([H]);
        source.stall_head_reads();
        let (tx, mut rx) = watch::channel(false);
        tokio::spawn(async move {
            sleep(Duration::from_secs(5)).await;
            let _ = tx.send(true);
        });
        let started = Instant::now();
        let err = wait_for_height(&source, H, &policy(), &mut rx)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Cancelled { target: H }));
        assert_eq!(started.elapsed(), Duration::from_secs(5));
        assert_eq!(source.head_reads(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_bounds_the_wait() {
        let source = MockSource::with_heads([H - 1]);
        let policy = WaitPolicy {
            interval: Duration::from_secs(20),
            deadline: Some(Duration::from_secs(50)),
        };
        let err = wait_for_height(&source, H, &policy, &mut never_cancelled())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RelayError::DeadlineExceeded {
                target: H,
                last_seen: Some(h)
            } if h == H - 1
        ));
        assert_eq!(source.head_reads(), 3);
    }
}
