//! Cancellable capture timer.
//!
//! The pipeline's two fixed delays (image stabilisation, recording window)
//! are modelled as an explicit [`CaptureTimer`] owned by the stage that
//! started it; cancelling the timer is part of the teardown sequence, so a
//! dead session never fires a stale timer.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// How a [`CaptureTimer`] wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOutcome {
    /// The full duration elapsed.
    Elapsed,
    /// The timer (or the session it belongs to) was cancelled first.
    Cancelled,
}

/// One-shot timer tied to a cancellation token.
///
/// ```rust
/// use std::time::Duration;
/// use emotion_capture::capture::{CaptureTimer, TimerOutcome};
///
/// # #[tokio::main(flavor = "current_thread", start_paused = true)]
/// # async fn main() {
/// let timer = CaptureTimer::start(Duration::from_secs(3));
/// assert_eq!(timer.wait().await, TimerOutcome::Elapsed);
/// # }
/// ```
#[derive(Debug)]
pub struct CaptureTimer {
    deadline: tokio::time::Instant,
    cancel: CancellationToken,
}

impl CaptureTimer {
    /// Start a timer for `duration`, with its own cancellation token.
    pub fn start(duration: Duration) -> Self {
        Self::start_linked(duration, CancellationToken::new())
    }

    /// Start a timer that is also cancelled whenever `parent` is — used to
    /// tie a stage timer to the session's teardown token.
    pub fn start_linked(duration: Duration, parent: CancellationToken) -> Self {
        Self {
            deadline: tokio::time::Instant::now() + duration,
            cancel: parent,
        }
    }

    /// Wait until the duration elapses or the timer is cancelled.
    ///
    /// May be awaited from multiple branches of a `select!`; each call
    /// observes the same deadline.
    pub async fn wait(&self) -> TimerOutcome {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => TimerOutcome::Cancelled,
            _ = tokio::time::sleep_until(self.deadline) => TimerOutcome::Elapsed,
        }
    }

    /// Cancel the timer; any pending or future [`wait`](Self::wait) resolves
    /// to [`TimerOutcome::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
