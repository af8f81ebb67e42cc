// Queue Waiter - lazy, finite sequence of position updates

use crate::application::cancel::CancelToken;
use crate::domain::{SessionId, WaitEvent, WaitOutcome, WaitPolicy};
use crate::error::Result;
use crate::port::QueueStore;
use futures::Stream;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Polls a session's position until it reaches the front, leaves the queue,
/// runs out of attempts, or is cancelled.
///
/// Each call to [`next_event`](Self::next_event) performs at most one poll.
/// Dropping the waiter takes no action: the session stays enqueued until the
/// caller removes it.
pub struct QueueWaiter {
    store: Arc<dyn QueueStore>,
    session: SessionId,
    policy: WaitPolicy,
    cancel: CancelToken,
    attempts: u64,
    sleep_before_next: bool,
    outcome: Option<WaitOutcome>,
}

impl QueueWaiter {
    pub fn new(
        store: Arc<dyn QueueStore>,
        session: SessionId,
        policy: WaitPolicy,
        cancel: CancelToken,
    ) -> Self {
        debug!(
            session = %session,
            max_attempts = policy.max_attempts(),
            "Starting to wait in the queue"
        );
        Self {
            store,
            session,
            policy,
            cancel,
            attempts: 0,
            sleep_before_next: false,
            outcome: None,
        }
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// Polls used so far
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Final outcome, once the wait has finished
    pub fn outcome(&self) -> Option<WaitOutcome> {
        self.outcome
    }

    /// Advance the wait by one step.
    ///
    /// Returns `Position(n)` (n >= 1) while still behind someone, then exactly one
    /// distinct `Finished(outcome)`, which is repeated on every later call.
    ///
    /// # Errors
    /// Store errors propagate unchanged. The failed poll still counts as an attempt.
    pub async fn next_event(&mut self) -> Result<WaitEvent> {
        if let Some(outcome) = self.outcome {
            return Ok(WaitEvent::Finished(outcome));
        }

        if self.sleep_before_next {
            self.sleep_before_next = false;
            let interval = self.policy.poll_interval();
            let cancelled = tokio::select! {
                _ = sleep(interval) => false,
                _ = self.cancel.cancelled() => true,
            };
            if cancelled {
                return Ok(self.finish(WaitOutcome::Cancelled));
            }
        }

        if self.cancel.is_cancelled() {
            return Ok(self.finish(WaitOutcome::Cancelled));
        }
        if self.attempts >= self.policy.max_attempts() {
            return Ok(self.finish(WaitOutcome::TimedOut));
        }
        self.attempts += 1;

        let queue = self.store.load(false).await?;
        match queue.position(&self.session) {
            Some(0) => Ok(self.finish(WaitOutcome::ReachedFront)),
            None => Ok(self.finish(WaitOutcome::Absent)),
            Some(position) => {
                debug!(session = %self.session, position, attempt = self.attempts, "Waiting in queue");
                self.sleep_before_next = true;
                Ok(WaitEvent::Position(position))
            }
        }
    }

    /// Drive the wait to completion, reporting each position to `on_position`
    pub async fn run<F>(mut self, mut on_position: F) -> Result<WaitOutcome>
    where
        F: FnMut(usize),
    {
        loop {
            match self.next_event().await? {
                WaitEvent::Position(position) => on_position(position),
                WaitEvent::Finished(outcome) => return Ok(outcome),
            }
        }
    }

    /// Stream of wait events. Ends after the `Finished` event or the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<WaitEvent>> + Send {
        futures::stream::unfold(Some(self), |state| async move {
            let mut waiter = state?;
            match waiter.next_event().await {
                Ok(event @ WaitEvent::Position(_)) => Some((Ok(event), Some(waiter))),
                Ok(event @ WaitEvent::Finished(_)) => Some((Ok(event), None)),
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    fn finish(&mut self, outcome: WaitOutcome) -> WaitEvent {
        self.outcome = Some(outcome);
        match outcome {
            WaitOutcome::TimedOut => warn!(
                session = %self.session,
                attempts = self.attempts,
                "Queue wait timed out"
            ),
            _ => info!(
                session = %self.session,
                attempts = self.attempts,
                outcome = %outcome,
                "Queue wait finished"
            ),
        }
        WaitEvent::Finished(outcome)
    }
}
