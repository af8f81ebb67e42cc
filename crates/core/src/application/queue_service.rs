// Queue Service - Core use cases for waiting on the shared resource

use crate::application::cancel::CancelToken;
use crate::application::waiter::QueueWaiter;
use crate::domain::{Queue, ResetPolicy, SessionId, WaitOutcome, WaitPolicy};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, QueueStore};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of [`QueueService::run_exclusive`]
#[derive(Debug, PartialEq, Eq)]
pub enum Exclusive<T> {
    /// The job ran while this session held the front
    Ran(T),
    /// The job did not run
    Skipped(WaitOutcome),
}

/// Queue Service
pub struct QueueService {
    store: Arc<dyn QueueStore>,
    id_provider: Arc<dyn IdProvider>,
}

impl QueueService {
    pub fn new(store: Arc<dyn QueueStore>, id_provider: Arc<dyn IdProvider>) -> Self {
        Self { store, id_provider }
    }

    /// Startup hook for the hosting process. Call once before serving requests.
    pub async fn initialize(&self, policy: ResetPolicy) -> Result<Queue> {
        let queue = self.store.load(policy.force_reset()).await?;
        info!(
            location = %self.store.location(),
            reset = policy.force_reset(),
            waiting = queue.len(),
            "Queue initialized"
        );
        Ok(queue)
    }

    pub async fn load(&self, force_reset: bool) -> Result<Queue> {
        self.store.load(force_reset).await
    }

    pub async fn save(&self, queue: &Queue) -> Result<()> {
        self.store.save(queue).await
    }

    /// Mint a fresh session id
    pub fn new_session(&self) -> Result<SessionId> {
        Ok(SessionId::new(self.id_provider.generate_id())?)
    }

    /// Append `session` to the tail. Returns its position.
    ///
    /// Duplicates are not rejected.
    pub async fn enqueue(&self, session: &SessionId) -> Result<usize> {
        let appended = session.clone();
        let updated = self
            .store
            .update(Box::new(move |queue: &mut Queue| {
                queue.push(appended);
                true
            }))
            .await?;

        let position = updated.queue.len().checked_sub(1).ok_or_else(|| {
            AppError::Internal(format!("queue empty right after enqueueing {}", session))
        })?;
        info!(session = %session, position, "Session added to the queue");
        Ok(position)
    }

    pub async fn position_of(&self, session: &SessionId) -> Result<Option<usize>> {
        Ok(self.store.load(false).await?.position(session))
    }

    /// Remove the first occurrence of `session`. Returns false (and writes
    /// nothing) if it was not queued.
    pub async fn remove(&self, session: &SessionId) -> Result<bool> {
        let target = session.clone();
        let updated = self
            .store
            .update(Box::new(move |queue: &mut Queue| queue.remove(&target)))
            .await?;

        if updated.changed {
            info!(session = %session, "Session removed from the queue");
        } else {
            debug!(session = %session, "Session not in queue, nothing to remove");
        }
        Ok(updated.changed)
    }

    pub async fn front_of(&self) -> Result<Option<SessionId>> {
        Ok(self.store.load(false).await?.front().cloned())
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.store.load(false).await?.len())
    }

    pub async fn snapshot(&self) -> Result<Queue> {
        self.store.load(false).await
    }

    pub fn location(&self) -> String {
        self.store.location()
    }

    /// Lazy position sequence for `session`
    pub fn waiter(
        &self,
        session: &SessionId,
        policy: WaitPolicy,
        cancel: CancelToken,
    ) -> QueueWaiter {
        QueueWaiter::new(Arc::clone(&self.store), session.clone(), policy, cancel)
    }

    /// Wait until `session` may proceed, reporting every position on the way.
    ///
    /// The session is left in the queue whatever the outcome.
    pub async fn wait_until_front<F>(
        &self,
        session: &SessionId,
        policy: WaitPolicy,
        cancel: CancelToken,
        on_position: F,
    ) -> Result<WaitOutcome>
    where
        F: FnMut(usize),
    {
        self.waiter(session, policy, cancel).run(on_position).await
    }

    /// Enqueue, wait for the front, run `job`, and always dequeue afterwards.
    ///
    /// `job` runs only when the wait outcome allows proceeding. The session is
    /// removed on every path out of this call, including a store error while
    /// waiting and a failing job. A failing removal is logged; the wait or job
    /// error takes precedence over it.
    pub async fn run_exclusive<T, F, Fut, P>(
        &self,
        session: &SessionId,
        policy: WaitPolicy,
        cancel: CancelToken,
        on_position: P,
        job: F,
    ) -> Result<Exclusive<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
        P: FnMut(usize),
    {
        self.enqueue(session).await?;

        let result = match self.wait_until_front(session, policy, cancel, on_position).await {
            Ok(outcome) if outcome.proceed() => job().await.map(Exclusive::Ran),
            Ok(outcome) => Ok(Exclusive::Skipped(outcome)),
            Err(e) => Err(e),
        };

        match self.remove(session).await {
            Ok(_) => result,
            Err(remove_err) => {
                warn!(session = %session, error = %remove_err, "Failed to dequeue session");
                match result {
                    Ok(_) => Err(remove_err),
                    Err(e) => Err(e),
                }
            }
        }
    }
}
