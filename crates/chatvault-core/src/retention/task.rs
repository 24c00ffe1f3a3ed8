//! Background prune task.
//!
//! Runs on a fixed interval (first run immediately) and deletes offline-only
//! messages that fell out of the retention window. Failures are logged and
//! the task keeps its schedule.

use std::sync::Arc;
use std::time::Duration;

use chatvault_types::chat::now_millis;
use chatvault_types::error::RepositoryError;
use chatvault_types::event::StoreEvent;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::RetentionPolicy;
use crate::event::EventBus;
use crate::repository::MessageRepository;

/// Applies a `RetentionPolicy` through a `MessageRepository`.
pub struct Pruner<M: MessageRepository> {
    repo: Arc<M>,
    policy: RetentionPolicy,
    events: Option<EventBus>,
}

impl<M: MessageRepository> Pruner<M> {
    pub fn new(repo: Arc<M>, policy: RetentionPolicy) -> Self {
        Self {
            repo,
            policy,
            events: None,
        }
    }

    /// Publish a `StoreEvent::Pruned` after every successful run.
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Prune once as of `now` (epoch millis). Returns messages deleted.
    pub async fn run_at(&self, now: i64) -> Result<u64, RepositoryError> {
        let threshold = self.policy.threshold(now);
        let deleted = self.repo.prune_offline_messages(threshold).await?;
        info!(threshold, deleted, "pruned offline messages");
        if let Some(events) = &self.events {
            events.publish(StoreEvent::Pruned { threshold, deleted });
        }
        Ok(deleted)
    }

    /// Prune once as of the current wall-clock time.
    pub async fn run_now(&self) -> Result<u64, RepositoryError> {
        self.run_at(now_millis()).await
    }
}

/// Spawn the retention prune background task.
///
/// The task ticks every `every` and stops when `cancel` fires.
#[must_use]
pub fn spawn_prune_task<M>(
    pruner: Arc<Pruner<M>>,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    M: MessageRepository + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("prune task shutting down");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(err) = pruner.run_now().await {
                        error!(%err, "offline message prune failed");
                    }
                }
            }
        }
    })
}
