use std::collections::HashSet;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};

use crate::models::{CoreError, CoreErrorKind, Notification, SourceConfig, SourceType, Task};
use crate::orchestration::events::reauthenticate_message;
use crate::orchestration::status::StatusBoard;
use crate::orchestration::{OrchestrationResult, PollerSettings, SyncEvent};
use crate::persistence::{NotificationStore, SourceStore, TaskStore};
use crate::source::{FetchOptions, Source};

/// Everything one source's worker needs; owned by its tokio task.
pub(crate) struct SyncWorker {
    pub(crate) adapter: Arc<dyn Source>,
    pub(crate) config: SourceConfig,
    pub(crate) settings: PollerSettings,
    pub(crate) task_store: Arc<dyn TaskStore>,
    pub(crate) notification_store: Arc<dyn NotificationStore>,
    pub(crate) source_store: Option<Arc<dyn SourceStore>>,
    pub(crate) statuses: StatusBoard,
    pub(crate) events: mpsc::Sender<SyncEvent>,
}

struct CycleOutcome {
    tasks: Vec<Task>,
    new_task_count: usize,
}

impl SyncWorker {
    /// Syncs once immediately, then on every tick or manual trigger until the
    /// stop signal fires. Cycles never overlap: a trigger that arrives during
    /// a cycle waits in the queue and runs right after it.
    pub(crate) async fn run(
        self,
        mut triggers: mpsc::Receiver<()>,
        mut stop: watch::Receiver<bool>,
    ) {
        if *stop.borrow() {
            return;
        }

        self.sync_once().await;

        let period = self.settings.poll_interval_for(&self.config);
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                    continue;
                }
                trigger = triggers.recv() => {
                    if trigger.is_none() {
                        break;
                    }
                    tracing::debug!(source_id = %self.config.id, "manual refresh");
                }
                _ = ticker.tick() => {}
            }

            if *stop.borrow() {
                break;
            }
            self.sync_once().await;
        }

        tracing::debug!(source_id = %self.config.id, "sync worker stopped");
    }

    async fn sync_once(&self) {
        let source_id = self.config.id.as_str();
        let source_type = self.config.source_type;
        self.statuses.update(source_id, |status| status.running());
        tracing::debug!(source_id, source_type = %source_type, "sync cycle started");

        match self.fetch_and_store().await {
            Ok(outcome) => {
                let synced_at = SystemTime::now();
                self.statuses
                    .update(source_id, |status| status.succeeded(synced_at));
                self.record_outcome(Some(synced_at), None).await;

                tracing::debug!(
                    source_id,
                    fetched = outcome.tasks.len(),
                    new = outcome.new_task_count,
                    "sync cycle finished"
                );
                self.emit(SyncEvent::Synced {
                    source_id: source_id.to_string(),
                    source_type,
                    tasks: outcome.tasks,
                    new_task_count: outcome.new_task_count,
                });
            }
            Err(error) => {
                self.statuses
                    .update(source_id, |status| status.failed(error.message.clone()));
                self.record_outcome(None, Some(&error.message)).await;

                tracing::warn!(
                    source_id,
                    source_type = %source_type,
                    kind = ?error.kind,
                    message = %error.message,
                    "sync cycle failed"
                );
                let event = if error.is_auth() {
                    SyncEvent::AuthRequired {
                        source_id: source_id.to_string(),
                        source_type,
                        message: reauthenticate_message(
                            source_type,
                            &self.config.name,
                            &error.message,
                        ),
                    }
                } else {
                    SyncEvent::Failed {
                        source_id: source_id.to_string(),
                        source_type,
                        error,
                    }
                };
                self.emit(event);
            }
        }
    }

    async fn fetch_and_store(&self) -> OrchestrationResult<CycleOutcome> {
        let source_type = self.config.source_type;
        let options = FetchOptions::new(1, self.settings.fetch_page_size);

        let fetched = timeout(self.settings.fetch_timeout, self.adapter.fetch_items(options))
            .await
            .map_err(|_| {
                CoreError::new(
                    CoreErrorKind::Timeout,
                    format!(
                        "fetch did not complete within {}s",
                        self.settings.fetch_timeout.as_secs_f64()
                    ),
                )
                .for_source(source_type)
                .during("fetch_items")
            })?
            .map_err(|error| error.for_source(source_type).during("fetch_items"))?;
        let tasks = fetched.items;

        let ids = tasks.iter().map(|task| task.id.clone()).collect::<Vec<_>>();
        let task_store = self.task_store.clone();
        let known = run_blocking(source_type, "known_task_ids", move || {
            task_store.known_task_ids(&ids)
        })
        .await?;

        let new_tasks = {
            let mut seen = HashSet::new();
            tasks
                .iter()
                .filter(|task| !known.contains(&task.id) && seen.insert(task.id.as_str()))
                .map(|task| notification_for(source_type, task))
                .collect::<Vec<_>>()
        };
        let new_task_count = new_tasks.len();

        let task_store = self.task_store.clone();
        let batch = tasks.clone();
        run_blocking(source_type, "upsert_tasks", move || {
            task_store.upsert_tasks(&batch)
        })
        .await?;

        if !new_tasks.is_empty() {
            self.notify(new_tasks).await;
        }

        Ok(CycleOutcome {
            tasks,
            new_task_count,
        })
    }

    /// Writes one notification per new task. Failures are logged and skipped.
    async fn notify(&self, notifications: Vec<Notification>) {
        let store = self.notification_store.clone();
        let source_id = self.config.id.clone();
        let written = tokio::task::spawn_blocking(move || {
            let mut written = 0usize;
            for notification in &notifications {
                match store.create_notification(notification) {
                    Ok(()) => written += 1,
                    Err(error) => tracing::warn!(
                        source_id = %source_id,
                        task_id = %notification.task_id,
                        message = %error.message,
                        "failed to create notification"
                    ),
                }
            }
            written
        })
        .await;

        match written {
            Ok(count) => {
                tracing::debug!(source_id = %self.config.id, count, "created notifications")
            }
            Err(join_error) => tracing::warn!(
                source_id = %self.config.id,
                error = %join_error,
                "notification writer did not finish"
            ),
        }
    }

    async fn record_outcome(&self, synced_at: Option<SystemTime>, error: Option<&str>) {
        let Some(store) = self.source_store.clone() else {
            return;
        };
        let source_id = self.config.id.clone();
        let error = error.map(str::to_string);
        let result = run_blocking(self.config.source_type, "record_sync_outcome", move || {
            store.record_sync_outcome(&source_id, synced_at, error.as_deref())
        })
        .await;

        if let Err(error) = result {
            tracing::warn!(
                source_id = %self.config.id,
                message = %error.message,
                "failed to record sync outcome"
            );
        }
    }

    fn emit(&self, event: SyncEvent) {
        if let Err(error) = self.events.try_send(event) {
            tracing::debug!(
                source_id = %self.config.id,
                reason = %error,
                "dropping sync event"
            );
        }
    }
}

fn notification_for(source_type: SourceType, task: &Task) -> Notification {
    Notification::new(
        task.id.clone(),
        source_type,
        format!("New {} item: {}", source_type.display_name(), task.title),
    )
}

async fn run_blocking<T: Send + 'static>(
    source_type: SourceType,
    operation: &'static str,
    work: impl FnOnce() -> OrchestrationResult<T> + Send + 'static,
) -> OrchestrationResult<T> {
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|join_error| {
            CoreError::internal(format!("{operation} join failure: {join_error}"))
        })?
        .map_err(|error| error.for_source(source_type).during(operation))
}
