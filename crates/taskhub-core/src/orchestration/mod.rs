pub mod events;
pub mod settings;
mod status;
mod worker;

pub use events::{SyncEvent, reauthenticate_message};
pub use settings::{
    DEFAULT_EVENT_CAPACITY, DEFAULT_FETCH_TIMEOUT, DEFAULT_TRIGGER_CAPACITY, PollerSettings,
};

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::models::{CoreError, SourceConfig, SyncStatus};
use crate::persistence::{NotificationStore, SourceStore, TaskStore};
use crate::source::Source;
use status::StatusBoard;
use worker::SyncWorker;

pub type OrchestrationResult<T> = Result<T, CoreError>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Lifecycle {
    Idle,
    Running,
    Stopped,
}

struct Registration {
    adapter: Arc<dyn Source>,
    config: SourceConfig,
    trigger: mpsc::Sender<()>,
    /// Held until the worker is spawned.
    pending_triggers: Option<mpsc::Receiver<()>>,
}

struct PollerState {
    lifecycle: Lifecycle,
    registrations: Vec<Registration>,
    workers: Vec<JoinHandle<()>>,
    /// Runtime captured by `start`; workers are spawned onto it.
    runtime: Option<Handle>,
}

/// Background synchronization engine.
///
/// Each enabled source gets one tokio task that fetches immediately, then on
/// its own interval or on a manual refresh. Results land in the stores and
/// are announced as [`SyncEvent`]s. A failing source never affects another.
///
/// A poller runs once: after [`Poller::stop`] a new instance is needed.
pub struct Poller {
    settings: PollerSettings,
    task_store: Arc<dyn TaskStore>,
    notification_store: Arc<dyn NotificationStore>,
    source_store: Option<Arc<dyn SourceStore>>,
    statuses: StatusBoard,
    state: Mutex<PollerState>,
    events_tx: mpsc::Sender<SyncEvent>,
    events_rx: tokio::sync::Mutex<mpsc::Receiver<SyncEvent>>,
    stop_tx: watch::Sender<bool>,
}

impl Poller {
    pub fn new(
        task_store: Arc<dyn TaskStore>,
        notification_store: Arc<dyn NotificationStore>,
        settings: PollerSettings,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(settings.event_capacity.max(1));
        let (stop_tx, _) = watch::channel(false);

        Self {
            settings,
            task_store,
            notification_store,
            source_store: None,
            statuses: StatusBoard::default(),
            state: Mutex::new(PollerState {
                lifecycle: Lifecycle::Idle,
                registrations: Vec::new(),
                workers: Vec::new(),
                runtime: None,
            }),
            events_tx,
            events_rx: tokio::sync::Mutex::new(events_rx),
            stop_tx,
        }
    }

    /// Wires every store role to one backing store, recording sync outcomes
    /// on the source rows as well.
    pub fn with_store<S>(store: Arc<S>, settings: PollerSettings) -> Self
    where
        S: TaskStore + NotificationStore + SourceStore + 'static,
    {
        Self::new(store.clone(), store.clone(), settings).with_source_store(store)
    }

    pub fn with_source_store(mut self, source_store: Arc<dyn SourceStore>) -> Self {
        self.source_store = Some(source_store);
        self
    }

    pub fn settings(&self) -> &PollerSettings {
        &self.settings
    }

    /// Adds a source. Disabled configs are tracked but never polled. When the
    /// poller is already running the new source starts syncing immediately on
    /// the runtime `start` was called from, so this may be called from any
    /// thread.
    pub fn register(
        &self,
        adapter: Arc<dyn Source>,
        config: SourceConfig,
    ) -> OrchestrationResult<()> {
        let mut state = self.lock_state()?;
        if state.lifecycle == Lifecycle::Stopped {
            return Err(stopped_error("register"));
        }
        if adapter.source_type() != config.source_type {
            return Err(CoreError::invalid_input(format!(
                "adapter for '{}' cannot serve source '{}' of type '{}'",
                adapter.source_type(),
                config.id,
                config.source_type
            ))
            .for_source(config.source_type));
        }
        if state
            .registrations
            .iter()
            .any(|registration| registration.config.id == config.id)
        {
            return Err(CoreError::invalid_input(format!(
                "duplicate registration for source '{}'",
                config.id
            ))
            .for_source(config.source_type));
        }

        self.statuses
            .insert(SyncStatus::idle(config.id.clone(), config.source_type));
        let (trigger, triggers) = mpsc::channel(self.settings.trigger_capacity.max(1));
        let mut registration = Registration {
            adapter,
            config,
            trigger,
            pending_triggers: Some(triggers),
        };

        if state.lifecycle == Lifecycle::Running
            && let Some(runtime) = state.runtime.clone()
            && let Some(handle) = self.spawn_worker(&runtime, &mut registration)
        {
            state.workers.push(handle);
        }
        state.registrations.push(registration);
        Ok(())
    }

    /// Spawns the workers onto the current tokio runtime; outside a runtime
    /// this fails with `InvalidInput`. Calling it again while running is a
    /// no-op.
    pub fn start(&self) -> OrchestrationResult<()> {
        let mut state = self.lock_state()?;
        match state.lifecycle {
            Lifecycle::Stopped => return Err(stopped_error("start")),
            Lifecycle::Running => return Ok(()),
            Lifecycle::Idle => {}
        }
        let runtime = Handle::try_current().map_err(|_| {
            CoreError::invalid_input("poller must be started from within a tokio runtime")
                .during("start")
        })?;

        state.lifecycle = Lifecycle::Running;
        state.runtime = Some(runtime.clone());
        let PollerState {
            registrations,
            workers,
            ..
        } = &mut *state;
        for registration in registrations.iter_mut() {
            if let Some(handle) = self.spawn_worker(&runtime, registration) {
                workers.push(handle);
            }
        }

        tracing::info!(sources = workers.len(), "sync poller started");
        Ok(())
    }

    /// Signals every worker to stop before its next cycle. In-flight cycles
    /// run to completion.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
        if let Ok(mut state) = self.state.lock() {
            state.lifecycle = Lifecycle::Stopped;
            state.runtime = None;
        }
        tracing::info!("sync poller stopped");
    }

    /// Stops the poller and waits for every worker task to exit.
    pub async fn shutdown(&self) {
        self.stop();
        let workers = match self.state.lock() {
            Ok(mut state) => std::mem::take(&mut state.workers),
            Err(_) => Vec::new(),
        };
        for worker in workers {
            if let Err(error) = worker.await {
                tracing::warn!(error = %error, "sync worker ended abnormally");
            }
        }
    }

    /// Requests an out-of-schedule sync without waiting. Returns `false` when
    /// the request was dropped because one is already queued, or the source
    /// is disabled or no longer polled.
    pub fn refresh(&self, source_id: &str) -> OrchestrationResult<bool> {
        let state = self.lock_state()?;
        let registration = state
            .registrations
            .iter()
            .find(|registration| registration.config.id == source_id)
            .ok_or_else(|| {
                CoreError::invalid_input(format!("no source is registered with id '{source_id}'"))
            })?;

        Ok(request_refresh(registration))
    }

    /// Requests a sync of every registered source; returns how many requests
    /// were queued.
    pub fn refresh_all(&self) -> OrchestrationResult<usize> {
        let state = self.lock_state()?;
        Ok(state
            .registrations
            .iter()
            .filter(|registration| request_refresh(registration))
            .count())
    }

    pub fn status(&self, source_id: &str) -> Option<SyncStatus> {
        self.statuses.get(source_id)
    }

    /// Status of every registered source, ordered by source id.
    pub fn statuses(&self) -> Vec<SyncStatus> {
        self.statuses.snapshot()
    }

    /// Waits for the next event.
    pub async fn next_event(&self) -> Option<SyncEvent> {
        self.events_rx.lock().await.recv().await
    }

    pub fn try_next_event(&self) -> Option<SyncEvent> {
        self.events_rx.try_lock().ok()?.try_recv().ok()
    }

    fn spawn_worker(
        &self,
        runtime: &Handle,
        registration: &mut Registration,
    ) -> Option<JoinHandle<()>> {
        if !registration.config.enabled {
            tracing::debug!(source_id = %registration.config.id, "skipping disabled source");
            return None;
        }
        let triggers = registration.pending_triggers.take()?;

        let worker = SyncWorker {
            adapter: registration.adapter.clone(),
            config: registration.config.clone(),
            settings: self.settings.clone(),
            task_store: self.task_store.clone(),
            notification_store: self.notification_store.clone(),
            source_store: self.source_store.clone(),
            statuses: self.statuses.clone(),
            events: self.events_tx.clone(),
        };
        let stop = self.stop_tx.subscribe();
        Some(runtime.spawn(worker.run(triggers, stop)))
    }

    fn lock_state(&self) -> OrchestrationResult<MutexGuard<'_, PollerState>> {
        self.state
            .lock()
            .map_err(|_| CoreError::internal("poller state mutex poisoned"))
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop_tx.send_replace(true);
    }
}

fn request_refresh(registration: &Registration) -> bool {
    if !registration.config.enabled {
        return false;
    }
    match registration.trigger.try_send(()) {
        Ok(()) => true,
        Err(TrySendError::Full(())) => {
            tracing::debug!(
                source_id = %registration.config.id,
                "refresh already queued; dropping request"
            );
            false
        }
        Err(TrySendError::Closed(())) => false,
    }
}

fn stopped_error(operation: &'static str) -> CoreError {
    CoreError::invalid_input("poller has been stopped; create a new poller instead")
        .during(operation)
}
