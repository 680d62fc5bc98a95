//! Background update listener.
//!
//! Keeps the local cache consistent with the store. In streaming mode it
//! subscribes to change events and resyncs after every (re)connect; while the
//! stream is down it polls and backs off before reconnecting. In polling mode
//! it only polls.
//!
//! ```text
//! Disconnected -> Connecting -> Streaming --(stream error)--> Disconnected
//!                    ^                                            |
//!                    +----------- Polling (backoff window) <------+
//! ```

use flagstore_cache::FlagCache;
use flagstore_store::{ChangeEvent, FlagStore, StoreResult};
use futures::StreamExt;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::config::UpdateMode;

const REFRESH_QUEUE: usize = 1024;

/// Connection state of the update listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListenerState {
    Disconnected,
    Connecting,
    Streaming,
    Polling,
}

impl ListenerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
            Self::Polling => "polling",
        }
    }
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Listener settings.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub mode: UpdateMode,
    pub poll_interval: Duration,
    pub backoff: Backoff,
}

/// Keys queued for refresh and not yet fetched.
type Pending = Arc<Mutex<HashSet<String>>>;

/// Resolves once `cancel` is set or its sender is gone.
async fn stopped(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|stop| *stop).await;
}

struct Worker {
    store: Arc<dyn FlagStore>,
    cache: Arc<FlagCache>,
    config: ListenerConfig,
    state: watch::Sender<ListenerState>,
    ready: watch::Sender<bool>,
    refresh_rx: mpsc::Receiver<String>,
    pending: Pending,
    cancel: watch::Receiver<bool>,
    warned_uninitialized: bool,
}

impl Worker {
    async fn run(mut self) {
        info!(mode = %self.config.mode, store = self.store.name(), "Update listener started");
        match self.config.mode {
            UpdateMode::Polling => {
                self.set_state(ListenerState::Polling);
                self.poll_until(None).await;
            }
            UpdateMode::Streaming => self.run_streaming().await,
        }
        self.set_state(ListenerState::Disconnected);
        info!("Update listener stopped");
    }

    fn set_state(&self, state: ListenerState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "Listener state changed");
        }
    }

    async fn run_streaming(&mut self) {
        let mut attempt = 0u32;

        loop {
            self.set_state(ListenerState::Connecting);
            let subscribed = tokio::select! {
                _ = stopped(&mut self.cancel) => return,
                result = self.store.subscribe() => result,
            };

            match subscribed {
                Ok(mut changes) => match self.resync().await {
                    Ok(()) => {
                        attempt = 0;
                        self.set_state(ListenerState::Streaming);
                        info!("Streaming flag updates");

                        loop {
                            tokio::select! {
                                _ = stopped(&mut self.cancel) => return,
                                event = changes.next() => match event {
                                    Some(event) => {
                                        if let Err(e) = self.apply_change(event).await {
                                            warn!(error = %e, "Failed to apply flag change; reconnecting");
                                            break;
                                        }
                                    }
                                    None => {
                                        warn!("Flag change stream ended");
                                        break;
                                    }
                                },
                                Some(key) = self.refresh_rx.recv() => self.refresh(&key).await,
                            }
                        }
                    }
                    Err(e) => warn!(error = %e, "Resync after connect failed"),
                },
                Err(e) => warn!(error = %e, "Failed to subscribe to flag changes"),
            }

            self.set_state(ListenerState::Disconnected);
            let delay = self.config.backoff.delay_for_attempt(attempt);
            attempt = attempt.saturating_add(1);
            debug!(delay_ms = delay.as_millis() as u64, attempt, "Polling before reconnect");

            self.set_state(ListenerState::Polling);
            if !self.poll_until(Some(Instant::now() + delay)).await {
                return;
            }
        }
    }

    /// Poll every interval until `deadline` (forever if `None`). Returns
    /// false if the listener was stopped.
    async fn poll_until(&mut self, deadline: Option<Instant>) -> bool {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let until = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(until);

        loop {
            tokio::select! {
                _ = stopped(&mut self.cancel) => return false,
                _ = &mut until => return true,
                _ = ticker.tick() => {
                    if let Err(e) = self.resync().await {
                        warn!(error = %e, "Flag poll failed; serving cached flags");
                    }
                }
                Some(key) = self.refresh_rx.recv() => self.refresh(&key).await,
            }
        }
    }

    /// Load every flag into the cache and drop cached flags the store no
    /// longer has.
    async fn resync(&mut self) -> StoreResult<()> {
        let all = self.store.get_all().await?;

        let mut applied = 0usize;
        for definition in all.values() {
            if self.cache.put(definition.clone()).is_applied() {
                applied += 1;
            }
        }

        let present: HashSet<&str> = all.keys().map(String::as_str).collect();
        let mut removed = 0usize;
        for key in self.cache.snapshot().keys() {
            if !present.contains(key.as_str()) && self.cache.invalidate(key) {
                removed += 1;
            }
        }

        if !self.warned_uninitialized && !self.store.is_initialized().await.unwrap_or(true) {
            warn!("Flag store has not been initialized; flags may be missing");
            self.warned_uninitialized = true;
        }

        debug!(flags = all.len(), applied, removed, "Resynced flags");
        if !*self.ready.borrow() {
            info!(flags = all.len(), "Initial flag load complete");
            self.ready.send_replace(true);
        }
        Ok(())
    }

    async fn apply_change(&self, event: ChangeEvent) -> StoreResult<()> {
        if self.cache.high_water(&event.key).is_some_and(|v| v >= event.version) {
            debug!(flag_key = %event.key, version = event.version, "Change already applied");
            return Ok(());
        }
        self.fetch(&event.key).await
    }

    async fn refresh(&self, key: &str) {
        if let Err(e) = self.fetch(key).await {
            debug!(flag_key = %key, error = %e, "Flag refresh failed");
        }
        self.pending.lock().remove(key);
    }

    async fn fetch(&self, key: &str) -> StoreResult<()> {
        match self.store.get(key).await? {
            Some(definition) => {
                let version = definition.version;
                let outcome = self.cache.put(definition);
                debug!(flag_key = %key, version, ?outcome, "Fetched flag");
            }
            None => {
                if self.cache.invalidate(key) {
                    debug!(flag_key = %key, "Flag removed from store");
                }
            }
        }
        Ok(())
    }
}

/// Handle to a running update listener.
pub struct ListenerHandle {
    state: watch::Receiver<ListenerState>,
    ready: watch::Receiver<bool>,
    refresh_tx: mpsc::Sender<String>,
    pending: Pending,
    cancel: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ListenerHandle {
    /// Start the listener task. Must be called within a Tokio runtime.
    pub fn spawn(store: Arc<dyn FlagStore>, cache: Arc<FlagCache>, config: ListenerConfig) -> Self {
        let (state_tx, state_rx) = watch::channel(ListenerState::Disconnected);
        let (ready_tx, ready_rx) = watch::channel(false);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (refresh_tx, refresh_rx) = mpsc::channel(REFRESH_QUEUE);
        let pending = Pending::default();

        let worker = Worker {
            store,
            cache,
            config,
            state: state_tx,
            ready: ready_tx,
            refresh_rx,
            pending: Arc::clone(&pending),
            cancel: cancel_rx,
            warned_uninitialized: false,
        };
        let task = tokio::spawn(worker.run());

        Self {
            state: state_rx,
            ready: ready_rx,
            refresh_tx,
            pending,
            cancel: cancel_tx,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ListenerState> {
        self.state.clone()
    }

    /// Whether the first full load has completed.
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Wait up to `timeout` for the first full load.
    pub async fn wait_ready(&self, timeout: Duration) -> bool {
        let mut ready = self.ready.clone();
        matches!(
            tokio::time::timeout(timeout, ready.wait_for(|r| *r)).await,
            Ok(Ok(_))
        )
    }

    /// Queue a background fetch of one flag. A key already queued is not
    /// queued again; requests are dropped if the queue is full.
    pub fn request_refresh(&self, key: &str) {
        if !self.pending.lock().insert(key.to_string()) {
            return;
        }
        if self.refresh_tx.try_send(key.to_string()).is_err() {
            self.pending.lock().remove(key);
            debug!(flag_key = %key, "Refresh queue full or closed; dropping request");
        }
    }

    /// Stop the listener, aborting it if it does not finish within `grace`.
    pub async fn shutdown(&self, grace: Duration) {
        let _ = self.cancel.send(true);
        let task = self.task.lock().take();
        if let Some(mut task) = task
            && tokio::time::timeout(grace, &mut task).await.is_err()
        {
            warn!(grace_ms = grace.as_millis() as u64, "Update listener did not stop in time; aborting");
            task.abort();
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        let _ = self.cancel.send(true);
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}
