//! Client facade.

use flagstore_cache::FlagCache;
use flagstore_core::{
    Context, ErrorKind, EvalError, EvaluationResult, FlagValue, FlagsState, Reason,
};
use flagstore_store::{FlagStore, RedisFlagStore};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::config::{ClientConfig, UpdateMode};
use crate::error::{ClientError, InitError};
use crate::listener::{ListenerConfig, ListenerHandle, ListenerState};

/// Snapshot of the client's health.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientStatus {
    pub update_mode: UpdateMode,
    pub listener_state: ListenerState,
    pub initialized: bool,
    pub offline: bool,
    pub cached_flags: usize,
}

/// Evaluates flags from the local cache.
///
/// Evaluation never performs I/O and never fails: problems are reported in
/// the result's reason and the caller's fallback is served. Share a client
/// as `Arc<Client>`.
pub struct Client {
    config: ClientConfig,
    cache: Arc<FlagCache>,
    store: Mutex<Option<Arc<dyn FlagStore>>>,
    listener: Mutex<Option<Arc<ListenerHandle>>>,
    update_mode: Mutex<UpdateMode>,
    // Latched on the first full load; survives listener restarts.
    loaded: AtomicBool,
    closed: AtomicBool,
    // Serializes mode switches and close.
    lifecycle: tokio::sync::Mutex<()>,
}

impl Client {
    /// Connect to the Redis store described by `config` and initialize.
    ///
    /// Redis is contacted lazily, so an unreachable server does not fail
    /// this call; the client starts uninitialized and keeps retrying.
    pub async fn connect(config: ClientConfig) -> Result<Self, InitError> {
        if config.offline {
            return Self::start(config, None).await;
        }
        config.validate()?;
        let store = RedisFlagStore::connect_lazy(config.redis.clone(), config.prefix.clone())?;
        Self::start(config, Some(Arc::new(store))).await
    }

    /// Initialize against an existing store.
    ///
    /// Waits up to `config.start_wait` for the first full load. On timeout
    /// the client is returned anyway with [`initialized`](Self::initialized)
    /// false. Offline clients ignore `store`.
    pub async fn initialize(config: ClientConfig, store: Arc<dyn FlagStore>) -> Result<Self, InitError> {
        let store = if config.offline { None } else { Some(store) };
        Self::start(config, store).await
    }

    async fn start(config: ClientConfig, store: Option<Arc<dyn FlagStore>>) -> Result<Self, InitError> {
        config.validate()?;
        let cache = Arc::new(FlagCache::new(config.cache.clone())?);

        info!(
            sdk_key = %config.masked_sdk_key(),
            redis_url = %config.redis.redacted_url(),
            offline = config.offline,
            update_mode = %config.update_mode,
            "Initializing flag client"
        );

        let listener = match (&store, config.offline) {
            (Some(store), false) => Some(ListenerHandle::spawn(
                Arc::clone(store),
                Arc::clone(&cache),
                listener_config(&config, config.update_mode),
            )),
            _ => None,
        };

        if let Some(listener) = &listener {
            if listener.wait_ready(config.start_wait).await {
                info!(flags = cache.len(), "Flag client initialized");
            } else {
                warn!(
                    start_wait_ms = config.start_wait.as_millis() as u64,
                    "Flag client did not initialize in time; serving fallbacks until the store responds"
                );
            }
        } else {
            info!("Flag client is offline; all evaluations return fallbacks");
        }

        let loaded = listener.as_ref().is_some_and(ListenerHandle::is_ready);
        Ok(Self {
            update_mode: Mutex::new(config.update_mode),
            config,
            cache,
            store: Mutex::new(store),
            listener: Mutex::new(listener.map(Arc::new)),
            loaded: AtomicBool::new(loaded),
            closed: AtomicBool::new(false),
            lifecycle: tokio::sync::Mutex::new(()),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_offline(&self) -> bool {
        self.config.offline
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn listener(&self) -> Option<Arc<ListenerHandle>> {
        self.listener.lock().clone()
    }

    /// Whether flags can be evaluated. Offline clients count as initialized.
    pub fn initialized(&self) -> bool {
        if self.is_closed() {
            return false;
        }
        if self.config.offline || self.loaded.load(Ordering::SeqCst) {
            return true;
        }
        let ready = self.listener().is_some_and(|l| l.is_ready());
        if ready {
            self.loaded.store(true, Ordering::SeqCst);
        }
        ready
    }

    pub fn update_mode(&self) -> UpdateMode {
        *self.update_mode.lock()
    }

    pub fn listener_state(&self) -> ListenerState {
        self.listener()
            .map_or(ListenerState::Disconnected, |l| l.state())
    }

    pub fn status(&self) -> ClientStatus {
        ClientStatus {
            update_mode: self.update_mode(),
            listener_state: self.listener_state(),
            initialized: self.initialized(),
            offline: self.config.offline,
            cached_flags: self.cache.len(),
        }
    }

    /// Cache the client reads from.
    pub fn cache(&self) -> &FlagCache {
        &self.cache
    }

    fn refresh(&self, flag_key: &str) {
        if let Some(listener) = self.listener.lock().as_ref() {
            listener.request_refresh(flag_key);
        }
    }

    /// Switch between streaming and polling at runtime.
    ///
    /// The running listener is replaced by one in `mode`; the cache is kept,
    /// so evaluations continue uninterrupted. Returns the previous mode.
    pub async fn set_update_mode(&self, mode: UpdateMode) -> Result<UpdateMode, ClientError> {
        self.switch_mode(|_| mode).await
    }

    /// Flip the update mode. Returns the new mode.
    pub async fn toggle_update_mode(&self) -> Result<UpdateMode, ClientError> {
        let previous = self.switch_mode(UpdateMode::toggled).await?;
        Ok(previous.toggled())
    }

    async fn switch_mode(
        &self,
        choose: impl FnOnce(UpdateMode) -> UpdateMode,
    ) -> Result<UpdateMode, ClientError> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.is_closed() {
            return Err(ClientError::Closed);
        }
        if self.config.offline {
            return Err(ClientError::Offline);
        }
        let Some(store) = self.store.lock().clone() else {
            return Err(ClientError::Closed);
        };

        let previous = self.update_mode();
        let mode = choose(previous);
        if mode == previous {
            return Ok(previous);
        }

        // Latch readiness before the new listener starts from scratch
        self.initialized();
        info!(from = %previous, to = %mode, "Switching update mode");

        let next = ListenerHandle::spawn(store, Arc::clone(&self.cache), listener_config(&self.config, mode));
        let old = self.listener.lock().replace(Arc::new(next));
        *self.update_mode.lock() = mode;
        if let Some(old) = old {
            old.shutdown(self.config.close_timeout).await;
        }
        Ok(previous)
    }

    /// Evaluate a flag, returning the value only.
    pub fn variation(&self, flag_key: &str, context: &Context, fallback: FlagValue) -> FlagValue {
        self.variation_detail(flag_key, context, fallback).value
    }

    /// Evaluate a flag with the reason for the outcome.
    pub fn variation_detail(
        &self,
        flag_key: &str,
        context: &Context,
        fallback: FlagValue,
    ) -> EvaluationResult {
        if self.config.offline || self.is_closed() {
            return EvaluationResult::fallback(fallback, ErrorKind::ClientNotReady);
        }

        let Some(entry) = self.cache.lookup(flag_key) else {
            if !self.initialized() {
                return EvaluationResult::fallback(fallback, ErrorKind::ClientNotReady);
            }
            debug!(flag_key = %flag_key, "Flag not cached; queueing refresh");
            self.refresh(flag_key);
            return EvaluationResult::fallback(fallback, ErrorKind::FlagNotFound);
        };

        if self.cache.is_expired(&entry) {
            self.refresh(flag_key);
        }

        if entry.is_deleted() {
            return EvaluationResult::fallback(fallback, ErrorKind::FlagNotFound);
        }

        let result = entry.definition.evaluate_or(context, fallback);
        if let Some(kind) = error_kind(&result) {
            debug!(flag_key = %flag_key, error_kind = ?kind, "Served fallback");
        }
        result
    }

    fn typed<T>(
        &self,
        flag_key: &str,
        context: &Context,
        fallback: T,
        convert: impl Fn(&FlagValue) -> Option<T>,
    ) -> (T, EvaluationResult)
    where
        T: Clone + Into<FlagValue>,
    {
        let result = self.variation_detail(flag_key, context, fallback.clone().into());
        if result.is_fallback() {
            return (fallback, result);
        }
        match convert(&result.value) {
            Some(value) => (value, result),
            None => {
                debug!(flag_key = %flag_key, actual = result.value.type_name(), "Flag has wrong type");
                let wrong = EvaluationResult::fallback(fallback.clone().into(), ErrorKind::WrongType);
                (fallback, wrong)
            }
        }
    }

    pub fn bool_variation(&self, flag_key: &str, context: &Context, fallback: bool) -> bool {
        self.bool_variation_detail(flag_key, context, fallback).0
    }

    pub fn bool_variation_detail(
        &self,
        flag_key: &str,
        context: &Context,
        fallback: bool,
    ) -> (bool, EvaluationResult) {
        self.typed(flag_key, context, fallback, FlagValue::as_bool)
    }

    pub fn string_variation(&self, flag_key: &str, context: &Context, fallback: &str) -> String {
        self.typed(flag_key, context, fallback.to_string(), |v| {
            v.as_str().map(str::to_string)
        })
        .0
    }

    pub fn number_variation(&self, flag_key: &str, context: &Context, fallback: f64) -> f64 {
        self.typed(flag_key, context, fallback, FlagValue::as_f64).0
    }

    /// Like [`number_variation`](Self::number_variation), but a fractional
    /// value is the wrong type.
    pub fn int_variation(&self, flag_key: &str, context: &Context, fallback: i64) -> i64 {
        self.typed(flag_key, context, fallback, FlagValue::as_i64).0
    }

    /// Evaluate a flag of any type as JSON.
    pub fn json_variation(
        &self,
        flag_key: &str,
        context: &Context,
        fallback: serde_json::Value,
    ) -> serde_json::Value {
        self.variation(flag_key, context, FlagValue::Json(fallback)).to_json()
    }

    /// Evaluate every cached flag for `context`.
    ///
    /// Returns an invalid, empty state when the client is offline, closed
    /// or not yet initialized.
    pub fn all_flags_state(&self, context: &Context) -> Result<FlagsState, EvalError> {
        context.validate()?;

        if self.config.offline || !self.initialized() {
            return Ok(FlagsState::invalid());
        }

        let mut state = FlagsState::new();
        for (key, entry) in self.cache.snapshot() {
            if entry.is_deleted() {
                continue;
            }
            let result = entry.definition.evaluate_or(context, FlagValue::default());
            state.add(key, entry.definition.version, result);
        }
        Ok(state)
    }

    /// Stop the listener and release the store. Safe to call more than once.
    pub async fn close(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Closing flag client");
        let listener = self.listener.lock().take();
        if let Some(listener) = listener {
            listener.shutdown(self.config.close_timeout).await;
        }
        self.store.lock().take();
    }
}

fn listener_config(config: &ClientConfig, mode: UpdateMode) -> ListenerConfig {
    ListenerConfig {
        mode,
        poll_interval: config.effective_poll_interval(),
        backoff: Backoff::exponential(config.reconnect_initial, config.reconnect_max),
    }
}

fn error_kind(result: &EvaluationResult) -> Option<ErrorKind> {
    match &result.reason {
        Reason::Error { error_kind } => Some(*error_kind),
        _ => None,
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("status", &self.status())
            .finish()
    }
}
