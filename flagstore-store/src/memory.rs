//! In-process flag store.

use async_trait::async_trait;
use flagstore_core::FlagDefinition;
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::traits::{ChangeEvent, ChangeStream, FlagStore};

const CHANGE_BUFFER: usize = 256;

/// Flag store kept in process memory.
///
/// Behaves like the Redis store, including versioned writes and a change
/// feed. [`set_available`](MemoryFlagStore::set_available) simulates an
/// outage: reads and writes fail with [`StoreError::Unavailable`] and open
/// change streams end.
pub struct MemoryFlagStore {
    flags: RwLock<HashMap<String, FlagDefinition>>,
    changes: Mutex<broadcast::Sender<ChangeEvent>>,
    initialized: AtomicBool,
    available: AtomicBool,
    reads: AtomicUsize,
}

impl MemoryFlagStore {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            flags: RwLock::new(HashMap::new()),
            changes: Mutex::new(tx),
            initialized: AtomicBool::new(false),
            available: AtomicBool::new(true),
            reads: AtomicUsize::new(0),
        }
    }

    /// Create an initialized store holding `definitions`.
    pub fn with_flags(definitions: impl IntoIterator<Item = FlagDefinition>) -> Self {
        let store = Self::new();
        store.flags.write().extend(
            definitions
                .into_iter()
                .map(|definition| (definition.key.clone(), definition)),
        );
        store.initialized.store(true, Ordering::SeqCst);
        store
    }

    /// Switch availability. Going unavailable ends every open change stream.
    pub fn set_available(&self, available: bool) {
        let was = self.available.swap(available, Ordering::SeqCst);
        if was && !available {
            let (tx, _) = broadcast::channel(CHANGE_BUFFER);
            // Dropping the old sender closes its receivers
            *self.changes.lock() = tx;
            info!("Memory store marked unavailable");
        }
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Number of `get` and `get_all` calls served.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Write a definition without the version check or a change event.
    pub fn insert_silently(&self, definition: FlagDefinition) {
        self.flags.write().insert(definition.key.clone(), definition);
    }

    /// Remove a definition without a tombstone or a change event.
    pub fn remove_silently(&self, key: &str) -> Option<FlagDefinition> {
        self.flags.write().remove(key)
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store is offline".to_string()))
        }
    }

    fn publish(&self, event: ChangeEvent) {
        // No subscribers is fine
        let _ = self.changes.lock().send(event);
    }
}

impl Default for MemoryFlagStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FlagStore for MemoryFlagStore {
    async fn get(&self, key: &str) -> StoreResult<Option<FlagDefinition>> {
        self.check_available()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.flags.read().get(key).cloned())
    }

    async fn get_all(&self) -> StoreResult<HashMap<String, FlagDefinition>> {
        self.check_available()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.flags.read().clone())
    }

    async fn put(&self, definition: &FlagDefinition) -> StoreResult<bool> {
        self.check_available()?;
        {
            let mut flags = self.flags.write();
            if let Some(current) = flags.get(&definition.key)
                && current.version >= definition.version
            {
                debug!(flag_key = %definition.key, version = definition.version, "Skipped stale write");
                return Ok(false);
            }
            flags.insert(definition.key.clone(), definition.clone());
        }
        self.publish(ChangeEvent::for_flag(definition));
        Ok(true)
    }

    async fn subscribe(&self) -> StoreResult<ChangeStream> {
        self.check_available()?;
        let rx = self.changes.lock().subscribe();

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            match rx.recv().await {
                Ok(event) => Some((event, rx)),
                // A lagging subscriber has missed events; end the stream so
                // the caller resubscribes and resyncs.
                Err(broadcast::error::RecvError::Lagged(_)) | Err(broadcast::error::RecvError::Closed) => None,
            }
        });
        Ok(stream.boxed())
    }

    async fn is_initialized(&self) -> StoreResult<bool> {
        self.check_available()?;
        Ok(self.initialized.load(Ordering::SeqCst))
    }

    async fn init(&self, definitions: Vec<FlagDefinition>) -> StoreResult<()> {
        self.check_available()?;
        let mut events: Vec<ChangeEvent> = definitions.iter().map(ChangeEvent::for_flag).collect();
        {
            let mut flags = self.flags.write();
            let replaced = std::mem::take(&mut *flags);
            flags.extend(definitions.into_iter().map(|d| (d.key.clone(), d)));
            events.extend(
                replaced
                    .values()
                    .filter(|old| !flags.contains_key(&old.key))
                    .map(ChangeEvent::removal),
            );
        }
        self.initialized.store(true, Ordering::SeqCst);
        for event in events {
            self.publish(event);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
