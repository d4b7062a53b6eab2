//! Per-guild command prefixes.
//!
//! Read on every inbound message, written on administrative change, and
//! flushed to a `PersistenceStore` by a background task and once more at
//! shutdown.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::Result;
use herald_core::{GuildId, PersistenceStore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct PrefixMap {
    default: String,
    overrides: RwLock<HashMap<GuildId, String>>,
    dirty: AtomicBool,
    store: Option<Arc<dyn PersistenceStore>>,
}

impl PrefixMap {
    /// In-memory only.
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            default: default.into(),
            overrides: RwLock::new(HashMap::new()),
            dirty: AtomicBool::new(false),
            store: None,
        }
    }

    /// Load overrides from `store` and keep it for later flushes.
    pub fn load(default: impl Into<String>, store: Arc<dyn PersistenceStore>) -> Result<Self> {
        let overrides = store.load()?;
        info!(count = overrides.len(), "Loaded guild prefix overrides");
        Ok(Self {
            default: default.into(),
            overrides: RwLock::new(overrides),
            dirty: AtomicBool::new(false),
            store: Some(store),
        })
    }

    pub fn default_prefix(&self) -> &str {
        &self.default
    }

    /// Prefix in effect for `guild`; direct messages use the default.
    pub fn prefix_for(&self, guild: Option<GuildId>) -> String {
        let Some(guild) = guild else { return self.default.clone() };
        self.overrides
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&guild)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }

    pub fn set(&self, guild: GuildId, prefix: impl Into<String>) {
        let prefix = prefix.into();
        debug!(guild = %guild, prefix = %prefix, "Setting guild prefix");
        self.overrides.write().unwrap_or_else(|e| e.into_inner()).insert(guild, prefix);
        self.dirty.store(true, Ordering::Release);
    }

    /// Drop the override for `guild`. Returns whether one existed.
    pub fn reset(&self, guild: GuildId) -> bool {
        let removed =
            self.overrides.write().unwrap_or_else(|e| e.into_inner()).remove(&guild).is_some();
        if removed {
            self.dirty.store(true, Ordering::Release);
        }
        removed
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Write pending changes to the store. Returns `Ok(false)` when there
    /// was nothing to write.
    pub fn flush(&self) -> Result<bool> {
        let Some(store) = &self.store else { return Ok(false) };
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(false);
        }

        let snapshot = self.overrides.read().unwrap_or_else(|e| e.into_inner()).clone();
        if let Err(e) = store.save(&snapshot) {
            self.dirty.store(true, Ordering::Release);
            return Err(e);
        }
        debug!(count = snapshot.len(), "Flushed guild prefixes");
        Ok(true)
    }

    /// Flush every `interval` on a blocking-capable task.
    pub fn spawn_autosave(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let map = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let map = Arc::clone(&map);
                match tokio::task::spawn_blocking(move || map.flush()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => warn!(error = %e, "Prefix autosave failed"),
                    Err(e) => warn!(error = %e, "Prefix autosave task panicked"),
                }
            }
        })
    }
}
