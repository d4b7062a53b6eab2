//! JSON-file persistence for per-guild command prefixes.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use herald_core::{GuildId, PersistenceStore};
use tracing::{debug, info, warn};

/// Stores `{ "<guild id>": "<prefix>" }` in a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonPrefixStore {
    path: PathBuf,
}

impl JsonPrefixStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PersistenceStore for JsonPrefixStore {
    fn load(&self) -> Result<HashMap<GuildId, String>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "Prefix file does not exist; starting empty");
            return Ok(HashMap::new());
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read prefix file: {}", self.path.display()))?;
        let stored: BTreeMap<String, String> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse prefix file: {}", self.path.display()))?;

        let mut prefixes = HashMap::with_capacity(stored.len());
        for (key, prefix) in stored {
            match key.parse::<u64>() {
                Ok(id) => {
                    prefixes.insert(GuildId(id), prefix);
                }
                Err(_) => warn!(key = %key, "Skipping prefix entry with non-numeric guild id"),
            }
        }

        info!(path = %self.path.display(), count = prefixes.len(), "Loaded guild prefixes");
        Ok(prefixes)
    }

    fn save(&self, prefixes: &HashMap<GuildId, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create prefix directory: {}", parent.display())
            })?;
        }

        let stored: BTreeMap<String, &String> =
            prefixes.iter().map(|(guild, prefix)| (guild.to_string(), prefix)).collect();
        let json = serde_json::to_string_pretty(&stored).context("Failed to serialize prefixes")?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json.as_bytes())
            .with_context(|| format!("Failed to write temp prefix file: {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path).with_context(|| {
            format!("Failed to rename temp prefix file to: {}", self.path.display())
        })?;

        debug!(path = %self.path.display(), count = prefixes.len(), "Saved guild prefixes");
        Ok(())
    }
}
