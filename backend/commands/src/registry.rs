//! Alias registry: name/alias → command entry lookup.
use std::sync::Arc;

use herald_core::MetadataSource;
use tracing::debug;

use crate::dispatch::Command;
use crate::types::{CommandEntry, CommandEntryBuilder};

/// Insertion-ordered command table. Earlier registrations shadow later
/// ones that share an alias.
#[derive(Debug, Default)]
pub struct AliasRegistry {
    entries: Vec<Arc<CommandEntry>>,
}

impl AliasRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry. Returns `false` (and changes nothing) when an
    /// entry with the same canonical name already exists.
    pub fn register(&mut self, entry: CommandEntry) -> bool {
        if self.entries.iter().any(|e| e.same_identity(&entry)) {
            debug!(command = %entry.name(), "Ignoring duplicate command registration");
            return false;
        }
        debug!(command = %entry.name(), aliases = ?entry.aliases(), "Registered command");
        self.entries.push(Arc::new(entry));
        true
    }

    /// Register `builder` after overlaying whatever `source` knows about it.
    pub fn register_with_metadata(
        &mut self,
        builder: CommandEntryBuilder,
        source: &dyn MetadataSource,
        command: Arc<dyn Command>,
    ) -> bool {
        let builder = match source.metadata(builder.name()) {
            Some(meta) => builder.with_metadata(meta),
            None => builder,
        };
        self.register(builder.build(command))
    }

    /// Case-insensitive lookup: canonical names first, then every alias.
    pub fn lookup(&self, token: &str) -> Option<Arc<CommandEntry>> {
        self.entries
            .iter()
            .find(|e| e.name().eq_ignore_ascii_case(token))
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|e| e.aliases().iter().any(|a| a.eq_ignore_ascii_case(token)))
            })
            .cloned()
    }

    /// Entries in registration order.
    pub fn entries(&self) -> impl Iterator<Item = &Arc<CommandEntry>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
