//! Framework manager: owns every component, consumes inbound events and
//! runs the shutdown sequence.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use herald_config::{resolve_relative, HeraldConfig, JsonPrefixStore};
use herald_core::{
    Actor, EntityLookup, HeraldError, InboundEvent, MessageSink, PermissionProvider,
    PersistenceStore,
};
use herald_logging::init_logger;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::context::{default_failure_handler, DispatchSettings, FailureHandler, Services};
use crate::dispatch::{Command, Dispatcher};
use crate::handlers::builtin_commands;
use crate::pagination::PageStates;
use crate::permissions::PermissionEvaluator;
use crate::prefixes::PrefixMap;
use crate::registry::AliasRegistry;
use crate::types::{CommandEntryBuilder, DispatchOutcome};
use crate::waiter::InteractionWaiter;

pub struct FrameworkBuilder {
    host: Actor,
    sink: Arc<dyn MessageSink>,
    permissions: Arc<dyn PermissionProvider>,
    entities: Arc<dyn EntityLookup>,
    config: HeraldConfig,
    store: Option<Arc<dyn PersistenceStore>>,
    prefix_dir: Option<PathBuf>,
    commands: Vec<(CommandEntryBuilder, Arc<dyn Command>)>,
    on_argument_failure: Option<FailureHandler>,
    init_logging: bool,
}

impl FrameworkBuilder {
    pub fn new(
        host: Actor,
        sink: Arc<dyn MessageSink>,
        permissions: Arc<dyn PermissionProvider>,
        entities: Arc<dyn EntityLookup>,
    ) -> Self {
        Self {
            host,
            sink,
            permissions,
            entities,
            config: HeraldConfig::default(),
            store: None,
            prefix_dir: None,
            commands: Vec::new(),
            on_argument_failure: None,
            init_logging: false,
        }
    }

    pub fn config(mut self, config: HeraldConfig) -> Self {
        self.config = config;
        self
    }

    /// Persist guild prefixes through `store`.
    pub fn store(mut self, store: Arc<dyn PersistenceStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Persist guild prefixes in the configured JSON file, resolved against
    /// `config_dir`. Ignored when an explicit store is set.
    pub fn json_store(mut self, config_dir: impl Into<PathBuf>) -> Self {
        self.prefix_dir = Some(config_dir.into());
        self
    }

    pub fn command(mut self, builder: CommandEntryBuilder, command: Arc<dyn Command>) -> Self {
        self.commands.push((builder, command));
        self
    }

    /// Replace the default argument-failure notice.
    pub fn on_argument_failure(mut self, handler: FailureHandler) -> Self {
        self.on_argument_failure = Some(handler);
        self
    }

    /// Install the global logger from the `logging` config section at
    /// build time. Hosts that set up `tracing` themselves leave this off.
    pub fn init_logging(mut self) -> Self {
        self.init_logging = true;
        self
    }

    pub fn build(self) -> Result<Framework> {
        let config = self.config;
        if self.init_logging {
            let dir = log_dir(&config, self.prefix_dir.as_deref());
            init_logger(dir.as_deref(), &config.logging.level);
        }

        let store = self.store.or_else(|| {
            self.prefix_dir.as_deref().map(|dir: &Path| {
                let path = resolve_relative(dir, &config.prefixes.file);
                Arc::new(JsonPrefixStore::new(path)) as Arc<dyn PersistenceStore>
            })
        });

        let prefixes = match store {
            Some(store) => PrefixMap::load(config.default_prefix.clone(), store)
                .map_err(|e| HeraldError::Persistence(format!("{e:#}")))
                .context("failed to load guild prefixes")?,
            None => PrefixMap::new(config.default_prefix.clone()),
        };

        let mut registry = AliasRegistry::new();
        for (builder, command) in builtin_commands().into_iter().chain(self.commands) {
            registry.register_with_metadata(builder, &config, command);
        }
        info!(commands = registry.len(), "Command registry ready");

        let services = Arc::new(Services {
            evaluator: PermissionEvaluator::new(self.permissions, self.host.id),
            host: self.host,
            sink: self.sink,
            entities: self.entities,
            registry,
            prefixes: Arc::new(prefixes),
            waiter: InteractionWaiter::new(),
            page_states: Arc::new(PageStates::default()),
            settings: DispatchSettings::from(&config),
            on_argument_failure: self.on_argument_failure.unwrap_or_else(default_failure_handler),
        });

        Ok(Framework {
            dispatcher: Dispatcher::new(services),
            autosave_interval: config.prefixes.autosave_interval(),
            autosave: Mutex::new(None),
        })
    }
}

/// Log directory from config, relative paths resolved against `config_dir`.
fn log_dir(config: &HeraldConfig, config_dir: Option<&Path>) -> Option<PathBuf> {
    let dir = config.logging.dir.as_deref()?;
    Some(match config_dir {
        Some(base) => resolve_relative(base, dir),
        None => dir.to_path_buf(),
    })
}

pub struct Framework {
    dispatcher: Dispatcher,
    autosave_interval: std::time::Duration,
    autosave: Mutex<Option<JoinHandle<()>>>,
}

impl Framework {
    pub fn services(&self) -> &Arc<Services> {
        self.dispatcher.services()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Feed one event to the pending waits and, for messages, to the
    /// dispatcher. A gated invocation runs on its own task; its handle is
    /// returned.
    pub fn handle_event(&self, event: &InboundEvent) -> Option<JoinHandle<DispatchOutcome>> {
        if self.services().waiter.deliver(event) {
            trace!(event = %event.tag(), "Event consumed by a pending wait");
        }

        let message = event.as_message()?;
        match self.dispatcher.prepare(message) {
            Ok(invocation) => Some(tokio::spawn(invocation.run())),
            Err(outcome) => {
                trace!(outcome = ?outcome, message = %message.id, "Message not dispatched");
                None
            }
        }
    }

    /// Consume `rx` until it delivers `Shutdown`, then shut down. If the
    /// stream ends without one, the shutdown sequence still runs and
    /// `ChannelClosed` is returned.
    pub async fn run(&self, mut rx: mpsc::Receiver<InboundEvent>) -> Result<(), HeraldError> {
        info!("Herald framework started");
        self.start_autosave();

        let mut clean = false;
        while let Some(event) = rx.recv().await {
            if matches!(event, InboundEvent::Shutdown) {
                info!("Shutdown event received");
                clean = true;
                break;
            }
            self.handle_event(&event);
        }

        self.shutdown().await;
        if clean {
            Ok(())
        } else {
            warn!("Inbound event stream ended without a shutdown event");
            Err(HeraldError::ChannelClosed("inbound event stream ended".into()))
        }
    }

    fn start_autosave(&self) {
        let mut slot = self.autosave.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            *slot = Some(self.services().prefixes.spawn_autosave(self.autosave_interval));
        }
    }

    /// Cancel pending waits and the autosave task, then force a final
    /// prefix flush. A failed flush is logged, not returned.
    pub async fn shutdown(&self) {
        let cancelled = self.services().waiter.shutdown();
        debug!(cancelled, "Cancelled pending waits");

        let autosave = self.autosave.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(task) = autosave {
            task.abort();
        }

        let prefixes = Arc::clone(&self.services().prefixes);
        match tokio::task::spawn_blocking(move || prefixes.flush()).await {
            Ok(Ok(true)) => info!("Flushed guild prefixes on shutdown"),
            Ok(Ok(false)) => {}
            Ok(Err(e)) => warn!(error = %e, "Final prefix flush failed"),
            Err(e) => warn!(error = %e, "Final prefix flush task failed"),
        }
        info!("Herald framework stopped");
    }
}
