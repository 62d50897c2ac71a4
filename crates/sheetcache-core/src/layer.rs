//! The interception layer: one async handler per event type.
//!
//! - `install` / `activate`: lifecycle events, delegated to `LifecycleManager`
//! - `handle_message`: `SKIP_WAITING` from a page activates a waiting layer
//! - `handle_fetch`: classify the request and run its strategy
//!
//! Each handler returns a value; nothing here touches page state. The
//! worker state is published on a watch channel for observers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::classify::{classify, Interception, ResourceClass};
use crate::config::Config;
use crate::error::{ActivationError, FetchError, InstallError, StoreError};
use crate::guard::ContentTypeGuard;
use crate::http::Request;
use crate::lifecycle::{ActivationReport, InstallReport, LifecycleContext, LifecycleManager};
use crate::message::Message;
use crate::net::{FetchOptions, Network};
use crate::strategy::{self, BackgroundTasks, Served, Source};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Parsed,
    Installing,
    /// Installed and waiting to take over
    Installed,
    Activating,
    Activated,
    /// Install failed; this instance will never control requests
    Redundant,
}

impl WorkerState {
    pub fn label(&self) -> &'static str {
        match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LayerOptions {
    pub navigation_timeout: Duration,
    pub content_guard: ContentTypeGuard,
}

impl LayerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            navigation_timeout: config.navigation_timeout(),
            content_guard: config.content_guard(),
        }
    }
}

pub struct InterceptionLayer {
    lifecycle: LifecycleManager,
    network: Arc<dyn Network>,
    options: LayerOptions,
    background: BackgroundTasks,
    state: watch::Sender<WorkerState>,
}

impl InterceptionLayer {
    pub fn new(ctx: Arc<LifecycleContext>, network: Arc<dyn Network>, options: LayerOptions) -> Self {
        let (state, _) = watch::channel(WorkerState::Parsed);
        Self {
            lifecycle: LifecycleManager::new(ctx, Arc::clone(&network)),
            network,
            options,
            background: BackgroundTasks::new(),
            state,
        }
    }

    pub fn context(&self) -> &Arc<LifecycleContext> {
        self.lifecycle.context()
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    /// Attach a page session for `SW_ACTIVATED` notices
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.lifecycle.subscribe()
    }

    fn set_state(&self, state: WorkerState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = previous.label(), to = state.label(), "Worker state changed");
        }
    }

    pub async fn install(&self) -> Result<InstallReport, InstallError> {
        let already_active = self.state() == WorkerState::Activated;
        if !already_active {
            self.set_state(WorkerState::Installing);
        }
        let result = self.lifecycle.on_install().await;
        if !already_active {
            self.set_state(match result {
                Ok(_) => WorkerState::Installed,
                Err(_) => WorkerState::Redundant,
            });
        }
        result
    }

    /// Pick up an install completed by an earlier process: if this version's
    /// static store exists, the layer is waiting to activate.
    pub fn resume(&self) -> Result<bool, StoreError> {
        let ctx = self.context();
        let installed = ctx.storage().contains_store(&ctx.static_store())?;
        if installed && self.state() == WorkerState::Parsed {
            self.set_state(WorkerState::Installed);
        }
        Ok(installed)
    }

    /// Move to `Activating` if the current state is one of `from`, as a
    /// single step. Returns the state moved from, or the state that blocked.
    fn claim_activation(&self, from: &[WorkerState]) -> Result<WorkerState, WorkerState> {
        let mut outcome = Err(WorkerState::Parsed);
        self.state.send_if_modified(|state| {
            if from.contains(state) {
                outcome = Ok(*state);
                *state = WorkerState::Activating;
                true
            } else {
                outcome = Err(*state);
                false
            }
        });
        if let Ok(previous) = outcome {
            debug!(from = previous.label(), to = WorkerState::Activating.label(), "Worker state changed");
        }
        outcome
    }

    async fn run_activation(&self, previous: WorkerState) -> Result<ActivationReport, ActivationError> {
        match self.lifecycle.on_activate().await {
            Ok(report) => {
                self.set_state(WorkerState::Activated);
                Ok(report)
            }
            Err(e) => {
                warn!(error = %e, "Activation failed, will retry on next request");
                self.set_state(previous);
                Err(e.into())
            }
        }
    }

    pub async fn activate(&self) -> Result<ActivationReport, ActivationError> {
        match self.claim_activation(&[WorkerState::Installed, WorkerState::Activated]) {
            Ok(previous) => self.run_activation(previous).await,
            Err(blocked) => Err(ActivationError::NotInstalled(blocked.label())),
        }
    }

    pub async fn handle_message(
        &self,
        message: Message,
    ) -> Result<Option<ActivationReport>, ActivationError> {
        if message == Message::SkipWaiting {
            if let Ok(previous) = self.claim_activation(&[WorkerState::Installed]) {
                info!("Skip-waiting requested, activating now");
                return self.run_activation(previous).await.map(Some);
            }
        }
        debug!(message = ?message, state = self.state().label(), "Ignoring message");
        Ok(None)
    }

    pub async fn handle_fetch(&self, request: &Request) -> Result<Served, FetchError> {
        let ctx = self.context();
        // Nothing is intercepted until activation has finished purging
        let interception = if ctx.is_controlling() {
            classify(request, ctx.scope())
        } else {
            Interception::Passthrough
        };

        let class = match interception {
            Interception::Passthrough => {
                let response = self.network.fetch(request, FetchOptions::default()).await?;
                return Ok(Served::new(response, Source::Passthrough));
            }
            Interception::Handle(class) => class,
        };
        debug!(url = %request.url, class = class.label(), "Intercepted request");

        match class {
            ResourceClass::Navigation => {
                strategy::network_first_with_fallback(
                    ctx,
                    &self.network,
                    &self.background,
                    request,
                    self.options.navigation_timeout,
                )
                .await
            }
            ResourceClass::SameOriginStatic => {
                strategy::stale_while_revalidate(
                    ctx,
                    &self.network,
                    &self.background,
                    request,
                )
                .await
            }
            ResourceClass::RemoteDynamic => Ok(strategy::network_first_guarded(
                ctx,
                &self.network,
                request,
                &self.options.content_guard,
            )
            .await),
        }
    }

    /// Wait for background revalidation and abandoned navigation fetches
    pub async fn settle(&self) {
        self.background.settle().await;
    }
}
