//! Page-side update coordination.
//!
//! The page registers the interception layer, polls for new deploys, tells
//! any waiting instance to skip waiting, and reloads exactly once when a new
//! version takes over. The platform's registration surface sits behind the
//! `PageHost` trait; the state machine itself is plain data and can be
//! driven directly in tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::CoordinatorError;
use crate::layer::WorkerState;
use crate::message::Message;

/// The interception layer's lifecycle as observed from the page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    NoneRegistered,
    Installing,
    Waiting,
    Activating,
    Activated,
}

impl UpdateState {
    pub fn can_transition_to(self, next: UpdateState) -> bool {
        use UpdateState::*;
        matches!(
            (self, next),
            (NoneRegistered, Installing)
                | (NoneRegistered, Waiting)
                | (NoneRegistered, Activated)
                | (Installing, Waiting)
                | (Installing, Activating)
                | (Installing, Activated)
                | (Installing, NoneRegistered)
                | (Waiting, Activating)
                | (Waiting, Activated)
                | (Activating, Activated)
                | (Activated, Installing)
                | (Activated, Waiting)
        )
    }
}

/// `UpdateState` plus the one-shot reload guard for this page session.
#[derive(Debug)]
pub struct UpdateMachine {
    state: UpdateState,
    reloaded: bool,
}

impl Default for UpdateMachine {
    fn default() -> Self {
        Self {
            state: UpdateState::NoneRegistered,
            reloaded: false,
        }
    }
}

impl UpdateMachine {
    pub fn state(&self) -> UpdateState {
        self.state
    }

    pub fn has_reloaded(&self) -> bool {
        self.reloaded
    }

    /// Returns false (and leaves the state alone) for a disallowed move.
    /// Moving to the current state is a no-op that succeeds.
    pub fn transition(&mut self, next: UpdateState) -> bool {
        if self.state == next {
            return true;
        }
        if !self.state.can_transition_to(next) {
            debug!(from = ?self.state, to = ?next, "Ignoring disallowed update transition");
            return false;
        }
        self.state = next;
        true
    }

    /// True exactly once per session
    pub fn claim_reload(&mut self) -> bool {
        if self.reloaded {
            return false;
        }
        self.reloaded = true;
        true
    }
}

/// Which worker of a registration a message is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerSlot {
    Installing,
    Waiting,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistrationInfo {
    pub installing: bool,
    pub waiting: bool,
    pub active: bool,
}

/// Platform registration surface seen from the page.
#[async_trait]
pub trait PageHost: Send + Sync {
    async fn get_registration(&self) -> Result<Option<RegistrationInfo>, CoordinatorError>;

    async fn register(&self, script_url: &str) -> Result<RegistrationInfo, CoordinatorError>;

    async fn check_for_update(&self) -> Result<RegistrationInfo, CoordinatorError>;

    async fn post_message(&self, slot: WorkerSlot, message: Message) -> Result<(), CoordinatorError>;

    /// Whether some layer instance already controls this page
    fn has_controller(&self) -> bool;

    fn reload(&self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    UpdateFound,
    InstallingStateChanged(WorkerState),
    ControllerChange,
    Message(Message),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    Ignored,
    SkipWaitingSent,
    Reloaded,
}

pub struct UpdateCoordinator {
    host: Arc<dyn PageHost>,
    machine: UpdateMachine,
    script_url: String,
    update_interval: Duration,
}

impl UpdateCoordinator {
    /// `page_path` is the path of the current page; the layer script is
    /// registered next to it.
    pub fn new(
        host: Arc<dyn PageHost>,
        page_path: &str,
        script: &str,
        update_interval: Duration,
    ) -> Self {
        Self {
            host,
            machine: UpdateMachine::default(),
            script_url: script_url(page_path, script),
            update_interval,
        }
    }

    pub fn state(&self) -> UpdateState {
        self.machine.state()
    }

    pub fn has_reloaded(&self) -> bool {
        self.machine.has_reloaded()
    }

    pub fn script_url(&self) -> &str {
        &self.script_url
    }

    /// Reuse or create the registration, check for an update right away and
    /// push any waiting instance to activate.
    pub async fn ensure_registered(&mut self) -> Result<RegistrationInfo, CoordinatorError> {
        let info = match self.host.get_registration().await? {
            Some(info) => info,
            None => {
                info!(script = %self.script_url, "Registering interception layer");
                let info = self.host.register(&self.script_url).await?;
                self.machine.transition(UpdateState::Installing);
                info
            }
        };
        let info = match self.host.check_for_update().await {
            Ok(updated) => updated,
            Err(e) => {
                warn!(error = %e, "Initial update check failed");
                info
            }
        };
        self.apply_registration(info).await?;
        Ok(info)
    }

    async fn apply_registration(&mut self, info: RegistrationInfo) -> Result<(), CoordinatorError> {
        if info.waiting {
            self.machine.transition(UpdateState::Waiting);
            self.host.post_message(WorkerSlot::Waiting, Message::SkipWaiting).await?;
            debug!("Asked waiting instance to skip waiting");
        } else if info.installing {
            self.machine.transition(UpdateState::Installing);
        } else if info.active && self.machine.state() == UpdateState::NoneRegistered {
            self.machine.transition(UpdateState::Activated);
        }
        Ok(())
    }

    /// Periodic update check. Failures are logged; the next tick retries.
    pub async fn poll_update(&mut self) {
        match self.host.check_for_update().await {
            Ok(info) => {
                if let Err(e) = self.apply_registration(info).await {
                    warn!(error = %e, "Failed to act on update check");
                }
            }
            Err(e) => warn!(error = %e, "Update check failed"),
        }
    }

    pub async fn handle_event(&mut self, event: PageEvent) -> Result<Reaction, CoordinatorError> {
        match event {
            PageEvent::UpdateFound => {
                self.machine.transition(UpdateState::Installing);
                Ok(Reaction::Ignored)
            }
            PageEvent::InstallingStateChanged(WorkerState::Installed) => {
                self.machine.transition(UpdateState::Waiting);
                // With no controller the new instance activates on its own
                if self.host.has_controller() {
                    self.host
                        .post_message(WorkerSlot::Installing, Message::SkipWaiting)
                        .await?;
                    return Ok(Reaction::SkipWaitingSent);
                }
                Ok(Reaction::Ignored)
            }
            PageEvent::InstallingStateChanged(WorkerState::Activating) => {
                self.machine.transition(UpdateState::Activating);
                Ok(Reaction::Ignored)
            }
            PageEvent::InstallingStateChanged(WorkerState::Redundant) => {
                let fallback = if self.host.has_controller() {
                    UpdateState::Activated
                } else {
                    UpdateState::NoneRegistered
                };
                self.machine.transition(fallback);
                Ok(Reaction::Ignored)
            }
            PageEvent::InstallingStateChanged(_) => Ok(Reaction::Ignored),
            PageEvent::ControllerChange | PageEvent::Message(Message::Activated { .. }) => {
                self.machine.transition(UpdateState::Activated);
                if self.machine.claim_reload() {
                    info!("New version active, reloading page");
                    self.host.reload();
                    Ok(Reaction::Reloaded)
                } else {
                    debug!("Already reloaded this session, ignoring activation signal");
                    Ok(Reaction::Ignored)
                }
            }
            PageEvent::Message(Message::SkipWaiting) => Ok(Reaction::Ignored),
        }
    }

    /// Page bootstrap: register, then react to platform events and poll for
    /// updates until the event channel closes (the page navigates away).
    pub async fn run(mut self, mut events: mpsc::Receiver<PageEvent>) -> Result<(), CoordinatorError> {
        self.ensure_registered().await?;

        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.update_interval, self.update_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.poll_update().await,
                event = events.recv() => match event {
                    Some(event) => {
                        if let Err(e) = self.handle_event(event).await {
                            warn!(error = %e, "Failed to handle page event");
                        }
                    }
                    None => break,
                },
            }
        }
        debug!("Page session ended");
        Ok(())
    }
}

/// Script location relative to the directory of the current page
fn script_url(page_path: &str, script: &str) -> String {
    let base = match page_path.rfind('/') {
        Some(idx) => &page_path[..=idx],
        None => "/",
    };
    format!("{}{}", base, script.trim_start_matches("./"))
}
