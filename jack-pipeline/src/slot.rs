//! The single build slot
//!
//! At most one ad hoc build is in flight. The slot moves through
//! `Idle → Synchronizing → Triggered → AwaitingReady → Streaming → Idle`;
//! every check-and-write happens under one lock acquisition and the lock is
//! never held across an `.await`.
//!
//! Each reservation gets a [`Ticket`]. Transitions carry the ticket, so a run
//! that was aborted (or a stream that ends late) cannot move a newer build.
//! Only a stream that ends while its ticket still owns the slot counts as a
//! completed build.

use jack_core::domain::build::PipelineBuild;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Proof of a slot reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Where the slot is in a build's lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    /// Reserved; the job is being created or updated
    Synchronizing { job: String },
    /// The server accepted the trigger, nobody is polling for it
    Triggered { build: PipelineBuild },
    AwaitingReady { build: PipelineBuild },
    Streaming { build: PipelineBuild },
}

impl SlotState {
    /// The build this state holds, if it counts as active
    pub fn active_build(&self) -> Option<&PipelineBuild> {
        match self {
            SlotState::Triggered { build }
            | SlotState::AwaitingReady { build }
            | SlotState::Streaming { build } => Some(build),
            SlotState::Idle | SlotState::Synchronizing { .. } => None,
        }
    }

    fn rejection(&self) -> Option<PipelineError> {
        match self {
            SlotState::Idle => None,
            SlotState::Synchronizing { job } => Some(PipelineError::ConcurrentBuildRejected {
                job: job.clone(),
                number: None,
            }),
            SlotState::Triggered { build }
            | SlotState::AwaitingReady { build }
            | SlotState::Streaming { build } => Some(PipelineError::ConcurrentBuildRejected {
                job: build.job.clone(),
                number: build.next_build_number,
            }),
        }
    }
}

struct SlotInner {
    state: SlotState,
    ticket: u64,
    last_completed: Option<PipelineBuild>,
}

/// Single-flight guard over the active build
pub struct BuildSlot {
    inner: Mutex<SlotInner>,
}

impl Default for BuildSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildSlot {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SlotInner {
                state: SlotState::Idle,
                ticket: 0,
                last_completed: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> SlotState {
        self.lock().state.clone()
    }

    pub fn active(&self) -> Option<PipelineBuild> {
        self.lock().state.active_build().cloned()
    }

    pub fn last_completed(&self) -> Option<PipelineBuild> {
        self.lock().last_completed.clone()
    }

    /// Claims the idle slot for `job`
    ///
    /// Fails with [`PipelineError::ConcurrentBuildRejected`], naming the
    /// build in progress, when the slot is taken.
    pub fn reserve(&self, job: &str) -> Result<Ticket> {
        let mut inner = self.lock();
        if let Some(rejection) = inner.state.rejection() {
            return Err(rejection);
        }

        inner.ticket += 1;
        inner.state = SlotState::Synchronizing {
            job: job.to_string(),
        };
        debug!("Slot reserved for {} (ticket {})", job, inner.ticket);
        Ok(Ticket(inner.ticket))
    }

    /// Returns a reservation that never got a build back to idle
    pub fn release(&self, ticket: Ticket) {
        let mut inner = self.lock();
        if inner.ticket == ticket.0 && matches!(inner.state, SlotState::Synchronizing { .. }) {
            inner.state = SlotState::Idle;
        }
    }

    /// Records the triggered build as active
    ///
    /// Also hands a build back to `Triggered` when waiting for it or opening
    /// its stream failed, so it can be resumed or aborted.
    pub fn mark_triggered(&self, ticket: Ticket, build: PipelineBuild) -> bool {
        self.transition(ticket, |state| match state {
            SlotState::Synchronizing { .. }
            | SlotState::AwaitingReady { .. }
            | SlotState::Streaming { .. } => Some(SlotState::Triggered { build }),
            _ => None,
        })
    }

    pub fn mark_awaiting_ready(&self, ticket: Ticket) -> bool {
        self.transition(ticket, |state| match state {
            SlotState::Triggered { build } => Some(SlotState::AwaitingReady {
                build: build.clone(),
            }),
            _ => None,
        })
    }

    pub fn mark_streaming(&self, ticket: Ticket) -> bool {
        self.transition(ticket, |state| match state {
            SlotState::AwaitingReady { build } => Some(SlotState::Streaming {
                build: build.clone(),
            }),
            _ => None,
        })
    }

    /// Claims a triggered build nobody is waiting on, for another readiness round
    ///
    /// Fails with [`PipelineError::NoActiveBuild`] when idle and with a
    /// rejection when another run is still driving the slot.
    pub fn resume(&self) -> Result<(Ticket, PipelineBuild)> {
        let mut inner = self.lock();
        let build = match &inner.state {
            SlotState::Idle => return Err(PipelineError::NoActiveBuild),
            SlotState::Triggered { build } => build.clone(),
            other => {
                return Err(other
                    .rejection()
                    .unwrap_or(PipelineError::NoActiveBuild));
            }
        };

        inner.state = SlotState::AwaitingReady {
            build: build.clone(),
        };
        Ok((Ticket(inner.ticket), build))
    }

    /// Records the end of a build's console stream
    ///
    /// If the slot still belongs to `ticket` it is cleared and the build
    /// becomes the last completed one. A stream that ends after its build was
    /// aborted changes nothing.
    pub fn complete(&self, ticket: Ticket, build: PipelineBuild) -> bool {
        let mut inner = self.lock();
        if inner.ticket != ticket.0 || inner.state.active_build().is_none() {
            debug!("Stream of {} ended after its slot was released", build);
            return false;
        }
        inner.state = SlotState::Idle;
        inner.last_completed = Some(build);
        true
    }

    /// The active build with the ticket that owns it
    pub fn active_entry(&self) -> Option<(Ticket, PipelineBuild)> {
        let inner = self.lock();
        let build = inner.state.active_build().cloned()?;
        Some((Ticket(inner.ticket), build))
    }

    /// Clears the slot if `ticket` still holds an active build
    ///
    /// A reservation that has not been triggered yet is left alone.
    pub fn clear(&self, ticket: Ticket) -> bool {
        self.transition(ticket, |state| state.active_build().map(|_| SlotState::Idle))
    }

    fn transition<F>(&self, ticket: Ticket, next: F) -> bool
    where
        F: FnOnce(&SlotState) -> Option<SlotState>,
    {
        let mut inner = self.lock();
        if inner.ticket != ticket.0 {
            return false;
        }
        match next(&inner.state) {
            Some(state) => {
                inner.state = state;
                true
            }
            None => false,
        }
    }
}
