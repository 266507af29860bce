//! Span lifecycle.
//!
//! ```text
//! Unregistered --register--> Registered --startup--> Running --shutdown--> ShutDown
//!                                                       ^                     |
//!                                                       +------startup--------+
//! ```
//!
//! Startup and shutdown are idempotent. Channel registration is a separate,
//! forward-only flag owned by the host (see `Channel::accept`).

use std::sync::atomic::Ordering;

use tracing::debug;

use crate::error::{LoopError, Result};
use crate::span::{Span, SpanBank, SpanIndex};

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum SpanState {
    Unregistered = 0,
    Registered = 1,
    Running = 2,
    ShutDown = 3,
}

impl From<u8> for SpanState {
    fn from(value: u8) -> Self {
        match value {
            1 => SpanState::Registered,
            2 => SpanState::Running,
            3 => SpanState::ShutDown,
            _ => SpanState::Unregistered,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum LifecycleEvent {
    Register,
    Startup,
    Shutdown,
    Unregister,
}

impl SpanState {
    /// State after `event`, or `None` if the event is not valid here.
    pub(crate) fn next(self, event: LifecycleEvent) -> Option<SpanState> {
        use LifecycleEvent::*;
        use SpanState::*;

        match (self, event) {
            (Unregistered, Register)        => Some(Registered),
            (_,            Register)        => None,

            (Unregistered, Startup)         => None,
            (_,            Startup)         => Some(Running),

            (Running,      Shutdown)        => Some(ShutDown),
            (state,        Shutdown)        => Some(state),

            (_,            Unregister)      => Some(Unregistered),
        }
    }

    pub fn is_registered(self) -> bool {
        self != SpanState::Unregistered
    }
}

impl Span {
    pub fn state(&self) -> SpanState {
        SpanState::from(self.state_cell().load(Ordering::Acquire))
    }

    fn transition(&self, event: LifecycleEvent) -> Option<(SpanState, SpanState)> {
        let mut before = SpanState::Unregistered;
        let mut after = SpanState::Unregistered;

        let result = self.state_cell().fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
            before = SpanState::from(raw);
            after = before.next(event)?;
            Some(after as u8)
        });

        result.ok().map(|_| (before, after))
    }

    /// Host accepted the span. Only valid once.
    pub(crate) fn mark_registered(&self) -> bool {
        self.transition(LifecycleEvent::Register).is_some()
    }

    pub(crate) fn mark_unregistered(&self) {
        let _ = self.transition(LifecycleEvent::Unregister);
    }

    /// Start the span. Starting a running span is a no-op.
    pub fn startup(&self) -> Result<()> {
        match self.transition(LifecycleEvent::Startup) {
            Some((before, after)) => {
                if before != after {
                    debug!(span = self.index() + 1, "span running");
                }
                Ok(())
            },
            None => Err(LoopError::NotRegistered(self.index())),
        }
    }

    /// Stop the span. Stopping a span that is not running is a no-op.
    pub fn shutdown(&self) {
        if let Some((SpanState::Running, SpanState::ShutDown)) = self.transition(LifecycleEvent::Shutdown) {
            debug!(span = self.index() + 1, "span shut down");
        }
    }
}

impl SpanBank {
    pub fn startup(&self, index: SpanIndex) -> Result<()> {
        self.span(index).ok_or(LoopError::NoSuchSpan(index))?.startup()
    }

    pub fn shutdown(&self, index: SpanIndex) -> Result<()> {
        self.span(index).ok_or(LoopError::NoSuchSpan(index))?.shutdown();
        Ok(())
    }
}
