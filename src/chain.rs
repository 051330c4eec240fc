//! Request chains and their generation tracking
//!
//! A chain is the unit of work created by one `send()`: the first attempt and
//! every retry until `finish()` or `clear()`. The [`ChainTracker`] keeps at
//! most one live chain and hands out a fresh generation for each new one, so
//! asynchronous callbacks can tell whether the chain they belong to is still
//! the current one.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::descriptor::Descriptor;
use crate::error::ControllerError;
use crate::scheduler::Timer;

/// Identifier of a chain, unique per controller and strictly increasing
pub type Generation = u64;

/// Report delivered when a chain finishes successfully
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finished {
    pub generation: Generation,
    pub url: String,
    pub created_at: i64,
    /// Transport calls made by the chain, successful or not
    pub attempts: u32,
    /// Result of the last successful transport call, if any
    pub response: Option<Value>,
}

pub(crate) type Outcome = Result<Finished, ControllerError>;

/// Where a chain currently stands
#[derive(Debug)]
pub(crate) enum Phase {
    /// A timer is armed for the next attempt
    Scheduled(Timer),
    /// The transport call is running
    InFlight,
    /// The last call succeeded and the chain waits for a continuation decision
    Awaiting,
}

#[derive(Debug)]
pub(crate) struct Chain {
    pub generation: Generation,
    pub descriptor: Descriptor,
    pub failures: u32,
    pub attempts: u32,
    pub response: Option<Value>,
    pub phase: Phase,
    done: Option<oneshot::Sender<Outcome>>,
}

impl Chain {
    pub fn url(&self) -> &str {
        &self.descriptor.request.url
    }

    /// Arms the next attempt, cancelling a timer that is still pending
    pub fn arm(&mut self, timer: Timer) {
        if let Phase::Scheduled(previous) = std::mem::replace(&mut self.phase, Phase::Scheduled(timer)) {
            previous.cancel();
        }
    }

    /// Stops the pending timer, if any
    pub fn disarm(&mut self) {
        match std::mem::replace(&mut self.phase, Phase::Awaiting) {
            Phase::Scheduled(timer) => timer.cancel(),
            other => self.phase = other,
        }
    }

    /// Consumes the chain and delivers its outcome to the waiting caller
    pub fn complete(mut self, outcome: Outcome) {
        self.disarm();
        if let Some(done) = self.done.take() {
            // The caller may have stopped waiting
            let _ = done.send(outcome);
        }
    }

    pub fn finished(&self) -> Finished {
        Finished {
            generation: self.generation,
            url: self.url().to_string(),
            created_at: self.descriptor.created_at,
            attempts: self.attempts,
            response: self.response.clone(),
        }
    }
}

/// Owner of the single live chain of a controller
#[derive(Debug, Default)]
pub(crate) struct ChainTracker {
    last_generation: Generation,
    live: Option<Chain>,
}

impl ChainTracker {
    /// Starts a new chain and returns the one it replaces, if any
    ///
    /// The replaced chain is returned still intact so the caller can log and
    /// complete it; its generation is already stale when this returns.
    pub fn begin(
        &mut self,
        descriptor: Descriptor,
        done: oneshot::Sender<Outcome>,
    ) -> (Generation, Option<Chain>) {
        self.last_generation += 1;
        let generation = self.last_generation;

        let previous = self.live.replace(Chain {
            generation,
            descriptor,
            failures: 0,
            attempts: 0,
            response: None,
            phase: Phase::Awaiting,
            done: Some(done),
        });

        (generation, previous)
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.live.as_ref().map(|c| c.generation) == Some(generation)
    }

    /// Live chain, provided it still belongs to `generation`
    pub fn current(&mut self, generation: Generation) -> Option<&mut Chain> {
        self.live.as_mut().filter(|c| c.generation == generation)
    }

    pub fn live(&mut self) -> Option<&mut Chain> {
        self.live.as_mut()
    }

    /// Ends the live chain if it belongs to `generation`
    pub fn invalidate(&mut self, generation: Generation) -> Option<Chain> {
        if self.is_current(generation) {
            self.live.take()
        } else {
            None
        }
    }

    /// Ends whatever chain is live
    pub fn take(&mut self) -> Option<Chain> {
        self.live.take()
    }
}
