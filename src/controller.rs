//! Request controller: scheduling, retries and the continuation protocol
//!
//! A [`RequestController`] drives one logical endpoint. Every `send()` starts
//! a new chain (cancelling the previous one), waits, dispatches the request
//! through the [`Transport`] and then either:
//!
//! - backs off and tries again when the transport fails, or
//! - asks the chain's continuation whether to retry, finish or wait when the
//!   transport succeeds.
//!
//! All asynchronous callbacks compare their generation with the live chain
//! before touching any state, so results of cancelled or superseded chains are
//! dropped without a trace.

use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::chain::{Chain, ChainTracker, Finished, Generation, Outcome, Phase};
use crate::clock::{Clock, SystemClock};
use crate::descriptor::build;
use crate::error::{ControllerError, Result};
use crate::http::Transport;
use crate::options::{Continuation, InstanceConfig, RequestOptions, SendOverrides};
use crate::retry::BackoffPolicy;
use crate::scheduler::{schedule, Timer};

/// Produces request controllers sharing one transport and one clock
///
/// # Examples
///
/// ```no_run
/// use pingback::controller::RequestFactory;
/// use pingback::http::HttpTransport;
/// use pingback::options::{InstanceConfig, RequestOptions};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn example() -> anyhow::Result<()> {
/// let transport = HttpTransport::new("https://collector.example.com", Duration::from_secs(5))?;
/// let factory = RequestFactory::new(Arc::new(transport));
///
/// let session = factory.create(InstanceConfig::new(
///     RequestOptions::new().with_url("/session").with_param("app_token", "abc"),
/// ));
///
/// let finished = session.send(RequestOptions::new()).await?;
/// println!("finished after {} attempts", finished.attempts);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RequestFactory {
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
}

impl RequestFactory {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the source of chain timestamps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Creates a controller with its own chain state
    pub fn create(&self, config: InstanceConfig) -> RequestController {
        RequestController {
            shared: Arc::new(Shared {
                defaults: config.defaults,
                backoff: config.backoff,
                transport: Arc::clone(&self.transport),
                clock: Arc::clone(&self.clock),
                chains: Mutex::new(ChainTracker::default()),
            }),
        }
    }
}

struct Shared {
    defaults: RequestOptions,
    backoff: BackoffPolicy,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    chains: Mutex<ChainTracker>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ChainTracker> {
        // Callbacks never panic while holding the lock, so poisoned state is still consistent
        self.chains.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scheduling and retry engine for one logical endpoint
///
/// Cloning yields another handle to the same controller, which is how a
/// continuation or another task reaches `retry()`, `finish()` and `clear()`.
/// Timers only hold weak references: once every handle is dropped, pending
/// chains end with [`ControllerError::ControllerDropped`].
///
/// Drive a controller from a current-thread runtime. Every callback checks the
/// chain generation under the lock, but a continuation runs unlocked, so on a
/// multi-thread runtime a `send()` or `clear()` racing with a successful
/// response may still see the superseded chain's continuation invoked. Its
/// decision is discarded either way.
#[derive(Clone)]
pub struct RequestController {
    shared: Arc<Shared>,
}

impl RequestController {
    /// Starts a new chain, cancelling the live one first
    ///
    /// Returns immediately. The returned [`Completion`] resolves once the chain
    /// finishes or ends otherwise; it is already resolved with
    /// [`ControllerError::MissingUrl`] when no url can be resolved, in which
    /// case the live chain, if any, is left untouched.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Arguments
    /// * `overrides` - Options for this chain only; pass `RequestOptions::new()` for none
    ///
    /// # Returns
    /// * `Completion` - Future of the chain outcome
    pub fn send(&self, overrides: SendOverrides) -> Completion {
        let descriptor = match build(&self.shared.defaults, &overrides, self.shared.clock.as_ref()) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                error!("{}", err);
                return Completion::ready(Err(err));
            }
        };

        let (done, rx) = oneshot::channel();
        let wait = descriptor.wait;

        let mut chains = self.shared.lock();
        let (generation, previous) = chains.begin(descriptor, done);
        if let Some(previous) = previous {
            cancel(previous, |url| ControllerError::Superseded { url });
        }

        if let Some(chain) = chains.current(generation) {
            info!("Trying request {} in {}ms", chain.url(), wait.as_millis());
            chain.arm(self.arm(generation, wait));
        }

        Completion { rx }
    }

    /// Re-dispatches the current chain after exactly `wait`
    ///
    /// Only valid while the chain waits for a continuation decision, i.e. from
    /// within a continuation or after one returned [`Continuation::Pending`].
    /// The chain keeps its generation, request and `createdAt`.
    pub fn retry(&self, wait: Duration) -> Result<()> {
        let mut chains = self.shared.lock();
        let chain = chains
            .live()
            .filter(|chain| matches!(chain.phase, Phase::Awaiting))
            .ok_or(ControllerError::NotAwaitingContinuation)?;

        info!("Re-trying request {} in {}ms", chain.url(), wait.as_millis());
        let generation = chain.generation;
        chain.arm(self.arm(generation, wait));
        Ok(())
    }

    /// Ends the current chain successfully
    ///
    /// Returns false when there was no chain to finish.
    pub fn finish(&self) -> bool {
        match self.shared.lock().take() {
            Some(chain) => {
                finish(chain);
                true
            }
            None => false,
        }
    }

    /// Cancels the current chain
    ///
    /// A pending timer is stopped. A transport call already in flight is left
    /// to complete but its result is discarded. Returns false when there was
    /// no chain to cancel.
    pub fn clear(&self) -> bool {
        match self.shared.lock().take() {
            Some(chain) => {
                cancel(chain, |url| ControllerError::Cancelled { url });
                true
            }
            None => false,
        }
    }

    /// Generation of the live chain, if any
    pub fn current_generation(&self) -> Option<Generation> {
        self.shared.lock().live().map(|chain| chain.generation)
    }

    /// True while a chain is live
    pub fn is_active(&self) -> bool {
        self.current_generation().is_some()
    }

    fn arm(&self, generation: Generation, delay: Duration) -> Timer {
        let shared = Arc::downgrade(&self.shared);
        schedule(delay, async move {
            if let Some(shared) = shared.upgrade() {
                RequestController { shared }.attempt(generation).await;
            }
        })
    }

    async fn attempt(self, generation: Generation) {
        let request = {
            let mut chains = self.shared.lock();
            let Some(chain) = chains.current(generation) else {
                return;
            };
            match std::mem::replace(&mut chain.phase, Phase::InFlight) {
                Phase::Scheduled(timer) => timer.detach(),
                other => {
                    chain.phase = other;
                    return;
                }
            }
            chain.attempts += 1;
            chain.descriptor.request.clone()
        };

        match self.shared.transport.send(request).await {
            Ok(response) => self.on_success(generation, response),
            Err(err) => self.on_failure(generation, err),
        }
    }

    fn on_success(&self, generation: Generation, response: Value) {
        let continuation = {
            let mut chains = self.shared.lock();
            let Some(chain) = chains.current(generation) else {
                return;
            };
            chain.failures = 0;
            chain.phase = Phase::Awaiting;
            chain.response = Some(response.clone());
            Arc::clone(&chain.descriptor.continuation)
        };

        // Unlocked: the continuation may call back into this controller
        let decision = continuation(&response);

        let mut chains = self.shared.lock();
        let Some(chain) = chains
            .current(generation)
            .filter(|chain| matches!(chain.phase, Phase::Awaiting))
        else {
            // Already retried, finished or cleared from inside the continuation
            return;
        };

        match decision {
            Continuation::Retry(wait) => {
                info!("Re-trying request {} in {}ms", chain.url(), wait.as_millis());
                chain.arm(self.arm(generation, wait));
            }
            Continuation::Finish => {
                if let Some(chain) = chains.invalidate(generation) {
                    finish(chain);
                }
            }
            Continuation::Pending => {
                debug!("Request {} is waiting for a continuation decision", chain.url());
            }
        }
    }

    fn on_failure(&self, generation: Generation, err: anyhow::Error) {
        let mut chains = self.shared.lock();
        let Some(chain) = chains.current(generation) else {
            return;
        };

        chain.failures += 1;
        chain.phase = Phase::Awaiting;
        let failures = chain.failures;
        debug!("Request {} failed ({} in a row): {:#}", chain.url(), failures, err);

        if self.shared.backoff.allows_retry(failures) {
            let wait = self.shared.backoff.next_failure_wait(failures);
            info!("Re-trying request {} in {}ms", chain.url(), wait.as_millis());
            chain.arm(self.arm(generation, wait));
            return;
        }

        if let Some(chain) = chains.invalidate(generation) {
            let url = chain.url().to_string();
            warn!("Request {} gave up after {} consecutive failures", url, failures);
            chain.complete(Err(ControllerError::AttemptsExhausted {
                url,
                failures,
                last_error: format!("{:#}", err),
            }));
        }
    }
}

fn finish(chain: Chain) {
    info!("Request {} has been finished", chain.url());
    let report = chain.finished();
    chain.complete(Ok(report));
}

fn cancel(chain: Chain, reason: fn(String) -> ControllerError) {
    info!("Previous {} request attempt canceled", chain.url());
    let err = reason(chain.url().to_string());
    chain.complete(Err(err));
}

/// Outcome of a chain started by [`RequestController::send`]
///
/// Dropping it does not affect the chain.
#[derive(Debug)]
pub struct Completion {
    rx: oneshot::Receiver<Outcome>,
}

impl Completion {
    fn ready(outcome: Outcome) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(outcome);
        Self { rx }
    }
}

impl Future for Completion {
    type Output = Result<Finished>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(ControllerError::ControllerDropped)))
    }
}
