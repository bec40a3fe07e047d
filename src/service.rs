//! The candy service: intake, admission, worker pool, and feedback.
//!
//! ```text
//! submit ─▶ intake ─▶ gate (reorder + flavour scan) ─▶ ready ─▶ worker × N
//!                       ▲                                          │
//!                       └──────────────── feedback ◀───────────────┘
//! ```
//!
//! Intake and feedback are unbounded channels, each drained by a single task.
//! The gate and the ready queue are monitors. A flavour goes in flight when
//! the gate admits a candy of it, and comes back only when the feedback task
//! consumes that candy's completion signal, whether the eat succeeded or not.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use opentelemetry::KeyValue;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use crate::config::ServiceConfig;
use crate::eater::CandyEater;
use crate::error::{Error, Result};
use crate::event::{Event, EventBus, EventKind};
use crate::gate::{AdmissionGate, GateSnapshot};
use crate::model::{Candy, CandyId, Flavour, FlavourState, Outcome};
use crate::sync::WaitQueue;
use crate::telemetry::candy::{record_flavour_transition, start_eat_span};
use crate::telemetry::metrics;

/// A submitted candy with its id and flavour, as it travels the pipeline.
struct Ticket<C> {
    id: CandyId,
    flavour: Flavour,
    candy: C,
}

impl<C: Candy> Ticket<C> {
    fn new(candy: C) -> Self {
        Self {
            id: CandyId::new(),
            flavour: candy.flavour(),
            candy,
        }
    }
}

impl<C: Candy> Candy for Ticket<C> {
    fn flavour(&self) -> Flavour {
        self.flavour
    }
}

/// Completion signal sent from a worker to the feedback task.
#[derive(Debug)]
struct Completion {
    id: CandyId,
    flavour: Flavour,
    worker: usize,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    admitted: AtomicU64,
    eaten: AtomicU64,
    failed: AtomicU64,
    released: AtomicU64,
}

/// State shared by every pipeline task.
struct Shared<C> {
    gate: AdmissionGate<Ticket<C>>,
    ready: WaitQueue<Ticket<C>>,
    events: EventBus,
    counters: Counters,
}

/// Point-in-time counters for a running service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceStats {
    pub submitted: u64,
    pub admitted: u64,
    /// Eat calls that returned `Ok`.
    pub eaten: u64,
    /// Eat calls that returned `Err` or panicked.
    pub failed: u64,
    /// Completion signals consumed by the feedback task.
    pub released: u64,
    /// Candies still in the pending buffer.
    pub pending: usize,
    /// Admitted candies waiting for a free worker.
    pub ready: usize,
    /// Flavours admitted and not yet released, ascending.
    pub in_flight: Vec<Flavour>,
}

impl ServiceStats {
    /// Eat calls that have finished, successfully or not.
    pub fn finished(&self) -> u64 {
        self.eaten + self.failed
    }
}

/// Flavour-aware scheduler over a fixed pool of eaters.
///
/// Candies of the same flavour are never eaten concurrently and are admitted
/// in submission order; candies of different flavours run in parallel.
pub struct CandyService<C: Candy> {
    intake: mpsc::UnboundedSender<Ticket<C>>,
    shared: Arc<Shared<C>>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    eaters: usize,
}

impl<C: Candy> CandyService<C> {
    /// Start a service with one worker per eater and the default config.
    pub fn new<E: CandyEater<C>>(eaters: impl IntoIterator<Item = E>) -> Result<Self> {
        Self::with_config(eaters, ServiceConfig::default())
    }

    /// Start a service with one worker per eater.
    ///
    /// # Errors
    ///
    /// [`Error::NoEaters`] if `eaters` is empty; [`Error::Config`] if
    /// `config` fails [`ServiceConfig::validate`]; [`Error::Other`] when
    /// called outside a Tokio runtime.
    pub fn with_config<E: CandyEater<C>>(
        eaters: impl IntoIterator<Item = E>,
        config: ServiceConfig,
    ) -> Result<Self> {
        let eaters: Vec<Arc<E>> = eaters.into_iter().map(Arc::new).collect();
        if eaters.is_empty() {
            return Err(Error::NoEaters);
        }
        config.validate()?;
        let runtime = Handle::try_current()
            .map_err(|e| Error::Other(format!("candy service needs a tokio runtime: {e}")))?;

        let shared = Arc::new(Shared {
            gate: AdmissionGate::new(config.reorder),
            ready: WaitQueue::new(),
            events: EventBus::new(config.event_capacity),
            counters: Counters::default(),
        });
        let shutdown = CancellationToken::new();
        let (intake_tx, intake_rx) = mpsc::unbounded_channel();
        let (feedback_tx, feedback_rx) = mpsc::unbounded_channel();

        let count = eaters.len();
        let mut tasks = Vec::with_capacity(count + 3);
        tasks.push(runtime.spawn(intake_loop(
            Arc::clone(&shared),
            intake_rx,
            shutdown.clone(),
        )));
        tasks.push(runtime.spawn(admission_loop(Arc::clone(&shared), shutdown.clone())));
        for (worker, eater) in eaters.into_iter().enumerate() {
            tasks.push(runtime.spawn(worker_loop(
                worker,
                eater,
                Arc::clone(&shared),
                feedback_tx.clone(),
                shutdown.clone(),
            )));
        }
        tasks.push(runtime.spawn(feedback_loop(
            Arc::clone(&shared),
            feedback_rx,
            shutdown.clone(),
        )));

        info!(eaters = count, reorder = %config.reorder, "candy service started");

        Ok(Self {
            intake: intake_tx,
            shared,
            shutdown,
            tasks,
            eaters: count,
        })
    }

    /// Hand a candy to the service. Never blocks and never reports back.
    ///
    /// After shutdown the candy is dropped.
    pub fn submit(&self, candy: C) {
        let ticket = Ticket::new(candy);
        let (id, flavour) = (ticket.id, ticket.flavour);

        if self.shutdown.is_cancelled() {
            debug!(%id, %flavour, "service stopped, candy dropped");
            return;
        }

        // Counted and announced before the send so the submitted event
        // always precedes the admitted one.
        self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
        metrics::candies_submitted().add(1, &[]);
        self.shared
            .events
            .emit(EventKind::CandySubmitted { id, flavour });

        if self.intake.send(ticket).is_err() {
            debug!(%id, %flavour, "intake closed, candy dropped");
            return;
        }
        debug!(%id, %flavour, "candy submitted");
    }

    /// Subscribe to lifecycle events from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.shared.events.subscribe()
    }

    pub fn stats(&self) -> ServiceStats {
        let counters = &self.shared.counters;
        let snapshot = self.shared.gate.snapshot();
        ServiceStats {
            submitted: counters.submitted.load(Ordering::Relaxed),
            admitted: counters.admitted.load(Ordering::Relaxed),
            eaten: counters.eaten.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            released: counters.released.load(Ordering::Relaxed),
            pending: snapshot.pending.len(),
            ready: self.shared.ready.len(),
            in_flight: snapshot.in_flight,
        }
    }

    /// The gate's pending buffer and flavour table as they are right now.
    pub fn gate_snapshot(&self) -> GateSnapshot {
        self.shared.gate.snapshot()
    }

    /// Number of eaters, and so of workers.
    pub fn eaters(&self) -> usize {
        self.eaters
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stop every task and wait for them to exit.
    ///
    /// Eat calls still running are abandoned; pending candies are discarded.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await
                && e.is_panic()
            {
                warn!(error = %e, "pipeline task panicked");
            }
        }
        let stats = self.stats();
        info!(
            submitted = stats.submitted,
            finished = stats.finished(),
            discarded = stats.pending + stats.ready,
            "candy service stopped"
        );
    }
}

impl<C: Candy> Drop for CandyService<C> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// ---------------------------------------------------------------------------
// Pipeline tasks
// ---------------------------------------------------------------------------

/// Moves submitted candies into the gate's pending buffer, one at a time.
async fn intake_loop<C: Candy>(
    shared: Arc<Shared<C>>,
    mut intake: mpsc::UnboundedReceiver<Ticket<C>>,
    shutdown: CancellationToken,
) {
    loop {
        let ticket = tokio::select! {
            ticket = intake.recv() => match ticket {
                Some(ticket) => ticket,
                None => break,
            },
            _ = shutdown.cancelled() => break,
        };
        shared.gate.offer(ticket);
    }
    debug!("intake stopped");
}

/// Admits candies through the flavour gate into the ready queue.
async fn admission_loop<C: Candy>(shared: Arc<Shared<C>>, shutdown: CancellationToken) {
    let span = tracing::debug_span!("candy.admission");
    while let Some(ticket) = shared.gate.admit_next(&shutdown).await {
        let (id, flavour) = (ticket.id, ticket.flavour);
        record_flavour_transition(&span, flavour, FlavourState::Idle, FlavourState::InFlight);

        shared.counters.admitted.fetch_add(1, Ordering::Relaxed);
        metrics::candies_admitted().add(1, &[]);
        shared.events.emit(EventKind::CandyAdmitted { id, flavour });

        shared.ready.push(ticket);
    }
    debug!("admission stopped");
}

/// One worker: pull a ready candy, eat it, report completion. Forever.
async fn worker_loop<C, E>(
    worker: usize,
    eater: Arc<E>,
    shared: Arc<Shared<C>>,
    feedback: mpsc::UnboundedSender<Completion>,
    shutdown: CancellationToken,
) where
    C: Candy,
    E: CandyEater<C>,
{
    debug!(worker, "worker started");
    while let Some(ticket) = shared.ready.pop(&shutdown).await {
        let Ticket { id, flavour, candy } = ticket;
        let span = start_eat_span(worker, flavour, id);
        shared
            .events
            .emit(EventKind::CandyEating { id, flavour, worker });

        // Eat on a task of its own: a panicking eater fails the candy, not
        // the worker.
        let started = Instant::now();
        let mut eating = {
            let eater = Arc::clone(&eater);
            tokio::spawn(async move { eater.eat(candy).await }.instrument(span.clone()))
        };
        let joined = tokio::select! {
            joined = &mut eating => joined,
            _ = shutdown.cancelled() => {
                eating.abort();
                break;
            }
        };

        let outcome = Outcome {
            success: matches!(joined, Ok(Ok(()))),
            duration_ms: started.elapsed().as_millis() as u64,
        };
        span.record("candy.outcome", outcome.result_label());

        let counter = if outcome.success {
            &shared.counters.eaten
        } else {
            &shared.counters.failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
        let labels = [KeyValue::new("result", outcome.result_label())];
        metrics::candies_eaten().add(1, &labels);
        metrics::eat_duration_ms().record(outcome.duration_ms as f64, &labels);
        shared.events.emit(EventKind::CandyEaten {
            id,
            flavour,
            worker,
            outcome,
        });
        debug!(
            worker,
            %id,
            %flavour,
            success = outcome.success,
            duration_ms = outcome.duration_ms,
            "candy eaten"
        );

        if feedback.send(Completion { id, flavour, worker }).is_err() {
            break;
        }
    }
    debug!(worker, "worker stopped");
}

/// Releases flavours as completion signals arrive.
async fn feedback_loop<C: Candy>(
    shared: Arc<Shared<C>>,
    mut feedback: mpsc::UnboundedReceiver<Completion>,
    shutdown: CancellationToken,
) {
    let span = tracing::debug_span!("candy.feedback");
    loop {
        let completion = tokio::select! {
            completion = feedback.recv() => match completion {
                Some(completion) => completion,
                None => break,
            },
            _ = shutdown.cancelled() => break,
        };
        let Completion {
            id,
            flavour,
            worker,
        } = completion;

        // Only this task releases flavours, so an in-flight flavour stays in
        // flight until the release below. Announce first: once released, the
        // admission task may emit the next candy of this flavour.
        let state = shared.gate.flavour_state(flavour);
        if state != FlavourState::InFlight {
            warn!(%id, worker, %flavour, %state, "completion for a flavour not in flight");
            continue;
        }
        record_flavour_transition(&span, flavour, FlavourState::InFlight, FlavourState::Idle);
        shared.events.emit(EventKind::FlavourReleased { flavour });

        if let Err(e) = shared.gate.release(flavour) {
            warn!(%id, worker, error = %e, "flavour release rejected");
            continue;
        }
        metrics::flavours_released().add(1, &[]);
        shared.counters.released.fetch_add(1, Ordering::Relaxed);
    }
    debug!("feedback stopped");
}
