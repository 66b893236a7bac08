//! Session driver.
//!
//! Owns a [`RoundMachine`] and performs the I/O its effects ask for: problem
//! fetches and evaluations run on spawned tasks, the exposure window runs on
//! an [`ExposureTimer`], and every completion comes back through a single
//! event channel. Only the task that owns the driver ever touches the
//! machine, so transitions never interleave.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::error::ModelError;
use crate::machine::{Action, Effect, Event, RoundMachine};
use crate::model::Phase;
use crate::reporter::PersistenceReporter;
use crate::scoring::ScoringGateway;
use crate::session::DEFAULT_TOTAL_ROUNDS;
use crate::timer::ExposureTimer;
use crate::traits::{Evaluator, ProblemSource, SessionStore};

/// Configuration for the session driver.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Rounds per session.
    pub total_rounds: u32,
    /// Extra attempts for a failed session save.
    pub save_retries: u32,
    /// Initial delay between save attempts.
    pub retry_delay: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            total_rounds: DEFAULT_TOTAL_ROUNDS,
            save_retries: 0,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// The remote collaborators a session talks to.
#[derive(Clone)]
pub struct Services {
    pub problems: Arc<dyn ProblemSource>,
    pub evaluator: Arc<dyn Evaluator>,
    pub store: Arc<dyn SessionStore>,
}

impl Services {
    /// Use one backend for all three roles.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: ProblemSource + Evaluator + SessionStore + 'static,
    {
        Self {
            problems: backend.clone(),
            evaluator: backend.clone(),
            store: backend,
        }
    }
}

/// Notified after every accepted transition.
pub trait SessionObserver: Send + Sync {
    fn on_transition(&self, machine: &RoundMachine);
}

/// Observer that ignores every transition.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {
    fn on_transition(&self, _: &RoundMachine) {}
}

/// Runs sessions against remote services.
pub struct SessionDriver {
    machine: RoundMachine,
    problems: Arc<dyn ProblemSource>,
    gateway: ScoringGateway,
    reporter: PersistenceReporter,
    timer: ExposureTimer<Event>,
    events_tx: UnboundedSender<Event>,
    events_rx: UnboundedReceiver<Event>,
    saves: Vec<JoinHandle<()>>,
    observer: Arc<dyn SessionObserver>,
}

impl SessionDriver {
    /// Must be called from within a Tokio runtime.
    pub fn new(services: Services, config: DriverConfig) -> Result<Self, ModelError> {
        let machine = RoundMachine::new(config.total_rounds)?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(Self {
            machine,
            problems: services.problems,
            gateway: ScoringGateway::new(services.evaluator),
            reporter: PersistenceReporter::new(services.store)
                .with_retries(config.save_retries, config.retry_delay),
            timer: ExposureTimer::new(events_tx.clone()),
            events_tx,
            events_rx,
            saves: Vec::new(),
            observer: Arc::new(NoopObserver),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn machine(&self) -> &RoundMachine {
        &self.machine
    }

    pub fn phase(&self) -> Phase {
        self.machine.phase()
    }

    /// Select a game, abandoning whatever session was in progress.
    pub fn open_game(&mut self, game_id: &str) {
        let revision = self.machine.revision();
        let effects = self.machine.open_game(game_id);
        self.execute(effects);
        self.notify(revision);
    }

    /// Apply a user action.
    pub fn dispatch(&mut self, action: Action) {
        let revision = self.machine.revision();
        let effects = self.machine.handle_action(action);
        self.execute(effects);
        self.notify(revision);
    }

    /// Apply a completion previously returned by [`Self::next_event`].
    pub fn apply(&mut self, event: Event) {
        let revision = self.machine.revision();
        let effects = self.machine.handle_event(event);
        self.execute(effects);
        self.notify(revision);
    }

    /// Wait for the next completion. Cancel-safe, so it can sit in a
    /// `tokio::select!` next to user input.
    pub async fn next_event(&mut self) -> Option<Event> {
        self.events_rx.recv().await
    }

    /// Apply completions until the machine waits on nothing but the user.
    pub async fn settle(&mut self) {
        while self.machine.is_awaiting() {
            match self.events_rx.recv().await {
                Some(event) => self.apply(event),
                None => break,
            }
        }
    }

    /// Wait for every background save to finish.
    pub async fn flush(&mut self) {
        for handle in self.saves.drain(..) {
            if let Err(e) = handle.await {
                tracing::warn!("save task aborted: {e}");
            }
        }
    }

    fn execute(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::FetchProblem { ticket, game_id } => {
                    let problems = Arc::clone(&self.problems);
                    let tx = self.events_tx.clone();
                    tokio::spawn(async move {
                        let outcome = problems.fetch_problem(&game_id).await;
                        let _ = tx.send(Event::ProblemFetched { ticket, outcome });
                    });
                }
                Effect::ArmTimer { ticket, duration } => {
                    self.timer.arm(duration, Event::ExposureElapsed { ticket });
                }
                Effect::CancelTimer => {
                    self.timer.cancel();
                }
                Effect::Evaluate {
                    ticket,
                    problem,
                    user_input,
                } => {
                    let gateway = self.gateway.clone();
                    let tx = self.events_tx.clone();
                    tokio::spawn(async move {
                        let score = gateway.evaluate(&problem, &user_input).await;
                        let _ = tx.send(Event::Scored { ticket, score });
                    });
                }
                Effect::Persist(summary) => {
                    self.saves.push(self.reporter.submit(summary));
                }
            }
        }
    }

    fn notify(&self, revision: u64) {
        if self.machine.revision() != revision {
            self.observer.on_transition(&self.machine);
        }
    }
}
