//! Round state machine.
//!
//! [`RoundMachine`] is the only owner of the active [`Session`] and its
//! phase. It performs no I/O: user [`Action`]s and asynchronous completions
//! ([`Event`]s) go in, and [`Effect`]s describing the I/O to start come out.
//! Every request carries a [`Ticket`], and a completion is accepted only if
//! its ticket is the one the current stage is waiting for. This is what
//! makes late timer callbacks and responses for an abandoned session inert.
//!
//! ```text
//! START ──begin──▶ MEMORIZE ──timer──▶ RECALL ──submit──▶ FEEDBACK
//!                     ▲                                      │
//!                     └──────────────next────────────────────┤
//!                                                            └─next (last round)─▶ FINISH
//! ```

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::ModelError;
use crate::model::{Feedback, Phase, Problem, RoundResult, SessionId};
use crate::session::{Session, SessionSummary};

/// Token attached to every asynchronous request the machine starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub session: SessionId,
    pub seq: u64,
}

/// Something the user did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Start the session (valid in `START`).
    Begin,
    /// Submit an answer (valid in `RECALL`).
    Submit(String),
    /// Move past feedback, or retry a round whose problem fetch failed.
    Next,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Begin => write!(f, "begin"),
            Action::Submit(_) => write!(f, "submit"),
            Action::Next => write!(f, "next"),
        }
    }
}

/// Completion of an asynchronous request.
#[derive(Debug)]
pub enum Event {
    ProblemFetched {
        ticket: Ticket,
        outcome: anyhow::Result<Problem>,
    },
    ExposureElapsed {
        ticket: Ticket,
    },
    Scored {
        ticket: Ticket,
        score: f64,
    },
}

impl Event {
    pub fn ticket(&self) -> Ticket {
        match self {
            Event::ProblemFetched { ticket, .. }
            | Event::ExposureElapsed { ticket }
            | Event::Scored { ticket, .. } => *ticket,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Event::ProblemFetched { .. } => "problem fetched",
            Event::ExposureElapsed { .. } => "exposure elapsed",
            Event::Scored { .. } => "scored",
        }
    }
}

/// I/O the caller must start on the machine's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Fetch a problem, then deliver [`Event::ProblemFetched`].
    FetchProblem { ticket: Ticket, game_id: String },
    /// Arm the exposure timer to deliver [`Event::ExposureElapsed`].
    ArmTimer { ticket: Ticket, duration: Duration },
    /// Cancel any pending exposure timer.
    CancelTimer,
    /// Score an answer, then deliver [`Event::Scored`].
    Evaluate {
        ticket: Ticket,
        problem: Problem,
        user_input: String,
    },
    /// Submit the finished session. Fire-and-forget.
    Persist(SessionSummary),
}

#[derive(Debug)]
enum Stage {
    Start,
    /// MEMORIZE, waiting for the problem.
    Fetching { ticket: Ticket },
    /// MEMORIZE, the last fetch failed; `Next` retries.
    Stalled { reason: String },
    /// MEMORIZE, stimulus visible until the timer fires.
    Exposing { ticket: Ticket, problem: Problem },
    /// RECALL, waiting for an answer.
    Recalling {
        problem: Problem,
        since: Instant,
    },
    /// RECALL, answer submitted and waiting for its score.
    Scoring {
        ticket: Ticket,
        problem: Problem,
        response: String,
        response_ms: u64,
    },
    Feedback { feedback: Feedback },
    Finish { summary: SessionSummary },
}

impl Stage {
    fn phase(&self) -> Phase {
        match self {
            Stage::Start => Phase::Start,
            Stage::Fetching { .. } | Stage::Stalled { .. } | Stage::Exposing { .. } => {
                Phase::Memorize
            }
            Stage::Recalling { .. } | Stage::Scoring { .. } => Phase::Recall,
            Stage::Feedback { .. } => Phase::Feedback,
            Stage::Finish { .. } => Phase::Finish,
        }
    }
}

/// The single source of truth for the active session and its phase.
pub struct RoundMachine {
    game_id: Option<String>,
    total_rounds: u32,
    session: Session,
    stage: Stage,
    next_seq: u64,
    revision: u64,
}

impl RoundMachine {
    /// Create a machine for sessions of `total_rounds` rounds.
    pub fn new(total_rounds: u32) -> Result<Self, ModelError> {
        Ok(Self {
            game_id: None,
            total_rounds,
            session: Session::new(total_rounds)?,
            stage: Stage::Start,
            next_seq: 0,
            revision: 0,
        })
    }

    pub fn phase(&self) -> Phase {
        self.stage.phase()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn game_id(&self) -> Option<&str> {
        self.game_id.as_deref()
    }

    pub fn total_rounds(&self) -> u32 {
        self.total_rounds
    }

    /// Incremented on every accepted transition.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// The problem of the round in play, while it is being shown or recalled.
    pub fn current_problem(&self) -> Option<&Problem> {
        match &self.stage {
            Stage::Exposing { problem, .. }
            | Stage::Recalling { problem, .. }
            | Stage::Scoring { problem, .. } => Some(problem),
            _ => None,
        }
    }

    /// The feedback tier and result of the last round, in `FEEDBACK`.
    pub fn feedback(&self) -> Option<(Feedback, &RoundResult)> {
        match &self.stage {
            Stage::Feedback { feedback } => self.session.results().last().map(|r| (*feedback, r)),
            _ => None,
        }
    }

    /// The final summary, available once `FINISH` is reached.
    pub fn summary(&self) -> Option<&SessionSummary> {
        match &self.stage {
            Stage::Finish { summary } => Some(summary),
            _ => None,
        }
    }

    /// Why the last problem fetch failed, while the round is stalled.
    pub fn stall_reason(&self) -> Option<&str> {
        match &self.stage {
            Stage::Stalled { reason } => Some(reason),
            _ => None,
        }
    }

    /// `true` while a fetch, the exposure timer or a score is outstanding.
    pub fn is_awaiting(&self) -> bool {
        matches!(
            self.stage,
            Stage::Fetching { .. } | Stage::Exposing { .. } | Stage::Scoring { .. }
        )
    }

    /// Select the game to play, discarding any session in progress.
    ///
    /// The phase returns to `START` under a fresh session identity, so
    /// completions still in flight for the old session are ignored.
    pub fn open_game(&mut self, game_id: &str) -> Vec<Effect> {
        if self.phase() != Phase::Start || self.game_id.is_some() {
            debug!(session = %self.session.id(), "abandoning session");
        }
        self.game_id = Some(game_id.to_string());
        self.reset();
        self.bump();
        vec![Effect::CancelTimer]
    }

    /// Apply a user action. Actions invalid for the current phase are
    /// silent no-ops.
    pub fn handle_action(&mut self, action: Action) -> Vec<Effect> {
        let stage = std::mem::replace(&mut self.stage, Stage::Start);
        let (stage, effects) = match (stage, action) {
            (Stage::Start, Action::Begin) => match self.game_id.clone() {
                Some(game_id) => {
                    self.reset();
                    self.begin_fetch(game_id)
                }
                None => {
                    debug!("begin ignored: no game selected");
                    (Stage::Start, Vec::new())
                }
            },

            (Stage::Stalled { .. }, Action::Next) => match self.game_id.clone() {
                Some(game_id) => self.begin_fetch(game_id),
                None => (Stage::Start, Vec::new()),
            },

            (Stage::Recalling { problem, since }, Action::Submit(input)) => {
                let response = input.trim().to_string();
                let response_ms = since.elapsed().as_millis() as u64;
                let ticket = self.issue();
                let effects = vec![Effect::Evaluate {
                    ticket,
                    problem: problem.clone(),
                    user_input: response.clone(),
                }];
                (
                    Stage::Scoring {
                        ticket,
                        problem,
                        response,
                        response_ms,
                    },
                    effects,
                )
            }

            (Stage::Feedback { .. }, Action::Next) => {
                if self.session.is_complete() {
                    let summary = self.session.summarize();
                    let effects = vec![Effect::Persist(summary.clone())];
                    (Stage::Finish { summary }, effects)
                } else {
                    match self.game_id.clone() {
                        Some(game_id) => self.begin_fetch(game_id),
                        None => (Stage::Start, Vec::new()),
                    }
                }
            }

            (stage, action) => {
                debug!(phase = %stage.phase(), "ignoring out-of-phase action: {action}");
                self.stage = stage;
                return Vec::new();
            }
        };

        self.stage = stage;
        self.bump();
        effects
    }

    /// Apply a completion. Completions whose ticket is not the one the
    /// current stage awaits are discarded.
    pub fn handle_event(&mut self, event: Event) -> Vec<Effect> {
        let stage = std::mem::replace(&mut self.stage, Stage::Start);
        let (stage, effects) = match (stage, event) {
            (
                Stage::Fetching { ticket },
                Event::ProblemFetched {
                    ticket: received,
                    outcome,
                },
            ) if ticket == received => {
                match outcome.and_then(|problem| {
                    problem.validate()?;
                    Ok(problem)
                }) {
                    Ok(problem) => {
                        let round = self.session.begin_round();
                        debug!(round, problem = %problem.name, "round started");
                        let ticket = self.issue();
                        let effects = vec![Effect::ArmTimer {
                            ticket,
                            duration: problem.exposure(),
                        }];
                        (Stage::Exposing { ticket, problem }, effects)
                    }
                    Err(e) => {
                        warn!(
                            round = self.session.current_round() + 1,
                            "failed to fetch problem: {e:#}"
                        );
                        (
                            Stage::Stalled {
                                reason: format!("{e:#}"),
                            },
                            Vec::new(),
                        )
                    }
                }
            }

            (Stage::Exposing { ticket, problem }, Event::ExposureElapsed { ticket: received })
                if ticket == received =>
            {
                (
                    Stage::Recalling {
                        problem,
                        since: Instant::now(),
                    },
                    Vec::new(),
                )
            }

            (
                Stage::Scoring {
                    ticket,
                    problem,
                    response,
                    response_ms,
                },
                Event::Scored {
                    ticket: received,
                    score,
                },
            ) if ticket == received => {
                let result = RoundResult::new(problem, response, response_ms, score);
                let feedback = Feedback::from_score(score);
                self.session.record_round(result);
                (Stage::Feedback { feedback }, Vec::new())
            }

            (stage, event) => {
                debug!(
                    phase = %stage.phase(),
                    ticket = ?event.ticket(),
                    "discarding stale {} event",
                    event.kind()
                );
                self.stage = stage;
                return Vec::new();
            }
        };

        self.stage = stage;
        self.bump();
        effects
    }

    fn begin_fetch(&mut self, game_id: String) -> (Stage, Vec<Effect>) {
        let ticket = self.issue();
        (
            Stage::Fetching { ticket },
            vec![Effect::FetchProblem { ticket, game_id }],
        )
    }

    /// Start over with an empty session under a new identity.
    fn reset(&mut self) {
        self.session = self.session.restarted();
        self.stage = Stage::Start;
    }

    fn issue(&mut self) -> Ticket {
        self.next_seq += 1;
        Ticket {
            session: self.session.id(),
            seq: self.next_seq,
        }
    }

    fn bump(&mut self) {
        self.revision += 1;
    }
}
