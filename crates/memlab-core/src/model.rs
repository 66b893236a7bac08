//! Core data model types for memlab.
//!
//! These are the values that flow between the state machine, the remote
//! services and the session aggregator.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ModelError;

/// Score at or above which a round counts as correct.
pub const CORRECT_THRESHOLD: f64 = 1.0;

/// Score above which an incorrect round is reported as "almost".
pub const ALMOST_THRESHOLD: f64 = 0.7;

/// Returns `true` if `score` counts toward the session's correct count.
pub fn is_correct(score: f64) -> bool {
    score >= CORRECT_THRESHOLD
}

/// A stimulus to memorize and the question asked about it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    /// Display name of the game that produced this problem.
    pub name: String,
    /// Content shown during the exposure window.
    pub memorize: String,
    /// Question shown during recall.
    pub prompt: String,
    /// Canonical answer.
    pub solution: String,
    /// Exposure window in milliseconds.
    pub exposure_ms: u64,
    /// Layout hint ("matrix", single line, ...).
    #[serde(default)]
    pub problem_type: String,
}

impl Problem {
    /// Check the field constraints every fetched problem must satisfy.
    pub fn validate(&self) -> Result<(), ModelError> {
        let fields = [
            ("name", &self.name),
            ("memorize", &self.memorize),
            ("prompt", &self.prompt),
            ("solution", &self.solution),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(ModelError::BlankField(field));
            }
        }
        if self.exposure_ms == 0 {
            return Err(ModelError::NonPositiveExposure);
        }
        Ok(())
    }

    /// The exposure window as a [`Duration`].
    pub fn exposure(&self) -> Duration {
        Duration::from_millis(self.exposure_ms)
    }
}

/// One evaluated attempt. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResult {
    /// The problem this round answered.
    pub problem: Problem,
    /// The user's answer, trimmed.
    pub response: String,
    /// Time spent in the recall phase, in milliseconds.
    pub response_ms: u64,
    /// Evaluator score, nominally in `[0.0, 1.0]`.
    pub score: f64,
    /// `score >= 1.0`, kept in the serialized form for older readers.
    pub correct: bool,
}

impl RoundResult {
    pub fn new(problem: Problem, response: String, response_ms: u64, score: f64) -> Self {
        Self {
            problem,
            response,
            response_ms,
            score,
            correct: is_correct(score),
        }
    }
}

/// The phase a round is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    Start,
    Memorize,
    Recall,
    Feedback,
    Finish,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Start => write!(f, "START"),
            Phase::Memorize => write!(f, "MEMORIZE"),
            Phase::Recall => write!(f, "RECALL"),
            Phase::Feedback => write!(f, "FEEDBACK"),
            Phase::Finish => write!(f, "FINISH"),
        }
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "START" => Ok(Phase::Start),
            "MEMORIZE" => Ok(Phase::Memorize),
            "RECALL" => Ok(Phase::Recall),
            "FEEDBACK" => Ok(Phase::Feedback),
            "FINISH" => Ok(Phase::Finish),
            other => Err(format!("unknown phase: {other}")),
        }
    }
}

/// Feedback tier shown after a round is scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Correct,
    Almost,
    Incorrect,
}

impl Feedback {
    pub fn from_score(score: f64) -> Self {
        if is_correct(score) {
            Feedback::Correct
        } else if score > ALMOST_THRESHOLD {
            Feedback::Almost
        } else {
            Feedback::Incorrect
        }
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feedback::Correct => write!(f, "Correct!"),
            Feedback::Almost => write!(f, "Almost!"),
            Feedback::Incorrect => write!(f, "Incorrect"),
        }
    }
}

/// A game offered by the problem service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    /// Identifier passed to the problem endpoint.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Generator class on the server side.
    #[serde(default)]
    pub class: String,
}

/// Identity of one session. A new one is minted whenever a session starts
/// or a game is opened, so responses addressed to an older session can be
/// recognized and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
pub(crate) fn sample_problem(solution: &str) -> Problem {
    Problem {
        name: "Capital Cities".into(),
        memorize: format!("The capital is {solution}"),
        prompt: "What is the capital?".into(),
        solution: solution.into(),
        exposure_ms: 1500,
        problem_type: String::new(),
    }
}
