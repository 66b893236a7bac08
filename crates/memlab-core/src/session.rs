//! Session aggregation: round results, the rolling correct count and the
//! end-of-session summary.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::model::{RoundResult, SessionId};

/// Default number of rounds in a session.
pub const DEFAULT_TOTAL_ROUNDS: u32 = 10;

/// An in-progress or finished quiz run.
///
/// Only the round state machine mutates a session; everything else sees it
/// through shared references or a [`SessionSummary`] copy.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    started_at: DateTime<Utc>,
    total_rounds: u32,
    current_round: u32,
    correct_count: u32,
    results: Vec<RoundResult>,
}

impl Session {
    pub fn new(total_rounds: u32) -> Result<Self, ModelError> {
        if total_rounds == 0 {
            return Err(ModelError::InvalidRoundCount(total_rounds));
        }
        Ok(Self {
            id: SessionId::new(),
            started_at: Utc::now(),
            total_rounds,
            current_round: 0,
            correct_count: 0,
            results: Vec::new(),
        })
    }

    /// An empty session with the same round count and a new identity.
    pub(crate) fn restarted(&self) -> Self {
        Self {
            id: SessionId::new(),
            started_at: Utc::now(),
            total_rounds: self.total_rounds,
            current_round: 0,
            correct_count: 0,
            results: Vec::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn total_rounds(&self) -> u32 {
        self.total_rounds
    }

    /// 1-based index of the round in play, 0 before the first problem arrives.
    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    pub fn results(&self) -> &[RoundResult] {
        &self.results
    }

    /// `true` once the configured number of rounds has been started.
    pub fn is_complete(&self) -> bool {
        self.current_round >= self.total_rounds
    }

    /// Advance the round counter after a problem has been fetched.
    pub(crate) fn begin_round(&mut self) -> u32 {
        debug_assert_eq!(self.results.len() as u32, self.current_round);
        self.current_round += 1;
        self.current_round
    }

    /// Append the result of the round in play.
    ///
    /// Must be called exactly once per round; the state machine's phase
    /// gating is what guarantees it.
    pub(crate) fn record_round(&mut self, result: RoundResult) {
        debug_assert_eq!(self.results.len() as u32 + 1, self.current_round);
        if result.correct {
            self.correct_count += 1;
        }
        self.results.push(result);
    }

    /// Snapshot the session into its final summary.
    pub fn summarize(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id,
            started_at: self.started_at,
            total_rounds: self.total_rounds,
            correct_count: self.correct_count,
            score_percentage: score_percentage(self.correct_count, self.total_rounds),
            results: self.results.clone(),
        }
    }
}

/// `round(correct / total * 100)`, 0 for an empty session.
pub fn score_percentage(correct: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    (correct as f64 / total as f64 * 100.0).round() as u32
}

/// The outcome of a finished session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub started_at: DateTime<Utc>,
    pub total_rounds: u32,
    pub correct_count: u32,
    /// `round(correct_count / total_rounds * 100)`.
    pub score_percentage: u32,
    pub results: Vec<RoundResult>,
}

/// Correct/total counts for one problem name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProblemStats {
    pub correct: u32,
    pub total: u32,
}

impl ProblemStats {
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64 * 100.0
        }
    }
}

impl SessionSummary {
    /// Mean score over the recorded rounds, partial credit included.
    pub fn average_score(&self) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        self.results.iter().map(|r| r.score).sum::<f64>() / self.results.len() as f64
    }

    /// Per-problem-name breakdown, sorted by name.
    pub fn by_problem(&self) -> BTreeMap<String, ProblemStats> {
        let mut stats: BTreeMap<String, ProblemStats> = BTreeMap::new();
        for result in &self.results {
            let entry = stats.entry(result.problem.name.clone()).or_default();
            entry.total += 1;
            if result.correct {
                entry.correct += 1;
            }
        }
        stats
    }
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Training session completed!")?;
        if self.results.is_empty() {
            return write!(f, "No questions answered.");
        }
        write!(
            f,
            "Final score: {}/{} correct answers ({}%)\nAverage score: {:.2}",
            self.correct_count,
            self.total_rounds,
            self.score_percentage,
            self.average_score()
        )?;

        // The breakdown only says something when several games were mixed.
        let stats = self.by_problem();
        if stats.len() > 1 {
            let width = stats.keys().map(|name| name.len()).max().unwrap_or(0);
            write!(f, "\n\nResults by problem type:")?;
            for (name, s) in &stats {
                write!(
                    f,
                    "\n  {name:<width$} : {:2}/{:2} ({:5.1}%)",
                    s.correct,
                    s.total,
                    s.percentage()
                )?;
            }
        }
        Ok(())
    }
}
