//! Trait definitions for the remote services a session depends on.
//!
//! These async traits are implemented by `memlab-remote` (HTTP and mock
//! backends). The core never looks inside their errors: a failed fetch
//! aborts the round, a failed evaluation falls back to local scoring and a
//! failed save is logged.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Problem, RoundResult};
use crate::session::SessionSummary;

// ---------------------------------------------------------------------------
// Problem source
// ---------------------------------------------------------------------------

/// Supplies problems for a game.
#[async_trait]
pub trait ProblemSource: Send + Sync {
    /// Fetch a fresh problem for `game_id`.
    async fn fetch_problem(&self, game_id: &str) -> anyhow::Result<Problem>;
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

/// Scores a free-text answer against a problem's solution.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Return a score, nominally in `[0.0, 1.0]`.
    async fn evaluate(&self, request: &EvaluateRequest) -> anyhow::Result<f64>;
}

/// Body of an evaluation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluateRequest {
    /// The problem being answered, sent back in full.
    pub problem: Problem,
    /// The user's answer.
    pub user_input: String,
}

/// Body of an evaluation response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluateResponse {
    pub score: f64,
}

// ---------------------------------------------------------------------------
// Session store
// ---------------------------------------------------------------------------

/// Persists finished sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, payload: &SavePayload) -> anyhow::Result<()>;
}

/// Wire format of a finished session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavePayload {
    /// Completion time, `%Y-%m-%d %H:%M:%S` in UTC.
    pub date: String,
    /// Session start as fractional Unix seconds.
    pub start_time: f64,
    /// Configured round count.
    pub total_questions: u32,
    /// Rounds scored at 1.0 or above.
    pub correct_answers: u32,
    /// Round results in the order they were played.
    pub records: Vec<RoundResult>,
}

/// Format of [`SavePayload::date`].
pub const SAVE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

impl SavePayload {
    /// Build the payload for a summary completed at `completed_at`.
    pub fn from_summary(summary: &SessionSummary, completed_at: DateTime<Utc>) -> Self {
        Self {
            date: completed_at.format(SAVE_DATE_FORMAT).to_string(),
            start_time: summary.started_at.timestamp_millis() as f64 / 1000.0,
            total_questions: summary.total_rounds,
            correct_answers: summary.correct_count,
            records: summary.results.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{sample_problem, SessionId};
    use chrono::TimeZone;

    #[test]
    fn save_payload_from_summary() {
        let started_at = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        let finished_at = Utc.with_ymd_and_hms(2025, 3, 14, 9, 31, 0).unwrap();
        let summary = SessionSummary {
            session_id: SessionId::new(),
            started_at,
            total_rounds: 2,
            correct_count: 1,
            score_percentage: 50,
            results: vec![
                RoundResult::new(sample_problem("Paris"), "paris".into(), 1200, 1.0),
                RoundResult::new(sample_problem("Rome"), "Milan".into(), 3400, 0.2),
            ],
        };

        let payload = SavePayload::from_summary(&summary, finished_at);
        assert_eq!(payload.date, "2025-03-14 09:31:00");
        assert_eq!(payload.start_time, started_at.timestamp() as f64);
        assert_eq!(payload.total_questions, 2);
        assert_eq!(payload.correct_answers, 1);
        assert_eq!(payload.records.len(), 2);

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["records"][0]["correct"], true);
        assert_eq!(json["records"][1]["response"], "Milan");
    }

    #[test]
    fn evaluate_request_wire_names() {
        let request = EvaluateRequest {
            problem: sample_problem("Paris"),
            user_input: "paris".into(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["user_input"], "paris");
        assert_eq!(json["problem"]["solution"], "Paris");
    }
}
