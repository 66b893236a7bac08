//! Scoring gateway and local scoring functions.
//!
//! The gateway asks the remote evaluator first and falls back to
//! [`fallback_score`] when the evaluator cannot be reached or answers with
//! something unusable. The fallback never fails.

use std::sync::Arc;

use tracing::{instrument, warn};

use crate::model::Problem;
use crate::traits::{EvaluateRequest, Evaluator};

/// Sends answers to the remote evaluator, scoring locally when it fails.
#[derive(Clone)]
pub struct ScoringGateway {
    evaluator: Arc<dyn Evaluator>,
}

impl ScoringGateway {
    pub fn new(evaluator: Arc<dyn Evaluator>) -> Self {
        Self { evaluator }
    }

    /// Score `user_input` against `problem`.
    ///
    /// The remote score is returned verbatim. Values outside `[0.0, 1.0]`
    /// are logged but kept; a NaN is treated as a protocol failure.
    #[instrument(skip_all, fields(problem = %problem.name))]
    pub async fn evaluate(&self, problem: &Problem, user_input: &str) -> f64 {
        let request = EvaluateRequest {
            problem: problem.clone(),
            user_input: user_input.to_string(),
        };

        match self.evaluator.evaluate(&request).await {
            Ok(score) if score.is_nan() => {
                warn!("evaluator returned NaN, scoring locally");
                fallback_score(&problem.solution, user_input)
            }
            Ok(score) => {
                if !(0.0..=1.0).contains(&score) {
                    warn!(score, "evaluator returned a score outside [0, 1]");
                }
                score
            }
            Err(e) => {
                warn!("evaluation failed, scoring locally: {e:#}");
                fallback_score(&problem.solution, user_input)
            }
        }
    }
}

/// Case-insensitive exact match: `1.0` on a match, `0.0` otherwise.
pub fn fallback_score(solution: &str, user_input: &str) -> f64 {
    if user_input.to_lowercase() == solution.to_lowercase() {
        1.0
    } else {
        0.0
    }
}

/// Partial-credit similarity in `[0.0, 1.0]`.
///
/// Both sides are trimmed and lowercased. An exact match scores 1.0,
/// otherwise the score is `1 - levenshtein / max_len` over characters.
pub fn similarity_score(solution: &str, user_input: &str) -> f64 {
    let expected = solution.trim().to_lowercase();
    let given = user_input.trim().to_lowercase();
    if expected == given {
        return 1.0;
    }

    let expected: Vec<char> = expected.chars().collect();
    let given: Vec<char> = given.chars().collect();
    let max_len = expected.len().max(given.len());
    if max_len == 0 {
        return 1.0;
    }

    let distance = levenshtein(&expected, &given);
    (1.0 - distance as f64 / max_len as f64).max(0.0)
}

/// Edit distance with a single rolling row.
fn levenshtein(a: &[char], b: &[char]) -> usize {
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            let cost = usize::from(ca != cb);
            row[j + 1] = (above + 1).min(row[j] + 1).min(diagonal + cost);
            diagonal = above;
        }
    }
    row[b.len()]
}
