//! Mock backend for testing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use memlab_core::model::Problem;
use memlab_core::scoring::similarity_score;
use memlab_core::traits::{EvaluateRequest, Evaluator, ProblemSource, SavePayload, SessionStore};

use crate::error::RemoteError;

/// How the mock evaluator scores answers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockScoring {
    /// Normalized Levenshtein similarity against the solution.
    Similarity,
    /// Always the given score.
    Fixed(f64),
    /// Always fail, forcing the caller onto its fallback.
    Unavailable,
}

/// A scripted backend for driving sessions without a server.
///
/// Problems are served from a queue; once it is empty every fetch returns
/// the default problem. Saved sessions are kept for inspection.
pub struct MockBackend {
    problems: Mutex<VecDeque<Result<Problem, String>>>,
    default_problem: Problem,
    scoring: MockScoring,
    fail_saves: bool,
    fetch_count: AtomicU32,
    evaluate_count: AtomicU32,
    saved: Mutex<Vec<SavePayload>>,
}

impl MockBackend {
    /// A backend that always serves `problem` and scores by similarity.
    pub fn with_problem(problem: Problem) -> Self {
        Self {
            problems: Mutex::new(VecDeque::new()),
            default_problem: problem,
            scoring: MockScoring::Similarity,
            fail_saves: false,
            fetch_count: AtomicU32::new(0),
            evaluate_count: AtomicU32::new(0),
            saved: Mutex::new(Vec::new()),
        }
    }

    pub fn with_scoring(mut self, scoring: MockScoring) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_failing_saves(mut self) -> Self {
        self.fail_saves = true;
        self
    }

    /// Queue a problem for the next fetch.
    pub fn push_problem(&self, problem: Problem) {
        self.problems.lock().unwrap().push_back(Ok(problem));
    }

    /// Make the next fetch fail with `message`.
    pub fn push_fetch_failure(&self, message: &str) {
        self.problems
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    pub fn fetch_count(&self) -> u32 {
        self.fetch_count.load(Ordering::Relaxed)
    }

    pub fn evaluate_count(&self) -> u32 {
        self.evaluate_count.load(Ordering::Relaxed)
    }

    /// Sessions saved so far.
    pub fn saved(&self) -> Vec<SavePayload> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProblemSource for MockBackend {
    async fn fetch_problem(&self, _game_id: &str) -> anyhow::Result<Problem> {
        self.fetch_count.fetch_add(1, Ordering::Relaxed);
        let next = self.problems.lock().unwrap().pop_front();
        match next {
            Some(Ok(problem)) => Ok(problem),
            Some(Err(message)) => Err(RemoteError::ApiError {
                status: 503,
                message,
            }
            .into()),
            None => Ok(self.default_problem.clone()),
        }
    }
}

#[async_trait]
impl Evaluator for MockBackend {
    async fn evaluate(&self, request: &EvaluateRequest) -> anyhow::Result<f64> {
        self.evaluate_count.fetch_add(1, Ordering::Relaxed);
        match self.scoring {
            MockScoring::Similarity => Ok(similarity_score(
                &request.problem.solution,
                &request.user_input,
            )),
            MockScoring::Fixed(score) => Ok(score),
            MockScoring::Unavailable => {
                Err(RemoteError::NetworkError("mock evaluator unavailable".into()).into())
            }
        }
    }
}

#[async_trait]
impl SessionStore for MockBackend {
    async fn save(&self, payload: &SavePayload) -> anyhow::Result<()> {
        if self.fail_saves {
            return Err(RemoteError::ApiError {
                status: 500,
                message: "mock store rejected the session".into(),
            }
            .into());
        }
        self.saved.lock().unwrap().push(payload.clone());
        Ok(())
    }
}
