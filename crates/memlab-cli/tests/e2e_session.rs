//! End-to-end session tests.
//!
//! These drive whole sessions through the driver against the mock backend
//! (paused clock) and against the HTTP backend served by wiremock.

use std::sync::Arc;
use std::time::Duration;

use memlab_core::driver::{DriverConfig, Services, SessionDriver};
use memlab_core::machine::Action;
use memlab_core::model::{Feedback, Phase, Problem};
use memlab_remote::{HttpBackend, MockBackend, MockScoring};
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn capital(city: &str, exposure_ms: u64) -> Problem {
    Problem {
        name: "Capital".into(),
        memorize: format!("The capital is {city}"),
        prompt: "Which city was it?".into(),
        solution: city.into(),
        exposure_ms,
        problem_type: String::new(),
    }
}

fn mock_driver(backend: Arc<MockBackend>, total_rounds: u32) -> SessionDriver {
    let config = DriverConfig {
        total_rounds,
        ..Default::default()
    };
    SessionDriver::new(Services::from_backend(backend), config).unwrap()
}

/// Play one round that is already fetching: wait for recall, answer, wait
/// for feedback.
async fn answer(driver: &mut SessionDriver, text: &str) {
    driver.settle().await;
    assert_eq!(driver.phase(), Phase::Recall);
    driver.dispatch(Action::Submit(text.into()));
    driver.settle().await;
    assert_eq!(driver.phase(), Phase::Feedback);
}

#[tokio::test(start_paused = true)]
async fn mixed_games_summary() {
    let backend = Arc::new(MockBackend::with_problem(capital("Paris", 1000)));
    let mut number = capital("4711", 800);
    number.name = "Number".into();
    backend.push_problem(capital("Paris", 1000));
    backend.push_problem(number.clone());
    backend.push_problem(number);

    let mut driver = mock_driver(backend.clone(), 3);
    driver.open_game("Mixed");
    driver.dispatch(Action::Begin);

    answer(&mut driver, "Paris").await;
    assert_eq!(driver.machine().feedback().unwrap().0, Feedback::Correct);
    driver.dispatch(Action::Next);

    answer(&mut driver, "4711").await;
    driver.dispatch(Action::Next);

    answer(&mut driver, "9999").await;
    assert_eq!(driver.machine().feedback().unwrap().0, Feedback::Incorrect);
    driver.dispatch(Action::Next);
    driver.flush().await;

    assert_eq!(driver.phase(), Phase::Finish);
    let summary = driver.machine().summary().unwrap();
    assert_eq!(summary.correct_count, 2);
    assert_eq!(summary.score_percentage, 67);

    let stats = summary.by_problem();
    assert_eq!(stats["Capital"].correct, 1);
    assert_eq!(stats["Number"].total, 2);

    let text = summary.to_string();
    assert!(text.contains("Final score: 2/3 correct answers (67%)"));
    assert!(text.contains("Results by problem type:"));

    let saved = backend.saved();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].total_questions, 3);
    assert_eq!(saved[0].correct_answers, 2);
    assert_eq!(saved[0].records[2].response, "9999");
}

#[tokio::test(start_paused = true)]
async fn failed_fetch_is_retried_without_losing_the_round() {
    let backend = Arc::new(MockBackend::with_problem(capital("Rome", 500)));
    backend.push_fetch_failure("generator crashed");

    let mut driver = mock_driver(backend.clone(), 2);
    driver.open_game("Capital");
    driver.dispatch(Action::Begin);
    driver.settle().await;

    assert_eq!(driver.phase(), Phase::Memorize);
    assert!(driver.machine().stall_reason().unwrap().contains("generator crashed"));
    assert!(driver.machine().session().results().is_empty());

    driver.dispatch(Action::Next);
    answer(&mut driver, "rome").await;
    assert_eq!(driver.machine().session().current_round(), 1);
    assert_eq!(backend.fetch_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn unavailable_evaluator_falls_back_to_exact_match() {
    let backend = Arc::new(
        MockBackend::with_problem(capital("Oslo", 500)).with_scoring(MockScoring::Unavailable),
    );
    let mut driver = mock_driver(backend.clone(), 2);
    driver.open_game("Capital");
    driver.dispatch(Action::Begin);

    answer(&mut driver, "  OSLO ").await;
    assert_eq!(driver.machine().feedback().unwrap().1.score, 1.0);
    driver.dispatch(Action::Next);

    answer(&mut driver, "Osl").await;
    assert_eq!(driver.machine().feedback().unwrap().1.score, 0.0);
    driver.dispatch(Action::Next);
    driver.flush().await;

    assert_eq!(backend.evaluate_count(), 2);
    assert_eq!(driver.machine().summary().unwrap().correct_count, 1);
}

#[tokio::test(start_paused = true)]
async fn failed_save_still_finishes() {
    let backend = Arc::new(MockBackend::with_problem(capital("Bern", 500)).with_failing_saves());
    let mut driver = mock_driver(backend.clone(), 1);
    driver.open_game("Capital");
    driver.dispatch(Action::Begin);

    answer(&mut driver, "Bern").await;
    driver.dispatch(Action::Next);
    driver.flush().await;

    assert_eq!(driver.phase(), Phase::Finish);
    assert!(backend.saved().is_empty());
}

#[tokio::test(start_paused = true)]
async fn switching_games_restarts_the_session() {
    let backend = Arc::new(MockBackend::with_problem(capital("Vienna", 500)));
    let mut driver = mock_driver(backend.clone(), 3);
    driver.open_game("Capital");
    driver.dispatch(Action::Begin);
    answer(&mut driver, "Vienna").await;
    let first = driver.machine().session().id();

    driver.open_game("Number");
    assert_eq!(driver.phase(), Phase::Start);
    assert_ne!(driver.machine().session().id(), first);
    assert!(driver.machine().session().results().is_empty());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(backend.saved().is_empty());
}

#[tokio::test]
async fn http_backend_session() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/problem"))
        .and(query_param("id", "CapitalProblem"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"name":"Capital","memorize":"The capital is Paris","prompt":"Which city?","solution":"Paris","exposure_ms":20}"#,
        ))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/evaluate"))
        .and(body_string_contains(r#""user_input":"Paris""#))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"score":1.0}"#))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/evaluate"))
        .and(body_string_contains(r#""user_input":"Pari""#))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"score":0.8}"#))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/save"))
        .and(body_string_contains(r#""total_questions":2"#))
        .and(body_string_contains(r#""correct_answers":1"#))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"ok"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let backend = Arc::new(HttpBackend::new(&server.uri(), 5));
    let config = DriverConfig {
        total_rounds: 2,
        ..Default::default()
    };
    let mut driver = SessionDriver::new(Services::from_backend(backend), config).unwrap();
    driver.open_game("CapitalProblem");
    driver.dispatch(Action::Begin);

    answer(&mut driver, "Paris").await;
    assert_eq!(driver.machine().feedback().unwrap().0, Feedback::Correct);
    driver.dispatch(Action::Next);

    answer(&mut driver, "Pari").await;
    assert_eq!(driver.machine().feedback().unwrap().0, Feedback::Almost);
    driver.dispatch(Action::Next);
    driver.flush().await;

    assert_eq!(driver.phase(), Phase::Finish);
    assert_eq!(driver.machine().summary().unwrap().score_percentage, 50);
}
