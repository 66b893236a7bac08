//! The `memlab play` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use memlab_core::driver::{Services, SessionDriver, SessionObserver};
use memlab_core::machine::{Action, RoundMachine};
use memlab_core::model::Phase;
use memlab_core::session::SessionSummary;
use memlab_remote::config::load_config_from;

/// Clears the terminal so the stimulus is gone once recall starts.
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Prints each transition to the terminal.
struct ConsoleObserver;

impl SessionObserver for ConsoleObserver {
    fn on_transition(&self, machine: &RoundMachine) {
        let session = machine.session();
        match machine.phase() {
            Phase::Start => {
                eprintln!(
                    "Game: {} ({} rounds). Press Enter to begin, q to quit.",
                    machine.game_id().unwrap_or("-"),
                    machine.total_rounds()
                );
            }
            Phase::Memorize => {
                if let Some(reason) = machine.stall_reason() {
                    eprintln!("Could not fetch a problem: {reason}");
                    eprintln!("Press Enter to retry, q to quit.");
                } else if let Some(problem) = machine.current_problem() {
                    println!(
                        "\nRound {}/{}: memorize ({:.1}s):\n\n{}\n",
                        session.current_round(),
                        session.total_rounds(),
                        problem.exposure_ms as f64 / 1000.0,
                        problem.memorize
                    );
                }
            }
            Phase::Recall => {
                // The transition into scoring is also a RECALL transition.
                if machine.is_awaiting() {
                    return;
                }
                if let Some(problem) = machine.current_problem() {
                    print!("{CLEAR_SCREEN}");
                    println!(
                        "Round {}/{}\n{}",
                        session.current_round(),
                        session.total_rounds(),
                        problem.prompt
                    );
                }
            }
            Phase::Feedback => {
                if let Some((feedback, result)) = machine.feedback() {
                    println!(
                        "{feedback} (score {:.2}, {:.1}s)\nSolution: {}",
                        result.score,
                        result.response_ms as f64 / 1000.0,
                        result.problem.solution
                    );
                    eprintln!("Press Enter to continue.");
                }
            }
            Phase::Finish => {
                if let Some(summary) = machine.summary() {
                    print_summary(summary);
                }
            }
        }
    }
}

/// Map an input line to the action it means in `phase`.
///
/// Lines typed while the stimulus is showing are dropped, so recall always
/// starts with an empty answer.
fn action_for(phase: Phase, stalled: bool, line: String) -> Option<Action> {
    match phase {
        Phase::Start => Some(Action::Begin),
        Phase::Memorize if stalled => Some(Action::Next),
        Phase::Recall => Some(Action::Submit(line)),
        Phase::Feedback => Some(Action::Next),
        Phase::Memorize | Phase::Finish => None,
    }
}

pub async fn execute(game: String, rounds: Option<u32>, config_path: Option<PathBuf>) -> Result<()> {
    let mut config = load_config_from(config_path.as_deref())?;
    if let Some(rounds) = rounds {
        anyhow::ensure!(rounds >= 1, "rounds must be at least 1");
        config.total_rounds = rounds;
    }

    tracing::debug!(
        game = %game,
        rounds = config.total_rounds,
        base_url = %config.base_url,
        "starting session"
    );
    let backend = Arc::new(config.create_backend());
    let mut driver = SessionDriver::new(Services::from_backend(backend), config.driver_config())?
        .with_observer(Arc::new(ConsoleObserver));
    driver.open_game(&game);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().eq_ignore_ascii_case("q") {
                    break;
                }
                let stalled = driver.machine().stall_reason().is_some();
                if let Some(action) = action_for(driver.phase(), stalled, line) {
                    driver.dispatch(action);
                }
            }
            Some(event) = driver.next_event() => driver.apply(event),
        }

        if driver.phase() == Phase::Finish {
            break;
        }
    }

    driver.flush().await;
    Ok(())
}

fn print_summary(summary: &SessionSummary) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["Round", "Game", "Answer", "Solution", "Score", "Time"]);

    for (index, result) in summary.results.iter().enumerate() {
        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(&result.problem.name),
            Cell::new(&result.response),
            Cell::new(&result.problem.solution),
            Cell::new(format!("{:.2}", result.score)),
            Cell::new(format!("{}ms", result.response_ms)),
        ]);
    }

    println!("\n{summary}\n\n{table}");
}
