//! The `memlab games` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::Table;

use memlab_remote::config::load_config_from;

pub async fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let backend = config.create_backend();

    let games = backend
        .list_games()
        .await
        .with_context(|| format!("failed to list games from {}", backend.base_url()))?;

    if games.is_empty() {
        println!("The backend at {} offers no games.", backend.base_url());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name"]);
    for game in &games {
        table.add_row(vec![&game.id, &game.name]);
    }
    println!("{table}");
    println!("\nStart one with: memlab play --game <ID>");

    Ok(())
}
