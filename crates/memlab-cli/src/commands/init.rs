//! The `memlab init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("memlab.toml").exists() {
        println!("memlab.toml already exists, skipping.");
    } else {
        std::fs::write("memlab.toml", SAMPLE_CONFIG)?;
        println!("Created memlab.toml");
    }

    println!("\nNext steps:");
    println!("  1. Point base_url in memlab.toml at your memlab backend");
    println!("  2. Run: memlab games");
    println!("  3. Run: memlab play --game <ID>");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# memlab configuration

# Backend serving /api/problem, /api/evaluate and /api/save.
# MEMLAB_BASE_URL overrides this value.
base_url = "http://localhost:8000"

total_rounds = 10
request_timeout_secs = 10

# Extra attempts for a failed session save (0 = log and give up).
save_retries = 0
retry_delay_ms = 500
"#;
