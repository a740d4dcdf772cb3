use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::Path;

mod config;
mod report;
mod session;

/// Replays a recorded formula-building session and reports the result.
#[derive(Debug, Parser)]
#[command(name = "formulary", version, about)]
struct Cli {
    /// Directory holding `catalog/*.yaml` and an optional `rules.yaml`.
    #[arg(long, default_value = "./data")]
    data: String,

    /// Session script to replay.
    #[arg(long, default_value = "./data/sessions/sections_demo.yaml")]
    session: String,

    /// Where run directories are created.
    #[arg(long, default_value = "./data/runs")]
    out: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    println!("--- Formulary ---");

    let workbench = config::Workbench::load(&cli.data)?;
    let mut session = config::load_session(&cli.session)?;
    let sort = session.sort.take();

    let output_dir = format!("{}/run_{}", cli.out, chrono::Utc::now().format("%Y%m%d_%H%M%S"));
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir))?;

    // Keep the replayed script next to its results
    fs::copy(&cli.session, Path::new(&output_dir).join("session.yaml"))
        .with_context(|| format!("Failed to copy {} into the run directory", cli.session))?;

    let log_path = Path::new(&output_dir).join("operations.csv");
    let (engine, outcome) = session::replay_session(session, &workbench, &log_path)?;

    report::write_formula_csv(&Path::new(&output_dir).join("formula.csv"), &engine)?;

    report::print_summary_report(&engine, &outcome, sort.as_ref());

    println!("\nSession replay complete. Results are in '{}'", output_dir);
    Ok(())
}
