//! schema_diff CLI
//!
//! Diffs two schema snapshot files and prints the DDL that turns the first
//! into the second.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use schema_diff::config::{self, Config, LoggingConfig};
use schema_diff::schema::{DatabaseSchema, SchemaDiff};
use schema_diff::utils::logging::init_logging;

/// Structural diffs of tables and views.
#[derive(Parser)]
#[command(name = "schema_diff")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Current schema snapshot (JSON, TOML or YAML).
    from: PathBuf,

    /// Target schema snapshot (JSON, TOML or YAML).
    to: PathBuf,

    /// Configuration file holding diff hints and logging settings.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print statements in canonical form.
    #[arg(long)]
    canonical: bool,

    /// Print an annotated diff of each changed entity.
    #[arg(long)]
    annotate: bool,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };
    if cli.verbose {
        let logging = config.logging.get_or_insert_with(LoggingConfig::default);
        logging.level = "debug".to_string();
    }
    init_logging(&config.logging)?;

    let from = DatabaseSchema::load_from_file(&cli.from)
        .with_context(|| format!("loading schema {}", cli.from.display()))?;
    let to = DatabaseSchema::load_from_file(&cli.to)
        .with_context(|| format!("loading schema {}", cli.to.display()))?;

    let diff = SchemaDiff::generate(&from, &to, &config.hints).context("diffing schemas")?;
    if diff.is_empty() {
        tracing::info!("Schemas are identical");
        return Ok(());
    }

    for entity_diff in diff.iter() {
        if cli.annotate {
            let (_, _, unified) = entity_diff.annotated();
            println!("-- {} {}", entity_diff.kind(), entity_diff.entity_name());
            println!("{}", unified.export());
        }
        for step in entity_diff.chain().filter(|d| !d.is_empty()) {
            let sql = if cli.canonical {
                step.canonical_statement_string()
            } else {
                step.statement_string()
            };
            println!("-- instant ddl: {}", step.instant_ddl_capability());
            println!("{};", sql);
        }
    }

    Ok(())
}
