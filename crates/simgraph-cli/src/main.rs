mod graph;
mod infer;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use simgraph_core::AppConfig;
use tracing_subscriber::EnvFilter;

use crate::infer::InferOptions;

#[derive(Debug, Parser)]
#[command(name = "simgraph-cli")]
#[command(about = "Infer and maintain SIMILAR_CONTENT relationships between users")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Infer relationships from a JSON file of posts without touching the database
    Infer {
        /// JSON array of posts with `id`, `author_id`, `text` and optional `author_name`
        #[arg(long)]
        posts: PathBuf,
        /// JSON array of edges already in the graph; edges without fresh evidence are retracted
        #[arg(long)]
        prior: Option<PathBuf>,
        /// Minimum similarity for a post pair to count as evidence (0 to 1)
        #[arg(long, value_parser = parse_threshold)]
        threshold: Option<f64>,
        /// YAML lexicon replacing the built-in word weights
        #[arg(long)]
        lexicon: Option<PathBuf>,
        /// Apply the plan to an empty in-memory graph and report the result
        #[arg(long)]
        simulate: bool,
    },
    /// Rebuild every relationship from the stored posts
    Recompute {
        /// Print the reconciliation plan without writing to the database
        #[arg(long)]
        dry_run: bool,
    },
    /// Print stored users and their relationships
    Graph,
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("simgraph-cli: run with --help to list commands");
        return Ok(());
    };

    match command {
        Commands::Infer {
            posts,
            prior,
            threshold,
            lexicon,
            simulate,
        } => {
            init_tracing("warn")?;
            infer::run_infer(&InferOptions {
                posts,
                prior,
                threshold,
                lexicon,
                simulate,
            })
            .await
        }
        Commands::Recompute { dry_run } => {
            let (config, pool) = connect().await?;
            graph::run_recompute(&pool, &config, dry_run).await
        }
        Commands::Graph => {
            let (_config, pool) = connect().await?;
            graph::run_graph(&pool).await
        }
        Commands::Db {
            command: DbCommands::Ping,
        } => {
            let (_config, pool) = connect().await?;
            simgraph_db::ping(&pool).await?;
            println!("database reachable");
            Ok(())
        }
        Commands::Db {
            command: DbCommands::Migrate,
        } => {
            let (_config, pool) = connect().await?;
            let applied = simgraph_db::run_migrations(&pool).await?;
            println!("migrations up to date ({applied} applied)");
            Ok(())
        }
    }
}

/// Logs go to stderr so command output on stdout stays machine-readable.
fn init_tracing(default_level: &str) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

async fn connect() -> anyhow::Result<(AppConfig, sqlx::PgPool)> {
    let config = simgraph_core::load_app_config()?;
    init_tracing(&config.log_level)?;
    let pool = simgraph_db::connect_pool(
        &config.database_url,
        simgraph_db::PoolConfig::from_app_config(&config),
    )
    .await?;
    Ok((config, pool))
}

fn parse_threshold(raw: &str) -> Result<f64, String> {
    let value: f64 = raw.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is outside [0, 1]"))
    }
}

#[cfg(test)]
mod tests;
