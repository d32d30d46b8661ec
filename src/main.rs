//! # sim
//!
//! ```bash
//! sim --config ./config/sim.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sim init` | Create the SQLite database and schema |
//! | `sim load <file.json> --scope <name>` | Load embedded records into a scope |
//! | `sim sync qdrant --scope <name>` | Copy a scope into the Qdrant collection |
//! | `sim sync elasticsearch --scope <name>` | Copy a scope into the Elasticsearch index |
//! | `sim search "<query>"` | Print the retrieved fragments |
//! | `sim prompt "<question>"` | Print the assembled prompt |
//! | `sim ask "<question>"` | Answer a question |
//! | `sim serve` | Start the HTTP API |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use similarity::config;
use similarity::load;
use similarity::logging;
use similarity::migrate;
use similarity::pipeline::Pipeline;
use similarity::server;

#[derive(Parser)]
#[command(
    name = "sim",
    about = "Answer questions from a private corpus using retrieved context",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/sim.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Load a JSON array of `{ "combined", "embedding" }` records.
    ///
    /// Records already loaded into the scope are skipped, so an
    /// interrupted load can simply be rerun.
    Load {
        /// Path to the JSON data file.
        file: PathBuf,

        /// Scope to load into. Defaults to `[retrieval].scope`.
        #[arg(long)]
        scope: Option<String>,
    },

    /// Copy a scope from SQLite into a remote index, recreating it.
    Sync {
        #[command(subcommand)]
        target: SyncTarget,
    },

    /// Retrieve and print ranked fragments for a query.
    Search { query: String },

    /// Print the prompt that would be sent for a question.
    Prompt { question: String },

    /// Answer a question.
    Ask { question: String },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum SyncTarget {
    /// Recreate the Qdrant collection from the scope.
    Qdrant {
        #[arg(long)]
        scope: Option<String>,
    },
    /// Recreate the Elasticsearch index from the scope.
    Elasticsearch {
        #[arg(long)]
        scope: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init();

    let cfg = config::load_config(&cli.config)?;
    let scope_or_default =
        |scope: Option<String>| scope.unwrap_or_else(|| cfg.retrieval.scope.clone());

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Load { file, scope } => {
            let scope = scope_or_default(scope);
            load::run_load(&cfg, &file, &scope).await?;
        }
        Commands::Sync { target } => match target {
            SyncTarget::Qdrant { scope } => {
                let scope = scope_or_default(scope);
                load::run_sync_qdrant(&cfg, &scope).await?;
            }
            SyncTarget::Elasticsearch { scope } => {
                let scope = scope_or_default(scope);
                load::run_sync_elasticsearch(&cfg, &scope).await?;
            }
        },
        Commands::Search { query } => {
            let pipeline = Pipeline::from_config(&cfg, false).await?;
            let fragments = pipeline.retrieve(&query).await?;
            if fragments.is_empty() {
                println!("No results.");
            }
            for (i, f) in fragments.iter().enumerate() {
                let score = f
                    .score
                    .map(|s| format!("{:.4}", s))
                    .unwrap_or_else(|| "-".to_string());
                println!("{}. [{}] {}", i + 1, score, f.id);
                println!("    {}", f.text);
            }
        }
        Commands::Prompt { question } => {
            let pipeline = Pipeline::from_config(&cfg, false).await?;
            println!("{}", pipeline.prompt(&question).await?);
        }
        Commands::Ask { question } => {
            let pipeline = Pipeline::from_config(&cfg, true).await?;
            let answer = pipeline.answer(&question).await?;
            println!("{}", answer.answer);
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
