//! `cascade` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`    — start the API server and the in-process executor.
//! - `validate` — validate a workflow JSON file and print its plan.

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use engine::{EngineConfig, Storage, WorkflowExecutor};
use nodes::NodeRegistry;
use storage::{create_pool, MemoryStorage, PgStorage};

#[derive(Parser)]
#[command(
    name = "cascade",
    about = "DAG workflow execution engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the REST API server.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,
        /// Postgres connection string; omit to run on in-memory storage.
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,
        /// Max concurrent node invocations across all executions.
        #[arg(long)]
        worker_count: Option<usize>,
        /// Continue executing later levels when a node fails.
        #[arg(long)]
        continue_on_error: bool,
    },
    /// Validate a workflow definition JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: std::path::PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            bind,
            database_url,
            worker_count,
            continue_on_error,
        } => serve(bind, database_url, worker_count, continue_on_error).await,
        Command::Validate { path } => validate(path),
    }
}

async fn serve(
    bind: String,
    database_url: Option<String>,
    worker_count: Option<usize>,
    continue_on_error: bool,
) -> ExitCode {
    let mut registry = NodeRegistry::new();
    if let Err(err) = nodes::register_builtins(&mut registry) {
        eprintln!("failed to register built-in node kinds: {err}");
        return ExitCode::FAILURE;
    }
    let registry = Arc::new(registry);

    let storage: Arc<dyn Storage> = match database_url {
        Some(url) => {
            let pool = match create_pool(&url, 10).await {
                Ok(pool) => pool,
                Err(err) => {
                    eprintln!("failed to connect to database: {err}");
                    return ExitCode::FAILURE;
                }
            };
            let pg = PgStorage::new(pool);
            if let Err(err) = pg.migrate().await {
                eprintln!("migration failed: {err}");
                return ExitCode::FAILURE;
            }
            Arc::new(pg)
        }
        None => {
            info!("no DATABASE_URL configured, using in-memory storage");
            Arc::new(MemoryStorage::new())
        }
    };

    let mut config = EngineConfig::default();
    if let Some(worker_count) = worker_count {
        config.worker_count = worker_count;
    }
    config.continue_on_error = continue_on_error;

    let executor = WorkflowExecutor::new(Arc::clone(&storage), Arc::clone(&registry), config);

    // Executions that were in flight when the last process died stay
    // failed rather than stuck in `running`.
    match executor.recover().await {
        Ok(0) => {}
        Ok(recovered) => info!(recovered, "recovered stale executions"),
        Err(err) => {
            eprintln!("recovery pass failed: {err}");
            return ExitCode::FAILURE;
        }
    }

    let state = api::AppState {
        executor,
        storage,
        registry,
    };

    info!("starting API server on {bind}");
    if let Err(err) = api::serve(&bind, state).await {
        eprintln!("server error: {err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn validate(path: std::path::PathBuf) -> ExitCode {
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) => {
            eprintln!("cannot read file {}: {err}", path.display());
            return ExitCode::FAILURE;
        }
    };

    let workflow: engine::Workflow = match serde_json::from_str(&content) {
        Ok(workflow) => workflow,
        Err(err) => {
            eprintln!("invalid workflow JSON: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut registry = NodeRegistry::new();
    if let Err(err) = nodes::register_builtins(&mut registry) {
        eprintln!("failed to register built-in node kinds: {err}");
        return ExitCode::FAILURE;
    }

    match engine::validate(&workflow, &registry) {
        Ok(()) => match engine::build_plan(&workflow) {
            Ok(plan) => {
                println!("workflow is valid; execution levels:");
                for (index, level) in plan.levels().iter().enumerate() {
                    println!("  {index}: {}", level.join(", "));
                }
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("planning failed: {err}");
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            eprintln!("validation failed: {err}");
            ExitCode::FAILURE
        }
    }
}
