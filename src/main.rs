use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use clinic_ops::api::{AppState, create_router};
use clinic_ops::config::CONFIG;
use clinic_ops::db::Database;
use clinic_ops::llm::OpenAiClient;
use clinic_ops::query_engine::QueryEngine;
use clinic_ops::report_analysis::{ReportAnalysisRequest, ReportAnalyzer};
use clinic_ops::schema::SchemaRegistry;
use clinic_ops::storage::GridFsStore;

#[derive(Parser)]
#[command(name = "clinic-ops", about = "Search and report analysis for the clinic operations dashboard")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the dashboard API and UI
    Serve {
        /// Address to bind, overrides BIND_ADDR
        #[arg(long)]
        bind: Option<String>,
    },
    /// Run one search and print the response as JSON
    Search { query: String },
    /// Analyze an uploaded report
    Analyze {
        report_id: String,
        #[arg(long)]
        report_type: String,
        /// Storage path of the file, defaults to the one on the report
        #[arg(long, default_value = "")]
        file_path: String,
    },
}

async fn build_state() -> anyhow::Result<AppState> {
    let db = Database::from_config().await?;
    let llm = Arc::new(OpenAiClient::from_config()?);
    let store = Arc::new(db.clone());

    let query_engine = QueryEngine::new(
        store.clone(),
        llm.clone(),
        SchemaRegistry::default(),
        CONFIG.search_row_limit,
    );
    let report_analyzer = ReportAnalyzer::new(store, Arc::new(GridFsStore::new(&db)), llm.clone());

    Ok(AppState {
        query_engine: Arc::new(query_engine),
        report_analyzer: Arc::new(report_analyzer),
        speech: llm,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Bridge log crate -> tracing (so log::info! etc. work)
    tracing_log::LogTracer::init()?;

    let cli = Cli::parse();
    let state = build_state().await?;

    match cli.command {
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| CONFIG.bind_addr.clone());
            let listener = tokio::net::TcpListener::bind(&bind)
                .await
                .with_context(|| format!("Failed to bind {bind}"))?;
            tracing::info!("listening on {}", bind);

            let shutdown = CancellationToken::new();
            let trigger = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("shutdown requested");
                }
                trigger.cancel();
            });

            let app = create_router(state, &CONFIG.static_dir);
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await?;
        }
        Command::Search { query } => {
            let response = state.query_engine.search(&query).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Analyze {
            report_id,
            report_type,
            file_path,
        } => {
            let request = ReportAnalysisRequest {
                report_id,
                file_path,
                report_type,
            };
            let outcome = state.report_analyzer.analyze(&request).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }
    Ok(())
}
