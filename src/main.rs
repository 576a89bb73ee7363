//! scopusfetch - Scopus literature search client
//!
//! Fetches the most cited articles for a topic from the Elsevier Scopus API,
//! filtered by citation count and publication date.
//!
//! ## Usage
//!
//! ### CLI Mode
//! ```bash
//! scopusfetch search "perovskite solar cells" --min-citations 50 --limit 30
//! ```
//!
//! ### HTTP Server Mode
//! ```bash
//! scopusfetch serve --port 3000
//! ```
//!
//! `ELSEVIER_API_KEY` is read from the environment or a local `.env` file.

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use clap::{Parser, Subcommand};
use scopusfetch::output::{self, OutputFormat};
use scopusfetch::{ArticleRecord, ScopusClient, ScopusError, SearchQuery, View};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Scopus literature search client
#[derive(Parser)]
#[command(name = "scopusfetch")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Load environment variables from this file instead of ./.env
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search Scopus and print matching articles
    Search {
        /// Topic searched in title, abstract and keywords
        topic: String,

        /// Minimum citation count
        #[arg(long, default_value = "0")]
        min_citations: u64,

        /// Maximum number of articles
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Earliest cover date (YYYY-MM-DD)
        #[arg(long)]
        start_date: Option<String>,

        /// Latest cover date (YYYY-MM-DD)
        #[arg(long)]
        end_date: Option<String>,

        /// Result view: standard or complete (full author list)
        #[arg(long, default_value = "standard", value_parser = ["standard", "complete"])]
        view: String,

        /// Output format
        #[arg(short, long, default_value = "table", value_parser = ["table", "json", "csv"])]
        format: String,

        /// Write results to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run as HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);

    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    load_dotenv(cli.env_file.as_deref())?;

    match cli.command {
        Commands::Search {
            topic,
            min_citations,
            limit,
            start_date,
            end_date,
            view,
            format,
            output,
        } => {
            let query = SearchQuery::new(topic)
                .with_min_citations(min_citations)
                .with_limit(limit)
                .with_view(view.parse()?)
                .with_date_range(start_date.as_deref(), end_date.as_deref())?;
            run_search(query, format.parse()?, output).await
        }
        Commands::Serve { port, host } => run_server(host, port).await,
    }
}

fn load_dotenv(env_file: Option<&std::path::Path>) -> Result<()> {
    match env_file {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("failed to load dotenv file at {}", path.display()))?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }
    Ok(())
}

// ============================================================================
// Search
// ============================================================================

async fn run_search(query: SearchQuery, format: OutputFormat, output_path: Option<PathBuf>) -> Result<()> {
    let client = ScopusClient::from_env().context("Failed to configure Scopus client")?;
    let records = client.fetch(&query).await?;

    if records.len() < query.limit {
        info!(
            found = records.len(),
            requested = query.limit,
            "Fewer articles than requested"
        );
    }

    match output_path {
        Some(path) => {
            output::save_records(&path, &records, format)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Saved {} articles to {}", records.len(), path.display());
        }
        None => {
            let stdout = std::io::stdout();
            output::write_records(stdout.lock(), &records, format)?;
        }
    }

    Ok(())
}

// ============================================================================
// HTTP Server
// ============================================================================

async fn run_server(host: String, port: u16) -> Result<()> {
    info!(host = %host, port = port, "Starting HTTP server");

    // Fail at startup rather than on the first request
    let client = ScopusClient::from_env().context("Failed to configure Scopus client")?;
    let app_state = Arc::new(AppState { client });

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/search", post(search_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("Invalid host:port")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}

struct AppState {
    client: ScopusClient,
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}

/// Search request body
#[derive(Debug, Deserialize)]
struct SearchRequest {
    topic: String,
    #[serde(default)]
    min_citations: u64,
    #[serde(default = "default_limit")]
    limit: usize,
    start_date: Option<String>,
    end_date: Option<String>,
    #[serde(default)]
    view: View,
}

fn default_limit() -> usize {
    scopusfetch::query::DEFAULT_LIMIT
}

impl SearchRequest {
    fn into_query(self) -> scopusfetch::Result<SearchQuery> {
        SearchQuery::new(self.topic)
            .with_min_citations(self.min_citations)
            .with_limit(self.limit)
            .with_view(self.view)
            .with_date_range(self.start_date.as_deref(), self.end_date.as_deref())
    }
}

/// Search response
#[derive(Debug, Serialize)]
struct SearchResponse {
    status: String,
    count: usize,
    results: Vec<ArticleRecord>,
}

/// Search endpoint handler
async fn search_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> (StatusCode, Json<SearchResponse>) {
    info!(topic = %req.topic, limit = req.limit, "Search request");

    let result = match req.into_query() {
        Ok(query) => state.client.fetch(&query).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(results) => (
            StatusCode::OK,
            Json(SearchResponse {
                status: "success".to_string(),
                count: results.len(),
                results,
            }),
        ),
        Err(e) => {
            error!(error = %e, "Search failed");
            let code = match e {
                ScopusError::Validation(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                code,
                Json(SearchResponse {
                    status: format!("error: {}", e),
                    count: 0,
                    results: vec![],
                }),
            )
        }
    }
}
