//! `scrapeflow` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`    — start the API server.
//! - `migrate`  — run pending database migrations.
//! - `validate` — validate a pipeline definition JSON file.
//! - `crawl`    — run a pipeline definition locally, no database required.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use dom::{DocumentFetcher, HtmlDocument, HttpFetcher};
use engine::{interpret, validate_pipeline, Coordinator, PipelineConfig};
use notify::ChannelRegistry;

#[derive(Parser)]
#[command(
    name = "scrapeflow",
    about = "Block-graph web scraping pipeline engine",
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
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
    /// Run pending database migrations.
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
    /// Validate a pipeline definition JSON file.
    Validate {
        /// Path to the pipeline JSON file.
        path: std::path::PathBuf,
    },
    /// Run a pipeline definition locally and print records as JSON lines.
    Crawl {
        /// Path to the pipeline JSON file.
        path: std::path::PathBuf,
    },
}

fn load_config(path: &std::path::Path) -> anyhow::Result<PipelineConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    let config: PipelineConfig =
        serde_json::from_str(&content).context("invalid pipeline JSON")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { bind, database_url } => {
            let pool = db::pool::create_pool(&database_url, 10)
                .await
                .context("failed to connect to database")?;
            db::pool::run_migrations(&pool).await?;

            let notifier = Arc::new(ChannelRegistry::new());
            let fetcher: Arc<dyn DocumentFetcher> = Arc::new(HttpFetcher::new());
            let coordinator =
                Coordinator::new(pool.clone(), Arc::clone(&notifier), Arc::clone(&fetcher));

            info!("Starting API server on {bind}");
            api::serve(
                &bind,
                api::AppState {
                    pool,
                    coordinator,
                    notifier,
                    fetcher,
                },
            )
            .await
        }

        Command::Migrate { database_url } => {
            let pool = db::pool::create_pool(&database_url, 2)
                .await
                .context("failed to connect to database")?;
            db::pool::run_migrations(&pool).await?;
            info!("Migrations applied successfully");
            Ok(())
        }

        Command::Validate { path } => {
            let config = load_config(&path)?;
            match validate_pipeline(&config.name, &config.start_urls, &config.blocks) {
                Ok(message) => {
                    println!("✅ {message}");
                    Ok(())
                }
                Err(e) => {
                    eprintln!("❌ Validation failed: {e}");
                    std::process::exit(1);
                }
            }
        }

        Command::Crawl { path } => {
            let config = load_config(&path)?;
            validate_pipeline(&config.name, &config.start_urls, &config.blocks)
                .map_err(|e| anyhow::anyhow!("validation failed: {e}"))?;

            let fetcher = HttpFetcher::new();
            let mut items = 0usize;
            for url in &config.start_urls {
                let page = match fetcher.fetch(url).await {
                    Ok(page) => page,
                    Err(e) => {
                        tracing::error!(%url, error = %e, "fetch failed");
                        continue;
                    }
                };
                let document = HtmlDocument::parse(&page.body, Some(page.url.clone()));
                for record in interpret(&document, document.root(), &config.blocks) {
                    println!("{}", serde_json::Value::Object(record));
                    items += 1;
                }
            }
            info!(items, "crawl finished");
            Ok(())
        }
    }
}
