use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use esg_taxonomy::api::{self, AppState, RouterOptions};
use esg_taxonomy::config::ServerConfig;
use esg_taxonomy::db::AnswerStore;
use esg_taxonomy::taxonomy::{
    render_tree, CsvFileSource, RowSource, TaxonomyCache, TreeBuilder,
};

#[derive(Parser)]
#[command(name = "esgt")]
#[command(about = "ESG reporting taxonomy and answer server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port for HTTP API (overrides ESGT_PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Taxonomy CSV file to serve (overrides ESGT_TAXONOMY_PATH)
        #[arg(short, long)]
        taxonomy: Option<PathBuf>,
    },
    /// Print the question tree built from a taxonomy CSV file
    Tree {
        /// Taxonomy CSV file
        path: PathBuf,
    },
    /// Print the topics and subtopics of a taxonomy CSV file as JSON
    Topics {
        /// Taxonomy CSV file
        path: PathBuf,
    },
}

/// Initialize tracing with output to stderr (for one-shot commands) or stdout
fn init_tracing(use_stderr: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "esg_taxonomy=debug,tower_http=debug".into()),
    );

    if use_stderr {
        // Keep stdout clean for the command's own output
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let use_stderr = matches!(
        cli.command,
        Some(Commands::Tree { .. }) | Some(Commands::Topics { .. })
    );
    init_tracing(use_stderr);

    let mut config = ServerConfig::from_env()?;

    match cli.command {
        Some(Commands::Serve { port, taxonomy }) => {
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(taxonomy) = taxonomy {
                config.taxonomy_path = taxonomy;
            }
            serve(config).await?;
        }
        Some(Commands::Tree { path }) => {
            let cache = one_shot_cache(&config);
            let taxonomy = cache.get_or_build(&path.to_string_lossy()).await?;
            print!("{}", render_tree(&taxonomy.forest.roots, &BTreeMap::new()));
            for orphan in &taxonomy.forest.orphaned {
                eprintln!(
                    "dropped row {} (level {}): {}",
                    orphan.index, orphan.level, orphan.question_label
                );
            }
        }
        Some(Commands::Topics { path }) => {
            let cache = one_shot_cache(&config);
            let taxonomy = cache.get_or_build(&path.to_string_lossy()).await?;
            println!("{}", serde_json::to_string_pretty(&taxonomy.topics)?);
        }
        None => serve(config).await?,
    }

    Ok(())
}

fn one_shot_cache(config: &ServerConfig) -> TaxonomyCache {
    let source: Arc<dyn RowSource> = Arc::new(CsvFileSource::new());
    TaxonomyCache::with_builder(source, TreeBuilder::with_orphan_policy(config.orphan_policy))
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    tracing::info!(
        "Starting taxonomy server on port {} ({})",
        config.port,
        config.environment.as_str()
    );

    let answers = AnswerStore::open_memory()?;
    answers.migrate()?;

    let source: Arc<dyn RowSource> = Arc::new(CsvFileSource::new());
    let cache = TaxonomyCache::with_builder(
        source,
        TreeBuilder::with_orphan_policy(config.orphan_policy),
    );

    // Build up front so a broken taxonomy fails at startup, not on first request
    let key = config.taxonomy_key();
    let taxonomy = cache
        .get_or_build(&key)
        .await
        .with_context(|| format!("Failed to load taxonomy from {}", key))?;
    if !taxonomy.forest.orphaned.is_empty() {
        tracing::warn!(
            "{} taxonomy rows were dropped for lack of a parent",
            taxonomy.forest.orphaned.len()
        );
    }

    let state = AppState::new(cache, answers, key).with_error_details(config.expose_error_details());
    let options = RouterOptions::from_config(&config);
    if let Some(limiter) = &options.rate_limiter {
        limiter.spawn_cleanup();
    }
    let app = api::create_router_with(state, options);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", config.port)).await?;
    tracing::info!(
        "Taxonomy server listening on http://127.0.0.1:{}",
        config.port
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
