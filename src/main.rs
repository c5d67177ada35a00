use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use flowstack_core::config::AppConfig;
use flowstack_gateway::GatewayServer;
use flowstack_kb::{HttpEmbeddingProvider, SqliteKnowledgeBase};
use flowstack_llm::OllamaClient;
use flowstack_store::SqliteStackStore;

#[derive(Parser)]
#[command(name = "flowstack", version, about = "Graph-driven GenAI stack backend")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "flowstack.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve,
    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("flowstack=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load_or_default(&cli.config)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Serve => serve(config).await,
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let db_path = PathBuf::from(&config.database.path);

    // Stacks and the knowledge base share one SQLite file; each opens its
    // own WAL connection.
    let stacks = Arc::new(SqliteStackStore::open(&db_path)?);
    let embedder = Arc::new(HttpEmbeddingProvider::new(config.embedding.clone()));
    let kb = Arc::new(SqliteKnowledgeBase::open(&db_path, embedder)?);
    let backend = Arc::new(OllamaClient::new(config.ollama.clone()));

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, shutting down");
                shutdown.cancel();
            }
        });
    }

    let server = GatewayServer::new(config.server.clone(), backend, stacks, kb);
    server.run(shutdown).await
}
