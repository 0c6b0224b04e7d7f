//! Document Q&A server binary
//!
//! Run with: cargo run -p docqa-rag --bin docqa-rag-server -- --config docqa.toml

use clap::Parser;
use std::path::PathBuf;

use docqa_rag::{config::RagConfig, server::RagServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Upload documents, ask questions, get answers with source excerpts
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// TOML configuration file; defaults apply when omitted
    #[arg(short, long, env = "DOCQA_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docqa_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                         DocQA RAG                         ║
║          Document Q&A with Source Excerpts                ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    let mut config = RagConfig::load_or_default(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing::info!("Configuration loaded");
    tracing::info!(
        "  - Embeddings: {:?} {} ({} dims)",
        config.embeddings.backend,
        config.embeddings.model,
        config.embeddings.dimensions
    );
    tracing::info!("  - Generation: {}", config.llm.backend);
    tracing::info!(
        "  - Chunking: {} chars, {} overlap",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );
    tracing::info!("  - Store: {}", config.store_path().display());
    tracing::info!("  - Delete policy: {}", config.vector_db.delete_policy);

    let server = RagServer::new(config).await?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nEndpoints:");
    println!("  POST   /api/upload      - Upload a document");
    println!("  POST   /api/ask         - Ask a question");
    println!("  GET    /api/files       - List documents");
    println!("  DELETE /api/files/:name - Delete a document");
    println!("  DELETE /api/clear       - Delete every document");
    println!("  GET    /api/status      - Store status");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
