use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use docs_rag_chat::api::{self, AppState};
use docs_rag_chat::engine::{
    DEFAULT_CHAT_MODEL, DEFAULT_CORPUS_PATH, DEFAULT_EMBEDDING_MODEL, EngineConfig,
};

/// Documentation Q&A server backed by a precomputed embedding corpus
#[derive(Parser, Debug)]
#[command(name = "docs-rag-chat")]
#[command(about = "RAG question answering over a documentation corpus")]
#[command(version)]
struct Args {
    /// Bind address
    #[arg(long, env = "DOCS_RAG_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Bind port
    #[arg(long, env = "DOCS_RAG_PORT", default_value_t = 8080)]
    port: u16,

    /// Path to the corpus snapshot JSON
    #[arg(long, env = "DOCS_RAG_CORPUS", default_value = DEFAULT_CORPUS_PATH)]
    corpus: PathBuf,

    /// Chat model used when /ask requests do not name one
    #[arg(long, env = "DOCS_RAG_CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL)]
    chat_model: String,

    /// Embedding model for query vectors
    #[arg(long, env = "DOCS_RAG_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .context("invalid bind address")?;

    let config = EngineConfig {
        corpus_path: args.corpus,
        chat_model: args.chat_model,
        embedding_model: args.embedding_model,
    };

    tracing::info!(
        corpus = %config.corpus_path.display(),
        chat_model = %config.chat_model,
        embedding_model = %config.embedding_model,
        "starting docs-rag-chat"
    );

    let state = AppState::from_config(config).context("failed to initialize application state")?;
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
