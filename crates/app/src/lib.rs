pub mod session;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use pdf_rag_core::{
    ensure_ingested, IngestionOutcome, LopdfExtractor, OpenAiChat, OpenAiEmbedder, QdrantStore,
    RagConfig, RetrievalQa, Variant,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Arguments shared by both binaries.
#[derive(Debug, Parser)]
#[command(version, about = "Ask questions about one PDF document.")]
pub struct Cli {
    /// Answer this question and exit. Without it, start an interactive session.
    pub question: Option<String>,
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Entry point shared by both binaries. Failures are logged before they are
/// handed back to `main`.
pub async fn run(variant: Variant, cli: Cli) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let result = serve(variant, cli).await;
    if let Err(error) = &result {
        log_failure(variant, error);
    }
    result
}

pub fn log_failure(variant: Variant, error: &anyhow::Error) {
    error!(variant = %variant, error = %format!("{error:#}"), "pdf-rag failed");
}

async fn serve(variant: Variant, cli: Cli) -> anyhow::Result<()> {
    info!(
        variant = %variant,
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "pdf-rag boot"
    );

    let config = RagConfig::from_env().context("loading configuration")?;
    let embedder = OpenAiEmbedder::new(&config)?;
    let store = QdrantStore::new(&config)?;
    let completion = OpenAiChat::new(&config)?;

    let outcome = ensure_ingested(
        &config.pdf_path,
        &LopdfExtractor,
        &variant.chunking(&config),
        &embedder,
        &store,
    )
    .await
    .with_context(|| format!("ingesting {}", config.pdf_path.display()))?;

    match outcome {
        IngestionOutcome::Ingested(report) => info!(
            collection = store.collection(),
            title = %report.document.document_title,
            pages = report.pages,
            chunks = report.chunks,
            "document ingested"
        ),
        IngestionOutcome::AlreadyPopulated { points } => info!(
            collection = store.collection(),
            points,
            "using existing collection"
        ),
    }

    info!(model = completion.model(), "completion model ready");
    let pipeline = RetrievalQa::new(embedder, store, completion, variant, &config);
    let params = pipeline.params();
    info!(
        variant = %variant,
        top_k = params.top_k,
        score_threshold = ?params.score_threshold,
        "pipeline ready"
    );

    match cli.question {
        Some(question) => {
            let answer = session::ask(&pipeline, &question).await?;
            print!("{}", session::render_answer(&answer));
        }
        None => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            session::interactive(&pipeline, stdin, tokio::io::stdout()).await?;
        }
    }

    Ok(())
}
