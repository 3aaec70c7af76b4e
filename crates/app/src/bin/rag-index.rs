use clap::Parser;
use pdf_rag_cli::{run, Cli};
use pdf_rag_core::Variant;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    run(Variant::Index, Cli::parse()).await
}
