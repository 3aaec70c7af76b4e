pub mod chunking;
pub mod completion;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod stores;
pub mod traits;
pub mod variant;

mod http;
#[cfg(test)]
mod test_support;

pub use chunking::{normalize_page_text, split, ChunkingConfig, SplitStrategy};
pub use completion::OpenAiChat;
pub use config::RagConfig;
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, OpenAiEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{ErrorKind, RagError, Result};
pub use extractor::{extract_page_texts, ExtractedPdf, LopdfExtractor, PdfExtractor};
pub use ingest::{
    chunk_id, digest_file, ensure_ingested, fingerprint, ingest_document, prepare_document,
    IngestionOutcome, IngestionReport, PreparedDocument,
};
pub use models::{
    Answer, Chunk, DocumentFingerprint, PageText, RecordMetadata, ScoredChunk, SearchParams,
    VectorRecord,
};
pub use orchestrator::{PipelineStage, RetrievalQa};
pub use stores::QdrantStore;
pub use traits::{CompletionModel, QueryPipeline, VectorStore};
pub use variant::Variant;
