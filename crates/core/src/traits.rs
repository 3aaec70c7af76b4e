use crate::{Answer, RagError, ScoredChunk, SearchParams, VectorRecord};
use async_trait::async_trait;

#[async_trait]
pub trait VectorStore {
    /// Length every stored and queried vector must have.
    fn vector_size(&self) -> usize;

    /// Creates the collection when absent. Returns `true` if it was created.
    async fn ensure_collection(&self) -> Result<bool, RagError>;

    async fn count(&self) -> Result<u64, RagError>;

    async fn upsert(&self, records: &[VectorRecord]) -> Result<(), RagError>;

    async fn search(
        &self,
        query_vector: &[f32],
        params: &SearchParams,
    ) -> Result<Vec<ScoredChunk>, RagError>;
}

#[async_trait]
pub trait CompletionModel {
    async fn complete(&self, system: Option<&str>, prompt: &str) -> Result<String, RagError>;
}

/// Question answering over an already ingested collection.
#[async_trait]
pub trait QueryPipeline {
    async fn answer(&self, question: &str) -> Result<Answer, RagError>;
}
