use crate::config::RagConfig;
use crate::embeddings::Embedder;
use crate::traits::{CompletionModel, QueryPipeline, VectorStore};
use crate::variant::Variant;
use crate::{Answer, RagError, SearchParams};
use async_trait::async_trait;

/// Where a request currently is. Every request starts and ends in `Idle`;
/// nothing carries over between requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    EmbeddingQuery,
    Retrieving,
    Generating,
}

pub struct RetrievalQa<E, S, C>
where
    E: Embedder,
    S: VectorStore,
    C: CompletionModel,
{
    embedder: E,
    store: S,
    completion: C,
    variant: Variant,
    params: SearchParams,
    system_prompt: Option<String>,
}

impl<E, S, C> RetrievalQa<E, S, C>
where
    E: Embedder + Send + Sync,
    S: VectorStore + Send + Sync,
    C: CompletionModel + Send + Sync,
{
    pub fn new(embedder: E, store: S, completion: C, variant: Variant, config: &RagConfig) -> Self {
        Self {
            embedder,
            store,
            completion,
            variant,
            params: variant.search_params(config),
            system_prompt: config.system_prompt.clone(),
        }
    }

    pub fn params(&self) -> SearchParams {
        self.params
    }

    fn enter(&self, stage: PipelineStage) {
        tracing::debug!(variant = %self.variant, ?stage, "pipeline stage");
    }
}

#[async_trait]
impl<E, S, C> QueryPipeline for RetrievalQa<E, S, C>
where
    E: Embedder + Send + Sync,
    S: VectorStore + Send + Sync,
    C: CompletionModel + Send + Sync,
{
    async fn answer(&self, question: &str) -> Result<Answer, RagError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::Config("question is empty".to_string()));
        }

        self.enter(PipelineStage::EmbeddingQuery);
        let query_vector = self.embedder.embed_one(question).await?;

        self.enter(PipelineStage::Retrieving);
        let hits = self.store.search(&query_vector, &self.params).await?;
        tracing::info!(
            variant = %self.variant,
            retrieved = hits.len(),
            top_k = self.params.top_k,
            "retrieved context"
        );

        self.enter(PipelineStage::Generating);
        let prompt = self.variant.render_prompt(question, &hits);
        let text = self
            .completion
            .complete(self.system_prompt.as_deref(), &prompt)
            .await?;

        self.enter(PipelineStage::Idle);
        Ok(Answer {
            text: text.trim().to_string(),
            sources: hits,
        })
    }
}
