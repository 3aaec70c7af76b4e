use crate::chunking::{ChunkingConfig, SplitStrategy};
use crate::config::RagConfig;
use crate::{ScoredChunk, SearchParams};
use std::fmt::Write as _;

/// The two interchangeable pipeline configurations.
///
/// `Chain` stuffs every retrieved chunk into a single prompt after a
/// similarity cut-off; `Index` labels each chunk with its page and document
/// and uses smaller, sentence-aligned chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    Chain,
    Index,
}

impl Variant {
    pub fn name(self) -> &'static str {
        match self {
            Self::Chain => "chain",
            Self::Index => "index",
        }
    }

    pub fn chunking(self, config: &RagConfig) -> ChunkingConfig {
        let (chunk_size, chunk_overlap, strategy) = match self {
            Self::Chain => (1000, 200, SplitStrategy::Paragraph),
            Self::Index => (512, 0, SplitStrategy::Sentence),
        };
        ChunkingConfig {
            chunk_size: config.chunk_size.unwrap_or(chunk_size),
            chunk_overlap: config.chunk_overlap.unwrap_or(chunk_overlap),
            strategy,
        }
    }

    pub fn search_params(self, config: &RagConfig) -> SearchParams {
        let default_threshold = match self {
            Self::Chain => Some(0.5),
            Self::Index => None,
        };
        SearchParams {
            top_k: config.top_k.unwrap_or(5),
            score_threshold: config.score_threshold.or(default_threshold),
        }
    }

    /// Renders the prompt for `question`, keeping `hits` in retrieval order.
    pub fn render_prompt(self, question: &str, hits: &[ScoredChunk]) -> String {
        match self {
            Self::Chain => {
                let context = hits
                    .iter()
                    .map(|hit| hit.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n\n");
                format!(
                    "Use the following pieces of context to answer the question at the end. \
                     If you don't know the answer, just say that you don't know, \
                     don't try to make up an answer.\n\n\
                     {context}\n\n\
                     Question: {question}\n\
                     Helpful Answer:"
                )
            }
            Self::Index => {
                let mut context = String::new();
                for (position, hit) in hits.iter().enumerate() {
                    if position > 0 {
                        context.push_str("\n\n");
                    }
                    if let Some(page) = hit.page {
                        let _ = writeln!(context, "page: {page}");
                    }
                    if let Some(title) = &hit.document_title {
                        let _ = writeln!(context, "document: {title}");
                    }
                    context.push_str(&hit.text);
                }
                format!(
                    "Context information is below.\n\
                     ---------------------\n\
                     {context}\n\
                     ---------------------\n\
                     Given the context information and not prior knowledge, \
                     answer the query. If the context does not contain the answer, say so.\n\
                     Query: {question}\n\
                     Answer: "
                )
            }
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
