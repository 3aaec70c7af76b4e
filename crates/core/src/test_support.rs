//! Fixtures shared by the unit tests: generated PDFs and in-process fakes for
//! the service traits.

use crate::config::RagConfig;
use crate::traits::{CompletionModel, VectorStore};
use crate::{RagError, ScoredChunk, SearchParams, VectorRecord};
use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A complete configuration pointing at the given OpenAI and Qdrant bases.
pub fn test_config(openai_base_url: &str, qdrant_host: &str) -> RagConfig {
    RagConfig {
        openai_api_key: "sk-test".to_string(),
        openai_model: "gpt-4o-mini".to_string(),
        openai_base_url: openai_base_url.to_string(),
        embedding_model: "text-embedding-ada-002".to_string(),
        qdrant_host: qdrant_host.to_string(),
        qdrant_key: "qdrant-secret".to_string(),
        collection_name: "handbook".to_string(),
        pdf_path: PathBuf::from("handbook.pdf"),
        vector_size: 3,
        top_k: None,
        score_threshold: None,
        chunk_size: None,
        chunk_overlap: None,
        system_prompt: None,
        request_timeout: Duration::from_secs(5),
    }
}

pub struct PdfFixture<'a> {
    pub title: Option<&'a str>,
    /// One entry per page, each a list of text lines.
    pub pages: Vec<Vec<&'a str>>,
}

pub fn write_pdf(path: &Path, fixture: &PdfFixture<'_>) -> Result<(), Box<dyn std::error::Error>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids = Vec::new();
    for lines in &fixture.pages {
        let mut operations = Vec::new();
        for (row, line) in lines.iter().enumerate() {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
            operations.push(Operation::new(
                "Td",
                vec![72.into(), (720 - 16 * row as i64).into()],
            ));
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    if let Some(title) = fixture.title {
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal(title),
        });
        doc.trailer.set("Info", info_id);
    }

    doc.save(path)?;
    Ok(())
}

/// Brute-force cosine store that keeps records in memory, keyed by id.
pub struct InMemoryStore {
    vector_size: usize,
    exists: Mutex<bool>,
    records: Mutex<Vec<VectorRecord>>,
    pub searches: AtomicUsize,
}

impl InMemoryStore {
    pub fn new(vector_size: usize) -> Self {
        Self {
            vector_size,
            exists: Mutex::new(false),
            records: Mutex::new(Vec::new()),
            searches: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("records lock").len()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn vector_size(&self) -> usize {
        self.vector_size
    }

    async fn ensure_collection(&self) -> Result<bool, RagError> {
        let mut exists = self.exists.lock().expect("exists lock");
        let created = !*exists;
        *exists = true;
        Ok(created)
    }

    async fn count(&self) -> Result<u64, RagError> {
        if !*self.exists.lock().expect("exists lock") {
            return Err(RagError::NotFound("collection".to_string()));
        }
        Ok(self.len() as u64)
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<(), RagError> {
        crate::stores::check_dimensions(records, self.vector_size)?;
        let mut stored = self.records.lock().expect("records lock");
        for record in records {
            match stored.iter_mut().find(|existing| existing.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => stored.push(record.clone()),
            }
        }
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        params: &SearchParams,
    ) -> Result<Vec<ScoredChunk>, RagError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        let stored = self.records.lock().expect("records lock");
        let mut hits = stored
            .iter()
            .map(|record| ScoredChunk {
                id: record.id.clone(),
                text: record.text.clone(),
                score: cosine(query_vector, &record.vector),
                page: Some(record.metadata.page),
                source: Some(record.metadata.source.clone()),
                document_title: Some(record.metadata.document_title.clone()),
            })
            .filter(|hit| params.score_threshold.map_or(true, |min| hit.score >= min))
            .collect::<Vec<_>>();
        hits.sort_by(|left, right| right.score.total_cmp(&left.score));
        hits.truncate(params.top_k);
        Ok(hits)
    }
}

fn cosine(left: &[f32], right: &[f32]) -> f32 {
    let dot = left.iter().zip(right).map(|(a, b)| a * b).sum::<f32>();
    let norm = |values: &[f32]| values.iter().map(|value| value * value).sum::<f32>().sqrt();
    let denominator = norm(left) * norm(right);
    if denominator == 0.0 {
        0.0
    } else {
        dot / denominator
    }
}

/// Completion double that echoes a canned answer and remembers the prompts.
#[derive(Default)]
pub struct RecordingCompletion {
    pub reply: String,
    pub prompts: Mutex<Vec<(Option<String>, String)>>,
}

impl RecordingCompletion {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts
            .lock()
            .expect("prompts lock")
            .last()
            .map(|(_, prompt)| prompt.clone())
    }
}

#[async_trait]
impl CompletionModel for RecordingCompletion {
    async fn complete(&self, system: Option<&str>, prompt: &str) -> Result<String, RagError> {
        self.prompts
            .lock()
            .expect("prompts lock")
            .push((system.map(str::to_string), prompt.to_string()));
        Ok(self.reply.clone())
    }
}

#[async_trait]
impl<T: VectorStore + Send + Sync> VectorStore for Arc<T> {
    fn vector_size(&self) -> usize {
        self.as_ref().vector_size()
    }

    async fn ensure_collection(&self) -> Result<bool, RagError> {
        self.as_ref().ensure_collection().await
    }

    async fn count(&self) -> Result<u64, RagError> {
        self.as_ref().count().await
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<(), RagError> {
        self.as_ref().upsert(records).await
    }

    async fn search(
        &self,
        query_vector: &[f32],
        params: &SearchParams,
    ) -> Result<Vec<ScoredChunk>, RagError> {
        self.as_ref().search(query_vector, params).await
    }
}

#[async_trait]
impl<T: CompletionModel + Send + Sync> CompletionModel for Arc<T> {
    async fn complete(&self, system: Option<&str>, prompt: &str) -> Result<String, RagError> {
        self.as_ref().complete(system, prompt).await
    }
}
