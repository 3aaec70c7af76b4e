use crate::chunking::{split, ChunkingConfig};
use crate::embeddings::Embedder;
use crate::extractor::PdfExtractor;
use crate::traits::VectorStore;
use crate::{Chunk, DocumentFingerprint, PageText, RagError, RecordMetadata, VectorRecord};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct IngestionReport {
    pub document: DocumentFingerprint,
    pub pages: usize,
    pub chunks: usize,
}

#[derive(Debug, Clone)]
pub enum IngestionOutcome {
    Ingested(IngestionReport),
    /// The collection already held points, so nothing was read or written.
    AlreadyPopulated { points: u64 },
}

/// A loaded and split document, ready to be embedded.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub fingerprint: DocumentFingerprint,
    pub pages: usize,
    pub chunks: Vec<Chunk>,
}

pub fn digest_file(path: &Path) -> Result<String, RagError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Loads and splits the PDF at `path`. Pure apart from reading the file.
pub fn prepare_document<X: PdfExtractor>(
    path: &Path,
    extractor: &X,
    chunking: &ChunkingConfig,
) -> Result<PreparedDocument, RagError> {
    chunking.validate()?;
    let extracted = extractor.extract(path)?;
    let fingerprint = fingerprint(path, extracted.title, &extracted.pages)?;
    let chunks = split(&fingerprint.document_id, &extracted.pages, chunking)?;

    Ok(PreparedDocument {
        fingerprint,
        pages: extracted.pages.len(),
        chunks,
    })
}

/// Loads, splits, embeds and upserts one document.
pub async fn ingest_document<X, E, S>(
    path: &Path,
    extractor: &X,
    chunking: &ChunkingConfig,
    embedder: &E,
    store: &S,
) -> Result<IngestionReport, RagError>
where
    X: PdfExtractor,
    E: Embedder + Sync,
    S: VectorStore + Sync,
{
    let prepared = prepare_document(path, extractor, chunking)?;
    store_document(prepared, embedder, store).await
}

/// Makes sure the collection exists and holds every chunk of the document.
///
/// Ingestion is skipped only when the point count matches the chunk count.
/// A collection left partial by an earlier failed run is re-ingested; point
/// ids are stable, so existing points are overwritten.
pub async fn ensure_ingested<X, E, S>(
    path: &Path,
    extractor: &X,
    chunking: &ChunkingConfig,
    embedder: &E,
    store: &S,
) -> Result<IngestionOutcome, RagError>
where
    X: PdfExtractor,
    E: Embedder + Sync,
    S: VectorStore + Sync,
{
    let created = store.ensure_collection().await?;
    let points = if created { 0 } else { store.count().await? };

    let prepared = prepare_document(path, extractor, chunking)?;
    let expected = prepared.chunks.len() as u64;
    if points == expected {
        tracing::info!(points, "collection already holds the document, skipping ingestion");
        return Ok(IngestionOutcome::AlreadyPopulated { points });
    }
    if points > 0 {
        tracing::warn!(points, expected, "collection is incomplete, ingesting again");
    }

    store_document(prepared, embedder, store)
        .await
        .map(IngestionOutcome::Ingested)
}

async fn store_document<E, S>(
    prepared: PreparedDocument,
    embedder: &E,
    store: &S,
) -> Result<IngestionReport, RagError>
where
    E: Embedder + Sync,
    S: VectorStore + Sync,
{
    tracing::info!(
        path = %prepared.fingerprint.source_path,
        pages = prepared.pages,
        chunks = prepared.chunks.len(),
        "document split into chunks"
    );

    if embedder.dimensions() != store.vector_size() {
        return Err(RagError::Dimension {
            expected: store.vector_size(),
            actual: embedder.dimensions(),
        });
    }

    let texts = prepared
        .chunks
        .iter()
        .map(|chunk| chunk.text.clone())
        .collect::<Vec<_>>();
    let vectors = embedder.embed(&texts).await?;
    if vectors.len() != prepared.chunks.len() {
        return Err(RagError::service(
            "embeddings",
            format!(
                "received {} vectors for {} chunks",
                vectors.len(),
                prepared.chunks.len()
            ),
        ));
    }

    let records = prepared
        .chunks
        .iter()
        .zip(vectors)
        .map(|(chunk, vector)| VectorRecord {
            id: chunk_id(chunk),
            vector,
            text: chunk.text.clone(),
            metadata: RecordMetadata {
                source: prepared.fingerprint.source_path.clone(),
                document_id: chunk.document_id.clone(),
                document_title: prepared.fingerprint.document_title.clone(),
                page: chunk.page,
                chunk_index: chunk.chunk_index,
                start: chunk.start,
                end: chunk.end,
            },
        })
        .collect::<Vec<_>>();

    store.upsert(&records).await?;
    tracing::info!(records = records.len(), "chunks stored");

    Ok(IngestionReport {
        document: prepared.fingerprint,
        pages: prepared.pages,
        chunks: records.len(),
    })
}

/// Stable point id: the same chunk of the same document always maps to the
/// same UUID, so re-ingesting overwrites instead of duplicating.
pub fn chunk_id(chunk: &Chunk) -> String {
    let mut hasher = Sha256::new();
    hasher.update(chunk.document_id.as_bytes());
    hasher.update(chunk.page.to_le_bytes());
    hasher.update(chunk.chunk_index.to_le_bytes());
    hasher.update(chunk.text.as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes).to_string()
}

/// Identity of the document at `path`. The title falls back to the first
/// non-empty line of the first page, then to the file name.
pub fn fingerprint(
    path: &Path,
    title: Option<String>,
    pages: &[PageText],
) -> Result<DocumentFingerprint, RagError> {
    let checksum = digest_file(path)?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| RagError::NotFound(format!("path has no file name: {}", path.display())))?;

    let document_title = title
        .or_else(|| first_line(pages))
        .unwrap_or_else(|| file_name.to_string());

    Ok(DocumentFingerprint {
        document_id: generate_document_id(path),
        document_title,
        source_path: path.to_string_lossy().to_string(),
        checksum,
        ingested_at: Utc::now(),
    })
}

fn first_line(pages: &[PageText]) -> Option<String> {
    pages
        .first()?
        .text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

fn generate_document_id(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    format!("{:x}", hasher.finalize())
}
