use crate::config::RagConfig;
use crate::http;
use crate::stores::check_dimensions;
use crate::traits::VectorStore;
use crate::{RagError, ScoredChunk, SearchParams, VectorRecord};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};

const BACKEND: &str = "qdrant";
const UPSERT_BATCH: usize = 256;

/// Adapter over the Qdrant REST API for one collection of fixed vector size.
pub struct QdrantStore {
    endpoint: String,
    api_key: String,
    collection: String,
    client: Client,
    vector_size: usize,
}

impl QdrantStore {
    pub fn new(config: &RagConfig) -> Result<Self, RagError> {
        Ok(Self {
            endpoint: config.qdrant_host.clone(),
            api_key: config.qdrant_key.clone(),
            collection: config.collection_name.clone(),
            client: http::client(config.request_timeout)?,
            vector_size: config.vector_size,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.client
            .request(
                method,
                format!("{}/collections/{}{}", self.endpoint, self.collection, path),
            )
            .header("api-key", &self.api_key)
    }

    fn missing_collection(&self) -> RagError {
        RagError::NotFound(format!("collection {} does not exist", self.collection))
    }

    async fn existing_vector_size(&self) -> Result<Option<usize>, RagError> {
        let response = self.request(reqwest::Method::GET, "").send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = http::check_status(BACKEND, response).await?;
        let parsed: Value = response.json().await?;

        parsed
            .pointer("/result/config/params/vectors/size")
            .and_then(Value::as_u64)
            .map(|size| Some(size as usize))
            .ok_or_else(|| {
                RagError::service(
                    BACKEND,
                    format!(
                        "collection {} does not describe a single unnamed vector",
                        self.collection
                    ),
                )
            })
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn vector_size(&self) -> usize {
        self.vector_size
    }

    async fn ensure_collection(&self) -> Result<bool, RagError> {
        if let Some(actual) = self.existing_vector_size().await? {
            if actual != self.vector_size {
                return Err(RagError::SchemaMismatch {
                    collection: self.collection.clone(),
                    expected: self.vector_size,
                    actual,
                });
            }
            tracing::info!(collection = %self.collection, "collection already exists");
            return Ok(false);
        }

        tracing::info!(
            collection = %self.collection,
            vector_size = self.vector_size,
            "collection does not exist, creating it"
        );
        let response = self
            .request(reqwest::Method::PUT, "")
            .json(&json!({
                "vectors": {
                    "size": self.vector_size,
                    "distance": "Cosine",
                }
            }))
            .send()
            .await?;
        http::check_status(BACKEND, response).await?;

        Ok(true)
    }

    async fn count(&self) -> Result<u64, RagError> {
        let response = self
            .request(reqwest::Method::POST, "/points/count")
            .json(&json!({ "exact": true }))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(self.missing_collection());
        }
        let response = http::check_status(BACKEND, response).await?;
        let parsed: Value = response.json().await?;

        parsed
            .pointer("/result/count")
            .and_then(Value::as_u64)
            .ok_or_else(|| RagError::service(BACKEND, "count response had no result.count"))
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<(), RagError> {
        check_dimensions(records, self.vector_size)?;

        for batch in records.chunks(UPSERT_BATCH) {
            let points = batch
                .iter()
                .map(|record| {
                    json!({
                        "id": record.id,
                        "vector": record.vector,
                        "payload": {
                            "page_content": record.text,
                            "metadata": record.metadata,
                        },
                    })
                })
                .collect::<Vec<_>>();

            let response = self
                .request(reqwest::Method::PUT, "/points?wait=true")
                .json(&json!({ "points": points }))
                .send()
                .await?;
            if response.status() == StatusCode::NOT_FOUND {
                return Err(self.missing_collection());
            }
            http::check_status(BACKEND, response).await?;

            tracing::debug!(collection = %self.collection, points = batch.len(), "upserted batch");
        }

        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        params: &SearchParams,
    ) -> Result<Vec<ScoredChunk>, RagError> {
        if query_vector.len() != self.vector_size {
            return Err(RagError::Dimension {
                expected: self.vector_size,
                actual: query_vector.len(),
            });
        }

        let mut body = json!({
            "vector": query_vector,
            "limit": params.top_k,
            "with_payload": true,
        });
        if let Some(threshold) = params.score_threshold {
            body["score_threshold"] = json!(threshold);
        }

        let response = self
            .request(reqwest::Method::POST, "/points/search")
            .json(&body)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(self.missing_collection());
        }
        let response = http::check_status(BACKEND, response).await?;

        let parsed: Value = response.json().await?;
        let hits = parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .ok_or_else(|| RagError::service(BACKEND, "search response had no result array"))?;

        let mut result = hits.iter().map(parse_hit).collect::<Result<Vec<_>, _>>()?;

        // Qdrant already orders by score; keep the contract even if a proxy does not.
        result.sort_by(|left, right| right.score.total_cmp(&left.score));
        result.truncate(params.top_k);

        Ok(result)
    }
}

fn parse_hit(hit: &Value) -> Result<ScoredChunk, RagError> {
    let malformed = |field: &str| RagError::service(BACKEND, format!("search hit has no {field}"));
    let id = match hit.pointer("/id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => return Err(malformed("id")),
    };
    let text_field = |pointer: &str| {
        hit.pointer(pointer)
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    Ok(ScoredChunk {
        id,
        text: text_field("/payload/page_content").ok_or_else(|| malformed("page_content"))?,
        score: hit
            .pointer("/score")
            .and_then(Value::as_f64)
            .ok_or_else(|| malformed("score"))? as f32,
        page: hit
            .pointer("/payload/metadata/page")
            .and_then(Value::as_u64)
            .map(|page| page as u32),
        source: text_field("/payload/metadata/source"),
        document_title: text_field("/payload/metadata/document_title"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordMetadata;
    use crate::test_support::test_config;
    use crate::ErrorKind;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const COLLECTION_PATH: &str = "/collections/handbook";

    fn store_for(server: &MockServer) -> QdrantStore {
        QdrantStore::new(&test_config("http://127.0.0.1:1", &server.uri())).expect("client")
    }

    fn record(id: &str, vector: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            vector,
            text: format!("text for {id}"),
            metadata: RecordMetadata {
                source: "handbook.pdf".to_string(),
                document_id: "doc".to_string(),
                document_title: "Handbook".to_string(),
                page: 2,
                chunk_index: 0,
                start: 0,
                end: 10,
            },
        }
    }

    #[tokio::test]
    async fn missing_collection_is_created_with_cosine_distance() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COLLECTION_PATH))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(COLLECTION_PATH))
            .and(header("api-key", "qdrant-secret"))
            .and(body_partial_json(json!({
                "vectors": {"size": 3, "distance": "Cosine"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
            .expect(1)
            .mount(&server)
            .await;

        let created = store_for(&server).ensure_collection().await.expect("ensure");
        assert!(created);
    }

    #[tokio::test]
    async fn existing_collection_with_matching_size_is_left_alone() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COLLECTION_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"config": {"params": {"vectors": {"size": 3, "distance": "Cosine"}}}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(COLLECTION_PATH))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let store = store_for(&server);
        assert!(!store.ensure_collection().await.expect("ensure"));
        assert!(!store.ensure_collection().await.expect("ensure twice"));
    }

    #[tokio::test]
    async fn existing_collection_with_other_size_is_a_schema_mismatch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COLLECTION_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"config": {"params": {"vectors": {"size": 1536, "distance": "Cosine"}}}}
            })))
            .mount(&server)
            .await;

        let error = store_for(&server)
            .ensure_collection()
            .await
            .expect_err("size mismatch must fail");
        assert_eq!(error.kind(), ErrorKind::SchemaMismatch);
    }

    #[tokio::test]
    async fn wrong_dimension_upsert_never_reaches_the_server() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(format!("{COLLECTION_PATH}/points")))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let records = vec![
            record("a", vec![1.0, 0.0, 0.0]),
            record("b", vec![1.0, 0.0]),
        ];
        let error = store_for(&server)
            .upsert(&records)
            .await
            .expect_err("dimension mismatch must fail");
        assert!(matches!(
            error,
            RagError::Dimension {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[tokio::test]
    async fn upsert_sends_text_and_metadata_payload() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(format!("{COLLECTION_PATH}/points")))
            .and(body_partial_json(json!({
                "points": [{
                    "id": "a",
                    "payload": {
                        "page_content": "text for a",
                        "metadata": {"page": 2, "source": "handbook.pdf"}
                    }
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {"status": "completed"}})))
            .expect(1)
            .mount(&server)
            .await;

        store_for(&server)
            .upsert(&[record("a", vec![0.1, 0.2, 0.3])])
            .await
            .expect("upsert");
    }

    #[tokio::test]
    async fn search_returns_at_most_top_k_sorted_by_score() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{COLLECTION_PATH}/points/search")))
            .and(body_partial_json(json!({"limit": 2, "score_threshold": 0.5})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [
                    {"id": "b", "score": 0.61, "payload": {"page_content": "second", "metadata": {"page": 3}}},
                    {"id": "a", "score": 0.92, "payload": {"page_content": "first", "metadata": {"page": 1, "source": "handbook.pdf"}}},
                    {"id": "c", "score": 0.55, "payload": {"page_content": "third"}}
                ]
            })))
            .mount(&server)
            .await;

        let hits = store_for(&server)
            .search(
                &[0.1, 0.2, 0.3],
                &SearchParams {
                    top_k: 2,
                    score_threshold: Some(0.5),
                },
            )
            .await
            .expect("search");

        assert_eq!(hits.len(), 2);
        assert!(hits.windows(2).all(|pair| pair[0].score >= pair[1].score));
        assert_eq!(hits[0].text, "first");
        assert_eq!(hits[0].page, Some(1));
        assert_eq!(hits[0].source.as_deref(), Some("handbook.pdf"));
    }

    #[tokio::test]
    async fn search_on_missing_collection_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{COLLECTION_PATH}/points/search")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let error = store_for(&server)
            .search(&[0.1, 0.2, 0.3], &SearchParams::top_k(4))
            .await
            .expect_err("missing collection must fail");
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn count_reads_exact_point_count() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{COLLECTION_PATH}/points/count")))
            .and(body_partial_json(json!({"exact": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {"count": 10}})))
            .mount(&server)
            .await;

        assert_eq!(store_for(&server).count().await.expect("count"), 10);
    }

    #[tokio::test]
    async fn bad_api_key_is_an_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{COLLECTION_PATH}/points/count")))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let error = store_for(&server).count().await.expect_err("must fail");
        assert_eq!(error.kind(), ErrorKind::Auth);
    }

    async fn search_answering(
        server: &MockServer,
        body: Value,
    ) -> Result<Vec<ScoredChunk>, RagError> {
        Mock::given(method("POST"))
            .and(path(format!("{COLLECTION_PATH}/points/search")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;

        store_for(server)
            .search(&[0.1, 0.2, 0.3], &SearchParams::top_k(4))
            .await
    }

    #[tokio::test]
    async fn search_response_without_result_is_a_service_error() {
        let server = MockServer::start().await;
        let error = search_answering(&server, json!({"status": {"error": "boom"}}))
            .await
            .expect_err("missing result must fail");
        assert_eq!(error.kind(), ErrorKind::Service);
    }

    #[tokio::test]
    async fn search_hit_without_score_is_a_service_error() {
        let server = MockServer::start().await;
        let error = search_answering(
            &server,
            json!({"result": [{"id": "a", "payload": {"page_content": "first"}}]}),
        )
        .await
        .expect_err("missing score must fail");
        assert_eq!(error.kind(), ErrorKind::Service);
        assert!(error.to_string().contains("score"));
    }

    #[tokio::test]
    async fn search_hit_without_text_is_a_service_error() {
        let server = MockServer::start().await;
        let error = search_answering(
            &server,
            json!({"result": [{"id": "a", "score": 0.9, "payload": {"metadata": {"page": 1}}}]}),
        )
        .await
        .expect_err("missing page_content must fail");
        assert_eq!(error.kind(), ErrorKind::Service);
        assert!(error.to_string().contains("page_content"));
    }

    #[tokio::test]
    async fn search_hit_without_id_is_a_service_error() {
        let server = MockServer::start().await;
        let error = search_answering(
            &server,
            json!({"result": [{"score": 0.9, "payload": {"page_content": "first"}}]}),
        )
        .await
        .expect_err("missing id must fail");
        assert_eq!(error.kind(), ErrorKind::Service);
        assert!(error.to_string().contains("id"));
    }

    #[tokio::test]
    async fn empty_result_array_is_no_hits() {
        let server = MockServer::start().await;
        let hits = search_answering(&server, json!({"result": []}))
            .await
            .expect("empty result is valid");
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn failed_later_batch_surfaces_as_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(format!("{COLLECTION_PATH}/points")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {"status": "completed"}})))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(format!("{COLLECTION_PATH}/points")))
            .respond_with(ResponseTemplate::new(500).set_body_string("disk full"))
            .expect(1)
            .mount(&server)
            .await;

        let records = (0..300)
            .map(|index| record(&format!("p{index}"), vec![0.1, 0.2, 0.3]))
            .collect::<Vec<_>>();
        let error = store_for(&server)
            .upsert(&records)
            .await
            .expect_err("second batch must fail");
        assert_eq!(error.kind(), ErrorKind::Service);
        assert!(error.to_string().contains("disk full"));
    }
}
