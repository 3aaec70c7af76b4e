use crate::RagError;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Immutable runtime configuration, read once at startup and handed to each
/// component's constructor.
///
/// `None` in the tuning fields means "use the variant's default".
#[derive(Clone)]
pub struct RagConfig {
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: String,
    pub embedding_model: String,
    pub qdrant_host: String,
    pub qdrant_key: String,
    pub collection_name: String,
    pub pdf_path: PathBuf,
    pub vector_size: usize,
    pub top_k: Option<usize>,
    pub score_threshold: Option<f32>,
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
    pub system_prompt: Option<String>,
    pub request_timeout: Duration,
}

impl fmt::Debug for RagConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RagConfig")
            .field("openai_api_key", &"<redacted>")
            .field("openai_model", &self.openai_model)
            .field("openai_base_url", &self.openai_base_url)
            .field("embedding_model", &self.embedding_model)
            .field("qdrant_host", &self.qdrant_host)
            .field("qdrant_key", &"<redacted>")
            .field("collection_name", &self.collection_name)
            .field("pdf_path", &self.pdf_path)
            .field("vector_size", &self.vector_size)
            .field("top_k", &self.top_k)
            .field("score_threshold", &self.score_threshold)
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .field("system_prompt", &self.system_prompt.is_some())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl RagConfig {
    pub fn from_env() -> Result<Self, RagError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RagError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let required = |name: &str| {
            get(name).ok_or_else(|| RagError::Config(format!("{name} is not set")))
        };

        let qdrant_key = get("QDRANT_KEY")
            .or_else(|| get("QDRANT_API_KEY"))
            .ok_or_else(|| RagError::Config("QDRANT_KEY is not set".to_string()))?;

        let vector_size: usize = parse_value("VECTOR_SIZE", &required("VECTOR_SIZE")?)?;
        if vector_size == 0 {
            return Err(RagError::Config(
                "VECTOR_SIZE must be a positive integer".to_string(),
            ));
        }

        let top_k = get("TOP_K")
            .map(|value| parse_value::<usize>("TOP_K", &value))
            .transpose()?;
        if top_k == Some(0) {
            return Err(RagError::Config("TOP_K must be at least 1".to_string()));
        }

        let score_threshold = get("SCORE_THRESHOLD")
            .map(|value| parse_value::<f32>("SCORE_THRESHOLD", &value))
            .transpose()?;
        let chunk_size = get("CHUNK_SIZE")
            .map(|value| parse_value::<usize>("CHUNK_SIZE", &value))
            .transpose()?;
        let chunk_overlap = get("CHUNK_OVERLAP")
            .map(|value| parse_value::<usize>("CHUNK_OVERLAP", &value))
            .transpose()?;
        let timeout_secs = get("REQUEST_TIMEOUT_SECS")
            .map(|value| parse_value::<u64>("REQUEST_TIMEOUT_SECS", &value))
            .transpose()?
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        Ok(Self {
            openai_api_key: required("OPENAI_API_KEY")?,
            openai_model: required("OPENAI_MODEL")?,
            openai_base_url: endpoint(
                "OPENAI_BASE_URL",
                get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            )?,
            embedding_model: get("OPENAI_EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            qdrant_host: endpoint("QDRANT_HOST", required("QDRANT_HOST")?)?,
            qdrant_key,
            collection_name: required("COLLECTION_NAME")?,
            pdf_path: PathBuf::from(required("PDF_PATH")?),
            vector_size,
            top_k,
            score_threshold,
            chunk_size,
            chunk_overlap,
            system_prompt: get("SYSTEM_PROMPT"),
            request_timeout: Duration::from_secs(timeout_secs.max(1)),
        })
    }
}

fn parse_value<T: FromStr>(name: &str, value: &str) -> Result<T, RagError> {
    value
        .parse()
        .map_err(|_| RagError::Config(format!("{name} has an invalid value: {value}")))
}

fn endpoint(name: &str, value: String) -> Result<String, RagError> {
    Url::parse(&value).map_err(|error| RagError::Config(format!("{name} is not a url: {error}")))?;
    Ok(value.trim_end_matches('/').to_string())
}
