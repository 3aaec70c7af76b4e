use thiserror::Error;

/// Coarse classification of a [`RagError`], stable across the variants that
/// wrap library errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Parse,
    Config,
    Auth,
    RateLimit,
    Service,
    Dimension,
    SchemaMismatch,
}

#[derive(Debug, Error)]
pub enum RagError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("pdf parse error: {0}")]
    Parse(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{service} rejected credentials: {details}")]
    Auth { service: String, details: String },

    #[error("{service} rate limited the request")]
    RateLimited { service: String },

    #[error("{service} request failed: {details}")]
    Service { service: String, details: String },

    #[error("vector dimension {actual} does not match configured size {expected}")]
    Dimension { expected: usize, actual: usize },

    #[error("collection {collection} has vector size {actual}, expected {expected}")]
    SchemaMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

impl RagError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Parse(_) => ErrorKind::Parse,
            Self::Config(_) | Self::Url(_) => ErrorKind::Config,
            Self::Auth { .. } => ErrorKind::Auth,
            Self::RateLimited { .. } => ErrorKind::RateLimit,
            Self::Service { .. } | Self::Http(_) | Self::Serialization(_) => ErrorKind::Service,
            Self::Dimension { .. } => ErrorKind::Dimension,
            Self::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            Self::Io(error) if error.kind() == std::io::ErrorKind::NotFound => {
                ErrorKind::NotFound
            }
            Self::Io(_) => ErrorKind::Service,
        }
    }

    pub(crate) fn service(service: &str, details: impl Into<String>) -> Self {
        Self::Service {
            service: service.to_string(),
            details: details.into(),
        }
    }
}

pub type Result<T, E = RagError> = std::result::Result<T, E>;
