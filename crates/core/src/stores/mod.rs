pub mod qdrant;

pub use qdrant::QdrantStore;

use crate::{RagError, VectorRecord};

/// Rejects the whole batch if any vector has the wrong length, so a failed
/// upsert never leaves a partial write behind.
pub(crate) fn check_dimensions(records: &[VectorRecord], expected: usize) -> Result<(), RagError> {
    match records.iter().find(|record| record.vector.len() != expected) {
        Some(record) => Err(RagError::Dimension {
            expected,
            actual: record.vector.len(),
        }),
        None => Ok(()),
    }
}
