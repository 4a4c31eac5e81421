use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PerformanceError {
    #[error("unknown {kind}: {value:?}")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("invalid configuration for {key}: {reason}")]
    InvalidConfig { key: &'static str, reason: String },

    #[error("import row {row} rejected: {reason}")]
    InvalidImportRow { row: usize, reason: String },

    #[error("outlier threshold must be a positive number, got {0}")]
    InvalidThreshold(f64),

    #[error("review {0} is already submitted")]
    AlreadySubmitted(Uuid),

    #[error("review {review_id} is missing criteria scores: {}", .missing.join(", "))]
    MissingCriteria {
        review_id: Uuid,
        missing: Vec<&'static str>,
    },
}

impl PerformanceError {
    pub(crate) fn unknown(kind: &'static str, value: &str) -> Self {
        PerformanceError::UnknownVariant {
            kind,
            value: value.to_string(),
        }
    }
}
