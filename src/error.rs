use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("no trained model has been activated")]
    ModelNotTrained,

    #[error("training population too small: {vectors} vectors from {entities} entities (need {min_vectors} vectors from {min_entities} entities)")]
    InsufficientTrainingData {
        vectors: usize,
        entities: usize,
        min_vectors: usize,
        min_entities: usize,
    },

    #[error("feature schema mismatch: expected {expected} features at schema v{expected_schema}, got {got} at schema v{got_schema}")]
    FeatureSchemaMismatch {
        expected: usize,
        got: usize,
        expected_schema: u32,
        got_schema: u32,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("artifact decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("artifact metadata error: {0}")]
    Metadata(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
