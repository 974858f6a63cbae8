//! Error types for Kapittel.

use thiserror::Error;

/// Library-level error type for Kapittel operations.
#[derive(Error, Debug)]
pub enum KapittelError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),

    #[error("Transcription failed for chunk {chunk_index} after {attempts} attempt(s): {message}")]
    Transcription {
        chunk_index: usize,
        attempts: u32,
        message: String,
    },

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("{operation} timed out after {seconds:.1}s")]
    Timeout { operation: String, seconds: f64 },

    #[error("Could not parse chapter response: {0}")]
    SegmentationParse(String),

    #[error("Chapter segmentation rejected after {attempts} attempt(s): {detail}")]
    SegmentationValidation { attempts: u32, detail: String },

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Indexing into '{collection}' incomplete ({indexed}/{total} chapters): {message}")]
    IndexIncomplete {
        collection: String,
        indexed: usize,
        total: usize,
        message: String,
    },

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("RAG error: {0}")]
    Rag(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl KapittelError {
    /// Whether a retry of the same call could plausibly succeed.
    ///
    /// Collaborator transport failures, timeouts and store write failures are
    /// transient; malformed input and lookups of unknown names are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            KapittelError::OpenAI(_)
                | KapittelError::Timeout { .. }
                | KapittelError::Http(_)
                | KapittelError::VectorStore(_)
                | KapittelError::Database(_)
        )
    }
}

/// Result type alias for Kapittel operations.
pub type Result<T> = std::result::Result<T, KapittelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(KapittelError::OpenAI("503".into()).is_retryable());
        assert!(KapittelError::Timeout {
            operation: "embed".into(),
            seconds: 1.0
        }
        .is_retryable());
        assert!(!KapittelError::InvalidInput("empty".into()).is_retryable());
        assert!(!KapittelError::CollectionNotFound("x".into()).is_retryable());
    }

    #[test]
    fn test_transcription_error_names_chunk() {
        let err = KapittelError::Transcription {
            chunk_index: 2,
            attempts: 4,
            message: "boom".into(),
        };
        assert_eq!(
            err.to_string(),
            "Transcription failed for chunk 2 after 4 attempt(s): boom"
        );
    }
}
