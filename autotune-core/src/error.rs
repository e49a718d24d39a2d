//! Error types for the correction engine

use thiserror::Error;

/// Correction engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// The tick worker thread could not be spawned
    #[error("failed to spawn tick worker: {0}")]
    Spawn(#[source] std::io::Error),

    /// The engine was used after `dispose()`
    #[error("engine has been disposed")]
    Disposed,

    /// Settings or config file I/O
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings or config (de)serialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
