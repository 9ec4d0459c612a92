use thiserror::Error;

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum AttachError {
    #[error("pane {target} not found")]
    NotFound { target: String },

    #[error("failed to start monitor for {target}: {reason}")]
    SpawnFailure { target: String, reason: String },

    #[error("pane {pane_id} stream ended")]
    StreamEnded { pane_id: String },

    #[error("failed to forward input to {pane_id}: {reason}")]
    InjectionFailure { pane_id: String, reason: String },

    #[error("connection pool is at capacity ({max}) with nothing evictable")]
    CapacityExceeded { max: usize },
}
