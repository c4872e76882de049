use thiserror::Error;

use crate::PinId;

#[derive(Error, Debug)]
pub enum BomError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error(
        "pin {pin} on board {board} is already assigned; recalculate the BOM and apply again"
    )]
    Conflict { board: String, pin: PinId },

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("failed to read or write inventory: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to lock inventory {path}: {message}")]
    Lock { path: String, message: String },

    #[error("failed to parse inventory JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl BomError {
    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        BomError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Whether the caller should recompute the plan and retry
    pub fn is_conflict(&self) -> bool {
        matches!(self, BomError::Conflict { .. })
    }
}
