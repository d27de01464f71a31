//! Engine-level error types.

use thiserror::Error;
use uuid::Uuid;

/// Configuration errors — surfaced synchronously to whoever is trying to
/// save or run a definition; nothing gets persisted past one of these.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Pipeline name is required")]
    NameRequired,

    #[error("At least one start URL is required")]
    StartUrlsRequired,

    #[error("At least one block is required")]
    BlocksRequired,

    /// A block declares a kind outside {Selector, Processor, Output}.
    #[error("invalid block type: {0}")]
    InvalidBlockKind(String),

    /// Some `next` entry points at an id that is not in the block set.
    #[error("block {0} referenced in 'next' does not exist")]
    MissingNextTarget(String),

    /// The `next` relation is not acyclic.
    #[error("cycle detected in block connections")]
    CycleDetected,
}

/// Errors produced by the engine (validation + execution lifecycle).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("pipeline {0} not found")]
    PipelineNotFound(Uuid),

    /// A run is already tracked for this pipeline id.
    #[error("pipeline {0} is already running")]
    AlreadyRunning(Uuid),

    /// No run is tracked for this pipeline id.
    #[error("pipeline {0} is not running")]
    NotRunning(Uuid),

    /// A persisted definition no longer decodes into the domain types.
    #[error("malformed pipeline definition: {0}")]
    MalformedDefinition(#[from] serde_json::Error),

    /// Persistence error from the db crate.
    #[error("database error: {0}")]
    Database(#[from] db::DbError),
}
