//! `engine` crate — core domain models, graph validation, the pipeline
//! interpreter, and the execution coordinator.

pub mod coordinator;
pub mod error;
pub mod graph;
pub mod interpreter;
pub mod model;
pub mod registry;

pub use coordinator::Coordinator;
pub use error::{EngineError, ValidationError};
pub use graph::{validate_pipeline, VALID_MESSAGE};
pub use interpreter::{entry_blocks, interpret, interpret_from, Record};
pub use model::{Block, BlockKind, CompiledBlock, PipelineConfig};
pub use registry::RunRegistry;
