//! Core domain models for the pipeline engine.
//!
//! These types are the source of truth for what a pipeline looks like in
//! memory. A [`Block`] serialises to/from the `{id, type, params}` objects
//! stored in the JSONB `blocks` column; fields we don't recognise ride along
//! untouched so stored definitions round-trip exactly.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved key inside `params` that carries successor block ids.
pub const NEXT_KEY: &str = "next";

// ---------------------------------------------------------------------------
// BlockKind
// ---------------------------------------------------------------------------

/// The closed set of block kinds the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    Selector,
    Processor,
    Output,
}

impl BlockKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Selector" => Some(Self::Selector),
            "Processor" => Some(Self::Processor),
            "Output" => Some(Self::Output),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// A single step in the pipeline graph, in its open storage shape.
///
/// Semantics of `params` depend on `kind`; [`Block::compile`] decodes them
/// once into the typed [`CompiledBlock`] view the interpreter dispatches on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// Unique identifier within this pipeline (referenced by `next`).
    pub id: String,
    /// One of `Selector | Processor | Output`; anything else fails
    /// validation and is skipped (with a warning) at runtime.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub params: serde_json::Map<String, Value>,
    /// Fields outside the known shape, preserved for round-tripping.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Block {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            params: serde_json::Map::new(),
            extra: serde_json::Map::new(),
        }
    }

    /// Builder-style param setter, mostly for tests and examples.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Successor block ids, normalized to an ordered list.
    ///
    /// `params.next` may be a single id, a list of ids, or absent; entries
    /// of any other JSON type contribute no successors.
    pub fn next_ids(&self) -> Vec<String> {
        match self.params.get(NEXT_KEY) {
            Some(Value::String(id)) => vec![id.clone()],
            Some(Value::Array(ids)) => ids
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn param_str(&self, key: &str, default: &str) -> String {
        self.params
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    }

    /// Decode the open param map into the typed view, once.
    ///
    /// Unrecognised kinds become [`CompiledBlock::Unknown`] — the
    /// interpreter's skip-with-warning path — rather than an error, because
    /// the engine must not trust that validation ran.
    pub fn compile(&self) -> CompiledBlock {
        match BlockKind::parse(&self.kind) {
            Some(BlockKind::Selector) => CompiledBlock::Selector {
                selector: self.param_str("selector", ""),
                selector_type: self.param_str("selector_type", "css"),
                next: self.next_ids(),
            },
            Some(BlockKind::Processor) => CompiledBlock::Processor {
                processor_type: self.param_str("processor_type", "extract"),
                pattern: self.param_str("pattern", ""),
                next: self.next_ids(),
            },
            Some(BlockKind::Output) => CompiledBlock::Output {
                field_name: self.param_str("field_name", "data"),
            },
            None => CompiledBlock::Unknown {
                kind: self.kind.clone(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// CompiledBlock
// ---------------------------------------------------------------------------

/// Typed per-kind view of a block's parameters.
///
/// `selector_type` and `processor_type` stay as strings: an unknown value
/// there is a *local* runtime error (log, skip the branch), not a decode
/// failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompiledBlock {
    Selector {
        selector: String,
        selector_type: String,
        next: Vec<String>,
    },
    Processor {
        processor_type: String,
        pattern: String,
        next: Vec<String>,
    },
    Output {
        field_name: String,
    },
    Unknown {
        kind: String,
    },
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

/// A complete pipeline definition as the engine consumes it: received by
/// value for validation/execution, never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub start_urls: Vec<String>,
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub settings: serde_json::Map<String, Value>,
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn next_normalizes_string_list_and_absent() {
        let single = Block::new("a", "Selector").with_param("next", "b");
        assert_eq!(single.next_ids(), vec!["b"]);

        let many = Block::new("a", "Selector").with_param("next", json!(["b", "c"]));
        assert_eq!(many.next_ids(), vec!["b", "c"]);

        let none = Block::new("a", "Output");
        assert!(none.next_ids().is_empty());

        // Other JSON types carry no successors.
        let odd = Block::new("a", "Selector").with_param("next", json!(42));
        assert!(odd.next_ids().is_empty());
    }

    #[test]
    fn storage_shape_round_trips_including_unknown_fields() {
        let wire = json!({
            "id": "b1",
            "type": "Selector",
            "params": { "selector": "h1", "selector_type": "css", "next": "b2" },
            "position": { "x": 40, "y": 120 }
        });

        let block: Block = serde_json::from_value(wire.clone()).unwrap();
        assert_eq!(block.id, "b1");
        assert_eq!(block.kind, "Selector");
        assert_eq!(block.extra["position"]["x"], 40);

        let back = serde_json::to_value(&block).unwrap();
        assert_eq!(back, wire);
    }

    #[test]
    fn compile_applies_documented_defaults() {
        let selector = Block::new("s", "Selector").compile();
        assert_eq!(
            selector,
            CompiledBlock::Selector {
                selector: String::new(),
                selector_type: "css".into(),
                next: vec![],
            }
        );

        let processor = Block::new("p", "Processor").compile();
        assert_eq!(
            processor,
            CompiledBlock::Processor {
                processor_type: "extract".into(),
                pattern: String::new(),
                next: vec![],
            }
        );

        let output = Block::new("o", "Output").compile();
        assert_eq!(
            output,
            CompiledBlock::Output {
                field_name: "data".into(),
            }
        );
    }

    #[test]
    fn unrecognized_kind_compiles_to_unknown() {
        let block = Block::new("x", "Teleporter").compile();
        assert_eq!(
            block,
            CompiledBlock::Unknown {
                kind: "Teleporter".into()
            }
        );
    }
}
