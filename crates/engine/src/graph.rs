//! Graph validation — run this before persisting or executing a pipeline.
//!
//! Rules enforced, in order, short-circuiting on first failure:
//! 1. A non-empty name.
//! 2. At least one start URL.
//! 3. At least one block.
//! 4. Every block kind within the closed set.
//! 5. Every `next` target present in the block set (referential integrity).
//! 6. The `next` relation acyclic (topological sort must succeed).
//!
//! Duplicate block ids are *not* rejected: existing definitions carry them
//! and the interpreter resolves ids last-declaration-wins. The cycle check
//! counts distinct ids so a duplicate cannot fabricate a cycle verdict.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::ValidationError;
use crate::model::{Block, BlockKind};

/// Message returned by a successful validation, also used verbatim by the
/// HTTP validate endpoint.
pub const VALID_MESSAGE: &str = "Configuration is valid";

/// Validate a pipeline definition. Stateless: the same input always yields
/// the same verdict.
pub fn validate_pipeline(
    name: &str,
    start_urls: &[String],
    blocks: &[Block],
) -> Result<&'static str, ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::NameRequired);
    }
    if start_urls.is_empty() {
        return Err(ValidationError::StartUrlsRequired);
    }
    if blocks.is_empty() {
        return Err(ValidationError::BlocksRequired);
    }

    for block in blocks {
        if BlockKind::parse(&block.kind).is_none() {
            return Err(ValidationError::InvalidBlockKind(block.kind.clone()));
        }
    }

    let ids: HashSet<&str> = blocks.iter().map(|b| b.id.as_str()).collect();

    // -----------------------------------------------------------------------
    // Referential integrity, collecting edges for the cycle check below.
    // -----------------------------------------------------------------------
    let mut edges: Vec<(&str, &str)> = Vec::new();
    for block in blocks {
        for next in block.next_ids() {
            let Some(&target) = ids.get(next.as_str()) else {
                return Err(ValidationError::MissingNextTarget(next));
            };
            edges.push((block.id.as_str(), target));
        }
    }

    // -----------------------------------------------------------------------
    // Cycle check: Kahn's algorithm over the distinct ids.
    // -----------------------------------------------------------------------
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = HashMap::new();

    for &id in &ids {
        adjacency.entry(id).or_default();
        in_degree.entry(id).or_insert(0);
    }
    for (from, to) in edges {
        adjacency.entry(from).or_default().push(to);
        *in_degree.entry(to).or_insert(0) += 1;
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, &d)| d == 0)
        .map(|(&id, _)| id)
        .collect();

    let mut visited = 0usize;
    while let Some(id) = queue.pop_front() {
        visited += 1;
        if let Some(neighbours) = adjacency.get(id) {
            for &neighbour in neighbours {
                let deg = in_degree.entry(neighbour).or_insert(0);
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(neighbour);
                }
            }
        }
    }

    // Not every id drained to in-degree zero: there is a cycle.
    if visited != ids.len() {
        return Err(ValidationError::CycleDetected);
    }

    Ok(VALID_MESSAGE)
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn urls() -> Vec<String> {
        vec!["https://example.com".to_string()]
    }

    /// b1 (Selector) → b2 (Output), the smallest useful pipeline.
    fn minimal_chain() -> Vec<Block> {
        vec![
            Block::new("b1", "Selector")
                .with_param("selector", "h1")
                .with_param("selector_type", "css")
                .with_param("next", "b2"),
            Block::new("b2", "Output").with_param("field_name", "title"),
        ]
    }

    #[test]
    fn minimal_chain_is_valid() {
        let verdict = validate_pipeline("news", &urls(), &minimal_chain());
        assert_eq!(verdict, Ok(VALID_MESSAGE));
    }

    #[test]
    fn empty_name_is_rejected_first() {
        // Everything else is wrong too; the name check wins.
        let err = validate_pipeline("", &[], &[]).unwrap_err();
        assert_eq!(err, ValidationError::NameRequired);

        let blank = validate_pipeline("   ", &urls(), &minimal_chain()).unwrap_err();
        assert_eq!(blank, ValidationError::NameRequired);
    }

    #[test]
    fn empty_start_urls_are_rejected() {
        let err = validate_pipeline("news", &[], &minimal_chain()).unwrap_err();
        assert_eq!(err, ValidationError::StartUrlsRequired);
    }

    #[test]
    fn empty_blocks_are_rejected_with_the_documented_message() {
        let err = validate_pipeline("news", &urls(), &[]).unwrap_err();
        assert_eq!(err.to_string(), "At least one block is required");
    }

    #[test]
    fn unknown_block_kind_is_named_in_the_error() {
        let blocks = vec![Block::new("b1", "Transmogrifier")];
        let err = validate_pipeline("news", &urls(), &blocks).unwrap_err();
        assert_eq!(err.to_string(), "invalid block type: Transmogrifier");
    }

    #[test]
    fn dangling_next_reference_names_the_missing_id() {
        let blocks = vec![
            Block::new("b1", "Selector").with_param("next", "missing"),
        ];
        let err = validate_pipeline("news", &urls(), &blocks).unwrap_err();
        assert_eq!(err, ValidationError::MissingNextTarget("missing".into()));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn dangling_reference_inside_a_next_list_is_caught() {
        let blocks = vec![
            Block::new("b1", "Selector").with_param("next", json!(["b2", "ghost"])),
            Block::new("b2", "Output"),
        ];
        let err = validate_pipeline("news", &urls(), &blocks).unwrap_err();
        assert_eq!(err, ValidationError::MissingNextTarget("ghost".into()));
    }

    #[test]
    fn mutual_references_are_rejected_as_a_cycle() {
        let blocks = vec![
            Block::new("b1", "Selector").with_param("next", "b2"),
            Block::new("b2", "Selector").with_param("next", "b1"),
        ];
        let err = validate_pipeline("news", &urls(), &blocks).unwrap_err();
        assert_eq!(err, ValidationError::CycleDetected);
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let blocks = vec![Block::new("b1", "Selector").with_param("next", "b1")];
        let err = validate_pipeline("news", &urls(), &blocks).unwrap_err();
        assert_eq!(err, ValidationError::CycleDetected);
    }

    #[test]
    fn fully_referenced_but_acyclic_graph_passes() {
        // Diamond: every node except the root is a `next` target; only a
        // coarse |referenced| >= |all| heuristic would reject this.
        let blocks = vec![
            Block::new("root", "Selector")
                .with_param("selector", "div")
                .with_param("next", json!(["left", "right"])),
            Block::new("left", "Processor").with_param("next", "out"),
            Block::new("right", "Processor").with_param("next", "out"),
            Block::new("out", "Output"),
        ];
        assert_eq!(validate_pipeline("news", &urls(), &blocks), Ok(VALID_MESSAGE));
    }

    #[test]
    fn duplicate_block_ids_are_not_rejected() {
        // Documented current behavior, not a guarantee.
        let blocks = vec![
            Block::new("b1", "Selector").with_param("next", "b2"),
            Block::new("b1", "Selector").with_param("next", "b2"),
            Block::new("b2", "Output"),
        ];
        assert_eq!(validate_pipeline("news", &urls(), &blocks), Ok(VALID_MESSAGE));
    }

    #[test]
    fn validation_is_idempotent() {
        let blocks = minimal_chain();
        let first = validate_pipeline("news", &urls(), &blocks);
        let second = validate_pipeline("news", &urls(), &blocks);
        assert_eq!(first, second);

        let bad = vec![Block::new("b1", "Selector").with_param("next", "nope")];
        assert_eq!(
            validate_pipeline("news", &urls(), &bad),
            validate_pipeline("news", &urls(), &bad),
        );
    }
}
