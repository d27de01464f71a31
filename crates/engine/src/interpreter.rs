//! Pipeline interpreter — walks the block graph over one fetched document
//! and yields output records lazily.
//!
//! Traversal is an explicit work-stack depth-first walk (no recursion, so
//! deep pipelines cannot exhaust the call stack). Successors are pushed in
//! reverse so pop order equals declared order: a Selector matching
//! `[e1, e2]` with successors `[n1, n2]` emits in the order
//! e1×n1, e1×n2, e2×n1, e2×n2.
//!
//! Block-local failures — unknown selector/processor type, a query that
//! doesn't parse, a successor id that no longer resolves — abandon that
//! branch with a log line; sibling branches and the rest of the run carry
//! on. The interpreter holds no shared state and is safe to drive
//! concurrently for different documents.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use regex::Regex;
use serde_json::Value;
use tracing::{error, warn};

use dom::{DocumentAdapter, SelectorKind};

use crate::model::{Block, CompiledBlock};

/// One emitted output record: the configured field plus `timestamp` and
/// (when the source document has one) `url`.
pub type Record = serde_json::Map<String, Value>;

/// The value flowing along an edge: a document/element handle, or a scalar
/// produced by a processor (which may be null after an unmatched regex).
#[derive(Clone)]
enum StepValue<N> {
    Node(N),
    Text(Option<String>),
}

/// Entry points of the graph: ids never named as a `next` target, in
/// declaration order.
///
/// When every id is referenced (possible only for definitions that bypassed
/// validation) the walk falls back to the first declared block instead of
/// going silent.
pub fn entry_blocks(blocks: &[Block]) -> Vec<String> {
    let referenced: HashSet<String> = blocks.iter().flat_map(Block::next_ids).collect();

    let mut seen = HashSet::new();
    let entries: Vec<String> = blocks
        .iter()
        .map(|b| b.id.as_str())
        .filter(|id| !referenced.contains(*id) && seen.insert(id.to_string()))
        .map(str::to_string)
        .collect();

    if entries.is_empty() {
        if let Some(first) = blocks.first() {
            warn!(
                block_id = %first.id,
                "no entry block found; falling back to the first declared block"
            );
            return vec![first.id.clone()];
        }
    }
    entries
}

/// Lazy record stream over one document. Finite; each [`interpret`] call
/// starts fresh from the root.
pub struct Records<'a, A: DocumentAdapter> {
    adapter: &'a A,
    blocks: HashMap<&'a str, CompiledBlock>,
    stack: Vec<(String, StepValue<A::Node>)>,
}

/// Interpret `blocks` against a document, starting from the graph's entry
/// blocks.
pub fn interpret<'a, A: DocumentAdapter>(
    adapter: &'a A,
    root: A::Node,
    blocks: &'a [Block],
) -> Records<'a, A> {
    let entries = entry_blocks(blocks);
    interpret_from(adapter, root, blocks, &entries)
}

/// Interpret `blocks` starting from an explicit entry set (mostly for
/// tests; [`interpret`] derives the entry set itself).
pub fn interpret_from<'a, A: DocumentAdapter>(
    adapter: &'a A,
    root: A::Node,
    blocks: &'a [Block],
    entries: &[String],
) -> Records<'a, A> {
    // Duplicate ids resolve last-declaration-wins, matching map insertion.
    let compiled: HashMap<&str, CompiledBlock> = blocks
        .iter()
        .map(|b| (b.id.as_str(), b.compile()))
        .collect();

    let stack = entries
        .iter()
        .rev()
        .map(|id| (id.clone(), StepValue::Node(root.clone())))
        .collect();

    Records {
        adapter,
        blocks: compiled,
        stack,
    }
}

impl<A: DocumentAdapter> Iterator for Records<'_, A> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        while let Some((block_id, value)) = self.stack.pop() {
            let Some(block) = self.blocks.get(block_id.as_str()) else {
                error!(%block_id, "block referenced in 'next' was not found; skipping branch");
                continue;
            };

            match block {
                CompiledBlock::Selector {
                    selector,
                    selector_type,
                    next,
                } => {
                    let Some(kind) = SelectorKind::parse(selector_type) else {
                        error!(%block_id, %selector_type, "unknown selector type; skipping branch");
                        continue;
                    };
                    let StepValue::Node(node) = &value else {
                        error!(%block_id, "selector applied to a scalar value; skipping branch");
                        continue;
                    };
                    match self.adapter.query(node, selector, kind) {
                        Ok(matches) => {
                            // Reverse push so pop order is e1×n1 first.
                            for element in matches.iter().rev() {
                                for succ in next.iter().rev() {
                                    self.stack
                                        .push((succ.clone(), StepValue::Node(element.clone())));
                                }
                            }
                        }
                        Err(e) => {
                            error!(%block_id, %selector, error = %e, "selector query failed; skipping branch");
                        }
                    }
                }

                CompiledBlock::Processor {
                    processor_type,
                    pattern,
                    next,
                } => {
                    let input = match &value {
                        StepValue::Node(node) => Some(self.adapter.text(node)),
                        StepValue::Text(text) => text.clone(),
                    };

                    let data: Option<String> = match processor_type.as_str() {
                        // On a single intermediate value the two extractions
                        // coincide; the distinction only exists over match
                        // lists, which the Selector fan-out already splits.
                        "extract" | "extract_first" => input,
                        "regular_expression" => {
                            let re = match Regex::new(pattern) {
                                Ok(re) => re,
                                Err(e) => {
                                    error!(%block_id, %pattern, error = %e, "invalid pattern; skipping branch");
                                    continue;
                                }
                            };
                            input.and_then(|text| {
                                re.captures(&text)
                                    .and_then(|caps| caps.get(1))
                                    .map(|group| group.as_str().to_string())
                            })
                        }
                        other => {
                            error!(%block_id, processor_type = %other, "unknown processor type; skipping branch");
                            continue;
                        }
                    };

                    for succ in next.iter().rev() {
                        self.stack.push((succ.clone(), StepValue::Text(data.clone())));
                    }
                }

                CompiledBlock::Output { field_name } => {
                    let (field_value, url) = match &value {
                        StepValue::Node(node) => (
                            Value::String(self.adapter.text(node)),
                            self.adapter.url_of(node),
                        ),
                        StepValue::Text(text) => (
                            text.clone().map(Value::String).unwrap_or(Value::Null),
                            None,
                        ),
                    };

                    let mut record = Record::new();
                    record.insert(field_name.clone(), field_value);
                    record.insert(
                        "timestamp".to_string(),
                        Value::String(Utc::now().to_rfc3339()),
                    );
                    if let Some(url) = url {
                        record.insert("url".to_string(), Value::String(url));
                    }
                    // Terminal: one record, no recursion into `next`.
                    return Some(record);
                }

                CompiledBlock::Unknown { kind } => {
                    warn!(%block_id, %kind, "unknown block type reached at runtime; skipping");
                }
            }
        }
        None
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use dom::HtmlDocument;
    use serde_json::json;

    fn doc(body: &str) -> HtmlDocument {
        HtmlDocument::parse(body, Some("https://example.com".to_string()))
    }

    fn run(document: &HtmlDocument, blocks: &[Block]) -> Vec<Record> {
        interpret(document, document.root(), blocks).collect()
    }

    #[test]
    fn selector_into_output_yields_one_record_with_metadata() {
        let document = doc("<html><body><h1>Hello</h1></body></html>");
        let blocks = vec![
            Block::new("b1", "Selector")
                .with_param("selector", "h1")
                .with_param("selector_type", "css")
                .with_param("next", "b2"),
            Block::new("b2", "Output").with_param("field_name", "title"),
        ];

        let records = run(&document, &blocks);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["title"], "Hello");
        assert_eq!(records[0]["url"], "https://example.com");
        assert!(records[0]["timestamp"].is_string());
    }

    #[test]
    fn entry_set_of_a_chain_is_its_head() {
        let blocks = vec![
            Block::new("a", "Selector").with_param("next", "b"),
            Block::new("b", "Processor").with_param("next", "c"),
            Block::new("c", "Output"),
        ];
        assert_eq!(entry_blocks(&blocks), vec!["a"]);
    }

    #[test]
    fn fully_referenced_graph_falls_back_to_first_declared_block() {
        let blocks = vec![Block::new("b1", "Output").with_param("next", "b1")];
        assert_eq!(entry_blocks(&blocks), vec!["b1"]);
    }

    #[test]
    fn fan_out_emits_in_match_order_then_successor_order() {
        let document = doc(
            "<html><body>\
             <h2>first</h2><h2>second</h2>\
             </body></html>",
        );
        let blocks = vec![
            Block::new("sel", "Selector")
                .with_param("selector", "h2")
                .with_param("next", json!(["out_a", "out_b"])),
            Block::new("out_a", "Output").with_param("field_name", "a"),
            Block::new("out_b", "Output").with_param("field_name", "b"),
        ];

        let records = run(&document, &blocks);
        let shape: Vec<(bool, String)> = records
            .iter()
            .map(|r| {
                if let Some(v) = r.get("a") {
                    (true, v.as_str().unwrap().to_string())
                } else {
                    (false, r["b"].as_str().unwrap().to_string())
                }
            })
            .collect();

        assert_eq!(
            shape,
            vec![
                (true, "first".to_string()),
                (false, "first".to_string()),
                (true, "second".to_string()),
                (false, "second".to_string()),
            ]
        );
    }

    #[test]
    fn output_is_terminal_even_when_next_is_present() {
        let document = doc("<html><body><h1>once</h1></body></html>");
        let blocks = vec![
            Block::new("sel", "Selector")
                .with_param("selector", "h1")
                .with_param("next", "out"),
            // `next` on an Output is ignored, not followed.
            Block::new("out", "Output")
                .with_param("field_name", "v")
                .with_param("next", "sel"),
        ];

        let records = run(&document, &blocks);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["v"], "once");
    }

    #[test]
    fn processor_extract_feeds_text_to_output() {
        let document = doc("<html><body><p>  price: 42 EUR </p></body></html>");
        let blocks = vec![
            Block::new("sel", "Selector")
                .with_param("selector", "p")
                .with_param("next", "proc"),
            Block::new("proc", "Processor")
                .with_param("processor_type", "extract")
                .with_param("next", "out"),
            Block::new("out", "Output").with_param("field_name", "raw"),
        ];

        let records = run(&document, &blocks);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["raw"], "  price: 42 EUR ");
        // A scalar has no source document handle, so no url metadata.
        assert!(records[0].get("url").is_none());
    }

    #[test]
    fn regex_processor_takes_capture_group_one_or_null() {
        let document = doc("<html><body><p>price: 42 EUR</p></body></html>");
        let matched = vec![
            Block::new("sel", "Selector")
                .with_param("selector", "p")
                .with_param("next", "re"),
            Block::new("re", "Processor")
                .with_param("processor_type", "regular_expression")
                .with_param("pattern", r"price: (\d+)")
                .with_param("next", "out"),
            Block::new("out", "Output").with_param("field_name", "price"),
        ];
        let records = run(&document, &matched);
        assert_eq!(records[0]["price"], "42");

        let unmatched = vec![
            Block::new("sel", "Selector")
                .with_param("selector", "p")
                .with_param("next", "re"),
            Block::new("re", "Processor")
                .with_param("processor_type", "regular_expression")
                .with_param("pattern", r"weight: (\d+)")
                .with_param("next", "out"),
            Block::new("out", "Output").with_param("field_name", "weight"),
        ];
        let records = run(&document, &unmatched);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["weight"], Value::Null);
    }

    #[test]
    fn unknown_selector_type_abandons_only_that_branch() {
        let document = doc("<html><body><h1>kept</h1></body></html>");
        let blocks = vec![
            Block::new("bad", "Selector")
                .with_param("selector", "h1")
                .with_param("selector_type", "jq")
                .with_param("next", "out_bad"),
            Block::new("out_bad", "Output").with_param("field_name", "lost"),
            Block::new("good", "Selector")
                .with_param("selector", "h1")
                .with_param("next", "out_good"),
            Block::new("out_good", "Output").with_param("field_name", "kept"),
        ];

        let records = run(&document, &blocks);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["kept"], "kept");
    }

    #[test]
    fn unknown_processor_type_abandons_only_that_branch() {
        let document = doc("<html><body><p>x</p></body></html>");
        let blocks = vec![
            Block::new("sel", "Selector")
                .with_param("selector", "p")
                .with_param("next", json!(["bad", "out"])),
            Block::new("bad", "Processor")
                .with_param("processor_type", "frobnicate")
                .with_param("next", "out"),
            Block::new("out", "Output").with_param("field_name", "v"),
        ];

        // The direct sel→out edge still emits; the frobnicate branch dies.
        let records = run(&document, &blocks);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["v"], "x");
    }

    #[test]
    fn missing_successor_is_skipped_and_siblings_continue() {
        let document = doc("<html><body><h1>x</h1></body></html>");
        // "gone" resolves nowhere — simulates a block removed after validation.
        let blocks = vec![
            Block::new("sel", "Selector")
                .with_param("selector", "h1")
                .with_param("next", json!(["gone", "out"])),
            Block::new("out", "Output").with_param("field_name", "v"),
        ];

        let records = run(&document, &blocks);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["v"], "x");
    }

    #[test]
    fn interpretation_is_restartable() {
        let document = doc("<html><body><h1>again</h1></body></html>");
        let blocks = vec![
            Block::new("sel", "Selector")
                .with_param("selector", "h1")
                .with_param("next", "out"),
            Block::new("out", "Output").with_param("field_name", "v"),
        ];

        let first: Vec<Record> = interpret(&document, document.root(), &blocks).collect();
        let second: Vec<Record> = interpret(&document, document.root(), &blocks).collect();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first[0]["v"], second[0]["v"]);
    }

    #[test]
    fn no_records_from_an_unmatched_selector() {
        let document = doc("<html><body><h1>x</h1></body></html>");
        let blocks = vec![
            Block::new("sel", "Selector")
                .with_param("selector", "article.missing")
                .with_param("next", "out"),
            Block::new("out", "Output").with_param("field_name", "v"),
        ];
        assert!(run(&document, &blocks).is_empty());
    }
}
