//! Turns free-form model replies into validated graphs and audit reports.
//!
//! Extraction never fails: it always yields some candidate substring. Decoding that
//! candidate as JSON may fail, and so may a malformed node. Edges that point at
//! unknown nodes and audit fields of the wrong shape are repaired silently.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ExtractError, Result};
use crate::schema::{AuditReport, GraphData, GraphEdge, GraphNode};

static JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)```json(.*?)```").expect("json fence pattern"));
static ANY_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(.*?)```").expect("fence pattern"));

/// Pick the most plausible JSON object out of a model reply.
///
/// Order of preference:
/// 1. the body of the first ```` ```json ```` fence (tag matched case-insensitively)
/// 2. the body of the first fence of any kind
/// 3. the first balanced `{ ... }` object, ignoring braces inside string literals
/// 4. everything from the first `{` when the object never closes
/// 5. the whole reply, trimmed, when it has no `{` at all
pub fn extract_json_substring(text: &str) -> &str {
    for fence in [&*JSON_FENCE, &*ANY_FENCE] {
        if let Some(body) = fence.captures(text).and_then(|caps| caps.get(1)) {
            return body.as_str().trim();
        }
    }

    let Some(start) = text.find('{') else {
        return text.trim();
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, byte) in text[start..].bytes().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return &text[start..=start + offset];
                }
            }
            _ => {}
        }
    }

    &text[start..]
}

/// Decode an extracted candidate, reporting the parser message on failure.
pub fn parse_json(candidate: &str) -> Result<Value> {
    serde_json::from_str(candidate)
        .map_err(|e| ExtractError::Schema(format!("Invalid JSON from AI: {}", e)))
}

/// Build a graph from decoded model output.
///
/// A malformed node fails the whole call. Edges whose endpoints are not known node
/// ids are dropped; endpoints may be bare ids or objects carrying an `id`.
pub fn parse_graph(raw: &Value) -> Result<GraphData> {
    let root = raw
        .as_object()
        .ok_or_else(|| ExtractError::Schema("Expected a JSON object with nodes and edges".to_string()))?;

    let nodes = match root.get("nodes") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                GraphNode::deserialize(item)
                    .map_err(|e| ExtractError::Schema(format!("Invalid node at index {}: {}", index, e)))
            })
            .collect::<Result<Vec<_>>>()?,
        Some(other) => {
            return Err(ExtractError::Schema(format!(
                "Expected `nodes` to be an array, got {}",
                type_name(other)
            )));
        }
    };

    let node_ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();

    let raw_edges: &[Value] = match root.get("edges") {
        Some(Value::Array(items)) => items.as_slice(),
        _ => &[],
    };

    let edges: Vec<GraphEdge> = raw_edges
        .iter()
        .filter_map(|item| item.as_object())
        .filter_map(|edge| build_edge(edge, &node_ids))
        .collect();

    let dropped = raw_edges.len() - edges.len();
    if dropped > 0 {
        debug!(dropped, kept = edges.len(), "Dropped edges that did not reference known nodes");
    }

    Ok(GraphData { nodes, edges })
}

fn build_edge(edge: &Map<String, Value>, node_ids: &HashSet<&str>) -> Option<GraphEdge> {
    let source = endpoint_id(edge.get("source")?)?;
    let target = endpoint_id(edge.get("target")?)?;

    if !node_ids.contains(source) || !node_ids.contains(target) {
        return None;
    }

    let relation = match edge.get("relation") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => return None,
    };

    Some(GraphEdge {
        source: source.to_string(),
        target: target.to_string(),
        relation,
        id: edge.get("id").and_then(Value::as_str).map(str::to_string),
    })
}

/// Endpoints arrive either as `"alice"` or as `{"id": "alice", ...}`.
fn endpoint_id(value: &Value) -> Option<&str> {
    match value {
        Value::String(id) => Some(id.as_str()),
        Value::Object(obj) => obj.get("id").and_then(Value::as_str),
        _ => None,
    }
}

/// Build an audit report; every field falls back to its default instead of failing.
pub fn parse_audit_report(raw: &Value) -> AuditReport {
    AuditReport {
        validity_score: coerce_score(raw.get("validityScore")),
        completeness_score: coerce_score(raw.get("completenessScore")),
        feedback: coerce_string_list(raw.get("feedback")),
        missing_entities: coerce_string_list(raw.get("missingEntities")),
        suggestions: coerce_text(raw.get("suggestions")),
    }
}

fn coerce_score(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
                .unwrap_or(0)
        }
        Some(Value::Bool(b)) => i64::from(*b),
        _ => 0,
    }
}

fn coerce_string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
        _ => Vec::new(),
    }
}

fn coerce_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(scalar_text)
            .collect::<Vec<_>>()
            .join("\n"),
        Some(other) => scalar_text(other).unwrap_or_default(),
        None => String::new(),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(id: &str) -> Value {
        json!({"id": id, "label": id.to_uppercase(), "type": "Thing"})
    }

    #[test]
    fn test_brace_matching_stops_at_balanced_object() {
        let text = "noise {\"a\":{\"b\":1}} trailing junk";
        assert_eq!(extract_json_substring(text), "{\"a\":{\"b\":1}}");
    }

    #[test]
    fn test_labeled_fence_wins_over_bare_braces() {
        let text = "Here you go {not this}\n```JSON\n{\"nodes\": []}\n```\nthanks {or this}";
        assert_eq!(extract_json_substring(text), "{\"nodes\": []}");
    }

    #[test]
    fn test_unlabeled_fence() {
        let text = "Result:\n```\n{\"edges\": []}\n```";
        assert_eq!(extract_json_substring(text), "{\"edges\": []}");
    }

    #[test]
    fn test_labeled_fence_preferred_over_earlier_unlabeled() {
        let text = "```\nplain\n```\n```json\n{\"a\":1}\n```";
        assert_eq!(extract_json_substring(text), "{\"a\":1}");
    }

    #[test]
    fn test_no_brace_returns_trimmed_text() {
        assert_eq!(extract_json_substring("  no json here \n"), "no json here");
    }

    #[test]
    fn test_unclosed_object_returns_tail() {
        assert_eq!(extract_json_substring("say {\"a\": {\"b\": 1}"), "{\"a\": {\"b\": 1}");
    }

    #[test]
    fn test_braces_inside_strings_are_ignored() {
        let text = r#"{"label": "a } b", "x": "\"{"} tail"#;
        assert_eq!(extract_json_substring(text), r#"{"label": "a } b", "x": "\"{"}"#);
    }

    #[test]
    fn test_extraction_is_idempotent_on_valid_json() {
        let inputs = [
            "junk {\"a\": [1, 2, {\"b\": null}]} more",
            "```json\n{\"nodes\": [], \"edges\": []}\n```",
            "{\"text\": \"}{\"}",
        ];
        for input in inputs {
            let once = extract_json_substring(input);
            assert!(serde_json::from_str::<Value>(once).is_ok());
            assert_eq!(extract_json_substring(once), once);
        }
    }

    #[test]
    fn test_parse_json_reports_parser_message() {
        let err = parse_json("{\"nodes\": [").unwrap_err();
        assert!(matches!(err, ExtractError::Schema(ref msg) if msg.starts_with("Invalid JSON from AI:")));
    }

    #[test]
    fn test_parse_graph_keeps_only_edges_between_known_nodes() {
        let raw = json!({
            "nodes": [node("a"), node("b"), node("c")],
            "edges": [
                {"source": "a", "target": "b", "relation": "knows"},
                {"source": "a", "target": "ghost", "relation": "haunts"},
                {"source": {"id": "b"}, "target": {"id": "c", "label": "C"}, "relation": "likes"},
                {"source": {"name": "b"}, "target": "c", "relation": "no id"},
                {"source": "c", "target": "a"},
                {"source": "missing", "target": "a", "relation": "x"},
                "not an edge"
            ]
        });

        let graph = parse_graph(&raw).unwrap();

        assert_eq!(graph.nodes.len(), 3);
        let pairs: Vec<(&str, &str, &str)> = graph
            .edges
            .iter()
            .map(|e| (e.source.as_str(), e.target.as_str(), e.relation.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![("a", "b", "knows"), ("b", "c", "likes"), ("c", "a", "")]
        );
    }

    #[test]
    fn test_parse_graph_every_edge_references_a_node() {
        let raw = json!({
            "nodes": [node("x"), node("y")],
            "edges": [
                {"source": "x", "target": "y", "relation": "r1", "id": "e1"},
                {"source": "y", "target": "z", "relation": "r2"},
                {"source": 1, "target": "y", "relation": "r3"},
                {"source": "y", "target": "y", "relation": 7}
            ]
        });

        let graph = parse_graph(&raw).unwrap();
        let ids: HashSet<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();

        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].id.as_deref(), Some("e1"));
        assert!(graph
            .edges
            .iter()
            .all(|e| ids.contains(e.source.as_str()) && ids.contains(e.target.as_str())));
    }

    #[test]
    fn test_parse_graph_missing_arrays_are_empty() {
        let graph = parse_graph(&json!({})).unwrap();
        assert!(graph.nodes.is_empty());
        assert!(graph.edges.is_empty());

        let graph = parse_graph(&json!({"nodes": [node("a")], "edges": null})).unwrap();
        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn test_parse_graph_node_missing_id_is_schema_error() {
        let raw = json!({"nodes": [{"label": "x"}], "edges": []});
        let err = parse_graph(&raw).unwrap_err();
        assert!(matches!(err, ExtractError::Schema(ref msg) if msg.contains("index 0")));
    }

    #[test]
    fn test_parse_graph_rejects_mistyped_node_fields() {
        let raw = json!({"nodes": [node("a"), {"id": 5, "label": "five", "type": "Number"}]});
        assert!(matches!(parse_graph(&raw), Err(ExtractError::Schema(_))));

        let raw = json!({"nodes": "a,b"});
        assert!(matches!(parse_graph(&raw), Err(ExtractError::Schema(_))));

        assert!(matches!(parse_graph(&json!([1, 2])), Err(ExtractError::Schema(_))));
    }

    #[test]
    fn test_parse_graph_keeps_optional_hints() {
        let raw = json!({"nodes": [{"id": "a", "label": "A", "type": "T", "group": 2, "val": 1.5}]});
        let graph = parse_graph(&raw).unwrap();

        assert_eq!(graph.nodes[0].group, Some(2));
        assert_eq!(graph.nodes[0].val, Some(1.5));
    }

    #[test]
    fn test_parse_graph_coerces_loose_hints() {
        let raw = json!({"nodes": [
            {"id": "a", "label": "A", "type": "T", "group": 2.0, "val": "1.5"},
            {"id": "b", "label": "B", "type": "T", "group": 1.0},
            {"id": "c", "label": "C", "type": "T", "val": "3"}
        ]});

        let graph = parse_graph(&raw).unwrap();

        assert_eq!(graph.nodes[0].group, Some(2));
        assert_eq!(graph.nodes[0].val, Some(1.5));
        assert_eq!(graph.nodes[1].group, Some(1));
        assert_eq!(graph.nodes[2].val, Some(3.0));
    }

    #[test]
    fn test_graph_round_trip() {
        let graph = GraphData {
            nodes: vec![
                GraphNode {
                    id: "n1".to_string(),
                    label: "Brace } label {".to_string(),
                    node_type: "Concept".to_string(),
                    group: Some(3),
                    val: Some(0.25),
                },
                GraphNode {
                    id: "n2".to_string(),
                    label: "东京".to_string(),
                    node_type: "Location".to_string(),
                    group: None,
                    val: None,
                },
            ],
            edges: vec![
                GraphEdge {
                    source: "n1".to_string(),
                    target: "n2".to_string(),
                    relation: "located \"in\"".to_string(),
                    id: Some("e1".to_string()),
                },
                GraphEdge {
                    source: "n2".to_string(),
                    target: "n1".to_string(),
                    relation: String::new(),
                    id: None,
                },
            ],
        };

        let serialized = serde_json::to_string(&graph).unwrap();
        let raw = parse_json(extract_json_substring(&serialized)).unwrap();

        assert_eq!(parse_graph(&raw).unwrap(), graph);
    }

    #[test]
    fn test_audit_defaults() {
        assert_eq!(parse_audit_report(&json!({})), AuditReport::default());
        assert_eq!(parse_audit_report(&json!("not an object")), AuditReport::default());
    }

    #[test]
    fn test_audit_coerces_scores() {
        let report = parse_audit_report(&json!({
            "validityScore": "85",
            "completenessScore": 72.9,
        }));
        assert_eq!(report.validity_score, 85);
        assert_eq!(report.completeness_score, 72);

        let report = parse_audit_report(&json!({
            "validityScore": " 91.5 ",
            "completenessScore": "high",
        }));
        assert_eq!(report.validity_score, 91);
        assert_eq!(report.completeness_score, 0);

        let report = parse_audit_report(&json!({"validityScore": null, "completenessScore": [1]}));
        assert_eq!(report.validity_score, 0);
        assert_eq!(report.completeness_score, 0);
    }

    #[test]
    fn test_audit_scores_are_not_clamped() {
        let report = parse_audit_report(&json!({"validityScore": 150, "completenessScore": -5}));
        assert_eq!(report.validity_score, 150);
        assert_eq!(report.completeness_score, -5);
    }

    #[test]
    fn test_audit_lists_and_suggestions() {
        let report = parse_audit_report(&json!({
            "feedback": ["good coverage", 3, null, {"x": 1}],
            "missingEntities": "Bob",
            "suggestions": ["Add Bob", "Link Bob to Acme"]
        }));

        assert_eq!(report.feedback, vec!["good coverage".to_string(), "3".to_string()]);
        assert!(report.missing_entities.is_empty());
        assert_eq!(report.suggestions, "Add Bob\nLink Bob to Acme");

        let report = parse_audit_report(&json!({"suggestions": null, "missingEntities": ["Bob"]}));
        assert_eq!(report.suggestions, "");
        assert_eq!(report.missing_entities, vec!["Bob".to_string()]);
    }
}
