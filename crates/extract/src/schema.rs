use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: String,
    /// Clustering hint for the renderer
    #[serde(default, deserialize_with = "lenient_group", skip_serializing_if = "Option::is_none")]
    pub group: Option<i64>,
    /// Visual weight hint
    #[serde(default, deserialize_with = "lenient_val", skip_serializing_if = "Option::is_none")]
    pub val: Option<f64>,
}

// Models write hints as `2.0` or `"1.5"`; anything not coercible becomes None.
fn lenient_group<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let number = match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    };
    Ok(number)
}

fn lenient_val<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let number = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(number.filter(|f| f.is_finite()))
}

fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0).then(|| f as i64)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub relation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// A knowledge graph whose edges only reference ids present in `nodes`.
///
/// Graphs built by [`crate::interpreter::parse_graph`] hold this by construction.
/// Graphs deserialized directly from a request body are taken as given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Quality audit of a graph against its source text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub validity_score: i64,
    pub completeness_score: i64,
    pub feedback: Vec<String>,
    pub missing_entities: Vec<String>,
    pub suggestions: String,
}
