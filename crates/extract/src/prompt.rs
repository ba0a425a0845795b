use crate::schema::GraphData;

pub const SYSTEM_INSTRUCTION: &str = r#"You are an expert Knowledge Graph Engineer. Your task is to analyze the provided text and extract a knowledge graph structure consisting of Entities (Nodes) and Relationships (Edges).

Rules:
1. Identify key entities (People, Organizations, Locations, Concepts, Dates, etc.).
2. Identify meaningful relationships between these entities.
3. Consolidate similar entities (e.g., "The US" and "United States" should be one node).
4. Assign a broad 'type' to each node (e.g., "Person", "Org", "Event").
5. The output must be strictly JSON matching the schema.
6. IMPORTANT: Maintain the language of the source text for all 'label' and 'relation' fields. If the input is in Chinese, the labels and relations must be in Chinese. Do not translate unless explicitly asked."#;

pub const VERIFICATION_INSTRUCTION: &str = r#"You are a Quality Assurance Specialist for Knowledge Graphs.
Your task is to compare a generated Knowledge Graph (JSON) against the original Source Text.

Scoring Rubric:
1. Validity:
   - 90-100: All nodes and edges are directly supported by the text.
   - 70-89: Most are correct, with very minor logical inferences.
   - Below 60: Contains hallucinations or incorrect relations.
2. Completeness:
   - 90-100: All major entities and their core relationships mentioned in the text are present.
   - 70-89: Missing some secondary details but covers the main narrative.
   - Below 60: Missing primary entities or critical structural relationships.

CRITICAL: The numeric scores MUST reflect your qualitative feedback. If you say "The graph is very accurate", the score must be high (e.g., >85).
Maintain the language of the source text for feedback comments. Output strictly JSON."#;

pub const OPTIMIZATION_INSTRUCTION: &str = r#"You are a Senior Knowledge Graph Refinement Agent.
You will be given the original Source Text, the current Knowledge Graph (JSON), and specific Improvement Suggestions from an auditor.
Your goal is to output a new, improved, and more complete Knowledge Graph that addresses the suggestions while maintaining the integrity of the existing correct parts.

Rules:
1. Incorporate missing entities and relationships mentioned in the suggestions.
2. Correct any invalid relationships or entity types identified.
3. Keep the graph concise but comprehensive.
4. Output strictly JSON matching the same schema as before.
5. Maintain the original language of the source text."#;

/// Shape the generate and optimize replies are parsed against.
pub const GRAPH_SCHEMA_EXAMPLE: &str = r#"{
  "nodes": [
    { "id": "elon_musk", "label": "埃隆·马斯克", "type": "Person" }
  ],
  "edges": [
    { "source": "elon_musk", "target": "spacex", "relation": "领导" }
  ]
}"#;

pub const DEFAULT_FOCUS: &str = "General";

/// System instruction plus user prompt for one chat-completion round-trip.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

pub fn build_generate_prompt(text: &str, focus: &str) -> PromptPair {
    let user = format!(
        r#"Analyze the following text and build a knowledge graph.
Focus area: {focus}.

Text content:
"""
{text}
"""

Output strictly JSON. Use this shape:
{GRAPH_SCHEMA_EXAMPLE}
"#
    );

    PromptPair {
        system: SYSTEM_INSTRUCTION.to_string(),
        user,
    }
}

pub fn build_verify_prompt(source_text: &str, graph: &GraphData) -> PromptPair {
    let user = format!(
        r#"Source Text:
"""
{source_text}
"""

Generated Graph Data (JSON):
{graph}

Please perform a rigorous audit of this graph.
Ensure the validityScore and completenessScore reflect your analysis.

Output strictly JSON with fields:
{{
  "validityScore": 0,
  "completenessScore": 0,
  "feedback": [],
  "missingEntities": [],
  "suggestions": ""
}}
"#,
        graph = graph_json(graph)
    );

    PromptPair {
        system: VERIFICATION_INSTRUCTION.to_string(),
        user,
    }
}

/// `output_language` overrides the source-language rule of the instruction.
pub fn build_optimize_prompt(
    source_text: &str,
    current_graph: &GraphData,
    suggestions: &str,
    output_language: Option<&str>,
) -> PromptPair {
    let user = format!(
        r#"Source Text:
"""
{source_text}
"""

Current Knowledge Graph (JSON):
{graph}

Improvement Suggestions:
{suggestions}

Please provide the optimized full knowledge graph JSON. Use this shape:
{GRAPH_SCHEMA_EXAMPLE}
"#,
        graph = graph_json(current_graph)
    );

    let system = match output_language {
        Some(language) => format!("{OPTIMIZATION_INSTRUCTION}\n\nOutput should be in {language}."),
        None => OPTIMIZATION_INSTRUCTION.to_string(),
    };

    PromptPair { system, user }
}

// Plain data always serializes; the fallback only keeps this total.
fn graph_json(graph: &GraphData) -> String {
    serde_json::to_string(graph).unwrap_or_else(|_| "{}".to_string())
}
