pub mod config;
pub mod error;
pub mod interpreter;
pub mod llm;
pub mod prompt;
pub mod schema;

pub use config::LlmConfig;
pub use error::ExtractError;
pub use llm::{ChatCompletion, ChatMessage, OpenAiClient};
pub use prompt::PromptPair;
pub use schema::{AuditReport, GraphData, GraphEdge, GraphNode};

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use error::Result;

/// Runs the generate / verify / optimize round-trips against a chat backend.
#[derive(Clone)]
pub struct Extractor {
    llm_client: Arc<dyn ChatCompletion>,
    output_language: Option<String>,
}

impl Extractor {
    pub fn new(llm_client: Arc<dyn ChatCompletion>) -> Self {
        Self {
            llm_client,
            output_language: None,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(Arc::new(OpenAiClient::new(config)))
            .with_output_language(config.output_language.clone())
    }

    /// Language the optimize step must answer in instead of the source language.
    pub fn with_output_language(mut self, language: Option<String>) -> Self {
        self.output_language = language;
        self
    }

    /// Extract a knowledge graph from free text
    pub async fn generate(&self, text: &str, focus: &str) -> Result<GraphData> {
        let prompt = prompt::build_generate_prompt(text, focus);
        let raw = self.ask(&prompt).await?;
        let graph = interpreter::parse_graph(&raw)?;

        info!(
            operation = "generate",
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "Graph generated"
        );
        Ok(graph)
    }

    /// Score a graph against the text it was extracted from
    pub async fn verify(&self, source_text: &str, graph: &GraphData) -> Result<AuditReport> {
        let prompt = prompt::build_verify_prompt(source_text, graph);
        let raw = self.ask(&prompt).await?;
        let report = interpreter::parse_audit_report(&raw);

        info!(
            operation = "verify",
            validity = report.validity_score,
            completeness = report.completeness_score,
            missing = report.missing_entities.len(),
            "Graph audited"
        );
        Ok(report)
    }

    /// Produce a corrected graph from the current one and audit suggestions
    pub async fn optimize(
        &self,
        source_text: &str,
        current_graph: &GraphData,
        suggestions: &str,
    ) -> Result<GraphData> {
        let prompt = prompt::build_optimize_prompt(
            source_text,
            current_graph,
            suggestions,
            self.output_language.as_deref(),
        );
        let raw = self.ask(&prompt).await?;
        let graph = interpreter::parse_graph(&raw)?;

        info!(
            operation = "optimize",
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            nodes_before = current_graph.nodes.len(),
            "Graph optimized"
        );
        Ok(graph)
    }

    async fn ask(&self, prompt: &PromptPair) -> Result<Value> {
        let messages = [
            ChatMessage::system(prompt.system.as_str()),
            ChatMessage::user(prompt.user.as_str()),
        ];

        let content = self.llm_client.complete(&messages).await?;
        let candidate = interpreter::extract_json_substring(&content);
        debug!(reply_len = content.len(), candidate_len = candidate.len(), "Extracted JSON candidate");

        interpreter::parse_json(candidate)
    }
}
