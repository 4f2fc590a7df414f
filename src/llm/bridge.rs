//! Delegated analysis.
//!
//! The engine receives the scalar projection of the table and a question,
//! asks the completion API for a structured answer, and returns it as a
//! tagged [`AnalysisResponse`].

use crate::analysis::{scalar_projection, ScalarProjection};
use crate::error::DelegatedAnalysisError;
use crate::llm::client::{ChatMessage, CompletionClient};
use crate::models::{AnalysisResponse, RowSample, Table};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Answers natural-language questions about a bound table.
#[async_trait]
pub trait AnalysisEngine: Send + Sync {
    async fn chat(&self, question: &str) -> Result<AnalysisResponse, DelegatedAnalysisError>;

    /// Set when answers are computed from only part of the table.
    fn row_sample(&self) -> Option<RowSample> {
        None
    }
}

/// Questions asked of the engine without user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredefinedQuestion {
    TopComplaints,
    CitySummary,
    VendorSentiment,
    OccupancyPatterns,
}

impl PredefinedQuestion {
    pub const ALL: [PredefinedQuestion; 4] = [
        PredefinedQuestion::TopComplaints,
        PredefinedQuestion::CitySummary,
        PredefinedQuestion::VendorSentiment,
        PredefinedQuestion::OccupancyPatterns,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            PredefinedQuestion::TopComplaints => "Top complaints across stations",
            PredefinedQuestion::CitySummary => "City-based summary",
            PredefinedQuestion::VendorSentiment => "Vendor sentiment summary",
            PredefinedQuestion::OccupancyPatterns => "Occupancy patterns",
        }
    }

    pub fn question(&self) -> &'static str {
        match self {
            PredefinedQuestion::TopComplaints => "What are the top complaints across all reviews?",
            PredefinedQuestion::CitySummary => "Summarize the best and worst EV stations by city.",
            PredefinedQuestion::VendorSentiment => {
                "Compare sentiment for each vendor across all reviews."
            }
            PredefinedQuestion::OccupancyPatterns => {
                "What are the busiest times of day across EV stations?"
            }
        }
    }
}

/// Analysis engine backed by a completion client.
pub struct LlmAnalysisEngine {
    client: Arc<dyn CompletionClient>,
    projection: ScalarProjection,
    max_rows: usize,
}

impl LlmAnalysisEngine {
    /// Bind the engine to the scalar projection of `table`.
    pub fn new(client: Arc<dyn CompletionClient>, table: &Table, max_rows: usize) -> Self {
        let projection = scalar_projection(table);
        info!(
            "Analysis engine bound to {} columns ({} excluded), {} rows",
            projection.columns.len(),
            projection.dropped.len(),
            projection.rows.len()
        );

        Self {
            client,
            projection,
            max_rows,
        }
    }

    #[cfg(test)]
    pub fn projection(&self) -> &ScalarProjection {
        &self.projection
    }

    fn system_prompt(&self) -> String {
        let total = self.projection.rows.len();
        let shown = total.min(self.max_rows);

        let mut prompt = String::new();
        prompt.push_str(ANALYSIS_SYSTEM_PROMPT);
        prompt.push_str("\n\n## Columns\n\n");
        for column in &self.projection.columns {
            prompt.push_str(&format!("- {} ({})\n", column.name, column.kind));
        }

        let data = json!({
            "columns": self
                .projection
                .columns
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>(),
            "rows": &self.projection.rows[..shown],
        });

        prompt.push_str(&format!(
            "\n## Data ({} of {} rows)\n\n{}\n",
            shown, total, data
        ));
        prompt
    }
}

#[async_trait]
impl AnalysisEngine for LlmAnalysisEngine {
    async fn chat(&self, question: &str) -> Result<AnalysisResponse, DelegatedAnalysisError> {
        if self.projection.columns.is_empty() {
            return Err(DelegatedAnalysisError::NoUsableColumns);
        }

        let messages = [
            ChatMessage::system(self.system_prompt()),
            ChatMessage::user(question),
        ];

        if let Some(sample) = self.row_sample() {
            info!(
                "Sending {} of {} rows to the analysis engine",
                sample.shown, sample.total
            );
        }

        let reply = self.client.complete(&messages).await?;
        let response = parse_response(&reply);
        debug!("Engine answered '{}' with {:?}", question, response);

        Ok(response)
    }

    fn row_sample(&self) -> Option<RowSample> {
        let total = self.projection.rows.len();
        (total > self.max_rows).then_some(RowSample {
            shown: self.max_rows,
            total,
        })
    }
}

/// Interpret the model's reply. Anything that is not one of the structured
/// shapes is returned as plain text.
pub fn parse_response(reply: &str) -> AnalysisResponse {
    let trimmed = reply.trim();
    let body = strip_code_fence(trimmed);

    if let Ok(response) = serde_json::from_str::<AnalysisResponse>(body) {
        return response;
    }

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(object)) if object.contains_key("value") => {
            AnalysisResponse::text(crate::models::value_text(&object["value"]))
        }
        _ => AnalysisResponse::text(trimmed),
    }
}

fn strip_code_fence(text: &str) -> &str {
    text.trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

const ANALYSIS_SYSTEM_PROMPT: &str = r#"You are a data analyst answering questions about a table of EV charging station reviews.
Each row is one station listing. Use only the data provided below.

Answer with exactly one JSON object and nothing else, using one of these shapes:
{"type": "text", "value": "<answer in plain sentences>"}
{"type": "table", "columns": ["<col>", ...], "rows": [[<cell>, ...], ...]}
{"type": "chart", "kind": "bar" | "line" | "pie", "title": "<title>", "x_label": "<x axis>", "y_label": "<y axis>", "points": [{"label": "<x value>", "value": <number>}, ...]}

Use "chart" only when the question asks for a chart or graph, and "table" when the answer is a list of rows."#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::table_from_value;
    use crate::error::LlmError;
    use crate::llm::client::tests::FakeClient;
    use crate::models::{ChartKind, TableAnswer};

    fn table() -> Table {
        table_from_value(json!([
            {"EV Vendor": "Acme", "address": "1 Main St", "reviewsCount": 5, "totalScore": 4.5,
             "reviews": ["long wait"], "city": "San Jose"},
            {"EV Vendor": "Volt", "address": "9 Oak Ave", "reviewsCount": 2, "totalScore": 3.0,
             "reviews": ["fast"], "city": "Fremont"},
            {"EV Vendor": "Zap", "address": "7 Pine Ct", "reviewsCount": 9, "totalScore": 4.0,
             "reviews": [], "city": "San Jose"}
        ]))
        .unwrap()
    }

    #[test]
    fn test_parse_text_table_and_chart() {
        assert_eq!(
            parse_response(r#"{"type":"text","value":"Acme has the most reviews."}"#),
            AnalysisResponse::text("Acme has the most reviews.")
        );

        assert_eq!(
            parse_response(
                "```json\n{\"type\":\"table\",\"columns\":[\"city\",\"stations\"],\"rows\":[[\"San Jose\",2]]}\n```"
            ),
            AnalysisResponse::Table(TableAnswer {
                columns: vec!["city".to_string(), "stations".to_string()],
                rows: vec![vec![json!("San Jose"), json!(2)]],
            })
        );

        match parse_response(
            r#"{"type":"chart","kind":"pie","title":"Share","points":[{"label":"Acme","value":1}]}"#,
        ) {
            AnalysisResponse::Chart(chart) => {
                assert_eq!(chart.kind, ChartKind::Pie);
                assert_eq!(chart.points[0].value, 1.0);
            }
            other => panic!("expected chart, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_falls_back_to_text() {
        assert_eq!(
            parse_response("  The busiest hour is 6pm.  "),
            AnalysisResponse::text("The busiest hour is 6pm.")
        );
        assert_eq!(
            parse_response(r#"{"type":"text","value":42}"#),
            AnalysisResponse::text("42")
        );
        assert_eq!(
            parse_response(r#"{"answer": "yes"}"#),
            AnalysisResponse::text(r#"{"answer": "yes"}"#)
        );
    }

    #[test]
    fn test_engine_sends_scalar_columns_only() {
        let client = Arc::new(FakeClient::new(vec![Ok(
            r#"{"type":"text","value":"2 stations"}"#.to_string(),
        )]));
        let engine = LlmAnalysisEngine::new(client.clone(), &table(), 2);

        let answer =
            tokio_test::block_on(engine.chat("How many stations in San Jose?")).unwrap();
        assert_eq!(answer, AnalysisResponse::text("2 stations"));
        assert_eq!(engine.projection().dropped, vec!["reviews".to_string()]);

        let requests = client.requests.lock().unwrap();
        let system = &requests[0][0].content;
        assert!(system.contains("- city (text)"));
        assert!(system.contains("- reviewsCount (number)"));
        assert!(!system.contains("long wait"));
        assert!(system.contains("2 of 3 rows"));
        assert_eq!(requests[0][1].content, "How many stations in San Jose?");
        assert_eq!(engine.row_sample(), Some(RowSample { shown: 2, total: 3 }));
    }

    #[test]
    fn test_no_row_sample_when_table_fits() {
        let client = Arc::new(FakeClient::new(vec![]));
        assert_eq!(LlmAnalysisEngine::new(client.clone(), &table(), 3).row_sample(), None);
        assert_eq!(LlmAnalysisEngine::new(client, &table(), 100).row_sample(), None);
    }

    #[test]
    fn test_engine_propagates_client_error() {
        let client = Arc::new(FakeClient::new(vec![Err(LlmError::Timeout(10))]));
        let engine = LlmAnalysisEngine::new(client, &table(), 100);

        let err = tokio_test::block_on(engine.chat("Top complaints?")).unwrap_err();
        assert!(matches!(
            err,
            DelegatedAnalysisError::Llm(LlmError::Timeout(10))
        ));
    }

    #[test]
    fn test_engine_without_columns_fails() {
        let client = Arc::new(FakeClient::new(vec![]));
        let engine = LlmAnalysisEngine::new(client.clone(), &Table::default(), 100);

        let err = tokio_test::block_on(engine.chat("anything")).unwrap_err();
        assert!(matches!(err, DelegatedAnalysisError::NoUsableColumns));
        assert_eq!(client.request_count(), 0);
    }

    #[test]
    fn test_predefined_questions() {
        assert_eq!(PredefinedQuestion::ALL.len(), 4);
        assert_eq!(
            PredefinedQuestion::TopComplaints.question(),
            "What are the top complaints across all reviews?"
        );
    }
}
