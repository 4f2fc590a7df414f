//! Data models for the review dashboard.
//!
//! This module contains the loaded table, the row types produced by the
//! fixed reports, the tagged answer type returned by the analysis engine,
//! and the chat history entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Column holding the operator/brand of a station.
pub const VENDOR_COLUMN: &str = "EV Vendor";
/// Column holding the station address.
pub const ADDRESS_COLUMN: &str = "address";
/// Column holding the number of reviews.
pub const REVIEWS_COUNT_COLUMN: &str = "reviewsCount";
/// Column holding the average rating.
pub const TOTAL_SCORE_COLUMN: &str = "totalScore";
/// Column holding the free-text reviews.
pub const REVIEWS_COLUMN: &str = "reviews";
/// Derived column: `vendor + " - " + address`.
pub const STATION_ID_COLUMN: &str = "station_id";
/// Flattened column with the number of single-star reviews.
pub const ONE_STAR_COLUMN: &str = "reviewsDistribution.1";

/// Text form of a cell, as used for keyword matching and rendering.
///
/// Strings are returned as-is, `null` as the empty string, everything else
/// as its JSON text.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// One row of the loaded table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationRecord {
    pub vendor: String,
    pub address: String,
    pub reviews_count: u64,
    pub total_score: f64,
    /// `vendor + " - " + address`. Not unique across rows.
    pub station_id: String,
    /// Full flattened row, dotted keys for nested objects.
    pub fields: Map<String, Value>,
}

impl StationRecord {
    /// Build the synthetic station identifier.
    pub fn make_station_id(vendor: &str, address: &str) -> String {
        format!("{} - {}", vendor, address)
    }

    /// Look up a flattened column for this row.
    pub fn field(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    /// Text form of the `reviews` field (empty when missing).
    pub fn reviews_text(&self) -> String {
        self.field(REVIEWS_COLUMN).map(value_text).unwrap_or_default()
    }
}

/// Ordered collection of station records, immutable after load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    records: Vec<StationRecord>,
}

impl Table {
    pub fn new(columns: Vec<String>, records: Vec<StationRecord>) -> Self {
        Self { columns, records }
    }

    /// Column names in first-seen order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[StationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// Total review volume of one station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationVolume {
    pub station_id: String,
    pub review_count: u64,
}

/// Average rating of one station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRating {
    pub station_id: String,
    pub average_score: f64,
}

/// Average rating across all stations of a vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorRating {
    pub vendor: String,
    pub average_score: f64,
}

/// How many rows share one value of the single-star bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionBucket {
    pub value: f64,
    pub stations: usize,
}

/// Rows whose reviews mention waiting, and those that don't.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitMentions {
    pub mentions: usize,
    pub no_mentions: usize,
}

impl WaitMentions {
    pub fn total(&self) -> usize {
        self.mentions + self.no_mentions
    }
}

/// A station whose reviews complain about a long wait.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LongWaitStation {
    pub station_id: String,
    pub address: String,
}

/// Metadata about a rendered dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardMetadata {
    /// Path of the input data file.
    pub data_path: String,
    /// Date and time the dashboard was produced.
    pub generated_at: DateTime<Utc>,
    /// Number of records retained after filtering.
    pub records_loaded: usize,
    /// Model used for ad-hoc questions, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
}

/// All six fixed reports over one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub metadata: DashboardMetadata,
    pub top_stations: Vec<StationVolume>,
    pub worst_stations: Vec<StationRating>,
    pub vendor_ratings: Vec<VendorRating>,
    pub review_distribution: Vec<DistributionBucket>,
    pub wait_mentions: WaitMentions,
    pub long_wait_stations: Vec<LongWaitStation>,
}

/// Chart flavour requested by the analysis engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    #[default]
    Bar,
    Line,
    Pie,
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartKind::Bar => write!(f, "bar"),
            ChartKind::Line => write!(f, "line"),
            ChartKind::Pie => write!(f, "pie"),
        }
    }
}

/// One labelled value of a chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
}

/// A plottable answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    #[serde(default)]
    pub kind: ChartKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub x_label: String,
    #[serde(default)]
    pub y_label: String,
    pub points: Vec<ChartPoint>,
}

/// A tabular answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableAnswer {
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

/// Answer produced by the analysis engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnalysisResponse {
    Text { value: String },
    Table(TableAnswer),
    Chart(ChartSpec),
}

impl AnalysisResponse {
    pub fn text(value: impl Into<String>) -> Self {
        AnalysisResponse::Text {
            value: value.into(),
        }
    }
}

/// What a question produced: an answer, or an inline error message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnOutcome {
    Answer(AnalysisResponse),
    Error(String),
}

/// Rows the analysis engine saw out of the whole table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSample {
    pub shown: usize,
    pub total: usize,
}

/// One question/answer exchange of the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refined_question: Option<String>,
    pub outcome: TurnOutcome,
    /// Set when the answer was computed from only part of the table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_sample: Option<RowSample>,
    pub asked_at: DateTime<Utc>,
}
