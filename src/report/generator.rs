//! Markdown dashboard and answer rendering.
//!
//! This module turns the fixed reports, the analysis engine's answers and
//! the chat history into Markdown text for the terminal or a file.

use crate::models::{
    value_text, AnalysisResponse, ChartSpec, ChatTurn, Dashboard, DashboardMetadata,
    DistributionBucket, RowSample, TableAnswer, TurnOutcome,
};
use anyhow::Result;
use std::path::Path;

const BAR_WIDTH: usize = 30;

/// Generate the complete Markdown dashboard.
pub fn generate_markdown_dashboard(dashboard: &Dashboard) -> String {
    let mut output = String::new();

    output.push_str("# EV Charging Station Review Explorer\n\n");
    output.push_str(&generate_metadata_section(&dashboard.metadata));
    output.push_str("## Key Insights\n\n");

    output.push_str(&format!(
        "### Top {} Stations by Review Volume\n\n",
        dashboard.top_stations.len()
    ));
    output.push_str(&markdown_table(
        &["Station", "Reviews"],
        dashboard
            .top_stations
            .iter()
            .map(|s| vec![s.station_id.clone(), s.review_count.to_string()]),
    ));

    output.push_str(&format!(
        "### Worst {} Stations by Avg Rating\n\n",
        dashboard.worst_stations.len()
    ));
    output.push_str(&markdown_table(
        &["Station", "Avg Rating"],
        dashboard
            .worst_stations
            .iter()
            .map(|s| vec![s.station_id.clone(), format!("{:.2}", s.average_score)]),
    ));

    output.push_str("### Avg Rating by Vendor\n\n");
    output.push_str(&markdown_table(
        &["Vendor", "Avg Rating"],
        dashboard
            .vendor_ratings
            .iter()
            .map(|v| vec![v.vendor.clone(), format!("{:.2}", v.average_score)]),
    ));

    output.push_str("### Review Distribution (1-star only)\n\n");
    output.push_str(&generate_distribution_section(&dashboard.review_distribution));

    output.push_str("### Mentions of Wait Time\n\n");
    output.push_str(&markdown_table(
        &["Mentions \"wait\"", "Rows"],
        [
            vec!["true".to_string(), dashboard.wait_mentions.mentions.to_string()],
            vec![
                "false".to_string(),
                dashboard.wait_mentions.no_mentions.to_string(),
            ],
        ],
    ));

    output.push_str("### Stations with 'Long Wait' in Reviews\n\n");
    if dashboard.long_wait_stations.is_empty() {
        output.push_str("No reviews mention a long wait.\n\n");
    } else {
        output.push_str(&markdown_table(
            &["Station", "Address"],
            dashboard
                .long_wait_stations
                .iter()
                .map(|s| vec![s.station_id.clone(), s.address.clone()]),
        ));
    }

    output
}

fn generate_metadata_section(metadata: &DashboardMetadata) -> String {
    let mut section = String::new();

    section.push_str(&format!("- **Data File:** {}\n", metadata.data_path));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Records Loaded:** {}\n",
        metadata.records_loaded
    ));
    if let Some(ref model) = metadata.model_used {
        section.push_str(&format!("- **Model Used:** `{}`\n", model));
    }
    section.push('\n');

    section
}

fn generate_distribution_section(buckets: &[DistributionBucket]) -> String {
    if buckets.is_empty() {
        return "No review distribution data available.\n\n".to_string();
    }

    let bars: Vec<(String, f64)> = buckets
        .iter()
        .map(|b| (format_number(b.value), b.stations as f64))
        .collect();

    let mut section = String::from("```\n");
    section.push_str(&text_bars(&bars));
    section.push_str("```\n\n");
    section
}

/// Render an answer from the analysis engine.
pub fn render_response(response: &AnalysisResponse) -> String {
    match response {
        AnalysisResponse::Text { value } => format!("{}\n", value),
        AnalysisResponse::Table(table) => render_table_answer(table),
        AnalysisResponse::Chart(chart) => render_chart(chart),
    }
}

fn render_table_answer(table: &TableAnswer) -> String {
    let headers: Vec<&str> = table.columns.iter().map(String::as_str).collect();
    markdown_table(
        &headers,
        table
            .rows
            .iter()
            .map(|row| row.iter().map(value_text).collect()),
    )
}

fn render_chart(chart: &ChartSpec) -> String {
    let mut output = String::new();

    let title = if chart.title.is_empty() {
        "Chart"
    } else {
        chart.title.as_str()
    };
    output.push_str(&format!("**{}** ({} chart)\n\n", title, chart.kind));
    if !chart.x_label.is_empty() || !chart.y_label.is_empty() {
        output.push_str(&format!("*x: {} | y: {}*\n\n", chart.x_label, chart.y_label));
    }

    let bars: Vec<(String, f64)> = chart
        .points
        .iter()
        .map(|p| (p.label.clone(), p.value))
        .collect();

    output.push_str("```\n");
    output.push_str(&text_bars(&bars));
    output.push_str("```\n");
    output
}

/// Render one chat turn as it is shown after a question.
pub fn render_turn(turn: &ChatTurn) -> String {
    let mut output = String::new();

    if let Some(ref refined) = turn.refined_question {
        output.push_str(&format!("🔍 **Refined prompt:** `{}`\n\n", refined));
    }

    match turn.outcome {
        TurnOutcome::Answer(ref response) => {
            output.push_str(&render_response(response));
            if let Some(ref sample) = turn.row_sample {
                output.push('\n');
                output.push_str(&render_row_sample(sample));
            }
        }
        TurnOutcome::Error(ref message) => output.push_str(&format!("❌ Error: {}\n", message)),
    }

    output
}

/// Note shown with answers computed from part of the table.
pub fn render_row_sample(sample: &RowSample) -> String {
    format!(
        "ℹ️ Based on the first {} of {} rows.\n",
        sample.shown, sample.total
    )
}

/// Render the chat history, newest first.
pub fn render_history(history: &[ChatTurn]) -> String {
    if history.is_empty() {
        return "No questions asked yet.\n".to_string();
    }

    let mut output = String::from("## 🧠 Chat History\n\n");

    for turn in history.iter().rev() {
        output.push_str(&format!("**You:** {}\n\n", turn.question));
        let answer = match turn.outcome {
            TurnOutcome::Answer(ref response) => render_response(response),
            TurnOutcome::Error(ref message) => format!("Error: {}\n", message),
        };
        output.push_str(&format!("**Bot:** {}\n", answer));
    }

    output
}

/// Generate a JSON dashboard.
pub fn generate_json_dashboard(dashboard: &Dashboard) -> Result<String> {
    serde_json::to_string_pretty(dashboard).map_err(Into::into)
}

/// Write rendered output to a file.
pub fn write_output(content: &str, path: &Path) -> Result<()> {
    std::fs::write(path, content)?;
    Ok(())
}

fn markdown_table<I>(headers: &[&str], rows: I) -> String
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut table = String::new();

    let header_cells: Vec<String> = headers.iter().map(|h| escape_cell(h)).collect();
    table.push_str(&format!("| {} |\n", header_cells.join(" | ")));
    table.push_str(&format!(
        "|{}|\n",
        headers.iter().map(|_| ":---").collect::<Vec<_>>().join("|")
    ));

    let mut empty = true;
    for row in rows {
        empty = false;
        let cells: Vec<String> = row.iter().map(|c| escape_cell(c)).collect();
        table.push_str(&format!("| {} |\n", cells.join(" | ")));
    }

    if empty {
        table.push_str(&format!("| *no rows* |{}\n", " |".repeat(headers.len().saturating_sub(1))));
    }

    table.push('\n');
    table
}

/// Keep a cell on one table row.
fn escape_cell(cell: &str) -> String {
    cell.replace('|', "\\|")
        .replace("\r\n", "<br>")
        .replace(['\n', '\r'], "<br>")
}

/// Horizontal bars scaled to the largest absolute value.
fn text_bars(bars: &[(String, f64)]) -> String {
    let label_width = bars.iter().map(|(l, _)| l.chars().count()).max().unwrap_or(0);
    let max = bars.iter().map(|(_, v)| v.abs()).fold(0.0_f64, f64::max);

    let mut output = String::new();
    for (label, value) in bars {
        let len = if max > 0.0 {
            ((value.abs() / max) * BAR_WIDTH as f64).round() as usize
        } else {
            0
        };
        output.push_str(&format!(
            "{:<width$} | {} {}\n",
            label,
            "█".repeat(len),
            format_number(*value),
            width = label_width
        ));
    }
    output
}

/// Whole numbers without decimals, everything else with two.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ChartKind, ChartPoint, LongWaitStation, StationRating, StationVolume, VendorRating,
        WaitMentions,
    };
    use chrono::Utc;
    use serde_json::json;

    fn create_test_dashboard() -> Dashboard {
        Dashboard {
            metadata: DashboardMetadata {
                data_path: "cleaned_ev_data.json".to_string(),
                generated_at: Utc::now(),
                records_loaded: 2,
                model_used: Some("gpt-4o-mini".to_string()),
            },
            top_stations: vec![StationVolume {
                station_id: "Acme - 1 Main St".to_string(),
                review_count: 8,
            }],
            worst_stations: vec![StationRating {
                station_id: "Acme - 1 Main St".to_string(),
                average_score: 3.75,
            }],
            vendor_ratings: vec![VendorRating {
                vendor: "Acme".to_string(),
                average_score: 3.75,
            }],
            review_distribution: vec![],
            wait_mentions: WaitMentions {
                mentions: 1,
                no_mentions: 1,
            },
            long_wait_stations: vec![LongWaitStation {
                station_id: "Acme - 1 Main St".to_string(),
                address: "1 Main St".to_string(),
            }],
        }
    }

    #[test]
    fn test_generate_markdown_dashboard() {
        let markdown = generate_markdown_dashboard(&create_test_dashboard());

        assert!(markdown.contains("# EV Charging Station Review Explorer"));
        assert!(markdown.contains("### Top 1 Stations by Review Volume"));
        assert!(markdown.contains("| Acme - 1 Main St | 8 |"));
        assert!(markdown.contains("| Acme | 3.75 |"));
        assert!(markdown.contains("No review distribution data available."));
        assert!(markdown.contains("| Acme - 1 Main St | 1 Main St |"));
        assert!(markdown.contains("`gpt-4o-mini`"));
    }

    #[test]
    fn test_distribution_bars() {
        let section = generate_distribution_section(&[
            DistributionBucket {
                value: 0.0,
                stations: 4,
            },
            DistributionBucket {
                value: 2.0,
                stations: 2,
            },
        ]);

        assert!(section.contains(&format!("0 | {} 4", "█".repeat(BAR_WIDTH))));
        assert!(section.contains(&format!("2 | {} 2", "█".repeat(BAR_WIDTH / 2))));
    }

    #[test]
    fn test_render_table_answer() {
        let rendered = render_response(&AnalysisResponse::Table(TableAnswer {
            columns: vec!["city".to_string(), "stations".to_string()],
            rows: vec![vec![json!("San Jose"), json!(2)], vec![json!("A|B"), json!(null)]],
        }));

        assert!(rendered.contains("| city | stations |"));
        assert!(rendered.contains("| San Jose | 2 |"));
        assert!(rendered.contains("| A\\|B |  |"));
    }

    #[test]
    fn test_table_cells_stay_on_one_line() {
        let rendered = render_response(&AnalysisResponse::Table(TableAnswer {
            columns: vec!["station\nname".to_string(), "complaint".to_string()],
            rows: vec![vec![json!("Acme"), json!("slow\nbroken plug\r\nqueue")]],
        }));

        assert!(rendered.contains("| station<br>name | complaint |"));
        assert!(rendered.contains("| Acme | slow<br>broken plug<br>queue |"));
        assert_eq!(rendered.lines().filter(|l| l.starts_with('|')).count(), 3);
    }

    #[test]
    fn test_render_chart() {
        let rendered = render_response(&AnalysisResponse::Chart(ChartSpec {
            kind: ChartKind::Bar,
            title: "Stations per vendor".to_string(),
            x_label: "vendor".to_string(),
            y_label: "stations".to_string(),
            points: vec![
                ChartPoint {
                    label: "Acme".to_string(),
                    value: 3.0,
                },
                ChartPoint {
                    label: "Volt".to_string(),
                    value: 1.5,
                },
            ],
        }));

        assert!(rendered.contains("**Stations per vendor** (bar chart)"));
        assert!(rendered.contains("*x: vendor | y: stations*"));
        assert!(rendered.contains("Volt |"));
        assert!(rendered.contains("1.50"));
    }

    #[test]
    fn test_render_turn_notes_row_sample() {
        let mut turn = ChatTurn {
            question: "Top complaints?".to_string(),
            refined_question: None,
            outcome: TurnOutcome::Answer(AnalysisResponse::text("Broken plugs.")),
            row_sample: Some(RowSample {
                shown: 500,
                total: 1200,
            }),
            asked_at: Utc::now(),
        };

        let rendered = render_turn(&turn);
        assert!(rendered.starts_with("Broken plugs.\n"));
        assert!(rendered.contains("first 500 of 1200 rows"));

        turn.row_sample = None;
        assert!(!render_turn(&turn).contains("rows"));
    }

    #[test]
    fn test_render_history_newest_first() {
        let turns = vec![
            ChatTurn {
                question: "first".to_string(),
                refined_question: None,
                outcome: TurnOutcome::Answer(AnalysisResponse::text("one")),
                row_sample: None,
                asked_at: Utc::now(),
            },
            ChatTurn {
                question: "second".to_string(),
                refined_question: Some("second, refined".to_string()),
                outcome: TurnOutcome::Error("engine down".to_string()),
                row_sample: None,
                asked_at: Utc::now(),
            },
        ];

        let rendered = render_history(&turns);
        let first = rendered.find("**You:** first").unwrap();
        let second = rendered.find("**You:** second").unwrap();
        assert!(second < first);
        assert!(rendered.contains("**Bot:** Error: engine down"));

        let turn = render_turn(&turns[1]);
        assert!(turn.contains("Refined prompt:** `second, refined`"));
        assert!(turn.contains("❌ Error: engine down"));
    }

    #[test]
    fn test_generate_json_dashboard() {
        let json = generate_json_dashboard(&create_test_dashboard()).unwrap();

        assert!(json.contains("\"top_stations\""));
        assert!(json.contains("\"wait_mentions\""));
        assert!(json.contains("\"records_loaded\": 2"));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(3.456), "3.46");
    }
}
