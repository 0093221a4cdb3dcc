//! Report rendering.
//!
//! Turns the outcome of a run into a text summary or a JSON document.

use crate::aggregator::format_thousands;
use crate::models::{AggregationState, NetworkReport};
use anyhow::Result;

/// Generate the human-readable summary for a finished run.
pub fn generate_text_report(report: &NetworkReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("FID: {}\n\n", report.fid));

    match &report.outcome {
        AggregationState::Succeeded {
            total,
            average,
            processed,
        } => {
            output.push_str("Total Followers of Your Network\n");
            output.push_str(&format!("  {}\n", format_thousands(*total)));
            output.push_str(&format!(
                "  (from {} followers)\n\n",
                format_thousands(*processed as u64)
            ));
            output.push_str("Average Followers per Follower\n");
            output.push_str(&format!("  {}\n", format_thousands(*average)));
        }
        AggregationState::Failed { message } => {
            output.push_str(&format!("Error: {}\n", message));
        }
        other => {
            output.push_str(&format!("{}\n", other.progress_label()));
        }
    }

    output.push_str(&format!(
        "\nGenerated {} in {:.1}s\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.duration_seconds
    ));

    output
}

/// Generate a JSON report.
pub fn generate_json_report(report: &NetworkReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
