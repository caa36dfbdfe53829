//! Plain-text rendering of error store results, shared by the CLI and the
//! MCP tools.

use crate::{
    error_store::{ErrorRecord, ImportSummary, StoreStats},
    text_util::truncate_with_marker,
};

const RULE_WIDTH: usize = 60;
const SOLUTION_PREVIEW_CHARS: usize = 100;

fn heading(title: &str) -> String {
    format!("{title}\n{}\n\n", "=".repeat(RULE_WIDTH))
}

pub fn render_logged(record: &ErrorRecord, location: &str) -> String {
    let mut out = heading("Error recorded");
    out.push_str(&format!("Code: {}\n", record.error_code));
    out.push_str(&format!("Message: {}\n", record.error_message));
    out.push_str(&format!("Occurrences: {}\n", record.occurrence_count));
    out.push_str(&format!("First seen: {}\n", record.first_seen));
    out.push_str(&format!("Last seen: {}\n", record.last_seen));

    if let Some(solution) = &record.solution {
        out.push_str(&format!("\nSolution:\n{solution}\n"));
    }
    if let Some(docs) = &record.related_docs {
        out.push_str(&format!("\nRelated documents:\n{docs}\n"));
    }

    out.push_str(&format!("\nStore: {location}"));
    out
}

pub fn render_common(records: &[ErrorRecord], stats: &StoreStats) -> String {
    if records.is_empty() {
        return "The error database is empty\n\n\
                Tip: record compiler errors with log_error as you meet them"
            .to_string();
    }

    let mut out = heading(&format!("Most common errors (top {})", records.len()));
    for (i, record) in records.iter().enumerate() {
        out.push_str(&format!(
            "{}. {} - {}\n",
            i + 1,
            record.error_code,
            record.error_message
        ));
        out.push_str(&format!("   occurrences: {}\n", record.occurrence_count));
        out.push_str(&format!("   last seen: {}\n", record.last_seen));
        if let Some(solution) = &record.solution {
            out.push_str(&format!(
                "   solution: {}\n",
                truncate_with_marker(solution, SOLUTION_PREVIEW_CHARS, "...")
            ));
        }
        out.push('\n');
    }

    out.push_str(&"-".repeat(RULE_WIDTH));
    out.push_str("\nStatistics:\n");
    out.push_str(&format!("  distinct errors: {}\n", stats.total_errors));
    out.push_str(&format!("  total occurrences: {}\n", stats.total_occurrences));
    out.push_str(&format!("  store: {}\n", stats.store_location));
    out
}

pub fn render_export(json: &str, anonymize: bool) -> String {
    let mut out = heading("Error database exported");
    if anonymize {
        out.push_str("File paths removed\n\n");
    }
    out.push_str(&format!("```json\n{json}\n```\n\n"));
    out.push_str(
        "Tip: pass this JSON to manage_error_db with action=\"import\" on another machine",
    );
    out
}

pub fn render_import(summary: &ImportSummary, stats: &StoreStats) -> String {
    let mut out = heading("Error database import finished");
    out.push_str(&format!("Imported: {}\n", summary.imported));
    out.push_str(&format!("Updated: {}\n", summary.updated));
    if summary.errors > 0 {
        out.push_str(&format!("Failed: {}\n", summary.errors));
    }
    out.push_str("\nStore now holds:\n");
    out.push_str(&format!("  distinct errors: {}\n", stats.total_errors));
    out.push_str(&format!("  total occurrences: {}\n", stats.total_occurrences));
    out
}

pub fn render_stats(stats: &StoreStats) -> String {
    let mut out = heading("Error database statistics");
    out.push_str(&format!("  distinct errors: {}\n", stats.total_errors));
    out.push_str(&format!("  total occurrences: {}\n", stats.total_occurrences));
    out.push_str(&format!(
        "  average per error: {:.1}\n\n",
        stats.average_occurrences()
    ));
    out.push_str(&format!("Location: {}\n", stats.store_location));
    out
}
