use chrono::{DateTime, FixedOffset};
use std::fmt::Write;

use crate::domain::DiscrepancyEntry;
use crate::validate::ValidationOutcome;

const SOURCE_URL: &str = env!("CARGO_PKG_REPOSITORY");
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %:z";

/// Plain-text discrepancy report for one run
#[derive(Debug, Clone)]
pub struct Report {
    pub area: String,
    pub started: DateTime<FixedOffset>,
    pub finished: DateTime<FixedOffset>,
    /// Well-formed rows that were checked
    pub points_checked: usize,
    pub entries: Vec<DiscrepancyEntry>,
    pub malformed_rows: usize,
}

impl Report {
    pub fn new(
        area: impl Into<String>,
        outcome: &ValidationOutcome,
        started: DateTime<FixedOffset>,
        finished: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            area: area.into(),
            started,
            finished,
            points_checked: outcome.rows,
            entries: outcome.discrepancies.clone(),
            malformed_rows: outcome.malformed.len(),
        }
    }

    pub fn subject(&self, prefix: &str) -> String {
        let subject = match self.entries.len() {
            0 => format!("Survey points in {}: no discrepancies", self.area),
            1 => format!("Survey points in {}: 1 discrepancy", self.area),
            n => format!("Survey points in {}: {} discrepancies", self.area, n),
        };
        if prefix.is_empty() {
            subject
        } else {
            format!("{prefix} {subject}")
        }
    }

    /// Header, one line per discrepancy, footer
    pub fn render(&self) -> String {
        let mut body = String::new();

        // Writing to a String cannot fail
        let _ = writeln!(
            body,
            "Survey point coordinate check for {}\n\
             Started: {}\n\
             Points checked: {}\n",
            self.area,
            self.started.format(TIME_FORMAT),
            self.points_checked
        );

        if self.entries.is_empty() {
            body.push_str("No discrepancies found.\n");
        } else {
            for entry in &self.entries {
                body.push_str(&entry.message());
                body.push('\n');
            }
        }

        body.push('\n');
        if self.malformed_rows > 0 {
            let _ = writeln!(
                body,
                "Skipped {} row(s) with unreadable coordinate tags.",
                self.malformed_rows
            );
        }
        let _ = writeln!(body, "Finished: {}", self.finished.format(TIME_FORMAT));
        let _ = writeln!(
            body,
            "Generated by {} {} ({SOURCE_URL})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        );

        body
    }
}
