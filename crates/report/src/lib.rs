//! Rendering of fleet summaries and delivery to notification channels.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod slack;
mod table;

pub use error::{Error, Result};
pub use slack::SlackWebhookSink;
pub use table::{ReportRow, format_time, render_table};

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Write as _;

use async_trait::async_trait;
use fleet_pipeline::RunReport;

/// A rendered run, ready to be delivered.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Report {
    /// One row per group, ordered by key.
    pub rows: Vec<ReportRow>,

    /// Excluded instances with the reason each was left out.
    pub excluded: Vec<(String, String)>,

    /// Number of instances the run started with.
    pub listed: usize,
}

impl Report {
    /// Formats the outcome of a pipeline run.
    #[must_use]
    pub fn from_run(run: &RunReport) -> Self {
        Self {
            rows: run.summaries.values().map(ReportRow::from_summary).collect(),
            excluded: run
                .exclusions
                .iter()
                .map(|exclusion| (exclusion.id.to_string(), exclusion.reason.to_string()))
                .collect(),
            listed: run.listed,
        }
    }

    /// Renders the table followed by a note on excluded instances.
    #[must_use]
    pub fn render(&self) -> String {
        let mut text = render_table(&self.rows);

        if self.excluded.is_empty() {
            let _ = writeln!(text, "All {} instances included.", self.listed);
            return text;
        }

        let _ = writeln!(
            text,
            "{} of {} instances excluded:",
            self.excluded.len(),
            self.listed
        );

        let mut by_reason: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (id, reason) in &self.excluded {
            by_reason.entry(reason).or_default().push(id);
        }
        for (reason, ids) in by_reason {
            let _ = writeln!(text, "  {reason}: {}", ids.join(", "));
        }

        text
    }
}

/// Destination for rendered reports.
#[async_trait]
pub trait ReportSink
where
    Self: Send + Sync,
{
    /// Delivers the report.
    async fn deliver(&self, report: &Report) -> Result<()>;
}

/// Writes reports to standard output.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdoutSink;

#[async_trait]
impl ReportSink for StdoutSink {
    async fn deliver(&self, report: &Report) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(report.render().as_bytes())?;
        stdout.flush()?;

        Ok(())
    }
}
