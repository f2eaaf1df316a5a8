//! One check run: query, fetch, validate, report, deliver.

use std::path::PathBuf;

use chrono::{DateTime, FixedOffset, Local};

use crate::api::{FetchError, PointSource};
use crate::config::Config;
use crate::mail::{DeliveryError, Mailer, OutgoingMail};
use crate::prerequisites::PrerequisiteMissing;
use crate::report::Report;
use crate::validate::{ValidationOutcome, validate_csv};
use crate::workdir::{QUERY_FILE, REPORT_FILE, RESPONSE_FILE, WorkDir};

/// Failures that end a run before a report exists
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("prerequisite missing: {0}")]
    Prerequisite(#[from] PrerequisiteMissing),
    #[error("failed to fetch survey points: {0}")]
    Fetch(#[from] FetchError),
}

/// What happened to the report
#[derive(Debug)]
pub enum Delivery {
    Sent { recipients: usize },
    /// No mailer configured (dry run)
    Skipped,
    /// The report was built but could not be sent
    Failed(DeliveryError),
}

#[derive(Debug)]
pub struct RunSummary {
    pub outcome: ValidationOutcome,
    pub report: Report,
    pub subject: String,
    pub body: String,
    pub delivery: Delivery,
    /// Set when work files were kept
    pub work_dir: Option<PathBuf>,
}

pub struct Pipeline<'a> {
    config: &'a Config,
    source: &'a dyn PointSource,
    mailer: Option<&'a dyn Mailer>,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, source: &'a dyn PointSource) -> Self {
        Self {
            config,
            source,
            mailer: None,
        }
    }

    pub fn with_mailer(mut self, mailer: &'a dyn Mailer) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn run(&self) -> Result<RunSummary, RunError> {
        self.run_with_clock(&|| Local::now().fixed_offset())
    }

    /// Run using `clock` for the report timestamps
    pub fn run_with_clock(
        &self,
        clock: &dyn Fn() -> DateTime<FixedOffset>,
    ) -> Result<RunSummary, RunError> {
        // Work files are optional; a run without them still reports
        let work = match WorkDir::create(self.config.work_root.as_deref(), !self.config.clean) {
            Ok(work) => Some(work),
            Err(err) => {
                tracing::warn!(error = %err, "Failed to create work directory, not saving work files");
                None
            }
        };
        let result = self.run_in(work.as_ref(), clock);

        let kept = match work.map(WorkDir::finish) {
            Some(Ok(kept)) => kept,
            Some(Err(err)) => {
                tracing::warn!(error = %err, "Failed to remove work directory");
                None
            }
            None => None,
        };

        result.map(|mut summary| {
            summary.work_dir = kept;
            summary
        })
    }

    fn run_in(
        &self,
        work: Option<&WorkDir>,
        clock: &dyn Fn() -> DateTime<FixedOffset>,
    ) -> Result<RunSummary, RunError> {
        let started = clock();
        tracing::info!(area = %self.config.query.area, "Starting survey point check");

        let save = |name: &str, contents: &str| {
            if let Some(work) = work {
                work.save(name, contents);
            }
        };

        let query = self.config.query.to_overpass_ql();
        save(QUERY_FILE, &query);

        tracing::info!(source = %self.source.describe(), "Fetching survey points");
        let csv = self.source.fetch(&query)?;
        save(RESPONSE_FILE, &csv);

        let outcome = validate_csv(&csv, self.config.comparison);

        let report = Report::new(&self.config.query.area, &outcome, started, clock());
        let subject = report.subject(&self.config.mail.subject_prefix);
        let body = report.render();
        save(REPORT_FILE, &body);

        let delivery = match self.mailer {
            Some(mailer) => {
                let mail = OutgoingMail {
                    recipients: self.config.recipients.clone(),
                    subject: subject.clone(),
                    body: body.clone(),
                };
                match mailer.send(&mail) {
                    Ok(()) => Delivery::Sent {
                        recipients: mail.recipients.len(),
                    },
                    Err(err) => {
                        tracing::error!(error = %err, "Failed to send report");
                        Delivery::Failed(err)
                    }
                }
            }
            None => Delivery::Skipped,
        };

        Ok(RunSummary {
            outcome,
            report,
            subject,
            body,
            delivery,
            work_dir: None,
        })
    }
}
