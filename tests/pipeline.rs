use std::cell::RefCell;
use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use surveycheck::api::{FetchError, FileSource, PointSource};
use surveycheck::config::{Config, FileConfig};
use surveycheck::domain::Axis;
use surveycheck::exit::{codes, exit_code};
use surveycheck::mail::{DeliveryError, Mailer, OutgoingMail};
use surveycheck::pipeline::{Delivery, Pipeline, RunError};

struct StaticSource {
    body: String,
    queries: RefCell<Vec<String>>,
}

impl StaticSource {
    fn new(body: &str) -> Self {
        Self {
            body: body.to_string(),
            queries: RefCell::new(Vec::new()),
        }
    }
}

impl PointSource for StaticSource {
    fn fetch(&self, query: &str) -> Result<String, FetchError> {
        self.queries.borrow_mut().push(query.to_string());
        Ok(self.body.clone())
    }

    fn describe(&self) -> String {
        "static".to_string()
    }
}

struct FailingSource;

impl PointSource for FailingSource {
    fn fetch(&self, _query: &str) -> Result<String, FetchError> {
        Err(FetchError::Status {
            url: "https://overpass.example/api/interpreter".to_string(),
            status: 500,
        })
    }

    fn describe(&self) -> String {
        "failing".to_string()
    }
}

#[derive(Default)]
struct RecordingMailer {
    sent: RefCell<Vec<OutgoingMail>>,
    fail: bool,
}

impl Mailer for RecordingMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<(), DeliveryError> {
        if self.fail {
            return Err(DeliveryError::NoSmtpHost);
        }
        self.sent.borrow_mut().push(mail.clone());
        Ok(())
    }
}

fn config(vars: &[(&str, &str)]) -> Config {
    let vars: HashMap<&str, &str> = vars.iter().copied().collect();
    Config::resolve(FileConfig::default(), |name| {
        vars.get(name).map(|v| v.to_string())
    })
    .unwrap()
}

fn clock() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2026-10-18T06:00:00-05:00").unwrap()
}

#[test]
fn test_run_reports_and_mails_discrepancies() {
    let config = config(&[("EMAILS", "ops@example.org,qa@example.org")]);
    let source = StaticSource::new(
        "101,4.1234567,4.1234560,-74.1234567,-74.1234560\n\
         102,4.0000000,4.0000001,-74.0,-74.0\n",
    );
    let mailer = RecordingMailer::default();

    let summary = Pipeline::new(&config, &source)
        .with_mailer(&mailer)
        .run_with_clock(&clock)
        .unwrap();

    assert_eq!(summary.outcome.rows, 2);
    assert_eq!(summary.outcome.discrepancies.len(), 1);
    assert_eq!(summary.outcome.discrepancies[0].point_id, 101);
    assert_eq!(summary.outcome.discrepancies[0].axis, Axis::Latitude);
    assert!(matches!(summary.delivery, Delivery::Sent { recipients: 2 }));
    assert!(summary.work_dir.is_none());

    let queries = source.queries.borrow();
    assert_eq!(queries.len(), 1);
    assert!(queries[0].contains(r#"["man_made"="survey_point"]"#));

    let sent = mailer.sent.borrow();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipients.len(), 2);
    assert_eq!(
        sent[0].subject,
        "[surveycheck] Survey points in Colombia: 1 discrepancy"
    );
    assert!(sent[0].body.contains("https://www.openstreetmap.org/node/101"));
    assert!(!sent[0].body.contains("node/102"));
}

#[test]
fn test_empty_response_still_sends_report() {
    let config = config(&[]);
    let source = StaticSource::new("");
    let mailer = RecordingMailer::default();

    let summary = Pipeline::new(&config, &source)
        .with_mailer(&mailer)
        .run_with_clock(&clock)
        .unwrap();

    assert!(summary.outcome.is_clean());
    let sent = mailer.sent.borrow();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].body.contains("No discrepancies found."));
    assert!(sent[0].body.contains("Finished: 2026-10-18 06:00:00 -05:00"));
}

#[test]
fn test_malformed_row_skipped_and_counted() {
    let config = config(&[]);
    let source = StaticSource::new("1,4.5,4.4,-74,-74\n2,4.5,four,-74,-74\n3,5.5,5.4,-75,-75\n");

    let summary = Pipeline::new(&config, &source)
        .run_with_clock(&clock)
        .unwrap();

    assert!(matches!(summary.delivery, Delivery::Skipped));
    assert_eq!(summary.outcome.malformed.len(), 1);
    let ids: Vec<u64> = summary
        .outcome
        .discrepancies
        .iter()
        .map(|d| d.point_id)
        .collect();
    assert_eq!(ids, vec![1, 3]);
    assert!(summary.body.contains("Skipped 1 row(s)"));
}

#[test]
fn test_fetch_failure_is_fatal() {
    let config = config(&[]);
    let mailer = RecordingMailer::default();

    let err = Pipeline::new(&config, &FailingSource)
        .with_mailer(&mailer)
        .run_with_clock(&clock)
        .unwrap_err();

    assert!(matches!(err, RunError::Fetch(FetchError::Status { status: 500, .. })));
    assert_eq!(exit_code(&err), codes::GENERAL);
    assert!(mailer.sent.borrow().is_empty());
}

#[test]
fn test_delivery_failure_keeps_outcome() {
    let config = config(&[]);
    let source = StaticSource::new("1,2,1,0,0\n");
    let mailer = RecordingMailer {
        fail: true,
        ..Default::default()
    };

    let summary = Pipeline::new(&config, &source)
        .with_mailer(&mailer)
        .run_with_clock(&clock)
        .unwrap();

    assert!(matches!(summary.delivery, Delivery::Failed(_)));
    assert_eq!(summary.outcome.discrepancies.len(), 1);
}

#[test]
fn test_kept_work_files() {
    let config = config(&[("CLEAN", "false")]);
    let source = StaticSource::new("1,2,1,0,0\n");

    let summary = Pipeline::new(&config, &source)
        .run_with_clock(&clock)
        .unwrap();

    let dir = summary.work_dir.expect("work dir kept");
    assert_eq!(
        std::fs::read_to_string(dir.join("survey_points.csv")).unwrap(),
        "1,2,1,0,0\n"
    );
    assert!(std::fs::read_to_string(dir.join("query.overpassql"))
        .unwrap()
        .contains("Colombia"));
    assert_eq!(
        std::fs::read_to_string(dir.join("report.txt")).unwrap(),
        summary.body
    );
    std::fs::remove_dir_all(dir).unwrap();
}

#[test]
fn test_unusable_work_root_does_not_fail_run() {
    let root = tempfile::tempdir().unwrap();
    let mut config = config(&[("CLEAN", "false")]);
    config.work_root = Some(root.path().join("does-not-exist"));
    let source = StaticSource::new("1,2,1,0,0\n");
    let mailer = RecordingMailer::default();

    let summary = Pipeline::new(&config, &source)
        .with_mailer(&mailer)
        .run_with_clock(&clock)
        .unwrap();

    assert!(summary.work_dir.is_none());
    assert_eq!(summary.outcome.discrepancies.len(), 1);
    assert!(matches!(summary.delivery, Delivery::Sent { recipients: 1 }));
    assert_eq!(mailer.sent.borrow().len(), 1);
}

#[test]
fn test_strict_mode_from_saved_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("points.csv");
    std::fs::write(&path, "102,4.0000000,4.0000001,-74.0,-74.0\n").unwrap();

    let mut config = config(&[]);
    let source = FileSource::new(&path);

    let summary = Pipeline::new(&config, &source)
        .run_with_clock(&clock)
        .unwrap();
    assert!(summary.outcome.is_clean());

    config.comparison = surveycheck::validate::ComparisonMode::AnyDifference;
    let summary = Pipeline::new(&config, &source)
        .run_with_clock(&clock)
        .unwrap();
    assert_eq!(summary.outcome.discrepancies.len(), 1);
    assert_eq!(summary.outcome.discrepancies[0].axis, Axis::Latitude);
}
