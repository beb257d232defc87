// Copyright (c) The checkpoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builds reports from run summaries end to end.

use camino::Utf8Path;
use camino_tempfile::Utf8TempDir;
use checkpoint_metadata::RunSummary;
use checkpoint_model::{LogLevel, Media, Report};
use checkpoint_runner::{
    config::{CheckpointConfig, ReportFormat},
    evidence::PDF_VALIDATION_GUIDE,
    input::read_run_summary,
    reporter::{CollectingSink, FileSink, ReportStats, ResultAggregator},
};
use indoc::indoc;
use pretty_assertions::assert_eq;

/// Two soft failures in `checkLogin`; the run's registry knows only the first.
static SOFT_FAILURES_RUN: &str = indoc! {r#"
    {
        "known-failures": "checkLogin:42#admin_JIRA-101",
        "runner-output": ["Run started on grid-3"],
        "suites": [
            {
                "name": "Regression",
                "parent": true
            },
            {
                "name": "Login",
                "results": {
                    "failed": [
                        {
                            "method-name": "checkLogin",
                            "groups": ["smoke"],
                            "description": "Login works #JIRA-55",
                            "status": "fail",
                            "start-millis": 1700000000000,
                            "end-millis": 1700000005000,
                            "failure": {
                                "kind": "composite",
                                "errors": [
                                    {
                                        "message": "Expected user [ admin ]",
                                        "stack-trace": [
                                            {"declaring-class": "org.assertj.Soft", "method-name": "fail", "line-number": 3},
                                            {"declaring-class": "framework.pages.Login", "method-name": "verifyUser", "line-number": 10},
                                            {"declaring-class": "framework.tests.LoginTest", "method-name": "checkLogin", "line-number": 42}
                                        ]
                                    },
                                    "{\"message\":\"Expected title [Home]\",\"stackTrace\":[{\"className\":\"framework.pages.Login\",\"methodName\":\"verifyTitle\",\"lineNumber\":20},{\"className\":\"framework.tests.LoginTest\",\"methodName\":\"checkLogin\",\"lineNumber\":43}]}",
                                    "not a serialized failure"
                                ]
                            }
                        }
                    ]
                }
            }
        ]
    }
"#};

fn write_file(path: &Utf8Path, contents: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

fn config_for(evidence_dir: &Utf8Path) -> CheckpointConfig {
    let mut config = CheckpointConfig::default_config();
    config.set_evidence_dir(evidence_dir);
    config
}

fn build(config: &CheckpointConfig, summary: &RunSummary) -> (Report, ReportStats) {
    let mut sink = CollectingSink::new();
    let stats = ResultAggregator::new(config)
        .run(summary, &mut sink)
        .expect("collecting sink never fails after start");
    (sink.into_report().expect("report was started"), stats)
}

#[test]
fn soft_failures_partially_known() {
    let dir = Utf8TempDir::new().unwrap();
    let evidence_dir = dir.path().join("screenshots");
    write_file(
        &evidence_dir.join("checkLogin/verifyUser-42_screenshot.png"),
        "png",
    );
    write_file(&evidence_dir.join("checkLogin/unrelated.txt"), "txt");

    let config = config_for(&evidence_dir);
    let summary = RunSummary::parse_json(SOFT_FAILURES_RUN).unwrap();
    let (report, stats) = build(&config, &summary);

    assert_eq!(report.name, "Checkpoint : Regression");
    assert_eq!(report.entries.len(), 1);
    let entry = &report.entries[0];

    // Not every failure is known, so there's no marker.
    assert!(!entry.title.contains("Expected Failures"), "{}", entry.title);
    assert!(entry.title.starts_with("checkLogin : <a href='https://jira.example.com/browse/JIRA-55'"));
    assert_eq!(entry.categories, vec!["Login".to_owned(), "smoke".to_owned()]);

    // The undecodable entry is dropped; the rest keep their order.
    let ids: Vec<&str> = entry
        .failures
        .iter()
        .map(|slot| slot.checkpoint_id.as_str())
        .collect();
    assert_eq!(ids, vec!["checkLogin:42#admin", "checkLogin:43#Home"]);

    let first = &entry.failures[0];
    assert_eq!(
        first.tracking.as_ref().map(|link| link.reference.as_str()),
        Some("JIRA-101")
    );
    assert_eq!(
        first.evidence,
        Some(Media::Screenshot {
            path: "screenshots/checkLogin/verifyUser-42_screenshot.png".to_owned()
        })
    );

    let second = &entry.failures[1];
    assert_eq!(second.tracking, None);
    assert_eq!(second.evidence, None);

    let warnings: Vec<&str> = entry
        .logs
        .iter()
        .filter(|line| line.level == LogLevel::Warning)
        .map(|line| line.message.as_str())
        .collect();
    assert_eq!(warnings.len(), 2, "one warning per decoded failure: {warnings:?}");
    assert!(warnings[0].contains("Failure is already reported"));
    assert!(warnings[0].contains("JIRA-101"));
    assert!(!warnings[1].contains("Failure is already reported"));

    assert_eq!(
        report.system_info.get("<a href=\"https://jira.example.com/browse/JIRA-55\">JIRA-55</a>"),
        Some(&"Fail".to_owned())
    );
    assert_eq!(report.runner_output.len(), 1);
    assert_eq!(
        stats,
        ReportStats {
            suites: 1,
            entries: 1,
            passed: 0,
            failed: 1,
            skipped: 0,
            decode_errors: 1,
            already_reported: 1,
            new_failures: 1,
            evidence_files: 1,
        }
    );
}

#[test]
fn paginated_diff_adds_guide() {
    let dir = Utf8TempDir::new().unwrap();
    let evidence_dir = dir.path().join("screenshots");
    write_file(
        &evidence_dir.join("checkInvoice_withParameters_1700000000999/invoice_diff.pdf"),
        "pdf",
    );
    write_file(
        &evidence_dir.join("checkInvoice_withParameters_1700000000999/checkInvoice_page.png"),
        "png",
    );

    let summary = RunSummary::parse_json(indoc! {r#"
        {
            "suites": [
                {
                    "name": "Documents",
                    "parent": true,
                    "results": {
                        "passed": [
                            {
                                "method-name": "checkInvoice",
                                "status": "pass",
                                "parameters": ["EUR", null],
                                "attributes": {"StartTimeStamp": "1700000000999"}
                            }
                        ]
                    }
                }
            ]
        }
    "#})
    .unwrap();

    let config = config_for(&evidence_dir);
    let (report, stats) = build(&config, &summary);
    let entry = &report.entries[0];

    let messages: Vec<&str> = entry.logs.iter().map(|line| line.message.as_str()).collect();
    assert_eq!(messages[0], "<br><b>Parameters:</b> EUR,null");
    assert_eq!(messages[1], "Test passed");
    assert_eq!(messages.last().copied(), Some(PDF_VALIDATION_GUIDE));

    let media: Vec<&Media> = entry.logs.iter().filter_map(|line| line.media.as_ref()).collect();
    assert_eq!(
        media,
        vec![
            &Media::Screenshot {
                path: "screenshots/checkInvoice_withParameters_1700000000999/checkInvoice_page.png"
                    .to_owned()
            },
            &Media::Download {
                path: "screenshots/checkInvoice_withParameters_1700000000999/invoice_diff.pdf"
                    .to_owned()
            },
        ]
    );
    assert_eq!(stats.evidence_files, 2);
}

#[test]
fn output_is_byte_identical_across_runs() {
    let dir = Utf8TempDir::new().unwrap();
    let evidence_dir = dir.path().join("screenshots");
    write_file(
        &evidence_dir.join("checkLogin/verifyUser-42_screenshot.png"),
        "png",
    );
    let run_path = dir.path().join("run.json");
    write_file(&run_path, SOFT_FAILURES_RUN);

    let config = config_for(&evidence_dir);
    let summary = read_run_summary(&run_path).unwrap();

    for format in [ReportFormat::Xml, ReportFormat::Json] {
        let mut outputs = Vec::new();
        for attempt in 0..2 {
            let path = dir.path().join(format!("out/{attempt}/report.{format}"));
            let mut sink = FileSink::new(&path, format);
            ResultAggregator::new(&config)
                .run(&summary, &mut sink)
                .unwrap();
            outputs.push(std::fs::read(&path).unwrap());
        }
        assert_eq!(outputs[0], outputs[1], "{format} output differs between runs");
    }
}

#[test]
fn malformed_registry_entries_are_dropped() {
    let dir = Utf8TempDir::new().unwrap();
    let mut summary = RunSummary::parse_json(SOFT_FAILURES_RUN).unwrap();
    summary.known_failures = Some("checkLogin:42#admin_JIRA-101 ; ; _orphan".to_owned());

    let config = config_for(&dir.path().join("screenshots"));
    let (report, stats) = build(&config, &summary);
    assert_eq!(stats.already_reported, 1);

    let references: Vec<Option<&str>> = report.entries[0]
        .failures
        .iter()
        .map(|slot| slot.tracking.as_ref().map(|link| link.reference.as_str()))
        .collect();
    assert_eq!(references, vec![Some("JIRA-101"), None]);
}
