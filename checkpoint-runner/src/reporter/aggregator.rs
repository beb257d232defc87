// Copyright (c) The checkpoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns a finished run into report entries.

use super::{
    helpers::{
        already_reported, checkpoint_info, composite_summary, download_link, entry_title,
        evidence_path, failure_text, parameters_line, soft_failure_warning, status_label,
        system_info_key, tracking_tags,
    },
    sink::ReportSink,
};
use crate::{
    config::CheckpointConfig,
    errors::{DisplayErrorChain, SinkError},
    evidence::{EvidenceMatch, EvidenceMatcher, EvidenceNamer, PDF_VALIDATION_GUIDE, list_evidence},
    fingerprint::Fingerprinter,
    known_failures::KnownFailureRegistry,
    outcome::{FailureRecord, RootFailure, TestOutcome},
    soft_failure::{DecodedFailures, SoftFailureDecoder},
};
use checkpoint_metadata::{RunSummary, SuiteResults, SuiteSummary, TestOutcomeSummary};
use checkpoint_model::{EntryStatus, FailureSlot, LogLevel, Media, ReportEntry, TrackingLink};
use std::fmt;

/// Everything derived once per run and shared by every entry.
#[derive(Clone, Debug)]
pub struct ReportContext<'cfg> {
    config: &'cfg CheckpointConfig,
    registry: KnownFailureRegistry,
    fingerprinter: Fingerprinter,
    namer: EvidenceNamer,
    matcher: EvidenceMatcher,
}

impl<'cfg> ReportContext<'cfg> {
    /// Creates a new context from the config and the run's known failures.
    pub fn new(config: &'cfg CheckpointConfig, registry: KnownFailureRegistry) -> Self {
        Self {
            config,
            registry,
            fingerprinter: config.fingerprinter(),
            namer: config.evidence_namer(),
            matcher: config.evidence_matcher(),
        }
    }

    fn tracking_link(&self, reference: &str) -> TrackingLink {
        TrackingLink::new(reference, self.config.tracker_url(reference))
    }
}

/// The phases the aggregator moves through, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AggregatorPhase {
    /// Nothing has happened yet.
    Init,

    /// The known-failure registry is being read.
    ReadKnownFailures,

    /// Entries for a bucket of a suite are being emitted.
    Emit {
        /// The name of the suite.
        suite: String,

        /// The bucket being emitted.
        bucket: ResultBucket,
    },

    /// The sink is being flushed.
    Flush,

    /// The report is complete.
    Done,
}

impl fmt::Display for AggregatorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregatorPhase::Init => write!(f, "init"),
            AggregatorPhase::ReadKnownFailures => write!(f, "read known failures"),
            AggregatorPhase::Emit { suite, bucket } => write!(f, "emit {bucket} ({suite})"),
            AggregatorPhase::Flush => write!(f, "flush"),
            AggregatorPhase::Done => write!(f, "done"),
        }
    }
}

/// A partition of a suite's results.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResultBucket {
    /// Tests that failed.
    Failed,

    /// Tests that were skipped.
    Skipped,

    /// Tests that passed.
    Passed,

    /// Configuration methods that failed.
    FailedConfigurations,
}

impl ResultBucket {
    /// All buckets, in emission order.
    pub const ALL: [ResultBucket; 4] = [
        ResultBucket::Failed,
        ResultBucket::Skipped,
        ResultBucket::Passed,
        ResultBucket::FailedConfigurations,
    ];

    /// Returns the status of entries emitted for this bucket.
    pub fn status(self) -> EntryStatus {
        match self {
            ResultBucket::Failed | ResultBucket::FailedConfigurations => EntryStatus::Fail,
            ResultBucket::Skipped => EntryStatus::Skip,
            ResultBucket::Passed => EntryStatus::Pass,
        }
    }

    /// Returns the outcomes in this bucket.
    pub fn outcomes(self, results: &SuiteResults) -> &[TestOutcomeSummary] {
        match self {
            ResultBucket::Failed => &results.failed,
            ResultBucket::Skipped => &results.skipped,
            ResultBucket::Passed => &results.passed,
            ResultBucket::FailedConfigurations => &results.failed_configurations,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            ResultBucket::Failed => "failed",
            ResultBucket::Skipped => "skipped",
            ResultBucket::Passed => "passed",
            ResultBucket::FailedConfigurations => "failed configurations",
        }
    }
}

impl fmt::Display for ResultBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statistics about a generated report.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ReportStats {
    /// The number of suites that contributed entries.
    pub suites: usize,

    /// The number of entries emitted.
    pub entries: usize,

    /// The number of entries that passed.
    pub passed: usize,

    /// The number of entries that failed.
    pub failed: usize,

    /// The number of entries that were skipped.
    pub skipped: usize,

    /// The number of soft failures that could not be decoded.
    pub decode_errors: usize,

    /// The number of failures found in the known-failure registry.
    pub already_reported: usize,

    /// The number of failures that matched no known failure.
    pub new_failures: usize,

    /// The number of evidence files attached.
    pub evidence_files: usize,
}

impl ReportStats {
    /// Returns true if any entry failed.
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    fn record_entry(&mut self, status: EntryStatus) {
        self.entries += 1;
        match status {
            EntryStatus::Pass => self.passed += 1,
            EntryStatus::Fail => self.failed += 1,
            EntryStatus::Skip => self.skipped += 1,
        }
    }
}

/// Consumes a run's outcomes and emits one report entry per outcome.
#[derive(Debug)]
pub struct ResultAggregator<'cfg> {
    config: &'cfg CheckpointConfig,
    phase: AggregatorPhase,
}

impl<'cfg> ResultAggregator<'cfg> {
    /// Creates a new aggregator.
    pub fn new(config: &'cfg CheckpointConfig) -> Self {
        Self {
            config,
            phase: AggregatorPhase::Init,
        }
    }

    /// Returns the current phase.
    pub fn phase(&self) -> &AggregatorPhase {
        &self.phase
    }

    /// Builds the report for `summary`, sending it to `sink`.
    ///
    /// Problems with individual failures or evidence degrade the affected entries. Only sink
    /// errors abort the report.
    pub fn run<S>(&mut self, summary: &RunSummary, sink: &mut S) -> Result<ReportStats, SinkError>
    where
        S: ReportSink + ?Sized,
    {
        self.transition(AggregatorPhase::Init);
        self.transition(AggregatorPhase::ReadKnownFailures);
        let config = self.config;
        // Known failures carried by the run take precedence over the configured ones.
        let known_failures = summary
            .known_failures
            .as_deref()
            .or_else(|| config.known_failures());
        let registry = KnownFailureRegistry::parse_lenient(known_failures);
        tracing::debug!("{} known failures", registry.len());
        let cx = ReportContext::new(config, registry);

        sink.start_report(&self.report_name(summary))?;

        let mut stats = ReportStats::default();
        for suite in &summary.suites {
            if suite.results.is_empty() {
                tracing::debug!("skipping suite `{}` without results", suite.name);
                continue;
            }
            stats.suites += 1;
            self.emit_suite(&cx, suite, sink, &mut stats)?;
        }

        for line in &summary.runner_output {
            sink.add_runner_output(line)?;
        }

        self.transition(AggregatorPhase::Flush);
        sink.flush()?;
        self.transition(AggregatorPhase::Done);

        Ok(stats)
    }

    fn report_name(&self, summary: &RunSummary) -> String {
        match summary.parent_suite() {
            Some(parent) => format!("{} : {}", self.config.name_prefix(), parent.name),
            None => self.config.name_prefix().to_owned(),
        }
    }

    fn transition(&mut self, next: AggregatorPhase) {
        tracing::debug!("aggregator: {} -> {}", self.phase, next);
        self.phase = next;
    }

    fn emit_suite<S>(
        &mut self,
        cx: &ReportContext<'_>,
        suite: &SuiteSummary,
        sink: &mut S,
        stats: &mut ReportStats,
    ) -> Result<(), SinkError>
    where
        S: ReportSink + ?Sized,
    {
        // The parent suite contributes no category.
        let category = (!suite.parent).then_some(suite.name.as_str());

        for bucket in ResultBucket::ALL {
            self.transition(AggregatorPhase::Emit {
                suite: suite.name.clone(),
                bucket,
            });

            let mut outcomes: Vec<TestOutcome> = bucket
                .outcomes(&suite.results)
                .iter()
                .map(TestOutcome::from_summary)
                .collect();
            // The sort is stable: outcomes with the same name keep their recorded order.
            outcomes.sort_by(|a, b| a.method_name.cmp(&b.method_name));

            for outcome in &outcomes {
                let builder = EntryBuilder {
                    cx,
                    outcome,
                    category,
                    status: bucket.status(),
                };
                let (entry, system_info) = builder.build(stats);
                for (key, value) in &system_info {
                    sink.add_system_info(key, value)?;
                }
                stats.record_entry(entry.status);
                sink.accept(entry)?;
            }
        }

        Ok(())
    }
}

/// Builds the entry for one outcome.
struct EntryBuilder<'a, 'cfg> {
    cx: &'a ReportContext<'cfg>,
    outcome: &'a TestOutcome,
    category: Option<&'a str>,
    status: EntryStatus,
}

impl EntryBuilder<'_, '_> {
    /// Returns the entry along with the system-info rows it contributes.
    fn build(&self, stats: &mut ReportStats) -> (ReportEntry, Vec<(String, String)>) {
        let outcome = self.outcome;
        let decoded = outcome.composite_failure().map(|composite| {
            SoftFailureDecoder::new(&self.cx.fingerprinter, &self.cx.namer).decode(composite)
        });
        if let Some(decoded) = &decoded {
            stats.decode_errors += decoded.errors.len();
        }

        let (mut entry, system_info) = self.new_entry(decoded.as_ref());

        if let Some(category) = self.category {
            tracing::debug!(
                "assigned category `{category}` to test `{}`",
                outcome.method_name
            );
            entry.add_category(category);
        }
        for group in &outcome.groups {
            entry.add_category(group);
        }
        if let Some(start) = outcome.start_time {
            entry.set_start_time(start);
        }
        if let Some(end) = outcome.end_time {
            entry.set_end_time(end);
        }
        if !outcome.parameters.is_empty() {
            entry.info(parameters_line(&outcome.parameters));
        }

        match (&outcome.failure, &decoded) {
            (Some(RootFailure::Composite(_)), Some(decoded)) => {
                entry.log(
                    LogLevel::Error,
                    composite_summary(decoded.failures.iter().map(|failure| &failure.record)),
                );
            }
            (Some(RootFailure::Single(record)), _) => {
                entry.log(self.status.into(), failure_text(record, None));
                self.add_single_failure(&mut entry, record, stats);
            }
            _ => {
                entry.log(
                    self.status.into(),
                    format!("Test {}", self.status.past_tense()),
                );
            }
        }

        let evidence = self.match_evidence(decoded.as_ref());
        if let Some(decoded) = &decoded {
            self.add_soft_failures(&mut entry, decoded, &evidence, stats);
        }
        self.add_test_evidence(&mut entry, &evidence, stats);

        (entry, system_info)
    }

    fn new_entry(&self, decoded: Option<&DecodedFailures>) -> (ReportEntry, Vec<(String, String)>) {
        let outcome = self.outcome;
        let all_expected = decoded
            .is_some_and(|decoded| self.cx.registry.all_known(decoded.checkpoint_ids()));

        let description = outcome.description.as_deref().unwrap_or_default();
        let mut links = Vec::new();
        let mut system_info = Vec::new();
        for tag in tracking_tags(description) {
            let url = self.cx.config.tracker_url(tag);
            if tag.trim().len() > 1 {
                system_info.push((
                    system_info_key(tag, &url),
                    status_label(self.status).to_owned(),
                ));
            }
            links.push((tag, url));
        }

        let title = entry_title(
            &outcome.method_name,
            &links,
            !description.is_empty(),
            all_expected,
        );
        (ReportEntry::new(title, self.status), system_info)
    }

    fn add_single_failure(
        &self,
        entry: &mut ReportEntry,
        record: &FailureRecord,
        stats: &mut ReportStats,
    ) {
        let fingerprint = self.cx.fingerprinter.fingerprint(&record.frames);
        let mut slot = FailureSlot::new(0, &fingerprint);
        if let Some(message) = &record.message {
            slot.set_message(message);
        }

        let known = match self.cx.registry.resolve(&fingerprint) {
            Some(reference) => {
                stats.already_reported += 1;
                let link = self.cx.tracking_link(reference);
                let markup = already_reported(&link.reference, &link.url);
                slot.set_tracking(link);
                Some(markup)
            }
            None => {
                stats.new_failures += 1;
                None
            }
        };

        entry.info(checkpoint_info(&fingerprint, known.as_deref()));
        entry.add_failure(slot);
    }

    fn add_soft_failures(
        &self,
        entry: &mut ReportEntry,
        decoded: &DecodedFailures,
        evidence: &EvidenceMatch,
        stats: &mut ReportStats,
    ) {
        let folder = self.outcome.evidence_folder_name();
        for failure in &decoded.failures {
            let mut slot = FailureSlot::new(failure.index, &failure.checkpoint_id);
            if let Some(message) = &failure.record.message {
                slot.set_message(message);
            }

            let known = match self.cx.registry.resolve(&failure.checkpoint_id) {
                Some(reference) => {
                    stats.already_reported += 1;
                    let link = self.cx.tracking_link(reference);
                    let markup = already_reported(&link.reference, &link.url);
                    slot.set_tracking(link);
                    Some(markup)
                }
                None => {
                    stats.new_failures += 1;
                    None
                }
            };

            let warning =
                soft_failure_warning(failure.index, &failure.checkpoint_id, known.as_deref());
            match evidence.for_failure(failure.index) {
                Some(file_name) => {
                    stats.evidence_files += 1;
                    let media = Media::Screenshot {
                        path: evidence_path(self.cx.config.evidence_link_prefix(), &folder, file_name),
                    };
                    slot.set_evidence(media.clone());
                    entry.log_with_media(LogLevel::Warning, warning, media);
                }
                None => {
                    entry.warning(warning);
                }
            }

            entry.add_failure(slot);
        }
    }

    fn add_test_evidence(
        &self,
        entry: &mut ReportEntry,
        evidence: &EvidenceMatch,
        stats: &mut ReportStats,
    ) {
        let folder = self.outcome.evidence_folder_name();
        let link_prefix = self.cx.config.evidence_link_prefix();

        for file_name in &evidence.whole_test {
            stats.evidence_files += 1;
            let path = evidence_path(link_prefix, &folder, file_name);
            entry.log_with_media(LogLevel::Warning, file_name, Media::Screenshot { path });
        }

        for file_name in &evidence.paginated_diffs {
            stats.evidence_files += 1;
            let path = evidence_path(link_prefix, &folder, file_name);
            entry.log_with_media(
                LogLevel::Warning,
                download_link(&path, file_name),
                Media::Download { path },
            );
        }

        if evidence.has_paginated_diffs() {
            entry.info(PDF_VALIDATION_GUIDE);
        }
    }

    fn match_evidence(&self, decoded: Option<&DecodedFailures>) -> EvidenceMatch {
        let dir = self
            .cx
            .config
            .evidence_dir()
            .join(self.outcome.evidence_folder_name());
        let files = match list_evidence(&dir) {
            Ok(files) => files,
            Err(error) if error.is_not_found() => {
                tracing::debug!("no evidence for `{}` at {dir}", self.outcome.method_name);
                return EvidenceMatch::default();
            }
            Err(error) => {
                tracing::warn!(
                    target: "checkpoint_runner::evidence",
                    "{}",
                    DisplayErrorChain::new(&error)
                );
                return EvidenceMatch::default();
            }
        };

        let expected = decoded
            .map(|decoded| decoded.expected_evidence())
            .unwrap_or_default();
        self.cx
            .matcher
            .match_files(&self.outcome.method_name, &files, &expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::CollectingSink;
    use checkpoint_metadata::{
        FailureSummary, SoftErrorSummary, StackFrameSummary, TestStatusSummary, ThrowableSummary,
    };
    use pretty_assertions::assert_eq;

    fn config(evidence_dir: &str) -> CheckpointConfig {
        let mut config = CheckpointConfig::default_config();
        config.set_evidence_dir(evidence_dir);
        config
    }

    fn outcome(name: &str, status: TestStatusSummary) -> TestOutcomeSummary {
        TestOutcomeSummary {
            method_name: name.to_owned(),
            groups: vec![],
            description: None,
            status,
            start_millis: 0,
            end_millis: 0,
            parameters: vec![],
            failure: None,
            attributes: Default::default(),
        }
    }

    fn frame(class: &str, method: &str, line: i32) -> StackFrameSummary {
        StackFrameSummary {
            declaring_class: class.to_owned(),
            method_name: method.to_owned(),
            line_number: line,
        }
    }

    fn run(config: &CheckpointConfig, summary: &RunSummary) -> (checkpoint_model::Report, ReportStats) {
        let mut sink = CollectingSink::new();
        let mut aggregator = ResultAggregator::new(config);
        let stats = aggregator.run(summary, &mut sink).unwrap();
        assert_eq!(aggregator.phase(), &AggregatorPhase::Done);
        (sink.into_report().unwrap(), stats)
    }

    fn suite(name: &str, parent: bool, results: SuiteResults) -> SuiteSummary {
        SuiteSummary {
            name: name.to_owned(),
            parent,
            results,
        }
    }

    #[test]
    fn buckets_are_sorted_and_ordered() {
        let config = config("/nonexistent");
        let summary = RunSummary {
            known_failures: None,
            runner_output: vec!["runner line".to_owned()],
            suites: vec![
                suite("Regression", true, SuiteResults::default()),
                suite(
                    "Login",
                    false,
                    SuiteResults {
                        failed: vec![outcome("zFail", TestStatusSummary::Fail)],
                        skipped: vec![],
                        passed: vec![
                            outcome("zTest", TestStatusSummary::Pass),
                            outcome("aTest", TestStatusSummary::Pass),
                            outcome("mTest", TestStatusSummary::Pass),
                        ],
                        failed_configurations: vec![outcome("setUp", TestStatusSummary::Fail)],
                    },
                ),
            ],
        };

        let (report, stats) = run(&config, &summary);
        let titles: Vec<&str> = report.entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["zFail", "aTest", "mTest", "zTest", "setUp"]);
        assert_eq!(report.name, "Checkpoint : Regression");
        assert_eq!(report.entries[1].categories, vec!["Login".to_owned()]);
        assert_eq!(report.runner_output.len(), 1);
        assert_eq!(stats.suites, 1, "the empty parent suite is skipped");
        assert_eq!((stats.passed, stats.failed), (3, 2));

        let passed = &report.entries[1];
        assert_eq!(passed.logs[0].message.as_str(), "Test passed");
    }

    #[test]
    fn single_failure_known() {
        let mut config = config("/nonexistent");
        config.set_known_failures("login:42_JIRA-7");
        let mut failing = outcome("login", TestStatusSummary::Fail);
        failing.failure = Some(FailureSummary::Single(ThrowableSummary {
            message: Some("boom".to_owned()),
            stack_trace: vec![frame("framework.tests.LoginTest", "login", 42)],
        }));
        failing.description = Some("Login #JIRA-7".to_owned());

        let summary = RunSummary {
            known_failures: None,
            runner_output: vec![],
            suites: vec![suite(
                "Regression",
                true,
                SuiteResults {
                    failed: vec![failing],
                    ..Default::default()
                },
            )],
        };

        let (report, stats) = run(&config, &summary);
        let entry = &report.entries[0];
        assert!(entry.categories.is_empty());
        assert_eq!(entry.failures[0].checkpoint_id, "login:42");
        assert_eq!(
            entry.failures[0].tracking,
            Some(TrackingLink::new(
                "JIRA-7",
                "https://jira.example.com/browse/JIRA-7"
            ))
        );
        assert!(entry.logs[0].message.starts_with("boom\n    at framework.tests.LoginTest.login:42"));
        assert!(entry.logs[1].message.contains("Failure is already reported"));
        assert_eq!(
            report.system_info.get(
                "<a href=\"https://jira.example.com/browse/JIRA-7\">JIRA-7</a>"
            ),
            Some(&"Fail".to_owned())
        );
        assert_eq!(stats.already_reported, 1);
    }

    #[test]
    fn markup_from_input_is_escaped() {
        let config = config("/nonexistent");
        let mut failing = outcome("login", TestStatusSummary::Fail);
        failing.failure = Some(FailureSummary::Single(ThrowableSummary {
            message: Some("expected <b> & 'c'".to_owned()),
            stack_trace: vec![frame("framework.tests.LoginTest", "login", 42)],
        }));
        failing.description = Some("Login #X'><script>".to_owned());

        let summary = RunSummary {
            known_failures: Some("login:42_A'B".to_owned()),
            runner_output: vec![],
            suites: vec![suite(
                "Regression",
                true,
                SuiteResults {
                    failed: vec![failing],
                    ..Default::default()
                },
            )],
        };

        let (report, _) = run(&config, &summary);
        let entry = &report.entries[0];
        assert_eq!(
            entry.title.as_str(),
            "login : <a href='https://jira.example.com/browse/X%27%3E%3Cscript%3E' \
             target=\"_blank\">X&apos;&gt;&lt;script&gt;</a>  "
        );
        assert!(entry.logs[0].message.starts_with("expected &lt;b&gt; &amp; &apos;c&apos;\n"));
        assert!(entry.logs[1].message.contains(
            "href='https://jira.example.com/browse/A%27B'>A&apos;B</a>"
        ));
        assert_eq!(
            entry.failures[0].tracking.as_ref().map(|link| link.reference.as_str()),
            Some("A'B"),
            "the slot keeps the raw reference"
        );
    }

    #[test]
    fn composite_failure_all_known() {
        let mut config = config("/nonexistent");
        config.set_known_failures("login:42#a_JIRA-1 ; login:43#b_JIRA-2");
        let mut failing = outcome("login", TestStatusSummary::Fail);
        failing.failure = Some(FailureSummary::Composite {
            errors: vec![
                SoftErrorSummary::Structured(ThrowableSummary {
                    message: Some("expected [a]".to_owned()),
                    stack_trace: vec![frame("framework.tests.LoginTest", "login", 42)],
                }),
                SoftErrorSummary::Structured(ThrowableSummary {
                    message: Some("expected [b]".to_owned()),
                    stack_trace: vec![frame("framework.tests.LoginTest", "login", 43)],
                }),
            ],
        });

        let summary = RunSummary {
            known_failures: None,
            runner_output: vec![],
            suites: vec![suite(
                "Regression",
                true,
                SuiteResults {
                    failed: vec![failing],
                    ..Default::default()
                },
            )],
        };

        let (report, stats) = run(&config, &summary);
        let entry = &report.entries[0];
        assert!(entry.title.ends_with("Expected Failures</span>"));
        assert_eq!(entry.logs[0].level, LogLevel::Error);
        assert_eq!(entry.failures.len(), 2);
        assert_eq!(stats.already_reported, 2);
        assert_eq!(stats.new_failures, 0);
    }

    #[test]
    fn run_summary_known_failures_take_precedence() {
        let mut config = config("/nonexistent");
        config.set_known_failures("login:42_FROM-CONFIG");
        let mut failing = outcome("login", TestStatusSummary::Fail);
        failing.failure = Some(FailureSummary::Single(ThrowableSummary {
            message: None,
            stack_trace: vec![frame("framework.tests.LoginTest", "login", 42)],
        }));

        let summary = RunSummary {
            known_failures: Some("login:42_FROM-RUN".to_owned()),
            runner_output: vec![],
            suites: vec![suite(
                "Regression",
                true,
                SuiteResults {
                    failed: vec![failing],
                    ..Default::default()
                },
            )],
        };

        let (report, _) = run(&config, &summary);
        let tracking = report.entries[0].failures[0].tracking.as_ref().unwrap();
        assert_eq!(tracking.reference, "FROM-RUN");
    }
}
