// Copyright (c) The checkpoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError, Result,
    output::{OutputContext, OutputOpts, OutputWriter, Styles, clap_styles},
};
use camino::{Utf8Path, Utf8PathBuf};
use checkpoint_metadata::CheckpointExitCode;
use checkpoint_runner::{
    config::{CheckpointConfig, ReportFormat},
    errors::{DisplayErrorChain, RegistryParseError},
    input::read_run_summary,
    known_failures::KnownFailureRegistry,
    reporter::{FileSink, ReportStats, ResultAggregator},
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use owo_colors::OwoColorize;
use std::io::Write;

/// Correlate the failures of a finished test run with known failures and evidence, and build a
/// report.
#[derive(Debug, Parser)]
#[command(version, name = "checkpoint", styles = clap_styles())]
pub struct CheckpointApp {
    #[command(flatten)]
    output: OutputOpts,

    #[command(flatten)]
    config_opts: ConfigOpts,

    #[command(subcommand)]
    command: Command,
}

impl CheckpointApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app.
    ///
    /// Returns the exit code.
    pub fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        let root = current_dir()?;
        let mut config = self.config_opts.make_config(&root)?;

        match self.command {
            Command::Report { report_opts } => {
                report_opts.exec(&mut config, output, output_writer)
            }
            Command::KnownFailures { entries } => {
                exec_known_failures(&config, entries.as_deref(), output, output_writer)
            }
        }
    }
}

fn current_dir() -> Result<Utf8PathBuf> {
    let dir = std::env::current_dir().map_err(|error| ExpectedError::CurrentDirFailed { error })?;
    Utf8PathBuf::try_from(dir)
        .map_err(|error| ExpectedError::CurrentDirInvalidUtf8 {
            path: error.into_path_buf(),
        })
}

#[derive(Debug, Args)]
struct ConfigOpts {
    /// Config file [default: .config/checkpoint.toml]
    #[arg(long, global = true, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,
}

impl ConfigOpts {
    /// Creates a checkpoint config with the given options.
    fn make_config(&self, root: &Utf8Path) -> Result<CheckpointConfig> {
        Ok(CheckpointConfig::from_sources(
            root,
            self.config_file.as_deref(),
        )?)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build a report from a run summary
    ///
    /// Every test outcome in the run summary becomes one report entry. Failures are correlated
    /// with known failures and captured evidence.
    Report {
        #[command(flatten)]
        report_opts: ReportOpts,
    },

    /// Show the known failures a report would use
    ///
    /// Parses the given known-failures string, or the configured one if none is given, and prints
    /// the resulting mapping.
    KnownFailures {
        /// Known failures, in the form `key1_ref1 ; key2_ref2 ; key3`
        entries: Option<String>,
    },
}

#[derive(Debug, Args)]
struct ReportOpts {
    /// The run summary to build the report from
    #[arg(long, value_name = "PATH")]
    run: Utf8PathBuf,

    /// Directory holding per-test evidence folders [default: from config]
    #[arg(long, value_name = "DIR", help_heading = "INPUT OPTIONS")]
    evidence_dir: Option<Utf8PathBuf>,

    /// Known failures, used if the run summary doesn't carry any [default: from config]
    #[arg(long, value_name = "ENTRIES", help_heading = "INPUT OPTIONS")]
    known_failures: Option<String>,

    /// Path to write the report to [default: from config]
    #[arg(long, short = 'o', value_name = "PATH", help_heading = "OUTPUT OPTIONS")]
    output: Option<Utf8PathBuf>,

    /// Report format [default: from config]
    #[arg(long, value_enum, value_name = "FMT", help_heading = "OUTPUT OPTIONS")]
    format: Option<ReportFormatOpt>,

    /// Exit with a non-zero code if any test in the report failed
    #[arg(long)]
    fail_on_failures: bool,
}

impl ReportOpts {
    fn exec(
        self,
        config: &mut CheckpointConfig,
        output: OutputContext,
        output_writer: &mut OutputWriter,
    ) -> Result<i32> {
        if let Some(dir) = self.evidence_dir {
            config.set_evidence_dir(dir);
        }
        if let Some(entries) = self.known_failures {
            config.set_known_failures(entries);
        }
        if let Some(path) = self.output {
            config.set_output(path);
        }
        if let Some(format) = self.format {
            config.set_format(format.into());
        }
        let config = &*config;

        let summary = read_run_summary(&self.run)?;

        let mut sink = FileSink::new(config.output(), config.format());
        let stats = ResultAggregator::new(config)
            .run(&summary, &mut sink)
            .map_err(|err| ExpectedError::sink_error(config.output(), err))?;

        let styles = output.stdout_styles();
        let mut writer = output_writer.stdout();
        write_summary(&stats, config.output(), &styles, &mut *writer)
            .map_err(ExpectedError::write_output_error)?;
        if output.verbose {
            write_details(&stats, &styles, &mut *writer).map_err(ExpectedError::write_output_error)?;
        }
        writer.flush().map_err(ExpectedError::write_output_error)?;

        if self.fail_on_failures && stats.has_failures() {
            Ok(CheckpointExitCode::REPORT_HAS_FAILURES)
        } else {
            Ok(CheckpointExitCode::OK)
        }
    }
}

fn write_summary(
    stats: &ReportStats,
    path: &Utf8Path,
    styles: &Styles,
    writer: &mut dyn Write,
) -> std::io::Result<()> {
    writeln!(
        writer,
        "wrote {} entries ({} passed, {} failed, {} skipped) to {}",
        stats.entries.style(styles.count),
        stats.passed.style(styles.pass),
        stats.failed.style(styles.fail),
        stats.skipped.style(styles.skip),
        path,
    )
}

fn write_details(
    stats: &ReportStats,
    styles: &Styles,
    writer: &mut dyn Write,
) -> std::io::Result<()> {
    writeln!(writer, "  suites: {}", stats.suites.style(styles.count))?;
    writeln!(
        writer,
        "  failures: {} already reported, {} new",
        stats.already_reported.style(styles.count),
        stats.new_failures.style(styles.count),
    )?;
    writeln!(
        writer,
        "  evidence files attached: {}",
        stats.evidence_files.style(styles.count)
    )?;
    if stats.decode_errors > 0 {
        writeln!(
            writer,
            "  undecodable soft failures: {}",
            stats.decode_errors.style(styles.fail)
        )?;
    }
    Ok(())
}

fn exec_known_failures(
    config: &CheckpointConfig,
    entries: Option<&str>,
    output: OutputContext,
    output_writer: &mut OutputWriter,
) -> Result<i32> {
    let entries = entries.or_else(|| config.known_failures()).unwrap_or_default();
    let (registry, errors) = KnownFailureRegistry::parse_partial(entries);
    if !errors.is_empty() {
        let styles = output.stderr_styles();
        let mut stderr = output_writer.stderr();
        write_registry_errors(&errors, &styles, &mut *stderr)
            .and_then(|()| stderr.flush())
            .map_err(ExpectedError::write_output_error)?;
    }

    let styles = output.stdout_styles();
    let mut writer = output_writer.stdout();
    write_registry(&registry, &styles, &mut *writer)
        .and_then(|()| writer.flush())
        .map_err(ExpectedError::write_output_error)?;

    Ok(CheckpointExitCode::OK)
}

fn write_registry_errors(
    errors: &[RegistryParseError],
    styles: &Styles,
    writer: &mut dyn Write,
) -> std::io::Result<()> {
    for error in errors {
        writeln!(
            writer,
            "{}: {}",
            "warning".style(styles.warning),
            DisplayErrorChain::new(error),
        )?;
    }
    writeln!(
        writer,
        "({} {} left out of reports)",
        errors.len().style(styles.bold),
        if errors.len() == 1 { "entry is" } else { "entries are" },
    )
}

fn write_registry(
    registry: &KnownFailureRegistry,
    styles: &Styles,
    writer: &mut dyn Write,
) -> std::io::Result<()> {
    if registry.is_empty() {
        return writeln!(writer, "no known failures");
    }

    writeln!(writer, "{} known failures:", registry.len().style(styles.count))?;
    for (key, reference) in registry.iter() {
        if reference.is_empty() {
            writeln!(writer, "  {} (no reference)", key.style(styles.key))?;
        } else {
            writeln!(writer, "  {} -> {reference}", key.style(styles.key))?;
        }
    }
    Ok(())
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ReportFormatOpt {
    Xml,
    Json,
}

impl From<ReportFormatOpt> for ReportFormat {
    fn from(format: ReportFormatOpt) -> Self {
        match format {
            ReportFormatOpt::Xml => ReportFormat::Xml,
            ReportFormatOpt::Json => ReportFormat::Json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Color;
    use camino_tempfile::Utf8TempDir;
    use clap::CommandFactory;

    fn test_output() -> OutputContext {
        OutputContext {
            verbose: false,
            color: Color::Never,
        }
    }

    fn captured() -> OutputWriter {
        OutputWriter::Captured {
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }

    fn into_strings(writer: OutputWriter) -> (String, String) {
        match writer {
            OutputWriter::Captured { stdout, stderr } => (
                String::from_utf8(stdout).unwrap(),
                String::from_utf8(stderr).unwrap(),
            ),
            OutputWriter::Normal => unreachable!("tests always capture output"),
        }
    }

    #[test]
    fn verify_app() {
        CheckpointApp::command().debug_assert();
    }

    #[test]
    fn known_failures_listing() {
        let config = CheckpointConfig::default_config();
        let mut writer = captured();
        let code = exec_known_failures(
            &config,
            Some("A_JIRA-1 ; B"),
            test_output(),
            &mut writer,
        )
        .unwrap();
        assert_eq!(code, CheckpointExitCode::OK);

        let (stdout, stderr) = into_strings(writer);
        assert_eq!(stdout, "2 known failures:\n  A -> JIRA-1\n  B (no reference)\n");
        assert_eq!(stderr, "");
    }

    #[test]
    fn known_failures_with_empty_key() {
        let config = CheckpointConfig::default_config();
        let mut writer = captured();
        exec_known_failures(
            &config,
            Some("A_1 ; ; _JIRA-2 ; B"),
            test_output(),
            &mut writer,
        )
        .unwrap();

        let (stdout, stderr) = into_strings(writer);
        assert_eq!(stdout, "2 known failures:\n  A -> 1\n  B (no reference)\n");
        assert_eq!(
            stderr,
            "warning: known-failures entry 2 (`_JIRA-2`) has an empty key\n\
             (1 entry is left out of reports)\n"
        );
    }

    #[test]
    fn report_command() {
        let dir = Utf8TempDir::new().unwrap();
        let run = dir.path().join("run.json");
        std::fs::write(
            &run,
            r#"{
                "suites": [{
                    "name": "Regression",
                    "parent": true,
                    "results": {
                        "failed": [{"method-name": "b", "status": "fail"}],
                        "passed": [{"method-name": "a", "status": "pass"}]
                    }
                }]
            }"#,
        )
        .unwrap();
        let out = dir.path().join("out/report.json");

        let app = CheckpointApp::try_parse_from([
            "checkpoint",
            "report",
            "--run",
            run.as_str(),
            "--evidence-dir",
            dir.path().join("shots").as_str(),
            "--output",
            out.as_str(),
            "--format",
            "json",
            "--fail-on-failures",
        ])
        .unwrap();
        let Command::Report { report_opts } = app.command else {
            panic!("expected report command");
        };

        let mut config = CheckpointConfig::default_config();
        let mut writer = captured();
        let code = report_opts
            .exec(&mut config, test_output(), &mut writer)
            .unwrap();
        assert_eq!(code, CheckpointExitCode::REPORT_HAS_FAILURES);

        let (stdout, _) = into_strings(writer);
        assert_eq!(
            stdout,
            format!("wrote 2 entries (1 passed, 1 failed, 0 skipped) to {out}\n")
        );
        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(report["name"], "Checkpoint : Regression");
    }

    #[test]
    fn report_missing_run_summary() {
        let dir = Utf8TempDir::new().unwrap();
        let app = CheckpointApp::try_parse_from([
            "checkpoint",
            "report",
            "--run",
            dir.path().join("missing.json").as_str(),
        ])
        .unwrap();
        let Command::Report { report_opts } = app.command else {
            panic!("expected report command");
        };

        let mut config = CheckpointConfig::default_config();
        let error = report_opts
            .exec(&mut config, test_output(), &mut captured())
            .unwrap_err();
        assert_eq!(
            error.process_exit_code(),
            CheckpointExitCode::RUN_SUMMARY_READ_FAILED
        );
    }
}
