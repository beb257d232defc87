// Copyright (c) The checkpoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Terminal output: color choice, stylesheets, log formatting and the stdout/stderr writers.

use clap::{Args, ValueEnum};
use owo_colors::{OwoColorize, Style, style};
use std::{
    fmt,
    io::{BufWriter, Write},
};
use tracing::{
    Event, Level, Subscriber,
    field::{Field, Visit},
    level_filters::LevelFilter,
};
use tracing_subscriber::{
    Layer,
    filter::Targets,
    fmt::{FmtContext, FormatEvent, FormatFields, format},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

/// Events with this target are continuation lines and get no heading.
pub(crate) const NO_HEADING_TARGET: &str = "checkpoint_cli::no_heading";

/// The environment variable holding a `Targets` filter for log output.
const LOG_ENV: &str = "CHECKPOINT_LOG";

/// The crate whose events `--verbose` raises to debug level.
const RUNNER_TARGET: &str = "checkpoint_runner";

pub(crate) fn clap_styles() -> clap::builder::Styles {
    use clap::builder::styling::{AnsiColor, Effects};

    let heading = AnsiColor::Blue.on_default().effects(Effects::BOLD);
    clap::builder::Styles::styled()
        .header(heading)
        .usage(heading)
        .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
        .placeholder(AnsiColor::Cyan.on_default())
        .error(AnsiColor::Red.on_default().effects(Effects::BOLD))
        .valid(AnsiColor::Green.on_default())
        .invalid(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
}

#[derive(Copy, Clone, Debug, Args)]
#[must_use]
pub(crate) struct OutputOpts {
    /// Print report details, and debug logs from report building
    #[arg(long, short, global = true, env = "CHECKPOINT_VERBOSE")]
    verbose: bool,

    /// Produce color output: auto, always, never
    #[arg(
        long,
        value_enum,
        default_value_t,
        hide_possible_values = true,
        global = true,
        value_name = "WHEN",
        env = "CHECKPOINT_COLOR"
    )]
    color: Color,
}

impl OutputOpts {
    pub(crate) fn init(self) -> OutputContext {
        let output = OutputContext {
            verbose: self.verbose,
            color: self.color,
        };
        output.init_logger();
        output
    }
}

/// How checkpoint writes to the terminal.
#[derive(Copy, Clone, Debug)]
#[must_use]
pub struct OutputContext {
    pub(crate) verbose: bool,
    pub(crate) color: Color,
}

impl OutputContext {
    /// Returns the stylesheet for stderr.
    pub fn stderr_styles(&self) -> Styles {
        Styles::new(self.color.enabled_for(supports_color::Stream::Stderr))
    }

    /// Returns the stylesheet for stdout.
    pub fn stdout_styles(&self) -> Styles {
        Styles::new(self.color.enabled_for(supports_color::Stream::Stdout))
    }

    /// Installs the log subscriber. Only the first call has an effect.
    fn init_logger(&self) {
        static INIT_LOGGER: std::sync::Once = std::sync::Once::new();

        let formatter = CheckpointFormatter {
            styles: self.stderr_styles(),
        };
        let verbose = self.verbose;
        INIT_LOGGER.call_once(|| {
            let (targets, bad_filter) = log_targets(std::env::var(LOG_ENV).ok(), verbose);

            let layer = tracing_subscriber::fmt::layer()
                .event_format(formatter)
                .with_writer(std::io::stderr)
                .with_filter(targets);
            tracing_subscriber::registry().with(layer).init();

            if let Some(filter) = bad_filter {
                tracing::warn!("ignoring invalid {LOG_ENV} value `{filter}`");
            }
        });
    }
}

/// Returns the log filter, along with the value of `CHECKPOINT_LOG` if it couldn't be parsed.
fn log_targets(filter: Option<String>, verbose: bool) -> (Targets, Option<String>) {
    let default = || {
        let targets = Targets::new().with_default(LevelFilter::INFO);
        if verbose {
            targets.with_target(RUNNER_TARGET, LevelFilter::DEBUG)
        } else {
            targets
        }
    };

    match filter.filter(|filter| !filter.trim().is_empty()) {
        None => (default(), None),
        Some(filter) => match filter.parse() {
            Ok(targets) => (targets, None),
            Err(_) => (default(), Some(filter)),
        },
    }
}

/// Whether to produce color output.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
#[must_use]
pub enum Color {
    /// Color if the stream supports it.
    #[default]
    Auto,
    /// Always color.
    Always,
    /// Never color.
    Never,
}

impl Color {
    fn enabled_for(self, stream: supports_color::Stream) -> bool {
        match self {
            Color::Auto => supports_color::on_cached(stream).is_some(),
            Color::Always => true,
            Color::Never => false,
        }
    }
}

/// The stylesheet for terminal output. Every style is plain unless color is enabled.
#[derive(Clone, Debug, Default)]
pub struct Styles {
    pub(crate) bold: Style,
    pub(crate) count: Style,
    pub(crate) pass: Style,
    pub(crate) fail: Style,
    pub(crate) skip: Style,
    pub(crate) key: Style,
    pub(crate) error: Style,
    pub(crate) warning: Style,
    pub(crate) topic: Style,
    pub(crate) dimmed: Style,
}

impl Styles {
    fn new(colorize: bool) -> Self {
        if !colorize {
            return Self::default();
        }
        Self {
            bold: style().bold(),
            count: style().bold(),
            pass: style().green().bold(),
            fail: style().red().bold(),
            skip: style().yellow().bold(),
            key: style().cyan(),
            error: style().red().bold(),
            warning: style().yellow().bold(),
            topic: style().magenta(),
            dimmed: style().dimmed(),
        }
    }
}

/// Which part of report building a warning came from, by event target.
fn warning_topic(target: &str) -> Option<&'static str> {
    let module = target.strip_prefix(RUNNER_TARGET)?.strip_prefix("::")?;
    let module = module.split("::").next().unwrap_or(module);
    match module {
        "soft_failure" => Some("decode"),
        "known_failures" => Some("known-failures"),
        "evidence" => Some("evidence"),
        "config" => Some("config"),
        _ => None,
    }
}

/// Formats events as `heading: message`, followed by any other fields as `key=value`.
///
/// Warnings about degraded records or evidence name their source, as in
/// `warning[evidence]: ...`.
struct CheckpointFormatter {
    styles: Styles,
}

impl<S, N> FormatEvent<S, N> for CheckpointFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();

        if metadata.target() != NO_HEADING_TARGET {
            let level = *metadata.level();
            let (heading, heading_style) = match level {
                Level::ERROR => ("error", self.styles.error),
                Level::WARN => ("warning", self.styles.warning),
                Level::INFO => ("info", self.styles.bold),
                Level::DEBUG => ("debug", self.styles.bold),
                Level::TRACE => ("trace", self.styles.dimmed),
            };
            write!(writer, "{}", heading.style(heading_style))?;
            if level == Level::WARN
                && let Some(topic) = warning_topic(metadata.target())
            {
                write!(writer, "[{}]", topic.style(self.styles.topic))?;
            }
            write!(writer, ": ")?;
        }

        let mut fields = FieldCollector::default();
        event.record(&mut fields);
        write!(writer, "{}", fields.message)?;
        for (name, value) in &fields.extra {
            write!(writer, " {}={value}", name.style(self.styles.dimmed))?;
        }
        writeln!(writer)
    }
}

#[derive(Default)]
struct FieldCollector {
    message: String,
    extra: Vec<(&'static str, String)>,
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_owned();
        } else {
            self.extra.push((field.name(), value.to_owned()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.extra.push((field.name(), format!("{value:?}")));
        }
    }
}

/// Where command output goes.
#[derive(Default)]
pub enum OutputWriter {
    /// The process's stdout and stderr.
    #[default]
    Normal,
    /// In-memory buffers.
    #[cfg(test)]
    Captured {
        /// Captured stdout.
        stdout: Vec<u8>,
        /// Captured stderr.
        stderr: Vec<u8>,
    },
}

impl OutputWriter {
    pub(crate) fn stdout(&mut self) -> Box<dyn Write + '_> {
        match self {
            Self::Normal => Box::new(BufWriter::new(std::io::stdout().lock())),
            #[cfg(test)]
            Self::Captured { stdout, .. } => Box::new(stdout),
        }
    }

    pub(crate) fn stderr(&mut self) -> Box<dyn Write + '_> {
        match self {
            Self::Normal => Box::new(BufWriter::new(std::io::stderr().lock())),
            #[cfg(test)]
            Self::Captured { stderr, .. } => Box::new(stderr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("checkpoint_runner::soft_failure", Some("decode") ; "decode")]
    #[test_case("checkpoint_runner::known_failures", Some("known-failures") ; "registry")]
    #[test_case("checkpoint_runner::evidence", Some("evidence") ; "evidence")]
    #[test_case("checkpoint_runner::config::imp", Some("config") ; "nested module")]
    #[test_case("checkpoint_runner::reporter::aggregator", None ; "other runner module")]
    #[test_case("checkpoint_runner_extra::evidence", None ; "other crate")]
    #[test_case("checkpoint_cli", None ; "cli")]
    fn topics(target: &str, expected: Option<&str>) {
        assert_eq!(warning_topic(target), expected);
    }

    #[test]
    fn log_filter() {
        let (targets, bad) = log_targets(None, false);
        assert!(targets.would_enable("checkpoint_runner::evidence", &Level::INFO));
        assert!(!targets.would_enable("checkpoint_runner::evidence", &Level::DEBUG));
        assert_eq!(bad, None);

        let (targets, _) = log_targets(Some("  ".to_owned()), true);
        assert!(targets.would_enable("checkpoint_runner::evidence", &Level::DEBUG));
        assert!(!targets.would_enable("checkpoint_cli", &Level::DEBUG));

        let (targets, _) = log_targets(Some("checkpoint_cli=trace".to_owned()), false);
        assert!(targets.would_enable("checkpoint_cli", &Level::TRACE));

        let (targets, bad) = log_targets(Some("checkpoint=loud".to_owned()), false);
        assert!(targets.would_enable("checkpoint_cli", &Level::INFO));
        assert_eq!(bad.as_deref(), Some("checkpoint=loud"));
    }

    #[test]
    fn plain_styles_without_color() {
        let output = OutputContext {
            verbose: false,
            color: Color::Never,
        };
        assert_eq!(
            format!("{}", "x".style(output.stdout_styles().fail)),
            "x"
        );
        let colored = Styles::new(true);
        assert_ne!(format!("{}", "x".style(colored.fail)), "x");
    }
}
