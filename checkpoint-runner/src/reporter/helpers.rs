// Copyright (c) The checkpoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Markup for titles and log lines.
//!
//! Titles and log lines are HTML. Every value interpolated into them is escaped first.

use crate::outcome::FailureRecord;
use checkpoint_model::EntryStatus;
use quick_xml::escape::escape;
use swrite::{SWrite, swrite};

/// Appended to the title of a test whose soft failures are all already known.
pub(super) const EXPECTED_FAILURES_MARKER: &str =
    " <span class=\"label start-time\">Expected Failures</span>";

/// The number of stack frames shown per failure in composite failure summaries.
const SUMMARY_FRAMES: usize = 5;

/// Returns the tracking tags embedded in a test description.
///
/// Tags are the text after the first `#` (or the whole description if there is none), split on
/// `,`. Trailing empty tags are dropped.
pub(super) fn tracking_tags(description: &str) -> Vec<&str> {
    if description.is_empty() {
        return Vec::new();
    }
    let tags = match description.split_once('#') {
        Some((_, tags)) => tags,
        None => description,
    };
    let mut tags: Vec<&str> = tags.split(',').collect();
    while tags.last().is_some_and(|tag| tag.is_empty()) {
        tags.pop();
    }
    tags
}

/// Builds an entry title from the method name, the tracking tags in its description, and whether
/// all of its soft failures are known.
pub(super) fn entry_title(
    method_name: &str,
    tag_links: &[(&str, String)],
    has_description: bool,
    all_expected: bool,
) -> String {
    let marker = if all_expected {
        EXPECTED_FAILURES_MARKER
    } else {
        ""
    };
    let method_name = escape(method_name);
    if !has_description {
        return format!("{method_name}{marker}");
    }

    let mut links = String::new();
    for (tag, url) in tag_links {
        swrite!(
            links,
            "<a href='{}' target=\"_blank\">{}</a> ",
            escape(url),
            escape(*tag)
        );
    }
    format!("{method_name} : {links} {marker}")
}

/// Returns the system-info key for a tracking tag.
pub(super) fn system_info_key(tag: &str, url: &str) -> String {
    format!("<a href=\"{}\">{}</a>", escape(url), escape(tag))
}

/// Returns the capitalized label for a status, as used in system info.
pub(super) fn status_label(status: EntryStatus) -> &'static str {
    match status {
        EntryStatus::Pass => "Pass",
        EntryStatus::Fail => "Fail",
        EntryStatus::Skip => "Skip",
    }
}

/// Renders invocation parameters, with `null` standing for absent values.
pub(super) fn parameters_line(parameters: &[Option<String>]) -> String {
    let rendered: Vec<_> = parameters
        .iter()
        .map(|param| escape(param.as_deref().unwrap_or("null")))
        .collect();
    format!("<br><b>Parameters:</b> {}", rendered.join(","))
}

/// Returns the markup noting that a failure is already tracked.
pub(super) fn already_reported(reference: &str, url: &str) -> String {
    format!(
        "<b style=\"background-color:#00c853;\">Failure is already reported: \
         <a style=\"color:#fff;\" href='{}'>{}</a>  </b>",
        escape(url),
        escape(reference),
    )
}

/// Returns the info line for a single failure.
pub(super) fn checkpoint_info(checkpoint_id: &str, known: Option<&str>) -> String {
    format!(
        "<b style=\"background-color:#FFFACD;\">Checkpoint ID: {} </b><br> {}",
        escape(checkpoint_id),
        known.unwrap_or_default()
    )
}

/// Returns the warning line for the soft failure at `index`.
pub(super) fn soft_failure_warning(index: usize, checkpoint_id: &str, known: Option<&str>) -> String {
    let known = known.map(|known| format!("<br>{known}")).unwrap_or_default();
    format!(
        "<b>Failure {} </b><br><b style=\"background-color:#FFFACD;\">Checkpoint ID: {}</b> {known}",
        index + 1,
        escape(checkpoint_id),
    )
}

/// Returns the download link for a paginated visual diff.
pub(super) fn download_link(path: &str, file_name: &str) -> String {
    format!(
        "<a style=\"color:#FF0000;\" href='{}'>Download {}</a> ",
        escape(path),
        escape(file_name)
    )
}

/// Renders a failure's message, followed by its stack frames. At most `max_frames` frames are
/// rendered, if specified.
pub(super) fn failure_text(record: &FailureRecord, max_frames: Option<usize>) -> String {
    let mut out = escape(record.message_or_empty()).into_owned();
    let max_frames = max_frames.unwrap_or(record.frames.len());
    for frame in record.frames.iter().take(max_frames) {
        swrite!(out, "\n    at {}", escape(&frame.to_string()));
    }
    out
}

/// Summarizes the failures of a composite failure.
pub(super) fn composite_summary<'a>(records: impl ExactSizeIterator<Item = &'a FailureRecord>) -> String {
    let mut out = format!("The following {} assertions failed:", records.len());
    for (index, record) in records.enumerate() {
        swrite!(
            out,
            "\n{}) {}",
            index + 1,
            failure_text(record, Some(SUMMARY_FRAMES))
        );
    }
    out
}

/// Joins a link prefix with the components of an evidence path.
pub(super) fn evidence_path(link_prefix: &str, folder: &str, file_name: &str) -> String {
    let link_prefix = link_prefix.trim_end_matches('/');
    if link_prefix.is_empty() {
        format!("{folder}/{file_name}")
    } else {
        format!("{link_prefix}/{folder}/{file_name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::StackFrame;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("", &[] ; "empty")]
    #[test_case("Login flow #JIRA-1,JIRA-2", &["JIRA-1", "JIRA-2"] ; "after hash")]
    #[test_case("JIRA-1", &["JIRA-1"] ; "no hash")]
    #[test_case("flaky #JIRA-1,", &["JIRA-1"] ; "trailing comma")]
    #[test_case("a #b#c", &["b#c"] ; "first hash only")]
    fn tags(description: &str, expected: &[&str]) {
        assert_eq!(tracking_tags(description), expected);
    }

    #[test]
    fn titles() {
        assert_eq!(entry_title("login", &[], false, false), "login");
        assert_eq!(
            entry_title("login", &[], false, true),
            "login <span class=\"label start-time\">Expected Failures</span>"
        );

        let links = [("JIRA-1", "https://t/JIRA-1".to_owned())];
        assert_eq!(
            entry_title("login", &links, true, false),
            "login : <a href='https://t/JIRA-1' target=\"_blank\">JIRA-1</a>  "
        );
    }

    #[test_case(
        "X'><script>",
        "https://t/X'><script>",
        "m : <a href='https://t/X&apos;&gt;&lt;script&gt;' target=\"_blank\">X&apos;&gt;&lt;script&gt;</a>  "
        ; "quote and angle brackets"
    )]
    #[test_case(
        "A&B \"1\"",
        "https://t/A&B",
        "m : <a href='https://t/A&amp;B' target=\"_blank\">A&amp;B &quot;1&quot;</a>  "
        ; "ampersand and double quotes"
    )]
    fn titles_escape_tags(tag: &str, url: &str, expected: &str) {
        assert_eq!(entry_title("m", &[(tag, url.to_owned())], true, false), expected);
    }

    #[test]
    fn links_escape_values() {
        assert_eq!(
            system_info_key("<b>", "https://t/'"),
            "<a href=\"https://t/&apos;\">&lt;b&gt;</a>"
        );
        assert!(
            already_reported("J'1", "https://t/J'1")
                .contains("href='https://t/J&apos;1'>J&apos;1</a>")
        );
        assert_eq!(
            download_link("shots/a'b.pdf", "<a'b>.pdf"),
            "<a style=\"color:#FF0000;\" href='shots/a&apos;b.pdf'>Download &lt;a&apos;b&gt;.pdf</a> "
        );
        assert_eq!(
            parameters_line(&[Some("<i>".to_owned())]),
            "<br><b>Parameters:</b> &lt;i&gt;"
        );
        assert!(checkpoint_info("m:1#<x>", None).contains("Checkpoint ID: m:1#&lt;x&gt; "));
    }

    #[test]
    fn parameters() {
        assert_eq!(
            parameters_line(&[Some("a".to_owned()), None, Some("b".to_owned())]),
            "<br><b>Parameters:</b> a,null,b"
        );
    }

    #[test]
    fn soft_warning_markup() {
        assert_eq!(
            soft_failure_warning(0, "login:42#x", None),
            "<b>Failure 1 </b><br><b style=\"background-color:#FFFACD;\">Checkpoint ID: login:42#x</b> "
        );
        let known = already_reported("JIRA-1", "https://t/JIRA-1");
        assert!(soft_failure_warning(1, "id", Some(&known)).ends_with(&format!("<br>{known}")));
    }

    #[test]
    fn composite_summary_limits_frames() {
        let frames: Vec<_> = (0..8).map(|line| StackFrame::new("fw.T", "m", line)).collect();
        let record = FailureRecord::new(Some("boom".to_owned()), frames);
        let summary = composite_summary([&record].into_iter());
        assert!(summary.starts_with("The following 1 assertions failed:\n1) boom\n    at fw.T.m:0"));
        assert_eq!(summary.matches("\n    at ").count(), SUMMARY_FRAMES);
    }

    #[test_case("screenshots", "login", "a.png", "screenshots/login/a.png" ; "prefix")]
    #[test_case("screenshots/", "login", "a.png", "screenshots/login/a.png" ; "trailing slash")]
    #[test_case("", "login", "a.png", "login/a.png" ; "no prefix")]
    fn evidence_paths(prefix: &str, folder: &str, file: &str, expected: &str) {
        assert_eq!(evidence_path(prefix, folder, file), expected);
    }
}
