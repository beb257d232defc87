// Copyright (c) The checkpoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serialize a `Report`.

use crate::{FailureSlot, LogLine, Media, Report, ReportEntry, SerializeError};
use chrono::{DateTime, FixedOffset};
use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    Writer,
};
use std::io;

static REPORT_TAG: &str = "report";
static SYSTEM_INFO_TAG: &str = "system-info";
static PROPERTY_TAG: &str = "property";
static ENTRY_TAG: &str = "entry";
static CATEGORY_TAG: &str = "category";
static LOG_TAG: &str = "log";
static FAILURE_TAG: &str = "failure";
static MESSAGE_TAG: &str = "message";
static EVIDENCE_TAG: &str = "evidence";
static RUNNER_OUTPUT_TAG: &str = "runner-output";
static LINE_TAG: &str = "line";

pub(crate) fn serialize_report(
    report: &Report,
    mut writer: impl io::Write,
) -> Result<(), SerializeError> {
    let mut xml_writer = Writer::new_with_indent(&mut writer, b' ', 4);

    let decl = BytesDecl::new("1.0", Some("UTF-8"), None);
    xml_writer.write_event(Event::Decl(decl))?;

    serialize_report_impl(report, &mut xml_writer)?;

    // Add a trailing newline.
    writer.write_all(b"\n")?;
    Ok(())
}

pub(crate) fn serialize_report_json(
    report: &Report,
    mut writer: impl io::Write,
) -> Result<(), SerializeError> {
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.write_all(b"\n")?;
    Ok(())
}

fn serialize_report_impl(
    report: &Report,
    writer: &mut Writer<impl io::Write>,
) -> Result<(), SerializeError> {
    // Use the destructuring syntax to ensure that all fields are handled.
    let Report {
        name,
        timestamp,
        tests,
        failed,
        skipped,
        passed,
        system_info,
        runner_output,
        entries,
    } = report;

    let mut report_tag = BytesStart::new(REPORT_TAG);
    report_tag.extend_attributes([
        ("name", name.as_str()),
        ("tests", tests.to_string().as_str()),
        ("failed", failed.to_string().as_str()),
        ("skipped", skipped.to_string().as_str()),
        ("passed", passed.to_string().as_str()),
    ]);
    if let Some(timestamp) = timestamp {
        report_tag.push_attribute(("timestamp", serialize_timestamp(timestamp).as_str()));
    }
    writer.write_event(Event::Start(report_tag))?;

    if !system_info.is_empty() {
        serialize_empty_start_tag(SYSTEM_INFO_TAG, writer)?;
        for (name, value) in system_info {
            let mut property_tag = BytesStart::new(PROPERTY_TAG);
            property_tag.extend_attributes([("name", name.as_str()), ("value", value.as_str())]);
            writer.write_event(Event::Empty(property_tag))?;
        }
        serialize_end_tag(SYSTEM_INFO_TAG, writer)?;
    }

    for entry in entries {
        serialize_entry(entry, writer)?;
    }

    if !runner_output.is_empty() {
        serialize_empty_start_tag(RUNNER_OUTPUT_TAG, writer)?;
        for line in runner_output {
            serialize_text_element(LINE_TAG, line, writer)?;
        }
        serialize_end_tag(RUNNER_OUTPUT_TAG, writer)?;
    }

    serialize_end_tag(REPORT_TAG, writer)?;
    Ok(())
}

fn serialize_entry(
    entry: &ReportEntry,
    writer: &mut Writer<impl io::Write>,
) -> Result<(), SerializeError> {
    let ReportEntry {
        title,
        categories,
        status,
        start_time,
        end_time,
        logs,
        failures,
    } = entry;

    let mut entry_tag = BytesStart::new(ENTRY_TAG);
    entry_tag.extend_attributes([("title", title.as_str()), ("status", status.as_str())]);
    if let Some(start_time) = start_time {
        entry_tag.push_attribute(("start", serialize_timestamp(start_time).as_str()));
    }
    if let Some(end_time) = end_time {
        entry_tag.push_attribute(("end", serialize_timestamp(end_time).as_str()));
    }
    writer.write_event(Event::Start(entry_tag))?;

    for category in categories {
        let mut category_tag = BytesStart::new(CATEGORY_TAG);
        category_tag.push_attribute(("name", category.as_str()));
        writer.write_event(Event::Empty(category_tag))?;
    }

    for log in logs {
        serialize_log(log, writer)?;
    }

    for failure in failures {
        serialize_failure(failure, writer)?;
    }

    serialize_end_tag(ENTRY_TAG, writer)?;
    Ok(())
}

fn serialize_log(log: &LogLine, writer: &mut Writer<impl io::Write>) -> Result<(), SerializeError> {
    let LogLine {
        level,
        message,
        media,
    } = log;

    let mut log_tag = BytesStart::new(LOG_TAG);
    log_tag.push_attribute(("level", level.as_str()));
    if let Some(media) = media {
        log_tag.push_attribute((media.kind(), media.path()));
    }
    writer.write_event(Event::Start(log_tag))?;
    writer.write_event(Event::Text(BytesText::new(message)))?;
    serialize_end_tag(LOG_TAG, writer)
}

fn serialize_failure(
    failure: &FailureSlot,
    writer: &mut Writer<impl io::Write>,
) -> Result<(), SerializeError> {
    let FailureSlot {
        index,
        checkpoint_id,
        message,
        evidence,
        tracking,
    } = failure;

    let mut failure_tag = BytesStart::new(FAILURE_TAG);
    failure_tag.extend_attributes([
        ("index", index.to_string().as_str()),
        ("checkpoint-id", checkpoint_id.as_str()),
    ]);
    if let Some(tracking) = tracking {
        failure_tag.extend_attributes([
            ("reference", tracking.reference.as_str()),
            ("url", tracking.url.as_str()),
        ]);
    }

    if message.is_none() && evidence.is_none() {
        writer.write_event(Event::Empty(failure_tag))?;
        return Ok(());
    }

    writer.write_event(Event::Start(failure_tag))?;
    if let Some(message) = message {
        serialize_text_element(MESSAGE_TAG, message, writer)?;
    }
    if let Some(evidence) = evidence {
        serialize_evidence(evidence, writer)?;
    }
    serialize_end_tag(FAILURE_TAG, writer)
}

fn serialize_evidence(
    evidence: &Media,
    writer: &mut Writer<impl io::Write>,
) -> Result<(), SerializeError> {
    let mut evidence_tag = BytesStart::new(EVIDENCE_TAG);
    evidence_tag.extend_attributes([("kind", evidence.kind()), ("path", evidence.path())]);
    writer.write_event(Event::Empty(evidence_tag))?;
    Ok(())
}

fn serialize_text_element(
    tag_name: &'static str,
    text: &str,
    writer: &mut Writer<impl io::Write>,
) -> Result<(), SerializeError> {
    serialize_empty_start_tag(tag_name, writer)?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    serialize_end_tag(tag_name, writer)
}

fn serialize_empty_start_tag(
    tag_name: &'static str,
    writer: &mut Writer<impl io::Write>,
) -> Result<(), SerializeError> {
    writer.write_event(Event::Start(BytesStart::new(tag_name)))?;
    Ok(())
}

fn serialize_end_tag(
    tag_name: &'static str,
    writer: &mut Writer<impl io::Write>,
) -> Result<(), SerializeError> {
    writer.write_event(Event::End(BytesEnd::new(tag_name)))?;
    Ok(())
}

fn serialize_timestamp(timestamp: &DateTime<FixedOffset>) -> String {
    format!("{}", timestamp.format("%+"))
}
