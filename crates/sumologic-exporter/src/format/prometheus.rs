// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Prometheus text exposition lines: `name{label="value",...} value timestamp_ms`.

use std::fmt::Write;

use super::{Body, CONTENT_TYPE_PROMETHEUS};
use crate::record::{MetricRecord, MetricValue};

/// Replaces every character outside `[a-zA-Z0-9_:]` with `_`.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == ':' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Label names may not contain `:`.
#[must_use]
pub fn sanitize_label(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[must_use]
pub fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn format_value(value: MetricValue) -> String {
    match value {
        MetricValue::Double(d) if d.is_nan() => "NaN".to_string(),
        MetricValue::Double(d) if d == f64::INFINITY => "+Inf".to_string(),
        MetricValue::Double(d) if d == f64::NEG_INFINITY => "-Inf".to_string(),
        other => other.to_string(),
    }
}

#[must_use]
pub fn line(record: &MetricRecord) -> String {
    let mut labels: Vec<(String, String)> = record
        .attributes
        .iter()
        .map(|(key, value)| (sanitize_label(key), escape_value(&value.as_string())))
        .collect();
    labels.sort();

    let mut line = sanitize_name(&record.name);
    if !labels.is_empty() {
        line.push('{');
        for (i, (key, value)) in labels.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            let _ = write!(line, "{key}=\"{value}\"");
        }
        line.push('}');
    }
    let _ = write!(
        line,
        " {} {}",
        format_value(record.value),
        record.timestamp_millis()
    );
    line
}

#[must_use]
pub fn format(records: &[MetricRecord]) -> Body {
    let lines: Vec<String> = records.iter().map(line).collect();
    Body::from_lines(CONTENT_TYPE_PROMETHEUS, &lines)
}
