// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Carbon 2.0 lines: intrinsic tags, two spaces, value and timestamp in seconds.

use super::{Body, CONTENT_TYPE_CARBON2};
use crate::record::MetricRecord;

/// Tag keys that collide with the intrinsic tags written by this format.
const RESERVED_KEYS: [&str; 2] = ["name", "unit"];

/// Carbon 2.0 tags are separated by spaces and split on `=`.
#[must_use]
pub fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            ' ' | '\n' => '_',
            '=' => ':',
            c => c,
        })
        .collect()
}

#[must_use]
pub fn line(record: &MetricRecord) -> String {
    let mut tags: Vec<String> = record
        .attributes
        .iter()
        .map(|(key, value)| {
            let key = if RESERVED_KEYS.contains(&key.as_str()) {
                format!("_{key}")
            } else {
                key.clone()
            };
            format!("{}={}", sanitize(&key), sanitize(&value.as_string()))
        })
        .collect();
    tags.push(format!("metric={}", sanitize(&record.name)));
    if !record.unit.is_empty() {
        tags.push(format!("unit={}", sanitize(&record.unit)));
    }

    format!(
        "{}  {} {}",
        tags.join(" "),
        record.value,
        record.timestamp_secs()
    )
}

#[must_use]
pub fn format(records: &[MetricRecord]) -> Body {
    let lines: Vec<String> = records.iter().map(line).collect();
    Body::from_lines(CONTENT_TYPE_CARBON2, &lines)
}
