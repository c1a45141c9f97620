// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Graphite plaintext lines: `path value timestamp_s`.
//!
//! The path is rendered from the configured template, where `%{_metric_}` stands for the metric
//! name and any other placeholder for an attribute. Attributes that are missing render as an
//! empty string.

use std::borrow::Cow;

use super::{Body, CONTENT_TYPE_GRAPHITE};
use crate::record::MetricRecord;
use crate::source_format::SourceFormat;

pub const METRIC_NAME_PLACEHOLDER: &str = "_metric_";
pub const DEFAULT_TEMPLATE: &str = "%{_metric_}";

/// Path components are separated by `.` and lines by spaces.
#[must_use]
pub fn sanitize(value: &str) -> String {
    value.replace(['.', ' '], "_")
}

#[must_use]
pub fn path(record: &MetricRecord, template: &SourceFormat) -> String {
    template.render_with(
        |name| {
            if name == METRIC_NAME_PLACEHOLDER {
                Some(Cow::Owned(sanitize(&record.name)))
            } else {
                record
                    .attributes
                    .get(name)
                    .map(|value| Cow::Owned(sanitize(&value.as_string())))
            }
        },
        "",
    )
}

#[must_use]
pub fn line(record: &MetricRecord, template: &SourceFormat) -> String {
    format!(
        "{} {} {}",
        path(record, template),
        record.value,
        record.timestamp_secs()
    )
}

#[must_use]
pub fn format(records: &[MetricRecord], template: &SourceFormat) -> Body {
    let lines: Vec<String> = records.iter().map(|r| line(r, template)).collect();
    Body::from_lines(CONTENT_TYPE_GRAPHITE, &lines)
}
