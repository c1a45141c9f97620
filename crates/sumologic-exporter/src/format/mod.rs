// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Wire formats for log and metric batches.
//!
//! Every supported (pipeline, format) pair has one serializer. Dispatch happens through a
//! closed `match` on [`Pipeline`] and [`Format`] so that adding a format forces every call site
//! to handle it.
//!
//! | Pipeline | Format       | Content-Type                            |
//! |----------|--------------|-----------------------------------------|
//! | logs     | `text`       | `application/x-www-form-urlencoded`     |
//! | logs     | `json`       | `application/x-www-form-urlencoded`     |
//! | logs     | `otlp`       | `application/x-protobuf`                |
//! | metrics  | `prometheus` | `application/vnd.sumologic.prometheus`  |
//! | metrics  | `carbon2`    | `application/vnd.sumologic.carbon2`     |
//! | metrics  | `graphite`   | `application/vnd.sumologic.graphite`    |
//! | metrics  | `otlp`       | `application/x-protobuf`                |
//! | traces   | `otlp`       | `application/x-protobuf`                |

pub mod carbon2;
pub mod graphite;
pub mod logs;
pub mod otlp;
pub mod prometheus;

use std::fmt;
use std::str::FromStr;

use crate::errors::{ConfigError, SendError};
use crate::fields::Filter;
use crate::record::{LogRecord, MetricRecord, SpanRecord};
use crate::source_format::{SourceFormat, SourceValues};

pub const CONTENT_TYPE_LOGS: &str = "application/x-www-form-urlencoded";
pub const CONTENT_TYPE_PROMETHEUS: &str = "application/vnd.sumologic.prometheus";
pub const CONTENT_TYPE_CARBON2: &str = "application/vnd.sumologic.carbon2";
pub const CONTENT_TYPE_GRAPHITE: &str = "application/vnd.sumologic.graphite";
pub const CONTENT_TYPE_OTLP: &str = "application/x-protobuf";

/// Kind of telemetry flowing through an exporter pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pipeline {
    Logs,
    Metrics,
    Traces,
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Logs => f.write_str("logs"),
            Self::Metrics => f.write_str("metrics"),
            Self::Traces => f.write_str("traces"),
        }
    }
}

/// Wire format selected in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Text,
    Json,
    Otlp,
    Prometheus,
    Carbon2,
    Graphite,
}

impl Format {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
            Self::Otlp => "otlp",
            Self::Prometheus => "prometheus",
            Self::Carbon2 => "carbon2",
            Self::Graphite => "graphite",
        }
    }

    /// Whether the format carries source metadata inside the body instead of headers.
    #[must_use]
    pub fn embeds_source_metadata(self) -> bool {
        matches!(self, Self::Otlp)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "otlp" => Ok(Self::Otlp),
            "prometheus" => Ok(Self::Prometheus),
            "carbon2" => Ok(Self::Carbon2),
            "graphite" => Ok(Self::Graphite),
            _ => Err(ConfigError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// A serialized batch and the Content-Type it must be sent with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    pub content_type: &'static str,
    pub data: Vec<u8>,
}

impl Body {
    /// Joins per-record lines with a single newline, without a trailing newline.
    #[must_use]
    pub fn from_lines(content_type: &'static str, lines: &[String]) -> Self {
        Self {
            content_type,
            data: lines.join("\n").into_bytes(),
        }
    }
}

/// Everything a serializer may need besides the records themselves.
#[derive(Debug, Clone, Copy)]
pub struct FormatContext<'a> {
    pub filter: &'a Filter,
    pub graphite_template: &'a SourceFormat,
    pub sources: &'a SourceValues,
}

/// Records that can be serialized for a pipeline.
pub trait Serializable: Sized {
    const PIPELINE: Pipeline;

    fn serialize(records: &[Self], format: Format, ctx: &FormatContext<'_>)
        -> Result<Body, SendError>;
}

fn unsupported(pipeline: Pipeline, format: Format) -> SendError {
    SendError::UnsupportedFormat {
        pipeline,
        format: format.to_string(),
    }
}

impl Serializable for LogRecord {
    const PIPELINE: Pipeline = Pipeline::Logs;

    fn serialize(
        records: &[Self],
        format: Format,
        ctx: &FormatContext<'_>,
    ) -> Result<Body, SendError> {
        match format {
            Format::Text => Ok(logs::text(records)),
            Format::Json => logs::json(records, ctx.filter),
            Format::Otlp => Ok(otlp::logs(records, ctx.sources)),
            Format::Prometheus | Format::Carbon2 | Format::Graphite => {
                Err(unsupported(Self::PIPELINE, format))
            }
        }
    }
}

impl Serializable for MetricRecord {
    const PIPELINE: Pipeline = Pipeline::Metrics;

    fn serialize(
        records: &[Self],
        format: Format,
        ctx: &FormatContext<'_>,
    ) -> Result<Body, SendError> {
        match format {
            Format::Prometheus => Ok(prometheus::format(records)),
            Format::Carbon2 => Ok(carbon2::format(records)),
            Format::Graphite => Ok(graphite::format(records, ctx.graphite_template)),
            Format::Otlp => Ok(otlp::metrics(records, ctx.sources)),
            Format::Text | Format::Json => Err(unsupported(Self::PIPELINE, format)),
        }
    }
}

impl Serializable for SpanRecord {
    const PIPELINE: Pipeline = Pipeline::Traces;

    fn serialize(
        records: &[Self],
        format: Format,
        ctx: &FormatContext<'_>,
    ) -> Result<Body, SendError> {
        match format {
            Format::Otlp => Ok(otlp::traces(records, ctx.sources)),
            Format::Text
            | Format::Json
            | Format::Prometheus
            | Format::Carbon2
            | Format::Graphite => Err(unsupported(Self::PIPELINE, format)),
        }
    }
}
