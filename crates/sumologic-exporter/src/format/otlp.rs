// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! OTLP protobuf export requests.
//!
//! A batch becomes a single `ResourceLogs`, `ResourceMetrics` or `ResourceSpans` entry. Source metadata is not
//! sent as headers for this format; it is carried as resource attributes instead.

use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::common::v1::{
    any_value, AnyValue, ArrayValue, KeyValue, KeyValueList,
};
use opentelemetry_proto::tonic::logs::v1::{self as logs_proto, ResourceLogs, ScopeLogs};
use opentelemetry_proto::tonic::metrics::v1::{
    metric, number_data_point, AggregationTemporality, Gauge, Metric, NumberDataPoint,
    ResourceMetrics, ScopeMetrics, Sum,
};
use opentelemetry_proto::tonic::resource::v1::Resource;
use opentelemetry_proto::tonic::trace::v1::{span, ResourceSpans, ScopeSpans, Span};
use prost::Message;

use super::{Body, CONTENT_TYPE_OTLP};
use crate::record::{
    AttributeValue, Attributes, LogRecord, MetricKind, MetricRecord, MetricValue, SpanKind,
    SpanRecord,
};
use crate::source_format::SourceValues;

pub const SOURCE_HOST_KEY: &str = "_sourceHost";
pub const SOURCE_NAME_KEY: &str = "_sourceName";
pub const SOURCE_CATEGORY_KEY: &str = "_sourceCategory";

fn to_any_value(value: &AttributeValue) -> AnyValue {
    let value = match value {
        AttributeValue::Empty => None,
        AttributeValue::String(s) => Some(any_value::Value::StringValue(s.clone())),
        AttributeValue::Bool(b) => Some(any_value::Value::BoolValue(*b)),
        AttributeValue::Int(i) => Some(any_value::Value::IntValue(*i)),
        AttributeValue::Double(d) => Some(any_value::Value::DoubleValue(*d)),
        AttributeValue::Map(map) => Some(any_value::Value::KvlistValue(KeyValueList {
            values: key_values(map),
        })),
        AttributeValue::Array(values) => Some(any_value::Value::ArrayValue(ArrayValue {
            values: values.iter().map(to_any_value).collect(),
        })),
    };
    AnyValue { value }
}

fn string_key_value(key: &str, value: &str) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: Some(AnyValue {
            value: Some(any_value::Value::StringValue(value.to_string())),
        }),
    }
}

fn key_values(attributes: &Attributes) -> Vec<KeyValue> {
    attributes
        .iter()
        .map(|(key, value)| KeyValue {
            key: key.clone(),
            value: Some(to_any_value(value)),
        })
        .collect()
}

fn resource(sources: &SourceValues) -> Resource {
    let attributes = [
        (SOURCE_HOST_KEY, &sources.host),
        (SOURCE_NAME_KEY, &sources.name),
        (SOURCE_CATEGORY_KEY, &sources.category),
    ]
    .into_iter()
    .filter_map(|(key, value)| value.as_deref().map(|v| string_key_value(key, v)))
    .collect();

    Resource {
        attributes,
        ..Default::default()
    }
}

#[must_use]
pub fn logs(records: &[LogRecord], sources: &SourceValues) -> Body {
    let log_records = records
        .iter()
        .map(|record| logs_proto::LogRecord {
            time_unix_nano: record.timestamp,
            body: Some(to_any_value(&record.body)),
            attributes: key_values(&record.attributes),
            ..Default::default()
        })
        .collect();

    let request = ExportLogsServiceRequest {
        resource_logs: vec![ResourceLogs {
            resource: Some(resource(sources)),
            scope_logs: vec![ScopeLogs {
                log_records,
                ..Default::default()
            }],
            ..Default::default()
        }],
    };

    Body {
        content_type: CONTENT_TYPE_OTLP,
        data: request.encode_to_vec(),
    }
}

fn to_metric(record: &MetricRecord) -> Metric {
    let data_point = NumberDataPoint {
        attributes: key_values(&record.attributes),
        time_unix_nano: record.timestamp,
        value: Some(match record.value {
            MetricValue::Int(i) => number_data_point::Value::AsInt(i),
            MetricValue::Double(d) => number_data_point::Value::AsDouble(d),
        }),
        ..Default::default()
    };
    let data = match record.kind {
        MetricKind::Counter => metric::Data::Sum(Sum {
            data_points: vec![data_point],
            aggregation_temporality: AggregationTemporality::Cumulative as i32,
            is_monotonic: true,
        }),
        MetricKind::Gauge => metric::Data::Gauge(Gauge {
            data_points: vec![data_point],
        }),
    };

    Metric {
        name: record.name.clone(),
        unit: record.unit.clone(),
        data: Some(data),
        ..Default::default()
    }
}

#[must_use]
pub fn metrics(records: &[MetricRecord], sources: &SourceValues) -> Body {
    let request = ExportMetricsServiceRequest {
        resource_metrics: vec![ResourceMetrics {
            resource: Some(resource(sources)),
            scope_metrics: vec![ScopeMetrics {
                metrics: records.iter().map(to_metric).collect(),
                ..Default::default()
            }],
            ..Default::default()
        }],
    };

    Body {
        content_type: CONTENT_TYPE_OTLP,
        data: request.encode_to_vec(),
    }
}

fn to_span(record: &SpanRecord) -> Span {
    let kind = match record.kind {
        SpanKind::Unspecified => span::SpanKind::Unspecified,
        SpanKind::Internal => span::SpanKind::Internal,
        SpanKind::Server => span::SpanKind::Server,
        SpanKind::Client => span::SpanKind::Client,
        SpanKind::Producer => span::SpanKind::Producer,
        SpanKind::Consumer => span::SpanKind::Consumer,
    };

    Span {
        trace_id: record.trace_id.to_vec(),
        span_id: record.span_id.to_vec(),
        parent_span_id: record.parent_span_id.map(|id| id.to_vec()).unwrap_or_default(),
        name: record.name.clone(),
        kind: kind as i32,
        start_time_unix_nano: record.start_time,
        end_time_unix_nano: record.end_time,
        attributes: key_values(&record.attributes),
        ..Default::default()
    }
}

#[must_use]
pub fn traces(records: &[SpanRecord], sources: &SourceValues) -> Body {
    let request = ExportTraceServiceRequest {
        resource_spans: vec![ResourceSpans {
            resource: Some(resource(sources)),
            scope_spans: vec![ScopeSpans {
                spans: records.iter().map(to_span).collect(),
                ..Default::default()
            }],
            ..Default::default()
        }],
    };

    Body {
        content_type: CONTENT_TYPE_OTLP,
        data: request.encode_to_vec(),
    }
}
