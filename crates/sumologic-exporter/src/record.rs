// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log and metric records handled by the exporter.

use indexmap::IndexMap;
use serde_json::{Map, Number, Value};
use std::fmt;

/// A typed attribute or log body value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Empty,
    String(String),
    Bool(bool),
    Int(i64),
    Double(f64),
    Map(Attributes),
    Array(Vec<AttributeValue>),
}

impl AttributeValue {
    /// Renders the value as plain text: strings verbatim, scalars through their display form,
    /// maps and arrays as compact JSON.
    #[must_use]
    pub fn as_string(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::String(s) => s.clone(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Double(d) => d.to_string(),
            Self::Map(_) | Self::Array(_) => self.to_json().to_string(),
        }
    }

    /// Converts the value into JSON.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Empty => Value::Null,
            Self::String(s) => Value::String(s.clone()),
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::Number(Number::from(*i)),
            Self::Double(d) => Number::from_f64(*d).map_or(Value::Null, Value::Number),
            Self::Map(attributes) => Value::Object(attributes.to_json_map()),
            Self::Array(values) => Value::Array(values.iter().map(Self::to_json).collect()),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<Attributes> for AttributeValue {
    fn from(value: Attributes) -> Self {
        Self::Map(value)
    }
}

impl From<Vec<AttributeValue>> for AttributeValue {
    fn from(value: Vec<AttributeValue>) -> Self {
        Self::Array(value)
    }
}

/// Ordered attribute mapping with unique keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    inner: IndexMap<String, AttributeValue>,
}

impl Attributes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `value` under `key` unless the key is already present. Returns whether the
    /// value was inserted.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> bool {
        let key = key.into();
        if self.inner.contains_key(&key) {
            return false;
        }
        self.inner.insert(key, value.into());
        true
    }

    /// Inserts or replaces the value under `key`, keeping the key's position if it existed.
    pub fn upsert(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.inner.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.inner.get(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// Removes `key`, preserving the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<AttributeValue> {
        self.inner.shift_remove(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.inner.iter()
    }

    #[must_use]
    pub fn to_json_map(&self) -> Map<String, Value> {
        self.inner
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect()
    }
}

impl<K, V> FromIterator<(K, V)> for Attributes
where
    K: Into<String>,
    V: Into<AttributeValue>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut attributes = Self::new();
        for (k, v) in iter {
            attributes.insert(k, v);
        }
        attributes
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = (&'a String, &'a AttributeValue);
    type IntoIter = indexmap::map::Iter<'a, String, AttributeValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}

/// A single log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// Unix time in nanoseconds.
    pub timestamp: u64,
    pub body: AttributeValue,
    pub attributes: Attributes,
}

impl LogRecord {
    #[must_use]
    pub fn new(body: impl Into<AttributeValue>) -> Self {
        Self {
            timestamp: 0,
            body: body.into(),
            attributes: Attributes::new(),
        }
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[must_use]
    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.attributes.insert(key, value);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Int(i64),
    Double(f64),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Double(d) => write!(f, "{d}"),
        }
    }
}

/// A single metric data point.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub name: String,
    /// Unit of the metric, empty when unknown.
    pub unit: String,
    pub kind: MetricKind,
    pub value: MetricValue,
    /// Unix time in nanoseconds.
    pub timestamp: u64,
    pub attributes: Attributes,
}

impl MetricRecord {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: MetricKind, value: MetricValue) -> Self {
        Self {
            name: name.into(),
            unit: String::new(),
            kind,
            value,
            timestamp: 0,
            attributes: Attributes::new(),
        }
    }

    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[must_use]
    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.attributes.insert(key, value);
        self
    }

    /// Timestamp truncated to milliseconds.
    #[must_use]
    pub fn timestamp_millis(&self) -> u64 {
        self.timestamp / 1_000_000
    }

    /// Timestamp truncated to seconds.
    #[must_use]
    pub fn timestamp_secs(&self) -> u64 {
        self.timestamp / 1_000_000_000
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpanKind {
    #[default]
    Unspecified,
    Internal,
    Server,
    Client,
    Producer,
    Consumer,
}

/// A single finished span.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanRecord {
    pub trace_id: [u8; 16],
    pub span_id: [u8; 8],
    /// `None` for root spans.
    pub parent_span_id: Option<[u8; 8]>,
    pub name: String,
    pub kind: SpanKind,
    /// Unix time in nanoseconds.
    pub start_time: u64,
    /// Unix time in nanoseconds.
    pub end_time: u64,
    pub attributes: Attributes,
}

impl SpanRecord {
    #[must_use]
    pub fn new(trace_id: [u8; 16], span_id: [u8; 8], name: impl Into<String>) -> Self {
        Self {
            trace_id,
            span_id,
            parent_span_id: None,
            name: name.into(),
            kind: SpanKind::default(),
            start_time: 0,
            end_time: 0,
            attributes: Attributes::new(),
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent_span_id: [u8; 8]) -> Self {
        self.parent_span_id = Some(parent_span_id);
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: SpanKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn with_times(mut self, start_time: u64, end_time: u64) -> Self {
        self.start_time = start_time;
        self.end_time = end_time;
        self
    }

    #[must_use]
    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.attributes.insert(key, value);
        self
    }
}

/// Access to the attribute mapping shared by every record type.
pub trait HasAttributes {
    fn attributes(&self) -> &Attributes;
    fn attributes_mut(&mut self) -> &mut Attributes;
}

impl HasAttributes for LogRecord {
    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }
}

impl HasAttributes for MetricRecord {
    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }
}

impl HasAttributes for SpanRecord {
    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }
}
