// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Entry point for callers pushing records into the exporter.
//!
//! Each pipeline owns a [`RecordBuffer`] and the [`Fields`] of the records it currently holds.
//! Records are consumed in order; whenever a record's fields differ from the buffered ones the
//! buffer is flushed first, so every request carries records that share one `X-Sumo-Fields`
//! value. Whatever is left in the buffer is flushed when the call ends, so nothing stays
//! buffered between calls.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::buffer::{Flush, RecordBuffer, Rejected};
use crate::config::Config;
use crate::errors::{ConfigError, DeliveryFailure};
use crate::fields::Fields;
use crate::record::{HasAttributes, LogRecord, MetricRecord, SpanRecord};
use crate::sender::Sender;
use crate::translate::translate_attributes;

/// Sends drained buffers with the fields they were collected under.
struct FieldsFlusher<'a> {
    sender: &'a Sender,
    fields: &'a Fields,
}

#[async_trait]
impl Flush<LogRecord> for FieldsFlusher<'_> {
    async fn flush(&self, records: Vec<LogRecord>) -> Result<(), DeliveryFailure<LogRecord>> {
        self.sender.send_logs(&records, self.fields).await
    }
}

#[async_trait]
impl Flush<MetricRecord> for FieldsFlusher<'_> {
    async fn flush(
        &self,
        records: Vec<MetricRecord>,
    ) -> Result<(), DeliveryFailure<MetricRecord>> {
        self.sender.send_metrics(&records, self.fields).await
    }
}

#[async_trait]
impl Flush<SpanRecord> for FieldsFlusher<'_> {
    async fn flush(&self, records: Vec<SpanRecord>) -> Result<(), DeliveryFailure<SpanRecord>> {
        self.sender.send_traces(&records, self.fields).await
    }
}

struct PipelineBuffer<R> {
    records: RecordBuffer<R>,
    /// Fields shared by the buffered records. Held for the whole of a consume call.
    fields: Mutex<Fields>,
}

impl<R: Send> PipelineBuffer<R> {
    fn new(capacity: usize) -> Self {
        Self {
            records: RecordBuffer::new(capacity),
            fields: Mutex::new(Fields::new()),
        }
    }
}

pub struct Exporter {
    sender: Sender,
    translate_attributes: bool,
    logs: PipelineBuffer<LogRecord>,
    metrics: PipelineBuffer<MetricRecord>,
    traces: PipelineBuffer<SpanRecord>,
}

impl Exporter {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let sender = Sender::new(config)?;
        Ok(Self {
            sender,
            translate_attributes: config.translate_attributes,
            logs: PipelineBuffer::new(config.max_buffer_size),
            metrics: PipelineBuffer::new(config.max_buffer_size),
            traces: PipelineBuffer::new(config.max_buffer_size),
        })
    }

    #[must_use]
    pub fn sender(&self) -> &Sender {
        &self.sender
    }

    /// Delivers `records` as logs. The failure lists every record of this call that was not
    /// delivered, in order.
    pub async fn consume_logs(
        &self,
        records: Vec<LogRecord>,
    ) -> Result<(), DeliveryFailure<LogRecord>> {
        self.consume(&self.logs, records).await
    }

    /// Delivers `records` as metrics. See [`Exporter::consume_logs`].
    pub async fn consume_metrics(
        &self,
        records: Vec<MetricRecord>,
    ) -> Result<(), DeliveryFailure<MetricRecord>> {
        self.consume(&self.metrics, records).await
    }

    /// Delivers `records` as OTLP traces. See [`Exporter::consume_logs`].
    pub async fn consume_traces(
        &self,
        records: Vec<SpanRecord>,
    ) -> Result<(), DeliveryFailure<SpanRecord>> {
        self.consume(&self.traces, records).await
    }

    async fn consume<R>(
        &self,
        pipeline: &PipelineBuffer<R>,
        records: Vec<R>,
    ) -> Result<(), DeliveryFailure<R>>
    where
        R: HasAttributes + Send + Sync,
        for<'a> FieldsFlusher<'a>: Flush<R>,
    {
        let mut current = pipeline.fields.lock().await;
        let mut failure = None;

        for mut record in records {
            if self.translate_attributes {
                translate_attributes(record.attributes_mut());
            }
            let fields = self.sender.filter().filter_in(record.attributes());
            if *current != fields {
                let flusher = self.flusher(&current);
                let flushed = pipeline.records.flush(&flusher).await.err();
                failure = DeliveryFailure::merge(failure, flushed);
                *current = fields;
            }
            let flusher = self.flusher(&current);
            let rejected = pipeline.records.append(record, &flusher).await.err();
            failure = DeliveryFailure::merge(failure, rejected.map(Rejected::into_failure));
        }

        let flushed = pipeline.records.flush(&self.flusher(&current)).await.err();
        DeliveryFailure::merge(failure, flushed).map_or(Ok(()), Err)
    }

    fn flusher<'a>(&'a self, fields: &'a Fields) -> FieldsFlusher<'a> {
        FieldsFlusher {
            sender: &self.sender,
            fields,
        }
    }
}
