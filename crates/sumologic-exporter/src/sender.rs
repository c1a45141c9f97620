// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery of record batches to the Sumo Logic receiver.
//!
//! A batch goes through serialize → compress → POST. When the compressed body is larger than
//! `max_request_body_size` and more than one record is left, the batch is split into two
//! contiguous halves (the first one holding `ceil(n / 2)` records) that are delivered one after
//! the other, recursively:
//!
//! ```text
//!              [r1 r2 r3 r4 r5]        too large
//!               /            \
//!        [r1 r2 r3]        [r4 r5]     each half is encoded again
//!         /      \             │
//!    [r1 r2]    [r3]         POST
//!       │         │
//!     POST      POST
//! ```
//!
//! The outcome of every leaf is folded back in order: the dropped records of failed leaves are
//! concatenated and their errors combined. Source templates are evaluated once per call so every
//! request of a split batch carries the same source headers. Nothing is retried here.

use std::error::Error as StdError;
use std::future::Future;
use std::pin::Pin;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_ENCODING, CONTENT_TYPE};
use tracing::{debug, debug_span, error, Instrument};

use crate::compression::Compression;
use crate::config::Config;
use crate::errors::{ConfigError, DeliveryFailure, SendError};
use crate::fields::{Fields, Filter};
use crate::format::{Body, Format, FormatContext, Pipeline, Serializable};
use crate::record::{LogRecord, MetricRecord, SpanRecord};
use crate::source_format::{SourceFormat, SourceFormats, SourceValues};

pub const CLIENT_HEADER: &str = "X-Sumo-Client";
pub const FIELDS_HEADER: &str = "X-Sumo-Fields";
pub const SOURCE_NAME_HEADER: &str = "X-Sumo-Name";
pub const SOURCE_CATEGORY_HEADER: &str = "X-Sumo-Category";
pub const SOURCE_HOST_HEADER: &str = "X-Sumo-Host";

type SendFuture<'a, R> = Pin<Box<dyn Future<Output = Result<(), DeliveryFailure<R>>> + Send + 'a>>;

/// Per-call state shared by every sub-batch of one send.
struct Batch<'a> {
    pipeline: Pipeline,
    format: Format,
    endpoint: &'a str,
    fields: &'a Fields,
    sources: SourceValues,
}

#[derive(Debug, Clone)]
pub struct Sender {
    client: reqwest::Client,
    logs_endpoint: String,
    metrics_endpoint: String,
    traces_endpoint: String,
    log_format: Format,
    metric_format: Format,
    trace_format: Format,
    compression: Compression,
    max_request_body_size: usize,
    filter: Filter,
    sources: SourceFormats,
    graphite_template: SourceFormat,
    /// Headers sent with every request.
    headers: HeaderMap,
}

fn build_client(config: &Config) -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .timeout(config.timeout())
        .build()
        .map_err(|e| ConfigError::HttpClient(e.to_string()))
}

/// Renders an error and its sources, outermost first.
fn error_chain(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

impl Sender {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let compression = config.compression()?;

        let mut headers = HeaderMap::new();
        let client_name =
            HeaderValue::from_str(&config.client).map_err(|e| ConfigError::InvalidValue {
                field: "client",
                reason: e.to_string(),
            })?;
        headers.insert(CLIENT_HEADER, client_name);
        if let Some(encoding) = compression.content_encoding() {
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static(encoding));
        }

        Ok(Self {
            client: build_client(config)?,
            logs_endpoint: config.endpoint(Pipeline::Logs).to_string(),
            metrics_endpoint: config.endpoint(Pipeline::Metrics).to_string(),
            traces_endpoint: config.endpoint(Pipeline::Traces).to_string(),
            log_format: config.format(Pipeline::Logs)?,
            metric_format: config.format(Pipeline::Metrics)?,
            trace_format: config.format(Pipeline::Traces)?,
            compression,
            max_request_body_size: config.max_request_body_size,
            filter: config.filter()?,
            sources: config.source_formats()?,
            graphite_template: config.graphite_format()?,
            headers,
        })
    }

    #[must_use]
    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Sends `records` as logs. On failure the error carries every record that was not
    /// confirmed delivered, in their original order.
    pub async fn send_logs(
        &self,
        records: &[LogRecord],
        fields: &Fields,
    ) -> Result<(), DeliveryFailure<LogRecord>> {
        let batch = self.batch(Pipeline::Logs, self.log_format, &self.logs_endpoint, fields);
        self.send(records, &batch).await
    }

    /// Sends `records` as metrics. See [`Sender::send_logs`].
    pub async fn send_metrics(
        &self,
        records: &[MetricRecord],
        fields: &Fields,
    ) -> Result<(), DeliveryFailure<MetricRecord>> {
        let batch = self.batch(
            Pipeline::Metrics,
            self.metric_format,
            &self.metrics_endpoint,
            fields,
        );
        self.send(records, &batch).await
    }

    /// Sends `records` as OTLP traces. See [`Sender::send_logs`].
    pub async fn send_traces(
        &self,
        records: &[SpanRecord],
        fields: &Fields,
    ) -> Result<(), DeliveryFailure<SpanRecord>> {
        let batch = self.batch(
            Pipeline::Traces,
            self.trace_format,
            &self.traces_endpoint,
            fields,
        );
        self.send(records, &batch).await
    }

    fn batch<'a>(
        &self,
        pipeline: Pipeline,
        format: Format,
        endpoint: &'a str,
        fields: &'a Fields,
    ) -> Batch<'a> {
        Batch {
            pipeline,
            format,
            endpoint,
            fields,
            sources: self.sources.evaluate(fields),
        }
    }

    async fn send<R>(&self, records: &[R], batch: &Batch<'_>) -> Result<(), DeliveryFailure<R>>
    where
        R: Serializable + Clone + Send + Sync,
    {
        if records.is_empty() {
            return Ok(());
        }
        let span = debug_span!("send", pipeline = %batch.pipeline, format = %batch.format);
        async {
            debug!("Sending {} {} records", records.len(), batch.pipeline);
            let result = self.send_split(records, batch).await;
            if let Err(failure) = &result {
                error!(
                    "Failed to send {} of {} {} records: {}",
                    failure.dropped.len(),
                    records.len(),
                    batch.pipeline,
                    failure
                );
            }
            result
        }
        .instrument(span)
        .await
    }

    fn send_split<'a, R>(&'a self, records: &'a [R], batch: &'a Batch<'a>) -> SendFuture<'a, R>
    where
        R: Serializable + Clone + Send + Sync + 'a,
    {
        Box::pin(async move {
            let body = self
                .encode(records, batch)
                .map_err(|error| DeliveryFailure::new(records.to_vec(), error))?;

            if body.data.len() <= self.max_request_body_size || records.len() == 1 {
                return self
                    .post(body, batch)
                    .await
                    .map_err(|error| DeliveryFailure::new(records.to_vec(), error));
            }

            let (first, second) = records.split_at(records.len().div_ceil(2));
            debug!(
                "Body of {} bytes exceeds {} bytes, splitting {} records into {} and {}",
                body.data.len(),
                self.max_request_body_size,
                records.len(),
                first.len(),
                second.len()
            );
            let first = self.send_split(first, batch).await.err();
            let second = self.send_split(second, batch).await.err();
            DeliveryFailure::merge(first, second).map_or(Ok(()), Err)
        })
    }

    /// Serializes and compresses a batch.
    fn encode<R: Serializable>(&self, records: &[R], batch: &Batch<'_>) -> Result<Body, SendError> {
        let ctx = FormatContext {
            filter: &self.filter,
            graphite_template: &self.graphite_template,
            sources: &batch.sources,
        };
        let body = R::serialize(records, batch.format, &ctx)?;
        let data = self
            .compression
            .compress(&body.data)
            .map_err(SendError::Compression)?;
        Ok(Body {
            content_type: body.content_type,
            data,
        })
    }

    async fn post(&self, body: Body, batch: &Batch<'_>) -> Result<(), SendError> {
        let mut request = self
            .client
            .post(batch.endpoint)
            .headers(self.headers.clone())
            .header(CONTENT_TYPE, body.content_type);

        if !batch.fields.is_empty() {
            request = request.header(FIELDS_HEADER, batch.fields.to_string());
        }
        if !batch.format.embeds_source_metadata() {
            let sources = [
                (SOURCE_NAME_HEADER, &batch.sources.name),
                (SOURCE_CATEGORY_HEADER, &batch.sources.category),
                (SOURCE_HOST_HEADER, &batch.sources.host),
            ];
            for (header, value) in sources {
                if let Some(value) = value {
                    request = request.header(header, value.as_str());
                }
            }
        }

        let size = body.data.len();
        let response = request
            .body(body.data)
            .send()
            .await
            .map_err(|e| SendError::Transport(error_chain(&e)))?;

        let status = response.status();
        if status.is_success() {
            debug!("Delivered {} bytes to {}", size, batch.endpoint);
            Ok(())
        } else {
            error!("Receiver responded with {} to a {} byte request", status, size);
            Err(SendError::DeliveryStatus(status.to_string()))
        }
    }
}
