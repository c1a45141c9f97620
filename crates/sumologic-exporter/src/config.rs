// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Exporter configuration.
//!
//! Values come from serde (for callers embedding the exporter in a larger configuration
//! document) or from `SUMO_*` environment variables layered over the defaults. Names of
//! formats and encodings stay strings here and are parsed by [`Config::validate`] and by the
//! sender when it is built.

use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::compression::Compression;
use crate::errors::ConfigError;
use crate::fields::Filter;
use crate::format::graphite::DEFAULT_TEMPLATE;
use crate::format::{Format, Pipeline};
use crate::source_format::{SourceFormat, SourceFormats};
use crate::translate::translate_config_value;

pub const DEFAULT_COMPRESS_ENCODING: &str = "gzip";
pub const DEFAULT_MAX_REQUEST_BODY_SIZE: usize = 1_048_576;
pub const DEFAULT_FORMAT: &str = "otlp";
pub const DEFAULT_CLIENT: &str = "otelcol";
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Receiver URL shared by every pipeline.
    pub endpoint: String,
    /// Overrides `endpoint` for logs when not empty.
    pub logs_endpoint: String,
    /// Overrides `endpoint` for metrics when not empty.
    pub metrics_endpoint: String,
    /// Overrides `endpoint` for traces when not empty.
    pub traces_endpoint: String,
    /// `gzip`, `deflate`, `zstd` or empty for none.
    pub compress_encoding: String,
    /// Upper bound of a compressed request body, in bytes.
    pub max_request_body_size: usize,
    pub log_format: String,
    pub metric_format: String,
    /// Only `otlp` is accepted by the traces pipeline.
    pub trace_format: String,
    /// Patterns selecting the attributes sent as `X-Sumo-Fields`.
    pub metadata_attributes: Vec<String>,
    pub source_host: String,
    pub source_category: String,
    pub source_name: String,
    /// Value of the `X-Sumo-Client` header.
    pub client: String,
    pub graphite_template: String,
    pub translate_attributes: bool,
    pub timeout_secs: u64,
    /// Capacity of each pipeline buffer, in records.
    pub max_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            logs_endpoint: String::new(),
            metrics_endpoint: String::new(),
            traces_endpoint: String::new(),
            compress_encoding: DEFAULT_COMPRESS_ENCODING.to_string(),
            max_request_body_size: DEFAULT_MAX_REQUEST_BODY_SIZE,
            log_format: DEFAULT_FORMAT.to_string(),
            metric_format: DEFAULT_FORMAT.to_string(),
            trace_format: DEFAULT_FORMAT.to_string(),
            metadata_attributes: Vec::new(),
            source_host: String::new(),
            source_category: String::new(),
            source_name: String::new(),
            client: DEFAULT_CLIENT.to_string(),
            graphite_template: DEFAULT_TEMPLATE.to_string(),
            translate_attributes: true,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
        }
    }
}

fn parse_number<T: std::str::FromStr>(
    field: &'static str,
    value: &str,
) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field,
        reason: format!("{value:?} is not a valid number"),
    })
}

impl Config {
    /// Reads `SUMO_*` environment variables over the defaults and validates the result.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let string = |key: &str, target: &mut String| {
            if let Some(value) = lookup(key) {
                *target = value.trim().to_string();
            }
        };

        string("SUMO_ENDPOINT", &mut config.endpoint);
        string("SUMO_LOGS_ENDPOINT", &mut config.logs_endpoint);
        string("SUMO_METRICS_ENDPOINT", &mut config.metrics_endpoint);
        string("SUMO_TRACES_ENDPOINT", &mut config.traces_endpoint);
        string("SUMO_COMPRESS_ENCODING", &mut config.compress_encoding);
        string("SUMO_LOG_FORMAT", &mut config.log_format);
        string("SUMO_METRIC_FORMAT", &mut config.metric_format);
        string("SUMO_TRACE_FORMAT", &mut config.trace_format);
        string("SUMO_SOURCE_HOST", &mut config.source_host);
        string("SUMO_SOURCE_CATEGORY", &mut config.source_category);
        string("SUMO_SOURCE_NAME", &mut config.source_name);
        string("SUMO_CLIENT", &mut config.client);
        string("SUMO_GRAPHITE_TEMPLATE", &mut config.graphite_template);

        if let Some(value) = lookup("SUMO_METADATA_ATTRIBUTES") {
            config.metadata_attributes = value
                .split(',')
                .map(str::trim)
                .filter(|pattern| !pattern.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(value) = lookup("SUMO_TRANSLATE_ATTRIBUTES") {
            config.translate_attributes = value.trim().to_lowercase() != "false";
        }
        if let Some(value) = lookup("SUMO_MAX_REQUEST_BODY_SIZE") {
            config.max_request_body_size = parse_number("max_request_body_size", &value)?;
        }
        if let Some(value) = lookup("SUMO_TIMEOUT_SECS") {
            config.timeout_secs = parse_number("timeout_secs", &value)?;
        }
        if let Some(value) = lookup("SUMO_MAX_BUFFER_SIZE") {
            config.max_buffer_size = parse_number("max_buffer_size", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks every setting that would otherwise only fail when the sender is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_request_body_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_request_body_size",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.max_buffer_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_buffer_size",
                reason: "must be greater than 0".to_string(),
            });
        }
        self.compression()?;
        self.format(Pipeline::Logs)?;
        self.format(Pipeline::Metrics)?;
        self.format(Pipeline::Traces)?;
        self.filter()?;
        self.source_formats()?;
        self.graphite_format()?;
        Ok(())
    }

    #[must_use]
    pub fn endpoint(&self, pipeline: Pipeline) -> &str {
        let endpoint = match pipeline {
            Pipeline::Logs => &self.logs_endpoint,
            Pipeline::Metrics => &self.metrics_endpoint,
            Pipeline::Traces => &self.traces_endpoint,
        };
        if endpoint.is_empty() {
            &self.endpoint
        } else {
            endpoint
        }
    }

    pub fn format(&self, pipeline: Pipeline) -> Result<Format, ConfigError> {
        match pipeline {
            Pipeline::Logs => self.log_format.parse(),
            Pipeline::Metrics => self.metric_format.parse(),
            Pipeline::Traces => self.trace_format.parse(),
        }
    }

    pub fn compression(&self) -> Result<Compression, ConfigError> {
        self.compress_encoding.parse()
    }

    pub fn filter(&self) -> Result<Filter, ConfigError> {
        Filter::new(&self.metadata_attributes)
    }

    /// Compiles the source templates, rewriting placeholders to translated attribute names
    /// when attribute translation is enabled.
    pub fn source_formats(&self) -> Result<SourceFormats, ConfigError> {
        let template = |value: &str| {
            if self.translate_attributes {
                translate_config_value(value)
            } else {
                value.to_string()
            }
        };
        Ok(SourceFormats::new(
            &template(&self.source_host),
            &template(&self.source_category),
            &template(&self.source_name),
        )?)
    }

    pub fn graphite_format(&self) -> Result<SourceFormat, ConfigError> {
        Ok(SourceFormat::parse(&self.graphite_template)?)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
