// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types for the exporter.
//!
//! Construction-time problems surface as [`ConfigError`]. Everything that can go wrong while a
//! batch is being delivered is a [`SendError`], and the delivery engine always pairs it with
//! the records that were not confirmed delivered in a [`DeliveryFailure`].

use std::fmt;

use crate::format::Pipeline;

/// Errors raised while compiling a source template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("unclosed placeholder starting at byte {position} in template: {template}")]
    Unclosed { template: String, position: usize },

    #[error("empty placeholder name at byte {position} in template: {template}")]
    EmptyName { template: String, position: usize },
}

/// Errors detected while building the exporter from its configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid metadata attribute pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid template: {0}")]
    Template(#[from] TemplateError),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid content encoding: {0}")]
    InvalidCompression(String),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to build http client: {0}")]
    HttpClient(String),

    #[error("failed to initialize logging: {0}")]
    Logging(String),
}

/// Errors produced by a single delivery attempt.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("unsupported {pipeline} format: {format}")]
    UnsupportedFormat { pipeline: Pipeline, format: String },

    #[error("failed to serialize {pipeline} batch: {reason}")]
    Serialization { pipeline: Pipeline, reason: String },

    #[error("failed to compress request body: {0}")]
    Compression(std::io::Error),

    #[error("{0}")]
    Transport(String),

    #[error("error during sending data: {0}")]
    DeliveryStatus(String),

    #[error("[{}]", join_errors(.0))]
    Aggregate(Vec<SendError>),
}

fn join_errors(errors: &[SendError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl SendError {
    /// Combines the errors of two split branches. Nested aggregates are flattened so the
    /// message always lists leaf errors in order.
    #[must_use]
    pub fn combine(first: SendError, second: SendError) -> SendError {
        let mut errors = Vec::new();
        for error in [first, second] {
            match error {
                SendError::Aggregate(inner) => errors.extend(inner),
                leaf => errors.push(leaf),
            }
        }
        SendError::Aggregate(errors)
    }
}

/// Records that were not confirmed delivered together with the reason.
#[derive(Debug)]
pub struct DeliveryFailure<R> {
    pub dropped: Vec<R>,
    pub error: SendError,
}

impl<R> fmt::Display for DeliveryFailure<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl<R: fmt::Debug> std::error::Error for DeliveryFailure<R> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.error)
    }
}

impl<R> DeliveryFailure<R> {
    #[must_use]
    pub fn new(dropped: Vec<R>, error: SendError) -> Self {
        Self { dropped, error }
    }

    /// Merges the outcome of two sibling sub-batches, keeping the dropped records in order.
    #[must_use]
    pub fn merge(first: Option<Self>, second: Option<Self>) -> Option<Self> {
        match (first, second) {
            (None, None) => None,
            (Some(failure), None) | (None, Some(failure)) => Some(failure),
            (Some(mut first), Some(second)) => {
                first.dropped.extend(second.dropped);
                Some(Self {
                    dropped: first.dropped,
                    error: SendError::combine(first.error, second.error),
                })
            }
        }
    }
}
