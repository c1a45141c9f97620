// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Sumo Logic exporter
//!
//! Batching, formatting and delivery of logs, metrics and traces to a Sumo Logic HTTP receiver.
//!
//! ## Architecture
//!
//! - [`translate`]: rewrites well-known attribute names into Sumo Logic metadata keys
//! - [`fields`]: selects the routing metadata sent as `X-Sumo-Fields`
//! - [`source_format`]: `%{attribute}` templates for source name, category and host
//! - [`format`]: text, JSON, Prometheus, Carbon 2.0, Graphite and OTLP (logs, metrics, traces)
//!   serializers
//! - [`compression`]: gzip, deflate and zstd request bodies
//! - [`buffer`]: bounded per-pipeline record buffers
//! - [`sender`]: request splitting and delivery with exact accounting of dropped records
//! - [`exporter`]: the entry point tying the pieces together
//!
//! ## Example
//!
//! ```rust,ignore
//! use sumologic_exporter::{config::Config, exporter::Exporter, record::LogRecord};
//!
//! let exporter = Exporter::new(&Config::from_env()?)?;
//! if let Err(failure) = exporter.consume_logs(vec![LogRecord::new("hello")]).await {
//!     // hand failure.dropped back to the retry queue
//! }
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod buffer;
pub mod compression;
pub mod config;
pub mod errors;
pub mod exporter;
pub mod fields;
pub mod format;
pub mod logger;
pub mod record;
pub mod sender;
pub mod source_format;
pub mod translate;
