// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use serde_json::Value;

use super::{Body, Pipeline, CONTENT_TYPE_LOGS};
use crate::errors::SendError;
use crate::fields::Filter;
use crate::record::LogRecord;

/// Key holding the log body in JSON lines.
pub const LOG_KEY: &str = "log";

/// One line per record holding the body's text form.
#[must_use]
pub fn text(records: &[LogRecord]) -> Body {
    let lines: Vec<String> = records.iter().map(|r| r.body.as_string()).collect();
    Body::from_lines(CONTENT_TYPE_LOGS, &lines)
}

/// One JSON object per record: the attributes that are not routing metadata plus the body
/// under [`LOG_KEY`], with keys sorted.
pub fn json(records: &[LogRecord], filter: &Filter) -> Result<Body, SendError> {
    let lines = records
        .iter()
        .map(|record| {
            let mut object: BTreeMap<String, Value> = filter
                .filter_out(&record.attributes)
                .iter()
                .map(|(key, value)| (key.clone(), value.to_json()))
                .collect();
            object.insert(LOG_KEY.to_string(), record.body.to_json());
            serde_json::to_string(&object).map_err(|e| SendError::Serialization {
                pipeline: Pipeline::Logs,
                reason: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Body::from_lines(CONTENT_TYPE_LOGS, &lines))
}
