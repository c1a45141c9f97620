// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded in-memory accumulator for one pipeline.
//!
//! Records are appended until the buffer reaches its capacity. The append that finds the buffer
//! full first hands the whole content to a [`Flush`] implementation, so the buffer never grows
//! past `capacity`:
//!
//! ```text
//!   append(r) ──► len < capacity ? ──yes──► push(r)
//!                        │
//!                        no
//!                        ▼
//!                 flush(take all) ──ok──► push(r)
//!                        │
//!                       err ──► return failure and r, r is not buffered
//! ```
//!
//! The lock is held across that implicit flush, so concurrent appends wait for it instead of
//! interleaving with it.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::errors::DeliveryFailure;

/// Delivers a drained batch.
#[async_trait]
pub trait Flush<R: Send>: Send + Sync {
    async fn flush(&self, records: Vec<R>) -> Result<(), DeliveryFailure<R>>;
}

/// Outcome of an [`RecordBuffer::append`] whose implicit flush failed.
#[derive(Debug)]
pub struct Rejected<R> {
    /// Failure of the flushed content.
    pub failure: DeliveryFailure<R>,
    /// The record that was being appended. It was neither buffered nor sent.
    pub record: R,
}

impl<R> Rejected<R> {
    /// Folds the rejected record into the failure, after the flushed records.
    #[must_use]
    pub fn into_failure(self) -> DeliveryFailure<R> {
        let mut failure = self.failure;
        failure.dropped.push(self.record);
        failure
    }
}

pub struct RecordBuffer<R> {
    records: Mutex<Vec<R>>,
    capacity: usize,
}

impl<R: Send> RecordBuffer<R> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            capacity,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends `record`, flushing the current content first when the buffer is full.
    ///
    /// When that flush fails the buffer is left empty and `record` is handed back together
    /// with the failure, without being buffered.
    pub async fn append<F>(&self, record: R, flusher: &F) -> Result<(), Rejected<R>>
    where
        F: Flush<R> + ?Sized,
    {
        let mut records = self.records.lock().await;
        if records.len() >= self.capacity {
            let batch = std::mem::take(&mut *records);
            debug!("Buffer full with {} records, flushing", batch.len());
            if let Err(failure) = flusher.flush(batch).await {
                warn!(
                    "Implicit flush failed, dropping {} records: {}",
                    failure.dropped.len(),
                    failure
                );
                return Err(Rejected { failure, record });
            }
        }
        records.push(record);
        Ok(())
    }

    /// Drains the buffer and delivers its content. The buffer is empty afterwards whatever
    /// the outcome.
    pub async fn flush<F>(&self, flusher: &F) -> Result<(), DeliveryFailure<R>>
    where
        F: Flush<R> + ?Sized,
    {
        let mut records = self.records.lock().await;
        if records.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut *records);
        flusher.flush(batch).await
    }

    pub async fn count(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn clear(&self) {
        self.records.lock().await.clear();
    }

    /// Drains the buffer without delivering anything.
    pub async fn take(&self) -> Vec<R> {
        std::mem::take(&mut *self.records.lock().await)
    }
}
