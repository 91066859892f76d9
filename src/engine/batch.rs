//! Batch execution
//!
//! Runs several requests one after the other. Each item is independent: a
//! failure is recorded for that item and the batch carries on. Items run
//! sequentially because several of them may touch the same container.

use log::{error, warn};

use super::orchestrator::Engine;
use super::{OperationRequest, Outcome};
use crate::error::Result;

/// One request and what became of it.
#[derive(Debug)]
pub struct BatchItem {
    pub request: OperationRequest,
    pub result: Result<Outcome>,
}

/// Counts over a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub applied: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Failures that left files needing manual inspection
    pub partial: usize,
}

impl BatchSummary {
    pub fn from_items(items: &[BatchItem]) -> Self {
        let mut summary = Self::default();
        for item in items {
            match &item.result {
                Ok(Outcome::Applied(_)) => summary.applied += 1,
                Ok(Outcome::Unchanged { .. }) => summary.unchanged += 1,
                Ok(Outcome::Skipped { .. }) => summary.skipped += 1,
                Err(e) => {
                    summary.failed += 1;
                    if e.is_partial() {
                        summary.partial += 1;
                    }
                }
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.applied + self.unchanged + self.skipped + self.failed
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Run every request, calling `on_item` as each one finishes.
pub fn run<F>(engine: &Engine, requests: Vec<OperationRequest>, mut on_item: F) -> Vec<BatchItem>
where
    F: FnMut(&BatchItem),
{
    let mut items = Vec::with_capacity(requests.len());
    for request in requests {
        let result = engine.execute(&request);
        if let Err(e) = &result {
            if e.is_partial() {
                error!("{} '{}': {}", request.operation.kind(), request.target, e);
            } else {
                warn!("{} '{}' failed: {}", request.operation.kind(), request.target, e);
            }
        }
        let item = BatchItem { request, result };
        on_item(&item);
        items.push(item);
    }
    items
}
