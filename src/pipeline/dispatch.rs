//! Bounded concurrent dispatch of one remote call per unit
//!
//! Every unit in a chunk gets its own task; a semaphore caps how many of
//! them are talking to the service at once. Results come back in completion
//! order and are slotted by request id, so arrival order never matters.

use super::types::{CallOutcome, RawResult, Unit};
use crate::client::{ClassificationRequest, Classifier, PromptBuilder};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

pub struct Dispatcher {
    classifier: Arc<dyn Classifier>,
    prompt: PromptBuilder,
    max_workers: usize,
}

impl Dispatcher {
    pub fn new(classifier: Arc<dyn Classifier>, prompt: PromptBuilder, max_workers: usize) -> Self {
        Self {
            classifier,
            prompt,
            max_workers: max_workers.max(1),
        }
    }

    /// Sends one call per unit and waits for all of them.
    ///
    /// `first_request_id` is the run-wide id of `units[0]`; unit `i` gets
    /// `first_request_id + i`. The returned results are in request-id order.
    /// Call failures become [`CallOutcome::Failure`] and never cancel
    /// sibling calls.
    pub async fn dispatch(&self, units: &[Unit], first_request_id: usize) -> Vec<RawResult> {
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut in_flight = FuturesUnordered::new();

        debug!(
            "Dispatching {} requests (max parallel: {})",
            units.len(),
            self.max_workers
        );

        for (slot, unit) in units.iter().enumerate() {
            let request = self.prompt.request(first_request_id + slot, unit);
            let classifier = Arc::clone(&self.classifier);
            let semaphore = Arc::clone(&semaphore);

            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return CallOutcome::Failure(format!("worker pool closed: {e}")),
                };
                call(classifier.as_ref(), request).await
            });

            in_flight.push(async move { (slot, handle.await) });
        }

        let mut slots: Vec<Option<CallOutcome>> = vec![None; units.len()];
        while let Some((slot, joined)) = in_flight.next().await {
            let outcome = joined.unwrap_or_else(|e| {
                warn!("Request task panicked: {}", e);
                CallOutcome::Failure(format!("request task panicked: {e}"))
            });
            slots[slot] = Some(outcome);
        }

        units
            .iter()
            .zip(slots)
            .enumerate()
            .map(|(slot, (unit, outcome))| RawResult {
                request_id: first_request_id + slot,
                unit_id: unit.unit_id.clone(),
                outcome: outcome
                    .unwrap_or_else(|| CallOutcome::Failure("request produced no result".into())),
            })
            .collect()
    }
}

async fn call(classifier: &dyn Classifier, request: ClassificationRequest) -> CallOutcome {
    let request_id = request.request_id;
    match classifier.classify(request).await {
        Ok(response) => {
            info!("Request {} completed successfully.", request_id);
            CallOutcome::Success(response)
        }
        Err(e) => {
            warn!("Request {} failed with error: {}", request_id, e);
            CallOutcome::Failure(e.to_string())
        }
    }
}
