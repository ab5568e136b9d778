//! Optional detail enrichment.
//!
//! Detail views pull in extras (build status, review state, comment counts)
//! with separate remote calls. Each extra is a step keyed by the metadata
//! entry it fills; a failing step leaves its key out and never fails the
//! detail as a whole.

use std::future::Future;
use std::pin::Pin;

use crate::source::{AdapterResult, ItemDetail};

type EnrichmentStep<'a> = Pin<Box<dyn Future<Output = AdapterResult<String>> + Send + 'a>>;

#[derive(Default)]
pub struct Enrichment<'a> {
    steps: Vec<(&'static str, EnrichmentStep<'a>)>,
}

impl<'a> Enrichment<'a> {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn step(
        mut self,
        metadata_key: &'static str,
        operation: impl Future<Output = AdapterResult<String>> + Send + 'a,
    ) -> Self {
        self.steps.push((metadata_key, Box::pin(operation)));
        self
    }

    /// Runs the steps in order and returns how many filled their key.
    pub async fn apply(self, detail: &mut ItemDetail) -> usize {
        let mut applied = 0;
        for (key, operation) in self.steps {
            if let Some(value) = best_effort(key, operation).await {
                detail.metadata.insert(key.to_string(), value);
                applied += 1;
            }
        }
        applied
    }
}

/// Awaits `operation`, turning a failure into `None`.
pub async fn best_effort<T>(
    label: &str,
    operation: impl Future<Output = AdapterResult<T>>,
) -> Option<T> {
    match operation.await {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::debug!(
                step = label,
                kind = ?error.kind,
                message = %error.message,
                "skipping optional detail enrichment"
            );
            None
        }
    }
}
