use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::completion::{CompletionRequest, CompletionService};
use crate::error::{LlmError, Result};

/// Process-wide admission gate for generative calls.
///
/// At most `width` calls run at once; the rest wait in arrival order. There is
/// no timeout here, so a hung call holds its slot until the client gives up.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    permits: Arc<Semaphore>,
    width: usize,
}

impl AdmissionGate {
    /// A gate with `width` slots. A width of zero is treated as one.
    pub fn new(width: usize) -> Self {
        let width = width.max(1);
        Self {
            permits: Arc::new(Semaphore::new(width)),
            width,
        }
    }

    /// The single-flight gate.
    pub fn single() -> Self {
        Self::new(1)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `task` once a slot is free.
    pub async fn run<F, T>(&self, task: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| LlmError::GateClosed)?;
        debug!(free = self.permits.available_permits(), "Admission slot acquired");
        Ok(task.await)
    }
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::single()
    }
}

/// Wraps a completion service so every call passes through the gate.
pub struct GatedCompletion<C> {
    inner: C,
    gate: AdmissionGate,
}

impl<C: CompletionService> GatedCompletion<C> {
    pub fn new(inner: C, gate: AdmissionGate) -> Self {
        Self { inner, gate }
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: CompletionService> CompletionService for GatedCompletion<C> {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        self.gate.run(self.inner.complete(request)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct SlowCompletion {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl CompletionService for SlowCompletion {
        async fn complete(&self, _request: CompletionRequest) -> Result<String> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok("done".to_string())
        }
    }

    fn slow() -> SlowCompletion {
        SlowCompletion {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn test_single_gate_serializes_calls() {
        let gated = Arc::new(GatedCompletion::new(slow(), AdmissionGate::single()));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let gated = gated.clone();
            handles.push(tokio::spawn(async move {
                gated.complete(CompletionRequest::text("p")).await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "done");
        }
        assert_eq!(gated.inner().peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wider_gate_allows_parallel_calls() {
        let gated = Arc::new(GatedCompletion::new(slow(), AdmissionGate::new(2)));
        let a = {
            let gated = gated.clone();
            tokio::spawn(async move { gated.complete(CompletionRequest::text("a")).await })
        };
        let b = {
            let gated = gated.clone();
            tokio::spawn(async move { gated.complete(CompletionRequest::text("b")).await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();
        assert!(gated.inner().peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(gated.gate().available(), 2);
    }

    #[test]
    fn test_zero_width_is_single() {
        assert_eq!(AdmissionGate::new(0).width(), 1);
        assert_eq!(AdmissionGate::default().width(), 1);
    }
}
