//! Compensation stack for multi-write operations the store cannot wrap in a
//! single transaction.
//!
//! Each successful write registers an undo action. If a later step fails the
//! caller runs [`Compensations::compensate`], which replays the undo actions
//! newest first. Once the writes that must be atomic have all succeeded the
//! stack is [`committed`](Compensations::commit) and the undo actions are
//! dropped without running.

use futures::future::{BoxFuture, FutureExt};
use metrics::counter;
use std::fmt::Display;
use std::future::Future;
use tracing::{error, info};

type UndoAction = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), String>> + Send>;

pub struct Compensations {
    operation: &'static str,
    steps: Vec<(&'static str, UndoAction)>,
}

/// Result of running the undo actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompensationReport {
    pub attempted: usize,
    pub failed: Vec<&'static str>,
}

impl CompensationReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Describes the failure that triggered the rollback, naming any undo
    /// step that did not apply.
    pub fn annotate(&self, cause: impl Display) -> String {
        if self.is_clean() {
            cause.to_string()
        } else {
            format!("{cause}; rollback incomplete: {} failed", self.failed.join(", "))
        }
    }
}

impl Compensations {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            steps: Vec::new(),
        }
    }

    pub fn register<F, Fut, E>(&mut self, step: &'static str, undo: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + 'static,
    {
        self.steps.push((
            step,
            Box::new(move || undo().map(|r| r.map_err(|e| e.to_string())).boxed()),
        ));
    }

    /// Drops every registered undo action.
    pub fn commit(self) {
        if !self.steps.is_empty() {
            tracing::debug!(
                operation = self.operation,
                discarded = self.steps.len(),
                "compensations committed"
            );
        }
    }

    /// Runs the undo actions newest first. A failing undo is logged and the
    /// remaining ones still run.
    pub async fn compensate(self) -> CompensationReport {
        let attempted = self.steps.len();
        let mut failed = Vec::new();
        for (step, undo) in self.steps.into_iter().rev() {
            match undo().await {
                Ok(()) => info!(operation = self.operation, step, "compensation applied"),
                Err(err) => {
                    failed.push(step);
                    counter!("receiving_compensation_failures_total", 1, "step" => step);
                    error!(
                        operation = self.operation,
                        step,
                        error = %err,
                        "compensation failed; manual cleanup required"
                    );
                }
            }
        }
        counter!("receiving_compensations_total", 1, "operation" => self.operation);
        CompensationReport { attempted, failed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use std::sync::{Arc, Mutex};

    fn recorder() -> Arc<Mutex<Vec<&'static str>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[tokio::test]
    async fn undo_actions_run_newest_first() {
        let log = recorder();
        let mut compensations = Compensations::new("test");
        for step in ["first", "second", "third"] {
            let log = log.clone();
            compensations.register(step, move || async move {
                log.lock().unwrap().push(step);
                Ok::<(), StoreError>(())
            });
        }

        let report = compensations.compensate().await;
        assert_eq!(
            report,
            CompensationReport {
                attempted: 3,
                failed: Vec::new()
            }
        );
        assert_eq!(report.annotate("disk full"), "disk full");
        assert_eq!(*log.lock().unwrap(), vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn a_failing_undo_does_not_stop_the_rest() {
        let log = recorder();
        let mut compensations = Compensations::new("test");
        let first = log.clone();
        compensations.register("first", move || async move {
            first.lock().unwrap().push("first");
            Ok::<(), StoreError>(())
        });
        compensations.register("broken", || async {
            Err(StoreError::Backend("connection reset".into()))
        });

        let report = compensations.compensate().await;
        assert!(!report.is_clean());
        assert_eq!(report.failed, vec!["broken"]);
        assert_eq!(
            report.annotate("disk full"),
            "disk full; rollback incomplete: broken failed"
        );
        assert_eq!(*log.lock().unwrap(), vec!["first"]);
    }

    #[tokio::test]
    async fn committed_actions_never_run() {
        let log = recorder();
        let mut compensations = Compensations::new("test");
        let inner = log.clone();
        compensations.register("only", move || async move {
            inner.lock().unwrap().push("only");
            Ok::<(), StoreError>(())
        });
        compensations.commit();
        tokio::task::yield_now().await;
        assert!(log.lock().unwrap().is_empty());
    }
}
