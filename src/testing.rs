//! Scripted evaluator shared by the orchestrator and revision tests.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::evaluator::{EvaluationRequest, Evaluator, EvaluatorError};
use crate::state_machine::CancelHandle;

type Respond = Box<dyn Fn(&EvaluationRequest) -> Result<String, EvaluatorError> + Send + Sync>;

/// Answers every request through `respond` and records what it was asked.
pub(crate) struct ScriptedEvaluator {
    respond: Respond,
    calls: Mutex<Vec<EvaluationRequest>>,
    cancel_on: Option<(usize, CancelHandle)>,
    delay: Option<Duration>,
}

impl ScriptedEvaluator {
    pub(crate) fn new(
        respond: impl Fn(&EvaluationRequest) -> Result<String, EvaluatorError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
            cancel_on: None,
            delay: None,
        })
    }

    /// Like [`ScriptedEvaluator::new`], but trips `handle` while serving call
    /// number `call` (1-based), as a caller cancelling mid-run would.
    pub(crate) fn cancelling(
        respond: impl Fn(&EvaluationRequest) -> Result<String, EvaluatorError> + Send + Sync + 'static,
        call: usize,
        handle: CancelHandle,
    ) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
            cancel_on: Some((call, handle)),
            delay: None,
        })
    }

    /// Like [`ScriptedEvaluator::new`], but every call takes `delay` to answer.
    pub(crate) fn slow(
        respond: impl Fn(&EvaluationRequest) -> Result<String, EvaluatorError> + Send + Sync + 'static,
        delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
            cancel_on: None,
            delay: Some(delay),
        })
    }

    /// Wait until at least `n` calls have been made.
    pub(crate) async fn wait_for_calls(&self, n: usize) {
        while self.calls.lock().len() < n {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    pub(crate) fn calls(&self) -> Vec<EvaluationRequest> {
        self.calls.lock().clone()
    }

    /// Document of every initial-grading call, in call order.
    pub(crate) fn documents(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|request| match request {
                EvaluationRequest::Initial { document, .. } => Some(document.clone()),
                EvaluationRequest::Revision { .. } => None,
            })
            .collect()
    }
}

impl Evaluator for ScriptedEvaluator {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<String, EvaluatorError> {
        let call = {
            let mut calls = self.calls.lock();
            calls.push(request.clone());
            calls.len()
        };
        if let Some((at, handle)) = &self.cancel_on {
            if *at == call {
                handle.cancel();
            }
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.respond)(request)
    }
}

pub(crate) fn failure() -> EvaluatorError {
    EvaluatorError::Status {
        status: 500,
        message: "evaluator unavailable".into(),
    }
}
