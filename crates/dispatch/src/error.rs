use std::any::Any;
use std::fmt;

use worldspace_common::EntityId;

use crate::model::ThreadingModel;

/// The dispatch entry point a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    RunNow,
    RunAsync,
    RunRepeating,
    RunDelayed,
    RunAtLocation,
    RunOnEntity,
    CallAndAwait,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::RunNow => "run-now",
            Operation::RunAsync => "run-async",
            Operation::RunRepeating => "run-repeating",
            Operation::RunDelayed => "run-delayed",
            Operation::RunAtLocation => "run-at-location",
            Operation::RunOnEntity => "run-on-entity",
            Operation::CallAndAwait => "call-and-await",
        })
    }
}

/// The marker lookup itself failed. Never escapes detection.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProbeError {
    #[error("marker lookup failed: {0}")]
    Lookup(String),
}

/// A region-scheduler capability could not be reached or refused the call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    #[error("host does not expose `{0}`")]
    Missing(&'static str),
    #[error("`{capability}` rejected the call: {reason}")]
    Rejected {
        capability: &'static str,
        reason: String,
    },
    #[error("scheduler target was removed")]
    TargetRemoved,
}

/// A native task handle could not answer a query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandleError {
    #[error("handle does not support `{0}`")]
    Unsupported(&'static str),
    #[error("handle query failed: {0}")]
    Query(String),
}

/// Failure of the caller-supplied work itself.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("task panicked: {0}")]
    Panicked(String),
    #[error(transparent)]
    Failed(anyhow::Error),
    #[error("task was dropped before it produced a result")]
    Abandoned,
}

impl TaskError {
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        TaskError::Panicked(message)
    }
}

/// Fatal scheduling failure surfaced to the caller. Not retried.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("failed to schedule {operation} on the region scheduler")]
    Bind {
        operation: Operation,
        #[source]
        source: BindError,
    },
    #[error("could not resolve the regionized schedulers")]
    Resolve(#[source] BindError),
    #[error("host supplied no scheduler for the {0} model")]
    BackendUnavailable(ThreadingModel),
    #[error("entity {0} was retired before the task could be scheduled")]
    EntityRetired(EntityId),
    #[error("could not start a fallback worker")]
    Executor(#[source] std::io::Error),
    #[error("async task failed on the fallback executor")]
    AsyncTask(#[source] TaskError),
}

impl DispatchError {
    pub(crate) fn bind(operation: Operation) -> impl FnOnce(BindError) -> Self {
        move |source| DispatchError::Bind { operation, source }
    }
}
