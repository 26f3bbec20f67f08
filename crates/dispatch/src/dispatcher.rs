use std::{sync::Arc, time::Duration};

use shared::{domain::Route, protocol::ServerMessage};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};

use crate::{
    cancel::{cancel_pair, CancelHandle},
    sink::{DispatchContext, DispatchOutcome, DispatchSink},
};

/// Launches one background task per route on a shared sink.
#[derive(Clone)]
pub struct TraversalDispatcher {
    sink: Arc<dyn DispatchSink>,
}

impl TraversalDispatcher {
    pub fn new(sink: Arc<dyn DispatchSink>) -> Self {
        Self { sink }
    }

    pub fn sink_name(&self) -> &'static str {
        self.sink.name()
    }

    pub fn launch(&self, route: Route, events: mpsc::Sender<ServerMessage>) -> DispatchHandle {
        let (cancel, token) = cancel_pair();
        let sink = Arc::clone(&self.sink);
        let task = tokio::spawn(async move {
            let ctx = DispatchContext {
                cancel: token,
                events,
            };
            info!(sink = sink.name(), %route, "dispatch started");
            let outcome = sink.drive(&route, &ctx).await;
            if let DispatchOutcome::Failed(err) = &outcome {
                warn!(sink = sink.name(), %err, "dispatch failed");
                if let Some(api_error) = err.to_api_error() {
                    let _ = ctx.emit(ServerMessage::Error(api_error)).await;
                }
            }
            outcome
        });
        DispatchHandle { cancel, task }
    }
}

/// Owner's side of a running dispatch.
pub struct DispatchHandle {
    cancel: CancelHandle,
    task: JoinHandle<DispatchOutcome>,
}

impl DispatchHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signals cancellation and waits up to `grace` for the task to finish.
    /// A task that overruns is aborted; either way it has stopped on return.
    pub async fn stop(self, grace: Duration) -> DispatchOutcome {
        self.cancel.cancel();
        let mut task = self.task;
        match tokio::time::timeout(grace, &mut task).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_err)) => {
                warn!(%join_err, "dispatch task ended abnormally");
                DispatchOutcome::Aborted
            }
            Err(_) => {
                warn!(
                    grace_ms = grace.as_millis() as u64,
                    "dispatch did not acknowledge cancellation in time; aborting"
                );
                task.abort();
                let _ = task.await;
                DispatchOutcome::Aborted
            }
        }
    }

    /// Waits for the dispatch to end on its own.
    #[cfg(test)]
    pub(crate) async fn join(self) -> DispatchOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(join_err) => {
                warn!(%join_err, "dispatch task ended abnormally");
                DispatchOutcome::Aborted
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
