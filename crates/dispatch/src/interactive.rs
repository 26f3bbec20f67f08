use std::time::Duration;

use async_trait::async_trait;
use shared::{
    domain::{CellId, Route},
    protocol::ServerMessage,
};
use tokio::{
    sync::{mpsc, Mutex},
    time::{error::Elapsed, timeout_at, Instant},
};
use tracing::{info, warn};

use crate::sink::{DispatchContext, DispatchError, DispatchOutcome, DispatchSink};

/// Walks the route one cell at a time, waiting for an operator to confirm
/// each cell id on the confirmation channel before reporting it as visited.
pub struct InteractiveSink {
    confirmations: Mutex<mpsc::Receiver<String>>,
    timeout: Option<Duration>,
}

impl InteractiveSink {
    pub fn new(confirmations: mpsc::Receiver<String>, timeout: Option<Duration>) -> Self {
        Self {
            confirmations: Mutex::new(confirmations),
            timeout,
        }
    }
}

enum Confirmation {
    Accepted,
    Cancelled,
    Failed(DispatchError),
}

fn is_confirmation_for(line: &str, cell: CellId) -> bool {
    let line = line.trim();
    !line.is_empty()
        && line.bytes().all(|b| b.is_ascii_digit())
        && line.parse::<u32>().ok() == Some(u32::from(cell.get()))
}

async fn next_line(
    rx: &mut mpsc::Receiver<String>,
    deadline: Option<Instant>,
) -> Result<Option<String>, Elapsed> {
    match deadline {
        Some(deadline) => timeout_at(deadline, rx.recv()).await,
        None => Ok(rx.recv().await),
    }
}

impl InteractiveSink {
    async fn await_confirmation(
        &self,
        rx: &mut mpsc::Receiver<String>,
        cell: CellId,
        ctx: &DispatchContext,
    ) -> Confirmation {
        let deadline = self.timeout.map(|t| Instant::now() + t);
        info!(%cell, "waiting for operator to confirm cell");
        loop {
            let line = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => return Confirmation::Cancelled,
                line = next_line(rx, deadline) => line,
            };
            match line {
                Ok(Some(text)) if is_confirmation_for(&text, cell) => {
                    return Confirmation::Accepted
                }
                Ok(Some(text)) => {
                    warn!(
                        expected = %cell,
                        received = %text.trim(),
                        "confirmation rejected, waiting again"
                    );
                }
                Ok(None) => return Confirmation::Failed(DispatchError::ConfirmationsClosed),
                Err(_) => {
                    return Confirmation::Failed(DispatchError::ConfirmationTimeout {
                        cell,
                        timeout: self.timeout.unwrap_or_default(),
                    })
                }
            }
        }
    }
}

#[async_trait]
impl DispatchSink for InteractiveSink {
    fn name(&self) -> &'static str {
        "interactive"
    }

    async fn drive(&self, route: &Route, ctx: &DispatchContext) -> DispatchOutcome {
        let mut rx = self.confirmations.lock().await;
        let mut stale = 0usize;
        while rx.try_recv().is_ok() {
            stale += 1;
        }
        if stale > 0 {
            warn!(stale, "discarded confirmations typed before the route started");
        }

        for (completed, cell) in route.cells().iter().copied().enumerate() {
            if ctx.cancel.is_cancelled() {
                info!(completed, "traversal stopped before next cell");
                return DispatchOutcome::Cancelled { completed };
            }

            match self.await_confirmation(&mut rx, cell, ctx).await {
                Confirmation::Accepted => {}
                Confirmation::Cancelled => {
                    info!(completed, "traversal stopped while waiting for confirmation");
                    return DispatchOutcome::Cancelled { completed };
                }
                Confirmation::Failed(err) => return DispatchOutcome::Failed(err),
            }

            if ctx.cancel.is_cancelled() {
                return DispatchOutcome::Cancelled { completed };
            }
            if let Err(err) = ctx.emit(ServerMessage::Visited(cell)).await {
                return DispatchOutcome::Failed(err);
            }
            info!(%cell, "cell visited");
        }

        info!(steps = route.len(), "route fully traversed");
        DispatchOutcome::Completed { steps: route.len() }
    }
}

#[cfg(test)]
#[path = "tests/interactive_tests.rs"]
mod tests;
