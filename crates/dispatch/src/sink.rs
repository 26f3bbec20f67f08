use std::time::Duration;

use async_trait::async_trait;
use shared::{
    domain::{CellId, Route},
    error::{ApiError, ErrorCode},
    protocol::ServerMessage,
};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::cancel::CancelToken;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("device write failed: {0}")]
    Transport(#[from] std::io::Error),
    #[error("no confirmation for cell {cell} within {timeout:?}")]
    ConfirmationTimeout { cell: CellId, timeout: Duration },
    #[error("confirmation source closed")]
    ConfirmationsClosed,
    #[error("client connection closed")]
    ClientGone,
}

impl DispatchError {
    /// Envelope for the client, or `None` when there is no client left to tell.
    pub fn to_api_error(&self) -> Option<ApiError> {
        let code = match self {
            DispatchError::Transport(_) => ErrorCode::Transport,
            DispatchError::ConfirmationTimeout { .. } => ErrorCode::ConfirmationTimeout,
            DispatchError::ConfirmationsClosed => ErrorCode::Internal,
            DispatchError::ClientGone => return None,
        };
        Some(ApiError::new(code, self.to_string()))
    }
}

#[derive(Debug)]
pub enum DispatchOutcome {
    Completed { steps: usize },
    /// Stopped cooperatively after `completed` visible steps.
    Cancelled { completed: usize },
    /// The task did not acknowledge cancellation in time and was torn down.
    Aborted,
    Failed(DispatchError),
}

/// Per-dispatch handles passed to a sink.
pub struct DispatchContext {
    pub cancel: CancelToken,
    pub events: mpsc::Sender<ServerMessage>,
}

impl DispatchContext {
    pub async fn emit(&self, message: ServerMessage) -> Result<(), DispatchError> {
        self.events
            .send(message)
            .await
            .map_err(|_| DispatchError::ClientGone)
    }
}

#[async_trait]
pub trait DispatchSink: Send + Sync {
    fn name(&self) -> &'static str;

    /// Must check `ctx.cancel` before every externally visible unit of work.
    async fn drive(&self, route: &Route, ctx: &DispatchContext) -> DispatchOutcome;
}
