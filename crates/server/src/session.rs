use std::time::Duration;

use dispatch::{DispatchHandle, DispatchOutcome, TraversalDispatcher};
use routing::{Board, PathFinder};
use shared::{
    domain::CellType,
    error::{ApiError, ErrorCode},
    protocol::{BoardUpdate, ClientCommand, ServerMessage},
};
use thiserror::Error;
use tokio::sync::{mpsc, OwnedMutexGuard};
use tracing::{info, warn};

use crate::app_state::AppState;

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub min_real: usize,
    pub cancel_grace: Duration,
}

/// State that outlives individual connections: the board, and the dispatch
/// launched by whichever client currently holds the slot.
#[derive(Default)]
pub(crate) struct SessionState {
    pub(crate) board: Board,
    dispatch: Option<DispatchHandle>,
}

#[derive(Debug, Error)]
#[error("session slot is held by another client")]
pub(crate) struct SlotTaken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionPhase {
    Connected,
    Dispatching,
}

/// One attached client. Holding a controller means holding the session slot;
/// dropping it or calling [`SessionController::disconnect`] frees the slot.
pub(crate) struct SessionController {
    state: OwnedMutexGuard<SessionState>,
    dispatcher: TraversalDispatcher,
    options: SessionOptions,
    outbound: mpsc::Sender<ServerMessage>,
}

impl SessionController {
    pub(crate) fn attach(
        app: &AppState,
        outbound: mpsc::Sender<ServerMessage>,
    ) -> Result<Self, SlotTaken> {
        let state = app
            .session
            .clone()
            .try_lock_owned()
            .map_err(|_| SlotTaken)?;
        Ok(Self {
            state,
            dispatcher: app.dispatcher.clone(),
            options: app.options,
            outbound,
        })
    }

    pub(crate) fn board(&self) -> &Board {
        &self.state.board
    }

    pub(crate) fn phase(&self) -> SessionPhase {
        match &self.state.dispatch {
            Some(handle) if !handle.is_finished() => SessionPhase::Dispatching,
            _ => SessionPhase::Connected,
        }
    }

    pub(crate) async fn handle_text(&mut self, text: &str) {
        match ClientCommand::parse(text) {
            ClientCommand::Start(update) => self.start(update).await,
            ClientCommand::Retry => self.retry().await,
            ClientCommand::Other(raw) => self.send(ServerMessage::echo(raw)).await,
        }
    }

    pub(crate) async fn start(&mut self, update: BoardUpdate) {
        self.stop_dispatch().await;

        if !update.rejected.is_empty() {
            warn!(rejected = ?update.rejected, "ignoring malformed squares in start");
        }
        self.state.board.merge(update.squares);
        info!(
            board = %self.state.board,
            real = self.state.board.count(CellType::Real),
            "board after start"
        );

        let best = PathFinder::new(&self.state.board, self.options.min_real).best_route();
        let Some(best) = best else {
            warn!(min_real = self.options.min_real, "no valid route for current board");
            self.send(ServerMessage::Error(ApiError::new(
                ErrorCode::NoRoute,
                format!(
                    "no route covers at least {} Real cells",
                    self.options.min_real
                ),
            )))
            .await;
            return;
        };

        info!(route = %best.route, real_count = best.real_count, "route selected");
        let handle = self.dispatcher.launch(best.route, self.outbound.clone());
        self.state.dispatch = Some(handle);
    }

    pub(crate) async fn retry(&mut self) {
        self.stop_dispatch().await;
        self.state.board.reset();
        info!("board reset for retry");
        self.send(ServerMessage::reset_notice()).await;
    }

    pub(crate) async fn disconnect(mut self) {
        self.stop_dispatch().await;
    }

    async fn stop_dispatch(&mut self) {
        let Some(handle) = self.state.dispatch.take() else {
            return;
        };
        match handle.stop(self.options.cancel_grace).await {
            DispatchOutcome::Completed { steps } => info!(steps, "previous dispatch had completed"),
            DispatchOutcome::Cancelled { completed } => {
                info!(completed, "previous dispatch stopped")
            }
            DispatchOutcome::Aborted => warn!("previous dispatch aborted"),
            DispatchOutcome::Failed(err) => info!(%err, "previous dispatch had failed"),
        }
    }

    async fn send(&self, message: ServerMessage) {
        let _ = self.outbound.send(message).await;
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
