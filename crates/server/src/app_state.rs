use std::{sync::Arc, time::Duration};

use dispatch::TraversalDispatcher;
use tokio::sync::Mutex;

use crate::session::{SessionOptions, SessionState};

#[derive(Clone)]
pub(crate) struct AppState {
    /// Locked for the whole lifetime of the one connected client.
    pub(crate) session: Arc<Mutex<SessionState>>,
    pub(crate) dispatcher: TraversalDispatcher,
    pub(crate) options: SessionOptions,
    /// Ping period for client sockets, `None` when pings are off.
    pub(crate) keepalive: Option<Duration>,
}

impl AppState {
    pub(crate) fn new(dispatcher: TraversalDispatcher, options: SessionOptions) -> Self {
        Self {
            session: Arc::new(Mutex::new(SessionState::default())),
            dispatcher,
            options,
            keepalive: None,
        }
    }

    pub(crate) fn with_keepalive(mut self, keepalive: Option<Duration>) -> Self {
        self.keepalive = keepalive;
        self
    }
}
