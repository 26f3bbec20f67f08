use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::{CellId, CellType, Route},
    error::ApiError,
};

pub const RESET_NOTICE: &str = "Board reset for retry";
pub const CAPACITY_NOTICE: &str = "Server only allows 1 client!";

/// Sparse board overwrite carried by a `start` command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardUpdate {
    pub squares: Vec<(CellId, CellType)>,
    /// Raw `key=value` text of entries that could not be interpreted.
    pub rejected: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Start(BoardUpdate),
    Retry,
    /// Anything else, including text that is not JSON at all.
    Other(String),
}

impl ClientCommand {
    pub fn parse(text: &str) -> Self {
        let Ok(Value::Object(payload)) = serde_json::from_str::<Value>(text) else {
            return Self::Other(text.to_string());
        };

        match payload.get("action").and_then(Value::as_str) {
            Some("start") => Self::Start(parse_squares(payload.get("squares"))),
            Some("retry") => Self::Retry,
            _ => Self::Other(text.to_string()),
        }
    }
}

fn parse_squares(raw: Option<&Value>) -> BoardUpdate {
    let mut update = BoardUpdate::default();
    let entries = match raw {
        None | Some(Value::Null) => return update,
        Some(Value::Object(entries)) => entries,
        Some(other) => {
            update.rejected.push(format!("squares={other}"));
            return update;
        }
    };

    for (key, value) in entries {
        let cell = key.parse::<CellId>().ok();
        let kind = value.as_str().and_then(|name| name.parse::<CellType>().ok());
        match (cell, kind) {
            (Some(cell), Some(kind)) => update.squares.push((cell, kind)),
            _ => update.rejected.push(format!("{key}={value}")),
        }
    }
    update
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerMessage {
    Visited(CellId),
    FullPath(Route),
    ServerMsg(String),
    Error(ApiError),
}

impl ServerMessage {
    pub fn reset_notice() -> Self {
        Self::ServerMsg(RESET_NOTICE.to_string())
    }

    pub fn echo(text: impl Into<String>) -> Self {
        Self::ServerMsg(text.into())
    }
}
