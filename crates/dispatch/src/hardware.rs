use std::{io, path::PathBuf};

use async_trait::async_trait;
use shared::{domain::Route, protocol::ServerMessage};
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex};
use tracing::{debug, error, info};

use crate::{
    packet,
    sink::{DispatchContext, DispatchError, DispatchOutcome, DispatchSink},
};

#[async_trait]
pub trait FrameWriter: Send {
    async fn write_frame(&mut self, frame: &[u8]) -> io::Result<()>;
}

/// Serial device opened as a character file. Line settings (115200 8N1) are
/// applied to the device outside the process.
pub struct DeviceWriter {
    path: PathBuf,
    file: Option<tokio::fs::File>,
}

impl DeviceWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    async fn file(&mut self) -> io::Result<&mut tokio::fs::File> {
        if self.file.is_none() {
            let file = OpenOptions::new().write(true).open(&self.path).await?;
            info!(device = %self.path.display(), "serial device opened");
            self.file = Some(file);
        }
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "device not open"))
    }

    async fn try_write(&mut self, frame: &[u8]) -> io::Result<()> {
        let file = self.file().await?;
        file.write_all(frame).await?;
        file.flush().await
    }
}

#[async_trait]
impl FrameWriter for DeviceWriter {
    async fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        let result = self.try_write(frame).await;
        if result.is_err() {
            self.file = None;
        }
        result
    }
}

/// Sends the whole route as a single [`packet`] frame and reports it to the
/// client as one `full_path` event.
pub struct HardwareSink<W> {
    writer: Mutex<W>,
}

impl<W: FrameWriter> HardwareSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

#[async_trait]
impl<W: FrameWriter + 'static> DispatchSink for HardwareSink<W> {
    fn name(&self) -> &'static str {
        "hardware"
    }

    async fn drive(&self, route: &Route, ctx: &DispatchContext) -> DispatchOutcome {
        if ctx.cancel.is_cancelled() {
            return DispatchOutcome::Cancelled { completed: 0 };
        }

        let frame = packet::encode(route);
        {
            let mut writer = self.writer.lock().await;
            if ctx.cancel.is_cancelled() {
                return DispatchOutcome::Cancelled { completed: 0 };
            }
            if let Err(err) = writer.write_frame(frame.as_bytes()).await {
                error!(%err, %route, "failed to write route frame to device");
                return DispatchOutcome::Failed(DispatchError::Transport(err));
            }
        }
        debug!(bytes = ?frame.as_bytes(), "route frame written");
        info!(%route, checksum = frame.checksum(), "route sent to device");

        if let Err(err) = ctx.emit(ServerMessage::FullPath(route.clone())).await {
            return DispatchOutcome::Failed(err);
        }
        DispatchOutcome::Completed { steps: route.len() }
    }
}

#[cfg(test)]
#[path = "tests/hardware_tests.rs"]
mod tests;
