use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    sync::mpsc,
};
use tracing::{info, warn};

const CONSOLE_QUEUE: usize = 32;

/// Forwards operator input lines to the interactive sink.
pub(crate) fn spawn_line_feeder<R>(reader: R) -> mpsc::Receiver<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(CONSOLE_QUEUE);
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    info!("console input closed");
                    break;
                }
                Err(error) => {
                    warn!(%error, "failed to read console input");
                    break;
                }
            }
        }
    });
    rx
}
