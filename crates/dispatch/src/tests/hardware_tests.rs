use std::sync::{Arc, Mutex as StdMutex};

use shared::domain::CellId;
use tokio::sync::mpsc;

use super::*;
use crate::cancel::{cancel_pair, CancelHandle};

#[derive(Clone, Default)]
struct RecordingWriter {
    frames: Arc<StdMutex<Vec<Vec<u8>>>>,
    fail: bool,
}

#[async_trait]
impl FrameWriter for RecordingWriter {
    async fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
        }
        self.frames.lock().expect("frames").push(frame.to_vec());
        Ok(())
    }
}

fn route(ids: &[u8]) -> Route {
    Route::from(
        ids.iter()
            .map(|id| CellId::new(*id).expect("cell"))
            .collect::<Vec<_>>(),
    )
}

fn context() -> (CancelHandle, DispatchContext, mpsc::Receiver<ServerMessage>) {
    let (cancel, token) = cancel_pair();
    let (events, events_rx) = mpsc::channel(16);
    (
        cancel,
        DispatchContext {
            cancel: token,
            events,
        },
        events_rx,
    )
}

#[tokio::test]
async fn writes_one_frame_then_reports_full_path() {
    let writer = RecordingWriter::default();
    let frames = Arc::clone(&writer.frames);
    let sink = HardwareSink::new(writer);
    let (_cancel, ctx, mut events) = context();

    let outcome = sink.drive(&route(&[1, 4, 7, 10]), &ctx).await;
    assert!(matches!(outcome, DispatchOutcome::Completed { steps: 4 }));

    let frames = frames.lock().expect("frames").clone();
    assert_eq!(frames.len(), 1);
    let payload = packet::decode(&frames[0]).expect("decode");
    assert_eq!(&payload[..4], &[1, 4, 7, 10]);

    assert_eq!(
        events.try_recv().expect("event"),
        ServerMessage::FullPath(route(&[1, 4, 7, 10]))
    );
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn cancelled_dispatch_never_touches_the_device() {
    let writer = RecordingWriter::default();
    let frames = Arc::clone(&writer.frames);
    let sink = HardwareSink::new(writer);
    let (cancel, ctx, mut events) = context();
    cancel.cancel();

    let outcome = sink.drive(&route(&[3, 6, 9, 12]), &ctx).await;
    assert!(matches!(outcome, DispatchOutcome::Cancelled { completed: 0 }));
    assert!(frames.lock().expect("frames").is_empty());
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn write_failure_is_returned_instead_of_full_path() {
    let sink = HardwareSink::new(RecordingWriter {
        fail: true,
        ..Default::default()
    });
    let (_cancel, ctx, mut events) = context();

    let outcome = sink.drive(&route(&[2, 5, 8, 11]), &ctx).await;
    assert!(matches!(
        outcome,
        DispatchOutcome::Failed(DispatchError::Transport(_))
    ));
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn device_writer_appends_frames_to_the_device_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("ttyFAKE0");
    std::fs::write(&path, b"").expect("create device file");

    let mut writer = DeviceWriter::new(&path);
    let first = packet::encode(&route(&[1, 2, 3]));
    let second = packet::encode(&route(&[12, 11, 10]));
    writer.write_frame(first.as_bytes()).await.expect("write");
    writer.write_frame(second.as_bytes()).await.expect("write");

    let written = std::fs::read(&path).expect("read back");
    assert_eq!(written.len(), 2 * packet::FRAME_LEN);
    assert_eq!(&written[..packet::FRAME_LEN], first.as_bytes());
    assert_eq!(&written[packet::FRAME_LEN..], second.as_bytes());
}

#[tokio::test]
async fn device_writer_reports_missing_device() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut writer = DeviceWriter::new(dir.path().join("missing").join("ttyUSB9"));
    let frame = packet::encode(&route(&[1]));
    assert!(writer.write_frame(frame.as_bytes()).await.is_err());
}
