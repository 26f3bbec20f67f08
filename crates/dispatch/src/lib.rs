//! Drives a chosen route to completion through a pluggable sink.
//!
//! Two sinks exist: [`InteractiveSink`] waits for an operator to confirm
//! every cell in order, [`HardwareSink`] frames the whole route with
//! [`packet::encode`] and writes it to a serial device in one go. Both
//! observe the [`CancelToken`] handed to them by [`TraversalDispatcher`].

mod cancel;
mod dispatcher;
mod hardware;
mod interactive;
pub mod packet;
mod sink;

pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use dispatcher::{DispatchHandle, TraversalDispatcher};
pub use hardware::{DeviceWriter, FrameWriter, HardwareSink};
pub use interactive::InteractiveSink;
pub use sink::{DispatchContext, DispatchError, DispatchOutcome, DispatchSink};
