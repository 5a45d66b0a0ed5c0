//! Shared helpers for integration tests.

pub mod collector;
pub mod recording_transport;

#[allow(unused_imports)]
pub use collector::{Collector, closed_port, decode_frames};
#[allow(unused_imports)]
pub use recording_transport::RecordingTransport;
