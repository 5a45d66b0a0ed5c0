//! In-memory transport capturing frames for inspection.

#![allow(dead_code)]

use std::{
    io,
    sync::{Arc, Mutex},
};

use fluentd_client::Transport;

/// Records every frame it is given. Clones share the same storage.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl RecordingTransport {
    /// Frames received so far, in arrival order.
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.frames
            .lock()
            .expect("RecordingTransport mutex poisoned")
            .clone()
    }
}

impl Transport for RecordingTransport {
    fn send_bytes(&mut self, frame: &[u8]) -> io::Result<()> {
        self.frames
            .lock()
            .expect("RecordingTransport mutex poisoned")
            .push(frame.to_vec());
        Ok(())
    }
}
