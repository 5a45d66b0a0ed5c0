//! A one-connection TCP collector standing in for a Fluentd forward input.

#![allow(dead_code)]

use std::{
    io::{Cursor, Read},
    net::TcpListener,
    thread::{self, JoinHandle},
};

use serde::de::DeserializeOwned;

/// Accepts a single connection and captures everything written to it until
/// the peer closes.
pub struct Collector {
    port: u16,
    handle: JoinHandle<Vec<u8>>,
}

impl Collector {
    pub fn start() -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind collector");
        let port = listener.local_addr().expect("collector addr").port();
        let handle = thread::spawn(move || {
            let (mut socket, _) = listener.accept().expect("accept sender");
            let mut received = Vec::new();
            socket
                .read_to_end(&mut received)
                .expect("read from sender");
            received
        });
        Self { port, handle }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Wait for the sender to disconnect and return the captured bytes.
    pub fn received(self) -> Vec<u8> {
        self.handle.join().expect("collector thread panicked")
    }
}

/// A localhost port with nothing listening on it.
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral port");
    listener.local_addr().expect("ephemeral port addr").port()
}

/// Decode back-to-back MessagePack values from `bytes`.
pub fn decode_frames<T: DeserializeOwned>(bytes: &[u8]) -> Vec<T> {
    let mut cursor = Cursor::new(bytes);
    let mut frames = Vec::new();
    while (cursor.position() as usize) < bytes.len() {
        frames.push(rmp_serde::from_read(&mut cursor).expect("decode frame"));
    }
    frames
}
