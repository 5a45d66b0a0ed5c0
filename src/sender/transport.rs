//! Transport primitives for the sender.
//!
//! A transport receives fully framed entries and moves them to the collector.
//! It never inspects the bytes it is given.

use std::{
    io::{self, Write},
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

use super::config::SenderConfig;

/// Destination for framed entries.
pub trait Transport: Send {
    /// Establish the underlying connection ahead of the first send.
    fn connect(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Deliver one complete frame.
    fn send_bytes(&mut self, frame: &[u8]) -> io::Result<()>;

    /// Push out anything the transport buffers. The default does nothing.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Release the connection. Later sends may reconnect.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// TCP transport that connects on first use.
///
/// A failed write drops the connection so that the next frame starts from a
/// fresh socket. Nothing is retried or buffered.
#[derive(Debug)]
pub struct TcpTransport {
    host: String,
    port: u16,
    connect_timeout: Option<Duration>,
    write_timeout: Duration,
    stream: Option<TcpStream>,
}

impl TcpTransport {
    /// Transport for `config`'s endpoint. No connection is opened yet.
    pub fn new(config: &SenderConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            connect_timeout: config.connect_timeout,
            write_timeout: config.write_timeout,
            stream: None,
        }
    }

    /// Whether a socket is currently open.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn socket_addrs(&self) -> io::Result<Vec<SocketAddr>> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map(|iter| iter.collect())
    }

    fn connect_tcp(&self) -> io::Result<TcpStream> {
        let addrs = self.socket_addrs()?;
        let Some(timeout) = self.connect_timeout else {
            return TcpStream::connect(addrs.as_slice());
        };
        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => return Ok(stream),
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no addresses resolved for {}:{}", self.host, self.port),
            )
        }))
    }

    fn stream(&mut self) -> io::Result<&mut TcpStream> {
        if self.stream.is_none() {
            let stream = self.connect_tcp()?;
            stream.set_write_timeout(Some(self.write_timeout))?;
            stream.set_nodelay(true)?;
            log::debug!("connected to fluentd at {}:{}", self.host, self.port);
            self.stream = Some(stream);
        }
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self) -> io::Result<()> {
        self.stream().map(|_| ())
    }

    fn send_bytes(&mut self, frame: &[u8]) -> io::Result<()> {
        let stream = self.stream()?;
        let result = stream.write_all(frame).and_then(|()| stream.flush());
        if result.is_err() {
            self.stream = None;
        }
        result
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.stream.as_mut() {
            Some(stream) => stream.flush(),
            None => Ok(()),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };
        match stream.shutdown(Shutdown::Both) {
            Err(err) if err.kind() != io::ErrorKind::NotConnected => Err(err),
            _ => Ok(()),
        }
    }
}
