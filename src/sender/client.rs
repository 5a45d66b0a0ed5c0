//! The client that frames entries and hands them to a transport.

use std::{fmt, io, sync::Arc};

use chrono::{DateTime, TimeZone};
use parking_lot::Mutex;
use serde::Serialize;

use crate::{
    entry::{Entry, EntryFramer},
    error::SendError,
    value::DynamicValue,
};

use super::{
    builder::SenderBuilder,
    config::SenderConfig,
    transport::{TcpTransport, Transport},
};

/// Callback receiving transport failures in place of the caller.
pub type ErrorHandler = Arc<dyn Fn(&io::Error) + Send + Sync>;

/// Sends `[tag, time, record]` entries to a Fluentd collector.
///
/// Encoding failures are always returned to the caller. Transport failures go
/// to the error handler when one is installed, and the call then reports
/// success; otherwise they are returned as [`SendError::Io`].
///
/// Access to the transport is serialised, so a sender can be shared between
/// threads behind an `Arc`.
pub struct FluentSender<T: Transport = TcpTransport> {
    framer: EntryFramer,
    transport: Mutex<Option<T>>,
    error_handler: Option<ErrorHandler>,
}

impl FluentSender<TcpTransport> {
    /// Start configuring a TCP sender; see [`SenderBuilder`].
    pub fn builder() -> SenderBuilder {
        SenderBuilder::new()
    }

    /// Sender for an already validated configuration.
    pub fn with_config(config: SenderConfig) -> Self {
        let transport = TcpTransport::new(&config);
        Self::with_transport(transport, EntryFramer::new(config.encoder))
    }
}

impl<T: Transport> FluentSender<T> {
    /// Sender over any [`Transport`], framing entries with `framer`.
    pub fn with_transport(transport: T, framer: EntryFramer) -> Self {
        Self {
            framer,
            transport: Mutex::new(Some(transport)),
            error_handler: None,
        }
    }

    /// Route transport failures to `handler` instead of returning them.
    pub fn with_error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// The framer used for every entry.
    pub fn framer(&self) -> &EntryFramer {
        &self.framer
    }

    /// Open the connection now rather than on the first send.
    pub fn connect(&self) -> Result<(), SendError> {
        let result = self.with_open_transport(|transport| transport.connect())?;
        self.route(result, "connect")
    }

    /// Send `record` stamped with the current time.
    pub fn send(&self, tag: &str, record: &DynamicValue) -> Result<(), SendError> {
        let frame = self.framer.frame_now(tag, record)?;
        self.deliver(tag, &frame)
    }

    /// Send `record` stamped with `time`.
    pub fn send_at<Tz: TimeZone>(
        &self,
        tag: &str,
        time: DateTime<Tz>,
        record: &DynamicValue,
    ) -> Result<(), SendError> {
        let frame = self.framer.frame(tag, Some(time), record)?;
        self.deliver(tag, &frame)
    }

    /// Send a prepared [`Entry`] with its own time.
    pub fn send_entry(&self, entry: &Entry) -> Result<(), SendError> {
        let frame = self.framer.frame_entry(entry)?;
        self.deliver(&entry.tag, &frame)
    }

    /// Send any serialisable record stamped with the current time.
    pub fn send_serialize<R: Serialize + ?Sized>(
        &self,
        tag: &str,
        record: &R,
    ) -> Result<(), SendError> {
        let frame = self.framer.frame_serialize(tag, record)?;
        self.deliver(tag, &frame)
    }

    /// Flush bytes buffered by the transport.
    pub fn flush(&self) -> Result<(), SendError> {
        let result = self.with_open_transport(|transport| transport.flush())?;
        self.route(result, "flush")
    }

    /// Close the transport. Subsequent calls fail with [`SendError::Closed`].
    pub fn close(&self) -> Result<(), SendError> {
        let Some(mut transport) = self.transport.lock().take() else {
            return Ok(());
        };
        let result = transport.close();
        self.route(result, "close")
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.transport.lock().is_none()
    }

    fn deliver(&self, tag: &str, frame: &[u8]) -> Result<(), SendError> {
        log::debug!("sending {} byte entry tagged {tag}", frame.len());
        let result = self.with_open_transport(|transport| transport.send_bytes(frame))?;
        self.route(result, "send")
    }

    fn with_open_transport<R>(
        &self,
        op: impl FnOnce(&mut T) -> io::Result<R>,
    ) -> Result<io::Result<R>, SendError> {
        let mut guard = self.transport.lock();
        let transport = guard.as_mut().ok_or(SendError::Closed)?;
        Ok(op(transport))
    }

    fn route(&self, result: io::Result<()>, action: &str) -> Result<(), SendError> {
        let Err(err) = result else {
            return Ok(());
        };
        match &self.error_handler {
            Some(handler) => {
                log::warn!("fluentd {action} failed, passing to error handler: {err}");
                handler(&err);
                Ok(())
            }
            None => {
                log::warn!("fluentd {action} failed: {err}");
                Err(SendError::Io(err))
            }
        }
    }
}

impl<T: Transport> Drop for FluentSender<T> {
    fn drop(&mut self) {
        if let Some(mut transport) = self.transport.get_mut().take() {
            if let Err(err) = transport.close() {
                log::warn!("fluentd close on drop failed: {err}");
            }
        }
    }
}

impl<T: Transport> fmt::Debug for FluentSender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FluentSender")
            .field("framer", &self.framer)
            .field("closed", &self.is_closed())
            .field("error_handler", &self.error_handler.is_some())
            .finish()
    }
}
