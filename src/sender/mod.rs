//! Delivery of framed entries to a Fluentd collector.
//!
//! [`FluentSender`] frames each entry with an [`EntryFramer`](crate::EntryFramer)
//! and writes the result through a [`Transport`]. The default transport is a
//! lazily connected TCP socket.

mod builder;
mod client;
mod config;
mod transport;

pub use builder::SenderBuilder;
pub use client::{ErrorHandler, FluentSender};
pub use config::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_WRITE_TIMEOUT, SenderConfig};
pub use transport::{TcpTransport, Transport};
