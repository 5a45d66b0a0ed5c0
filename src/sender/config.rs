//! Configuration structures consumed by [`FluentSender`](super::FluentSender).
//!
//! [`SenderBuilder`](super::SenderBuilder) validates and produces these values;
//! they can also be assembled by hand for tests.

use std::time::Duration;

use crate::encoder::EncoderConfig;

/// Default collector host.
pub const DEFAULT_HOST: &str = "localhost";
/// Default Fluentd forward port.
pub const DEFAULT_PORT: u16 = 24224;
/// Default write timeout applied to socket writes.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Everything needed to open a TCP transport and frame entries for it.
#[derive(Clone, Debug, PartialEq)]
pub struct SenderConfig {
    pub host: String,
    pub port: u16,
    /// `None` uses the operating system's connect timeout.
    pub connect_timeout: Option<Duration>,
    /// Applied to every socket write.
    pub write_timeout: Duration,
    /// Timestamp mode and depth limit for framed entries.
    pub encoder: EncoderConfig,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            connect_timeout: None,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            encoder: EncoderConfig::default(),
        }
    }
}

impl SenderConfig {
    /// Point the configuration at another collector.
    pub fn with_endpoint(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    /// `host:port` as used in diagnostics.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
