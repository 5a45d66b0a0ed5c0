//! Builder for [`FluentSender`].
//!
//! Collects optional overrides, validates them, and fills the gaps from
//! [`SenderConfig::default`].

use std::{fmt, io, sync::Arc, time::Duration};

use crate::{codec::TimestampMode, error::BuildError};

use super::{
    client::{ErrorHandler, FluentSender},
    config::SenderConfig,
};

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value == 0 {
            Err(BuildError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )))
        } else {
            Ok($value)
        }
    }};
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

#[derive(Clone, Debug)]
struct Endpoint {
    host: String,
    port: u16,
}

/// Builder for constructing [`FluentSender`] instances.
#[derive(Clone, Default)]
pub struct SenderBuilder {
    endpoint: Option<Endpoint>,
    connect_timeout_ms: Option<u64>,
    write_timeout_ms: Option<u64>,
    timestamp_mode: Option<TimestampMode>,
    max_depth: Option<usize>,
    error_handler: Option<ErrorHandler>,
}

impl SenderBuilder {
    /// Create a builder targeting `localhost:24224`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Send to the collector at `host:port`.
    pub fn with_tcp(mut self, host: impl Into<String>, port: u16) -> Self {
        self.endpoint = Some(Endpoint {
            host: host.into(),
            port,
        });
        self
    }

    option_setter!(
        #[doc = "Bound the time spent establishing the connection."]
        with_connect_timeout_ms,
        connect_timeout_ms,
        u64
    );
    option_setter!(with_write_timeout_ms, write_timeout_ms, u64);
    option_setter!(
        #[doc = "Choose between float and whole-second entry times."]
        with_timestamp_mode,
        timestamp_mode,
        TimestampMode
    );
    option_setter!(with_max_depth, max_depth, usize);

    /// Receive transport failures in `handler` instead of as errors.
    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&io::Error) + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    fn validate(&self) -> Result<(), BuildError> {
        self.validate_endpoint()?;
        self.validate_timeouts()?;
        if let Some(depth) = self.max_depth {
            ensure_positive!(depth, "max_depth")?;
        }
        Ok(())
    }

    fn validate_endpoint(&self) -> Result<(), BuildError> {
        let Some(endpoint) = &self.endpoint else {
            return Ok(());
        };
        if endpoint.host.trim().is_empty() {
            return Err(BuildError::InvalidConfig("host must not be empty".into()));
        }
        ensure_positive!(endpoint.port, "port")?;
        Ok(())
    }

    fn validate_timeouts(&self) -> Result<(), BuildError> {
        if let Some(timeout) = self.connect_timeout_ms {
            ensure_positive!(timeout, "connect_timeout_ms")?;
        }
        if let Some(timeout) = self.write_timeout_ms {
            ensure_positive!(timeout, "write_timeout_ms")?;
        }
        Ok(())
    }

    /// Validate the overrides and produce the resulting configuration.
    pub fn build_config(&self) -> Result<SenderConfig, BuildError> {
        self.validate()?;
        let mut config = SenderConfig::default();
        if let Some(endpoint) = &self.endpoint {
            config.host = endpoint.host.clone();
            config.port = endpoint.port;
        }
        if let Some(timeout) = self.connect_timeout_ms {
            config.connect_timeout = Some(Duration::from_millis(timeout));
        }
        if let Some(timeout) = self.write_timeout_ms {
            config.write_timeout = Duration::from_millis(timeout);
        }
        if let Some(mode) = self.timestamp_mode {
            config.encoder.timestamp_mode = mode;
        }
        if let Some(depth) = self.max_depth {
            config.encoder.max_depth = depth;
        }
        Ok(config)
    }

    /// Build the sender. No connection is made until the first send.
    pub fn build(&self) -> Result<FluentSender, BuildError> {
        let config = self.build_config()?;
        log::debug!("building fluentd sender for {}", config.endpoint());
        let sender = FluentSender::with_config(config);
        Ok(match &self.error_handler {
            Some(handler) => sender.with_error_handler(Arc::clone(handler)),
            None => sender,
        })
    }
}

impl fmt::Debug for SenderBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SenderBuilder")
            .field("endpoint", &self.endpoint)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("write_timeout_ms", &self.write_timeout_ms)
            .field("timestamp_mode", &self.timestamp_mode)
            .field("max_depth", &self.max_depth)
            .field("error_handler", &self.error_handler.is_some())
            .finish()
    }
}
