//! A Fluentd forward-protocol client.
//!
//! Records are modelled as [`DynamicValue`]s (or any `Serialize` type),
//! encoded to MessagePack by [`RecordEncoder`], framed as
//! `[tag, time, record]` by [`EntryFramer`] and delivered by
//! [`FluentSender`].
//!
//! ```rust,no_run
//! use fluentd_client::{FluentSender, record};
//!
//! let sender = FluentSender::builder()
//!     .with_tcp("localhost", 24224)
//!     .build()?;
//! sender.send("app.event", &record! { "id" => 7, "ok" => true })?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod codec;
pub mod encoder;
pub mod entry;
pub mod error;
pub mod sender;
pub mod value;

pub use codec::{TimestampMode, decode_timestamp, encode_timestamp};
pub use encoder::{DEFAULT_MAX_DEPTH, EncoderConfig, RecordEncoder};
pub use entry::{Clock, Entry, EntryFramer};
pub use error::{BuildError, DecodeError, EncodeError, PathSegment, SendError, ValuePath};
pub use sender::{FluentSender, SenderBuilder, SenderConfig, Transport};
pub use value::{
    DynamicValue, EventTimestamp, as_timestamp, to_dynamic, to_dynamic_with_depth,
};
