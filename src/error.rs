//! Error types shared by the encoder, the timestamp codec and the sender.
//!
//! Encoding failures ([`EncodeError`]) and transport failures
//! ([`SendError::Io`]) are kept apart so callers can tell a malformed record
//! from an unreachable collector.

use std::{collections::VecDeque, fmt, io};

use thiserror::Error;

/// One step from a record's root to a nested value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    /// Key of a mapping entry or name of a record field.
    Key(String),
    /// Position inside a sequence.
    Index(usize),
}

/// Location of a value inside a record, rendered as `$.a.b[2]`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValuePath(VecDeque<PathSegment>);

impl ValuePath {
    /// The path of the record root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Segments from the root to the value.
    pub fn segments(&self) -> impl Iterator<Item = &PathSegment> {
        self.0.iter()
    }

    /// Whether the path points at the root.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    fn prepend(&mut self, segment: PathSegment) {
        self.0.push_front(segment);
    }
}

impl fmt::Display for ValuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for segment in self.segments() {
            match segment {
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// Errors raised while turning a record into MessagePack bytes.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The entry tag was empty.
    #[error("entry tag must not be empty")]
    EmptyTag,
    /// A mapping key did not serialise to text.
    #[error("mapping key at {path} is not text")]
    NonTextKey { path: ValuePath },
    /// A value had no MessagePack representation.
    #[error("unsupported value of type {type_name} at {path}")]
    Unsupported {
        path: ValuePath,
        type_name: &'static str,
    },
    /// A container or string exceeded the 32-bit length field.
    #[error("value at {path} has length {len}, exceeding the MessagePack limit")]
    TooLarge { path: ValuePath, len: usize },
    /// A record named the same field twice.
    #[error("record at {path} repeats field {name:?}")]
    DuplicateField { path: ValuePath, name: String },
    /// Nesting went deeper than the configured limit.
    #[error("value at {path} is nested deeper than {limit} levels")]
    DepthExceeded { path: ValuePath, limit: usize },
    /// A `Serialize` implementation reported its own error.
    #[error("serialisation failed at {path}: {message}")]
    Custom { path: ValuePath, message: String },
    /// The primitive codec failed to write to the output buffer.
    #[error("failed to write MessagePack bytes: {0}")]
    Write(String),
}

impl EncodeError {
    /// Record that the error happened below `segment`.
    pub(crate) fn within(mut self, segment: PathSegment) -> Self {
        if let Some(path) = self.path_mut() {
            path.prepend(segment);
        }
        self
    }

    /// Path to the offending value, when the error concerns one.
    pub fn path(&self) -> Option<&ValuePath> {
        match self {
            Self::NonTextKey { path }
            | Self::Unsupported { path, .. }
            | Self::TooLarge { path, .. }
            | Self::DuplicateField { path, .. }
            | Self::DepthExceeded { path, .. }
            | Self::Custom { path, .. } => Some(path),
            Self::EmptyTag | Self::Write(_) => None,
        }
    }

    fn path_mut(&mut self) -> Option<&mut ValuePath> {
        match self {
            Self::NonTextKey { path }
            | Self::Unsupported { path, .. }
            | Self::TooLarge { path, .. }
            | Self::DuplicateField { path, .. }
            | Self::DepthExceeded { path, .. }
            | Self::Custom { path, .. } => Some(path),
            Self::EmptyTag | Self::Write(_) => None,
        }
    }
}

impl From<io::Error> for EncodeError {
    fn from(err: io::Error) -> Self {
        Self::Write(err.to_string())
    }
}

impl From<rmp::encode::ValueWriteError> for EncodeError {
    fn from(err: rmp::encode::ValueWriteError) -> Self {
        Self::Write(err.to_string())
    }
}

impl serde::ser::Error for EncodeError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self::Custom {
            path: ValuePath::root(),
            message: msg.to_string(),
        }
    }
}

/// Errors raised while reading a timestamp back from MessagePack.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The marker is not a float, an integer or an extension.
    #[error("unexpected MessagePack marker {0:#04x} for a timestamp")]
    UnexpectedMarker(u8),
    /// The extension type or payload length is not a known timestamp layout.
    #[error("unsupported timestamp extension type {type_id} with {len} bytes")]
    UnsupportedExtension { type_id: i8, len: u32 },
    /// The decoded value does not fit a calendar instant.
    #[error("timestamp {0} is out of range")]
    OutOfRange(String),
    /// The input ended early or could not be read.
    #[error("failed to read MessagePack bytes: {0}")]
    Read(String),
}

impl From<rmp::decode::ValueReadError> for DecodeError {
    fn from(err: rmp::decode::ValueReadError) -> Self {
        Self::Read(err.to_string())
    }
}

impl From<rmp::decode::NumValueReadError> for DecodeError {
    fn from(err: rmp::decode::NumValueReadError) -> Self {
        Self::Read(err.to_string())
    }
}

impl From<io::Error> for DecodeError {
    fn from(err: io::Error) -> Self {
        Self::Read(err.to_string())
    }
}

/// Errors returned by [`FluentSender`](crate::sender::FluentSender).
#[derive(Debug, Error)]
pub enum SendError {
    /// The record could not be encoded; nothing was sent.
    #[error("failed to encode entry: {0}")]
    Encode(#[from] EncodeError),
    /// The transport failed to connect, write or flush.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    /// The sender has been closed.
    #[error("sender is closed")]
    Closed,
}

/// Errors that may occur while building a sender.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Invalid user supplied configuration.
    #[error("invalid sender configuration: {0}")]
    InvalidConfig(String),
}
