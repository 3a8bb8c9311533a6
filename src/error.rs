use std::fmt;

/// Top-level error for every fallible operation in the pipeline.
#[derive(Debug)]
pub enum VoxError {
    /// The host refused access to the capture device.
    Permission(String),
    Decode(DecodeError),
    Render(RenderError),
    Remote(RemoteError),
    /// An effect application is already in flight for the current source.
    Busy,
    /// The operation needs a source (or playable media) that is not loaded.
    NoSource,
    /// The source was replaced while the effect was being applied; the
    /// result was discarded.
    Superseded,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    Empty,
    Unsupported { mime: String },
    Malformed(String),
    /// Frames inside one stream disagree on channel count or sample rate.
    InconsistentStream,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    InvalidBuffer(BufferError),
    NonFinite { channel: usize, frame: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum BufferError {
    NoChannels,
    ZeroSampleRate,
    RaggedChannels {
        channel: usize,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteError {
    /// HTTP status, when the failure came from a response.
    pub status: Option<u16>,
    pub message: String,
}

#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    Invalid { field: &'static str, reason: String },
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        RemoteError {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        RemoteError {
            status: Some(status),
            message: message.into(),
        }
    }
}

impl fmt::Display for VoxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoxError::Permission(msg) => write!(f, "Microphone permission denied: {msg}"),
            VoxError::Decode(e) => write!(f, "Decode error: {e}"),
            VoxError::Render(e) => write!(f, "Render error: {e}"),
            VoxError::Remote(e) => write!(f, "Remote error: {e}"),
            VoxError::Busy => write!(f, "An effect is already being applied"),
            VoxError::NoSource => write!(f, "No audio loaded"),
            VoxError::Superseded => write!(f, "Source changed before the effect finished"),
        }
    }
}

impl std::error::Error for VoxError {}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Empty => write!(f, "payload contains no audio frames"),
            DecodeError::Unsupported { mime } => write!(f, "unsupported audio format '{mime}'"),
            DecodeError::Malformed(msg) => write!(f, "malformed audio: {msg}"),
            DecodeError::InconsistentStream => {
                write!(f, "stream changes channel count or sample rate mid-way")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::InvalidBuffer(e) => write!(f, "invalid buffer: {e}"),
            RenderError::NonFinite { channel, frame } => {
                write!(f, "non-finite sample in channel {channel} at frame {frame}")
            }
        }
    }
}

impl std::error::Error for RenderError {}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferError::NoChannels => write!(f, "buffer has no channels"),
            BufferError::ZeroSampleRate => write!(f, "sample rate must be positive"),
            BufferError::RaggedChannels {
                channel,
                expected,
                found,
            } => write!(f, "channel {channel} has {found} frames, expected {expected}"),
        }
    }
}

impl std::error::Error for BufferError {}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (HTTP {status})", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for RemoteError {}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse(e) => write!(f, "Config parse error: {e}"),
            ConfigError::Invalid { field, reason } => write!(f, "Invalid {field}: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<DecodeError> for VoxError {
    fn from(e: DecodeError) -> Self {
        VoxError::Decode(e)
    }
}

impl From<RenderError> for VoxError {
    fn from(e: RenderError) -> Self {
        VoxError::Render(e)
    }
}

impl From<RemoteError> for VoxError {
    fn from(e: RemoteError) -> Self {
        VoxError::Remote(e)
    }
}

impl From<BufferError> for RenderError {
    fn from(e: BufferError) -> Self {
        RenderError::InvalidBuffer(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}
