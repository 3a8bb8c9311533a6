//! The encoded audio the pipeline is currently working on.

use std::sync::Arc;

/// Where an [`AudioSource`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOrigin {
    Recorded,
    Uploaded,
}

/// Raw encoded audio bytes plus a mime hint.
///
/// Cloning is cheap; the payload is shared.
#[derive(Debug, Clone)]
pub struct AudioSource {
    bytes: Arc<[u8]>,
    mime: String,
    origin: SourceOrigin,
}

impl AudioSource {
    pub fn recorded(bytes: impl Into<Arc<[u8]>>, mime: impl Into<String>) -> Self {
        AudioSource {
            bytes: bytes.into(),
            mime: mime.into(),
            origin: SourceOrigin::Recorded,
        }
    }

    pub fn uploaded(bytes: impl Into<Arc<[u8]>>, mime: impl Into<String>) -> Self {
        AudioSource {
            bytes: bytes.into(),
            mime: mime.into(),
            origin: SourceOrigin::Uploaded,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn origin(&self) -> SourceOrigin {
        self.origin
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File name used when the payload is uploaded somewhere, e.g. `input.webm`.
    pub fn file_name(&self) -> String {
        format!("input.{}", extension_for_mime(&self.mime))
    }
}

/// Map a mime hint to a file extension. Unknown types fall back to `webm`,
/// the container browsers record into.
pub fn extension_for_mime(mime: &str) -> &'static str {
    let essence = mime.split(';').next().unwrap_or("").trim();
    match essence.to_ascii_lowercase().as_str() {
        "audio/wav" | "audio/wave" | "audio/x-wav" | "audio/vnd.wave" => "wav",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/ogg" | "audio/opus" => "ogg",
        "audio/flac" | "audio/x-flac" => "flac",
        "audio/mp4" | "audio/aac" | "audio/x-m4a" => "m4a",
        _ => "webm",
    }
}
