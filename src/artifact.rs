//! Downloadable artifacts exposed as transient, revocable URLs.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

/// Host capability: turn bytes into a URL a player or download link can
/// use (an object URL in the browser).
pub trait ArtifactStore {
    fn publish(&mut self, name: &str, mime: &str, bytes: Arc<[u8]>) -> String;

    /// Invalidate a URL. Returns `false` for unknown or already revoked URLs.
    fn revoke(&mut self, url: &str) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub name: String,
    pub mime: String,
    pub bytes: Arc<[u8]>,
}

/// In-process store handing out `blob:voxlab/...` URLs.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    next: u64,
    artifacts: HashMap<String, Artifact>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str) -> Option<&Artifact> {
        self.artifacts.get(url)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn publish(&mut self, name: &str, mime: &str, bytes: Arc<[u8]>) -> String {
        self.next += 1;
        let url = format!("blob:voxlab/{}/{name}", self.next);
        debug!("published {} bytes as {url}", bytes.len());
        self.artifacts.insert(
            url.clone(),
            Artifact {
                name: name.to_string(),
                mime: mime.to_string(),
                bytes,
            },
        );
        url
    }

    fn revoke(&mut self, url: &str) -> bool {
        self.artifacts.remove(url).is_some()
    }
}

/// Download name for an effect result, e.g. `voice-robot.wav`.
pub fn download_name(effect_id: &str) -> String {
    format!("voice-{effect_id}.wav")
}
