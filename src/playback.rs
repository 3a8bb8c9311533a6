//! Playback of the original or processed audio, one voice at a time.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::analyzer::{AnalyzerTap, FrequencyAnalyzer, SessionId, TapHandle};
use crate::error::VoxError;
use crate::source::AudioSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackSource {
    Original,
    Processed,
}

impl fmt::Display for PlaybackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackSource::Original => f.write_str("original"),
            PlaybackSource::Processed => f.write_str("processed"),
        }
    }
}

/// Something the renderer can play.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackMedia {
    /// Encoded bytes held in memory (a source or a locally rendered WAV).
    Encoded { bytes: Arc<[u8]>, mime: String },
    /// A URL returned by the remote service.
    Url(String),
}

impl From<&AudioSource> for PlaybackMedia {
    fn from(source: &AudioSource) -> Self {
        PlaybackMedia::Encoded {
            bytes: source.shared_bytes(),
            mime: source.mime().to_string(),
        }
    }
}

/// A playing voice inside the host audio graph.
pub trait PlaybackVoice {
    /// Stop output and rewind to the start.
    fn halt(&mut self);
}

/// What the renderer returns for a started voice.
pub struct PlaybackHandle {
    pub voice: Box<dyn PlaybackVoice>,
    pub analyzer: Box<dyn FrequencyAnalyzer>,
    /// Resolves when playback reaches the end on its own.
    pub ended: oneshot::Receiver<()>,
}

/// Host capability: decode and play media through the output device.
#[async_trait(?Send)]
pub trait AudioRenderer {
    async fn start(&mut self, media: &PlaybackMedia) -> Result<PlaybackHandle, VoxError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEnd {
    /// Reached the end of the media.
    Completed,
    /// Stopped or cancelled before the end.
    Stopped,
}

struct ActivePlayback {
    id: SessionId,
    source: PlaybackSource,
    voice: Box<dyn PlaybackVoice>,
    ended: oneshot::Receiver<()>,
    tap: AnalyzerTap,
    cancel: CancellationToken,
    halted: bool,
}

impl ActivePlayback {
    fn halt(&mut self) {
        if self.halted {
            return;
        }
        self.halted = true;
        self.cancel.cancel();
        self.voice.halt();
    }
}

impl Drop for ActivePlayback {
    fn drop(&mut self) {
        self.halt();
        debug!("playback session {} torn down", self.id);
    }
}

pub struct PlaybackController<R: AudioRenderer> {
    renderer: R,
    original: Option<PlaybackMedia>,
    processed: Option<PlaybackMedia>,
    active: Option<ActivePlayback>,
    next_id: u64,
}

impl<R: AudioRenderer> PlaybackController<R> {
    pub fn new(renderer: R) -> Self {
        PlaybackController {
            renderer,
            original: None,
            processed: None,
            active: None,
            next_id: 0,
        }
    }

    /// Replace the media for one slot. A voice playing that slot is stopped.
    pub fn set_media(&mut self, which: PlaybackSource, media: Option<PlaybackMedia>) {
        if self.playing() == Some(which) {
            self.stop();
        }
        match which {
            PlaybackSource::Original => self.original = media,
            PlaybackSource::Processed => self.processed = media,
        }
    }

    pub fn media(&self, which: PlaybackSource) -> Option<&PlaybackMedia> {
        match which {
            PlaybackSource::Original => self.original.as_ref(),
            PlaybackSource::Processed => self.processed.as_ref(),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.active.is_some()
    }

    pub fn playing(&self) -> Option<PlaybackSource> {
        self.active.as_ref().map(|a| a.source)
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.active.as_ref().map(|a| a.id)
    }

    pub fn tap(&self) -> Option<TapHandle> {
        self.active.as_ref().map(|a| a.tap.handle())
    }

    pub fn cancellation(&self) -> Option<CancellationToken> {
        self.active.as_ref().map(|a| a.cancel.clone())
    }

    /// Play one slot from the start. Whatever was playing is stopped before
    /// the new voice starts.
    pub async fn play(&mut self, which: PlaybackSource) -> Result<SessionId, VoxError> {
        let media = self.media(which).cloned().ok_or(VoxError::NoSource)?;
        self.stop();

        let handle = self.renderer.start(&media).await?;
        self.next_id += 1;
        let id = SessionId(self.next_id);
        self.active = Some(ActivePlayback {
            id,
            source: which,
            voice: handle.voice,
            ended: handle.ended,
            tap: AnalyzerTap::new(id, handle.analyzer),
            cancel: CancellationToken::new(),
            halted: false,
        });
        info!("playback session {id} playing {which}");
        Ok(id)
    }

    /// Halt, rewind and destroy the tap. Returns `false` if nothing was playing.
    pub fn stop(&mut self) -> bool {
        match self.active.take() {
            Some(active) => {
                info!("playback session {} stopped", active.id);
                true
            }
            None => false,
        }
    }

    /// Check for natural completion without waiting. Returns `true` when the
    /// active voice finished and has been torn down.
    pub fn poll_ended(&mut self) -> bool {
        let Some(active) = self.active.as_mut() else {
            return false;
        };
        match active.ended.try_recv() {
            Err(oneshot::error::TryRecvError::Empty) => false,
            Ok(()) | Err(oneshot::error::TryRecvError::Closed) => {
                self.finish();
                true
            }
        }
    }

    /// Wait for the active voice to finish or be cancelled.
    pub async fn wait_for_end(&mut self) -> PlaybackEnd {
        let completed = {
            let Some(active) = self.active.as_mut() else {
                return PlaybackEnd::Stopped;
            };
            let cancel = active.cancel.clone();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => false,
                _ = &mut active.ended => true,
            }
        };
        if completed {
            self.finish();
            PlaybackEnd::Completed
        } else {
            self.stop();
            PlaybackEnd::Stopped
        }
    }

    fn finish(&mut self) {
        if let Some(active) = self.active.take() {
            info!("playback session {} reached the end", active.id);
        }
    }
}
