//! Microphone capture sessions.
//!
//! `Idle → Requesting → Recording → Stopped`. One session records at a
//! time; the device grant, recorder and analyzer tap belong to the active
//! session and are released whenever it ends, including when the session
//! future or the whole component is dropped.

use async_trait::async_trait;
use log::{info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::analyzer::{AnalyzerTap, FrequencyAnalyzer, SessionId, TapHandle};
use crate::error::VoxError;
use crate::source::AudioSource;

/// Host capability: microphone access plus a recorder.
#[async_trait(?Send)]
pub trait AudioCapture {
    /// Ask for an input grant and start recording on it. A refused grant
    /// must come back as [`VoxError::Permission`].
    async fn open(&mut self) -> Result<CaptureStream, VoxError>;
}

/// A live device grant with its recorder.
pub trait CaptureDevice {
    /// Stop the recorder. Buffered data is delivered as a final chunk,
    /// after which the chunk channel closes.
    fn finish_recording(&mut self);

    /// Stop every track of the grant. Called exactly once.
    fn release(&mut self);
}

/// What a successful [`AudioCapture::open`] hands over.
pub struct CaptureStream {
    /// Container the recorder produces, e.g. `audio/webm`.
    pub mime: String,
    /// Encoded chunks in arrival order.
    pub chunks: mpsc::UnboundedReceiver<Vec<u8>>,
    pub device: Box<dyn CaptureDevice>,
    /// Analyser node attached to the input.
    pub analyzer: Box<dyn FrequencyAnalyzer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Requesting,
    Recording,
    Stopped,
}

struct ActiveCapture {
    id: SessionId,
    mime: String,
    chunks: mpsc::UnboundedReceiver<Vec<u8>>,
    received: Vec<Vec<u8>>,
    device: Box<dyn CaptureDevice>,
    tap: AnalyzerTap,
    cancel: CancellationToken,
    released: bool,
}

impl ActiveCapture {
    fn push(&mut self, chunk: Vec<u8>) {
        if !chunk.is_empty() {
            self.received.push(chunk);
        }
    }

    fn drain_ready(&mut self) {
        while let Ok(chunk) = self.chunks.try_recv() {
            self.push(chunk);
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.cancel.cancel();
        self.device.release();
    }
}

impl Drop for ActiveCapture {
    fn drop(&mut self) {
        if !self.released {
            warn!("capture session {} dropped while recording, releasing device", self.id);
            self.release();
        }
    }
}

pub struct AudioCaptureSession<C: AudioCapture> {
    capture: C,
    state: CaptureState,
    active: Option<ActiveCapture>,
    source: Option<AudioSource>,
    next_id: u64,
}

impl<C: AudioCapture> AudioCaptureSession<C> {
    pub fn new(capture: C) -> Self {
        AudioCaptureSession {
            capture,
            state: CaptureState::Idle,
            active: None,
            source: None,
            next_id: 0,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == CaptureState::Recording
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.active.as_ref().map(|a| a.id)
    }

    /// Tap on the live input, for the visualization loop.
    pub fn tap(&self) -> Option<TapHandle> {
        self.active.as_ref().map(|a| a.tap.handle())
    }

    /// Token cancelled when the active session ends.
    pub fn cancellation(&self) -> Option<CancellationToken> {
        self.active.as_ref().map(|a| a.cancel.clone())
    }

    /// Move chunks that have already arrived into the session buffer and
    /// return how many have been collected so far.
    pub fn pump(&mut self) -> usize {
        match self.active.as_mut() {
            Some(active) => {
                active.drain_ready();
                active.received.len()
            }
            None => 0,
        }
    }

    /// The recording produced by the last stop.
    pub fn source(&self) -> Option<&AudioSource> {
        self.source.as_ref()
    }

    pub fn take_source(&mut self) -> Option<AudioSource> {
        self.source.take()
    }

    /// Start a new recording, stopping any session still recording first.
    pub async fn start(&mut self) -> Result<SessionId, VoxError> {
        if let Some(id) = self.session_id() {
            warn!("capture session {id} still recording, stopping it first");
            self.stop().await;
        }

        self.state = CaptureState::Requesting;
        let stream = match self.capture.open().await {
            Ok(stream) => stream,
            Err(e) => {
                self.state = CaptureState::Idle;
                warn!("capture request failed: {e}");
                return Err(e);
            }
        };

        self.next_id += 1;
        let id = SessionId(self.next_id);
        self.active = Some(ActiveCapture {
            id,
            mime: stream.mime,
            chunks: stream.chunks,
            received: Vec::new(),
            device: stream.device,
            tap: AnalyzerTap::new(id, stream.analyzer),
            cancel: CancellationToken::new(),
            released: false,
        });
        self.state = CaptureState::Recording;
        info!("capture session {id} recording");
        Ok(id)
    }

    /// Stop recording and assemble the chunks into one source.
    ///
    /// Every chunk queued before the call, plus the recorder's final flush,
    /// is included. Returns `None` when nothing was recording.
    pub async fn stop(&mut self) -> Option<AudioSource> {
        let mut active = self.active.take()?;
        // Stays idle if this future is dropped before the flush completes.
        self.state = CaptureState::Idle;
        // Visualization stops now, not after the flush.
        active.cancel.cancel();

        active.device.finish_recording();
        while let Some(chunk) = active.chunks.recv().await {
            active.push(chunk);
        }
        active.release();

        let payload = active.received.concat();
        info!(
            "capture session {} stopped: {} chunks, {} bytes",
            active.id,
            active.received.len(),
            payload.len()
        );
        let source = AudioSource::recorded(payload, active.mime.clone());
        self.source = Some(source.clone());
        self.state = CaptureState::Stopped;
        Some(source)
    }
}
