//! Applies the selected effect to the current source.
//!
//! Local filters are rendered in process and published as a WAV artifact;
//! voice effects go to the remote service. One application runs per
//! source, and a result is only committed if the source it was computed
//! from is still current.

use std::cell::{Cell, Ref, RefCell};
use std::sync::Arc;

use log::{info, warn};

use crate::artifact::{self, ArtifactStore, MemoryArtifactStore};
use crate::config::CoreConfig;
use crate::dsp::offline::{FilterConfig, FilterKind, OfflineFilterEngine};
use crate::dsp::wav::encode_wav;
use crate::effect::{Effect, Route, VoiceEffect};
use crate::error::{RemoteError, VoxError};
use crate::playback::PlaybackMedia;
use crate::remote::{self, RemoteEffectService, RemoteRequest};
use crate::source::AudioSource;

/// What to apply. Unset parameters fall back to [`CoreConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectRequest {
    pub effect: Effect,
    pub intensity: Option<i32>,
    pub delay_seconds: Option<f64>,
    pub repeat: Option<u32>,
    pub noise_filter: Option<bool>,
}

impl EffectRequest {
    pub fn new(effect: Effect) -> Self {
        EffectRequest {
            effect,
            intensity: None,
            delay_seconds: None,
            repeat: None,
            noise_filter: None,
        }
    }

    pub fn with_intensity(mut self, intensity: i32) -> Self {
        self.intensity = Some(intensity);
        self
    }

    pub fn with_delay(mut self, seconds: f64) -> Self {
        self.delay_seconds = Some(seconds);
        self
    }

    pub fn with_repeat(mut self, repeat: u32) -> Self {
        self.repeat = Some(repeat);
        self
    }

    pub fn with_noise_filter(mut self, enabled: bool) -> Self {
        self.noise_filter = Some(enabled);
        self
    }
}

impl From<Effect> for EffectRequest {
    fn from(effect: Effect) -> Self {
        EffectRequest::new(effect)
    }
}

/// A committed effect application.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectResult {
    pub effect: Effect,
    /// Playable URL: an artifact URL for local renders, an absolute
    /// service URL for remote ones.
    pub audio_url: String,
    pub waveform_url: Option<String>,
    pub raw_audio_url: Option<String>,
    pub download_name: String,
    /// Encoded WAV, for local renders.
    pub wav: Option<Arc<[u8]>>,
}

impl EffectResult {
    pub fn is_local(&self) -> bool {
        self.wav.is_some()
    }

    pub fn playback_media(&self) -> PlaybackMedia {
        match &self.wav {
            Some(bytes) => PlaybackMedia::Encoded {
                bytes: Arc::clone(bytes),
                mime: "audio/wav".to_string(),
            },
            None => PlaybackMedia::Url(self.audio_url.clone()),
        }
    }
}

#[derive(Default)]
struct State {
    source: Option<AudioSource>,
    /// Bumped on every source change.
    generation: u64,
    result: Option<EffectResult>,
}

/// Marks the source generation an application is running against. A stale
/// application never clears a slot taken over by a newer source.
struct InFlight<'a> {
    slot: &'a Cell<Option<u64>>,
    generation: u64,
}

impl<'a> InFlight<'a> {
    fn enter(slot: &'a Cell<Option<u64>>, generation: u64) -> Self {
        slot.set(Some(generation));
        InFlight { slot, generation }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.slot.get() == Some(self.generation) {
            self.slot.set(None);
        }
    }
}

pub struct EffectOrchestrator<R: RemoteEffectService, S: ArtifactStore = MemoryArtifactStore> {
    config: CoreConfig,
    engine: OfflineFilterEngine,
    remote: R,
    store: RefCell<S>,
    state: RefCell<State>,
    /// Generation of the source with an application in flight.
    in_flight: Cell<Option<u64>>,
}

impl<R: RemoteEffectService> EffectOrchestrator<R> {
    pub fn new(config: CoreConfig, remote: R) -> Self {
        EffectOrchestrator::with_store(config, remote, MemoryArtifactStore::new())
    }
}

impl<R: RemoteEffectService, S: ArtifactStore> EffectOrchestrator<R, S> {
    pub fn with_store(config: CoreConfig, remote: R, store: S) -> Self {
        EffectOrchestrator {
            config,
            engine: OfflineFilterEngine::new(),
            remote,
            store: RefCell::new(store),
            state: RefCell::new(State::default()),
            in_flight: Cell::new(None),
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn store(&self) -> Ref<'_, S> {
        self.store.borrow()
    }

    /// Replace the current source. Any committed result belongs to the old
    /// source and is dropped; an application still in flight will not commit.
    pub fn set_source(&self, source: AudioSource) {
        info!("source set: {} bytes of {}", source.len(), source.mime());
        self.replace_source(Some(source));
    }

    /// Use uploaded file bytes as the source.
    pub fn upload(&self, bytes: impl Into<Arc<[u8]>>, mime: impl Into<String>) {
        self.set_source(AudioSource::uploaded(bytes, mime));
    }

    pub fn clear_source(&self) {
        self.replace_source(None);
    }

    pub fn source(&self) -> Option<AudioSource> {
        self.state.borrow().source.clone()
    }

    pub fn result(&self) -> Option<EffectResult> {
        self.state.borrow().result.clone()
    }

    /// Whether an application is in flight for the current source.
    pub fn is_busy(&self) -> bool {
        self.in_flight.get() == Some(self.state.borrow().generation)
    }

    /// Apply an effect to the current source and commit the result.
    ///
    /// Fails with [`VoxError::Busy`] while another application runs on the
    /// same source and
    /// with [`VoxError::Superseded`] if the source changed before the
    /// result arrived. On failure the previous result stays committed.
    pub async fn apply(&self, request: impl Into<EffectRequest>) -> Result<EffectResult, VoxError> {
        let request = request.into();
        if self.is_busy() {
            warn!("{} requested while another effect is in flight", request.effect);
            return Err(VoxError::Busy);
        }
        let (source, generation) = {
            let state = self.state.borrow();
            (state.source.clone().ok_or(VoxError::NoSource)?, state.generation)
        };

        let _in_flight = InFlight::enter(&self.in_flight, generation);
        let result = match request.effect.route() {
            Route::Local(kind) => self.apply_local(&source, kind, &request).await?,
            Route::Remote(voice) => self.apply_remote(&source, voice, &request).await?,
        };
        self.commit(generation, result)
    }

    async fn apply_local(
        &self,
        source: &AudioSource,
        kind: FilterKind,
        request: &EffectRequest,
    ) -> Result<EffectResult, VoxError> {
        // Let pending UI work run before the CPU-bound pass.
        tokio::task::yield_now().await;

        let intensity = request
            .intensity
            .unwrap_or(self.config.default_intensity as i32);
        let config = FilterConfig::new(kind, intensity);
        let rendered = self.engine.render(source, &config)?;
        let wav: Arc<[u8]> = encode_wav(&rendered).into();

        let effect = Effect::Filter(kind);
        let download_name = artifact::download_name(effect.id());
        let audio_url = self
            .store
            .borrow_mut()
            .publish(&download_name, "audio/wav", Arc::clone(&wav));
        Ok(EffectResult {
            effect,
            audio_url,
            waveform_url: None,
            raw_audio_url: None,
            download_name,
            wav: Some(wav),
        })
    }

    async fn apply_remote(
        &self,
        source: &AudioSource,
        voice: VoiceEffect,
        request: &EffectRequest,
    ) -> Result<EffectResult, VoxError> {
        let remote_request = RemoteRequest {
            audio: source.shared_bytes(),
            mime: source.mime().to_string(),
            file_name: source.file_name(),
            effect: voice.id(),
            delay_seconds: request
                .delay_seconds
                .unwrap_or(self.config.echo_delay_seconds),
            repeat: request.repeat.unwrap_or(self.config.stutter_repeat),
            noise_filter: request
                .noise_filter
                .unwrap_or(self.config.noise_pre_filter),
        };
        let response = self.remote.process(&remote_request).await?;
        if response.audio_url.is_empty() {
            return Err(RemoteError::new("Response did not include an audio URL").into());
        }

        let base = &self.config.service_url;
        let effect = Effect::Voice(voice);
        Ok(EffectResult {
            effect,
            audio_url: remote::resolve_url(base, &response.audio_url),
            waveform_url: response.waveform_url.map(|u| remote::resolve_url(base, &u)),
            raw_audio_url: response.raw_audio_url.map(|u| remote::resolve_url(base, &u)),
            download_name: artifact::download_name(effect.id()),
            wav: None,
        })
    }

    fn commit(&self, generation: u64, result: EffectResult) -> Result<EffectResult, VoxError> {
        let mut state = self.state.borrow_mut();
        if state.generation != generation {
            warn!("source changed while applying {}, discarding result", result.effect);
            if result.is_local() {
                self.store.borrow_mut().revoke(&result.audio_url);
            }
            return Err(VoxError::Superseded);
        }
        if let Some(previous) = state.result.replace(result.clone()) {
            self.revoke_result(&previous);
        }
        info!("{} applied: {}", result.effect, result.audio_url);
        Ok(result)
    }

    fn replace_source(&self, source: Option<AudioSource>) {
        let mut state = self.state.borrow_mut();
        state.generation += 1;
        state.source = source;
        if let Some(previous) = state.result.take() {
            self.revoke_result(&previous);
        }
    }

    fn revoke_result(&self, result: &EffectResult) {
        if result.is_local() {
            self.store.borrow_mut().revoke(&result.audio_url);
        }
    }
}
