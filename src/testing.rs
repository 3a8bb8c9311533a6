//! Scripted host capabilities for unit tests.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::rc::Rc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::analyzer::{FrameClock, FrequencyAnalyzer};
use crate::capture::{AudioCapture, CaptureDevice, CaptureStream};
use crate::error::{RemoteError, VoxError};
use crate::playback::{AudioRenderer, PlaybackHandle, PlaybackMedia, PlaybackVoice};
use crate::remote::{RemoteEffectService, RemoteRequest, RemoteResponse};
use crate::visual::{SpectrumFrame, VisualizationSurface};

pub type EventLog = Rc<RefCell<Vec<String>>>;

pub fn event_log() -> EventLog {
    Rc::new(RefCell::new(Vec::new()))
}

/// 32-bit float WAV bytes, for feeding the decoder.
pub fn float_wav(sample_rate: u32, channels: u16, interleaved: &[f32]) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in interleaved {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Silent MPEG-1 Layer III stream: `frames` mono frames at 44.1 kHz,
/// 128 kbit/s. Zeroed side info means no coded spectral data, so every
/// frame decodes to 1152 zero samples.
pub fn silent_mp3(frames: usize) -> Vec<u8> {
    // 144 * 128000 / 44100, no padding.
    const FRAME_LEN: usize = 417;
    let mut frame = vec![0u8; FRAME_LEN];
    frame[..4].copy_from_slice(&[0xFF, 0xFB, 0x90, 0xC0]);
    frame.repeat(frames)
}

pub struct AnalyzerCounters {
    pub reads: Rc<Cell<usize>>,
    pub disconnected: Rc<Cell<bool>>,
}

/// Analyzer reporting the same level in every bin.
pub struct MockAnalyzer {
    bins: usize,
    level: u8,
    reads: Rc<Cell<usize>>,
    disconnected: Rc<Cell<bool>>,
}

impl MockAnalyzer {
    pub fn new(bins: usize, level: u8) -> (Self, AnalyzerCounters) {
        let reads = Rc::new(Cell::new(0));
        let disconnected = Rc::new(Cell::new(false));
        let counters = AnalyzerCounters {
            reads: reads.clone(),
            disconnected: disconnected.clone(),
        };
        (
            MockAnalyzer {
                bins,
                level,
                reads,
                disconnected,
            },
            counters,
        )
    }
}

impl FrequencyAnalyzer for MockAnalyzer {
    fn bin_count(&self) -> usize {
        self.bins
    }

    fn byte_frequency_data(&mut self, bins: &mut [u8]) {
        self.reads.set(self.reads.get() + 1);
        bins.fill(self.level);
    }

    fn disconnect(&mut self) {
        self.disconnected.set(true);
    }
}

pub struct RecordingSurface {
    width: f32,
    height: f32,
    pub frames: Vec<SpectrumFrame>,
    pub idle: bool,
}

impl RecordingSurface {
    pub fn new(width: f32, height: f32) -> Self {
        RecordingSurface {
            width,
            height,
            frames: Vec::new(),
            idle: false,
        }
    }
}

impl VisualizationSurface for RecordingSurface {
    fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    fn draw(&mut self, frame: &SpectrumFrame) {
        self.frames.push(frame.clone());
    }

    fn idle(&mut self) {
        self.idle = true;
    }
}

/// Frame clock that ticks `limit` times, then optionally cancels a token
/// and never ticks again.
pub struct TickClock {
    limit: u64,
    ticks: u64,
    on_frame: Option<Box<dyn FnMut(u64)>>,
    cancel: Option<CancellationToken>,
}

impl TickClock {
    pub fn new(limit: u64) -> Self {
        TickClock {
            limit,
            ticks: 0,
            on_frame: None,
            cancel: None,
        }
    }

    /// Run `f` with the 1-based frame number before each frame resolves.
    pub fn on_frame(mut self, f: impl FnMut(u64) + 'static) -> Self {
        self.on_frame = Some(Box::new(f));
        self
    }

    pub fn cancel_when_done(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

#[async_trait(?Send)]
impl FrameClock for TickClock {
    async fn next_frame(&mut self) {
        tokio::task::yield_now().await;
        self.ticks += 1;
        if let Some(f) = self.on_frame.as_mut() {
            f(self.ticks);
        }
        if self.ticks > self.limit {
            if let Some(token) = &self.cancel {
                token.cancel();
            }
            std::future::pending::<()>().await;
        }
    }
}

/// Capture backend replaying one script of chunks per opened session.
pub struct MockCapture {
    log: EventLog,
    scripts: Vec<Vec<Vec<u8>>>,
    opened: usize,
    deny: bool,
    held: Option<FlushGate>,
}

/// Holds a stalled recorder's final flush until released.
#[derive(Clone, Default)]
pub struct FlushGate(Rc<RefCell<Option<(usize, mpsc::UnboundedSender<Vec<u8>>)>>>);

impl FlushGate {
    /// Deliver the final chunk and close the chunk channel.
    pub fn release(&self) {
        if let Some((n, tx)) = self.0.borrow_mut().take() {
            let _ = tx.send(format!("|tail{n}").into_bytes());
        }
    }
}

impl MockCapture {
    pub fn new(log: EventLog, scripts: Vec<Vec<Vec<u8>>>) -> Self {
        MockCapture {
            log,
            scripts,
            opened: 0,
            deny: false,
            held: None,
        }
    }

    /// Recorders whose final flush waits for the returned gate.
    pub fn stalling(log: EventLog) -> (Self, FlushGate) {
        let gate = FlushGate::default();
        let capture = MockCapture {
            held: Some(gate.clone()),
            ..MockCapture::new(log, Vec::new())
        };
        (capture, gate)
    }

    pub fn denying(log: EventLog) -> Self {
        MockCapture {
            deny: true,
            ..MockCapture::new(log, Vec::new())
        }
    }
}

#[async_trait(?Send)]
impl AudioCapture for MockCapture {
    async fn open(&mut self) -> Result<CaptureStream, VoxError> {
        if self.deny {
            self.log.borrow_mut().push("denied".to_string());
            return Err(VoxError::Permission("NotAllowedError".to_string()));
        }
        self.opened += 1;
        let n = self.opened;
        self.log.borrow_mut().push(format!("open:{n}"));

        let (tx, rx) = mpsc::unbounded_channel();
        for chunk in self.scripts.get(n - 1).cloned().unwrap_or_default() {
            tx.send(chunk).unwrap();
        }
        let (analyzer, _) = MockAnalyzer::new(8, 0);
        Ok(CaptureStream {
            mime: "audio/webm".to_string(),
            chunks: rx,
            device: Box::new(MockDevice {
                n,
                log: self.log.clone(),
                tx: Some(tx),
                held: self.held.clone(),
            }),
            analyzer: Box::new(analyzer),
        })
    }
}

struct MockDevice {
    n: usize,
    log: EventLog,
    tx: Option<mpsc::UnboundedSender<Vec<u8>>>,
    held: Option<FlushGate>,
}

impl CaptureDevice for MockDevice {
    fn finish_recording(&mut self) {
        self.log.borrow_mut().push(format!("finish:{}", self.n));
        let Some(tx) = self.tx.take() else {
            return;
        };
        match &self.held {
            Some(gate) => *gate.0.borrow_mut() = Some((self.n, tx)),
            None => {
                let _ = tx.send(format!("|tail{}", self.n).into_bytes());
            }
        }
    }

    fn release(&mut self) {
        self.log.borrow_mut().push(format!("release:{}", self.n));
    }
}

/// Renderer whose voices only end when the test says so.
#[derive(Clone)]
pub struct MockRenderer {
    pub log: EventLog,
    started: Rc<Cell<u64>>,
    endings: Rc<RefCell<HashMap<u64, oneshot::Sender<()>>>>,
}

impl MockRenderer {
    pub fn new(log: EventLog) -> Self {
        MockRenderer {
            log,
            started: Rc::new(Cell::new(0)),
            endings: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Let voice `n` reach its natural end.
    pub fn finish(&self, n: u64) {
        if let Some(tx) = self.endings.borrow_mut().remove(&n) {
            let _ = tx.send(());
        }
    }
}

#[async_trait(?Send)]
impl AudioRenderer for MockRenderer {
    async fn start(&mut self, media: &PlaybackMedia) -> Result<PlaybackHandle, VoxError> {
        let n = self.started.get() + 1;
        self.started.set(n);
        let label = match media {
            PlaybackMedia::Url(url) => url.clone(),
            PlaybackMedia::Encoded { mime, .. } => format!("encoded:{mime}"),
        };
        self.log.borrow_mut().push(format!("play:{n}:{label}"));

        let (tx, rx) = oneshot::channel();
        self.endings.borrow_mut().insert(n, tx);
        let (analyzer, _) = MockAnalyzer::new(8, 0);
        Ok(PlaybackHandle {
            voice: Box::new(MockVoice {
                n,
                log: self.log.clone(),
            }),
            analyzer: Box::new(analyzer),
            ended: rx,
        })
    }
}

struct MockVoice {
    n: u64,
    log: EventLog,
}

impl PlaybackVoice for MockVoice {
    fn halt(&mut self) {
        self.log.borrow_mut().push(format!("halt:{}", self.n));
    }
}

/// Remote service with a scripted reply, optionally held until a gate opens.
pub struct MockRemote {
    pub requests: RefCell<Vec<RemoteRequest>>,
    reply: Result<RemoteResponse, RemoteError>,
    gates: RefCell<VecDeque<oneshot::Receiver<()>>>,
}

impl MockRemote {
    pub fn replying(audio_url: &str) -> Self {
        MockRemote {
            requests: RefCell::new(Vec::new()),
            reply: Ok(RemoteResponse {
                audio_url: audio_url.to_string(),
                waveform_url: None,
                raw_audio_url: None,
            }),
            gates: RefCell::new(VecDeque::new()),
        }
    }

    pub fn failing(err: RemoteError) -> Self {
        MockRemote {
            reply: Err(err),
            ..MockRemote::replying("")
        }
    }

    /// Hold the next reply until the returned sender fires or is dropped.
    pub fn gated(self) -> (Self, oneshot::Sender<()>) {
        let (remote, mut senders) = self.gates(1);
        let tx = senders.remove(0);
        (remote, tx)
    }

    /// Hold each of the next `n` replies until its sender fires, in call order.
    pub fn gates(self, n: usize) -> (Self, Vec<oneshot::Sender<()>>) {
        let mut senders = Vec::with_capacity(n);
        for _ in 0..n {
            let (tx, rx) = oneshot::channel();
            self.gates.borrow_mut().push_back(rx);
            senders.push(tx);
        }
        (self, senders)
    }
}

#[async_trait(?Send)]
impl RemoteEffectService for MockRemote {
    async fn process(&self, request: &RemoteRequest) -> Result<RemoteResponse, RemoteError> {
        self.requests.borrow_mut().push(request.clone());
        let gate = self.gates.borrow_mut().pop_front();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.reply.clone()
    }
}
