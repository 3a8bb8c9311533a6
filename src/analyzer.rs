//! Analyzer taps and the per-frame visualization loop.
//!
//! A session owns its [`AnalyzerTap`]; everything else only ever sees a
//! [`TapHandle`], which cannot outlive the tap. Once the session tears the
//! tap down, every handle reads as dead and loops holding one stop on
//! their next frame.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use async_trait::async_trait;
use log::debug;
use tokio_util::sync::CancellationToken;

use crate::visual::{SpectrumFrame, VisualStyle, VisualizationSurface};

/// Host capability: a live frequency-analysis node attached to an audio graph.
pub trait FrequencyAnalyzer {
    /// Bins exposed per read (half the transform window).
    fn bin_count(&self) -> usize;

    /// Fill `bins` with current magnitudes scaled to 0..=255.
    fn byte_frequency_data(&mut self, bins: &mut [u8]);

    /// Detach from the audio graph. Called once, when the tap is destroyed.
    fn disconnect(&mut self);
}

/// Identifies one capture or playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct TapNode {
    analyzer: RefCell<Box<dyn FrequencyAnalyzer>>,
}

/// Owning side of an analyzer tap. Dropping it disconnects the node.
pub struct AnalyzerTap {
    node: Rc<TapNode>,
    session: SessionId,
    bin_count: usize,
}

impl AnalyzerTap {
    pub fn new(session: SessionId, analyzer: Box<dyn FrequencyAnalyzer>) -> Self {
        let bin_count = analyzer.bin_count();
        AnalyzerTap {
            node: Rc::new(TapNode {
                analyzer: RefCell::new(analyzer),
            }),
            session,
            bin_count,
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn bin_count(&self) -> usize {
        self.bin_count
    }

    pub fn handle(&self) -> TapHandle {
        TapHandle {
            node: Rc::downgrade(&self.node),
            session: self.session,
            bin_count: self.bin_count,
        }
    }
}

impl Drop for AnalyzerTap {
    fn drop(&mut self) {
        if let Ok(mut analyzer) = self.node.analyzer.try_borrow_mut() {
            analyzer.disconnect();
        }
        debug!("analyzer tap for session {} destroyed", self.session);
    }
}

/// Non-owning view of a tap.
#[derive(Clone)]
pub struct TapHandle {
    node: Weak<TapNode>,
    session: SessionId,
    bin_count: usize,
}

impl TapHandle {
    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn bin_count(&self) -> usize {
        self.bin_count
    }

    pub fn is_live(&self) -> bool {
        self.node.strong_count() > 0
    }

    /// Read the current bins. Returns `false`, leaving `bins` untouched,
    /// once the owning session has destroyed the tap.
    pub fn sample(&self, bins: &mut [u8]) -> bool {
        let Some(node) = self.node.upgrade() else {
            return false;
        };
        node.analyzer.borrow_mut().byte_frequency_data(bins);
        true
    }
}

impl fmt::Debug for TapHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TapHandle")
            .field("session", &self.session)
            .field("bin_count", &self.bin_count)
            .field("live", &self.is_live())
            .finish()
    }
}

/// Host capability: resolves once per display refresh.
#[async_trait(?Send)]
pub trait FrameClock {
    async fn next_frame(&mut self);
}

/// Why a loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The owning session's token was cancelled.
    Cancelled,
    /// The tap was destroyed under the loop.
    TapDestroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Drawn,
    Exit(LoopExit),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopReport {
    pub exit: LoopExit,
    pub frames: u64,
}

/// Samples a tap once per display frame and paints it.
pub struct FrequencyAnalyzerLoop {
    tap: TapHandle,
    cancel: CancellationToken,
    style: VisualStyle,
    bins: Vec<u8>,
    frames: u64,
}

impl FrequencyAnalyzerLoop {
    /// `cancel` should be the owning session's token.
    pub fn new(tap: TapHandle, cancel: CancellationToken, style: VisualStyle) -> Self {
        let bins = vec![0; tap.bin_count()];
        FrequencyAnalyzerLoop {
            tap,
            cancel,
            style,
            bins,
            frames: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled() && self.tap.is_live()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Run one display frame.
    pub fn tick<S: VisualizationSurface + ?Sized>(&mut self, surface: &mut S) -> Tick {
        if self.cancel.is_cancelled() {
            return Tick::Exit(LoopExit::Cancelled);
        }
        if !self.tap.sample(&mut self.bins) {
            return Tick::Exit(LoopExit::TapDestroyed);
        }
        let (width, height) = surface.size();
        surface.draw(&SpectrumFrame::build(self.style, &self.bins, width, height));
        self.frames += 1;
        Tick::Drawn
    }

    /// Drive the loop from `clock` until the session ends.
    pub async fn run<C, S>(mut self, clock: &mut C, surface: &mut S) -> LoopReport
    where
        C: FrameClock + ?Sized,
        S: VisualizationSurface + ?Sized,
    {
        let exit = loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break LoopExit::Cancelled,
                _ = clock.next_frame() => {}
            }
            if let Tick::Exit(exit) = self.tick(surface) {
                break exit;
            }
        };
        surface.idle();
        debug!(
            "analyzer loop for session {} stopped after {} frames ({exit:?})",
            self.tap.session(),
            self.frames
        );
        LoopReport {
            exit,
            frames: self.frames,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockAnalyzer, RecordingSurface, TickClock};

    #[test]
    fn handle_dies_with_tap() {
        let (analyzer, counters) = MockAnalyzer::new(128, 42);
        let tap = AnalyzerTap::new(SessionId(1), Box::new(analyzer));
        let handle = tap.handle();

        let mut bins = vec![0u8; 128];
        assert!(handle.sample(&mut bins));
        assert!(bins.iter().all(|&b| b == 42));

        drop(tap);
        assert!(!handle.is_live());
        assert!(counters.disconnected.get());
        bins.fill(0);
        assert!(!handle.sample(&mut bins));
        assert!(bins.iter().all(|&b| b == 0));
        assert_eq!(counters.reads.get(), 1);
    }

    #[test]
    fn tick_stops_on_cancel() {
        let (analyzer, counters) = MockAnalyzer::new(8, 255);
        let tap = AnalyzerTap::new(SessionId(3), Box::new(analyzer));
        let token = CancellationToken::new();
        let mut surface = RecordingSurface::new(80.0, 20.0);
        let mut lp = FrequencyAnalyzerLoop::new(tap.handle(), token.clone(), VisualStyle::Bars);

        assert_eq!(lp.tick(&mut surface), Tick::Drawn);
        token.cancel();
        assert!(!lp.is_active());
        assert_eq!(lp.tick(&mut surface), Tick::Exit(LoopExit::Cancelled));
        assert_eq!(counters.reads.get(), 1);
        assert_eq!(surface.frames.len(), 1);
    }

    #[tokio::test]
    async fn run_exits_when_tap_is_destroyed() {
        let (analyzer, counters) = MockAnalyzer::new(16, 10);
        let tap = AnalyzerTap::new(SessionId(7), Box::new(analyzer));
        let lp = FrequencyAnalyzerLoop::new(tap.handle(), CancellationToken::new(), VisualStyle::Line);

        let mut slot = Some(tap);
        let mut clock = TickClock::new(100).on_frame(move |n| {
            if n == 4 {
                slot.take();
            }
        });
        let mut surface = RecordingSurface::new(160.0, 50.0);
        let report = lp.run(&mut clock, &mut surface).await;

        assert_eq!(report.exit, LoopExit::TapDestroyed);
        assert_eq!(report.frames, 3);
        assert_eq!(counters.reads.get(), 3);
        assert!(surface.idle);
        assert!(matches!(surface.frames[0], SpectrumFrame::Line(ref pts) if pts.len() == 17));
    }

    #[tokio::test]
    async fn run_exits_on_session_cancel() {
        let (analyzer, _counters) = MockAnalyzer::new(16, 10);
        let tap = AnalyzerTap::new(SessionId(8), Box::new(analyzer));
        let token = CancellationToken::new();
        let lp = FrequencyAnalyzerLoop::new(tap.handle(), token.clone(), VisualStyle::Bars);

        let mut clock = TickClock::new(5).cancel_when_done(token);
        let mut surface = RecordingSurface::new(160.0, 50.0);
        let report = lp.run(&mut clock, &mut surface).await;

        assert_eq!(report.exit, LoopExit::Cancelled);
        assert_eq!(report.frames, 5);
        assert!(tap.handle().is_live());
    }
}
