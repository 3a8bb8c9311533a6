//! Effect catalogue and routing.
//!
//! Which effects render locally and which go to the remote service is a
//! fixed table, not something inferred: the two paths differ in latency
//! and in how they fail.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dsp::offline::FilterKind;

/// Voice effects applied by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceEffect {
    Chipmunk,
    Robot,
    Echo,
    Electronic,
    Stutter,
    Whisper,
    Distortion,
    Reverse,
    Monster,
    Telephone,
    /// Server-side denoise.
    #[serde(rename = "process_voice")]
    Denoise,
}

impl VoiceEffect {
    pub fn id(self) -> &'static str {
        match self {
            VoiceEffect::Chipmunk => "chipmunk",
            VoiceEffect::Robot => "robot",
            VoiceEffect::Echo => "echo",
            VoiceEffect::Electronic => "electronic",
            VoiceEffect::Stutter => "stutter",
            VoiceEffect::Whisper => "whisper",
            VoiceEffect::Distortion => "distortion",
            VoiceEffect::Reverse => "reverse",
            VoiceEffect::Monster => "monster",
            VoiceEffect::Telephone => "telephone",
            VoiceEffect::Denoise => "process_voice",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Effect {
    Filter(FilterKind),
    Voice(VoiceEffect),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Offline filter engine + WAV encoder, in process.
    Local(FilterKind),
    /// Remote effect service.
    Remote(VoiceEffect),
}

/// Every selectable effect.
pub const EFFECTS: [Effect; 15] = [
    Effect::Filter(FilterKind::LowpassNoise),
    Effect::Filter(FilterKind::HighpassEcho),
    Effect::Filter(FilterKind::BandpassMusic),
    Effect::Filter(FilterKind::NotchSiren),
    Effect::Voice(VoiceEffect::Chipmunk),
    Effect::Voice(VoiceEffect::Robot),
    Effect::Voice(VoiceEffect::Echo),
    Effect::Voice(VoiceEffect::Electronic),
    Effect::Voice(VoiceEffect::Stutter),
    Effect::Voice(VoiceEffect::Whisper),
    Effect::Voice(VoiceEffect::Distortion),
    Effect::Voice(VoiceEffect::Reverse),
    Effect::Voice(VoiceEffect::Monster),
    Effect::Voice(VoiceEffect::Telephone),
    Effect::Voice(VoiceEffect::Denoise),
];

impl Effect {
    pub fn id(self) -> &'static str {
        match self {
            Effect::Filter(kind) => kind.id(),
            Effect::Voice(voice) => voice.id(),
        }
    }

    pub fn route(self) -> Route {
        match self {
            Effect::Filter(kind) => Route::Local(kind),
            Effect::Voice(voice) => Route::Remote(voice),
        }
    }

    pub fn is_local(self) -> bool {
        matches!(self.route(), Route::Local(_))
    }

    pub fn from_id(id: &str) -> Option<Effect> {
        EFFECTS.into_iter().find(|e| e.id() == id)
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Effect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Effect::from_id(s).ok_or_else(|| format!("unknown effect '{s}'"))
    }
}
