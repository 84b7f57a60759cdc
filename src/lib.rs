//! muziq — the sound half of a browser-style music sketchpad: instrument
//! voices, an effects rack, a 16-step clock, and recording, behind one
//! [`AudioEngine`] facade. The grid/piano layers live elsewhere; they listen
//! for step events and call [`AudioEngine::play_note`] themselves.

pub mod audio;
pub mod audio_api;
pub mod engine;
pub mod note;
pub mod pattern;
pub mod sequencer;

pub use audio::{InstrumentKind, StereoFrame};
pub use engine::{AudioEngine, RecordedClip, VoiceHandle};
pub use pattern::Pattern;
pub use sequencer::{StepEvent, STEPS};
