pub use crate::audio::{CompletedRecording, EffectName, InstrumentKind, StereoFrame, VoiceId};
pub use crate::sequencer::StepEvent;

#[derive(Clone, Copy, Debug)]
pub struct NoteParams {
    pub voice_id: VoiceId,
    pub frequency: f32,
    pub duration_secs: f32,
    pub instrument: InstrumentKind,
}

/// Everything the control thread may ask of the engine. Commands are drained
/// at the top of each render callback, so effects of a command are only
/// observable from the following block onward.
#[derive(Clone, Copy, Debug)]
pub enum AudioCommand {
    PlayNote(NoteParams),
    StopVoice(VoiceId),
    StopAllVoices,
    // master gain 0.0..=1.0; the facade owns the 0..100 percent mapping
    SetMasterGain(f32),
    SetTempo(u32),
    SetEffect { name: EffectName, on: bool },
    PlaySequence,
    StopSequence,
    StartCapture,
    StopCapture,
}
