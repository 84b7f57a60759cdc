//! The engine facade the grid/piano layers talk to. It mirrors control state
//! (tempo, toggles, instrument, transport) locally so queries and returned
//! booleans never need a round trip to the audio thread, and it is the only
//! place that knows whether audio is going to a device or an offline buffer.

use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crossbeam_channel::{Receiver, Sender};

use crate::audio::{
    self, next_voice_id, AudioHandle, CompletedRecording, EffectName, EffectToggles, Engine,
    InstrumentKind, StereoFrame, VoiceId,
};
use crate::audio_api::{AudioCommand, NoteParams};
use crate::sequencer::StepEvent;

// how long to wait for the audio thread to hand a stopped recording back
const CLIP_FINALIZE_WAIT: Duration = Duration::from_millis(500);

/// Handle to one triggered note. Stop is idempotent and harmless after the
/// voice has already decayed on its own; a handle for a rejected note is
/// inert.
pub struct VoiceHandle {
    id: VoiceId,
    tx: Option<Sender<AudioCommand>>,
}

impl VoiceHandle {
    pub fn id(&self) -> VoiceId {
        self.id
    }

    pub fn stop(&self) {
        if let Some(tx) = &self.tx {
            let _ = tx.try_send(AudioCommand::StopVoice(self.id));
        }
    }
}

/// One finalized recording, ready to encode.
#[derive(Clone, Debug)]
pub struct RecordedClip {
    pub frames: Vec<StereoFrame>,
    pub sample_rate: u32,
}

impl RecordedClip {
    pub fn duration_secs(&self) -> f32 {
        self.frames.len() as f32 / self.sample_rate as f32
    }

    pub fn write_wav(&self, path: &Path) -> anyhow::Result<()> {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for frame in &self.frames {
            writer.write_sample((frame.left.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
            writer.write_sample((frame.right.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
        Ok(())
    }
}

// offline rendering owns the engine directly; same channels, no device
struct OfflineBackend {
    engine: Engine,
    tx: Sender<AudioCommand>,
    rx: Receiver<AudioCommand>,
    step_rx: Receiver<StepEvent>,
    completed_rx: Receiver<CompletedRecording>,
}

impl OfflineBackend {
    fn pump(&mut self) {
        while let Ok(cmd) = self.rx.try_recv() {
            self.engine.handle_cmd(cmd);
        }
    }
}

enum Backend {
    Stream(AudioHandle),
    Offline(Box<OfflineBackend>),
}

pub struct AudioEngine {
    backend: Backend,
    sample_rate: u32,
    current_instrument: InstrumentKind,
    toggles: EffectToggles,
    tempo: u32,
    volume_percent: f32,
    sequencing: bool,
    recording: bool,
    awaiting_clip: bool,
    clip: Option<RecordedClip>,
}

impl AudioEngine {
    /// Open the default output device. Initialization failure comes back as
    /// an error, never a panic; there is nothing sensible to do without a
    /// backend so there is no half-constructed engine state.
    pub fn start() -> anyhow::Result<Self> {
        let handle = audio::start_audio()?;
        let sample_rate = handle.sample_rate();
        Ok(Self::with_backend(Backend::Stream(handle), sample_rate))
    }

    /// Deviceless engine driven by `render` calls. Used for bouncing to WAV
    /// and by every test in the crate.
    pub fn offline(sample_rate: u32) -> Self {
        let (tx, rx) = crossbeam_channel::bounded::<AudioCommand>(1024);
        let (step_tx, step_rx) = crossbeam_channel::bounded::<StepEvent>(256);
        let (completed_tx, completed_rx) = crossbeam_channel::bounded::<CompletedRecording>(16);
        let mut engine = Engine::new(sample_rate);
        engine.set_step_tx(step_tx);
        engine.set_completed_tx(completed_tx);
        Self::with_backend(
            Backend::Offline(Box::new(OfflineBackend {
                engine,
                tx,
                rx,
                step_rx,
                completed_rx,
            })),
            sample_rate,
        )
    }

    fn with_backend(backend: Backend, sample_rate: u32) -> Self {
        Self {
            backend,
            sample_rate,
            current_instrument: InstrumentKind::Piano,
            toggles: EffectToggles::default(),
            tempo: 120,
            volume_percent: 70.0,
            sequencing: false,
            recording: false,
            awaiting_clip: false,
            clip: None,
        }
    }

    fn send(&self, cmd: AudioCommand) {
        match &self.backend {
            Backend::Stream(handle) => handle.send(cmd),
            Backend::Offline(backend) => {
                let _ = backend.tx.try_send(cmd);
            }
        }
    }

    fn sender(&self) -> Sender<AudioCommand> {
        match &self.backend {
            Backend::Stream(handle) => handle.sender(),
            Backend::Offline(backend) => backend.tx.clone(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    // ── notes ─────────────────────────────────────────────────────

    /// Trigger one note. Non-positive frequency or duration is a silent
    /// no-op (creative tool, not a validating API); the returned handle is
    /// then inert.
    pub fn play_note(
        &mut self,
        frequency: f32,
        duration_secs: f32,
        instrument: Option<InstrumentKind>,
    ) -> VoiceHandle {
        let id = next_voice_id();
        if !(frequency > 0.0) || !(duration_secs > 0.0) {
            return VoiceHandle { id, tx: None };
        }
        self.send(AudioCommand::PlayNote(NoteParams {
            voice_id: id,
            frequency,
            duration_secs,
            instrument: instrument.unwrap_or(self.current_instrument),
        }));
        VoiceHandle {
            id,
            tx: Some(self.sender()),
        }
    }

    /// Kill everything currently sounding (window blur, "clear all").
    pub fn stop_all_notes(&mut self) {
        self.send(AudioCommand::StopAllVoices);
    }

    pub fn current_instrument(&self) -> InstrumentKind {
        self.current_instrument
    }

    pub fn set_instrument(&mut self, kind: InstrumentKind) {
        self.current_instrument = kind;
    }

    /// Accepts the names pattern data carries verbatim; unknown names leave
    /// the selection alone and report false.
    pub fn set_instrument_by_name(&mut self, name: &str) -> bool {
        match InstrumentKind::from_name(name) {
            Some(kind) => {
                self.current_instrument = kind;
                true
            }
            None => false,
        }
    }

    // ── mixer / effects ───────────────────────────────────────────

    /// Master volume in percent, clamped to 0..=100, mapped linearly to gain.
    /// Non-finite input is dropped; clamp would pass NaN straight through to
    /// the master gain.
    pub fn set_volume(&mut self, percent: f32) {
        if !percent.is_finite() {
            return;
        }
        self.volume_percent = percent.clamp(0.0, 100.0);
        self.send(AudioCommand::SetMasterGain(self.volume_percent / 100.0));
    }

    pub fn volume(&self) -> f32 {
        self.volume_percent
    }

    /// Flip one of {distortion, delay, reverb}; returns the new state, or
    /// `None` for a name we don't know (nothing changes).
    pub fn toggle_effect(&mut self, name: &str) -> Option<bool> {
        let effect = EffectName::from_name(name)?;
        let on = self.toggles.toggle(effect);
        self.send(AudioCommand::SetEffect { name: effect, on });
        Some(on)
    }

    pub fn effect_enabled(&self, name: &str) -> Option<bool> {
        Some(self.toggles.is_on(EffectName::from_name(name)?))
    }

    // ── sequencer ─────────────────────────────────────────────────

    pub fn set_tempo(&mut self, bpm: u32) {
        self.tempo = bpm.max(1);
        self.send(AudioCommand::SetTempo(self.tempo));
    }

    pub fn tempo(&self) -> u32 {
        self.tempo
    }

    pub fn play_sequence(&mut self) {
        if self.sequencing {
            return;
        }
        self.sequencing = true;
        self.send(AudioCommand::PlaySequence);
    }

    pub fn stop_sequence(&mut self) {
        self.sequencing = false;
        self.send(AudioCommand::StopSequence);
    }

    pub fn is_sequencing(&self) -> bool {
        self.sequencing
    }

    /// Step ticks land here while the sequencer plays; the grid layer drains
    /// this and fires `play_note` per active cell.
    pub fn step_events(&self) -> &Receiver<StepEvent> {
        match &self.backend {
            Backend::Stream(handle) => handle.step_rx(),
            Backend::Offline(backend) => &backend.step_rx,
        }
    }

    // ── recording ─────────────────────────────────────────────────

    pub fn start_recording(&mut self) -> bool {
        if self.recording {
            return false;
        }
        self.recording = true;
        self.send(AudioCommand::StartCapture);
        true
    }

    pub fn stop_recording(&mut self) -> bool {
        if !self.recording {
            return false;
        }
        self.recording = false;
        self.awaiting_clip = true;
        self.send(AudioCommand::StopCapture);
        true
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Write the finalized clip as `muziq-creation-<unix_ms>.wav` under
    /// `dir`. False while no clip has finalized; true again for the same
    /// clip until a newer one replaces it.
    pub fn download_recording(&mut self, dir: &Path) -> bool {
        self.poll_clip();
        let Some(clip) = &self.clip else {
            return false;
        };
        let path = dir.join(clip_filename());
        match clip.write_wav(&path) {
            Ok(()) => {
                log::info!("wrote recording to {}", path.display());
                true
            }
            Err(e) => {
                log::warn!("failed to write recording: {e}");
                false
            }
        }
    }

    /// Take the finalized clip instead of writing it anywhere.
    pub fn take_recording(&mut self) -> Option<RecordedClip> {
        self.poll_clip();
        self.clip.take()
    }

    fn poll_clip(&mut self) {
        if let Backend::Offline(backend) = &mut self.backend {
            backend.pump(); // a stopped capture finalizes on the next pump
        }
        let completed_rx = match &self.backend {
            Backend::Stream(handle) => handle.completed_rx(),
            Backend::Offline(backend) => &backend.completed_rx,
        };
        // the audio thread finalizes asynchronously; give it a moment when a
        // stop is in flight, otherwise just drain
        if self.awaiting_clip {
            if let Ok(clip) = completed_rx.recv_timeout(CLIP_FINALIZE_WAIT) {
                self.clip = Some(RecordedClip {
                    frames: clip.frames,
                    sample_rate: clip.sample_rate,
                });
                self.awaiting_clip = false;
            }
        }
        while let Ok(clip) = completed_rx.try_recv() {
            self.clip = Some(RecordedClip {
                frames: clip.frames,
                sample_rate: clip.sample_rate,
            });
            self.awaiting_clip = false;
        }
    }

    // ── backends ──────────────────────────────────────────────────

    /// Restart a paused output stream (platform autoplay policies suspend
    /// streams out from under us). Offline engines are always "running".
    pub fn resume(&mut self) -> bool {
        match &self.backend {
            Backend::Stream(handle) => handle.resume(),
            Backend::Offline(_) => true,
        }
    }

    /// Drive an offline engine: drain pending commands, then render the next
    /// block into `out`. Returns false (and renders nothing) on a live
    /// stream, where the device owns the render cadence.
    pub fn render(&mut self, out: &mut [StereoFrame]) -> bool {
        match &mut self.backend {
            Backend::Stream(_) => false,
            Backend::Offline(backend) => {
                backend.pump();
                backend.engine.render_block(out);
                true
            }
        }
    }
}

fn clip_filename() -> String {
    let unix_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    format!("muziq-creation-{unix_ms}.wav")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 44100;

    fn render_secs(engine: &mut AudioEngine, secs: f32) {
        let total = (secs * SR as f32) as usize;
        let mut out = vec![StereoFrame::zero(); 512];
        let mut done = 0;
        while done < total {
            assert!(engine.render(&mut out));
            done += out.len();
        }
    }

    #[test]
    fn fresh_engine_defaults() {
        let engine = AudioEngine::offline(SR);
        assert_eq!(engine.tempo(), 120);
        assert_eq!(engine.volume(), 70.0);
        assert_eq!(engine.current_instrument(), InstrumentKind::Piano);
        assert!(!engine.is_sequencing());
        assert!(!engine.is_recording());
        assert_eq!(engine.effect_enabled("reverb"), Some(false));
        assert_eq!(engine.effect_enabled("delay"), Some(false));
        assert_eq!(engine.effect_enabled("distortion"), Some(false));
    }

    #[test]
    fn toggle_effect_round_trip() {
        let mut engine = AudioEngine::offline(SR);
        assert_eq!(engine.toggle_effect("delay"), Some(true));
        assert_eq!(engine.toggle_effect("delay"), Some(false));
        assert_eq!(engine.toggle_effect("delay"), Some(true));
        assert_eq!(engine.toggle_effect("wobble"), None);
        assert_eq!(engine.effect_enabled("delay"), Some(true));
    }

    #[test]
    fn volume_clamps_and_rejects_non_finite() {
        let mut engine = AudioEngine::offline(SR);
        engine.set_volume(250.0);
        assert_eq!(engine.volume(), 100.0);
        engine.set_volume(-5.0);
        assert_eq!(engine.volume(), 0.0);
        engine.set_volume(40.0);
        engine.set_volume(f32::NAN);
        assert_eq!(engine.volume(), 40.0);
        engine.set_volume(f32::INFINITY);
        assert_eq!(engine.volume(), 40.0);
        // the mix must stay clean after a rejected volume
        engine.play_note(440.0, 0.2, Some(InstrumentKind::Piano));
        let mut out = vec![StereoFrame::zero(); 512];
        engine.render(&mut out);
        assert!(out.iter().all(|f| f.left.is_finite() && f.right.is_finite()));
    }

    #[test]
    fn unknown_instrument_keeps_selection() {
        let mut engine = AudioEngine::offline(SR);
        assert!(engine.set_instrument_by_name("bell"));
        assert!(!engine.set_instrument_by_name("kazoo"));
        assert_eq!(engine.current_instrument(), InstrumentKind::Bell);
    }

    #[test]
    fn invalid_note_params_are_inert() {
        let mut engine = AudioEngine::offline(SR);
        let handle = engine.play_note(-440.0, 1.0, None);
        handle.stop(); // must not do anything, must not panic
        let handle = engine.play_note(440.0, 0.0, None);
        handle.stop();
        render_secs(&mut engine, 0.05);
    }

    #[test]
    fn sequencer_scenario_retempo_restart() {
        let mut engine = AudioEngine::offline(SR);
        engine.set_tempo(90);
        engine.play_sequence();
        // 5 ticks at 90 bpm: interval is 60/90/4 s
        let tick = (60.0 / 90.0 / 4.0 * SR as f32) as usize;
        let mut out = vec![StereoFrame::zero(); tick];
        for _ in 0..5 {
            engine.render(&mut out);
        }
        let steps: Vec<u8> = engine.step_events().try_iter().map(|e| e.step).collect();
        assert_eq!(steps, vec![0, 1, 2, 3, 4]);
        // changing tempo mid-playback restarts the clock from step 0
        engine.set_tempo(90);
        for _ in 0..2 {
            engine.render(&mut out);
        }
        let steps: Vec<u8> = engine.step_events().try_iter().map(|e| e.step).collect();
        assert_eq!(steps, vec![0, 1], "retempo must begin again at step 0");
    }

    #[test]
    fn recording_booleans() {
        let mut engine = AudioEngine::offline(SR);
        assert!(!engine.stop_recording(), "stop before start");
        assert!(!engine.download_recording(Path::new("/tmp")), "download before any clip");
        assert!(engine.start_recording());
        assert!(!engine.start_recording(), "double start");
        render_secs(&mut engine, 0.05);
        assert!(engine.stop_recording());
        assert!(!engine.stop_recording(), "double stop");
        let clip = engine.take_recording().expect("clip after start/stop");
        assert!(clip.duration_secs() > 0.04);
    }

    #[test]
    fn download_is_repeatable_for_one_clip() {
        let dir = std::env::temp_dir().join(format!("muziq-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut engine = AudioEngine::offline(SR);
        engine.play_note(440.0, 0.5, Some(InstrumentKind::Synth));
        engine.start_recording();
        render_secs(&mut engine, 0.1);
        engine.stop_recording();
        assert!(engine.download_recording(&dir));
        assert!(engine.download_recording(&dir), "same clip, still downloadable");
        let wavs: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| {
                let name = e.file_name().to_string_lossy().into_owned();
                name.starts_with("muziq-creation-") && name.ends_with(".wav")
            })
            .collect();
        assert!(!wavs.is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn recorded_clip_contains_the_note() {
        let mut engine = AudioEngine::offline(SR);
        engine.start_recording();
        engine.play_note(440.0, 0.2, Some(InstrumentKind::Piano));
        render_secs(&mut engine, 0.1);
        engine.stop_recording();
        let clip = engine.take_recording().unwrap();
        assert!(clip.frames.iter().any(|f| !f.is_silent()));
        // clip taken; nothing left to download
        assert!(!engine.download_recording(Path::new("/tmp")));
    }

    #[test]
    fn resume_is_true_offline() {
        let mut engine = AudioEngine::offline(SR);
        assert!(engine.resume());
    }
}
