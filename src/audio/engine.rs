use std::sync::Arc;

use crossbeam_channel::Sender;
use rand::Rng;

use crate::audio_api::{AudioCommand, NoteParams};
use crate::sequencer::{SequencerClock, StepEvent};

use super::effects::{DelayStage, DistortionStage, EffectToggles, ReverbStage};
use super::frame::StereoFrame;
use super::recorder::{CompletedRecording, Recorder};
use super::voice::Voice;

const MAX_VOICES: usize = 32; // hard cap so the pool never grows in the callback
const NOISE_SECONDS: f32 = 0.1;
const DEFAULT_MASTER_GAIN: f32 = 0.7;
const BUS_CAPACITY: usize = 4096;

/// The whole signal path, owned by whichever thread renders audio: voice
/// pool -> effect stages -> master gain, with the step clock and recorder
/// riding along. Fed commands between blocks; emits step ticks and finished
/// recordings through the channels wired in at startup.
pub struct Engine {
    sample_rate: f32,
    master_gain: f32,
    voices: Vec<Voice>,
    // one shared burst table; generating fresh noise per drum hit would
    // malloc in the callback
    noise: Arc<[f32]>,
    toggles: EffectToggles,
    distortion: DistortionStage,
    delay: DelayStage,
    reverb: ReverbStage,
    clock: SequencerClock,
    recorder: Recorder,
    bus: Vec<StereoFrame>, // pre-master scratch the voices mix into
    step_tx: Option<Sender<StepEvent>>,
    completed_tx: Option<Sender<CompletedRecording>>,
}

impl Engine {
    pub fn new(sample_rate: u32) -> Self {
        let sr = sample_rate as f32;
        let mut rng = rand::rng();
        let noise: Arc<[f32]> = (0..(NOISE_SECONDS * sr) as usize)
            .map(|_| rng.random_range(-1.0f32..1.0))
            .collect();

        Self {
            sample_rate: sr,
            master_gain: DEFAULT_MASTER_GAIN,
            voices: Vec::with_capacity(MAX_VOICES),
            noise,
            toggles: EffectToggles::default(),
            distortion: DistortionStage::new(),
            delay: DelayStage::new(sr),
            reverb: ReverbStage::new(sr),
            clock: SequencerClock::new(sr),
            recorder: Recorder::new(sample_rate),
            bus: vec![StereoFrame::zero(); BUS_CAPACITY],
            step_tx: None,
            completed_tx: None,
        }
    }

    pub fn set_step_tx(&mut self, tx: Sender<StepEvent>) {
        self.step_tx = Some(tx);
    }

    pub fn set_completed_tx(&mut self, tx: Sender<CompletedRecording>) {
        self.completed_tx = Some(tx);
    }

    pub fn handle_cmd(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::PlayNote(params) => self.spawn_voice(params),
            AudioCommand::StopVoice(id) => {
                // already-dead or unknown ids are fine; there's nothing to stop
                if let Some(voice) = self.voices.iter_mut().find(|v| v.id() == id) {
                    voice.stop();
                }
            }
            AudioCommand::StopAllVoices => {
                for voice in &mut self.voices {
                    voice.stop();
                }
            }
            AudioCommand::SetMasterGain(gain) => self.master_gain = gain.clamp(0.0, 1.0),
            AudioCommand::SetTempo(bpm) => self.clock.set_tempo(bpm),
            AudioCommand::SetEffect { name, on } => self.toggles.set(name, on),
            AudioCommand::PlaySequence => self.clock.play(),
            AudioCommand::StopSequence => self.clock.stop(),
            AudioCommand::StartCapture => {
                self.recorder.start();
            }
            AudioCommand::StopCapture => {
                if let Some(clip) = self.recorder.stop() {
                    if let Some(tx) = &self.completed_tx {
                        let _ = tx.try_send(clip);
                    }
                }
            }
        }
    }

    fn spawn_voice(&mut self, params: NoteParams) {
        let voice = Voice::new(
            params.voice_id,
            params.frequency,
            params.instrument,
            params.duration_secs,
            self.sample_rate,
            &self.noise,
        );
        if let Some(slot) = self.voices.iter_mut().find(|v| !v.is_active()) {
            *slot = voice;
        } else if self.voices.len() < MAX_VOICES {
            self.voices.push(voice);
        } else {
            self.voices[0] = voice; // pool full; steal a slot
        }
    }

    /// Fill `out` with the next block. Clock ticks are accounted first so a
    /// stop command handled this block already suppresses this block's ticks.
    pub fn render_block(&mut self, out: &mut [StereoFrame]) {
        let n = out.len();
        out.fill(StereoFrame::zero());
        if n > self.bus.len() {
            self.bus.resize(n, StereoFrame::zero());
        }
        let bus = &mut self.bus[..n];
        bus.fill(StereoFrame::zero());

        let step_tx = &self.step_tx;
        self.clock.advance(n as u64, |event| {
            if let Some(tx) = step_tx {
                let _ = tx.try_send(event);
            }
        });

        for voice in &mut self.voices {
            voice.render_into(bus);
        }

        // fixed topology: distortion shapes the bus in place, the bus always
        // reaches the mix dry, delay and reverb are parallel sends off it
        if self.toggles.distortion {
            self.distortion.process(bus);
        }
        for (o, b) in out.iter_mut().zip(bus.iter()) {
            o.add(*b);
        }
        self.delay.process(bus, out, self.toggles.delay);
        self.reverb.process(bus, out, self.toggles.reverb);

        for frame in out.iter_mut() {
            frame.scale(self.master_gain);
        }
        self.recorder.capture(out);
    }

    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    pub fn current_step(&self) -> u8 {
        self.clock.current_step()
    }

    pub fn is_sequencing(&self) -> bool {
        self.clock.is_playing()
    }
}
