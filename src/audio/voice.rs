use std::sync::Arc;

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz};

use super::frame::StereoFrame;
use super::instrument::{InstrumentKind, Waveform};
use super::voice_id::VoiceId;

// below this the envelope can't be heard; the voice kills itself
const AMP_FLOOR: f32 = 0.0005;

/// Exponential decay envelope, the sample-rate port of web-audio's
/// `exponentialRampToValueAtTime`: level(t) = start * (target/start)^(t/T).
#[derive(Clone, Copy, Debug)]
pub struct Envelope {
    level: f32,
    decay_mul: f32,
}

impl Envelope {
    pub fn exponential(start: f32, target: f32, seconds: f32, sample_rate: f32) -> Self {
        Self {
            level: start,
            decay_mul: (target / start).powf(1.0 / (seconds * sample_rate)),
        }
    }

    fn next(&mut self) -> f32 {
        let level = self.level;
        self.level *= self.decay_mul;
        level
    }

    pub fn level(&self) -> f32 {
        self.level
    }
}

#[derive(Clone, Debug)]
struct Osc {
    phase: f32,
    phase_inc: f32,
    waveform: Waveform,
    weight: f32,
}

impl Osc {
    fn new(frequency: f32, waveform: Waveform, weight: f32, sample_rate: f32) -> Self {
        Self {
            phase: 0.0,
            phase_inc: frequency / sample_rate,
            waveform,
            weight,
        }
    }

    fn next(&mut self) -> f32 {
        let sample = self.waveform.sample(self.phase) * self.weight;
        self.phase += self.phase_inc;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        sample
    }
}

// what actually produces samples, one variant per synthesis structure
enum Source {
    Oscillator(Osc),
    // bell: fundamental plus two upper partials, all under one envelope
    Partials([Osc; 3]),
    // drum: finite white-noise burst through a band-pass at the note's pitch
    Noise {
        table: Arc<[f32]>,
        pos: usize,
        filter: Option<DirectForm2Transposed<f32>>,
    },
}

/// One sounding note. Owns its source and envelope exclusively, never reused.
/// Dies on its own when the envelope floors out, the noise burst runs dry,
/// or the scheduled duration elapses; `stop` is always safe to call again.
pub struct Voice {
    id: VoiceId,
    source: Source,
    env: Envelope,
    frames_left: u64,
    active: bool,
}

impl Voice {
    pub fn new(
        id: VoiceId,
        frequency: f32,
        instrument: InstrumentKind,
        duration_secs: f32,
        sample_rate: f32,
        noise: &Arc<[f32]>,
    ) -> Self {
        let (source, env) = match instrument {
            InstrumentKind::Piano => (
                Source::Oscillator(Osc::new(frequency, Waveform::Triangle, 1.0, sample_rate)),
                Envelope::exponential(0.3, 0.01, 1.0, sample_rate),
            ),
            InstrumentKind::Synth => (
                Source::Oscillator(Osc::new(frequency, Waveform::Sawtooth, 1.0, sample_rate)),
                Envelope::exponential(0.4, 0.01, 0.5, sample_rate),
            ),
            InstrumentKind::Bell => (
                Source::Partials([
                    Osc::new(frequency, Waveform::Sine, 1.0, sample_rate),
                    Osc::new(frequency * 2.0, Waveform::Sine, 0.1, sample_rate),
                    Osc::new(frequency * 3.0, Waveform::Sine, 0.05, sample_rate),
                ]),
                Envelope::exponential(0.2, 0.001, 2.0, sample_rate),
            ),
            InstrumentKind::Drum => (
                Source::Noise {
                    table: noise.clone(),
                    pos: 0,
                    filter: band_pass(frequency, sample_rate),
                },
                Envelope::exponential(0.5, 0.01, 0.1, sample_rate),
            ),
        };

        Self {
            id,
            source,
            env,
            frames_left: ((duration_secs * sample_rate) as u64).max(1),
            active: true,
        }
    }

    pub fn id(&self) -> VoiceId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn stop(&mut self) {
        self.active = false;
    }

    /// Mix this voice into `out`, advancing its state. Goes inactive in place
    /// once it has nothing left to say.
    pub fn render_into(&mut self, out: &mut [StereoFrame]) {
        if !self.active {
            return;
        }
        for frame in out.iter_mut() {
            if self.frames_left == 0 {
                self.active = false;
                break;
            }
            let level = self.env.next();
            if level < AMP_FLOOR {
                self.active = false;
                break;
            }
            let sample = match &mut self.source {
                Source::Oscillator(osc) => osc.next(),
                Source::Partials(oscs) => oscs.iter_mut().map(Osc::next).sum::<f32>(),
                Source::Noise { table, pos, filter } => {
                    if *pos >= table.len() {
                        self.active = false;
                        break;
                    }
                    let raw = table[*pos];
                    *pos += 1;
                    match filter {
                        Some(f) => f.run(raw),
                        None => raw,
                    }
                }
            };
            frame.add(StereoFrame::splat(sample * level));
            self.frames_left -= 1;
        }
    }
}

// Q = 1 band-pass centered on the note. `from_params` only fails for
// frequencies at or above Nyquist, which the clamp rules out; if it still
// objects we play the noise unfiltered rather than blow up the audio thread.
fn band_pass(frequency: f32, sample_rate: f32) -> Option<DirectForm2Transposed<f32>> {
    let center = frequency.clamp(20.0, sample_rate * 0.45);
    let coeffs =
        Coefficients::<f32>::from_params(biquad::Type::BandPass, sample_rate.hz(), center.hz(), 1.0)
            .ok()?;
    Some(DirectForm2Transposed::<f32>::new(coeffs))
}
