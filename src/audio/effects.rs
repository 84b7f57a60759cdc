use rand::Rng;

use super::frame::StereoFrame;

// All three stages are built once per engine and live for its lifetime.
// Voices share them; none of them carries per-note state. Routing lives in
// engine.rs: distortion reshapes the bus in place before the dry path,
// delay and reverb are parallel sends that add their wet signal on top.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectName {
    Distortion,
    Delay,
    Reverb,
}

impl EffectName {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "distortion" => Some(EffectName::Distortion),
            "delay" => Some(EffectName::Delay),
            "reverb" => Some(EffectName::Reverb),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EffectName::Distortion => "distortion",
            EffectName::Delay => "delay",
            EffectName::Reverb => "reverb",
        }
    }
}

/// The three independent on/off switches, all off until someone toggles them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EffectToggles {
    pub distortion: bool,
    pub delay: bool,
    pub reverb: bool,
}

impl EffectToggles {
    fn slot(&mut self, name: EffectName) -> &mut bool {
        match name {
            EffectName::Distortion => &mut self.distortion,
            EffectName::Delay => &mut self.delay,
            EffectName::Reverb => &mut self.reverb,
        }
    }

    pub fn toggle(&mut self, name: EffectName) -> bool {
        let slot = self.slot(name);
        *slot = !*slot;
        *slot
    }

    pub fn set(&mut self, name: EffectName, on: bool) {
        *self.slot(name) = on;
    }

    pub fn is_on(&self, name: EffectName) -> bool {
        match name {
            EffectName::Distortion => self.distortion,
            EffectName::Delay => self.delay,
            EffectName::Reverb => self.reverb,
        }
    }

    /// String-keyed toggle; unknown names change nothing and return `None`.
    pub fn toggle_by_name(&mut self, name: &str) -> Option<bool> {
        Some(self.toggle(EffectName::from_name(name)?))
    }
}

// ── Distortion ────────────────────────────────────────────────────

const DISTORTION_AMOUNT: f32 = 400.0;
const CURVE_LEN: usize = 44100;

/// Waveshaper over a fixed soft-clip lookup table.
pub struct DistortionStage {
    curve: Vec<f32>,
}

impl DistortionStage {
    pub fn new() -> Self {
        let k = DISTORTION_AMOUNT;
        let deg = std::f32::consts::PI / 180.0;
        let curve = (0..CURVE_LEN)
            .map(|i| {
                let x = (i as f32 * 2.0) / CURVE_LEN as f32 - 1.0;
                ((3.0 + k) * x * 20.0 * deg) / (std::f32::consts::PI + k * x.abs())
            })
            .collect();
        Self { curve }
    }

    fn shape(&self, x: f32) -> f32 {
        let t = (x.clamp(-1.0, 1.0) + 1.0) * 0.5;
        let i = (t * (self.curve.len() - 1) as f32).round() as usize;
        self.curve[i]
    }

    pub fn process(&self, buf: &mut [StereoFrame]) {
        for frame in buf.iter_mut() {
            frame.left = self.shape(frame.left);
            frame.right = self.shape(frame.right);
        }
    }
}

// ── Delay ─────────────────────────────────────────────────────────

const DELAY_SECONDS: f32 = 0.3;
const DELAY_FEEDBACK: f32 = 0.3;
// feedback at 0.3 is inaudible after a handful of repeats
const DELAY_TAIL_LOOPS: usize = 5;

/// Single-tap delay line with feedback. The stage outlives the toggle: once
/// switched off it keeps draining its tail into the mix, which is what the
/// always-connected node graph in a web-audio patch would do.
pub struct DelayStage {
    line: Vec<StereoFrame>,
    pos: usize,
    tail: usize,
}

impl DelayStage {
    pub fn new(sample_rate: f32) -> Self {
        let len = ((DELAY_SECONDS * sample_rate) as usize).max(1);
        Self {
            line: vec![StereoFrame::zero(); len],
            pos: 0,
            tail: 0,
        }
    }

    pub fn process(&mut self, input: &[StereoFrame], out: &mut [StereoFrame], on: bool) {
        if on {
            self.tail = self.line.len() * DELAY_TAIL_LOOPS;
        } else if self.tail == 0 {
            return;
        }
        for (i, frame) in out.iter_mut().enumerate() {
            let x = if on { input[i] } else { StereoFrame::zero() };
            let wet = self.line[self.pos];
            self.line[self.pos] = StereoFrame {
                left: x.left + wet.left * DELAY_FEEDBACK,
                right: x.right + wet.right * DELAY_FEEDBACK,
            };
            self.pos = (self.pos + 1) % self.line.len();
            frame.add(wet);
            if !on {
                self.tail -= 1;
                if self.tail == 0 {
                    break;
                }
            }
        }
    }
}

// ── Reverb ────────────────────────────────────────────────────────

const REVERB_SECONDS: f32 = 2.0;
const REVERB_DECAY: f32 = 2.0;
// a full 88k-tap direct convolution doesn't fit in the render budget, so the
// live stage strides the impulse; sqrt(stride) makeup gain keeps the wet
// level where the dense impulse would have put it
const REVERB_TAP_STRIDE: usize = 64;

/// The convolution impulse: per channel, sample n is random in [-1, 1]
/// scaled by `(1 - n/len)^decay`. Generated once at startup.
pub fn reverb_impulse(duration_secs: f32, decay: f32, sample_rate: f32) -> [Vec<f32>; 2] {
    let len = ((duration_secs * sample_rate) as usize).max(1);
    let mut rng = rand::rng();
    [(); 2].map(|_| {
        (0..len)
            .map(|n| {
                let fade = (1.0 - n as f32 / len as f32).powf(decay);
                rng.random_range(-1.0f32..1.0) * fade
            })
            .collect()
    })
}

/// Convolution reverb over the generated impulse. Same tail rule as delay:
/// input goes silent when toggled off but the room keeps ringing.
pub struct ReverbStage {
    taps: Vec<(usize, f32, f32)>, // (offset, left gain, right gain)
    history: Vec<StereoFrame>,
    pos: usize,
    tail: usize,
}

impl ReverbStage {
    pub fn new(sample_rate: f32) -> Self {
        let [left, right] = reverb_impulse(REVERB_SECONDS, REVERB_DECAY, sample_rate);
        Self::with_impulse(&left, &right, REVERB_TAP_STRIDE)
    }

    /// Build from an explicit impulse; tests feed tiny ones with stride 1.
    pub fn with_impulse(left: &[f32], right: &[f32], stride: usize) -> Self {
        let stride = stride.max(1);
        let len = left.len().min(right.len()).max(1);
        let makeup = (stride as f32).sqrt();
        let taps = (0..len)
            .step_by(stride)
            .map(|n| (n, left[n] * makeup, right[n] * makeup))
            .collect();
        Self {
            taps,
            history: vec![StereoFrame::zero(); len],
            pos: 0,
            tail: 0,
        }
    }

    pub fn process(&mut self, input: &[StereoFrame], out: &mut [StereoFrame], on: bool) {
        if on {
            self.tail = self.history.len();
        } else if self.tail == 0 {
            return;
        }
        let len = self.history.len();
        for (i, frame) in out.iter_mut().enumerate() {
            let x = if on { input[i] } else { StereoFrame::zero() };
            self.history[self.pos] = x;
            let mut wet = StereoFrame::zero();
            for &(offset, gl, gr) in &self.taps {
                let past = self.history[(self.pos + len - offset) % len];
                wet.left += past.left * gl;
                wet.right += past.right * gr;
            }
            self.pos = (self.pos + 1) % len;
            frame.add(wet);
            if !on {
                self.tail -= 1;
                if self.tail == 0 {
                    break;
                }
            }
        }
    }
}
