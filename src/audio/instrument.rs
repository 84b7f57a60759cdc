// The closed set of instruments plus the raw waveforms they synthesize from.
// Per-instrument envelope/partial structure lives in voice.rs where the
// voices get built; this file is just the vocabulary.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstrumentKind {
    Piano,
    Synth,
    Bell,
    Drum,
}

impl InstrumentKind {
    pub const ALL: [InstrumentKind; 4] = [
        InstrumentKind::Piano,
        InstrumentKind::Synth,
        InstrumentKind::Bell,
        InstrumentKind::Drum,
    ];

    /// Unknown names are a caller problem; we just say no.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "piano" => Some(InstrumentKind::Piano),
            "synth" => Some(InstrumentKind::Synth),
            "bell" => Some(InstrumentKind::Bell),
            "drum" => Some(InstrumentKind::Drum),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            InstrumentKind::Piano => "piano",
            InstrumentKind::Synth => "synth",
            InstrumentKind::Bell => "bell",
            InstrumentKind::Drum => "drum",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
    Sawtooth,
}

impl Waveform {
    // phase normalized to [0, 1); all shapes start at 0 like web-audio's do
    pub fn sample(self, phase: f32) -> f32 {
        match self {
            Waveform::Sine => (phase * std::f32::consts::TAU).sin(),
            Waveform::Triangle => {
                if phase < 0.25 {
                    4.0 * phase
                } else if phase < 0.75 {
                    2.0 - 4.0 * phase
                } else {
                    4.0 * phase - 4.0
                }
            }
            Waveform::Sawtooth => {
                if phase < 0.5 {
                    2.0 * phase
                } else {
                    2.0 * phase - 2.0
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instrument_names_round_trip() {
        for kind in InstrumentKind::ALL {
            assert_eq!(InstrumentKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(InstrumentKind::from_name("theremin"), None);
        assert_eq!(InstrumentKind::from_name(""), None);
    }

    #[test]
    fn waveforms_stay_in_range() {
        for wf in [Waveform::Sine, Waveform::Triangle, Waveform::Sawtooth] {
            for i in 0..1000 {
                let s = wf.sample(i as f32 / 1000.0);
                assert!((-1.0..=1.0).contains(&s), "{wf:?} out of range: {s}");
            }
        }
    }

    #[test]
    fn waveforms_start_at_zero() {
        for wf in [Waveform::Sine, Waveform::Triangle, Waveform::Sawtooth] {
            assert_eq!(wf.sample(0.0), 0.0);
        }
    }

    #[test]
    fn triangle_peaks_at_quarter_phase() {
        assert!((Waveform::Triangle.sample(0.25) - 1.0).abs() < 1e-6);
        assert!((Waveform::Triangle.sample(0.75) + 1.0).abs() < 1e-6);
    }
}
