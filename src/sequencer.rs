//! The step clock. Sixteen sixteenth-note slots, driven by rendered frame
//! counts rather than wall time so ticks are deterministic and testable.
//! Listeners get `StepEvent`s through whatever channel the engine wires in.

pub const STEPS: u8 = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepEvent {
    pub step: u8,
}

/// Stopped/Playing state machine. Playing counts down frames and fires the
/// current step each time a full interval elapses, then advances mod 16.
#[derive(Clone, Debug)]
pub struct SequencerClock {
    sample_rate: f32,
    tempo: u32,
    playing: bool,
    current_step: u8,
    frames_until_tick: u64,
}

impl SequencerClock {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            tempo: 120,
            playing: false,
            current_step: 0,
            frames_until_tick: 0,
        }
    }

    /// Frames in one sixteenth note at the current tempo: (60 / bpm / 4) * sr.
    pub fn frames_per_step(&self) -> u64 {
        (((60.0 / self.tempo as f32 / 4.0) * self.sample_rate) as u64).max(1)
    }

    pub fn tempo(&self) -> u32 {
        self.tempo
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn current_step(&self) -> u8 {
        self.current_step
    }

    /// No-op when already playing. Otherwise rewinds to step 0 and arms the
    /// counter so the first tick (step 0) lands one full interval from now,
    /// like an interval timer would.
    pub fn play(&mut self) {
        if self.playing {
            return;
        }
        self.playing = true;
        self.current_step = 0;
        self.frames_until_tick = self.frames_per_step();
    }

    /// Cancels all future ticks and rewinds. Safe when already stopped.
    /// Voices triggered by past ticks are not this clock's problem.
    pub fn stop(&mut self) {
        self.playing = false;
        self.current_step = 0;
        self.frames_until_tick = 0;
    }

    /// Retempo restarts the clock when playing so the new interval takes
    /// effect immediately; that also rewinds to step 0, same as the original
    /// stop/start pair.
    pub fn set_tempo(&mut self, bpm: u32) {
        self.tempo = bpm.max(1);
        if self.playing {
            self.stop();
            self.play();
        }
    }

    /// Account for `frames` rendered frames, firing `emit` once per elapsed
    /// interval. Does nothing while stopped, so a stop racing a queued block
    /// simply drops that block's ticks.
    pub fn advance(&mut self, frames: u64, mut emit: impl FnMut(StepEvent)) {
        if !self.playing {
            return;
        }
        let mut remaining = frames;
        while remaining >= self.frames_until_tick {
            remaining -= self.frames_until_tick;
            emit(StepEvent { step: self.current_step });
            self.current_step = (self.current_step + 1) % STEPS;
            self.frames_until_tick = self.frames_per_step();
        }
        self.frames_until_tick -= remaining;
    }
}
