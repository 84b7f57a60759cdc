//! Pattern data as the grid exchanges it: a boolean matrix indexed
//! [note][step], the ordered note names those rows mean, plus the tempo and
//! instrument to restore. The engine itself never reads this; callers walk
//! the active cells and trigger notes themselves.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use crate::engine::AudioEngine;
use crate::note::frequency_of_name;
use crate::sequencer::STEPS;

pub const DEFAULT_NOTES: [&str; 8] = ["C5", "B4", "A4", "G4", "F4", "E4", "D4", "C4"];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub grid: Vec<Vec<bool>>,
    pub note_names: Vec<String>,
    pub tempo: u32,
    pub instrument: String,
}

impl Pattern {
    pub fn empty() -> Self {
        Self {
            grid: vec![vec![false; STEPS as usize]; DEFAULT_NOTES.len()],
            note_names: DEFAULT_NOTES.iter().map(|s| s.to_string()).collect(),
            tempo: 120,
            instrument: "piano".to_string(),
        }
    }

    /// The built-in seed patterns the original sketchpad ships with.
    pub fn preset(name: &str) -> Option<Self> {
        let (notes, steps): (&[usize], &[usize]) = match name {
            "kick" => (&[7], &[0, 4, 8, 12]),
            "snare" => (&[5], &[4, 12]),
            "hihat" => (&[1], &[2, 6, 10, 14]),
            "bass" => (&[7, 6], &[0, 2, 4, 6, 8, 10, 12, 14]),
            "melody" => (&[0, 1, 2, 3], &[0, 2, 4, 7, 8, 11, 12, 15]),
            "chord" => (&[4, 2, 0], &[0, 8]),
            _ => return None,
        };
        let mut pattern = Self::empty();
        for &note in notes {
            for &step in steps {
                pattern.set(note, step, true);
            }
        }
        Some(pattern)
    }

    /// Random but weighted toward the beat: base density 0.3, scaled up on
    /// downbeats and on-beats.
    pub fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::rng();
        let mut pattern = Self::empty();
        for note in 0..pattern.grid.len() {
            for step in 0..STEPS as usize {
                let mut probability = 0.3;
                if step % 4 == 0 {
                    probability *= 1.5;
                }
                if step % 2 == 0 {
                    probability *= 1.2;
                }
                if rng.random::<f32>() < probability {
                    pattern.set(note, step, true);
                }
            }
        }
        pattern
    }

    pub fn is_active(&self, note: usize, step: usize) -> bool {
        self.grid
            .get(note)
            .and_then(|row| row.get(step))
            .copied()
            .unwrap_or(false)
    }

    pub fn set(&mut self, note: usize, step: usize, on: bool) {
        if let Some(cell) = self.grid.get_mut(note).and_then(|row| row.get_mut(step)) {
            *cell = on;
        }
    }

    pub fn toggle(&mut self, note: usize, step: usize) {
        let on = self.is_active(note, step);
        self.set(note, step, !on);
    }

    pub fn clear(&mut self) {
        for row in &mut self.grid {
            row.fill(false);
        }
    }

    /// Frequencies to trigger on a given step, one per active row. Rows
    /// whose note name doesn't parse are skipped quietly.
    pub fn frequencies_at(&self, step: usize) -> Vec<f32> {
        self.note_names
            .iter()
            .enumerate()
            .filter(|(note, _)| self.is_active(*note, step))
            .filter_map(|(_, name)| frequency_of_name(name))
            .collect()
    }

    /// Push tempo and instrument into the engine verbatim. An instrument
    /// name the engine doesn't know leaves its selection alone.
    pub fn apply_to(&self, engine: &mut AudioEngine) {
        engine.set_tempo(self.tempo);
        engine.set_instrument_by_name(&self.instrument);
    }

    // ── sharing ───────────────────────────────────────────────────

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Option<Self> {
        serde_json::from_str(json).ok()
    }

    /// URL-safe share string: base64 over the JSON form, same scheme the
    /// web sketchpad put in its share links.
    pub fn to_share_string(&self) -> String {
        BASE64.encode(self.to_json())
    }

    pub fn from_share_string(encoded: &str) -> Option<Self> {
        let bytes = BASE64.decode(encoded.trim()).ok()?;
        Self::from_json(std::str::from_utf8(&bytes).ok()?)
    }
}

impl Default for Pattern {
    fn default() -> Self {
        Self::empty()
    }
}
