use super::frame::StereoFrame;

/// A finalized capture, shipped back to the control thread for encoding.
#[derive(Clone, Debug)]
pub struct CompletedRecording {
    pub frames: Vec<StereoFrame>,
    pub sample_rate: u32,
}

/// Idle/Recording tap on the post-mixer output. Accumulates one chunk per
/// rendered block; stop concatenates them into a single clip.
pub struct Recorder {
    sample_rate: u32,
    recording: bool,
    chunks: Vec<Vec<StereoFrame>>,
}

impl Recorder {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            recording: false,
            chunks: Vec::new(),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Idle -> Recording; false (and no state change) when already recording.
    pub fn start(&mut self) -> bool {
        if self.recording {
            return false;
        }
        self.recording = true;
        self.chunks.clear();
        true
    }

    /// Recording -> Idle, yielding the finalized clip. None when idle.
    pub fn stop(&mut self) -> Option<CompletedRecording> {
        if !self.recording {
            return None;
        }
        self.recording = false;
        let total: usize = self.chunks.iter().map(Vec::len).sum();
        let mut frames = Vec::with_capacity(total);
        for chunk in self.chunks.drain(..) {
            frames.extend_from_slice(&chunk);
        }
        Some(CompletedRecording {
            frames,
            sample_rate: self.sample_rate,
        })
    }

    pub fn capture(&mut self, block: &[StereoFrame]) {
        if self.recording {
            self.chunks.push(block.to_vec());
        }
    }
}
