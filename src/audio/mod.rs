use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};

use crate::audio_api::AudioCommand;
use crate::sequencer::StepEvent;

mod effects;
mod engine;
mod frame;
mod instrument;
mod recorder;
mod voice;
mod voice_id;

pub use effects::{reverb_impulse, DelayStage, DistortionStage, EffectName, EffectToggles, ReverbStage};
pub use engine::Engine;
pub use frame::StereoFrame;
pub use instrument::{InstrumentKind, Waveform};
pub use recorder::{CompletedRecording, Recorder};
pub use voice::{Envelope, Voice};
pub use voice_id::{next_voice_id, VoiceId};

/// Control-thread handle to a live output stream. Dropping it tears the
/// stream down; voices and ticks die with it.
pub struct AudioHandle {
    tx: Sender<AudioCommand>,
    step_rx: Receiver<StepEvent>,
    completed_rx: Receiver<CompletedRecording>,
    sample_rate: u32,
    stream: cpal::Stream,
}

impl AudioHandle {
    pub fn send(&self, cmd: AudioCommand) {
        let _ = self.tx.try_send(cmd);
    }

    pub fn sender(&self) -> Sender<AudioCommand> {
        self.tx.clone()
    }

    pub fn step_rx(&self) -> &Receiver<StepEvent> {
        &self.step_rx
    }

    pub fn completed_rx(&self) -> &Receiver<CompletedRecording> {
        &self.completed_rx
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Kick a paused/suspended stream back into motion.
    pub fn resume(&self) -> bool {
        self.stream.play().is_ok()
    }
}

pub fn start_audio() -> anyhow::Result<AudioHandle> {
    let (tx, rx) = crossbeam_channel::bounded::<AudioCommand>(1024);
    let (step_tx, step_rx) = crossbeam_channel::bounded::<StepEvent>(256);
    let (completed_tx, completed_rx) = crossbeam_channel::bounded::<CompletedRecording>(16);

    let host = cpal::default_host();
    let device = host.default_output_device().context("no default output device")?;
    let config = device.default_output_config().context("no default output config")?;

    let sample_rate = config.sample_rate();
    let channels = config.channels() as usize;

    match config.sample_format() {
        cpal::SampleFormat::F32 => {
            let stream = build_output_stream_f32(
                &device,
                &config.into(),
                rx,
                step_tx,
                completed_tx,
                channels,
                sample_rate,
            )?;
            stream.play().context("failed to play output stream")?;

            Ok(AudioHandle {
                tx,
                step_rx,
                completed_rx,
                sample_rate,
                stream,
            })
        }
        other => anyhow::bail!("unsupported sample format {other} (only f32 supported for now)"),
    }
}

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    rx: Receiver<AudioCommand>,
    step_tx: Sender<StepEvent>,
    completed_tx: Sender<CompletedRecording>,
    channels: usize,
    sample_rate: u32,
) -> anyhow::Result<cpal::Stream> {
    let mut engine = Engine::new(sample_rate);
    engine.set_step_tx(step_tx);
    engine.set_completed_tx(completed_tx);

    // stereo scratch; the device buffer may carry any channel count
    let mut scratch: Vec<StereoFrame> = Vec::new();

    let err_fn = |err| log::error!("audio output stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _info| {
            while let Ok(cmd) = rx.try_recv() {
                engine.handle_cmd(cmd);
            }

            let n_frames = data.len() / channels;
            if scratch.len() < n_frames {
                scratch.resize(n_frames, StereoFrame::zero());
            }
            engine.render_block(&mut scratch[..n_frames]);

            for (i, frame) in data.chunks_mut(channels).enumerate() {
                frame[0] = scratch[i].left;
                if channels > 1 {
                    frame[1] = scratch[i].right;
                }
                for extra in frame.iter_mut().skip(2) {
                    *extra = 0.0;
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}
