// Demo driver: play one of the built-in patterns (or a decoded share
// string) through the default output, or bounce it offline to a WAV.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use muziq::{AudioEngine, Pattern, StereoFrame};

const USAGE: &str = "\
usage: muziq [PRESET] [options]
  PRESET             kick | snare | hihat | bass | melody | chord | random
  --share STRING     play a shared pattern instead of a preset
  --fx LIST          comma list of distortion,delay,reverb to switch on
  --bars N           how many 16-step bars to play (default 2)
  --bounce FILE      render offline to FILE instead of the speakers";

// same note length the grid uses when it fires a cell
const STEP_NOTE_SECS: f32 = 0.2;

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut preset = String::from("melody");
    let mut share: Option<String> = None;
    let mut bounce: Option<PathBuf> = None;
    let mut fx: Vec<String> = Vec::new();
    let mut bars: u32 = 2;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--share" => {
                share = Some(args.get(i + 1).context("--share needs a value")?.clone());
                i += 2;
            }
            "--bounce" => {
                bounce = Some(PathBuf::from(
                    args.get(i + 1).context("--bounce needs a path")?,
                ));
                i += 2;
            }
            "--fx" => {
                fx = args
                    .get(i + 1)
                    .context("--fx needs a value")?
                    .split(',')
                    .map(str::to_string)
                    .collect();
                i += 2;
            }
            "--bars" => {
                bars = args
                    .get(i + 1)
                    .context("--bars needs a value")?
                    .parse()
                    .context("--bars wants a number")?;
                i += 2;
            }
            "--help" | "-h" => {
                println!("{USAGE}");
                return Ok(());
            }
            other if !other.starts_with('-') => {
                preset = other.to_string();
                i += 1;
            }
            other => anyhow::bail!("unknown flag {other}\n{USAGE}"),
        }
    }

    let pattern = match share {
        Some(encoded) => {
            Pattern::from_share_string(&encoded).context("could not decode share string")?
        }
        None if preset == "random" => Pattern::random(),
        None => Pattern::preset(&preset)
            .with_context(|| format!("no preset named {preset:?}\n{USAGE}"))?,
    };

    let ticks = bars.max(1) * 16;
    match bounce {
        Some(path) => bounce_to_wav(&pattern, &fx, ticks, &path),
        None => play_live(&pattern, &fx, ticks),
    }
}

fn apply_setup(engine: &mut AudioEngine, pattern: &Pattern, fx: &[String]) {
    pattern.apply_to(engine);
    for name in fx {
        if engine.toggle_effect(name).is_none() {
            log::warn!("ignoring unknown effect {name:?}");
        }
    }
}

fn play_live(pattern: &Pattern, fx: &[String], ticks: u32) -> anyhow::Result<()> {
    let mut engine = AudioEngine::start()?;
    apply_setup(&mut engine, pattern, fx);
    let steps = engine.step_events().clone();

    engine.play_sequence();
    let mut fired = 0;
    while fired < ticks {
        let event = steps
            .recv_timeout(Duration::from_secs(2))
            .context("audio stream stalled")?;
        for frequency in pattern.frequencies_at(event.step as usize) {
            engine.play_note(frequency, STEP_NOTE_SECS, None);
        }
        fired += 1;
    }
    engine.stop_sequence();
    std::thread::sleep(Duration::from_millis(600)); // let tails ring out
    Ok(())
}

fn bounce_to_wav(
    pattern: &Pattern,
    fx: &[String],
    ticks: u32,
    path: &std::path::Path,
) -> anyhow::Result<()> {
    const SAMPLE_RATE: u32 = 44100;
    let mut engine = AudioEngine::offline(SAMPLE_RATE);
    apply_setup(&mut engine, pattern, fx);
    let steps = engine.step_events().clone();

    engine.start_recording();
    engine.play_sequence();
    let mut out = vec![StereoFrame::zero(); 512];
    let mut fired = 0;
    while fired < ticks {
        engine.render(&mut out);
        while let Ok(event) = steps.try_recv() {
            for frequency in pattern.frequencies_at(event.step as usize) {
                engine.play_note(frequency, STEP_NOTE_SECS, None);
            }
            fired += 1;
        }
    }
    engine.stop_sequence();
    for _ in 0..(SAMPLE_RATE as usize / out.len() + 1) {
        engine.render(&mut out); // a second of decay tail
    }
    engine.stop_recording();

    let clip = engine.take_recording().context("recording never finalized")?;
    clip.write_wav(path)?;
    println!("wrote {} ({:.1}s)", path.display(), clip.duration_secs());
    Ok(())
}
