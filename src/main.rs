//! Slide Racer headless runner
//!
//! Plays one level at a fixed 60 Hz frame rate without a window and logs what
//! happens. Useful for checking a config and seed before handing them to a
//! front end.
//!
//! Usage: `slide-racer [config.json] [--seed N] [--seconds S]`

use std::process::ExitCode;

use slide_racer::SimConfig;
use slide_racer::sim::{Advancer, LevelState, SimEvent, TickInput};

const FRAME_DT: f32 = 1.0 / 60.0;

struct Args {
    config: Option<String>,
    seed: Option<u64>,
    seconds: f32,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        config: None,
        seed: None,
        seconds: 60.0,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--seed" => {
                let value = iter.next().ok_or("--seed needs a value")?;
                args.seed = Some(value.parse().map_err(|e| format!("bad seed: {e}"))?);
            }
            "--seconds" => {
                let value = iter.next().ok_or("--seconds needs a value")?;
                args.seconds = value.parse().map_err(|e| format!("bad seconds: {e}"))?;
            }
            _ if arg.starts_with("--") => return Err(format!("unknown flag {arg}")),
            _ => args.config = Some(arg),
        }
    }
    Ok(args)
}

fn run(args: Args) -> slide_racer::Result<()> {
    let mut config = match &args.config {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    let mut state = LevelState::new(config)?;
    let mut advancer = Advancer::new();
    let frames = (args.seconds / FRAME_DT).ceil() as u64;

    for frame in 0..frames {
        // Weave side to side every second
        let input = TickInput {
            pointer_dx: (frame % 60 == 0).then(|| if frame % 120 == 0 { 1.0 } else { -1.0 }),
            ..Default::default()
        };
        advancer.advance(&mut state, &input, FRAME_DT)?;

        for event in state.drain_events() {
            match event {
                SimEvent::HealthDepleted(entity) => log::info!("{:?} out of health", entity),
                SimEvent::Removed { entity, cause } => {
                    log::debug!("{:?} removed: {:?}", entity, cause)
                }
                SimEvent::LevelFinished { score } => {
                    log::info!("level finished, score {:.0}", score)
                }
            }
        }
        if state.is_finished() {
            break;
        }
    }

    let height = state.viewport.bottom();
    println!(
        "ticks: {}  height: {:.1}  score: {:.0}  finished: {}",
        state.time_ticks,
        height,
        state.score,
        state.is_finished()
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    log::info!("Slide Racer (headless) starting...");

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            eprintln!("usage: slide-racer [config.json] [--seed N] [--seconds S]");
            return ExitCode::FAILURE;
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("simulation failed: {e}");
            ExitCode::FAILURE
        }
    }
}
