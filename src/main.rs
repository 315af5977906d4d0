//! Bomber Sim entry point
//!
//! Headless runner: loads a round configuration, plays one round with no
//! input at 30 Hz and prints the final snapshot as JSON.

use std::path::Path;
use std::process::ExitCode;

use bomber_sim::consts::FRAME_DT;
use bomber_sim::sim::{GameEvent, RoundPhase, TickInput, tick};
use bomber_sim::{LogicWorld, RoundConfig, SimResult};

/// Three minutes of play at 30 Hz, longer than the default round timer
const MAX_TICKS: u32 = 30 * 60 * 3;

fn main() -> ExitCode {
    env_logger::init();
    log::info!("Bomber Sim (headless) starting...");

    let config = match std::env::args().nth(1) {
        Some(path) => RoundConfig::load(Path::new(&path)),
        None => Ok(RoundConfig::default()),
    };

    match config.and_then(run) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config: RoundConfig) -> SimResult<()> {
    log::info!(
        "Round config: {}x{} grid, {} bricks, {} enemies, {}s, seed {}",
        config.grid_width,
        config.grid_height,
        config.brick_count,
        config.enemy_count,
        config.timer_seconds,
        config.seed
    );
    let mut world = LogicWorld::new(config)?;
    let input = TickInput::default();

    let mut ticks = 0;
    while ticks < MAX_TICKS && world.phase() == RoundPhase::Playing {
        tick(&mut world, &input, FRAME_DT)?;
        ticks += 1;
        for event in world.drain_events() {
            match event {
                GameEvent::EntityCreated { .. } | GameEvent::EntityDestroyed { .. } => log::trace!("{:?}", event),
                _ => log::info!("[{} {}] {:?}", ticks, world.timer(), event),
            }
        }
    }

    log::info!("Stopped after {} ticks in phase {:?}", ticks, world.phase());
    match serde_json::to_string_pretty(&world.snapshot()) {
        Ok(json) => println!("{}", json),
        Err(e) => log::error!("Could not serialize snapshot: {}", e),
    }
    Ok(())
}
