//! Fixed timestep simulation tick
//!
//! Host input for one frame is a list of commands, applied in order before the
//! world advances.

use serde::{Deserialize, Serialize};

use super::entity::Direction;
use super::world::LogicWorld;
use crate::error::SimResult;

/// A single host command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Direction key went down
    Press(Direction),
    /// Direction key went up
    Release(Direction),
    /// Drop a bomb under the bomber
    PlaceBomb,
    /// Pause or resume
    TogglePause,
}

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickInput {
    pub commands: Vec<Command>,
}

impl TickInput {
    pub fn with(commands: Vec<Command>) -> Self {
        Self { commands }
    }
}

/// Apply the frame's commands, then advance the world by one tick
pub fn tick(world: &mut LogicWorld, input: &TickInput, dt: f32) -> SimResult<()> {
    for command in &input.commands {
        world.apply_command(*command);
    }
    world.update(dt)
}
