//! Round configuration
//!
//! Plain values the host hands to the simulation at round start.

use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::{SimError, SimResult};

/// Smallest grid side that still leaves room for the spawn area inside the border
pub const MIN_GRID_SIDE: usize = 5;

/// Parameters of a single round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundConfig {
    /// Grid width in cells
    pub grid_width: usize,
    /// Grid height in cells
    pub grid_height: usize,
    /// Side of a square cell in pixels
    pub tile_size: f32,
    /// Number of breakable bricks to scatter
    pub brick_count: u32,
    /// Number of enemies to spawn
    pub enemy_count: u32,
    /// Round countdown in seconds
    pub timer_seconds: u32,
    /// Seed for every random draw in the round
    pub seed: u64,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            grid_width: 19,
            grid_height: 15,
            tile_size: TILE_SIZE,
            brick_count: MIN_BRICK_BLOCKS,
            enemy_count: MIN_ENEMIES,
            timer_seconds: INIT_TIMER_VALUE,
            seed: 0,
        }
    }
}

impl RoundConfig {
    /// Random round: 25-54 bricks, 1-4 enemies, default timer
    pub fn random_round<R: Rng>(rng: &mut R, seed: u64) -> Self {
        Self {
            brick_count: MIN_BRICK_BLOCKS + rng.random_range(0..EXTRA_BRICK_BLOCKS),
            enemy_count: MIN_ENEMIES + rng.random_range(0..EXTRA_ENEMIES),
            seed,
            ..Self::default()
        }
    }

    /// Number of cells a brick may be placed on
    ///
    /// Every non-wall cell outside the protected top-left spawn square.
    pub fn brick_candidates(&self) -> usize {
        let mut count = 0;
        for x in 1..self.grid_width.saturating_sub(1) {
            for y in 1..self.grid_height.saturating_sub(1) {
                let wall = x % 2 == 0 && y % 2 == 0;
                let spawn = x < SPAWN_AREA && y < SPAWN_AREA;
                if !wall && !spawn {
                    count += 1;
                }
            }
        }
        count
    }

    /// Reject parameters that cannot produce a playable round
    pub fn validate(&self) -> SimResult<()> {
        if self.grid_width < MIN_GRID_SIDE || self.grid_height < MIN_GRID_SIDE {
            return Err(SimError::InvalidConfig(format!(
                "grid {}x{} is smaller than {}x{}",
                self.grid_width, self.grid_height, MIN_GRID_SIDE, MIN_GRID_SIDE
            )));
        }
        if !(self.tile_size > 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "tile size must be positive, got {}",
                self.tile_size
            )));
        }
        let candidates = self.brick_candidates();
        if self.brick_count as usize > candidates {
            return Err(SimError::InvalidConfig(format!(
                "{} bricks requested but only {} cells can hold one",
                self.brick_count, candidates
            )));
        }
        if u64::from(self.brick_count) + u64::from(self.enemy_count) > candidates as u64 {
            return Err(SimError::ResourceExhausted("not enough free cells for bricks and enemies"));
        }
        Ok(())
    }

    /// Parse a configuration from JSON, filling missing fields with defaults
    pub fn from_json(json: &str) -> SimResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| SimError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file, or the defaults when it cannot be read
    pub fn load(path: &Path) -> SimResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(json) => {
                let config = Self::from_json(&json)?;
                log::info!("Loaded round config from {}", path.display());
                Ok(config)
            }
            Err(e) => {
                log::warn!("Could not read {} ({}), using default round config", path.display(), e);
                Ok(Self::default())
            }
        }
    }
}
