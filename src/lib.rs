//! Bomber Sim - real-time core of a grid-based bomb-placing arcade game
//!
//! Core modules:
//! - `sim`: Deterministic simulation (physics, grid, entities, explosions, round state)
//! - `config`: Round parameters handed in by the host at round start
//! - `error`: Failure taxonomy for round setup and strategy misuse

pub mod config;
pub mod error;
pub mod sim;

pub use config::RoundConfig;
pub use error::{SimError, SimResult};
pub use sim::{LogicWorld, TickInput, tick};

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// Fixed physics sub-step in seconds, independent of the host frame time
    pub const PHYSICS_STEP: f32 = 0.033;
    /// Host frame time the game was tuned for (~30 Hz)
    pub const FRAME_DT: f32 = 0.033;

    /// Scale between physics units (metres) and pixels
    pub const WORLD_SCALE: f32 = 100.0;
    /// Proportional constant applied to speed when turning it into a velocity
    pub const IMPULSE_ACTION: f32 = 0.8;
    /// Default square tile size in pixels
    pub const TILE_SIZE: f32 = 32.0;
    /// Dynamic body radius as a fraction of the tile size (radius = tile / 2.5)
    pub const BODY_RADIUS_DIVISOR: f32 = 2.5;

    /// Bomber defaults
    pub const BOMBER_INIT_LIVES: u32 = 3;
    pub const BOMBER_INIT_BOMBS: u32 = 1;
    pub const BOMBER_INIT_SPEED: f32 = 1.0;
    pub const BOMBER_MIN_SPEED: f32 = 1.0;
    pub const BOMBER_MAX_SPEED: f32 = 4.0;
    pub const SPEED_INCREMENT: f32 = 0.5;

    /// Explosion range
    pub const INIT_FIRE_RANGE: u32 = 1;
    pub const FIRE_MAX_RANGE: u32 = 10;
    pub const FIRE_RANGE_INCREMENT: i32 = 1;

    /// Entity lifetimes in ticks
    pub const BOMB_TIME: i32 = 100;
    pub const FIRE_TIME: i32 = 40;
    pub const POWERUP_TIME: i32 = 550;

    /// Round timer
    pub const INIT_TIMER_VALUE: u32 = 150;
    pub const TIMER_INCREMENT: f32 = 30.0;
    /// Time taken by the skull debuff (integer quarter of the increment)
    pub const SKULL_TIME_PENALTY: f32 = 7.0;

    /// Scoring
    pub const BLOCK_SCORE: i64 = 50;
    pub const BOMBER_DIE_SCORE: i64 = -200;
    pub const SCORE_WIN: i64 = 1000;

    /// Random round generation
    pub const MIN_BRICK_BLOCKS: u32 = 25;
    pub const EXTRA_BRICK_BLOCKS: u32 = 30;
    pub const MIN_ENEMIES: u32 = 1;
    pub const EXTRA_ENEMIES: u32 = 4;

    /// Side of the protected top-left spawn square, in cells
    pub const SPAWN_AREA: usize = 3;
}

/// Radius of every dynamic entity body for a given tile size
#[inline]
pub fn body_radius(tile_size: f32) -> f32 {
    tile_size / consts::BODY_RADIUS_DIVISOR
}

/// Velocity magnitude (px/s) produced by a move command at `speed`
#[inline]
pub fn move_velocity(speed: f32) -> f32 {
    speed * consts::IMPULSE_ACTION * consts::WORLD_SCALE
}

/// Whether `point` lies in the half-open square `[origin, origin + size)`
#[inline]
pub fn square_contains(origin: Vec2, size: f32, point: Vec2) -> bool {
    point.x >= origin.x && point.x < origin.x + size && point.y >= origin.y && point.y < origin.y + size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_radius_fits_tile() {
        let r = body_radius(32.0);
        assert!((r - 12.8).abs() < 1e-5);
        assert!(r * 2.0 < 32.0);
    }

    #[test]
    fn test_square_contains_is_half_open() {
        let origin = Vec2::new(32.0, 64.0);
        assert!(square_contains(origin, 32.0, Vec2::new(32.0, 64.0)));
        assert!(square_contains(origin, 32.0, Vec2::new(63.9, 95.9)));
        assert!(!square_contains(origin, 32.0, Vec2::new(64.0, 70.0)));
        assert!(!square_contains(origin, 32.0, Vec2::new(40.0, 96.0)));
    }
}
