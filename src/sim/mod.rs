//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed physics step only
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - No rendering or platform dependencies

pub mod block;
pub mod bomb;
pub mod bomber;
pub mod enemy;
pub mod engine;
pub mod entity;
pub mod physics;
pub mod power_up;
pub mod state;
pub mod strategy;
pub mod tick;
pub mod world;

pub use block::{Block, BlockKind, Grid, GridPos};
pub use bomb::{Bomb, Fire};
pub use bomber::{Bomber, BomberStats};
pub use enemy::{Enemy, EnemyKind};
pub use engine::EntityEngine;
pub use entity::{Direction, Entity, EntityCore, EntityId, EntityKind, EntityTag, MotionState, PhysicsEntity};
pub use physics::{Body, BodyHandle, BodyKind, PhysicsWorld, Shape};
pub use power_up::{PowerUp, PowerUpKind, SkullEffect};
pub use state::{EntityView, GameEvent, RoundPhase, ScoreManager, Snapshot, Timer};
pub use strategy::{MoveStrategy, PersistStrategy, WanderStrategy};
pub use tick::{Command, TickInput, tick};
pub use world::{ExplosionReport, LogicWorld, WorldState};
