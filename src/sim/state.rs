//! Round state and host-facing outputs
//!
//! Phase, timer and score bookkeeping, plus the events and snapshots a host
//! reads after each tick.

use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::block::GridPos;
use super::entity::{EntityId, EntityTag, MotionState};

/// Current phase of a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundPhase {
    /// Active gameplay
    Playing,
    /// Frozen by the host
    Paused,
    /// Door reached with every enemy dead
    Won,
    /// Out of lives or out of time
    Lost,
}

impl RoundPhase {
    /// Win/lose may only fire while the round is still open
    pub fn is_open(self) -> bool {
        matches!(self, RoundPhase::Playing | RoundPhase::Paused)
    }
}

/// Something that happened during a tick, for the host to react to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    EntityCreated { id: EntityId, tag: EntityTag },
    EntityDestroyed { id: EntityId, tag: EntityTag },
    BrickDestroyed { cell: GridPos },
    ScoreChanged { score: i64 },
    RoundWon,
    RoundLost,
}

/// Round countdown in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timer {
    seconds: f32,
}

impl Timer {
    pub fn new(seconds: f32) -> Self {
        Self { seconds }
    }

    pub fn seconds(&self) -> f32 {
        self.seconds
    }

    pub fn add_time(&mut self, seconds: f32) {
        self.seconds += seconds;
    }

    pub fn update(&mut self, dt: f32) {
        self.seconds -= dt;
    }

    pub fn is_expired(&self) -> bool {
        self.seconds < 0.0
    }
}

impl fmt::Display for Timer {
    /// `m:ss`, negative values shown as `0:00`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.seconds.max(0.0) as u32;
        write!(f, "{}:{:02}", total / 60, total % 60)
    }
}

/// Running score, may go negative
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreManager {
    score: i64,
}

impl ScoreManager {
    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn increase(&mut self, value: i64) {
        self.score += value;
    }

    pub fn reset(&mut self) {
        self.score = 0;
    }
}

/// Readable state of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityView {
    pub id: EntityId,
    pub tag: EntityTag,
    /// Top-left corner in pixels
    pub position: Vec2,
    pub dimension: Vec2,
    pub state: MotionState,
}

/// Everything a renderer needs after a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub phase: RoundPhase,
    pub timer: f32,
    pub score: i64,
    pub bomber_lives: Option<u32>,
    pub entities: Vec<EntityView>,
}
