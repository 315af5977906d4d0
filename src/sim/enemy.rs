//! Enemies

use serde::{Deserialize, Serialize};

use super::block::{Block, Grid};
use super::engine::EntityEngine;
use super::entity::{EntityCore, EntityId, EntityKind, PhysicsEntity};
use super::physics::{BodyKind, PhysicsWorld};
use super::strategy::{MoveStrategy, PersistStrategy, WanderStrategy};
use super::world::WorldState;
use crate::error::SimResult;

/// Enemy archetypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnemyKind {
    Barom,
    Maron,
    Minvo,
    Onil,
    Pontan,
}

impl EnemyKind {
    pub const ALL: [EnemyKind; 5] = [
        EnemyKind::Barom,
        EnemyKind::Maron,
        EnemyKind::Minvo,
        EnemyKind::Onil,
        EnemyKind::Pontan,
    ];

    pub fn speed(self) -> f32 {
        match self {
            EnemyKind::Barom | EnemyKind::Onil => 0.6,
            EnemyKind::Maron | EnemyKind::Minvo => 1.0,
            EnemyKind::Pontan => 0.8,
        }
    }

    /// Score awarded when killed
    pub fn score(self) -> i64 {
        match self {
            EnemyKind::Barom => 500,
            EnemyKind::Maron => 700,
            EnemyKind::Minvo => 300,
            EnemyKind::Onil => 200,
            EnemyKind::Pontan => 250,
        }
    }

    pub fn strategy(self) -> Box<dyn MoveStrategy> {
        match self {
            EnemyKind::Barom | EnemyKind::Maron => Box::new(PersistStrategy::new()),
            EnemyKind::Minvo | EnemyKind::Onil | EnemyKind::Pontan => Box::new(WanderStrategy::new()),
        }
    }
}

#[derive(Debug)]
pub struct Enemy {
    kind: EnemyKind,
    strategy: Box<dyn MoveStrategy>,
}

impl Enemy {
    /// Spawn an enemy of `kind` with its top-left corner on `block`
    pub fn spawn(engine: &mut EntityEngine, block: &Block, grid: &Grid, kind: EnemyKind) -> SimResult<EntityId> {
        let core = EntityCore::new(
            engine.physics_mut(),
            block.position(),
            1,
            kind.speed(),
            true,
            grid.tile_size(),
        )
        .with_body_kind(engine.physics_mut(), BodyKind::Dynamic);
        let mut strategy = kind.strategy();
        if let Err(e) = strategy.bind(&core, grid) {
            if let Some(body) = core.body() {
                engine.physics_mut().destroy_body(body);
            }
            return Err(e);
        }
        Ok(engine.add(core, EntityKind::Enemy(Self { kind, strategy })))
    }

    pub fn kind(&self) -> EnemyKind {
        self.kind
    }

    pub fn strategy(&self) -> &dyn MoveStrategy {
        self.strategy.as_ref()
    }

    pub fn change_direction(&mut self) {
        self.strategy.change_direction();
    }

    pub(crate) fn update(&mut self, core: &mut EntityCore, physics: &mut PhysicsWorld, world: &mut WorldState) -> SimResult<()> {
        let (grid, rng) = world.grid_and_rng();
        self.strategy.advance(core, grid, physics, rng)?;
        core.sync_from_body(physics);
        Ok(())
    }
}
