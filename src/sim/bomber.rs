//! The player-controlled bomber

use serde::{Deserialize, Serialize};

use super::block::Block;
use super::bomb::Bomb;
use super::engine::EntityEngine;
use super::entity::{Direction, Entity, EntityCore, EntityId, EntityKind, PhysicsEntity};
use super::physics::{BodyKind, PhysicsWorld};
use super::world::WorldState;
use crate::consts::*;

/// Bomber attributes that survive a round restart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomberStats {
    pub lives: u32,
    pub speed: f32,
    /// Bombs available for placement
    pub bombs: u32,
    /// Explosion range in cells
    pub range: u32,
    pub kick: bool,
    pub pass: bool,
}

impl Default for BomberStats {
    fn default() -> Self {
        Self {
            lives: BOMBER_INIT_LIVES,
            speed: BOMBER_INIT_SPEED,
            bombs: BOMBER_INIT_BOMBS,
            range: INIT_FIRE_RANGE,
            kick: false,
            pass: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bomber {
    bombs: u32,
    range: u32,
    kick: bool,
    pass: bool,
    /// Held direction keys, most recent last
    held: Vec<Direction>,
}

impl Default for Bomber {
    fn default() -> Self {
        Self::from_stats(&BomberStats::default())
    }
}

impl Bomber {
    pub fn from_stats(stats: &BomberStats) -> Self {
        Self {
            bombs: stats.bombs,
            range: stats.range.clamp(INIT_FIRE_RANGE, FIRE_MAX_RANGE),
            kick: stats.kick,
            pass: stats.pass,
            held: Vec::new(),
        }
    }

    pub fn stats(&self, core: &EntityCore) -> BomberStats {
        BomberStats {
            lives: core.lives(),
            speed: core.speed(),
            bombs: self.bombs,
            range: self.range,
            kick: self.kick,
            pass: self.pass,
        }
    }

    /// Spawn a bomber centred in `block`
    pub fn spawn(engine: &mut EntityEngine, block: &Block, stats: &BomberStats, tile_size: f32) -> EntityId {
        let core = EntityCore::centered(
            engine.physics_mut(),
            block.center(),
            stats.lives,
            stats.speed,
            false,
            tile_size,
        )
        .with_body_kind(engine.physics_mut(), BodyKind::Dynamic);
        engine.add(core, EntityKind::Bomber(Self::from_stats(stats)))
    }

    pub fn bombs(&self) -> u32 {
        self.bombs
    }

    pub fn range(&self) -> u32 {
        self.range
    }

    pub fn bomb_kick(&self) -> bool {
        self.kick
    }

    pub fn bomb_pass(&self) -> bool {
        self.pass
    }

    pub fn add_bomb(&mut self) {
        self.bombs += 1;
    }

    /// Drop one bomb of capacity, never below one
    pub fn remove_bomb(&mut self) {
        if self.bombs > 1 {
            self.bombs -= 1;
        }
    }

    /// Credit back a bomb that exploded or was cleared
    pub fn bomb_returned(&mut self) {
        self.bombs += 1;
    }

    pub fn change_range(&mut self, delta: i32) {
        let range = self.range as i32 + delta;
        self.range = range.clamp(INIT_FIRE_RANGE as i32, FIRE_MAX_RANGE as i32) as u32;
    }

    pub fn enable_kick(&mut self) {
        self.kick = true;
        self.pass = false;
    }

    pub fn enable_pass(&mut self) {
        self.pass = true;
    }

    pub fn held_direction(&self) -> Option<Direction> {
        self.held.last().copied()
    }

    /// A direction key went down; it becomes the active one
    pub fn press(&mut self, core: &mut EntityCore, physics: &mut PhysicsWorld, dir: Direction) {
        self.held.retain(|d| *d != dir);
        self.held.push(dir);
        core.move_dir(physics, dir);
    }

    /// A direction key went up; fall back to the previous held key, or idle
    pub fn release(&mut self, core: &mut EntityCore, physics: &mut PhysicsWorld, dir: Direction) {
        self.held.retain(|d| *d != dir);
        match self.held.last() {
            Some(prev) => core.move_dir(physics, *prev),
            None => core.set_idle(physics),
        }
    }

    pub(crate) fn update(&mut self, core: &mut EntityCore, physics: &mut PhysicsWorld) {
        if let Some(dir) = self.held.last() {
            core.move_dir(physics, *dir);
        }
        core.sync_from_body(physics);
    }
}

/// Drop a bomb on the free block under the bomber's centre
///
/// Returns `None` when nothing was placed: no bombs left, not standing on a
/// free block, or the block already holds a bomb.
pub(crate) fn place_bomb(entity: &mut Entity, engine: &mut EntityEngine, world: &mut WorldState) -> Option<EntityId> {
    let owner = entity.id();
    let center = entity.core.center();
    let tile_size = world.tile_size();
    let bomber = entity.as_bomber_mut()?;
    if bomber.bombs == 0 {
        return None;
    }

    let pos = world.grid().pos_at(center)?;
    let block = world.grid().get(pos)?;
    if !block.is_free() || block.has_bomb() {
        return None;
    }

    let bomb = Bomb::spawn(engine, block, owner, bomber.range, bomber.kick, tile_size);
    world.grid_mut().get_mut(pos)?.set_bomb(bomb);
    bomber.bombs -= 1;
    log::debug!("Bomb {:?} placed at {:?} with range {}", bomb, pos, bomber.range);
    Some(bomb)
}
