//! Bombs and the flames they leave behind

use super::block::Block;
use super::engine::EntityEngine;
use super::entity::{EntityCore, EntityId, EntityKind, PhysicsEntity};
use super::physics::BodyKind;
use crate::consts::*;

/// A placed bomb counting down to its explosion
#[derive(Debug, Clone, PartialEq)]
pub struct Bomb {
    /// Ticks left; explodes on the update after this goes negative
    timer: i32,
    range: u32,
    owner: EntityId,
}

impl Bomb {
    pub fn new(owner: EntityId, range: u32) -> Self {
        Self {
            timer: BOMB_TIME,
            range,
            owner,
        }
    }

    /// Spawn a bomb sensor centred in `block`
    ///
    /// Kickable bombs get a dynamic body, the rest stay put.
    pub fn spawn(engine: &mut EntityEngine, block: &Block, owner: EntityId, range: u32, kick: bool, tile_size: f32) -> EntityId {
        let kind = if kick { BodyKind::Dynamic } else { BodyKind::Static };
        let core = EntityCore::centered(engine.physics_mut(), block.center(), 1, 0.0, true, tile_size)
            .with_body_kind(engine.physics_mut(), kind);
        engine.add(core, EntityKind::Bomb(Self::new(owner, range)))
    }

    pub fn timer(&self) -> i32 {
        self.timer
    }

    pub fn range(&self) -> u32 {
        self.range
    }

    pub fn owner(&self) -> EntityId {
        self.owner
    }

    /// Fire or a destroyed block set the fuse to zero
    pub fn detonate(&mut self) {
        self.timer = self.timer.min(0);
    }

    /// Count down one tick; true when the bomb must explode now
    pub(crate) fn tick(&mut self) -> bool {
        let expired = self.timer < 0;
        self.timer -= 1;
        expired
    }
}

/// Short-lived lethal flame on one cell
#[derive(Debug, Clone, PartialEq)]
pub struct Fire {
    timer: i32,
}

impl Default for Fire {
    fn default() -> Self {
        Self { timer: FIRE_TIME }
    }
}

impl Fire {
    /// Spawn a kinematic flame sensor centred in `block`
    pub fn spawn(engine: &mut EntityEngine, block: &Block, tile_size: f32) -> EntityId {
        let core = EntityCore::centered(engine.physics_mut(), block.center(), 1, 0.0, true, tile_size)
            .with_body_kind(engine.physics_mut(), BodyKind::Kinematic);
        engine.add(core, EntityKind::Fire(Self::default()))
    }

    pub fn timer(&self) -> i32 {
        self.timer
    }

    pub(crate) fn tick(&mut self) -> bool {
        let expired = self.timer < 0;
        self.timer -= 1;
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bomb_explodes_after_timer_goes_negative() {
        let mut bomb = Bomb::new(EntityId::from_raw(0), 1);
        let mut ticks = 0;
        while !bomb.tick() {
            ticks += 1;
        }
        // BOMB_TIME..=0 inclusive count down, then one more update
        assert_eq!(ticks, BOMB_TIME + 1);
    }

    #[test]
    fn test_detonate_shortens_fuse() {
        let mut bomb = Bomb::new(EntityId::from_raw(0), 2);
        bomb.detonate();
        assert_eq!(bomb.timer(), 0);
        assert!(!bomb.tick());
        assert!(bomb.tick());
    }

    #[test]
    fn test_detonate_never_extends_fuse() {
        let mut bomb = Bomb::new(EntityId::from_raw(0), 2);
        bomb.tick();
        bomb.tick();
        while bomb.timer() >= 0 {
            bomb.tick();
        }
        bomb.detonate();
        assert!(bomb.timer() < 0);
    }

    #[test]
    fn test_fire_lifetime() {
        let mut fire = Fire::default();
        let mut ticks = 0;
        while !fire.tick() {
            ticks += 1;
        }
        assert_eq!(ticks, FIRE_TIME + 1);
    }
}
