//! Entity model
//!
//! Every simulated object is an [`Entity`]: a shared [`EntityCore`] (position,
//! body, lives, motion) plus an [`EntityKind`] carrying the variant data.
//! Behaviour is dispatched by matching on the kind, contact reactions by
//! matching on the other party's [`EntityTag`].

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::bomb::{Bomb, Fire};
use super::bomber::Bomber;
use super::block::Block;
use super::enemy::Enemy;
use super::engine::EntityEngine;
use super::physics::{Body, BodyHandle, BodyKind, PhysicsWorld};
use super::power_up::PowerUp;
use super::world::WorldState;
use crate::consts::*;
use crate::error::SimResult;
use crate::{body_radius, move_velocity};

/// Stable entity identifier, allocated in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u32);

impl EntityId {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

/// Motion/animation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MotionState {
    #[default]
    Idle,
    Up,
    Down,
    Left,
    Right,
    Dying,
}

/// One of the four grid directions (screen coordinates, y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

    pub fn unit(self) -> Vec2 {
        match self {
            Direction::Up => Vec2::NEG_Y,
            Direction::Down => Vec2::Y,
            Direction::Left => Vec2::NEG_X,
            Direction::Right => Vec2::X,
        }
    }

    pub fn motion(self) -> MotionState {
        match self {
            Direction::Up => MotionState::Up,
            Direction::Down => MotionState::Down,
            Direction::Left => MotionState::Left,
            Direction::Right => MotionState::Right,
        }
    }
}

/// Closed set of entity kinds, used as the contact dispatch key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityTag {
    Bomber,
    Enemy,
    Bomb,
    Fire,
    PowerUp,
}

/// Anything with a box in pixel space and possibly a physics body
pub trait PhysicsEntity {
    /// Top-left corner
    fn position(&self) -> Vec2;
    fn dimensions(&self) -> Vec2;
    fn body(&self) -> Option<BodyHandle>;

    fn center(&self) -> Vec2 {
        self.position() + self.dimensions() / 2.0
    }
}

/// State shared by every entity kind
#[derive(Debug, Clone)]
pub struct EntityCore {
    /// Top-left corner in pixels
    position: Vec2,
    /// Respawn position
    origin: Vec2,
    lives: u32,
    state: MotionState,
    speed: f32,
    sensor: bool,
    /// Side of the bounding box (twice the body radius)
    dimension: f32,
    body: Option<BodyHandle>,
}

impl EntityCore {
    /// Create the core and its dynamic circle body, top-left at `position`
    pub fn new(physics: &mut PhysicsWorld, position: Vec2, lives: u32, speed: f32, sensor: bool, tile_size: f32) -> Self {
        let radius = body_radius(tile_size);
        let dimension = radius * 2.0;
        let body = physics.create_body(
            Body::circle(position + Vec2::splat(radius), radius).with_sensor(sensor),
        );
        Self {
            position,
            origin: position,
            lives,
            state: MotionState::Idle,
            speed,
            sensor,
            dimension,
            body: Some(body),
        }
    }

    /// Same as [`EntityCore::new`] but with the body centred on `center`
    pub fn centered(physics: &mut PhysicsWorld, center: Vec2, lives: u32, speed: f32, sensor: bool, tile_size: f32) -> Self {
        let radius = body_radius(tile_size);
        Self::new(physics, center - Vec2::splat(radius), lives, speed, sensor, tile_size)
    }

    pub fn with_body_kind(self, physics: &mut PhysicsWorld, kind: BodyKind) -> Self {
        if let Some(body) = self.body {
            physics.set_kind(body, kind);
        }
        self
    }

    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    pub fn lives(&self) -> u32 {
        self.lives
    }

    pub fn set_lives(&mut self, lives: u32) {
        self.lives = lives;
    }

    pub fn add_life(&mut self) {
        self.lives += 1;
    }

    pub fn is_alive(&self) -> bool {
        self.lives > 0
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    pub fn set_state(&mut self, state: MotionState) {
        self.state = state;
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    /// Change speed by `delta`, clamped to the bomber speed range
    pub fn increase_speed(&mut self, delta: f32) {
        self.speed = (self.speed + delta).clamp(BOMBER_MIN_SPEED, BOMBER_MAX_SPEED);
    }

    pub fn is_sensor(&self) -> bool {
        self.sensor
    }

    pub fn set_sensor(&mut self, physics: &mut PhysicsWorld, sensor: bool) {
        self.sensor = sensor;
        if let Some(body) = self.body {
            physics.set_sensor(body, sensor);
        }
    }

    /// Forget the body without destroying it (the engine owns its lifetime)
    pub(crate) fn take_body(&mut self) -> Option<BodyHandle> {
        self.body.take()
    }

    /// Move the top-left corner, keeping the body in sync
    pub fn set_position(&mut self, physics: &mut PhysicsWorld, position: Vec2) {
        self.position = position;
        if let Some(body) = self.body {
            physics.set_position(body, position + Vec2::splat(self.dimension / 2.0));
        }
    }

    pub fn set_center(&mut self, physics: &mut PhysicsWorld, center: Vec2) {
        self.set_position(physics, center - Vec2::splat(self.dimension / 2.0));
    }

    /// Start moving along one axis at the entity's speed
    pub fn move_dir(&mut self, physics: &mut PhysicsWorld, dir: Direction) {
        self.state = dir.motion();
        if let Some(body) = self.body {
            physics.set_velocity(body, dir.unit() * move_velocity(self.speed));
        }
    }

    /// Head toward `target` (a top-left corner), one velocity component per differing axis
    pub fn move_toward(&mut self, physics: &mut PhysicsWorld, target: Vec2) {
        let step = move_velocity(self.speed);
        let mut velocity = Vec2::ZERO;
        if self.position.x != target.x {
            if self.position.x > target.x {
                velocity.x = -step;
                self.state = MotionState::Left;
            } else {
                velocity.x = step;
                self.state = MotionState::Right;
            }
        }
        if self.position.y != target.y {
            if self.position.y > target.y {
                velocity.y = -step;
                self.state = MotionState::Up;
            } else {
                velocity.y = step;
                self.state = MotionState::Down;
            }
        }
        if let Some(body) = self.body {
            physics.set_velocity(body, velocity);
        }
    }

    pub fn stop(&mut self, physics: &mut PhysicsWorld) {
        if let Some(body) = self.body {
            physics.set_velocity(body, Vec2::ZERO);
        }
    }

    /// Go idle and stop the body
    pub fn set_idle(&mut self, physics: &mut PhysicsWorld) {
        self.state = MotionState::Idle;
        self.stop(physics);
    }

    /// Snap into `block` on any axis where the entity's box sticks out
    ///
    /// Each axis is snapped to either the block's corner or the far side minus
    /// the entity's extent, whichever is closer.
    pub fn align_to(&mut self, physics: &mut PhysicsWorld, block: &Block) {
        let bp = block.position();
        let size = block.size();
        let max_distance = size - self.dimension;
        let mut pos = self.position;

        if pos.x > bp.x + max_distance || pos.x < bp.x {
            let left = (pos.x - bp.x).abs();
            let right = (pos.x - (bp.x + max_distance)).abs();
            pos.x = if left <= right { bp.x } else { bp.x + max_distance };
        }
        if pos.y > bp.y + max_distance || pos.y < bp.y {
            let top = (pos.y - bp.y).abs();
            let bottom = (pos.y - (bp.y + max_distance)).abs();
            pos.y = if top <= bottom { bp.y } else { bp.y + max_distance };
        }
        self.set_position(physics, pos);
    }

    /// Pull the logical position from the body, leaving its velocity alone
    pub fn sync_position(&mut self, physics: &PhysicsWorld) {
        let Some(body) = self.body else { return };
        if let Some(center) = physics.position(body) {
            self.position = center - Vec2::splat(self.dimension / 2.0);
        }
    }

    /// Pull the logical position from the body; idle entities are halted
    pub fn sync_from_body(&mut self, physics: &mut PhysicsWorld) {
        self.sync_position(physics);
        if let Some(body) = self.body {
            if self.state == MotionState::Idle {
                physics.set_velocity(body, Vec2::ZERO);
            }
        }
    }

    /// Back to the spawn point, idle
    pub fn reset(&mut self, physics: &mut PhysicsWorld) {
        let origin = self.origin;
        self.set_position(physics, origin);
        self.set_idle(physics);
    }
}

impl PhysicsEntity for EntityCore {
    fn position(&self) -> Vec2 {
        self.position
    }

    fn dimensions(&self) -> Vec2 {
        Vec2::splat(self.dimension)
    }

    fn body(&self) -> Option<BodyHandle> {
        self.body
    }
}

/// Variant data
#[derive(Debug)]
pub enum EntityKind {
    Bomber(Bomber),
    Enemy(Enemy),
    Bomb(Bomb),
    Fire(Fire),
    PowerUp(PowerUp),
}

/// A simulated object
#[derive(Debug)]
pub struct Entity {
    id: EntityId,
    pub core: EntityCore,
    pub kind: EntityKind,
}

impl Entity {
    pub fn new(id: EntityId, core: EntityCore, kind: EntityKind) -> Self {
        Self { id, core, kind }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn tag(&self) -> EntityTag {
        match self.kind {
            EntityKind::Bomber(_) => EntityTag::Bomber,
            EntityKind::Enemy(_) => EntityTag::Enemy,
            EntityKind::Bomb(_) => EntityTag::Bomb,
            EntityKind::Fire(_) => EntityTag::Fire,
            EntityKind::PowerUp(_) => EntityTag::PowerUp,
        }
    }

    /// Only these kinds react to contacts
    pub fn listens_for_contacts(&self) -> bool {
        matches!(self.kind, EntityKind::Bomber(_) | EntityKind::Enemy(_) | EntityKind::Bomb(_))
    }

    pub fn as_bomber(&self) -> Option<&Bomber> {
        match &self.kind {
            EntityKind::Bomber(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_bomber_mut(&mut self) -> Option<&mut Bomber> {
        match &mut self.kind {
            EntityKind::Bomber(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_bomb(&self) -> Option<&Bomb> {
        match &self.kind {
            EntityKind::Bomb(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_bomb_mut(&mut self) -> Option<&mut Bomb> {
        match &mut self.kind {
            EntityKind::Bomb(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_enemy(&self) -> Option<&Enemy> {
        match &self.kind {
            EntityKind::Enemy(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_power_up(&self) -> Option<&PowerUp> {
        match &self.kind {
            EntityKind::PowerUp(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_power_up_mut(&mut self) -> Option<&mut PowerUp> {
        match &mut self.kind {
            EntityKind::PowerUp(p) => Some(p),
            _ => None,
        }
    }

    /// Whether the entity has been destroyed and awaits removal
    pub fn is_dying(&self) -> bool {
        self.core.state == MotionState::Dying && !self.core.is_alive()
    }

    /// Per-tick behaviour
    pub(crate) fn update(&mut self, engine: &mut EntityEngine, world: &mut WorldState) -> SimResult<()> {
        match &mut self.kind {
            EntityKind::Bomber(bomber) => {
                bomber.update(&mut self.core, engine.physics_mut());
                Ok(())
            }
            EntityKind::Enemy(enemy) => enemy.update(&mut self.core, engine.physics_mut(), world),
            EntityKind::Bomb(bomb) => {
                // Kicked bombs keep sliding
                self.core.sync_position(engine.physics());
                if bomb.tick() {
                    let range = bomb.range();
                    world.handle_explosion(engine, self.core.center(), range)?;
                    self.destroy(engine, world);
                }
                Ok(())
            }
            EntityKind::Fire(fire) => {
                self.core.sync_position(engine.physics());
                if fire.tick() {
                    self.destroy(engine, world);
                }
                Ok(())
            }
            EntityKind::PowerUp(power_up) => {
                if power_up.tick() {
                    self.destroy(engine, world);
                }
                Ok(())
            }
        }
    }

    /// Contact began with `other`
    pub(crate) fn on_contact(
        &mut self,
        other: EntityId,
        other_tag: EntityTag,
        engine: &mut EntityEngine,
        world: &mut WorldState,
    ) -> SimResult<()> {
        match (self.tag(), other_tag) {
            (EntityTag::Bomber, EntityTag::Enemy | EntityTag::Fire) => {
                if !self.is_dying() {
                    log::debug!("Bomber {:?} hit by {:?}", self.id, other_tag);
                    self.die(engine, world);
                }
                Ok(())
            }
            (EntityTag::Bomber, EntityTag::PowerUp) => {
                if self.is_dying() {
                    return Ok(());
                }
                super::power_up::collect(self, other, engine, world)
            }
            (EntityTag::Enemy, EntityTag::Fire) => {
                if !self.is_dying() {
                    self.die(engine, world);
                }
                Ok(())
            }
            (EntityTag::Enemy, _) => {
                if let EntityKind::Enemy(enemy) = &mut self.kind {
                    enemy.change_direction();
                }
                Ok(())
            }
            (EntityTag::Bomb, EntityTag::Fire) => {
                if let Some(bomb) = self.as_bomb_mut() {
                    bomb.detonate();
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Contact with `other` ended
    pub(crate) fn on_release(
        &mut self,
        other: EntityId,
        other_tag: EntityTag,
        engine: &mut EntityEngine,
        _world: &mut WorldState,
    ) -> SimResult<()> {
        if let (EntityKind::Bomb(bomb), EntityTag::Bomber) = (&self.kind, other_tag) {
            let passes = engine
                .entity(other)
                .and_then(Entity::as_bomber)
                .is_some_and(Bomber::bomb_pass);
            if other == bomb.owner() && !passes {
                self.core.set_sensor(engine.physics_mut(), false);
            }
        }
        Ok(())
    }

    /// Lose a life: destroyed at zero, otherwise back to the spawn point
    pub(crate) fn die(&mut self, engine: &mut EntityEngine, world: &mut WorldState) {
        match &self.kind {
            EntityKind::Bomber(_) => world.add_score(BOMBER_DIE_SCORE),
            EntityKind::Enemy(enemy) => world.add_score(enemy.kind().score()),
            _ => {}
        }
        self.core.state = MotionState::Dying;
        self.core.lives = self.core.lives.saturating_sub(1);
        if self.core.lives == 0 {
            self.destroy(engine, world);
        } else {
            self.core.reset(engine.physics_mut());
        }
    }

    /// Queue removal, with kind-specific side effects
    pub(crate) fn destroy(&mut self, engine: &mut EntityEngine, world: &mut WorldState) {
        match &mut self.kind {
            EntityKind::Bomb(bomb) => {
                let owner = bomb.owner();
                if let Some(bomber) = engine.entity_mut(owner).and_then(Entity::as_bomber_mut) {
                    bomber.bomb_returned();
                }
                world.grid_mut().clear_bomb(self.id);
            }
            EntityKind::Bomber(_) => {
                log::info!("Bomber {:?} out of lives", self.id);
                world.lose();
            }
            _ => {}
        }
        self.core.state = MotionState::Dying;
        self.core.lives = 0;
        engine.remove(self.id);
    }
}
