//! Power-ups hidden in bricks
//!
//! A brick carries an optional [`PowerUpKind`] drawn from [`SPAWN_TABLE`] when
//! the grid is built. Destroying it spawns a [`PowerUp`] entity; touching that
//! entity applies the effect to the bomber.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::block::Block;
use super::bomber::Bomber;
use super::engine::EntityEngine;
use super::entity::{Entity, EntityCore, EntityId, EntityKind, PhysicsEntity};
use super::physics::BodyKind;
use super::world::WorldState;
use crate::consts::*;
use crate::error::SimResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerUpKind {
    BombUp,
    BombKick,
    BombPass,
    RangeUp,
    RangeDown,
    SpeedUp,
    SpeedDown,
    LifeUp,
    TimeUp,
    TimeDown,
    Skull,
    /// Level exit, hidden under the last placed brick
    Door,
}

/// Brick tag weights; `None` leaves the brick empty
///
/// Weights add up to 1. The door is never drawn, it is placed explicitly.
pub const SPAWN_TABLE: [(Option<PowerUpKind>, f64); 12] = [
    (Some(PowerUpKind::BombKick), 0.05),
    (Some(PowerUpKind::BombPass), 0.05),
    (Some(PowerUpKind::RangeDown), 0.05),
    (Some(PowerUpKind::RangeUp), 0.06),
    (Some(PowerUpKind::BombUp), 0.065),
    (Some(PowerUpKind::LifeUp), 0.055),
    (None, 0.3),
    (Some(PowerUpKind::Skull), 0.15),
    (Some(PowerUpKind::SpeedDown), 0.05),
    (Some(PowerUpKind::SpeedUp), 0.06),
    (Some(PowerUpKind::TimeDown), 0.05),
    (Some(PowerUpKind::TimeUp), 0.06),
];

/// Weighted draw over [`SPAWN_TABLE`]
pub fn draw<R: Rng>(rng: &mut R) -> Option<PowerUpKind> {
    let r = rng.random::<f64>();
    let mut acc = 0.0;
    for (kind, weight) in SPAWN_TABLE {
        acc += weight;
        if acc > r {
            return kind;
        }
    }
    SPAWN_TABLE[SPAWN_TABLE.len() - 1].0
}

impl PowerUpKind {
    /// Ticks before an uncollected power-up disappears
    pub fn lifetime(self) -> Option<i32> {
        match self {
            PowerUpKind::Door => None,
            _ => Some(POWERUP_TIME),
        }
    }
}

/// One of the skull's negative effects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkullEffect {
    DropBomb,
    Kill,
    LoseTime,
    ShrinkRange,
    Slow,
}

impl SkullEffect {
    pub const ALL: [SkullEffect; 5] = [
        SkullEffect::DropBomb,
        SkullEffect::Kill,
        SkullEffect::LoseTime,
        SkullEffect::ShrinkRange,
        SkullEffect::Slow,
    ];

    pub fn draw<R: Rng>(rng: &mut R) -> Self {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }
}

/// A revealed power-up waiting to be collected
#[derive(Debug, Clone, PartialEq)]
pub struct PowerUp {
    kind: PowerUpKind,
    timer: Option<i32>,
    collected: bool,
}

impl PowerUp {
    pub fn new(kind: PowerUpKind) -> Self {
        Self {
            kind,
            timer: kind.lifetime(),
            collected: false,
        }
    }

    /// Spawn a sensor for `kind` centred in `block`
    pub fn spawn(engine: &mut EntityEngine, block: &Block, kind: PowerUpKind, tile_size: f32) -> EntityId {
        let core = EntityCore::centered(engine.physics_mut(), block.center(), 1, 0.0, true, tile_size)
            .with_body_kind(engine.physics_mut(), BodyKind::Dynamic);
        engine.add(core, EntityKind::PowerUp(Self::new(kind)))
    }

    pub fn kind(&self) -> PowerUpKind {
        self.kind
    }

    pub fn is_collected(&self) -> bool {
        self.collected
    }

    /// Consumed; removed on its next update
    pub fn collect(&mut self) {
        self.collected = true;
    }

    /// True when the power-up must go away this tick
    pub(crate) fn tick(&mut self) -> bool {
        if self.collected {
            return true;
        }
        match self.timer.as_mut() {
            Some(timer) => {
                let expired = *timer < 0;
                *timer -= 1;
                expired
            }
            None => false,
        }
    }
}

/// The bomber touched power-up `id`
pub(crate) fn collect(bomber: &mut Entity, id: EntityId, engine: &mut EntityEngine, world: &mut WorldState) -> SimResult<()> {
    let Some(kind) = engine
        .entity(id)
        .and_then(Entity::as_power_up)
        .filter(|p| !p.is_collected())
        .map(PowerUp::kind)
    else {
        return Ok(());
    };

    if apply(kind, bomber, engine, world) {
        if let Some(power_up) = engine.entity_mut(id).and_then(Entity::as_power_up_mut) {
            power_up.collect();
        }
    }
    Ok(())
}

/// Apply `kind` to the bomber; false when the power-up refused to be consumed
pub(crate) fn apply(kind: PowerUpKind, entity: &mut Entity, engine: &mut EntityEngine, world: &mut WorldState) -> bool {
    log::debug!("Applying power-up {:?}", kind);
    match kind {
        PowerUpKind::BombUp => with_bomber(entity, |b| b.add_bomb()),
        PowerUpKind::BombKick => {
            with_bomber(entity, |b| b.enable_kick());
            for bomb in engine.bombs() {
                if let Some((e, physics)) = engine.entity_and_physics_mut(bomb) {
                    e.core.set_sensor(physics, false);
                    if let Some(body) = e.core.body() {
                        physics.set_kind(body, BodyKind::Dynamic);
                    }
                }
            }
        }
        PowerUpKind::BombPass => {
            with_bomber(entity, |b| b.enable_pass());
            for bomb in engine.bombs() {
                if let Some((e, physics)) = engine.entity_and_physics_mut(bomb) {
                    e.core.set_sensor(physics, true);
                }
            }
        }
        PowerUpKind::RangeUp => with_bomber(entity, |b| b.change_range(FIRE_RANGE_INCREMENT)),
        PowerUpKind::RangeDown => with_bomber(entity, |b| b.change_range(-FIRE_RANGE_INCREMENT)),
        PowerUpKind::SpeedUp => entity.core.increase_speed(SPEED_INCREMENT),
        PowerUpKind::SpeedDown => entity.core.increase_speed(-SPEED_INCREMENT),
        PowerUpKind::LifeUp => entity.core.add_life(),
        PowerUpKind::TimeUp => world.timer_mut().add_time(TIMER_INCREMENT),
        PowerUpKind::TimeDown => world.timer_mut().add_time(-TIMER_INCREMENT),
        PowerUpKind::Skull => {
            let effect = SkullEffect::draw(world.rng());
            apply_skull(effect, entity, engine, world);
        }
        PowerUpKind::Door => {
            if !engine.enemies().is_empty() {
                return false;
            }
            world.win();
        }
    }
    true
}

pub(crate) fn apply_skull(effect: SkullEffect, entity: &mut Entity, engine: &mut EntityEngine, world: &mut WorldState) {
    log::debug!("Skull effect {:?}", effect);
    match effect {
        SkullEffect::DropBomb => with_bomber(entity, |b| b.remove_bomb()),
        SkullEffect::Kill => entity.die(engine, world),
        SkullEffect::LoseTime => world.timer_mut().add_time(-SKULL_TIME_PENALTY),
        SkullEffect::ShrinkRange => with_bomber(entity, |b| b.change_range(-FIRE_RANGE_INCREMENT)),
        SkullEffect::Slow => entity.core.increase_speed(-SPEED_INCREMENT),
    }
}

fn with_bomber(entity: &mut Entity, f: impl FnOnce(&mut Bomber)) {
    if let Some(bomber) = entity.as_bomber_mut() {
        f(bomber);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::block::{Grid, GridPos};
    use crate::sim::bomb::Bomb;
    use crate::sim::bomber::BomberStats;
    use crate::sim::enemy::{Enemy, EnemyKind};
    use crate::sim::state::RoundPhase;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    /// A bomber on an open 7x7 field, outside the entity engine's update loop
    struct Field {
        engine: EntityEngine,
        state: WorldState,
        bomber: EntityId,
    }

    impl Field {
        fn new(stats: BomberStats, seed: u64) -> Self {
            let mut engine = EntityEngine::new();
            let mut state = WorldState::empty(32.0, seed);
            *state.grid_mut() = Grid::open_field(7, 7, 32.0, engine.physics_mut());
            let block = state.grid().get(GridPos::new(1, 1)).unwrap().clone();
            let bomber = Bomber::spawn(&mut engine, &block, &stats, 32.0);
            Self { engine, state, bomber }
        }

        fn apply(&mut self, kind: PowerUpKind) -> bool {
            let state = &mut self.state;
            self.engine
                .with_entity(self.bomber, |entity, engine| apply(kind, entity, engine, state))
                .unwrap()
        }

        fn skull(&mut self, effect: SkullEffect) {
            let state = &mut self.state;
            self.engine
                .with_entity(self.bomber, |entity, engine| apply_skull(effect, entity, engine, state))
                .unwrap();
        }

        fn stats(&self) -> BomberStats {
            let entity = self.engine.entity(self.bomber).unwrap();
            entity.as_bomber().unwrap().stats(&entity.core)
        }

        fn seconds(&self) -> f32 {
            self.state.timer().seconds()
        }

        fn place_bomb(&mut self, cell: GridPos, kick: bool) -> EntityId {
            let block = self.state.grid().get(cell).unwrap().clone();
            Bomb::spawn(&mut self.engine, &block, self.bomber, 1, kick, 32.0)
        }

        fn bomb_body(&self, bomb: EntityId) -> crate::sim::physics::Body {
            let handle = self.engine.entity(bomb).unwrap().core.body().unwrap();
            self.engine.physics().body(handle).unwrap()
        }
    }

    fn boosted() -> BomberStats {
        BomberStats {
            speed: 2.0,
            bombs: 2,
            range: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_bomb_up_adds_capacity() {
        let mut field = Field::new(BomberStats::default(), 0);
        assert!(field.apply(PowerUpKind::BombUp));
        assert_eq!(field.stats().bombs, BOMBER_INIT_BOMBS + 1);
    }

    #[test]
    fn test_bomb_kick_hardens_placed_bombs() {
        let mut field = Field::new(BomberStats { pass: true, ..Default::default() }, 0);
        let bomb = field.place_bomb(GridPos::new(3, 3), false);
        assert!(field.apply(PowerUpKind::BombKick));

        let stats = field.stats();
        assert!(stats.kick);
        assert!(!stats.pass);
        let body = field.bomb_body(bomb);
        assert!(!body.sensor);
        assert_eq!(body.kind, BodyKind::Dynamic);
    }

    #[test]
    fn test_bomb_pass_turns_placed_bombs_into_sensors() {
        let mut field = Field::new(BomberStats::default(), 0);
        let bomb = field.place_bomb(GridPos::new(3, 3), false);
        field
            .engine
            .with_entity(bomb, |e, engine| e.core.set_sensor(engine.physics_mut(), false));
        assert!(!field.bomb_body(bomb).sensor);

        assert!(field.apply(PowerUpKind::BombPass));
        assert!(field.stats().pass);
        assert!(field.bomb_body(bomb).sensor);
    }

    #[test]
    fn test_range_up_and_down() {
        let mut field = Field::new(boosted(), 0);
        field.apply(PowerUpKind::RangeUp);
        assert_eq!(field.stats().range, 4);
        field.apply(PowerUpKind::RangeDown);
        field.apply(PowerUpKind::RangeDown);
        assert_eq!(field.stats().range, 2);
    }

    #[test]
    fn test_speed_up_and_down() {
        let mut field = Field::new(boosted(), 0);
        field.apply(PowerUpKind::SpeedUp);
        assert_eq!(field.stats().speed, 2.0 + SPEED_INCREMENT);
        field.apply(PowerUpKind::SpeedDown);
        field.apply(PowerUpKind::SpeedDown);
        assert_eq!(field.stats().speed, 2.0 - SPEED_INCREMENT);
    }

    #[test]
    fn test_life_up() {
        let mut field = Field::new(BomberStats::default(), 0);
        field.apply(PowerUpKind::LifeUp);
        assert_eq!(field.stats().lives, BOMBER_INIT_LIVES + 1);
    }

    #[test]
    fn test_time_up_and_down() {
        let mut field = Field::new(BomberStats::default(), 0);
        let start = field.seconds();
        field.apply(PowerUpKind::TimeUp);
        assert!((field.seconds() - start - TIMER_INCREMENT).abs() < 1e-3);
        field.apply(PowerUpKind::TimeDown);
        field.apply(PowerUpKind::TimeDown);
        assert!((start - field.seconds() - TIMER_INCREMENT).abs() < 1e-3);
    }

    #[test]
    fn test_door_refused_while_enemies_live() {
        let mut field = Field::new(BomberStats::default(), 0);
        let block = field.state.grid().get(GridPos::new(5, 5)).unwrap().clone();
        let grid = field.state.grid().clone();
        Enemy::spawn(&mut field.engine, &block, &grid, EnemyKind::Onil).unwrap();

        assert!(!field.apply(PowerUpKind::Door));
        assert_eq!(field.state.phase(), RoundPhase::Playing);
    }

    #[test]
    fn test_door_wins_on_empty_field() {
        let mut field = Field::new(BomberStats::default(), 0);
        assert!(field.apply(PowerUpKind::Door));
        assert_eq!(field.state.phase(), RoundPhase::Won);
        assert_eq!(field.state.score(), SCORE_WIN);
    }

    #[test]
    fn test_each_skull_effect() {
        let mut field = Field::new(boosted(), 0);
        field.skull(SkullEffect::DropBomb);
        assert_eq!(field.stats().bombs, 1);
        field.skull(SkullEffect::DropBomb);
        assert_eq!(field.stats().bombs, 1, "capacity never drops below one");

        field.skull(SkullEffect::ShrinkRange);
        assert_eq!(field.stats().range, 2);

        field.skull(SkullEffect::Slow);
        assert_eq!(field.stats().speed, 2.0 - SPEED_INCREMENT);

        let start = field.seconds();
        field.skull(SkullEffect::LoseTime);
        assert!((start - field.seconds() - SKULL_TIME_PENALTY).abs() < 1e-3);

        field.skull(SkullEffect::Kill);
        assert_eq!(field.stats().lives, BOMBER_INIT_LIVES - 1);
        assert_eq!(field.state.score(), BOMBER_DIE_SCORE);
    }

    #[test]
    fn test_seeded_skull_applies_the_drawn_effect() {
        let mut seen = std::collections::HashSet::new();
        for seed in 0..40 {
            let mut field = Field::new(boosted(), seed);
            let expected = SkullEffect::draw(&mut field.state.rng().clone());
            let before = field.stats();
            let seconds = field.seconds();

            assert!(field.apply(PowerUpKind::Skull));
            let after = field.stats();
            let mut changed = Vec::new();
            if after.bombs != before.bombs {
                changed.push(SkullEffect::DropBomb);
            }
            if after.lives != before.lives {
                changed.push(SkullEffect::Kill);
            }
            if field.seconds() < seconds {
                changed.push(SkullEffect::LoseTime);
            }
            if after.range != before.range {
                changed.push(SkullEffect::ShrinkRange);
            }
            if after.speed != before.speed {
                changed.push(SkullEffect::Slow);
            }
            assert_eq!(changed, vec![expected], "seed {}", seed);
            seen.insert(format!("{:?}", expected));
        }
        assert!(seen.len() > 1);
    }

    #[test]
    fn test_weights_sum_to_one() {
        let total: f64 = SPAWN_TABLE.iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(SPAWN_TABLE.iter().all(|(k, _)| *k != Some(PowerUpKind::Door)));
    }

    #[test]
    fn test_draw_distribution_roughly_matches_weights() {
        let mut rng = Pcg32::seed_from_u64(1234);
        let n = 20_000;
        let mut empty = 0;
        let mut skulls = 0;
        for _ in 0..n {
            match draw(&mut rng) {
                None => empty += 1,
                Some(PowerUpKind::Skull) => skulls += 1,
                Some(PowerUpKind::Door) => panic!("door drawn from table"),
                _ => {}
            }
        }
        let empty_ratio = empty as f64 / n as f64;
        let skull_ratio = skulls as f64 / n as f64;
        assert!((empty_ratio - 0.3).abs() < 0.02, "empty ratio {}", empty_ratio);
        assert!((skull_ratio - 0.15).abs() < 0.02, "skull ratio {}", skull_ratio);
    }

    #[test]
    fn test_skull_covers_all_effects() {
        let mut rng = Pcg32::seed_from_u64(5);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(format!("{:?}", SkullEffect::draw(&mut rng)));
        }
        assert_eq!(seen.len(), SkullEffect::ALL.len());
    }

    #[test]
    fn test_door_never_expires() {
        let mut door = PowerUp::new(PowerUpKind::Door);
        for _ in 0..(POWERUP_TIME * 3) {
            assert!(!door.tick());
        }
        door.collect();
        assert!(door.tick());
    }

    #[test]
    fn test_power_up_expires() {
        let mut p = PowerUp::new(PowerUpKind::SpeedUp);
        let mut ticks = 0;
        while !p.tick() {
            ticks += 1;
        }
        assert_eq!(ticks, POWERUP_TIME + 1);
    }
}
