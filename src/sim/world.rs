//! Round orchestration
//!
//! [`LogicWorld`] owns the [`EntityEngine`] and the [`WorldState`] (grid,
//! timer, score, phase, RNG). Entities receive both during their callbacks,
//! which is how a bomb resolves its own explosion or a power-up changes the
//! timer.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::block::{Block, BlockKind, Grid, GridPos};
use super::bomb::Fire;
use super::bomber::{self, Bomber, BomberStats};
use super::enemy::{Enemy, EnemyKind};
use super::engine::EntityEngine;
use super::entity::{Direction, Entity, EntityId, EntityKind, EntityTag, PhysicsEntity};
use super::power_up::{self, PowerUp, PowerUpKind};
use super::state::{EntityView, GameEvent, RoundPhase, ScoreManager, Snapshot, Timer};
use super::tick::Command;
use crate::config::RoundConfig;
use crate::consts::*;
use crate::error::{SimError, SimResult};

/// Cells touched by one explosion
#[derive(Debug, Clone, PartialEq)]
pub struct ExplosionReport {
    /// Cell the bomb sat on
    pub origin: GridPos,
    /// Flame on the origin cell, if it could burn
    pub origin_flame: Option<EntityId>,
    /// Flames and revealed power-ups along the four arms
    pub spawned: Vec<EntityId>,
}

/// What an explosion did to a single cell
enum Blast {
    /// Burnt, the arm continues
    Flame(EntityId),
    /// Brick broken and a power-up revealed, the arm stops
    Revealed(EntityId),
    /// Wall or empty brick, the arm stops
    Stopped,
}

/// Everything but the entities: grid, clock, score, phase, randomness
#[derive(Debug)]
pub struct WorldState {
    grid: Grid,
    walls: Vec<GridPos>,
    /// Spawn pool for enemies
    free_blocks: Vec<GridPos>,
    bricks: Vec<GridPos>,
    timer: Timer,
    score: ScoreManager,
    phase: RoundPhase,
    rng: Pcg32,
    events: Vec<GameEvent>,
    tile_size: f32,
}

impl WorldState {
    /// No grid yet, round open
    pub fn empty(tile_size: f32, seed: u64) -> Self {
        Self {
            grid: Grid::default(),
            walls: Vec::new(),
            free_blocks: Vec::new(),
            bricks: Vec::new(),
            timer: Timer::new(INIT_TIMER_VALUE as f32),
            score: ScoreManager::default(),
            phase: RoundPhase::Playing,
            rng: Pcg32::seed_from_u64(seed),
            events: Vec::new(),
            tile_size,
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    /// Block at `cell`, or the error naming its pixel position
    pub fn block(&self, cell: GridPos) -> SimResult<&Block> {
        self.grid.get(cell).ok_or(SimError::BlockNotInGrid {
            x: cell.x as f32 * self.tile_size,
            y: cell.y as f32 * self.tile_size,
        })
    }

    pub(crate) fn grid_and_rng(&mut self) -> (&Grid, &mut Pcg32) {
        (&self.grid, &mut self.rng)
    }

    pub fn tile_size(&self) -> f32 {
        self.tile_size
    }

    pub fn walls(&self) -> &[GridPos] {
        &self.walls
    }

    pub fn bricks(&self) -> &[GridPos] {
        &self.bricks
    }

    pub fn free_blocks(&self) -> &[GridPos] {
        &self.free_blocks
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut Timer {
        &mut self.timer
    }

    pub fn score(&self) -> i64 {
        self.score.score()
    }

    pub fn add_score(&mut self, value: i64) {
        self.score.increase(value);
        self.events.push(GameEvent::ScoreChanged { score: self.score.score() });
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn rng(&mut self) -> &mut Pcg32 {
        &mut self.rng
    }

    /// Round won: bonus points, phase Won
    pub fn win(&mut self) {
        if !self.phase.is_open() {
            return;
        }
        self.add_score(SCORE_WIN);
        self.phase = RoundPhase::Won;
        self.events.push(GameEvent::RoundWon);
        log::info!("Round won with score {}", self.score.score());
    }

    /// Round lost: score wiped, phase Lost
    pub fn lose(&mut self) {
        if !self.phase.is_open() {
            return;
        }
        self.score.reset();
        self.events.push(GameEvent::ScoreChanged { score: 0 });
        self.phase = RoundPhase::Lost;
        self.events.push(GameEvent::RoundLost);
        log::info!("Round lost");
    }

    /// Take a random cell out of the enemy spawn pool
    pub fn get_random_free_block(&mut self) -> SimResult<GridPos> {
        if self.free_blocks.is_empty() {
            return Err(SimError::ResourceExhausted("no free blocks left to spawn on"));
        }
        let i = self.rng.random_range(0..self.free_blocks.len());
        Ok(self.free_blocks.swap_remove(i))
    }

    /// Rebuild the grid and scatter bricks; the last brick hides the door
    pub(crate) fn build_round(
        &mut self,
        engine: &mut EntityEngine,
        config: &RoundConfig,
        brick_count: u32,
        timer_seconds: u32,
    ) -> SimResult<()> {
        self.tile_size = config.tile_size;
        self.grid = Grid::generate(config.grid_width, config.grid_height, config.tile_size, engine.physics_mut());

        let positions: Vec<GridPos> = self.grid.positions().collect();
        let is_free = |grid: &Grid, p: &GridPos| grid.get(*p).is_some_and(Block::is_free);
        self.walls = positions.iter().copied().filter(|p| !is_free(&self.grid, p)).collect();
        self.free_blocks = positions
            .iter()
            .copied()
            .filter(|p| is_free(&self.grid, p) && p.x > 2 && p.y > 2)
            .collect();
        self.bricks.clear();

        let mut candidates: Vec<GridPos> = positions
            .iter()
            .copied()
            .filter(|p| is_free(&self.grid, p) && !p.in_spawn_area())
            .collect();
        if brick_count as usize > candidates.len() {
            return Err(SimError::ResourceExhausted("not enough free cells for bricks"));
        }

        for placed in 1..=brick_count {
            let pos = candidates.swap_remove(self.rng.random_range(0..candidates.len()));
            let power_up = if placed == brick_count {
                Some(PowerUpKind::Door)
            } else {
                power_up::draw(&mut self.rng)
            };
            let position = Vec2::new(pos.x as f32, pos.y as f32) * config.tile_size;
            self.grid.set(pos, Block::brick(position, config.tile_size, power_up, engine.physics_mut()));
            self.free_blocks.retain(|p| *p != pos);
            self.bricks.push(pos);
        }

        self.timer = Timer::new(timer_seconds as f32);
        self.phase = RoundPhase::Playing;
        log::debug!(
            "Grid {}x{} built: {} walls, {} bricks, {} spawn cells",
            config.grid_width,
            config.grid_height,
            self.walls.len(),
            self.bricks.len(),
            self.free_blocks.len()
        );
        Ok(())
    }

    /// Burn the cell under `center` and up to `range` cells in each direction
    pub(crate) fn handle_explosion(&mut self, engine: &mut EntityEngine, center: Vec2, range: u32) -> SimResult<ExplosionReport> {
        let origin = self
            .grid
            .pos_at(center)
            .ok_or(SimError::BlockNotInGrid { x: center.x, y: center.y })?;
        log::debug!("Explosion at {:?} with range {}", origin, range);

        let mut report = ExplosionReport {
            origin,
            origin_flame: None,
            spawned: Vec::new(),
        };
        if let Blast::Flame(id) = self.blast(engine, origin)? {
            report.origin_flame = Some(id);
        }

        for dir in Direction::ALL {
            for step in 1..=range {
                let Some(cell) = offset(origin, dir, step) else { break };
                match self.blast(engine, cell)? {
                    Blast::Flame(id) => report.spawned.push(id),
                    Blast::Revealed(id) => {
                        report.spawned.push(id);
                        break;
                    }
                    Blast::Stopped => break,
                }
            }
        }
        Ok(report)
    }

    fn blast(&mut self, engine: &mut EntityEngine, cell: GridPos) -> SimResult<Blast> {
        let Some(kind) = self.grid.destroy_at(cell, engine) else {
            return Ok(Blast::Stopped);
        };
        let block = self.block(cell)?;
        match kind {
            BlockKind::Wall => Ok(Blast::Stopped),
            BlockKind::Free => Ok(Blast::Flame(Fire::spawn(engine, block, self.tile_size))),
            BlockKind::Brick { power_up } => {
                let revealed = power_up.map(|kind| PowerUp::spawn(engine, block, kind, self.tile_size));
                self.bricks.retain(|p| *p != cell);
                self.events.push(GameEvent::BrickDestroyed { cell });
                match revealed {
                    Some(id) => {
                        self.add_score(BLOCK_SCORE);
                        Ok(Blast::Revealed(id))
                    }
                    None => Ok(Blast::Stopped),
                }
            }
        }
    }
}

fn offset(pos: GridPos, dir: Direction, step: u32) -> Option<GridPos> {
    let step = step as usize;
    match dir {
        Direction::Up => pos.y.checked_sub(step).map(|y| GridPos::new(pos.x, y)),
        Direction::Down => Some(GridPos::new(pos.x, pos.y + step)),
        Direction::Left => pos.x.checked_sub(step).map(|x| GridPos::new(x, pos.y)),
        Direction::Right => Some(GridPos::new(pos.x + step, pos.y)),
    }
}

/// A running round
#[derive(Debug)]
pub struct LogicWorld {
    engine: EntityEngine,
    state: WorldState,
    config: RoundConfig,
    bomber: Option<EntityId>,
}

impl LogicWorld {
    /// Validate `config` and start its first round
    pub fn new(config: RoundConfig) -> SimResult<Self> {
        config.validate()?;
        let mut world = Self {
            engine: EntityEngine::new(),
            state: WorldState::empty(config.tile_size, config.seed),
            config: config.clone(),
            bomber: None,
        };
        world.start_round(&config)?;
        Ok(world)
    }

    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    pub fn engine(&self) -> &EntityEngine {
        &self.engine
    }

    pub fn state(&self) -> &WorldState {
        &self.state
    }

    pub fn grid(&self) -> &Grid {
        self.state.grid()
    }

    pub fn timer(&self) -> &Timer {
        self.state.timer()
    }

    pub fn score(&self) -> i64 {
        self.state.score()
    }

    pub fn phase(&self) -> RoundPhase {
        self.state.phase()
    }

    pub fn bomber(&self) -> Option<EntityId> {
        self.bomber
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.engine.entity(id)
    }

    pub fn enemies(&self) -> Vec<EntityId> {
        self.engine.enemies()
    }

    pub fn bombs(&self) -> Vec<EntityId> {
        self.engine.bombs()
    }

    /// Current bomber capabilities, if a bomber is in play
    pub fn bomber_stats(&self) -> Option<BomberStats> {
        let entity = self.engine.entity(self.bomber?)?;
        entity.as_bomber().map(|b| b.stats(&entity.core))
    }

    pub fn add_score(&mut self, value: i64) {
        self.state.add_score(value);
    }

    pub fn win(&mut self) {
        self.state.win();
    }

    pub fn lose(&mut self) {
        self.state.lose();
    }

    pub fn get_random_free_block(&mut self) -> SimResult<GridPos> {
        self.state.get_random_free_block()
    }

    /// Tear down the previous round and build a fresh grid
    ///
    /// Placed bombs are credited back to their owners first. The score is kept.
    pub fn initialize_game(&mut self, brick_count: u32, timer_seconds: u32) -> SimResult<()> {
        self.return_bombs();
        self.engine.remove_all();
        self.engine.clear_world();
        self.bomber = None;
        let config = self.config.clone();
        self.state.build_round(&mut self.engine, &config, brick_count, timer_seconds)
    }

    /// New round with a fresh bomber
    pub fn start_round(&mut self, config: &RoundConfig) -> SimResult<()> {
        config.validate()?;
        self.config = config.clone();
        self.initialize_game(config.brick_count, config.timer_seconds)?;
        self.populate(&BomberStats::default())
    }

    /// New round keeping the current bomber's capabilities
    pub fn restart_round(&mut self, config: &RoundConfig) -> SimResult<()> {
        config.validate()?;
        self.return_bombs();
        let mut stats = self.bomber_stats().unwrap_or_default();
        if stats.lives == 0 {
            stats.lives = BOMBER_INIT_LIVES;
        }
        self.config = config.clone();
        self.initialize_game(config.brick_count, config.timer_seconds)?;
        self.populate(&stats)
    }

    fn return_bombs(&mut self) {
        for id in self.engine.bombs() {
            let owner = self.engine.entity(id).and_then(Entity::as_bomb).map(|b| b.owner());
            if let Some(bomber) = owner.and_then(|o| self.engine.entity_mut(o)).and_then(Entity::as_bomber_mut) {
                bomber.bomb_returned();
            }
            self.engine.remove(id);
        }
    }

    fn populate(&mut self, stats: &BomberStats) -> SimResult<()> {
        self.bomber = Some(self.spawn_bomber(GridPos::new(1, 1), stats)?);
        for _ in 0..self.config.enemy_count {
            let cell = self.state.get_random_free_block()?;
            let kind = EnemyKind::ALL[self.state.rng().random_range(0..EnemyKind::ALL.len())];
            self.spawn_enemy(kind, cell)?;
        }
        log::info!(
            "Round started: {} bricks, {} enemies, {} on the clock",
            self.state.bricks().len(),
            self.config.enemy_count,
            self.state.timer()
        );
        Ok(())
    }

    pub fn spawn_bomber(&mut self, cell: GridPos, stats: &BomberStats) -> SimResult<EntityId> {
        let tile = self.state.tile_size();
        let block = self.state.block(cell)?;
        Ok(Bomber::spawn(&mut self.engine, block, stats, tile))
    }

    pub fn spawn_enemy(&mut self, kind: EnemyKind, cell: GridPos) -> SimResult<EntityId> {
        let block = self.state.block(cell)?;
        Enemy::spawn(&mut self.engine, block, self.state.grid(), kind)
    }

    pub fn spawn_power_up(&mut self, kind: PowerUpKind, cell: GridPos) -> SimResult<EntityId> {
        let tile = self.state.tile_size();
        let block = self.state.block(cell)?;
        Ok(PowerUp::spawn(&mut self.engine, block, kind, tile))
    }

    /// Resolve an explosion of `range` cells centred on the cell under `center`
    pub fn handle_explosion(&mut self, center: Vec2, range: u32) -> SimResult<ExplosionReport> {
        self.state.handle_explosion(&mut self.engine, center, range)
    }

    /// One simulation tick
    pub fn update(&mut self, dt: f32) -> SimResult<()> {
        if self.state.phase() != RoundPhase::Playing {
            return Ok(());
        }
        self.engine.update(&mut self.state)?;
        self.state.timer_mut().update(dt);
        if self.state.timer().is_expired() {
            log::info!("Out of time");
            self.state.lose();
        }
        Ok(())
    }

    pub fn apply_command(&mut self, command: Command) {
        match command {
            Command::Press(dir) => self.press(dir),
            Command::Release(dir) => self.release(dir),
            Command::PlaceBomb => {
                self.place_bomb();
            }
            Command::TogglePause => self.toggle_pause(),
        }
    }

    fn with_bomber<R>(&mut self, f: impl FnOnce(&mut Entity, &mut EntityEngine, &mut WorldState) -> R) -> Option<R> {
        let Some(id) = self.bomber else {
            log::warn!("Command ignored: no bomber in play");
            return None;
        };
        let state = &mut self.state;
        self.engine
            .with_entity(id, |entity, engine| {
                if entity.is_dying() {
                    None
                } else {
                    Some(f(entity, engine, state))
                }
            })
            .flatten()
    }

    pub fn press(&mut self, dir: Direction) {
        self.with_bomber(|entity, engine, _| {
            if let EntityKind::Bomber(bomber) = &mut entity.kind {
                bomber.press(&mut entity.core, engine.physics_mut(), dir);
            }
        });
    }

    pub fn release(&mut self, dir: Direction) {
        self.with_bomber(|entity, engine, _| {
            if let EntityKind::Bomber(bomber) = &mut entity.kind {
                bomber.release(&mut entity.core, engine.physics_mut(), dir);
            }
        });
    }

    /// Drop a bomb under the bomber, if allowed
    pub fn place_bomb(&mut self) -> Option<EntityId> {
        if self.state.phase() != RoundPhase::Playing {
            return None;
        }
        self.with_bomber(|entity, engine, state| bomber::place_bomb(entity, engine, state))
            .flatten()
    }

    /// Apply power-up `id` to the bomber as if it had been touched
    #[cfg(test)]
    pub(crate) fn collect_power_up(&mut self, id: EntityId) -> SimResult<()> {
        self.with_bomber(|entity, engine, state| power_up::collect(entity, id, engine, state))
            .transpose()
            .map(|_| ())
    }

    /// Kill an entity as if caught by fire
    #[cfg(test)]
    pub(crate) fn kill(&mut self, id: EntityId) -> bool {
        let state = &mut self.state;
        self.engine
            .with_entity(id, |entity, engine| {
                if entity.is_dying() {
                    return false;
                }
                entity.die(engine, state);
                true
            })
            .unwrap_or(false)
    }

    pub fn toggle_pause(&mut self) {
        self.state.phase = match self.state.phase {
            RoundPhase::Playing => RoundPhase::Paused,
            RoundPhase::Paused => RoundPhase::Playing,
            other => other,
        };
    }

    /// Events since the last drain, engine events first
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        let mut events = self.engine.drain_events();
        events.append(&mut self.state.events);
        events
    }

    /// Readable per-tick state
    pub fn snapshot(&self) -> Snapshot {
        let entities = self
            .engine
            .all_entities()
            .into_iter()
            .filter(|e| !e.is_dying())
            .map(|e| EntityView {
                id: e.id(),
                tag: e.tag(),
                position: e.core.position(),
                dimension: e.core.dimensions(),
                state: e.core.state(),
            })
            .collect();
        Snapshot {
            phase: self.state.phase(),
            timer: self.state.timer().seconds(),
            score: self.state.score(),
            bomber_lives: self.bomber_stats().map(|s| s.lives),
            entities,
        }
    }

    /// Number of entities of `tag` still in play
    pub fn count(&self, tag: EntityTag) -> usize {
        self.engine
            .all_entities()
            .into_iter()
            .filter(|e| e.tag() == tag && !e.is_dying() && !self.engine.is_pending_removal(e.id()))
            .count()
    }
}
