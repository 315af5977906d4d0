//! Enemy movement strategies
//!
//! An enemy walks from block to block. Whenever its whole box fits inside the
//! block it is heading for, it snaps into that block and the strategy picks
//! the next one.

use rand::Rng;
use rand_pcg::Pcg32;

use super::block::{Grid, GridPos};
use super::entity::{EntityCore, PhysicsEntity};
use super::physics::PhysicsWorld;
use crate::error::{SimError, SimResult};

/// Transitions a [`PersistStrategy`] keeps the same adjacency index for
pub const KEEP_DIRECTION: u32 = 3;

/// Pluggable enemy movement policy
pub trait MoveStrategy: std::fmt::Debug {
    /// Block currently being walked toward
    fn current(&self) -> Option<GridPos>;

    fn set_current(&mut self, pos: GridPos);

    /// Choose the block after `current`
    fn next_move(&mut self, current: GridPos, grid: &Grid, rng: &mut Pcg32) -> GridPos;

    /// Turn back, used after bumping into something
    fn change_direction(&mut self);

    /// Bind to the block under the entity's centre
    fn bind(&mut self, core: &EntityCore, grid: &Grid) -> SimResult<()> {
        let center = core.center();
        let pos = grid.pos_at(center).ok_or(SimError::BlockNotInGrid {
            x: center.x,
            y: center.y,
        })?;
        self.set_current(pos);
        Ok(())
    }

    /// Steer the entity one tick
    fn advance(&mut self, core: &mut EntityCore, grid: &Grid, physics: &mut PhysicsWorld, rng: &mut Pcg32) -> SimResult<()> {
        let current = self.current().ok_or(SimError::StrategyUnbound)?;
        let block = grid.get(current).ok_or(SimError::StrategyUnbound)?;

        if block.contains_entity(core) {
            core.align_to(physics, block);
            let next = self.next_move(current, grid, rng);
            self.set_current(next);
        }

        let holds_bomb = |pos: GridPos| grid.get(pos).is_some_and(|b| b.has_bomb());
        let target = self.current().ok_or(SimError::StrategyUnbound)?;
        if holds_bomb(target) {
            self.change_direction();
            // Nothing left to back off to: hold the block underfoot
            let target = self.current().ok_or(SimError::StrategyUnbound)?;
            if holds_bomb(target) {
                if let Some(here) = grid.pos_at(core.center()) {
                    self.set_current(here);
                }
            }
        }

        let target = self.current().ok_or(SimError::StrategyUnbound)?;
        if let Some(block) = grid.get(target) {
            core.move_toward(physics, block.position());
        }
        Ok(())
    }
}

/// Random walk over free blocks, avoiding blocks already visited
#[derive(Debug, Clone, Default)]
pub struct WanderStrategy {
    current: Option<GridPos>,
    visited: Vec<GridPos>,
}

impl WanderStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MoveStrategy for WanderStrategy {
    fn current(&self) -> Option<GridPos> {
        self.current
    }

    fn set_current(&mut self, pos: GridPos) {
        self.current = Some(pos);
    }

    fn next_move(&mut self, current: GridPos, grid: &Grid, rng: &mut Pcg32) -> GridPos {
        self.visited.push(current);
        let fresh: Vec<GridPos> = grid
            .free_adjacent(current)
            .into_iter()
            .filter(|p| !self.visited.contains(p))
            .collect();
        if !fresh.is_empty() {
            return fresh[rng.random_range(0..fresh.len())];
        }

        // Dead end: forget the trail and allow any free neighbour
        self.visited.clear();
        self.visited.push(current);
        let any = grid.free_adjacent(current);
        if any.is_empty() {
            current
        } else {
            any[rng.random_range(0..any.len())]
        }
    }

    fn change_direction(&mut self) {
        let Some(blocked) = self.current else { return };
        if let Some(prev) = self.visited.last().copied() {
            self.current = Some(prev);
        }
        self.visited.clear();
        self.visited.push(blocked);
    }
}

/// Keeps heading the same way for a few blocks before re-rolling
///
/// The held choice is an index into the neighbour list, so it keeps meaning
/// "same direction" only while the neighbour list has the same shape.
#[derive(Debug, Clone)]
pub struct PersistStrategy {
    current: Option<GridPos>,
    visited: Vec<GridPos>,
    index: usize,
    held: u32,
}

impl Default for PersistStrategy {
    fn default() -> Self {
        Self {
            current: None,
            visited: Vec::new(),
            index: 0,
            held: KEEP_DIRECTION,
        }
    }
}

impl PersistStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transitions made with the current index
    pub fn steps_held(&self) -> u32 {
        self.held
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl MoveStrategy for PersistStrategy {
    fn current(&self) -> Option<GridPos> {
        self.current
    }

    fn set_current(&mut self, pos: GridPos) {
        self.current = Some(pos);
    }

    fn next_move(&mut self, current: GridPos, grid: &Grid, rng: &mut Pcg32) -> GridPos {
        self.visited.push(current);
        let options: Vec<GridPos> = grid
            .adjacent(current)
            .into_iter()
            .filter(|p| grid.get(*p).is_some_and(|b| !b.is_wall()))
            .collect();
        if options.is_empty() {
            return current;
        }
        if self.held >= KEEP_DIRECTION || self.index >= options.len() {
            self.index = rng.random_range(0..options.len());
            self.held = 0;
        }
        self.held += 1;
        options[self.index]
    }

    fn change_direction(&mut self) {
        self.held = KEEP_DIRECTION + 1;
        if let Some(prev) = self.visited.pop() {
            self.current = Some(prev);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use rand::SeedableRng;

    fn enemy_in(physics: &mut PhysicsWorld, grid: &Grid, pos: GridPos) -> EntityCore {
        let block = grid.get(pos).unwrap();
        EntityCore::new(physics, block.position(), 1, 1.0, true, grid.tile_size())
    }

    /// Teleport into the target block so the next advance is a transition
    fn arrive(core: &mut EntityCore, physics: &mut PhysicsWorld, grid: &Grid, pos: GridPos) {
        core.set_position(physics, grid.get(pos).unwrap().position());
    }

    #[test]
    fn test_unbound_strategy_errors() {
        let mut physics = PhysicsWorld::new();
        let grid = Grid::open_field(5, 5, 32.0, &mut physics);
        let mut core = enemy_in(&mut physics, &grid, GridPos::new(1, 1));
        let mut rng = Pcg32::seed_from_u64(0);

        let mut wander = WanderStrategy::new();
        assert_eq!(
            wander.advance(&mut core, &grid, &mut physics, &mut rng),
            Err(SimError::StrategyUnbound)
        );
    }

    #[test]
    fn test_wander_prefers_unvisited_free_blocks() {
        let mut physics = PhysicsWorld::new();
        let grid = Grid::generate(7, 7, 32.0, &mut physics);
        let mut rng = Pcg32::seed_from_u64(3);
        let start = GridPos::new(1, 1);
        let mut core = enemy_in(&mut physics, &grid, start);

        let mut wander = WanderStrategy::new();
        wander.bind(&core, &grid).unwrap();
        let mut trail = vec![start];
        for _ in 0..6 {
            wander.advance(&mut core, &grid, &mut physics, &mut rng).unwrap();
            let next = wander.current().unwrap();
            assert!(grid.get(next).unwrap().is_free());
            trail.push(next);
            arrive(&mut core, &mut physics, &grid, next);
        }
        // The ring around (2,2) is a corridor: no back-tracking until it closes
        let unique: std::collections::HashSet<_> = trail.iter().collect();
        assert_eq!(unique.len(), trail.len());
    }

    #[test]
    fn test_wander_stays_when_boxed_in() {
        let mut physics = PhysicsWorld::new();
        // 3x3 grid: the single interior cell has only walls around it
        let grid = Grid::open_field(3, 3, 32.0, &mut physics);
        let mut rng = Pcg32::seed_from_u64(9);
        let mut wander = WanderStrategy::new();
        let next = wander.next_move(GridPos::new(1, 1), &grid, &mut rng);
        assert_eq!(next, GridPos::new(1, 1));
    }

    #[test]
    fn test_wander_change_direction_reverses() {
        let mut wander = WanderStrategy::new();
        wander.visited.push(GridPos::new(1, 1));
        wander.set_current(GridPos::new(2, 1));
        wander.change_direction();
        assert_eq!(wander.current(), Some(GridPos::new(1, 1)));
        assert_eq!(wander.visited, vec![GridPos::new(2, 1)]);
    }

    #[test]
    fn test_persist_holds_index_for_three_transitions() {
        let mut physics = PhysicsWorld::new();
        let grid = Grid::open_field(21, 21, 32.0, &mut physics);
        let mut rng = Pcg32::seed_from_u64(11);
        let start = GridPos::new(10, 10);
        let mut core = enemy_in(&mut physics, &grid, start);

        let mut persist = PersistStrategy::new();
        persist.bind(&core, &grid).unwrap();

        let mut from = start;
        let mut deltas = Vec::new();
        let mut held = Vec::new();
        for _ in 0..4 {
            persist.advance(&mut core, &grid, &mut physics, &mut rng).unwrap();
            let to = persist.current().unwrap();
            deltas.push((to.x as i64 - from.x as i64, to.y as i64 - from.y as i64));
            held.push(persist.steps_held());
            arrive(&mut core, &mut physics, &grid, to);
            from = to;
        }

        assert_eq!(held, vec![1, 2, 3, 1]);
        assert_eq!(deltas[0], deltas[1]);
        assert_eq!(deltas[1], deltas[2]);
    }

    #[test]
    fn test_persist_change_direction_backtracks_and_rerolls() {
        let mut physics = PhysicsWorld::new();
        let grid = Grid::open_field(9, 9, 32.0, &mut physics);
        let mut rng = Pcg32::seed_from_u64(2);
        let mut persist = PersistStrategy::new();
        persist.set_current(GridPos::new(4, 4));
        let next = persist.next_move(GridPos::new(4, 4), &grid, &mut rng);
        persist.set_current(next);

        persist.change_direction();
        assert_eq!(persist.current(), Some(GridPos::new(4, 4)));
        assert!(persist.steps_held() > KEEP_DIRECTION);
    }

    #[test]
    fn test_persist_never_targets_walls() {
        let mut physics = PhysicsWorld::new();
        let grid = Grid::generate(9, 9, 32.0, &mut physics);
        let mut rng = Pcg32::seed_from_u64(21);
        let mut persist = PersistStrategy::new();
        let mut pos = GridPos::new(1, 1);
        for _ in 0..100 {
            pos = persist.next_move(pos, &grid, &mut rng);
            assert!(!grid.get(pos).unwrap().is_wall());
        }
    }

    #[test]
    fn test_advance_turns_back_from_bomb() {
        let mut physics = PhysicsWorld::new();
        // 5x3 corridor: (1,1) (2,1) (3,1)
        let mut grid = Grid::open_field(5, 3, 32.0, &mut physics);
        grid.get_mut(GridPos::new(3, 1))
            .unwrap()
            .set_bomb(crate::sim::entity::EntityId::from_raw(7));
        let mut rng = Pcg32::seed_from_u64(4);
        let mut core = enemy_in(&mut physics, &grid, GridPos::new(2, 1));

        let mut wander = WanderStrategy::new();
        wander.visited.push(GridPos::new(1, 1));
        wander.bind(&core, &grid).unwrap();
        wander.advance(&mut core, &grid, &mut physics, &mut rng).unwrap();

        // Only unvisited free neighbour is (3,1), which holds a bomb
        assert_eq!(wander.current(), Some(GridPos::new(2, 1)));
        let v = physics.body(core.body().unwrap()).unwrap().velocity;
        assert_eq!(v, Vec2::ZERO);
    }

    #[test]
    fn test_persist_with_empty_trail_stops_short_of_bomb() {
        let mut physics = PhysicsWorld::new();
        let mut grid = Grid::open_field(7, 7, 32.0, &mut physics);
        let bomb_cell = GridPos::new(3, 3);
        grid.get_mut(bomb_cell)
            .unwrap()
            .set_bomb(crate::sim::entity::EntityId::from_raw(7));
        let mut rng = Pcg32::seed_from_u64(5);
        let here = GridPos::new(2, 3);
        let mut core = enemy_in(&mut physics, &grid, here);
        // Half-way toward the bomb, with no trail to back off along
        core.set_position(&mut physics, grid.get(here).unwrap().position() + Vec2::new(10.0, 0.0));

        let mut persist = PersistStrategy::new();
        persist.set_current(bomb_cell);
        for _ in 0..3 {
            persist.advance(&mut core, &grid, &mut physics, &mut rng).unwrap();
            assert_ne!(persist.current(), Some(bomb_cell));
        }
        assert_eq!(persist.current(), Some(here));
        let v = physics.body(core.body().unwrap()).unwrap().velocity;
        assert!(v.x <= 0.0, "still heading for the bomb: {:?}", v);
    }
}
