//! Terrain grid
//!
//! One [`Block`] per cell at all times. A block only ever changes through
//! [`Block::destroy`]:
//!
//! - Wall  -> Wall  (no-op)
//! - Brick -> Free  (the power-up tag is read by the explosion resolver, not here)
//! - Free  -> Free  (detonates any held bomb)

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::engine::EntityEngine;
use super::entity::{EntityId, PhysicsEntity};
use super::physics::{Body, BodyHandle, PhysicsWorld};
use super::power_up::PowerUpKind;
use crate::consts::SPAWN_AREA;
use crate::square_contains;

/// Integer cell coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPos {
    pub x: usize,
    pub y: usize,
}

impl GridPos {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Whether the cell belongs to the protected top-left spawn square
    pub fn in_spawn_area(&self) -> bool {
        self.x < SPAWN_AREA && self.y < SPAWN_AREA
    }
}

/// Terrain variant of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    /// Indestructible, impassable
    Wall,
    /// Passable, may hold one bomb
    Free,
    /// Impassable, breakable, may hide a power-up
    Brick { power_up: Option<PowerUpKind> },
}

/// A single grid cell
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    position: Vec2,
    size: f32,
    kind: BlockKind,
    bomb: Option<EntityId>,
    body: Option<BodyHandle>,
}

impl Block {
    pub fn wall(position: Vec2, size: f32, physics: &mut PhysicsWorld) -> Self {
        Self::solid(position, size, BlockKind::Wall, physics)
    }

    pub fn brick(position: Vec2, size: f32, power_up: Option<PowerUpKind>, physics: &mut PhysicsWorld) -> Self {
        Self::solid(position, size, BlockKind::Brick { power_up }, physics)
    }

    /// Free cells have no body
    pub fn free(position: Vec2, size: f32) -> Self {
        Self {
            position,
            size,
            kind: BlockKind::Free,
            bomb: None,
            body: None,
        }
    }

    fn solid(position: Vec2, size: f32, kind: BlockKind, physics: &mut PhysicsWorld) -> Self {
        let half = Vec2::splat(size / 2.0);
        let body = physics.create_body(Body::rect(position + half, half));
        Self {
            position,
            size,
            kind,
            bomb: None,
            body: Some(body),
        }
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn is_wall(&self) -> bool {
        self.kind == BlockKind::Wall
    }

    pub fn is_free(&self) -> bool {
        self.kind == BlockKind::Free
    }

    pub fn is_brick(&self) -> bool {
        matches!(self.kind, BlockKind::Brick { .. })
    }

    /// Power-up hidden in a brick, if any
    pub fn power_up(&self) -> Option<PowerUpKind> {
        match self.kind {
            BlockKind::Brick { power_up } => power_up,
            _ => None,
        }
    }

    pub fn bomb(&self) -> Option<EntityId> {
        self.bomb
    }

    pub fn has_bomb(&self) -> bool {
        self.bomb.is_some()
    }

    pub fn set_bomb(&mut self, bomb: EntityId) {
        self.bomb = Some(bomb);
    }

    pub fn remove_bomb(&mut self) {
        self.bomb = None;
    }

    pub fn contains_point(&self, point: Vec2) -> bool {
        square_contains(self.position, self.size, point)
    }

    /// Whether the whole bounding box of `entity` lies inside this block
    pub fn contains_entity<E: PhysicsEntity + ?Sized>(&self, entity: &E) -> bool {
        let pos = entity.position();
        self.contains_point(pos) && self.contains_point(pos + entity.dimensions())
    }

    /// Resolve an explosion on this cell, returning the block that replaces it
    pub fn destroy(mut self, engine: &mut EntityEngine) -> Block {
        match self.kind {
            BlockKind::Wall => self,
            BlockKind::Free => {
                if let Some(bomb) = self.bomb.take() {
                    engine.detonate(bomb);
                }
                self
            }
            BlockKind::Brick { .. } => {
                if let Some(body) = self.body.take() {
                    engine.physics_mut().destroy_body(body);
                }
                Block::free(self.position, self.size)
            }
        }
    }
}

impl PhysicsEntity for Block {
    fn position(&self) -> Vec2 {
        self.position
    }

    fn dimensions(&self) -> Vec2 {
        Vec2::splat(self.size)
    }

    fn body(&self) -> Option<BodyHandle> {
        self.body
    }
}

/// Dense 2D grid of blocks, row-major
#[derive(Debug, Clone, Default)]
pub struct Grid {
    width: usize,
    height: usize,
    tile_size: f32,
    cells: Vec<Block>,
}

impl Grid {
    /// Classic layout: border and every (even, even) cell are walls, the rest is free
    pub fn generate(width: usize, height: usize, tile_size: f32, physics: &mut PhysicsWorld) -> Self {
        Self::build(width, height, tile_size, physics, |x, y| x % 2 == 0 && y % 2 == 0)
    }

    /// Walls on the border only
    pub fn open_field(width: usize, height: usize, tile_size: f32, physics: &mut PhysicsWorld) -> Self {
        Self::build(width, height, tile_size, physics, |_, _| false)
    }

    fn build(
        width: usize,
        height: usize,
        tile_size: f32,
        physics: &mut PhysicsWorld,
        pillar: impl Fn(usize, usize) -> bool,
    ) -> Self {
        let mut cells = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let position = Vec2::new(x as f32, y as f32) * tile_size;
                let border = x == 0 || y == 0 || x == width - 1 || y == height - 1;
                if border || pillar(x, y) {
                    cells.push(Block::wall(position, tile_size, physics));
                } else {
                    cells.push(Block::free(position, tile_size));
                }
            }
        }
        Self {
            width,
            height,
            tile_size,
            cells,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn tile_size(&self) -> f32 {
        self.tile_size
    }

    fn index(&self, pos: GridPos) -> Option<usize> {
        (pos.x < self.width && pos.y < self.height).then(|| pos.y * self.width + pos.x)
    }

    pub fn get(&self, pos: GridPos) -> Option<&Block> {
        self.index(pos).map(|i| &self.cells[i])
    }

    pub fn get_mut(&mut self, pos: GridPos) -> Option<&mut Block> {
        self.index(pos).map(|i| &mut self.cells[i])
    }

    /// Put `block` in the cell, returning the previous occupant
    pub fn set(&mut self, pos: GridPos, block: Block) -> Option<Block> {
        let i = self.index(pos)?;
        Some(std::mem::replace(&mut self.cells[i], block))
    }

    /// Run [`Block::destroy`] on a cell and store the successor
    ///
    /// Returns the kind the cell had before the explosion.
    pub fn destroy_at(&mut self, pos: GridPos, engine: &mut EntityEngine) -> Option<BlockKind> {
        let i = self.index(pos)?;
        let slot = &mut self.cells[i];
        let old = std::mem::replace(slot, Block::free(slot.position, slot.size));
        let kind = old.kind;
        *slot = old.destroy(engine);
        Some(kind)
    }

    /// Cell containing a pixel position
    pub fn pos_at(&self, point: Vec2) -> Option<GridPos> {
        if point.x < 0.0 || point.y < 0.0 || self.tile_size <= 0.0 {
            return None;
        }
        let pos = GridPos::new((point.x / self.tile_size) as usize, (point.y / self.tile_size) as usize);
        self.index(pos).map(|_| pos)
    }

    pub fn block_at(&self, point: Vec2) -> Option<&Block> {
        self.pos_at(point).and_then(|pos| self.get(pos))
    }

    pub fn is_border(&self, pos: GridPos) -> bool {
        pos.x == 0 || pos.y == 0 || pos.x + 1 == self.width || pos.y + 1 == self.height
    }

    /// In-bounds 4-neighbours, ordered left, up, down, right
    pub fn adjacent(&self, pos: GridPos) -> Vec<GridPos> {
        let mut res = Vec::with_capacity(4);
        if pos.x > 0 {
            res.push(GridPos::new(pos.x - 1, pos.y));
        }
        if pos.y > 0 {
            res.push(GridPos::new(pos.x, pos.y - 1));
        }
        if pos.y + 1 < self.height {
            res.push(GridPos::new(pos.x, pos.y + 1));
        }
        if pos.x + 1 < self.width {
            res.push(GridPos::new(pos.x + 1, pos.y));
        }
        res
    }

    /// Neighbours that are free blocks
    pub fn free_adjacent(&self, pos: GridPos) -> Vec<GridPos> {
        self.adjacent(pos)
            .into_iter()
            .filter(|p| self.get(*p).is_some_and(Block::is_free))
            .collect()
    }

    /// All cell coordinates, row-major
    pub fn positions(&self) -> impl Iterator<Item = GridPos> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| GridPos::new(x, y)))
    }

    /// Clear every reference to `bomb`
    pub fn clear_bomb(&mut self, bomb: EntityId) {
        for block in &mut self.cells {
            if block.bomb == Some(bomb) {
                block.bomb = None;
            }
        }
    }

    pub fn count(&self, pred: impl Fn(&Block) -> bool) -> usize {
        self.cells.iter().filter(|b| pred(b)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_layout() {
        let mut physics = PhysicsWorld::new();
        let grid = Grid::generate(7, 5, 32.0, &mut physics);

        assert!(grid.get(GridPos::new(0, 2)).unwrap().is_wall());
        assert!(grid.get(GridPos::new(6, 4)).unwrap().is_wall());
        assert!(grid.get(GridPos::new(2, 2)).unwrap().is_wall());
        assert!(grid.get(GridPos::new(1, 1)).unwrap().is_free());
        assert!(grid.get(GridPos::new(3, 2)).unwrap().is_free());

        // Walls own a static body each, free cells none
        let walls = grid.count(Block::is_wall);
        assert_eq!(physics.len(), walls);
        // 7x5 border = 20 cells, pillars at (2,2) and (4,2)
        assert_eq!(walls, 22);
    }

    #[test]
    fn test_wall_destroy_is_idempotent() {
        let mut engine = EntityEngine::new();
        let wall = Block::wall(Vec2::new(32.0, 0.0), 32.0, engine.physics_mut());
        let original = wall.clone();

        let mut block = wall;
        for _ in 0..5 {
            block = block.destroy(&mut engine);
        }
        assert_eq!(block, original);
        assert!(engine.physics().contains(block.body().unwrap()));
    }

    #[test]
    fn test_brick_destroy_yields_free_and_drops_body() {
        let mut engine = EntityEngine::new();
        let brick = Block::brick(Vec2::new(64.0, 32.0), 32.0, Some(PowerUpKind::LifeUp), engine.physics_mut());
        let body = brick.body().unwrap();

        let next = brick.destroy(&mut engine);
        assert!(next.is_free());
        assert_eq!(next.position(), Vec2::new(64.0, 32.0));
        assert_eq!(next.power_up(), None);
        assert!(!engine.physics().contains(body));
    }

    #[test]
    fn test_free_destroy_clears_bomb_reference() {
        let mut engine = EntityEngine::new();
        let mut free = Block::free(Vec2::ZERO, 32.0);
        free.set_bomb(EntityId::from_raw(99));

        let next = free.destroy(&mut engine);
        assert!(next.is_free());
        assert!(!next.has_bomb());
    }

    #[test]
    fn test_pos_at_and_bounds() {
        let mut physics = PhysicsWorld::new();
        let grid = Grid::generate(5, 5, 32.0, &mut physics);
        assert_eq!(grid.pos_at(Vec2::new(40.0, 70.0)), Some(GridPos::new(1, 2)));
        assert_eq!(grid.pos_at(Vec2::new(-1.0, 10.0)), None);
        assert_eq!(grid.pos_at(Vec2::new(160.0, 10.0)), None);
    }

    #[test]
    fn test_adjacency() {
        let mut physics = PhysicsWorld::new();
        let grid = Grid::generate(5, 5, 32.0, &mut physics);

        let corner = grid.adjacent(GridPos::new(0, 0));
        assert_eq!(corner, vec![GridPos::new(0, 1), GridPos::new(1, 0)]);

        // (1,1): neighbours (0,1) wall, (1,0) wall, (1,2) free, (2,1) free
        let free = grid.free_adjacent(GridPos::new(1, 1));
        assert_eq!(free, vec![GridPos::new(1, 2), GridPos::new(2, 1)]);
    }

    #[test]
    fn test_contains_entity_needs_whole_box() {
        use crate::sim::entity::EntityCore;

        let mut physics = PhysicsWorld::new();
        let block = Block::free(Vec2::new(32.0, 32.0), 32.0);
        let inside = EntityCore::new(&mut physics, Vec2::new(32.0, 32.0), 1, 1.0, true, 32.0);
        let straddling = EntityCore::new(&mut physics, Vec2::new(40.0, 32.0), 1, 1.0, true, 32.0);

        assert!(block.contains_entity(&inside));
        assert!(!block.contains_entity(&straddling));
    }
}
