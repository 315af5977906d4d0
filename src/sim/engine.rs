//! Entity engine
//!
//! Owns every live entity, the physics world and the mapping from bodies back
//! to entities. Structural changes are queued and committed at fixed points of
//! [`EntityEngine::update`]:
//!
//! 1. update every live entity (in id order)
//! 2. commit pending additions
//! 3. commit pending removals (bodies destroyed)
//! 4. physics step by [`PHYSICS_STEP`], never by the frame time
//! 5. deliver contact-begin events
//! 6. deliver contact-end events
//!
//! Entities spawned during a tick join the live set at step 2, so their own
//! first update runs on the next tick.

use std::collections::{BTreeMap, HashMap};

use super::entity::{Entity, EntityCore, EntityId, EntityKind, EntityTag, PhysicsEntity};
use super::physics::{BodyHandle, ContactPair, PhysicsWorld};
use super::state::GameEvent;
use super::world::WorldState;
use crate::consts::PHYSICS_STEP;
use crate::error::SimResult;

#[derive(Debug, Default)]
pub struct EntityEngine {
    physics: PhysicsWorld,
    entities: BTreeMap<EntityId, Entity>,
    to_add: Vec<Entity>,
    to_remove: Vec<EntityId>,
    body_lookup: HashMap<BodyHandle, EntityId>,
    contacts: Vec<ContactPair>,
    releases: Vec<ContactPair>,
    next_id: u32,
    events: Vec<GameEvent>,
}

impl EntityEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn physics_mut(&mut self) -> &mut PhysicsWorld {
        &mut self.physics
    }

    /// Queue a new entity; it goes live on the next commit
    pub fn add(&mut self, core: EntityCore, kind: EntityKind) -> EntityId {
        let id = EntityId::from_raw(self.next_id);
        self.next_id += 1;
        self.to_add.push(Entity::new(id, core, kind));
        id
    }

    /// Queue an entity for removal
    pub fn remove(&mut self, id: EntityId) {
        if !self.to_remove.contains(&id) {
            self.to_remove.push(id);
        }
    }

    pub fn is_pending_removal(&self, id: EntityId) -> bool {
        self.to_remove.contains(&id)
    }

    /// Live or pending entity
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities
            .get(&id)
            .or_else(|| self.to_add.iter().find(|e| e.id() == id))
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        match self.entities.get_mut(&id) {
            Some(entity) => Some(entity),
            None => self.to_add.iter_mut().find(|e| e.id() == id),
        }
    }

    /// Entity together with the physics world, for updates touching both
    pub fn entity_and_physics_mut(&mut self, id: EntityId) -> Option<(&mut Entity, &mut PhysicsWorld)> {
        let entity = match self.entities.get_mut(&id) {
            Some(entity) => entity,
            None => self.to_add.iter_mut().find(|e| e.id() == id)?,
        };
        Some((entity, &mut self.physics))
    }

    /// Run `f` on an entity taken out of the engine, then put it back
    ///
    /// The engine stays fully usable inside `f`; the entity itself is not
    /// visible through it while `f` runs.
    pub fn with_entity<R>(&mut self, id: EntityId, f: impl FnOnce(&mut Entity, &mut EntityEngine) -> R) -> Option<R> {
        if let Some(mut entity) = self.entities.remove(&id) {
            let result = f(&mut entity, self);
            self.entities.insert(id, entity);
            return Some(result);
        }
        let i = self.to_add.iter().position(|e| e.id() == id)?;
        let mut entity = self.to_add.remove(i);
        let result = f(&mut entity, self);
        let i = i.min(self.to_add.len());
        self.to_add.insert(i, entity);
        Some(result)
    }

    /// Live entities in id order
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Live and pending entities in id order
    pub fn all_entities(&self) -> Vec<&Entity> {
        let mut all: Vec<&Entity> = self.entities.values().chain(self.to_add.iter()).collect();
        all.sort_by_key(|e| e.id());
        all
    }

    pub fn live_count(&self) -> usize {
        self.entities.len()
    }

    pub fn pending_additions(&self) -> usize {
        self.to_add.len()
    }

    pub fn entity_by_body(&self, body: BodyHandle) -> Option<EntityId> {
        self.body_lookup.get(&body).copied()
    }

    fn ids_with_tag(&self, tag: EntityTag) -> Vec<EntityId> {
        self.all_entities()
            .into_iter()
            .filter(|e| e.tag() == tag && !e.is_dying() && !self.to_remove.contains(&e.id()))
            .map(Entity::id)
            .collect()
    }

    /// Enemies still in play
    pub fn enemies(&self) -> Vec<EntityId> {
        self.ids_with_tag(EntityTag::Enemy)
    }

    /// Bombs still ticking
    pub fn bombs(&self) -> Vec<EntityId> {
        self.ids_with_tag(EntityTag::Bomb)
    }

    /// Force a bomb's fuse to zero
    pub fn detonate(&mut self, bomb: EntityId) {
        if let Some(bomb) = self.entity_mut(bomb).and_then(Entity::as_bomb_mut) {
            bomb.detonate();
        }
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Advance every entity and the physics world by one tick
    pub fn update(&mut self, world: &mut WorldState) -> SimResult<()> {
        let ids: Vec<EntityId> = self.entities.keys().copied().collect();
        for id in ids {
            if self.to_remove.contains(&id) {
                continue;
            }
            let Some(mut entity) = self.entities.remove(&id) else {
                continue;
            };
            let result = entity.update(self, world);
            self.entities.insert(id, entity);
            result?;
        }

        self.commit_additions();
        self.commit_removals();

        self.physics.step(PHYSICS_STEP);
        self.contacts.extend(self.physics.drain_begin_contacts());
        self.releases.extend(self.physics.drain_end_contacts());

        while let Some(pair) = self.contacts.pop() {
            self.dispatch(pair, true, world)?;
        }
        while let Some(pair) = self.releases.pop() {
            self.dispatch(pair, false, world)?;
        }
        Ok(())
    }

    fn commit_additions(&mut self) {
        for entity in std::mem::take(&mut self.to_add) {
            let id = entity.id();
            debug_assert!(entity.core.body().is_some(), "entity {:?} added without a body", id);
            if let Some(body) = entity.core.body() {
                self.body_lookup.insert(body, id);
            }
            self.events.push(GameEvent::EntityCreated { id, tag: entity.tag() });
            self.entities.insert(id, entity);
        }
    }

    fn commit_removals(&mut self) {
        for id in std::mem::take(&mut self.to_remove) {
            let entity = match self.entities.remove(&id) {
                Some(entity) => Some(entity),
                None => self
                    .to_add
                    .iter()
                    .position(|e| e.id() == id)
                    .map(|i| self.to_add.remove(i)),
            };
            if let Some(entity) = entity {
                self.discard(entity);
            }
        }
    }

    fn discard(&mut self, mut entity: Entity) {
        if let Some(body) = entity.core.take_body() {
            self.physics.destroy_body(body);
            self.body_lookup.remove(&body);
        }
        log::trace!("Removed {:?} {:?}", entity.tag(), entity.id());
        self.events.push(GameEvent::EntityDestroyed {
            id: entity.id(),
            tag: entity.tag(),
        });
    }

    fn dispatch(&mut self, pair: ContactPair, begin: bool, world: &mut WorldState) -> SimResult<()> {
        let (Some(a), Some(b)) = (self.entity_by_body(pair.a), self.entity_by_body(pair.b)) else {
            return Ok(());
        };
        self.notify(a, b, begin, world)?;
        self.notify(b, a, begin, world)
    }

    fn notify(&mut self, target: EntityId, other: EntityId, begin: bool, world: &mut WorldState) -> SimResult<()> {
        let Some(other_tag) = self.entities.get(&other).map(Entity::tag) else {
            return Ok(());
        };
        if !self.entities.get(&target).is_some_and(Entity::listens_for_contacts) {
            return Ok(());
        }
        let Some(mut entity) = self.entities.remove(&target) else {
            return Ok(());
        };
        let result = if begin {
            entity.on_contact(other, other_tag, self, world)
        } else {
            entity.on_release(other, other_tag, self, world)
        };
        self.entities.insert(target, entity);
        result
    }

    /// Immediately drop every live and pending entity
    pub fn remove_all(&mut self) {
        let live = std::mem::take(&mut self.entities);
        let pending = std::mem::take(&mut self.to_add);
        for entity in live.into_values().chain(pending) {
            self.discard(entity);
        }
        self.to_remove.clear();
        self.contacts.clear();
        self.releases.clear();
    }

    /// Reset the physics world, terrain bodies included
    pub fn clear_world(&mut self) {
        self.physics.clear();
        self.body_lookup.clear();
        self.contacts.clear();
        self.releases.clear();
    }
}
