//! rapier2d physics integration
//!
//! Circles for everything that moves, boxes for terrain. No gravity and no
//! rotation. Bodies are addressed by our own [`BodyHandle`] so iteration and
//! event order never depend on rapier's arena layout.
//!
//! Contact events are collected during `step` and drained by the caller
//! afterwards, so game logic never runs inside the physics pipeline.
//!
//! rapier2d is compiled with `enhanced-determinism`; with the fixed step and
//! sorted contact lists the simulation replays identically on one platform.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use glam::Vec2;
use rapier2d::crossbeam::channel::unbounded;
use rapier2d::prelude::{
    ActiveCollisionTypes, ActiveEvents, CCDSolver, ChannelEventCollector, ColliderBuilder, ColliderHandle, ColliderSet,
    CollisionEvent, ContactForceEvent, DefaultBroadPhase, ImpulseJointSet, IntegrationParameters, IslandManager,
    MultibodyJointSet, NarrowPhase, PhysicsPipeline, Real, RigidBodyBuilder, RigidBodyHandle, RigidBodySet,
    RigidBodyType, SharedShape, Vector, vector,
};
use serde::{Deserialize, Serialize};

use crate::consts::WORLD_SCALE;

/// Stable handle to a body in a [`PhysicsWorld`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyHandle(u32);

/// How a body takes part in the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyKind {
    /// Never moves (terrain, unkickable bombs)
    Static,
    /// Moves by its velocity, never pushed by contacts (flames)
    Kinematic,
    /// Moves by its velocity and is pushed out of solid bodies
    Dynamic,
}

impl BodyKind {
    fn rigid_body_type(self) -> RigidBodyType {
        match self {
            BodyKind::Static => RigidBodyType::Fixed,
            BodyKind::Kinematic => RigidBodyType::KinematicVelocityBased,
            BodyKind::Dynamic => RigidBodyType::Dynamic,
        }
    }

    fn from_rigid_body_type(body_type: RigidBodyType) -> Self {
        match body_type {
            RigidBodyType::Fixed => BodyKind::Static,
            RigidBodyType::Dynamic => BodyKind::Dynamic,
            RigidBodyType::KinematicVelocityBased | RigidBodyType::KinematicPositionBased => BodyKind::Kinematic,
        }
    }
}

/// Collider shape
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Circle { radius: f32 },
    Rect { half_extents: Vec2 },
}

impl Shape {
    fn shared(self) -> SharedShape {
        match self {
            Shape::Circle { radius } => SharedShape::ball(radius as Real),
            Shape::Rect { half_extents } => SharedShape::cuboid(half_extents.x as Real, half_extents.y as Real),
        }
    }
}

/// Body descriptor, also returned as a read-only snapshot by [`PhysicsWorld::body`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub kind: BodyKind,
    pub shape: Shape,
    /// Center of the collider in pixels
    pub position: Vec2,
    /// Linear velocity in pixels per second
    pub velocity: Vec2,
    /// Sensors report contacts but are never pushed and never push
    pub sensor: bool,
}

impl Body {
    /// Dynamic solid circle at rest
    pub fn circle(center: Vec2, radius: f32) -> Self {
        Self {
            kind: BodyKind::Dynamic,
            shape: Shape::Circle { radius },
            position: center,
            velocity: Vec2::ZERO,
            sensor: false,
        }
    }

    /// Static solid box (terrain)
    pub fn rect(center: Vec2, half_extents: Vec2) -> Self {
        Self {
            kind: BodyKind::Static,
            shape: Shape::Rect { half_extents },
            position: center,
            velocity: Vec2::ZERO,
            sensor: false,
        }
    }

    pub fn with_kind(mut self, kind: BodyKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_sensor(mut self, sensor: bool) -> Self {
        self.sensor = sensor;
        self
    }
}

/// Two bodies whose contact began or ended (always ordered `a < b`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ContactPair {
    pub a: BodyHandle,
    pub b: BodyHandle,
}

impl ContactPair {
    fn ordered(x: BodyHandle, y: BodyHandle) -> Self {
        if x <= y { Self { a: x, b: y } } else { Self { a: y, b: x } }
    }
}

/// rapier handles behind one of our bodies
#[derive(Debug, Clone, Copy)]
struct Slot {
    rigid_body: RigidBodyHandle,
    collider: ColliderHandle,
    shape: Shape,
}

/// The physics world
pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    gravity: Vector<Real>,
    integration_params: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    slots: BTreeMap<BodyHandle, Slot>,
    collider_to_body: HashMap<ColliderHandle, BodyHandle>,
    next_handle: u32,
    begin_contacts: Vec<ContactPair>,
    end_contacts: Vec<ContactPair>,
}

impl fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("bodies", &self.slots.len())
            .field("next_handle", &self.next_handle)
            .field("begin_contacts", &self.begin_contacts)
            .field("end_contacts", &self.end_contacts)
            .finish()
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    /// Zero-gravity world, as the grid is seen from above
    pub fn new() -> Self {
        let mut integration_params = IntegrationParameters::default();
        // Positions are in pixels
        integration_params.length_unit = WORLD_SCALE as Real;
        Self {
            pipeline: PhysicsPipeline::new(),
            gravity: vector![0.0, 0.0],
            integration_params,
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            slots: BTreeMap::new(),
            collider_to_body: HashMap::new(),
            next_handle: 0,
            begin_contacts: Vec::new(),
            end_contacts: Vec::new(),
        }
    }

    pub fn create_body(&mut self, body: Body) -> BodyHandle {
        let handle = BodyHandle(self.next_handle);
        self.next_handle += 1;

        let mut builder = RigidBodyBuilder::new(body.kind.rigid_body_type())
            .translation(vector![body.position.x as Real, body.position.y as Real])
            .lock_rotations()
            .can_sleep(false);
        if body.kind != BodyKind::Static {
            builder = builder.linvel(vector![body.velocity.x as Real, body.velocity.y as Real]);
        }
        let rigid_body = self.rigid_body_set.insert(builder.build());

        // Static bombs still have to notice kinematic flames
        let collider = ColliderBuilder::new(body.shape.shared())
            .sensor(body.sensor)
            .friction(0.0)
            .restitution(0.0)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .active_collision_types(ActiveCollisionTypes::default() | ActiveCollisionTypes::KINEMATIC_FIXED)
            .build();
        let collider = self
            .collider_set
            .insert_with_parent(collider, rigid_body, &mut self.rigid_body_set);

        self.slots.insert(
            handle,
            Slot {
                rigid_body,
                collider,
                shape: body.shape,
            },
        );
        self.collider_to_body.insert(collider, handle);
        handle
    }

    /// Remove a body; any contact it was part of is dropped without an end event
    pub fn destroy_body(&mut self, handle: BodyHandle) -> bool {
        let Some(slot) = self.slots.remove(&handle) else {
            return false;
        };
        self.collider_to_body.remove(&slot.collider);
        self.rigid_body_set.remove(
            slot.rigid_body,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
        true
    }

    /// Remove every body, terrain included; handles are never reused
    pub fn clear(&mut self) {
        let next_handle = self.next_handle;
        *self = Self::new();
        self.next_handle = next_handle;
    }

    /// Snapshot of a body's current state
    pub fn body(&self, handle: BodyHandle) -> Option<Body> {
        let slot = self.slots.get(&handle)?;
        let rb = self.rigid_body_set.get(slot.rigid_body)?;
        let collider = self.collider_set.get(slot.collider)?;
        Some(Body {
            kind: BodyKind::from_rigid_body_type(rb.body_type()),
            shape: slot.shape,
            position: Vec2::new(rb.translation().x as f32, rb.translation().y as f32),
            velocity: Vec2::new(rb.linvel().x as f32, rb.linvel().y as f32),
            sensor: collider.is_sensor(),
        })
    }

    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.slots.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn position(&self, handle: BodyHandle) -> Option<Vec2> {
        let slot = self.slots.get(&handle)?;
        let t = self.rigid_body_set.get(slot.rigid_body)?.translation();
        Some(Vec2::new(t.x as f32, t.y as f32))
    }

    pub fn set_position(&mut self, handle: BodyHandle, position: Vec2) {
        let Some(slot) = self.slots.get(&handle) else { return };
        if let Some(rb) = self.rigid_body_set.get_mut(slot.rigid_body) {
            rb.set_translation(vector![position.x as Real, position.y as Real], true);
        }
    }

    pub fn set_velocity(&mut self, handle: BodyHandle, velocity: Vec2) {
        let Some(slot) = self.slots.get(&handle) else { return };
        if let Some(rb) = self.rigid_body_set.get_mut(slot.rigid_body) {
            if !rb.is_fixed() {
                rb.set_linvel(vector![velocity.x as Real, velocity.y as Real], true);
            }
        }
    }

    pub fn set_sensor(&mut self, handle: BodyHandle, sensor: bool) {
        let Some(slot) = self.slots.get(&handle) else { return };
        if let Some(collider) = self.collider_set.get_mut(slot.collider) {
            collider.set_sensor(sensor);
        }
    }

    pub fn set_kind(&mut self, handle: BodyHandle, kind: BodyKind) {
        let Some(slot) = self.slots.get(&handle) else { return };
        if let Some(rb) = self.rigid_body_set.get_mut(slot.rigid_body) {
            rb.set_body_type(kind.rigid_body_type(), true);
            if kind == BodyKind::Static {
                rb.set_linvel(vector![0.0, 0.0], false);
            }
        }
    }

    /// Advance the world by `dt` seconds and queue the contacts that began or ended
    pub fn step(&mut self, dt: f32) {
        self.integration_params.dt = dt as Real;

        let (collision_send, collision_recv) = unbounded::<CollisionEvent>();
        let (force_send, _force_recv) = unbounded::<ContactForceEvent>();
        let event_handler = ChannelEventCollector::new(collision_send, force_send);

        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None,
            &(),
            &event_handler,
        );

        let mut begun = Vec::new();
        let mut ended = Vec::new();
        while let Ok(event) = collision_recv.try_recv() {
            // Colliders we removed ourselves are already unmapped
            if event.removed() {
                continue;
            }
            let (Some(&x), Some(&y)) = (
                self.collider_to_body.get(&event.collider1()),
                self.collider_to_body.get(&event.collider2()),
            ) else {
                continue;
            };
            let pair = ContactPair::ordered(x, y);
            if event.started() {
                begun.push(pair);
            } else {
                ended.push(pair);
            }
        }

        // Channel delivery order follows rapier's internals
        begun.sort();
        ended.sort();
        self.begin_contacts.extend(begun);
        self.end_contacts.extend(ended);
    }

    pub fn drain_begin_contacts(&mut self) -> Vec<ContactPair> {
        std::mem::take(&mut self.begin_contacts)
    }

    pub fn drain_end_contacts(&mut self) -> Vec<ContactPair> {
        std::mem::take(&mut self.end_contacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEP: f32 = 0.033;

    #[test]
    fn test_dynamic_body_moves_by_velocity() {
        let mut world = PhysicsWorld::new();
        let h = world.create_body(Body::circle(Vec2::ZERO, 5.0));
        world.set_velocity(h, Vec2::new(10.0, 0.0));
        world.step(0.5);
        let pos = world.position(h).unwrap();
        assert!((pos.x - 5.0).abs() < 1e-3, "got {:?}", pos);
        assert!(pos.y.abs() < 1e-3);
    }

    #[test]
    fn test_static_body_ignores_velocity() {
        let mut world = PhysicsWorld::new();
        let h = world.create_body(Body::rect(Vec2::ZERO, Vec2::splat(16.0)));
        world.set_velocity(h, Vec2::new(10.0, 0.0));
        world.step(1.0);
        assert_eq!(world.position(h), Some(Vec2::ZERO));
    }

    #[test]
    fn test_solid_circle_stopped_by_wall() {
        let mut world = PhysicsWorld::new();
        let wall = world.create_body(Body::rect(Vec2::new(16.0, 16.0), Vec2::splat(16.0)));
        let ball = world.create_body(Body::circle(Vec2::new(48.0, 16.0), 12.8));

        let mut contacts = Vec::new();
        for _ in 0..10 {
            world.set_velocity(ball, Vec2::new(-200.0, 0.0));
            world.step(STEP);
            contacts.extend(world.drain_begin_contacts());
        }

        let pos = world.position(ball).unwrap();
        assert!(pos.x > 32.0 + 12.8 - 1.0, "ball should rest against the wall, got {}", pos.x);
        assert!(contacts.contains(&ContactPair { a: wall, b: ball }));
    }

    #[test]
    fn test_sensor_overlaps_without_push() {
        let mut world = PhysicsWorld::new();
        let wall = world.create_body(Body::rect(Vec2::new(16.0, 16.0), Vec2::splat(16.0)));
        let ghost = world.create_body(Body::circle(Vec2::new(20.0, 16.0), 12.8).with_sensor(true));
        world.step(STEP);
        let pos = world.position(ghost).unwrap();
        assert!(pos.distance(Vec2::new(20.0, 16.0)) < 1e-3);
        assert_eq!(world.drain_begin_contacts(), vec![ContactPair { a: wall, b: ghost }]);
    }

    #[test]
    fn test_begin_and_end_contacts_reported_once() {
        let mut world = PhysicsWorld::new();
        let a = world.create_body(Body::circle(Vec2::ZERO, 5.0).with_sensor(true));
        let b = world.create_body(Body::circle(Vec2::new(8.0, 0.0), 5.0).with_sensor(true));

        world.step(STEP);
        assert_eq!(world.drain_begin_contacts(), vec![ContactPair { a, b }]);
        world.step(STEP);
        assert!(world.drain_begin_contacts().is_empty(), "still touching, no new begin");

        world.set_position(b, Vec2::new(50.0, 0.0));
        world.step(STEP);
        assert_eq!(world.drain_end_contacts(), vec![ContactPair { a, b }]);
    }

    #[test]
    fn test_static_pairs_never_touch() {
        let mut world = PhysicsWorld::new();
        world.create_body(Body::rect(Vec2::ZERO, Vec2::splat(16.0)));
        world.create_body(Body::rect(Vec2::new(8.0, 0.0), Vec2::splat(16.0)));
        world.step(STEP);
        assert!(world.drain_begin_contacts().is_empty());
    }

    #[test]
    fn test_kinematic_sensor_reaches_static_sensor() {
        let mut world = PhysicsWorld::new();
        let bomb = world.create_body(Body::circle(Vec2::ZERO, 12.8).with_kind(BodyKind::Static).with_sensor(true));
        let fire = world.create_body(
            Body::circle(Vec2::new(4.0, 0.0), 12.8)
                .with_kind(BodyKind::Kinematic)
                .with_sensor(true),
        );
        world.step(STEP);
        assert_eq!(world.drain_begin_contacts(), vec![ContactPair { a: bomb, b: fire }]);
    }

    #[test]
    fn test_pushed_dynamic_body_keeps_sliding() {
        let mut world = PhysicsWorld::new();
        let pusher = world.create_body(Body::circle(Vec2::ZERO, 5.0));
        let bomb = world.create_body(Body::circle(Vec2::new(11.0, 0.0), 5.0));
        for _ in 0..3 {
            world.set_velocity(pusher, Vec2::new(100.0, 0.0));
            world.step(STEP);
        }
        world.set_velocity(pusher, Vec2::ZERO);
        let before = world.position(bomb).unwrap();
        world.step(STEP);
        world.step(STEP);

        assert!(world.body(bomb).unwrap().velocity.x > 0.0);
        assert!(world.position(bomb).unwrap().x > before.x);
    }

    #[test]
    fn test_kind_and_sensor_changes_are_visible() {
        let mut world = PhysicsWorld::new();
        let h = world.create_body(Body::circle(Vec2::ZERO, 5.0).with_kind(BodyKind::Static).with_sensor(true));
        world.set_kind(h, BodyKind::Dynamic);
        world.set_sensor(h, false);
        let body = world.body(h).unwrap();
        assert_eq!(body.kind, BodyKind::Dynamic);
        assert!(!body.sensor);
    }

    #[test]
    fn test_destroyed_body_drops_contacts_silently() {
        let mut world = PhysicsWorld::new();
        let a = world.create_body(Body::circle(Vec2::ZERO, 5.0).with_sensor(true));
        let b = world.create_body(Body::circle(Vec2::new(8.0, 0.0), 5.0).with_sensor(true));
        world.step(STEP);
        world.drain_begin_contacts();

        assert!(world.destroy_body(b));
        world.step(STEP);
        assert!(world.drain_end_contacts().is_empty());
        assert!(world.contains(a));
        assert!(!world.contains(b));
    }

    #[test]
    fn test_clear_removes_everything() {
        let mut world = PhysicsWorld::new();
        world.create_body(Body::rect(Vec2::ZERO, Vec2::splat(16.0)));
        let old = world.create_body(Body::circle(Vec2::ZERO, 5.0));
        world.clear();
        assert!(world.is_empty());
        let fresh = world.create_body(Body::circle(Vec2::ZERO, 5.0));
        assert!(fresh > old, "handles are not reused after a clear");
    }
}
