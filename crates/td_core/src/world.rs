//! Entity and component storage.
//!
//! The [`World`] owns every entity and all of its component data.
//! Each component type lives in its own dense [`Storage`] (packed values
//! plus a sparse id index), so iterating one component type walks a
//! contiguous `Vec`.
//!
//! Entity ids are allocated monotonically and never reused: a destroyed
//! id stays invalid forever, so stale references held in components or
//! events are always detectable with [`World::is_valid`].
//!
//! # Example
//!
//! ```
//! use td_core::components::{Dead, Transform};
//! use td_core::math::Vec2Fixed;
//! use td_core::world::World;
//!
//! let mut world = World::new();
//! let unit = world.create();
//! world.attach(unit, Transform::at(Vec2Fixed::ZERO)).unwrap();
//!
//! assert!(world.has::<Transform>(unit));
//! assert_eq!(world.query::<(Transform,)>().count(), 1);
//! assert_eq!(world.query::<(Transform, Dead)>().count(), 0);
//!
//! world.destroy(unit);
//! assert!(!world.is_valid(unit));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::components::{
    AttackTimer, BlockedBy, Blocker, Buff, CostRegen, Dead, EnemyUnit, Injured, Orientation,
    PathFollower, PlayerUnit, Projectile, Skill, SkillActive, SkillReady, Stats, Target,
    Transform, Velocity,
};
use crate::error::{GameError, Result};

/// Unique identifier for an entity.
pub type EntityId = u64;

// ============================================================================
// Storage
// ============================================================================

/// Dense storage for one component type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Storage<T> {
    ids: Vec<EntityId>,
    values: Vec<T>,
    index: BTreeMap<EntityId, usize>,
}

impl<T> Default for Storage<T> {
    fn default() -> Self {
        Self {
            ids: Vec::new(),
            values: Vec::new(),
            index: BTreeMap::new(),
        }
    }
}

impl<T> Storage<T> {
    /// Insert or replace, returning the previous value.
    fn insert(&mut self, id: EntityId, value: T) -> Option<T> {
        if let Some(&slot) = self.index.get(&id) {
            return Some(std::mem::replace(&mut self.values[slot], value));
        }
        self.index.insert(id, self.values.len());
        self.ids.push(id);
        self.values.push(value);
        None
    }

    /// Remove with swap-remove, patching the index of the moved element.
    fn remove(&mut self, id: EntityId) -> Option<T> {
        let slot = self.index.remove(&id)?;
        self.ids.swap_remove(slot);
        let value = self.values.swap_remove(slot);
        if let Some(&moved) = self.ids.get(slot) {
            self.index.insert(moved, slot);
        }
        Some(value)
    }

    /// Get a component by entity id.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.index.get(&id).map(|&slot| &self.values[slot])
    }

    fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        let slot = *self.index.get(&id)?;
        self.values.get_mut(slot)
    }

    /// Whether `id` has this component.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.index.contains_key(&id)
    }

    /// Entity ids in dense order.
    #[must_use]
    pub fn ids(&self) -> &[EntityId] {
        &self.ids
    }

    /// Number of stored components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate `(id, component)` pairs in dense order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.ids.iter().copied().zip(self.values.iter())
    }
}

/// A type stored in the [`World`].
///
/// Implemented for the closed set of component types listed in this
/// module; there is no runtime registration.
pub trait Component: Sized + 'static {
    /// Type name used in error messages.
    const NAME: &'static str;

    /// Shared access to this component's storage.
    fn storage(world: &World) -> &Storage<Self>;

    /// Exclusive access to this component's storage.
    fn storage_mut(world: &mut World) -> &mut Storage<Self>;
}

macro_rules! component_storages {
    ($($field:ident: $ty:ty),* $(,)?) => {
        #[derive(Debug, Clone, Default, Serialize, Deserialize)]
        struct Storages {
            $($field: Storage<$ty>,)*
        }

        impl Storages {
            fn remove_all(&mut self, id: EntityId) {
                $(self.$field.remove(id);)*
            }

            fn hash_entity<H: Hasher>(&self, id: EntityId, state: &mut H) {
                $(
                    if let Some(value) = self.$field.get(id) {
                        stringify!($field).hash(state);
                        value.hash(state);
                    }
                )*
            }
        }

        $(
            impl Component for $ty {
                const NAME: &'static str = stringify!($ty);

                fn storage(world: &World) -> &Storage<Self> {
                    &world.storages.$field
                }

                fn storage_mut(world: &mut World) -> &mut Storage<Self> {
                    &mut world.storages.$field
                }
            }
        )*
    };
}

component_storages! {
    transform: Transform,
    velocity: Velocity,
    orientation: Orientation,
    stats: Stats,
    attack_timer: AttackTimer,
    target: Target,
    projectile: Projectile,
    blocker: Blocker,
    blocked_by: BlockedBy,
    player: PlayerUnit,
    enemy: EnemyUnit,
    path_follower: PathFollower,
    skill: Skill,
    buff: Buff,
    cost_regen: CostRegen,
    injured: Injured,
    dead: Dead,
    skill_ready: SkillReady,
    skill_active: SkillActive,
}

// ============================================================================
// Queries
// ============================================================================

/// A tuple of component types to match, e.g. `(Stats, Transform)`.
///
/// Iteration follows the dense order of the first component's storage.
pub trait Query {
    /// Candidate ids (the first component's dense ids).
    fn lead(world: &World) -> &[EntityId];

    /// Whether `id` has every component in the tuple.
    fn matches(world: &World, id: EntityId) -> bool;
}

macro_rules! impl_query {
    ($first:ident $(, $rest:ident)*) => {
        impl<$first: Component $(, $rest: Component)*> Query for ($first, $($rest,)*) {
            fn lead(world: &World) -> &[EntityId] {
                $first::storage(world).ids()
            }

            fn matches(world: &World, id: EntityId) -> bool {
                $first::storage(world).contains(id) $(&& $rest::storage(world).contains(id))*
            }
        }
    };
}

impl_query!(A);
impl_query!(A, B);
impl_query!(A, B, C);
impl_query!(A, B, C, D);

/// Lazy iterator over entities matching a [`Query`].
///
/// Cloning or calling [`restart`](Self::restart) replays the sequence
/// from the beginning.
pub struct QueryIter<'w, Q> {
    world: &'w World,
    ids: &'w [EntityId],
    cursor: usize,
    marker: PhantomData<fn() -> Q>,
}

impl<Q> Clone for QueryIter<'_, Q> {
    fn clone(&self) -> Self {
        Self {
            world: self.world,
            ids: self.ids,
            cursor: self.cursor,
            marker: PhantomData,
        }
    }
}

impl<Q: Query> QueryIter<'_, Q> {
    /// Rewind to the first matching entity.
    pub fn restart(&mut self) {
        self.cursor = 0;
    }
}

impl<Q: Query> Iterator for QueryIter<'_, Q> {
    type Item = EntityId;

    fn next(&mut self) -> Option<EntityId> {
        while let Some(&id) = self.ids.get(self.cursor) {
            self.cursor += 1;
            if Q::matches(self.world, id) {
                return Some(id);
            }
        }
        None
    }
}

// ============================================================================
// World
// ============================================================================

/// Owner of all entities and their components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct World {
    next_id: EntityId,
    alive: BTreeSet<EntityId>,
    storages: Storages,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Create an empty world. The first entity id is 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 1,
            alive: BTreeSet::new(),
            storages: Storages::default(),
        }
    }

    /// Allocate a new entity with no components.
    pub fn create(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        self.alive.insert(id);
        id
    }

    /// Destroy an entity and every component attached to it.
    ///
    /// Returns `false` (and logs) for stale ids.
    pub fn destroy(&mut self, id: EntityId) -> bool {
        if !self.alive.remove(&id) {
            tracing::warn!(entity = id, "destroy called on stale entity");
            return false;
        }
        self.storages.remove_all(id);
        true
    }

    /// Whether `id` refers to a live entity.
    #[must_use]
    pub fn is_valid(&self, id: EntityId) -> bool {
        self.alive.contains(&id)
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.alive.len()
    }

    /// Whether the world has no live entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alive.is_empty()
    }

    /// Live entity ids in ascending order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.alive.iter().copied()
    }

    /// Attach a component, replacing any existing one of the same type.
    pub fn attach<T: Component>(&mut self, id: EntityId, component: T) -> Result<()> {
        if !self.is_valid(id) {
            return Err(GameError::StaleEntity(id));
        }
        T::storage_mut(self).insert(id, component);
        Ok(())
    }

    /// Remove a component, returning it if present.
    pub fn detach<T: Component>(&mut self, id: EntityId) -> Option<T> {
        T::storage_mut(self).remove(id)
    }

    /// Whether `id` has a `T` component.
    #[must_use]
    pub fn has<T: Component>(&self, id: EntityId) -> bool {
        T::storage(self).contains(id)
    }

    /// Get a component, failing with [`GameError::MissingComponent`] if absent.
    pub fn get<T: Component>(&self, id: EntityId) -> Result<&T> {
        if !self.is_valid(id) {
            return Err(GameError::StaleEntity(id));
        }
        T::storage(self)
            .get(id)
            .ok_or(GameError::MissingComponent {
                entity: id,
                component: T::NAME,
            })
    }

    /// Mutable variant of [`get`](Self::get).
    pub fn get_mut<T: Component>(&mut self, id: EntityId) -> Result<&mut T> {
        if !self.is_valid(id) {
            return Err(GameError::StaleEntity(id));
        }
        T::storage_mut(self)
            .get_mut(id)
            .ok_or(GameError::MissingComponent {
                entity: id,
                component: T::NAME,
            })
    }

    /// Get a component if present.
    #[must_use]
    pub fn try_get<T: Component>(&self, id: EntityId) -> Option<&T> {
        T::storage(self).get(id)
    }

    /// Get a component mutably if present.
    pub fn try_get_mut<T: Component>(&mut self, id: EntityId) -> Option<&mut T> {
        T::storage_mut(self).get_mut(id)
    }

    /// Iterate `(id, component)` pairs of one type in dense order.
    pub fn iter<T: Component>(&self) -> impl Iterator<Item = (EntityId, &T)> {
        T::storage(self).iter()
    }

    /// Lazily iterate entities having every component in `Q`.
    #[must_use]
    pub fn query<Q: Query>(&self) -> QueryIter<'_, Q> {
        QueryIter {
            world: self,
            ids: Q::lead(self),
            cursor: 0,
            marker: PhantomData,
        }
    }

    /// Matching entities collected in ascending id order.
    ///
    /// Systems that mutate while iterating, or whose results depend on
    /// visit order, use this instead of [`query`](Self::query).
    #[must_use]
    pub fn query_sorted<Q: Query>(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.query::<Q>().collect();
        ids.sort_unstable();
        ids
    }

    /// Whether `id` is live and not tagged [`Dead`].
    #[must_use]
    pub fn is_active(&self, id: EntityId) -> bool {
        self.is_valid(id) && !self.has::<Dead>(id)
    }

    /// Feed every live entity and its components into `state`, in id order.
    pub fn hash_into<H: Hasher>(&self, state: &mut H) {
        self.next_id.hash(state);
        self.alive.len().hash(state);
        for &id in &self.alive {
            id.hash(state);
            self.storages.hash_entity(id, state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Injured, Stats};
    use crate::math::{Fixed, Vec2Fixed};

    fn stats(hp: i32) -> Stats {
        Stats {
            hp: Fixed::from_num(hp),
            max_hp: Fixed::from_num(hp),
            atk: Fixed::ZERO,
            def: Fixed::ZERO,
            range: Fixed::ZERO,
            atk_interval: Fixed::ONE,
            level: 1,
            rarity: 1,
        }
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut world = World::new();
        let a = world.create();
        assert!(world.destroy(a));
        let b = world.create();
        assert_ne!(a, b);
        assert!(!world.is_valid(a));
        assert!(!world.destroy(a));
    }

    #[test]
    fn test_destroy_releases_all_components() {
        let mut world = World::new();
        let id = world.create();
        world.attach(id, stats(10)).unwrap();
        world.attach(id, Injured).unwrap();
        world.destroy(id);
        assert!(!world.has::<Stats>(id));
        assert!(!world.has::<Injured>(id));
        assert!(Stats::storage(&world).is_empty());
    }

    #[test]
    fn test_get_reports_missing_and_stale() {
        let mut world = World::new();
        let id = world.create();
        assert!(matches!(
            world.get::<Stats>(id),
            Err(GameError::MissingComponent {
                component: "Stats",
                ..
            })
        ));
        world.destroy(id);
        assert!(matches!(world.get::<Stats>(id), Err(GameError::StaleEntity(_))));
        assert!(world.attach(id, stats(1)).is_err());
    }

    #[test]
    fn test_attach_replaces() {
        let mut world = World::new();
        let id = world.create();
        world.attach(id, stats(10)).unwrap();
        world.attach(id, stats(20)).unwrap();
        assert_eq!(world.get::<Stats>(id).unwrap().hp, Fixed::from_num(20));
        assert_eq!(Stats::storage(&world).len(), 1);
    }

    #[test]
    fn test_swap_remove_keeps_index_consistent() {
        let mut world = World::new();
        let ids: Vec<_> = (0..4).map(|_| world.create()).collect();
        for (n, &id) in ids.iter().enumerate() {
            world.attach(id, stats(n as i32 + 1)).unwrap();
        }
        world.detach::<Stats>(ids[0]);
        for (n, &id) in ids.iter().enumerate().skip(1) {
            assert_eq!(world.get::<Stats>(id).unwrap().hp, Fixed::from_num(n as i32 + 1));
        }
    }

    #[test]
    fn test_query_is_lazy_and_restartable() {
        let mut world = World::new();
        let a = world.create();
        let b = world.create();
        world.attach(a, stats(1)).unwrap();
        world.attach(b, stats(1)).unwrap();
        world.attach(b, Transform::at(Vec2Fixed::ZERO)).unwrap();

        let mut query = world.query::<(Stats, Transform)>();
        let replay = query.clone();
        assert_eq!(query.next(), Some(b));
        assert_eq!(query.next(), None);
        query.restart();
        assert_eq!(query.collect::<Vec<_>>(), vec![b]);
        assert_eq!(replay.collect::<Vec<_>>(), vec![b]);
    }

    #[test]
    fn test_query_sorted_orders_by_id() {
        let mut world = World::new();
        let a = world.create();
        let b = world.create();
        world.attach(b, stats(1)).unwrap();
        world.attach(a, stats(1)).unwrap();
        assert_eq!(world.query::<(Stats,)>().collect::<Vec<_>>(), vec![b, a]);
        assert_eq!(world.query_sorted::<(Stats,)>(), vec![a, b]);
    }
}
