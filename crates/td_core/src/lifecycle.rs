//! Removal of dead entities.
//!
//! Entities tagged [`Dead`] stay in the world until the next tick's sweep,
//! so handlers and presentation still see them for one full tick.

use crate::components::{BlockedBy, Blocker, Dead};
use crate::world::{EntityId, World};

/// Destroy every entity tagged [`Dead`], in ascending id order.
///
/// Enemies still held by a dying blocker are released first so no
/// `BlockedBy` link outlives its blocker. Returns the destroyed ids.
pub fn sweep_dead(world: &mut World) -> Vec<EntityId> {
    let dead = world.query_sorted::<(Dead,)>();
    for &id in &dead {
        if world.has::<Blocker>(id) {
            let held: Vec<EntityId> = world
                .iter::<BlockedBy>()
                .filter(|(_, link)| link.blocker == id)
                .map(|(enemy, _)| enemy)
                .collect();
            for enemy in held {
                world.detach::<BlockedBy>(enemy);
                tracing::trace!(enemy, blocker = id, "released from swept blocker");
            }
        }
        world.destroy(id);
    }
    if !dead.is_empty() {
        tracing::trace!(count = dead.len(), "swept dead entities");
    }
    dead
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Fixed;

    #[test]
    fn test_sweep_releases_held_enemies() {
        let mut world = World::new();
        let blocker = world.create();
        world.attach(blocker, Blocker::new(2, Fixed::ONE)).unwrap();
        let enemy = world.create();
        world.attach(enemy, BlockedBy { blocker }).unwrap();
        let other = world.create();

        world.attach(blocker, Dead).unwrap();
        assert_eq!(sweep_dead(&mut world), vec![blocker]);
        assert!(!world.is_valid(blocker));
        assert!(!world.has::<BlockedBy>(enemy));
        assert!(world.is_valid(other));
        assert!(sweep_dead(&mut world).is_empty());
    }
}
