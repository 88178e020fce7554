//! Waypoint traversal and blocking.
//!
//! Enemies walk a chain of waypoints towards the terminal "home" node.
//! Defenders with a [`Blocker`] hold enemies in place: a blocked enemy does
//! not advance and fights its blocker instead. Blocking runs before path
//! movement each tick, so an enemy claimed this tick does not take another
//! step.
//!
//! Claims are first-come: a blocker takes unclaimed enemies within its
//! radius, nearest first (ties by entity id), up to its spare capacity, and
//! never takes an enemy that another blocker already holds.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::bus::Publisher;
use crate::components::{
    BlockedBy, Blocker, Dead, EnemyUnit, PathFollower, Transform, Velocity,
};
use crate::context::BattleContext;
use crate::error::{GameError, Result};
use crate::events::{AnimationKind, EnemyArriveHomeEvent, PlayAnimationEvent, PlaySoundEvent, SoundKind};
use crate::math::{Fixed, Vec2Fixed};
use crate::world::{EntityId, World};

/// Identifier of a waypoint node.
pub type NodeId = u32;

// ============================================================================
// Waypoint graph
// ============================================================================

/// A node of the waypoint graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Waypoint {
    /// World position.
    pub position: Vec2Fixed,
    /// Following node; `None` marks home.
    pub next: Option<NodeId>,
}

/// Validated waypoint chains.
///
/// Every `next` resolves, every chain ends at a terminal node and at least
/// one start node exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaypointGraph {
    nodes: BTreeMap<NodeId, Waypoint>,
    start_nodes: Vec<NodeId>,
}

impl WaypointGraph {
    /// Build a graph, rejecting dangling links, cycles and missing starts.
    pub fn new(nodes: BTreeMap<NodeId, Waypoint>, start_nodes: Vec<NodeId>) -> Result<Self> {
        if start_nodes.is_empty() {
            return Err(GameError::InvalidLevel("no start nodes".to_string()));
        }
        if let Some(missing) = start_nodes.iter().find(|id| !nodes.contains_key(id)) {
            return Err(GameError::InvalidLevel(format!(
                "start node {missing} does not exist"
            )));
        }
        for (id, node) in &nodes {
            if let Some(next) = node.next {
                if !nodes.contains_key(&next) {
                    return Err(GameError::InvalidLevel(format!(
                        "node {id} links to missing node {next}"
                    )));
                }
            }
        }
        for &id in nodes.keys() {
            let mut seen = BTreeSet::new();
            let mut cursor = Some(id);
            while let Some(current) = cursor {
                if !seen.insert(current) {
                    return Err(GameError::InvalidLevel(format!(
                        "waypoint chain from node {id} loops at node {current}"
                    )));
                }
                cursor = nodes.get(&current).and_then(|node| node.next);
            }
        }
        Ok(Self { nodes, start_nodes })
    }

    /// Look up a node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Waypoint> {
        self.nodes.get(&id)
    }

    /// Start node ids.
    #[must_use]
    pub fn start_nodes(&self) -> &[NodeId] {
        &self.start_nodes
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Walking distance from `start` to home.
    #[must_use]
    pub fn route_length(&self, start: NodeId) -> Option<Fixed> {
        let mut total = Fixed::ZERO;
        let mut node = self.node(start)?;
        while let Some(next_id) = node.next {
            let next = self.node(next_id)?;
            total += node.position.distance(next.position);
            node = next;
        }
        Some(total)
    }
}

// ============================================================================
// Blocking
// ============================================================================

/// Claim enemies for blockers with spare capacity.
pub fn blocking_system(ctx: &mut BattleContext, out: &mut Publisher) {
    let world = &mut ctx.world;
    release_stale_blocks(world);

    for blocker_id in world.query_sorted::<(Blocker, Transform)>() {
        if world.has::<Dead>(blocker_id) {
            continue;
        }
        let (spare, radius, origin) = match (
            world.try_get::<Blocker>(blocker_id),
            world.try_get::<Transform>(blocker_id),
        ) {
            (Some(blocker), Some(transform)) => (blocker.spare(), blocker.radius, transform.position),
            _ => continue,
        };
        if spare == 0 {
            continue;
        }

        let radius_sq = radius.saturating_mul(radius);
        let mut candidates: Vec<(Fixed, EntityId)> = world
            .query::<(EnemyUnit, Transform)>()
            .filter(|&enemy| !world.has::<Dead>(enemy) && !world.has::<BlockedBy>(enemy))
            .filter_map(|enemy| {
                let dist_sq = world
                    .try_get::<Transform>(enemy)?
                    .position
                    .distance_squared(origin);
                (dist_sq <= radius_sq).then_some((dist_sq, enemy))
            })
            .collect();
        candidates.sort_unstable();

        for (_, enemy) in candidates.into_iter().take(spare as usize) {
            if world.attach(enemy, BlockedBy { blocker: blocker_id }).is_err() {
                continue;
            }
            if let Some(blocker) = world.try_get_mut::<Blocker>(blocker_id) {
                blocker.current_count += 1;
            }
            if let Some(velocity) = world.try_get_mut::<Velocity>(enemy) {
                velocity.value = Vec2Fixed::ZERO;
            }
            tracing::debug!(blocker = blocker_id, enemy, "enemy blocked");
            out.publish(PlayAnimationEvent {
                entity: enemy,
                animation: AnimationKind::Idle,
            });
        }
    }
}

/// Drop `BlockedBy` links whose blocker is gone or dead.
///
/// A blocker that still exists gets its count released.
fn release_stale_blocks(world: &mut World) {
    for enemy in world.query_sorted::<(BlockedBy,)>() {
        let Some(blocker_id) = world.try_get::<BlockedBy>(enemy).map(|link| link.blocker) else {
            continue;
        };
        if world.is_active(blocker_id) && world.has::<Blocker>(blocker_id) {
            continue;
        }
        world.detach::<BlockedBy>(enemy);
        if let Some(blocker) = world.try_get_mut::<Blocker>(blocker_id) {
            blocker.current_count = blocker.current_count.saturating_sub(1);
        }
        tracing::debug!(enemy, blocker = blocker_id, "released enemy from stale blocker");
    }
}

// ============================================================================
// Path following
// ============================================================================

/// Result of advancing one enemy along its route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PathStep {
    position: Vec2Fixed,
    target_node: NodeId,
    arrived_home: bool,
}

/// Spend `budget` distance walking from `from` along the chain starting at
/// `target_node`. Returns the missing node id if the chain is broken.
fn advance_along_path(
    graph: &WaypointGraph,
    from: Vec2Fixed,
    target_node: NodeId,
    budget: Fixed,
    epsilon: Fixed,
) -> std::result::Result<PathStep, NodeId> {
    let mut position = from;
    let mut node = target_node;
    let mut budget = budget;

    loop {
        let waypoint = graph.node(node).ok_or(node)?;
        let remaining = position.distance(waypoint.position);

        if remaining > budget.saturating_add(epsilon) {
            let (position, _) = position.step_towards(waypoint.position, budget);
            return Ok(PathStep {
                position,
                target_node: node,
                arrived_home: false,
            });
        }

        position = waypoint.position;
        budget = (budget - remaining).max(Fixed::ZERO);
        match waypoint.next {
            None => {
                return Ok(PathStep {
                    position,
                    target_node: node,
                    arrived_home: true,
                })
            }
            Some(next) => node = next,
        }
        if budget == Fixed::ZERO {
            return Ok(PathStep {
                position,
                target_node: node,
                arrived_home: false,
            });
        }
    }
}

/// Move unblocked enemies along the waypoint chain.
///
/// An enemy reaching home publishes [`EnemyArriveHomeEvent`] and is tagged
/// [`Dead`] in the same tick; the lifecycle sweep removes it next tick.
pub fn path_system(ctx: &mut BattleContext, dt: Fixed, out: &mut Publisher) {
    let BattleContext {
        world,
        graph,
        config,
        ..
    } = ctx;

    for enemy in world.query_sorted::<(PathFollower, Transform)>() {
        if world.has::<Dead>(enemy) {
            continue;
        }
        if world.has::<BlockedBy>(enemy) {
            if let Some(velocity) = world.try_get_mut::<Velocity>(enemy) {
                velocity.value = Vec2Fixed::ZERO;
            }
            continue;
        }
        let (Some(follower), Some(start)) = (
            world.try_get::<PathFollower>(enemy).copied(),
            world.try_get::<Transform>(enemy).map(|t| t.position),
        ) else {
            continue;
        };

        let budget = follower.speed.saturating_mul(dt);
        let step = match advance_along_path(graph, start, follower.target_node, budget, config.arrival_epsilon) {
            Ok(step) => step,
            Err(missing) => {
                tracing::error!(enemy, node = missing, "waypoint missing; enemy halted");
                if let Some(velocity) = world.try_get_mut::<Velocity>(enemy) {
                    velocity.value = Vec2Fixed::ZERO;
                }
                continue;
            }
        };

        if let Some(transform) = world.try_get_mut::<Transform>(enemy) {
            transform.position = step.position;
        }
        if let Some(cursor) = world.try_get_mut::<PathFollower>(enemy) {
            cursor.target_node = step.target_node;
        }
        if let Some(velocity) = world.try_get_mut::<Velocity>(enemy) {
            let moved = step.position - start;
            velocity.value = Vec2Fixed::new(
                moved.x.checked_div(dt).unwrap_or(Fixed::ZERO),
                moved.y.checked_div(dt).unwrap_or(Fixed::ZERO),
            );
        }

        if step.arrived_home {
            if let Err(err) = world.attach(enemy, Dead) {
                tracing::error!(enemy, error = %err, "failed to tag arrived enemy");
                continue;
            }
            tracing::debug!(enemy, node = step.target_node, "enemy reached home");
            out.publish(EnemyArriveHomeEvent { enemy });
            out.publish(PlaySoundEvent {
                entity: Some(enemy),
                sound: SoundKind::HomeHit,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(points: &[(i32, i32)]) -> WaypointGraph {
        let nodes = points
            .iter()
            .enumerate()
            .map(|(n, &(x, y))| {
                let id = n as NodeId;
                let next = (n + 1 < points.len()).then_some(id + 1);
                (
                    id,
                    Waypoint {
                        position: Vec2Fixed::from_ints(x, y),
                        next,
                    },
                )
            })
            .collect();
        WaypointGraph::new(nodes, vec![0]).unwrap()
    }

    #[test]
    fn test_graph_rejects_cycles_and_dangling_links() {
        let mut nodes = BTreeMap::new();
        nodes.insert(0, Waypoint { position: Vec2Fixed::ZERO, next: Some(1) });
        nodes.insert(1, Waypoint { position: Vec2Fixed::ZERO, next: Some(0) });
        assert!(WaypointGraph::new(nodes.clone(), vec![0]).is_err());

        nodes.insert(1, Waypoint { position: Vec2Fixed::ZERO, next: Some(7) });
        assert!(WaypointGraph::new(nodes.clone(), vec![0]).is_err());

        nodes.insert(1, Waypoint { position: Vec2Fixed::ZERO, next: None });
        assert!(WaypointGraph::new(nodes.clone(), vec![]).is_err());
        assert!(WaypointGraph::new(nodes.clone(), vec![5]).is_err());
        assert!(WaypointGraph::new(nodes, vec![0]).is_ok());
    }

    #[test]
    fn test_route_length() {
        let graph = line(&[(0, 0), (3, 4), (3, 10)]);
        assert_eq!(graph.route_length(0), Some(Fixed::from_num(11)));
    }

    #[test]
    fn test_advance_carries_budget_across_nodes() {
        let graph = line(&[(0, 0), (2, 0), (2, 5)]);
        let step = advance_along_path(&graph, Vec2Fixed::ZERO, 1, Fixed::from_num(4), Fixed::ZERO).unwrap();
        assert_eq!(step.position, Vec2Fixed::from_ints(2, 2));
        assert_eq!(step.target_node, 2);
        assert!(!step.arrived_home);
    }

    #[test]
    fn test_advance_stops_exactly_at_home() {
        let graph = line(&[(0, 0), (10, 0)]);
        let step =
            advance_along_path(&graph, Vec2Fixed::from_ints(9, 0), 1, Fixed::from_num(5), Fixed::ZERO).unwrap();
        assert_eq!(step.position, Vec2Fixed::from_ints(10, 0));
        assert!(step.arrived_home);
    }

    #[test]
    fn test_advance_reports_missing_node() {
        let graph = line(&[(0, 0), (10, 0)]);
        assert_eq!(
            advance_along_path(&graph, Vec2Fixed::ZERO, 42, Fixed::ONE, Fixed::ZERO),
            Err(42)
        );
    }
}
