//! Deferred publish/subscribe bus.
//!
//! Publishing only enqueues. Handlers run when the owner calls
//! [`EventBus::flush`], once per tick: every queued event is dispatched in
//! publish order, and for each event the handlers of its kind run in
//! subscription order. Handlers never see the bus itself; anything they
//! publish goes through a [`Publisher`] and is queued for the *next* flush,
//! so a flush can neither recurse nor have its subscription list changed
//! underneath it.
//!
//! # Example
//!
//! ```
//! use td_core::bus::{EventBus, OwnerId, Publisher};
//! use td_core::events::EnemyKilledEvent;
//!
//! let mut bus: EventBus<u32> = EventBus::new();
//! bus.subscribe(OwnerId(7), |_: &EnemyKilledEvent, kills: &mut u32, _: &mut Publisher| {
//!     *kills += 1;
//! });
//!
//! let mut kills = 0;
//! bus.publish(EnemyKilledEvent { enemy: 1 });
//! assert_eq!(kills, 0);
//! bus.flush(&mut kills);
//! assert_eq!(kills, 1);
//! ```

use std::collections::VecDeque;
use std::fmt;

use crate::events::{BusEvent, Event, EventKind};

/// Identifies who registered a subscription, for bulk disconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(pub u32);

impl OwnerId {
    /// Handlers registered by the simulation itself.
    pub const CORE: Self = Self(0);
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Collects events published during a system pass or a flush.
#[derive(Debug, Default)]
pub struct Publisher {
    events: Vec<Event>,
}

impl Publisher {
    /// Queue an event.
    pub fn publish(&mut self, event: impl Into<Event>) {
        self.events.push(event.into());
    }

    /// Number of queued events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether nothing was published.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Queued events in publish order.
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Take every queued event.
    pub fn drain(&mut self) -> std::vec::Drain<'_, Event> {
        self.events.drain(..)
    }
}

type Handler<C> = Box<dyn FnMut(&Event, &mut C, &mut Publisher) + Send>;

struct Subscription<C> {
    id: SubscriptionId,
    owner: OwnerId,
    kind: EventKind,
    handler: Handler<C>,
}

/// Typed event bus over a context `C` that handlers mutate.
pub struct EventBus<C> {
    subscriptions: Vec<Subscription<C>>,
    queue: VecDeque<Event>,
    next_subscription: u64,
}

impl<C> fmt::Debug for EventBus<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscriptions.len())
            .field("pending", &self.queue.len())
            .finish()
    }
}

impl<C> Default for EventBus<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> EventBus<C> {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscriptions: Vec::new(),
            queue: VecDeque::new(),
            next_subscription: 1,
        }
    }

    /// Register a handler for events of type `E`.
    pub fn subscribe<E, F>(&mut self, owner: OwnerId, mut handler: F) -> SubscriptionId
    where
        E: BusEvent,
        F: FnMut(&E, &mut C, &mut Publisher) + Send + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscriptions.push(Subscription {
            id,
            owner,
            kind: E::KIND,
            handler: Box::new(move |event, ctx, out| {
                if let Some(payload) = E::extract(event) {
                    handler(payload, ctx, out);
                }
            }),
        });
        id
    }

    /// Remove one `E` subscription. Returns `false` if it was not registered for `E`.
    pub fn unsubscribe<E: BusEvent>(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions
            .retain(|sub| !(sub.id == id && sub.kind == E::KIND));
        self.subscriptions.len() != before
    }

    /// Remove every subscription registered by `owner`, returning how many were removed.
    pub fn disconnect_all(&mut self, owner: OwnerId) -> usize {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|sub| sub.owner != owner);
        before - self.subscriptions.len()
    }

    /// Remove every subscription and drop pending events.
    pub fn clear(&mut self) {
        self.subscriptions.clear();
        self.queue.clear();
    }

    /// Drop pending events, keeping subscriptions.
    pub fn clear_pending(&mut self) {
        self.queue.clear();
    }

    /// Enqueue an event for the next flush.
    pub fn publish(&mut self, event: impl Into<Event>) {
        self.queue.push_back(event.into());
    }

    /// Enqueue everything collected by a [`Publisher`].
    pub fn publish_all(&mut self, publisher: &mut Publisher) {
        self.queue.extend(publisher.drain());
    }

    /// Number of queued events.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Snapshot of queued events in publish order.
    #[must_use]
    pub fn pending_events(&self) -> Vec<Event> {
        self.queue.iter().cloned().collect()
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Dispatch every queued event and return the dispatched batch.
    ///
    /// Events published by handlers are queued for the next flush.
    pub fn flush(&mut self, ctx: &mut C) -> Vec<Event> {
        let batch: Vec<Event> = self.queue.drain(..).collect();
        let mut deferred = Publisher::default();

        for event in &batch {
            let kind = event.kind();
            for sub in self.subscriptions.iter_mut().filter(|sub| sub.kind == kind) {
                (sub.handler)(event, ctx, &mut deferred);
            }
        }

        self.publish_all(&mut deferred);
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{AttackEvent, EnemyKilledEvent, HealEvent};
    use crate::math::Fixed;

    fn attack(target: u64) -> AttackEvent {
        AttackEvent {
            attacker: 1,
            target,
            damage: Fixed::ONE,
        }
    }

    #[test]
    fn test_publish_is_deferred_until_flush() {
        let mut bus: EventBus<Vec<u64>> = EventBus::new();
        bus.subscribe(OwnerId(1), |e: &AttackEvent, log: &mut Vec<u64>, _: &mut Publisher| {
            log.push(e.target);
        });
        let mut log = Vec::new();
        bus.publish(attack(5));
        assert!(log.is_empty());
        assert_eq!(bus.pending(), 1);

        let batch = bus.flush(&mut log);
        assert_eq!(log, vec![5]);
        assert_eq!(batch.len(), 1);
        assert_eq!(bus.pending(), 0);
    }

    #[test]
    fn test_flush_preserves_publish_order_across_kinds() {
        let mut bus: EventBus<Vec<String>> = EventBus::new();
        bus.subscribe(OwnerId(1), |e: &AttackEvent, log: &mut Vec<String>, _: &mut Publisher| {
            log.push(format!("attack {}", e.target));
        });
        bus.subscribe(OwnerId(1), |e: &HealEvent, log: &mut Vec<String>, _: &mut Publisher| {
            log.push(format!("heal {}", e.target));
        });

        let mut log = Vec::new();
        bus.publish(attack(1));
        bus.publish(HealEvent {
            healer: 9,
            target: 2,
            amount: Fixed::ONE,
        });
        bus.publish(attack(3));
        bus.flush(&mut log);
        assert_eq!(log, vec!["attack 1", "heal 2", "attack 3"]);
    }

    #[test]
    fn test_handlers_run_in_subscription_order() {
        let mut bus: EventBus<Vec<u32>> = EventBus::new();
        for n in 0..3 {
            bus.subscribe(OwnerId(n), move |_: &AttackEvent, log: &mut Vec<u32>, _: &mut Publisher| {
                log.push(n);
            });
        }
        let mut log = Vec::new();
        bus.publish(attack(1));
        bus.flush(&mut log);
        assert_eq!(log, vec![0, 1, 2]);
    }

    #[test]
    fn test_handler_publish_defers_to_next_flush() {
        let mut bus: EventBus<u32> = EventBus::new();
        bus.subscribe(OwnerId(1), |e: &AttackEvent, _: &mut u32, out: &mut Publisher| {
            out.publish(EnemyKilledEvent { enemy: e.target });
        });
        bus.subscribe(OwnerId(1), |_: &EnemyKilledEvent, kills: &mut u32, _: &mut Publisher| {
            *kills += 1;
        });

        let mut kills = 0;
        bus.publish(attack(4));
        let first = bus.flush(&mut kills);
        assert_eq!(first.len(), 1);
        assert_eq!(kills, 0);
        assert_eq!(bus.pending(), 1);

        let second = bus.flush(&mut kills);
        assert_eq!(second, vec![Event::EnemyKilled(EnemyKilledEvent { enemy: 4 })]);
        assert_eq!(kills, 1);
    }

    #[test]
    fn test_unsubscribe_checks_kind() {
        let mut bus: EventBus<u32> = EventBus::new();
        let id = bus.subscribe(OwnerId(1), |_: &AttackEvent, n: &mut u32, _: &mut Publisher| {
            *n += 1;
        });
        assert!(!bus.unsubscribe::<HealEvent>(id));
        assert!(bus.unsubscribe::<AttackEvent>(id));
        assert!(!bus.unsubscribe::<AttackEvent>(id));

        let mut n = 0;
        bus.publish(attack(1));
        bus.flush(&mut n);
        assert_eq!(n, 0);
    }

    #[test]
    fn test_disconnect_all_only_removes_owner() {
        let mut bus: EventBus<u32> = EventBus::new();
        bus.subscribe(OwnerId(1), |_: &AttackEvent, n: &mut u32, _: &mut Publisher| *n += 1);
        bus.subscribe(OwnerId(1), |_: &HealEvent, n: &mut u32, _: &mut Publisher| *n += 1);
        bus.subscribe(OwnerId(2), |_: &AttackEvent, n: &mut u32, _: &mut Publisher| *n += 10);

        assert_eq!(bus.disconnect_all(OwnerId(1)), 2);
        assert_eq!(bus.subscription_count(), 1);

        let mut n = 0;
        bus.publish(attack(1));
        bus.flush(&mut n);
        assert_eq!(n, 10);
    }
}
