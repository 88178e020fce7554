//! Event types carried by the [`EventBus`](crate::bus::EventBus).
//!
//! Every event is a variant of the closed [`Event`] union. Each payload
//! struct implements [`BusEvent`], which is what typed subscription keys
//! on. Events only reference entity ids; handlers validate them before use.

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, Fixed};
use crate::pathing::NodeId;
use crate::world::EntityId;

/// A payload type that can travel on the bus.
pub trait BusEvent: Into<Event> + 'static {
    /// Discriminant used to route this payload.
    const KIND: EventKind;

    /// Borrow the payload if `event` is of this type.
    fn extract(event: &Event) -> Option<&Self>;
}

macro_rules! bus_events {
    ($($(#[$doc:meta])* $variant:ident($ty:ident)),* $(,)?) => {
        /// Closed union of every event in the simulation.
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub enum Event {
            $($(#[$doc])* $variant($ty),)*
        }

        /// Payload-free discriminant of [`Event`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum EventKind {
            $($(#[$doc])* $variant,)*
        }

        impl Event {
            /// Discriminant of this event.
            #[must_use]
            pub fn kind(&self) -> EventKind {
                match self {
                    $(Self::$variant(_) => EventKind::$variant,)*
                }
            }
        }

        $(
            impl BusEvent for $ty {
                const KIND: EventKind = EventKind::$variant;

                fn extract(event: &Event) -> Option<&Self> {
                    match event {
                        Event::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }
            }

            impl From<$ty> for Event {
                fn from(event: $ty) -> Self {
                    Self::$variant(event)
                }
            }
        )*
    };
}

bus_events! {
    /// Damage request from an attacker or landing projectile.
    Attack(AttackEvent),
    /// Heal request.
    Heal(HealEvent),
    /// An enemy walked into the terminal waypoint.
    EnemyArriveHome(EnemyArriveHomeEvent),
    /// An enemy was spawned by the wave spawner.
    EnemySpawned(EnemySpawnedEvent),
    /// An enemy was killed in combat.
    EnemyKilled(EnemyKilledEvent),
    /// A wave became active.
    WaveStarted(WaveStartedEvent),
    /// Presentation cue: play an animation.
    PlayAnimation(PlayAnimationEvent),
    /// Presentation cue: play a sound.
    PlaySound(PlaySoundEvent),
    /// Every spawned enemy has been resolved.
    LevelClear(LevelClearEvent),
    /// Home was destroyed.
    GameEnd(GameEndEvent),
    /// Request to level up a deployed unit.
    UpgradeUnit(UpgradeUnitEvent),
    /// Request to withdraw a deployed unit for a refund.
    RetreatUnit(RetreatUnitEvent),
    /// Request to trigger a ready skill.
    ActivateSkill(ActivateSkillEvent),
}

/// Damage request. `damage` is the attacker's attack value before defense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackEvent {
    /// Attacking entity (the source for projectiles).
    pub attacker: EntityId,
    /// Entity being hit.
    pub target: EntityId,
    /// Raw attack value.
    #[serde(with = "fixed_serde")]
    pub damage: Fixed,
}

/// Heal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealEvent {
    /// Healing entity.
    pub healer: EntityId,
    /// Entity being healed.
    pub target: EntityId,
    /// Health restored.
    #[serde(with = "fixed_serde")]
    pub amount: Fixed,
}

/// An enemy reached home.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyArriveHomeEvent {
    /// The arriving enemy.
    pub enemy: EntityId,
}

/// An enemy entered the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemySpawnedEvent {
    /// The new enemy.
    pub enemy: EntityId,
    /// Blueprint class requested by the wave.
    pub class: String,
    /// Start node it was placed on.
    pub start_node: NodeId,
}

/// An enemy's health reached zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyKilledEvent {
    /// The dead enemy.
    pub enemy: EntityId,
}

/// A wave started spawning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveStartedEvent {
    /// Zero-based wave index.
    pub wave: usize,
}

/// Animation cues for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnimationKind {
    /// Standing still (e.g. just blocked).
    Idle,
    /// Walking along the path.
    Walk,
    /// Attack or heal swing.
    Attack,
    /// Death.
    Dead,
}

/// Play an animation on an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayAnimationEvent {
    /// Animated entity.
    pub entity: EntityId,
    /// Which animation.
    pub animation: AnimationKind,
}

/// Sound cues for the audio layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoundKind {
    /// Attack swing or shot.
    Attack,
    /// Target took damage and survived.
    Hit,
    /// Target died.
    Death,
    /// Heal cast.
    Heal,
    /// Skill activated.
    Skill,
    /// Unit upgraded.
    Upgrade,
    /// Unit retreated.
    Retreat,
    /// Enemy reached home.
    HomeHit,
}

/// Play a sound, optionally positioned on an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaySoundEvent {
    /// Emitting entity, if any.
    pub entity: Option<EntityId>,
    /// Which sound.
    pub sound: SoundKind,
}

/// Level cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelClearEvent {
    /// Enemies killed during the level.
    pub enemy_killed_count: u32,
    /// Enemies that reached home.
    pub enemy_arrived_count: u32,
}

/// Home destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEndEvent {
    /// Tick on which the defeat was detected.
    pub tick: u64,
}

/// Upgrade request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeUnitEvent {
    /// Unit to upgrade.
    pub unit: EntityId,
}

/// Retreat request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetreatUnitEvent {
    /// Unit to withdraw.
    pub unit: EntityId,
}

/// Skill activation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivateSkillEvent {
    /// Unit whose skill should fire.
    pub unit: EntityId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_matches_kind() {
        let event: Event = EnemyKilledEvent { enemy: 3 }.into();
        assert_eq!(event.kind(), EventKind::EnemyKilled);
        assert_eq!(EnemyKilledEvent::extract(&event), Some(&EnemyKilledEvent { enemy: 3 }));
        assert!(AttackEvent::extract(&event).is_none());
    }
}
