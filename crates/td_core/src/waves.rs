//! Wave schedule and the enemy spawner.
//!
//! While no wave is active, the inter-wave countdown runs down; when it
//! reaches zero the next wave activates and its countdown is seeded with
//! the first entry's delay. An active wave counts down by Δt and spawns an
//! entry whenever the countdown is at or below zero, adding the following
//! entry's delay so leftover time carries over. An exhausted wave
//! deactivates and reseeds the inter-wave countdown.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::bus::Publisher;
use crate::context::BattleContext;
use crate::events::{AnimationKind, EnemySpawnedEvent, PlayAnimationEvent, WaveStartedEvent};
use crate::factory;
use crate::level::{BattleRules, SpawnEntry, WaveData};
use crate::math::{fixed_serde, Fixed};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
struct ActiveWave {
    index: usize,
    entries: VecDeque<SpawnEntry>,
    #[serde(with = "fixed_serde")]
    countdown: Fixed,
}

/// Pending waves and spawn timers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaveState {
    pending: VecDeque<WaveData>,
    active: Option<ActiveWave>,
    #[serde(with = "fixed_serde")]
    next_wave_countdown: Fixed,
    #[serde(with = "fixed_serde")]
    wave_interval: Fixed,
    started: usize,
}

impl WaveState {
    /// Schedule `waves` with the timing from `rules`.
    #[must_use]
    pub fn new(waves: Vec<WaveData>, rules: &BattleRules) -> Self {
        Self {
            pending: waves.into(),
            active: None,
            next_wave_countdown: rules.first_wave_delay,
            wave_interval: rules.wave_interval,
            started: 0,
        }
    }

    /// No wave active and none pending.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.pending.is_empty() && self.active.is_none()
    }

    /// Whether a wave is currently spawning.
    #[must_use]
    pub fn is_wave_active(&self) -> bool {
        self.active.is_some()
    }

    /// Waves not yet started.
    #[must_use]
    pub fn remaining_waves(&self) -> usize {
        self.pending.len()
    }

    /// Waves started so far.
    #[must_use]
    pub fn waves_started(&self) -> usize {
        self.started
    }

    /// Seconds until the next wave starts (meaningless while one is active).
    #[must_use]
    pub fn next_wave_countdown(&self) -> Fixed {
        self.next_wave_countdown
    }

    /// Advance timers by `dt`, returning the entries due this tick in wave order.
    pub fn advance(&mut self, dt: Fixed, out: &mut Publisher) -> Vec<SpawnEntry> {
        let mut due = Vec::new();

        if self.active.is_none() {
            if self.pending.is_empty() {
                return due;
            }
            self.next_wave_countdown -= dt;
            if self.next_wave_countdown > Fixed::ZERO {
                return due;
            }
            let Some(wave) = self.pending.pop_front() else {
                return due;
            };
            let index = self.started;
            self.started += 1;
            let countdown = wave.entries.first().map_or(Fixed::ZERO, |entry| entry.delay);
            tracing::info!(wave = index, enemies = wave.entries.len(), "wave started");
            out.publish(WaveStartedEvent { wave: index });
            self.active = Some(ActiveWave {
                index,
                entries: wave.entries.into(),
                countdown,
            });
        }

        let Some(active) = self.active.as_mut() else {
            return due;
        };
        active.countdown -= dt;
        while active.countdown <= Fixed::ZERO {
            let Some(entry) = active.entries.pop_front() else {
                break;
            };
            active.countdown += active.entries.front().map_or(Fixed::ZERO, |next| next.delay);
            due.push(entry);
        }

        if active.entries.is_empty() {
            tracing::debug!(wave = active.index, "wave exhausted");
            self.active = None;
            self.next_wave_countdown = self.wave_interval;
        }
        due
    }
}

/// Spawn every wave entry that is due this tick.
pub fn spawn_system(ctx: &mut BattleContext, dt: Fixed, out: &mut Publisher) {
    for entry in ctx.waves.advance(dt, out) {
        match factory::spawn_enemy(ctx, &entry.enemy, entry.start, entry.level, entry.rarity) {
            Ok(enemy) => {
                ctx.stats.enemy_count += 1;
                out.publish(EnemySpawnedEvent {
                    enemy,
                    class: entry.enemy,
                    start_node: entry.start,
                });
                out.publish(PlayAnimationEvent {
                    entity: enemy,
                    animation: AnimationKind::Walk,
                });
            }
            Err(err) => {
                tracing::error!(class = %entry.enemy, node = entry.start, error = %err, "spawn skipped");
            }
        }
    }
}
