//! Fixed-step battle runner.
//!
//! Deploys the requested units, ticks the battle at a constant Δt until
//! it is decided (or the time limit runs out), and summarises the result.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::Serialize;

use td_core::context::Outcome;
use td_core::events::{EnemyArriveHomeEvent, EnemyKilledEvent, WaveStartedEvent};
use td_core::math::{fixed_serde, Fixed, Vec2Fixed};
use td_core::session::SessionData;
use td_core::simulation::{tick_duration, Simulation};
use td_core::world::EntityId;

/// A unit to place before the first tick, written `class@x,y`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    /// Player blueprint class.
    pub class: String,
    /// Placement on the map.
    pub position: Vec2Fixed,
}

impl FromStr for Deployment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (class, coords) = s
            .split_once('@')
            .ok_or_else(|| format!("expected class@x,y, got '{s}'"))?;
        let (x, y) = coords
            .split_once(',')
            .ok_or_else(|| format!("expected x,y after '@', got '{coords}'"))?;
        let x: i32 = x.trim().parse().map_err(|e| format!("bad x '{x}': {e}"))?;
        let y: i32 = y.trim().parse().map_err(|e| format!("bad y '{y}': {e}"))?;
        if class.is_empty() {
            return Err(format!("missing class in '{s}'"));
        }
        Ok(Self {
            class: class.to_string(),
            position: Vec2Fixed::from_ints(x, y),
        })
    }
}

/// How to run a battle.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Game-time limit in seconds.
    pub seconds: u32,
    /// Δt per tick.
    pub dt: Fixed,
    /// Units placed before the first tick, in order.
    pub deployments: Vec<Deployment>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seconds: 300,
            dt: tick_duration(),
            deployments: Vec::new(),
        }
    }
}

impl RunConfig {
    /// Ticks needed to cover `seconds` at `dt` (0 if `dt` is not positive).
    #[must_use]
    pub fn max_ticks(&self) -> u64 {
        if self.dt <= Fixed::ZERO {
            return 0;
        }
        let ticks = Fixed::saturating_from_num(self.seconds)
            .saturating_div(self.dt)
            .saturating_ceil();
        ticks.to_num::<u64>()
    }
}

/// A deployment that was placed.
#[derive(Debug, Clone, Serialize)]
pub struct DeployedUnit {
    /// Player blueprint class.
    pub class: String,
    /// Entity id in the battle.
    pub entity: EntityId,
}

/// Result of a headless battle.
#[derive(Debug, Clone, Serialize)]
pub struct BattleSummary {
    /// Level name.
    pub level: String,
    /// Ticks simulated.
    pub ticks: u64,
    /// Decided outcome, if any.
    pub outcome: Option<Outcome>,
    /// Home health left.
    pub home_hp: u32,
    /// Enemies spawned.
    pub enemy_count: u32,
    /// Enemies killed.
    pub enemy_killed_count: u32,
    /// Enemies that reached home.
    pub enemy_arrived_count: u32,
    /// Cost left.
    #[serde(with = "fixed_serde")]
    pub cost: Fixed,
    /// Waves started.
    pub waves_started: usize,
    /// Units placed.
    pub deployed: Vec<DeployedUnit>,
    /// Deployments refused, with the reason.
    pub rejected: Vec<String>,
    /// Tick of each kill, arrival and wave start.
    pub timeline: Vec<TimelineEntry>,
    /// Dispatched events per kind.
    pub event_counts: BTreeMap<String, usize>,
    /// Final state hash.
    pub state_hash: u64,
}

/// A notable moment in the battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    /// Tick index.
    pub tick: u64,
    /// What happened.
    pub what: String,
}

/// Deploy, tick until decided or out of time, and summarise.
///
/// One more tick runs after the deciding tick so handler follow-ups such
/// as the game-end notice are counted.
pub fn run_battle(sim: &mut Simulation, config: &RunConfig) -> BattleSummary {
    let mut deployed = Vec::new();
    let mut rejected = Vec::new();
    for deployment in &config.deployments {
        match sim.deploy_player(&deployment.class, deployment.position, 1, 1) {
            Ok(entity) => deployed.push(DeployedUnit {
                class: deployment.class.clone(),
                entity,
            }),
            Err(err) => {
                tracing::warn!(class = %deployment.class, error = %err, "deployment refused");
                rejected.push(format!("{}: {err}", deployment.class));
            }
        }
    }

    let max_ticks = config.max_ticks();
    let mut timeline = Vec::new();
    let mut event_counts = BTreeMap::new();
    tracing::info!(max_ticks, dt = %config.dt, deployed = deployed.len(), "battle running");

    let mut decided = false;
    while sim.tick_count() < max_ticks && !decided {
        decided = sim.stats().outcome.is_some();
        let events = sim.tick(config.dt);
        for event in &events.events {
            *event_counts.entry(format!("{:?}", event.kind())).or_insert(0) += 1;
        }
        for wave in events.of::<WaveStartedEvent>() {
            timeline.push(TimelineEntry {
                tick: events.tick,
                what: format!("wave {} started", wave.wave),
            });
        }
        for killed in events.of::<EnemyKilledEvent>() {
            timeline.push(TimelineEntry {
                tick: events.tick,
                what: format!("enemy {} killed", killed.enemy),
            });
        }
        for arrived in events.of::<EnemyArriveHomeEvent>() {
            timeline.push(TimelineEntry {
                tick: events.tick,
                what: format!("enemy {} reached home", arrived.enemy),
            });
        }
    }

    let stats = sim.stats();
    tracing::info!(
        ticks = sim.tick_count(),
        outcome = ?stats.outcome,
        killed = stats.enemy_killed_count,
        arrived = stats.enemy_arrived_count,
        "battle finished"
    );
    BattleSummary {
        level: sim.level().name.clone(),
        ticks: sim.tick_count(),
        outcome: stats.outcome,
        home_hp: stats.home_hp,
        enemy_count: stats.enemy_count,
        enemy_killed_count: stats.enemy_killed_count,
        enemy_arrived_count: stats.enemy_arrived_count,
        cost: stats.cost,
        waves_started: sim.waves().waves_started(),
        deployed,
        rejected,
        timeline,
        event_counts,
        state_hash: sim.state_hash(),
    }
}

/// Fold a decided battle into `session`. Returns `false` (and leaves the
/// session alone) if the battle is still undecided.
pub fn apply_to_session(session: &mut SessionData, sim: &Simulation) -> bool {
    if sim.stats().outcome.is_none() {
        return false;
    }
    session.record_outcome(sim.stats());
    true
}
