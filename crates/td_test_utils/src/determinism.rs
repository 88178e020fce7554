//! Determinism testing utilities.
//!
//! Provides a harness for verifying that a battle produces identical
//! results given identical data, Δt sequence and requests.
//!
//! # Testing Strategy
//!
//! Sources of non-determinism the harness is meant to catch:
//!
//! - **Floating-point math**: we use fixed-point arithmetic via
//!   [`td_core::math::Fixed`] throughout the simulation.
//!
//! - **HashMap iteration order**: systems always iterate in sorted entity
//!   id order, and event handlers in subscription order.
//!
//! - **Hidden state**: a snapshot round trip must reproduce the same
//!   state hash and the same future.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: individual systems (blocking, combat, waves)
//! 2. **Property tests**: random inputs must still produce deterministic outputs
//! 3. **Integration tests**: full battles are reproducible
//! 4. **Parallel tests**: N battles run on separate threads all match

use std::thread;

use td_core::math::Fixed;
use td_core::simulation::Simulation;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that every run matched.
    ///
    /// # Panics
    ///
    /// Panics if runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            panic!(
                "Battle is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                self.unique_hashes().len(),
                self.hashes
            );
        }
    }
}

/// Result of parallel simulation runs.
#[derive(Debug, Clone)]
pub struct ParallelSimResult {
    /// Final state hash from each simulation.
    pub hashes: Vec<u64>,
    /// Number of ticks each simulation ran.
    pub ticks: u64,
    /// Number of simulations run.
    pub num_sims: usize,
}

impl ParallelSimResult {
    /// Check if all simulations produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all simulations matched.
    ///
    /// # Panics
    ///
    /// Panics if simulations produced different hashes.
    pub fn assert_deterministic(&self) {
        assert!(
            self.is_deterministic(),
            "Parallel battles diverged after {} ticks across {} simulations: {:?}",
            self.ticks,
            self.num_sims,
            self.hashes
        );
    }
}

/// Run a state machine multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run
/// * `ticks` - Number of steps per run
/// * `setup` - Creates the initial state
/// * `step` - Advances the state by one step
/// * `hash` - Computes the state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();
        for _ in 0..ticks {
            step(&mut state);
        }
        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run a battle twice at a constant `dt` and compare the final hashes.
pub fn verify_simulation_determinism<F>(setup_fn: F, num_ticks: u64, dt: Fixed) -> bool
where
    F: Fn() -> Simulation,
{
    verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |sim| {
            sim.tick(dt);
        },
        Simulation::state_hash,
    )
    .is_deterministic
}

/// Run N battles on scoped threads and collect their final hashes.
///
/// Each thread builds its own simulation with `setup_fn`.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_simulations_scoped<F>(
    setup_fn: F,
    num_sims: usize,
    num_ticks: u64,
    dt: Fixed,
) -> ParallelSimResult
where
    F: Fn() -> Simulation + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..num_ticks {
                        sim.tick(dt);
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    ParallelSimResult {
        hashes,
        ticks: num_ticks,
        num_sims,
    }
}

/// Compare two runs tick by tick.
///
/// Returns `None` if they never differ, `Some(tick)` for the first tick
/// after which the hashes differ (0 = before the first tick).
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64, dt: Fixed) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        sim1.tick(dt);
        sim2.tick(dt);
        if sim1.state_hash() != sim2.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Verify that a snapshot round trip mid-battle preserves the state hash
/// and that both copies stay in lockstep for `after_ticks` more ticks.
pub fn verify_snapshot_determinism<F>(
    setup_fn: F,
    before_ticks: u64,
    after_ticks: u64,
    dt: Fixed,
) -> bool
where
    F: Fn() -> Simulation,
{
    let mut sim = setup_fn();
    for _ in 0..before_ticks {
        sim.tick(dt);
    }

    let Ok(bytes) = sim.snapshot() else {
        return false;
    };
    let Ok(mut restored) = Simulation::from_snapshot(&bytes) else {
        return false;
    };
    if restored.state_hash() != sim.state_hash() {
        return false;
    }

    (0..after_ticks).all(|_| {
        sim.tick(dt);
        restored.tick(dt);
        sim.state_hash() == restored.state_hash()
    })
}

/// Proptest strategies for battle inputs.
pub mod strategies {
    use proptest::prelude::*;
    use td_core::math::{Fixed, Vec2Fixed};

    /// A tick length between 0 and 1 second in twentieths.
    pub fn arb_dt() -> impl Strategy<Value = Fixed> {
        (0i32..=20).prop_map(|n| Fixed::from_num(n) / Fixed::from_num(20))
    }

    /// A sequence of tick lengths.
    pub fn arb_dt_sequence(max_len: usize) -> impl Strategy<Value = Vec<Fixed>> {
        prop::collection::vec(arb_dt(), 1..max_len)
    }

    /// A positive stat value.
    pub fn arb_stat() -> impl Strategy<Value = Fixed> {
        (1i32..500).prop_map(Fixed::from_num)
    }

    /// An attack value, possibly below the target's defense.
    pub fn arb_attack() -> impl Strategy<Value = Fixed> {
        (0i32..300).prop_map(Fixed::from_num)
    }

    /// Spawn delays in seconds.
    pub fn arb_spawn_delays(max_len: usize) -> impl Strategy<Value = Vec<u32>> {
        prop::collection::vec(0u32..4, 1..max_len)
    }

    /// A player deployment: class from the fixture table and a position
    /// near the fixture lane.
    pub fn arb_deployment() -> impl Strategy<Value = (&'static str, Vec2Fixed)> {
        (
            prop::sample::select(vec!["knight", "archer", "medic", "lancer"]),
            0i32..100,
            -20i32..20,
        )
            .prop_map(|(class, x, y)| (class, Vec2Fixed::from_ints(x, y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{defended_battle, fixed, simulation, wave_level};

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 10, || 0u64, |n| *n += 1, |n| *n);
        result.assert_deterministic();
        assert_eq!(result.unique_hashes(), vec![10]);
    }

    #[test]
    fn test_defended_battle_is_deterministic() {
        assert!(verify_simulation_determinism(defended_battle, 400, fixed(1) / fixed(4)));
        assert_eq!(find_first_divergence(defended_battle, 200, fixed(1) / fixed(4)), None);
    }

    #[test]
    fn test_snapshot_mid_battle() {
        assert!(verify_snapshot_determinism(
            defended_battle,
            40,
            200,
            fixed(1) / fixed(4)
        ));
    }

    #[test]
    fn test_parallel_battles_match() {
        let result = run_parallel_simulations_scoped(
            || simulation(wave_level(50, "goblin", 4, 1)),
            4,
            100,
            fixed(1) / fixed(2),
        );
        result.assert_deterministic();
        assert_eq!(result.hashes.len(), 4);
    }
}
