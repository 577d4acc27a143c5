//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the AI produces identical commands
//! and identical private state given identical inputs.
//!
//! # Testing Strategy
//!
//! The AI runs inside a lockstep simulation, so every client must reach the
//! same decisions. Sources of non-determinism include:
//!
//! - **Floating-point math**: Different CPUs can produce different results.
//!   We use fixed-point arithmetic via [`rts_ai::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Snapshots and AI state use ordered maps only.
//!
//! - **System randomness**: Placement sampling draws from a ChaCha stream
//!   seeded from (base seed, faction, tick).
//!
//! - **Evaluation order**: Factions must not influence each other, so running
//!   them in parallel has to match running them one after another.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual component determinism (placement, combat, etc.)
//! 2. **Property tests**: Random worlds must still produce deterministic outputs
//! 3. **Integration tests**: Multi-tick scenarios are reproducible
//! 4. **Parallel tests**: Per-faction threads match the sequential director

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::thread;

use rts_ai::command::AiCommand;
use rts_ai::config::AiConfig;
use rts_ai::engine::{compute_ai_actions, AiDirector};
use rts_ai::factions::FactionId;
use rts_ai::rules::RulesTable;
use rts_ai::spatial::SpatialGrid;
use rts_ai::state::AiState;
use rts_ai::world::WorldSnapshot;
use tracing::warn;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks run.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic AI).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the runs were deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "AI is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Result of comparing parallel per-faction evaluation to the sequential director.
#[derive(Debug, Clone)]
pub struct ParallelAiResult {
    /// Per-faction hash from the sequential director.
    pub sequential: BTreeMap<FactionId, u64>,
    /// Per-faction hash from one scoped thread per faction.
    pub parallel: BTreeMap<FactionId, u64>,
    /// Number of ticks each run covered.
    pub ticks: u64,
}

impl ParallelAiResult {
    /// Check if both evaluation orders agree.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.sequential == self.parallel
    }

    /// Assert both evaluation orders agree.
    ///
    /// # Panics
    ///
    /// Panics if any faction's hash differs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            panic!(
                "Parallel AI evaluation diverged!\n\
                 Ticks: {}\n\
                 Sequential: {:?}\n\
                 Parallel: {:?}",
                self.ticks, self.sequential, self.parallel
            );
        }
    }
}

/// Run a stepped computation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run
/// * `ticks` - Number of steps per run
/// * `setup` - Function to create initial state
/// * `step` - Function to advance by one tick
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```ignore
/// use rts_test_utils::determinism::verify_determinism;
///
/// let result = verify_determinism(
///     5,   // Run 5 times
///     100, // 100 ticks each
///     || AiRun::new(skirmish(0, Difficulty::Hard), 42),
///     |run| run.step(),
///     |run| run.hash(),
/// );
/// result.assert_deterministic();
/// ```
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

/// One faction's AI replayed over a static world.
///
/// Every step re-stamps the snapshot with the next tick and runs the faction,
/// folding the emitted commands into a running hash.
#[derive(Debug, Clone)]
pub struct AiRun {
    /// World the AI looks at; only `tick` changes between steps.
    pub snapshot: WorldSnapshot,
    /// Faction under test.
    pub faction: FactionId,
    /// Its private state.
    pub state: AiState,
    /// Base seed.
    pub seed: u64,
    /// Tunables.
    pub config: AiConfig,
    /// Every command emitted so far, in order.
    pub history: Vec<(u64, AiCommand)>,
}

impl AiRun {
    /// Fresh run for faction 1 with default tunables.
    #[must_use]
    pub fn new(snapshot: WorldSnapshot, seed: u64) -> Self {
        Self {
            snapshot,
            faction: FactionId::new(1),
            state: AiState::new(),
            seed,
            config: AiConfig::default(),
            history: Vec::new(),
        }
    }

    /// Run the current tick, then advance the snapshot by one.
    pub fn step(&mut self) {
        let grid = SpatialGrid::from_snapshot(&self.snapshot);
        let rules = RulesTable::standard();
        let tick = self.snapshot.tick;
        let commands = compute_ai_actions(
            &self.snapshot,
            &grid,
            &rules,
            &self.config,
            self.faction,
            &mut self.state,
            self.seed,
        );
        self.history.extend(commands.into_iter().map(|c| (tick, c)));
        self.snapshot.tick += 1;
    }

    /// Hash of the command history and the final state.
    #[must_use]
    pub fn hash(&self) -> u64 {
        compute_hash(&(&self.history, state_fingerprint(&self.state)))
    }
}

/// Stable textual fingerprint of an AI state.
///
/// Every collection in the state is ordered, so the debug rendering is
/// identical for identical states.
#[must_use]
pub fn state_fingerprint(state: &AiState) -> String {
    format!("{state:?}")
}

/// Replay one faction twice over `ticks` and report whether it matched.
#[must_use]
pub fn verify_ai_determinism<F>(setup_fn: F, seed: u64, ticks: u64) -> bool
where
    F: Fn() -> WorldSnapshot,
{
    verify_determinism(
        2,
        ticks,
        || AiRun::new(setup_fn(), seed),
        AiRun::step,
        AiRun::hash,
    )
    .is_deterministic
}

fn run_faction_alone(
    base: &WorldSnapshot,
    faction: FactionId,
    config: &AiConfig,
    rules: &RulesTable,
    seed: u64,
    ticks: u64,
) -> u64 {
    let mut snapshot = base.clone();
    let mut state = AiState::new();
    let mut history = Vec::new();
    for _ in 0..ticks {
        let grid = SpatialGrid::from_snapshot(&snapshot);
        let commands = compute_ai_actions(&snapshot, &grid, rules, config, faction, &mut state, seed);
        history.push((snapshot.tick, commands));
        snapshot.tick += 1;
    }
    compute_hash(&(&history, state_fingerprint(&state)))
}

/// Evaluate every AI faction on its own scoped thread and compare against
/// the sequential [`AiDirector`].
///
/// Uses scoped threads so the snapshot, config and rules can be borrowed.
#[must_use]
pub fn run_parallel_scoped(
    base: &WorldSnapshot,
    config: &AiConfig,
    rules: &RulesTable,
    seed: u64,
    ticks: u64,
) -> ParallelAiResult {
    let factions: Vec<FactionId> = base
        .factions
        .iter()
        .filter(|(_, eco)| eco.is_ai)
        .map(|(id, _)| *id)
        .collect();

    let parallel = thread::scope(|s| {
        let handles: Vec<_> = factions
            .iter()
            .map(|&faction| {
                (
                    faction,
                    s.spawn(move || run_faction_alone(base, faction, config, rules, seed, ticks)),
                )
            })
            .collect();

        handles
            .into_iter()
            .map(|(faction, h)| {
                let hash = h.join().unwrap_or_else(|e| std::panic::resume_unwind(e));
                (faction, hash)
            })
            .collect()
    });

    let mut director = AiDirector::new(config.clone(), rules.clone(), seed);
    let mut snapshot = base.clone();
    let mut histories: BTreeMap<FactionId, Vec<(u64, Vec<AiCommand>)>> = BTreeMap::new();
    for _ in 0..ticks {
        for (faction, commands) in director.run_tick(&snapshot) {
            histories.entry(faction).or_default().push((snapshot.tick, commands));
        }
        snapshot.tick += 1;
    }
    let sequential = histories
        .into_iter()
        .map(|(faction, history)| {
            let fingerprint = director.state(faction).map(state_fingerprint).unwrap_or_default();
            (faction, compute_hash(&(&history, fingerprint)))
        })
        .collect();

    ParallelAiResult {
        sequential,
        parallel,
        ticks,
    }
}

/// Compare two replays tick-by-tick, finding the first divergence.
///
/// Useful for debugging non-determinism by finding exactly when runs start
/// to differ.
///
/// # Returns
///
/// `None` if the runs agree, `Some(tick)` for the first tick whose commands
/// or resulting state differ.
pub fn find_first_divergence<F>(setup_fn: F, seed: u64, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> WorldSnapshot,
{
    let mut a = AiRun::new(setup_fn(), seed);
    let mut b = AiRun::new(setup_fn(), seed);

    for _ in 0..num_ticks {
        let tick = a.snapshot.tick;
        a.step();
        b.step();

        if a.history != b.history || a.state != b.state {
            warn!(tick, seed, "AI replays diverged");
            return Some(tick);
        }
    }

    None
}

/// Verify that a RON round-trip of the AI state preserves it exactly.
///
/// Hosts persist the state table between sessions, so a restored state must
/// make the same decisions.
pub fn verify_state_round_trip<F>(setup_fn: F, seed: u64, num_ticks: u64) -> bool
where
    F: Fn() -> WorldSnapshot,
{
    let mut run = AiRun::new(setup_fn(), seed);
    for _ in 0..num_ticks {
        run.step();
    }

    let Ok(text) = ron::to_string(&run.state) else {
        return false;
    };
    let Ok(restored) = ron::from_str::<AiState>(&text) else {
        return false;
    };
    if restored != run.state {
        warn!(seed, ticks = num_ticks, "AI state changed across RON round-trip");
        return false;
    }

    let mut resumed = run.clone();
    resumed.state = restored;
    run.step();
    resumed.step();
    run.history == resumed.history
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for AI testing.
///
/// These strategies generate random but reproducible worlds and inputs for
/// property-based testing.
pub mod strategies {
    use proptest::prelude::*;
    use rts_ai::config::Difficulty;
    use rts_ai::factions::FactionId;
    use rts_ai::math::{Fixed, Vec2Fixed};
    use rts_ai::state::Strategy as AiStrategy;
    use rts_ai::world::WorldSnapshot;

    use crate::fixtures::WorldBuilder;

    /// Generate a whole-unit coordinate on the default map.
    pub fn arb_coord() -> impl Strategy<Value = i32> {
        0i32..4096i32
    }

    /// Generate a fixed-point number in a reasonable range for positions.
    pub fn arb_fixed_position() -> impl Strategy<Value = Fixed> {
        arb_coord().prop_map(Fixed::from_num)
    }

    /// Generate a fixed-point 2D vector for positions.
    pub fn arb_vec2_position() -> impl Strategy<Value = Vec2Fixed> {
        (arb_fixed_position(), arb_fixed_position()).prop_map(|(x, y)| Vec2Fixed::new(x, y))
    }

    /// Generate a difficulty tier.
    pub fn arb_difficulty() -> impl Strategy<Value = Difficulty> {
        prop::sample::select(Difficulty::ALL.to_vec())
    }

    /// Generate a strategy.
    pub fn arb_strategy() -> impl Strategy<Value = AiStrategy> {
        prop_oneof![
            Just(AiStrategy::Buildup),
            Just(AiStrategy::Harass),
            Just(AiStrategy::Attack),
            Just(AiStrategy::Defend),
            Just(AiStrategy::AllIn),
        ]
    }

    /// Generate a tick.
    pub fn arb_tick() -> impl Strategy<Value = u64> {
        0u64..100_000u64
    }

    /// Generate credits, including broke and negative-after-refund cases.
    pub fn arb_credits() -> impl Strategy<Value = i32> {
        -100i32..20_000i32
    }

    /// Unit keys a random world draws from.
    pub const UNIT_KEYS: [&str; 5] = ["rifle", "rocket", "jeep", "light_tank", "harvester"];

    /// Building keys a random world draws from.
    pub const BUILDING_KEYS: [&str; 6] = ["power", "refinery", "barracks", "factory", "tech", "turret"];

    fn arb_placed(keys: &'static [&'static str]) -> impl Strategy<Value = (&'static str, i32, i32)> {
        (prop::sample::select(keys), arb_coord(), arb_coord())
    }

    /// Generate a two-faction world: faction 1 (AI under test) always has a
    /// conyard, everything else is random.
    pub fn arb_world() -> impl Strategy<Value = WorldSnapshot> {
        (
            arb_tick(),
            arb_credits(),
            arb_difficulty(),
            prop::collection::vec(arb_placed(&BUILDING_KEYS), 0..6),
            prop::collection::vec(arb_placed(&UNIT_KEYS), 0..12),
            prop::collection::vec(arb_placed(&UNIT_KEYS), 0..12),
            prop::collection::vec((arb_coord(), arb_coord()), 0..6),
        )
            .prop_map(|(tick, credits, difficulty, buildings, mine, theirs, nodes)| {
                let me = FactionId::new(1);
                let them = FactionId::new(2);
                let mut builder = WorldBuilder::new(tick)
                    .ai_faction(me, credits, difficulty)
                    .ai_faction(them, 1000, Difficulty::Medium)
                    .building(me, "conyard", 500, 500)
                    .building(them, "conyard", 3500, 3500);
                for (key, x, y) in buildings {
                    builder = builder.building(me, key, x, y);
                }
                for (key, x, y) in mine {
                    builder = builder.unit(me, key, x, y);
                }
                for (key, x, y) in theirs {
                    builder = builder.unit(them, key, x, y);
                }
                for (x, y) in nodes {
                    builder = builder.resource(x, y, 5000);
                }
                builder.build()
            })
    }
}
