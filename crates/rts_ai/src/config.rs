//! Tunable AI configuration.
//!
//! Every threshold the decision engine uses lives here. Distances are whole
//! world units, durations are ticks and percentages are plain integers, so a
//! RON file stays readable and the engine converts to fixed-point at use.
//!
//! Difficulty tiers are expressed as [`DifficultyProfile`] capability records
//! rather than conditionals scattered across components; each component asks
//! the profile whether a behavior is enabled and how far it may go.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AiError, Result};

/// AI skill tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum Difficulty {
    /// Predictable sparring partner.
    Beginner,
    /// Simple economy, limited recovery.
    Easy,
    /// Coordinated fleet, most recovery tactics.
    #[default]
    Medium,
    /// Everything enabled.
    Hard,
}

impl Difficulty {
    /// All tiers from lowest to highest.
    pub const ALL: [Self; 4] = [Self::Beginner, Self::Easy, Self::Medium, Self::Hard];

    /// Lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Difficulty {
    type Err = AiError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| AiError::UnknownDifficulty(s.to_string()))
    }
}

/// Percent weights of the five desperation factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesperationWeights {
    /// Weight of the low-credits factor.
    pub credits: u8,
    /// Weight of the income-shortfall factor.
    pub income: u8,
    /// Weight of the worker-to-depot factor.
    pub worker_ratio: u8,
    /// Weight of the early-game factor.
    pub game_phase: u8,
    /// Weight of the relative-standing factor.
    pub standing: u8,
}

impl DesperationWeights {
    /// Sum of all weights.
    #[must_use]
    pub fn total(&self) -> u32 {
        u32::from(self.credits)
            + u32::from(self.income)
            + u32::from(self.worker_ratio)
            + u32::from(self.game_phase)
            + u32::from(self.standing)
    }
}

/// How a tier computes its desperation score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DesperationModel {
    /// Constant score.
    Fixed(u8),
    /// Credits and worker ratio only, with percent weights.
    TwoFactor {
        /// Weight of the credits factor.
        credits: u8,
        /// Weight of the worker-ratio factor.
        worker_ratio: u8,
    },
    /// All five factors.
    Weighted(DesperationWeights),
}

/// Capabilities granted to one difficulty tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyProfile {
    /// Whether the worker fleet coordinator runs at all.
    pub fleet_coordination: bool,
    /// Highest stuck-recovery level the tier may reach (1-5).
    pub max_stuck_level: u8,
    /// Desperation scoring model.
    pub desperation: DesperationModel,
    /// Workers a refinery may queue before extras are redirected.
    pub refinery_queue_capacity: usize,
    /// Whether combat target scoring counts allied focus.
    pub focus_fire: bool,
    /// Whether groups refuse to chase beyond the leash distance.
    pub leash: bool,
}

/// Profiles for every tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifficultyProfiles {
    /// Beginner tier.
    pub beginner: DifficultyProfile,
    /// Easy tier.
    pub easy: DifficultyProfile,
    /// Medium tier.
    pub medium: DifficultyProfile,
    /// Hard tier.
    pub hard: DifficultyProfile,
}

impl Default for DifficultyProfiles {
    fn default() -> Self {
        Self {
            beginner: DifficultyProfile {
                fleet_coordination: false,
                max_stuck_level: 1,
                desperation: DesperationModel::Fixed(50),
                refinery_queue_capacity: 4,
                focus_fire: false,
                leash: false,
            },
            easy: DifficultyProfile {
                fleet_coordination: false,
                max_stuck_level: 2,
                desperation: DesperationModel::TwoFactor {
                    credits: 60,
                    worker_ratio: 40,
                },
                refinery_queue_capacity: 4,
                focus_fire: false,
                leash: false,
            },
            medium: DifficultyProfile {
                fleet_coordination: true,
                max_stuck_level: 4,
                desperation: DesperationModel::Weighted(DesperationWeights {
                    credits: 35,
                    income: 15,
                    worker_ratio: 25,
                    game_phase: 10,
                    standing: 15,
                }),
                refinery_queue_capacity: 3,
                focus_fire: true,
                leash: true,
            },
            hard: DifficultyProfile {
                fleet_coordination: true,
                max_stuck_level: 5,
                desperation: DesperationModel::Weighted(DesperationWeights {
                    credits: 30,
                    income: 20,
                    worker_ratio: 20,
                    game_phase: 10,
                    standing: 20,
                }),
                refinery_queue_capacity: 2,
                focus_fire: true,
                leash: true,
            },
        }
    }
}

impl DifficultyProfiles {
    /// Profile for a tier.
    #[must_use]
    pub const fn get(&self, difficulty: Difficulty) -> &DifficultyProfile {
        match difficulty {
            Difficulty::Beginner => &self.beginner,
            Difficulty::Easy => &self.easy,
            Difficulty::Medium => &self.medium,
            Difficulty::Hard => &self.hard,
        }
    }
}

/// Strategy state machine tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Minimum ticks between non-defend transitions.
    pub cooldown_ticks: u64,
    /// Combat units required to switch to attack.
    pub attack_unit_threshold: usize,
    /// Combat units required to switch to harass.
    pub harass_unit_threshold: usize,
    /// Maximum harass group size.
    pub harass_group_cap: usize,
    /// Desperation score at or above which all-in is considered.
    pub all_in_score: u8,
    /// Ticks the score must stay high without combat before all-in.
    pub all_in_sustain_ticks: u64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            cooldown_ticks: 300,
            attack_unit_threshold: 6,
            harass_unit_threshold: 3,
            harass_group_cap: 4,
            all_in_score: 80,
            all_in_sustain_ticks: 1200,
        }
    }
}

/// Threat detection and defense tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreatConfig {
    /// Radius around the base center that counts as "near base".
    pub base_radius: i32,
    /// Radius around any owned building that counts as "near base".
    pub building_radius: i32,
    /// Enemy proximity that flags a harvester as under attack.
    pub harvester_proximity: i32,
    /// Threat count that triggers a full army recall.
    pub heavy_attack_threats: usize,
    /// Units within this distance of the base are always pulled into defense.
    pub defense_pull_radius: i32,
}

impl Default for ThreatConfig {
    fn default() -> Self {
        Self {
            base_radius: 600,
            building_radius: 300,
            harvester_proximity: 250,
            heavy_attack_threats: 5,
            defense_pull_radius: 900,
        }
    }
}

/// Risk profile attached to a desperation band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskBand {
    /// Highest score (inclusive) belonging to this band.
    pub max_score: u8,
    /// Maximum local danger a worker will accept.
    pub max_danger: i32,
    /// Flee-trigger distance multiplier, in percent.
    pub flee_multiplier_pct: i32,
}

/// Desperation scorer tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesperationConfig {
    /// Credits at or above which the credits factor is zero.
    pub wealth_threshold: i32,
    /// Workers per depot (in percent) considered healthy.
    pub healthy_worker_ratio_pct: i32,
    /// Length of the early game in ticks.
    pub early_game_ticks: u64,
    /// Factor value applied during the early game.
    pub early_game_bonus: i32,
    /// Score bands: very cautious, balanced, aggressive, desperate.
    pub bands: [RiskBand; 4],
}

impl Default for DesperationConfig {
    fn default() -> Self {
        Self {
            wealth_threshold: 3000,
            healthy_worker_ratio_pct: 200,
            early_game_ticks: 6000,
            early_game_bonus: 100,
            bands: [
                RiskBand {
                    max_score: 24,
                    max_danger: 30,
                    flee_multiplier_pct: 150,
                },
                RiskBand {
                    max_score: 49,
                    max_danger: 50,
                    flee_multiplier_pct: 100,
                },
                RiskBand {
                    max_score: 74,
                    max_danger: 70,
                    flee_multiplier_pct: 75,
                },
                RiskBand {
                    max_score: 100,
                    max_danger: 90,
                    flee_multiplier_pct: 50,
                },
            ],
        }
    }
}

/// Economic planner tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    /// Buildings in priority order; repeated keys mean "build another".
    pub build_order: Vec<String>,
    /// Credits above which unit production is considered.
    pub unit_production_threshold: i32,
    /// Credits at which economic buildings are still built during attacks.
    pub abundant_wealth: i32,
    /// Target harvesters per refinery.
    pub harvesters_per_refinery: usize,
    /// Infantry keys in preference order.
    pub infantry_options: Vec<String>,
    /// Combat vehicle keys in preference order.
    pub vehicle_options: Vec<String>,
    /// Ticks between enemy intelligence refreshes.
    pub intel_interval: u64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        let keys = |list: &[&str]| list.iter().map(|s| (*s).to_string()).collect();
        Self {
            build_order: keys(&[
                "power", "refinery", "barracks", "power", "factory", "refinery", "tech",
                "turret", "turret",
            ]),
            unit_production_threshold: 400,
            abundant_wealth: 4000,
            harvesters_per_refinery: 2,
            infantry_options: keys(&["rifle", "rocket"]),
            vehicle_options: keys(&["light_tank", "heavy_tank", "jeep"]),
            intel_interval: 120,
        }
    }
}

/// Combat coordinator tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Attack group size required before it issues orders.
    pub min_attack_group: usize,
    /// Harass group size required before it issues orders.
    pub min_harass_group: usize,
    /// Building keys from most to least valuable target.
    pub building_priority: Vec<String>,
    /// Base score of any building target.
    pub building_base_score: i32,
    /// Extra score per rank above the bottom of the priority list.
    pub building_rank_step: i32,
    /// Base score of a unit target.
    pub unit_base_score: i32,
    /// Extra score for enemy harvesters while harassing.
    pub harass_harvester_bonus: i32,
    /// Score for a fully wounded target, scaled by missing health.
    pub wounded_bonus: i32,
    /// Score lost per 100 world units from the group centroid.
    pub distance_penalty_per_100: i32,
    /// Score per allied unit already attacking the target.
    pub focus_bonus: i32,
    /// Score margin that makes a unit abandon its current target.
    pub retarget_margin: i32,
    /// Maximum pursuit distance from the group centroid.
    pub leash_distance: i32,
    /// Idle members further than this from the centroid regroup with attack-move.
    pub straggler_distance: i32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            min_attack_group: 4,
            min_harass_group: 2,
            building_priority: [
                "conyard", "factory", "barracks", "refinery", "power", "tech", "turret",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
            building_base_score: 100,
            building_rank_step: 20,
            unit_base_score: 50,
            harass_harvester_bonus: 80,
            wounded_bonus: 60,
            distance_penalty_per_100: 10,
            focus_bonus: 25,
            retarget_margin: 40,
            leash_distance: 900,
            straggler_distance: 400,
        }
    }
}

/// Worker safety and fleet tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvesterConfig {
    /// Base distance at which a threat makes a worker consider fleeing.
    pub flee_trigger_distance: i32,
    /// Threats closer than this always cause a flee.
    pub min_safe_distance: i32,
    /// Damage within this many ticks counts as a direct attack.
    pub recent_damage_ticks: u64,
    /// Radius in which a damaged ally signals danger.
    pub damaged_ally_radius: i32,
    /// Credits below which economic pressure applies.
    pub pressure_credits: i32,
    /// Cargo above which economic pressure applies.
    pub pressure_cargo: i32,
    /// Offset from the base center for flee destinations.
    pub flee_distance: i32,
    /// Minimum distance between a threat and an alternate safe depot.
    pub safe_depot_distance: i32,
    /// Ticks between fleet coordinator passes.
    pub fleet_interval: u64,
    /// Workers allowed per resource node.
    pub ore_capacity: usize,
    /// Health percent below which a worker plays safe.
    pub safe_health_pct: u32,
    /// Cargo percent below which a desperate worker takes risks.
    pub risk_cargo_pct: i32,
    /// Desperation at which low-cargo workers become risk takers.
    pub risk_desperation: u8,
    /// Desperation at which workers become opportunists.
    pub opportunist_desperation: u8,
    /// Side length of a danger map cell.
    pub danger_cell_size: i32,
    /// Danger added per enemy combat unit in a cell.
    pub danger_enemy_presence: i32,
    /// Danger added per worker under attack in a cell.
    pub danger_attack: i32,
    /// Danger added per remembered worker death in a cell.
    pub danger_death: i32,
    /// Danger points lost per 100 ticks.
    pub danger_decay_per_100: i32,
    /// Ticks a danger cell survives without reinforcement.
    pub danger_memory_ticks: u64,
    /// Ticks a worker death is remembered.
    pub death_memory_ticks: u64,
    /// Extra path cost per point of danger when picking a node.
    pub danger_distance_weight: i32,
    /// Radius around a depot considered "at the depot".
    pub dock_radius: i32,
    /// Idle ticks at a depot before the worker counts as stuck there.
    pub depot_idle_ticks: u64,
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            flee_trigger_distance: 300,
            min_safe_distance: 100,
            recent_damage_ticks: 60,
            damaged_ally_radius: 150,
            pressure_credits: 600,
            pressure_cargo: 200,
            flee_distance: 250,
            safe_depot_distance: 500,
            fleet_interval: 30,
            ore_capacity: 2,
            safe_health_pct: 40,
            risk_cargo_pct: 30,
            risk_desperation: 70,
            opportunist_desperation: 40,
            danger_cell_size: 200,
            danger_enemy_presence: 15,
            danger_attack: 25,
            danger_death: 40,
            danger_decay_per_100: 10,
            danger_memory_ticks: 900,
            death_memory_ticks: 1800,
            danger_distance_weight: 5,
            dock_radius: 150,
            depot_idle_ticks: 60,
        }
    }
}

/// Stuck resolution tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StuckConfig {
    /// Movement-layer no-progress ticks that count as stuck.
    pub stuck_tick_threshold: u32,
    /// Speed (thousandths of a unit per tick) below which a worker is stationary.
    pub velocity_epsilon_milli: i32,
    /// Distance from a node at which a worker is harvesting, not stuck.
    pub harvest_range: i32,
    /// Stuck duration (ticks) that unlocks each level 1-5.
    pub level_thresholds: [u64; 5],
    /// Minimum ticks between two recoveries at the same level.
    pub recovery_cooldown: u64,
    /// Sideways nudge distance.
    pub nudge_distance: i32,
    /// Search radius for an alternate node at level 2.
    pub detour_radius: i32,
    /// Base blacklist duration.
    pub blacklist_ticks: u64,
}

impl Default for StuckConfig {
    fn default() -> Self {
        Self {
            stuck_tick_threshold: 30,
            velocity_epsilon_milli: 100,
            harvest_range: 60,
            level_thresholds: [20, 60, 120, 200, 320],
            recovery_cooldown: 20,
            nudge_distance: 40,
            detour_radius: 500,
            blacklist_ticks: 600,
        }
    }
}

/// Building placement tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Side length of a footprint tile.
    pub tile_size: i32,
    /// Radius of the first sampling ring.
    pub min_radius: i32,
    /// Radius growth per ring.
    pub radius_step: i32,
    /// Samples per ring.
    pub samples_per_ring: usize,
    /// Total sample budget.
    pub max_samples: usize,
    /// Empty margin kept around every footprint.
    pub building_gap: i32,
    /// Depth of the reserved docking lane below each refinery.
    pub dock_zone_depth: i32,
    /// Clearance kept from resource nodes.
    pub resource_clearance: i32,
    /// Maximum distance from a build-area structure.
    pub build_range: i32,
    /// Radius around a node within which a refinery counts as claiming it.
    pub refinery_claim_radius: i32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            tile_size: 32,
            min_radius: 120,
            radius_step: 48,
            samples_per_ring: 8,
            max_samples: 64,
            building_gap: 16,
            dock_zone_depth: 96,
            resource_clearance: 48,
            build_range: 600,
            refinery_claim_radius: 400,
        }
    }
}

/// Emergency sell tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SellConfig {
    /// Credits below which an emergency sale is considered.
    pub critical_credits: i32,
    /// Ticks after placement during which a building cannot be sold.
    pub grace_ticks: u64,
    /// Minimum ticks between sales.
    pub cooldown_ticks: u64,
    /// A refinery with no node this close is redundant.
    pub redundant_refinery_radius: i32,
}

impl Default for SellConfig {
    fn default() -> Self {
        Self {
            critical_credits: 200,
            grace_ticks: 1200,
            cooldown_ticks: 600,
            redundant_refinery_radius: 800,
        }
    }
}

/// Complete AI configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Per-tier capabilities.
    pub difficulty: DifficultyProfiles,
    /// Strategy state machine.
    pub strategy: StrategyConfig,
    /// Threat detection and defense.
    pub threat: ThreatConfig,
    /// Desperation scoring.
    pub desperation: DesperationConfig,
    /// Economic planner.
    pub economy: EconomyConfig,
    /// Combat coordinator.
    pub combat: CombatConfig,
    /// Worker safety and fleet.
    pub harvester: HarvesterConfig,
    /// Stuck resolution.
    pub stuck: StuckConfig,
    /// Building placement.
    pub placement: PlacementConfig,
    /// Emergency sell.
    pub sell: SellConfig,
}

impl AiConfig {
    /// Load a configuration from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AiError::ConfigNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self = ron::from_str(&contents).map_err(|e| AiError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        let config: Self = ron::from_str(ron).map_err(|e| AiError::Parse {
            path: "<string>".to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Profile for a tier.
    #[must_use]
    pub const fn profile(&self, difficulty: Difficulty) -> &DifficultyProfile {
        self.difficulty.get(difficulty)
    }

    /// Reject configurations whose values contradict each other.
    pub fn validate(&self) -> Result<()> {
        let bands = &self.desperation.bands;
        if bands.windows(2).any(|w| w[0].max_score >= w[1].max_score) {
            return Err(AiError::InvalidConfig(
                "desperation bands must have strictly increasing max_score".to_string(),
            ));
        }
        if bands[3].max_score < 100 {
            return Err(AiError::InvalidConfig(
                "last desperation band must reach 100".to_string(),
            ));
        }
        if self.stuck.level_thresholds.windows(2).any(|w| w[0] > w[1]) {
            return Err(AiError::InvalidConfig(
                "stuck level thresholds must be non-decreasing".to_string(),
            ));
        }
        for d in Difficulty::ALL {
            let level = self.profile(d).max_stuck_level;
            if !(1..=5).contains(&level) {
                return Err(AiError::InvalidConfig(format!(
                    "{d}: max_stuck_level {level} outside 1..=5"
                )));
            }
        }
        if self.placement.tile_size <= 0 || self.harvester.danger_cell_size <= 0 {
            return Err(AiError::InvalidConfig(
                "tile and danger cell sizes must be positive".to_string(),
            ));
        }
        if self.harvester.ore_capacity == 0 {
            return Err(AiError::InvalidConfig(
                "ore_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        AiConfig::default().validate().unwrap();
    }

    #[test]
    fn test_difficulty_from_str() {
        assert_eq!("Hard".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert_eq!("easy".parse::<Difficulty>().unwrap(), Difficulty::Easy);
        assert!(matches!(
            "nightmare".parse::<Difficulty>(),
            Err(AiError::UnknownDifficulty(_))
        ));
    }

    #[test]
    fn test_lowest_tiers_disable_fleet() {
        let config = AiConfig::default();
        assert!(!config.profile(Difficulty::Beginner).fleet_coordination);
        assert!(!config.profile(Difficulty::Easy).fleet_coordination);
        assert!(config.profile(Difficulty::Hard).fleet_coordination);
    }

    #[test]
    fn test_stuck_caps_increase_with_tier() {
        let config = AiConfig::default();
        let caps: Vec<u8> = Difficulty::ALL
            .iter()
            .map(|d| config.profile(*d).max_stuck_level)
            .collect();
        assert!(caps.windows(2).all(|w| w[0] <= w[1]));
        assert!(config.profile(Difficulty::Easy).max_stuck_level <= 2);
        assert!(config.profile(Difficulty::Medium).max_stuck_level < 5);
    }

    #[test]
    fn test_weighted_models_sum_to_100() {
        let config = AiConfig::default();
        for d in [Difficulty::Medium, Difficulty::Hard] {
            match config.profile(d).desperation {
                DesperationModel::Weighted(w) => assert_eq!(w.total(), 100),
                other => panic!("unexpected model {other:?}"),
            }
        }
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config = AiConfig::from_ron_str("(strategy: (cooldown_ticks: 50))").unwrap();
        assert_eq!(config.strategy.cooldown_ticks, 50);
        assert_eq!(config.strategy.attack_unit_threshold, 6);
        assert_eq!(config.combat, CombatConfig::default());
    }

    #[test]
    fn test_validate_rejects_unordered_bands() {
        let mut config = AiConfig::default();
        config.desperation.bands[1].max_score = 10;
        assert!(matches!(config.validate(), Err(AiError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_bad_stuck_cap() {
        let mut config = AiConfig::default();
        config.difficulty.hard.max_stuck_level = 7;
        assert!(config.validate().is_err());
    }
}
