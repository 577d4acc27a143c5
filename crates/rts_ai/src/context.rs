//! Per-invocation decision context.
//!
//! An [`AiContext`] bundles everything one faction's evaluation reads: the
//! snapshot, the spatial index, static rules, tunables, and a
//! [`FactionView`] with the faction's own and enemy entities pre-sorted
//! into the lists every component needs. It also owns the invocation's
//! seeded RNG, so evaluation order and thread placement never influence
//! results.

use std::collections::BTreeSet;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::{AiConfig, DifficultyProfile};
use crate::factions::FactionId;
use crate::math::{centroid, Vec2Fixed};
use crate::rules::{BuildingRole, RulesTable};
use crate::spatial::SpatialQuery;
use crate::world::{Entity, EntityId, FactionEconomy, WorldSnapshot};

/// Derive the RNG seed for one faction on one tick.
///
/// SplitMix64 over the base seed, faction and tick.
#[must_use]
pub fn invocation_seed(base_seed: u64, faction: FactionId, tick: u64) -> u64 {
    let mut z = base_seed
        ^ (u64::from(faction.index())).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ tick.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// One faction's entities and the enemies it can see, split by purpose.
#[derive(Debug, Clone, Default)]
pub struct FactionView<'a> {
    /// Own live buildings.
    pub own_buildings: Vec<&'a Entity>,
    /// Own live units.
    pub own_units: Vec<&'a Entity>,
    /// Own combat-capable units.
    pub combat_units: Vec<&'a Entity>,
    /// Own resource gatherers.
    pub harvesters: Vec<&'a Entity>,
    /// Enemy live units.
    pub enemy_units: Vec<&'a Entity>,
    /// Enemy live buildings.
    pub enemy_buildings: Vec<&'a Entity>,
    /// Keys of own completed buildings.
    pub built_keys: BTreeSet<String>,
    /// Main building position, else the centroid of own buildings.
    pub base_center: Option<Vec2Fixed>,
}

impl<'a> FactionView<'a> {
    /// Partition the snapshot from `faction`'s point of view.
    #[must_use]
    pub fn build(snapshot: &'a WorldSnapshot, rules: &RulesTable, faction: FactionId) -> Self {
        let mut view = Self::default();
        for entity in snapshot.live_entities() {
            if entity.is_owned_by(faction) {
                if entity.is_building() {
                    if entity.is_complete() {
                        view.built_keys.insert(entity.key.clone());
                    }
                    view.own_buildings.push(entity);
                } else if entity.is_unit() {
                    if rules.is_combat_unit(&entity.key) {
                        view.combat_units.push(entity);
                    }
                    if rules.is_harvester(&entity.key) {
                        view.harvesters.push(entity);
                    }
                    view.own_units.push(entity);
                }
            } else if entity.is_enemy_of(faction) {
                if entity.is_building() {
                    view.enemy_buildings.push(entity);
                } else if entity.is_unit() {
                    view.enemy_units.push(entity);
                }
            }
        }

        view.base_center = view
            .own_buildings
            .iter()
            .find(|b| rules.building_role(&b.key) == Some(BuildingRole::Main))
            .map(|b| b.position)
            .or_else(|| centroid(view.own_buildings.iter().map(|b| b.position)));
        view
    }

    /// No buildings and no units left.
    #[must_use]
    pub fn is_eliminated(&self) -> bool {
        self.own_buildings.is_empty() && self.own_units.is_empty()
    }

    /// Whether any enemy entity is visible.
    #[must_use]
    pub fn enemies_exist(&self) -> bool {
        !self.enemy_units.is_empty() || !self.enemy_buildings.is_empty()
    }
}

/// Everything one faction's evaluation reads, plus its RNG.
pub struct AiContext<'a> {
    /// World snapshot for this tick.
    pub snapshot: &'a WorldSnapshot,
    /// Spatial index over the snapshot.
    pub spatial: &'a dyn SpatialQuery,
    /// Static rules.
    pub rules: &'a RulesTable,
    /// Tunables.
    pub config: &'a AiConfig,
    /// Faction being evaluated.
    pub faction: FactionId,
    /// The faction's economy.
    pub economy: &'a FactionEconomy,
    /// Capabilities of the faction's difficulty tier.
    pub profile: DifficultyProfile,
    /// Pre-sorted entity lists.
    pub view: FactionView<'a>,
    /// Seeded RNG for this invocation only.
    pub rng: ChaCha8Rng,
}

impl<'a> AiContext<'a> {
    /// Build the context, or `None` if the faction has no economic state.
    #[must_use]
    pub fn new(
        snapshot: &'a WorldSnapshot,
        spatial: &'a dyn SpatialQuery,
        rules: &'a RulesTable,
        config: &'a AiConfig,
        faction: FactionId,
        seed: u64,
    ) -> Option<Self> {
        let economy = snapshot.economy(faction)?;
        Some(Self {
            snapshot,
            spatial,
            rules,
            config,
            faction,
            economy,
            profile: *config.profile(economy.difficulty),
            view: FactionView::build(snapshot, rules, faction),
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    /// Current tick.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.snapshot.tick
    }

    /// Role of a building entity.
    #[must_use]
    pub fn role_of(&self, entity: &Entity) -> Option<BuildingRole> {
        self.rules.building_role(&entity.key)
    }

    /// Own buildings with the given role.
    pub fn own_buildings_with_role(&self, role: BuildingRole) -> impl Iterator<Item = &'a Entity> + '_ {
        self.view
            .own_buildings
            .iter()
            .copied()
            .filter(move |b| self.rules.building_role(&b.key) == Some(role))
    }

    /// Own completed depots (refineries).
    pub fn depots(&self) -> impl Iterator<Item = &'a Entity> + '_ {
        self.own_buildings_with_role(BuildingRole::Refinery)
            .filter(|b| b.is_complete())
    }

    /// Whether an entity is a live enemy unit that can hurt workers.
    #[must_use]
    pub fn is_hostile_unit(&self, id: EntityId) -> bool {
        self.snapshot.get_alive(id).is_some_and(|e| {
            e.is_unit() && e.is_enemy_of(self.faction) && !self.rules.is_harvester(&e.key)
        })
    }

    /// Whether an entity is a live enemy of any kind.
    #[must_use]
    pub fn is_live_enemy(&self, id: EntityId) -> bool {
        self.snapshot
            .get_alive(id)
            .is_some_and(|e| e.is_enemy_of(self.faction))
    }

    /// Cargo capacity of a worker entity.
    #[must_use]
    pub fn cargo_capacity(&self, worker: &Entity) -> i32 {
        self.rules.unit(&worker.key).map_or(0, |u| u.cargo_capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Difficulty;
    use crate::spatial::SpatialGrid;
    use crate::world::MapBounds;

    fn pos(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_units(x, y)
    }

    fn snapshot() -> WorldSnapshot {
        let me = FactionId(1);
        let mut snap = WorldSnapshot::new(10, MapBounds::default());
        snap.factions.insert(me, FactionEconomy::new(1000, Difficulty::Hard));
        snap.insert(Entity::new_building(1, me, "power", pos(0, 0), 500, 0));
        snap.insert(Entity::new_building(2, me, "conyard", pos(100, 100), 500, 0));
        snap.insert(Entity::new_unit(3, me, "rifle", pos(50, 50), 50));
        snap.insert(Entity::new_unit(4, me, "harvester", pos(60, 50), 50));
        snap.insert(Entity::new_unit(5, FactionId(2), "rifle", pos(900, 900), 50));
        snap
    }

    #[test]
    fn test_view_partitions_entities() {
        let snap = snapshot();
        let rules = RulesTable::standard();
        let view = FactionView::build(&snap, &rules, FactionId(1));
        assert_eq!(view.own_buildings.len(), 2);
        assert_eq!(view.combat_units.len(), 1);
        assert_eq!(view.harvesters.len(), 1);
        assert_eq!(view.enemy_units.len(), 1);
        assert!(view.built_keys.contains("conyard"));
        assert!(view.enemies_exist());
    }

    #[test]
    fn test_base_center_prefers_main_building() {
        let snap = snapshot();
        let rules = RulesTable::standard();
        let view = FactionView::build(&snap, &rules, FactionId(1));
        assert_eq!(view.base_center, Some(pos(100, 100)));
    }

    #[test]
    fn test_context_requires_economy() {
        let snap = snapshot();
        let rules = RulesTable::standard();
        let config = AiConfig::default();
        let grid = SpatialGrid::from_snapshot(&snap);
        assert!(AiContext::new(&snap, &grid, &rules, &config, FactionId(1), 1).is_some());
        assert!(AiContext::new(&snap, &grid, &rules, &config, FactionId(9), 1).is_none());
    }

    #[test]
    fn test_invocation_seed_varies() {
        let a = invocation_seed(7, FactionId(1), 100);
        assert_eq!(a, invocation_seed(7, FactionId(1), 100));
        assert_ne!(a, invocation_seed(7, FactionId(2), 100));
        assert_ne!(a, invocation_seed(7, FactionId(1), 101));
    }
}
