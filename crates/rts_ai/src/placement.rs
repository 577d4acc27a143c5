//! Building placement for finished structures waiting to be put down.
//!
//! Candidate sites are sampled on rings of growing radius around an anchor,
//! each ring starting at a seeded random compass point. The first site that
//! passes validation wins; when the sample budget runs out the request is left
//! pending for a later tick. A faction with nothing to build around has the
//! request cancelled.

use rand::Rng;
use tracing::{debug, info};

use crate::command::AiCommand;
use crate::context::AiContext;
use crate::math::{centroid, compass_direction, units, Fixed, Vec2Fixed, COMPASS_POINTS};
use crate::rules::{BuildingRole, ProductionCategory};
use crate::world::{Entity, EntityId, MapBounds};

// ============================================================================
// Footprints
// ============================================================================

/// Axis-aligned world-space rectangle covered by a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footprint {
    /// Top-left corner.
    pub min: Vec2Fixed,
    /// Bottom-right corner.
    pub max: Vec2Fixed,
}

impl Footprint {
    /// Rectangle of `tiles` centred on `center`.
    #[must_use]
    pub fn around(center: Vec2Fixed, tiles: (u32, u32), tile_size: i32) -> Self {
        let half_w = Fixed::from_num(tiles.0) * units(tile_size) / units(2);
        let half_h = Fixed::from_num(tiles.1) * units(tile_size) / units(2);
        let half = Vec2Fixed::new(half_w, half_h);
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Grown by `margin` on every side.
    #[must_use]
    pub fn inflate(self, margin: Fixed) -> Self {
        let m = Vec2Fixed::new(margin, margin);
        Self {
            min: self.min - m,
            max: self.max + m,
        }
    }

    /// Extended downward by `depth`.
    #[must_use]
    pub fn extend_down(self, depth: Fixed) -> Self {
        Self {
            min: self.min,
            max: Vec2Fixed::new(self.max.x, self.max.y + depth),
        }
    }

    /// Whether the interiors of two rectangles intersect.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
    }

    /// Whether `point` lies inside (inclusive).
    #[must_use]
    pub fn contains(&self, point: Vec2Fixed) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    /// Whether the whole rectangle lies on the map.
    #[must_use]
    pub fn on_map(&self, map: &MapBounds) -> bool {
        map.contains(self.min) && map.contains(self.max)
    }
}

/// Footprint of `key` at `center`, including the docking lane of depots.
#[must_use]
pub fn footprint_of(ctx: &AiContext<'_>, key: &str, center: Vec2Fixed) -> Footprint {
    let cfg = &ctx.config.placement;
    let Some(rules) = ctx.rules.building(key) else {
        return Footprint::around(center, (1, 1), cfg.tile_size);
    };
    let base = Footprint::around(center, rules.footprint, cfg.tile_size);
    if rules.role == BuildingRole::Refinery {
        base.extend_down(units(cfg.dock_zone_depth))
    } else {
        base
    }
}

// ============================================================================
// Placement Validation
// ============================================================================

/// Result of validating one candidate site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementResult {
    /// Site is usable.
    Valid,
    /// Part of the footprint leaves the map.
    OutOfBounds,
    /// Too far from every building that provides build area.
    OutOfRange,
    /// Overlaps an existing structure or its docking lane.
    Overlaps {
        /// Structure in the way.
        blocker: EntityId,
    },
    /// Too close to a resource node.
    TooCloseToResource {
        /// Node in the way.
        node: EntityId,
    },
}

impl PlacementResult {
    /// Check if placement is valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, PlacementResult::Valid)
    }
}

/// Validate placing `key` at `position`.
///
/// When `anchors` is empty the build-range check is skipped; that is the
/// expansion case where a mobile unit founds a new base.
#[must_use]
pub fn check_site(ctx: &AiContext<'_>, key: &str, position: Vec2Fixed, anchors: &[&Entity]) -> PlacementResult {
    let cfg = &ctx.config.placement;
    let footprint = footprint_of(ctx, key, position);
    if !footprint.on_map(&ctx.snapshot.map) {
        return PlacementResult::OutOfBounds;
    }

    let range = units(cfg.build_range);
    if !anchors.is_empty() && !anchors.iter().any(|a| a.position.within(position, range)) {
        return PlacementResult::OutOfRange;
    }

    let padded = footprint.inflate(units(cfg.building_gap));
    let blocker = ctx
        .snapshot
        .live_entities()
        .filter(|e| e.is_building())
        .find(|b| padded.overlaps(&footprint_of(ctx, &b.key, b.position)));
    if let Some(blocker) = blocker {
        return PlacementResult::Overlaps { blocker: blocker.id };
    }

    let clearance = footprint.inflate(units(cfg.resource_clearance));
    if let Some(node) = ctx.snapshot.resources().find(|n| clearance.contains(n.position)) {
        return PlacementResult::TooCloseToResource { node: node.id };
    }

    PlacementResult::Valid
}

// ============================================================================
// Candidate Search
// ============================================================================

/// Snap a position down onto the tile grid.
#[must_use]
pub fn snap_to_tile(pos: Vec2Fixed, tile_size: i32) -> Vec2Fixed {
    let tile = units(tile_size.max(1));
    Vec2Fixed::new((pos.x / tile).floor() * tile, (pos.y / tile).floor() * tile)
}

/// Ring offsets to try, nearest ring first, bounded by the sample budget.
pub fn candidate_offsets<R: Rng>(ctx: &AiContext<'_>, rng: &mut R) -> Vec<Vec2Fixed> {
    let cfg = &ctx.config.placement;
    let per_ring = cfg.samples_per_ring.max(1);
    let stride = (COMPASS_POINTS / per_ring).max(1);
    let mut offsets = Vec::with_capacity(cfg.max_samples);
    let mut ring: i32 = 0;
    while offsets.len() < cfg.max_samples {
        let radius = units(cfg.min_radius.saturating_add(ring.saturating_mul(cfg.radius_step)));
        let start = rng.gen_range(0..COMPASS_POINTS);
        for k in 0..per_ring {
            if offsets.len() >= cfg.max_samples {
                break;
            }
            offsets.push(compass_direction(start + k * stride).scale(radius));
        }
        ring += 1;
    }
    offsets
}

/// First valid site around `anchor` within the sample budget.
#[must_use]
pub fn find_site(
    ctx: &AiContext<'_>,
    key: &str,
    anchor: Vec2Fixed,
    anchors: &[&Entity],
    offsets: &[Vec2Fixed],
) -> Option<Vec2Fixed> {
    let tile = ctx.config.placement.tile_size;
    offsets
        .iter()
        .map(|offset| snap_to_tile(anchor + *offset, tile))
        .find(|site| check_site(ctx, key, *site, anchors).is_valid())
}

/// Nearest resource node with no own depot already serving it.
#[must_use]
pub fn unclaimed_node<'a>(ctx: &AiContext<'a>, from: Vec2Fixed) -> Option<&'a Entity> {
    let claim = units(ctx.config.placement.refinery_claim_radius);
    ctx.snapshot
        .resources()
        .filter(|n| {
            !ctx.own_buildings_with_role(BuildingRole::Refinery)
                .any(|r| r.position.within(n.position, claim))
        })
        .min_by_key(|n| (from.distance_squared(n.position), n.id))
}

// ============================================================================
// Planner
// ============================================================================

/// Placement orders for a finished building, if one is waiting.
pub fn plan_placement(ctx: &mut AiContext<'_>) -> Vec<AiCommand> {
    let Some(key) = ctx.economy.ready_to_place.clone() else {
        return Vec::new();
    };

    let anchors: Vec<&Entity> = ctx
        .view
        .own_buildings
        .iter()
        .copied()
        .filter(|b| b.is_complete())
        .filter(|b| ctx.rules.building(&b.key).is_some_and(|r| r.provides_build_area))
        .collect();

    let base_anchor = if anchors.is_empty() {
        let expanders = ctx
            .view
            .own_units
            .iter()
            .filter(|u| ctx.rules.unit(&u.key).is_some_and(|r| r.can_expand))
            .map(|u| u.position);
        centroid(expanders)
    } else {
        anchors
            .iter()
            .find(|b| ctx.role_of(b) == Some(BuildingRole::Main))
            .map(|b| b.position)
            .or_else(|| centroid(anchors.iter().map(|b| b.position)))
    };
    let Some(base_anchor) = base_anchor else {
        info!(
            faction = %ctx.faction,
            tick = ctx.tick(),
            %key,
            "no place to build, cancelling"
        );
        return vec![AiCommand::CancelProduction {
            category: ProductionCategory::Building,
        }];
    };

    let mut tries = Vec::with_capacity(2);
    if ctx.rules.building_role(&key) == Some(BuildingRole::Refinery) {
        if let Some(node) = unclaimed_node(ctx, base_anchor) {
            tries.push(node.position);
        }
    }
    tries.push(base_anchor);

    let mut rng = ctx.rng.clone();
    for anchor in tries {
        let offsets = candidate_offsets(ctx, &mut rng);
        if let Some(position) = find_site(ctx, &key, anchor, &anchors, &offsets) {
            ctx.rng = rng;
            debug!(
                faction = %ctx.faction,
                tick = ctx.tick(),
                %key,
                x = position.x.to_num::<i32>(),
                y = position.y.to_num::<i32>(),
                "placing building"
            );
            return vec![AiCommand::PlaceBuilding { key, position }];
        }
    }
    ctx.rng = rng;
    debug!(faction = %ctx.faction, tick = ctx.tick(), %key, "no site found, deferring");
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AiConfig, Difficulty};
    use crate::factions::FactionId;
    use crate::rules::RulesTable;
    use crate::spatial::SpatialGrid;
    use crate::world::{FactionEconomy, WorldSnapshot};

    const ME: FactionId = FactionId(1);

    fn pos(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_units(x, y)
    }

    fn world(ready: &str) -> WorldSnapshot {
        let mut snap = WorldSnapshot::new(100, MapBounds::default());
        let mut eco = FactionEconomy::new(1000, Difficulty::Hard);
        eco.ready_to_place = Some(ready.to_string());
        snap.factions.insert(ME, eco);
        snap
    }

    fn plan(snap: &WorldSnapshot, seed: u64) -> Vec<AiCommand> {
        let rules = RulesTable::standard();
        let config = AiConfig::default();
        let grid = SpatialGrid::from_snapshot(snap);
        let mut ctx = AiContext::new(snap, &grid, &rules, &config, ME, seed).unwrap();
        plan_placement(&mut ctx)
    }

    fn placed(cmds: &[AiCommand]) -> Option<Vec2Fixed> {
        cmds.iter().find_map(|c| match c {
            AiCommand::PlaceBuilding { position, .. } => Some(*position),
            _ => None,
        })
    }

    #[test]
    fn test_footprint_overlap() {
        let a = Footprint::around(pos(100, 100), (2, 2), 32);
        let b = Footprint::around(pos(164, 100), (2, 2), 32);
        assert!(!a.overlaps(&b));
        assert!(a.inflate(units(1)).overlaps(&b));
    }

    #[test]
    fn test_dock_zone_blocks_below_refinery() {
        let mut snap = world("power");
        snap.insert(Entity::new_building(1, ME, "conyard", pos(1000, 1000), 1000, 0));
        snap.insert(Entity::new_building(2, ME, "refinery", pos(1500, 1000), 900, 0));
        let rules = RulesTable::standard();
        let config = AiConfig::default();
        let grid = SpatialGrid::from_snapshot(&snap);
        let ctx = AiContext::new(&snap, &grid, &rules, &config, ME, 0).unwrap();
        let anchors: Vec<&Entity> = ctx.view.own_buildings.clone();
        assert_eq!(
            check_site(&ctx, "power", pos(1500, 1120), &anchors),
            PlacementResult::Overlaps { blocker: 2 }
        );
        assert!(check_site(&ctx, "power", pos(1500, 870), &anchors).is_valid());
    }

    #[test]
    fn test_places_near_main_building() {
        let mut snap = world("power");
        snap.insert(Entity::new_building(1, ME, "conyard", pos(1000, 1000), 1000, 0));
        let site = placed(&plan(&snap, 7)).unwrap();
        assert!(site.within(pos(1000, 1000), units(600)));
        assert!(!site.within(pos(1000, 1000), units(80)));
    }

    #[test]
    fn test_same_seed_same_site() {
        let mut snap = world("barracks");
        snap.insert(Entity::new_building(1, ME, "conyard", pos(1000, 1000), 1000, 0));
        assert_eq!(plan(&snap, 42), plan(&snap, 42));
    }

    #[test]
    fn test_refinery_prefers_unclaimed_node() {
        let mut snap = world("refinery");
        snap.insert(Entity::new_building(1, ME, "conyard", pos(1000, 1000), 1000, 0));
        snap.insert(Entity::new_resource(100, "ore", pos(1500, 1000), 2000));
        let site = placed(&plan(&snap, 3)).unwrap();
        assert!(site.distance(pos(1500, 1000)) < site.distance(pos(1000, 1000)));
    }

    #[test]
    fn test_cancels_without_anchor() {
        let mut snap = world("power");
        snap.insert(Entity::new_building(1, ME, "turret", pos(1000, 1000), 400, 0));
        assert_eq!(
            plan(&snap, 1),
            vec![AiCommand::CancelProduction {
                category: ProductionCategory::Building
            }]
        );
    }

    #[test]
    fn test_expansion_unit_anchors() {
        let mut snap = world("conyard");
        snap.insert(Entity::new_unit(5, ME, "mcv", pos(2000, 2000), 1000));
        let site = placed(&plan(&snap, 1)).unwrap();
        assert!(site.within(pos(2000, 2000), units(600)));
    }

    #[test]
    fn test_defers_when_nothing_fits() {
        let mut snap = world("power");
        snap.map = MapBounds::new(200, 200);
        snap.insert(Entity::new_building(1, ME, "conyard", pos(100, 100), 1000, 0));
        assert!(plan(&snap, 1).is_empty());
    }
}
