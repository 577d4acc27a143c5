//! Enemy intelligence and base discovery.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::context::AiContext;
use crate::rules::{ArmorClass, BuildingRole};
use crate::state::AiState;

/// Rebuild the enemy composition histogram every `intel_interval` ticks.
pub fn refresh_intel(ctx: &AiContext<'_>, state: &mut AiState) {
    let now = ctx.tick();
    let interval = ctx.config.economy.intel_interval;
    if state
        .enemy_intel
        .last_update
        .is_some_and(|last| now.saturating_sub(last) < interval)
    {
        return;
    }

    let mut unit_counts: BTreeMap<String, u32> = BTreeMap::new();
    let mut armor_counts: BTreeMap<ArmorClass, u32> = BTreeMap::new();
    for enemy in &ctx.view.enemy_units {
        *unit_counts.entry(enemy.key.clone()).or_default() += 1;
        if ctx.rules.is_combat_unit(&enemy.key) {
            *armor_counts.entry(ctx.rules.armor_of(&enemy.key)).or_default() += 1;
        }
    }
    // Ties go to the heavier class.
    let dominant_armor = armor_counts
        .into_iter()
        .max_by_key(|(armor, count)| (*count, *armor))
        .map(|(armor, _)| armor);

    state.enemy_intel.unit_counts = unit_counts;
    state.enemy_intel.dominant_armor = dominant_armor;
    state.enemy_intel.last_update = Some(now);
    debug!(
        faction = %ctx.faction,
        tick = now,
        ?dominant_armor,
        "enemy intel refreshed"
    );
}

/// Remember the closest visible enemy production center. Never cleared.
pub fn discover_enemy_base(ctx: &AiContext<'_>, state: &mut AiState) {
    let reference = ctx.view.base_center;
    let closest = |role_ok: &dyn Fn(BuildingRole) -> bool| {
        ctx.view
            .enemy_buildings
            .iter()
            .filter(|b| ctx.role_of(b).is_some_and(role_ok))
            .min_by_key(|b| {
                (
                    reference.map(|r| r.distance_squared(b.position)),
                    b.id,
                )
            })
            .map(|b| b.position)
    };

    let found = closest(&|role| role == BuildingRole::Main)
        .or_else(|| closest(&BuildingRole::is_production));
    if let Some(position) = found {
        if state.enemy_base_location != Some(position) {
            info!(
                faction = %ctx.faction,
                tick = ctx.tick(),
                x = position.x.to_num::<i32>(),
                y = position.y.to_num::<i32>(),
                "enemy base located"
            );
        }
        state.enemy_base_location = Some(position);
    }
}
