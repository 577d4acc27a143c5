//! Economic desperation scoring.
//!
//! Five factors, each normalised to `0..=100`, are combined according to the
//! difficulty tier's [`DesperationModel`]. The score picks one of four risk
//! bands that bound how much danger workers accept and how early they flee.

use tracing::debug;

use crate::config::{DesperationConfig, DesperationModel, RiskBand};
use crate::context::AiContext;
use crate::rules::BuildingRole;
use crate::state::AiState;

/// Individual desperation factors, each in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DesperationFactors {
    /// Low credits.
    pub credits: i32,
    /// Income below expenses.
    pub income: i32,
    /// Too few workers per depot.
    pub worker_ratio: i32,
    /// Still in the early game.
    pub game_phase: i32,
    /// Behind the richest opponent.
    pub standing: i32,
}

/// Raw inputs to the factor computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EconomicInputs {
    /// Current credits.
    pub credits: i32,
    /// Income per minute.
    pub income_rate: i32,
    /// Expenses per minute.
    pub expense_rate: i32,
    /// Own workers.
    pub harvesters: usize,
    /// Own depots.
    pub refineries: usize,
    /// Current tick.
    pub tick: u64,
    /// Credits of the richest opponent, if any.
    pub best_opponent_credits: Option<i32>,
}

fn shortfall_pct(have: i64, want: i64) -> i32 {
    if want <= 0 || have >= want {
        return 0;
    }
    let pct = (want - have.max(0)) * 100 / want;
    i32::try_from(pct.clamp(0, 100)).unwrap_or(100)
}

impl DesperationFactors {
    /// Compute the factors from raw inputs.
    #[must_use]
    pub fn compute(inputs: &EconomicInputs, cfg: &DesperationConfig) -> Self {
        let credits = shortfall_pct(i64::from(inputs.credits), i64::from(cfg.wealth_threshold));

        let income = shortfall_pct(i64::from(inputs.income_rate), i64::from(inputs.expense_rate));

        let worker_ratio = if inputs.refineries == 0 {
            100
        } else {
            let harvesters = i64::try_from(inputs.harvesters).unwrap_or(i64::MAX);
            let refineries = i64::try_from(inputs.refineries).unwrap_or(1);
            let ratio_pct = harvesters.saturating_mul(100) / refineries;
            shortfall_pct(ratio_pct, i64::from(cfg.healthy_worker_ratio_pct))
        };

        let game_phase = if inputs.tick < cfg.early_game_ticks {
            cfg.early_game_bonus.clamp(0, 100)
        } else {
            0
        };

        let standing = inputs.best_opponent_credits.map_or(0, |best| {
            shortfall_pct(i64::from(inputs.credits), i64::from(best))
        });

        Self {
            credits,
            income,
            worker_ratio,
            game_phase,
            standing,
        }
    }

    /// Combine the factors under a tier's model into a `0..=100` score.
    #[must_use]
    pub fn score(&self, model: &DesperationModel) -> u8 {
        let weighted = |pairs: &[(i32, u8)]| -> i64 {
            let total: i64 = pairs.iter().map(|(_, w)| i64::from(*w)).sum();
            if total == 0 {
                return 0;
            }
            let sum: i64 = pairs
                .iter()
                .map(|(f, w)| i64::from(*f) * i64::from(*w))
                .sum();
            sum / total
        };
        let raw = match model {
            DesperationModel::Fixed(value) => i64::from(*value),
            DesperationModel::TwoFactor {
                credits,
                worker_ratio,
            } => weighted(&[(self.credits, *credits), (self.worker_ratio, *worker_ratio)]),
            DesperationModel::Weighted(w) => weighted(&[
                (self.credits, w.credits),
                (self.income, w.income),
                (self.worker_ratio, w.worker_ratio),
                (self.game_phase, w.game_phase),
                (self.standing, w.standing),
            ]),
        };
        u8::try_from(raw.clamp(0, 100)).unwrap_or(100)
    }
}

/// Risk band for a score.
#[must_use]
pub fn risk_band(cfg: &DesperationConfig, score: u8) -> RiskBand {
    cfg.bands
        .iter()
        .copied()
        .find(|band| score <= band.max_score)
        .unwrap_or(cfg.bands[cfg.bands.len() - 1])
}

/// Gather inputs for the faction in `ctx`.
#[must_use]
pub fn economic_inputs(ctx: &AiContext<'_>) -> EconomicInputs {
    EconomicInputs {
        credits: ctx.economy.credits,
        income_rate: ctx.economy.income_rate,
        expense_rate: ctx.economy.expense_rate,
        harvesters: ctx.view.harvesters.len(),
        refineries: ctx.own_buildings_with_role(BuildingRole::Refinery).count(),
        tick: ctx.tick(),
        best_opponent_credits: ctx
            .snapshot
            .opponents_of(ctx.faction)
            .map(|(_, eco)| eco.credits)
            .max(),
    }
}

/// Score the faction, store it, and track sustained high desperation.
pub fn update_desperation(ctx: &AiContext<'_>, state: &mut AiState) -> RiskBand {
    let factors = DesperationFactors::compute(&economic_inputs(ctx), &ctx.config.desperation);
    let score = factors.score(&ctx.profile.desperation);

    if score >= ctx.config.strategy.all_in_score {
        state.high_desperation_since.get_or_insert(ctx.tick());
    } else {
        state.high_desperation_since = None;
    }
    if score != state.desperation_score {
        debug!(
            faction = %ctx.faction,
            tick = ctx.tick(),
            from = state.desperation_score,
            to = score,
            ?factors,
            "desperation changed"
        );
    }
    state.desperation_score = score;
    risk_band(&ctx.config.desperation, score)
}

/// Record the tick if any own unit is currently fighting.
pub fn track_engagement(ctx: &AiContext<'_>, state: &mut AiState) {
    let window = ctx.config.harvester.recent_damage_ticks;
    let now = ctx.tick();
    let engaged = ctx.view.own_units.iter().any(|unit| {
        unit.unit.as_ref().is_some_and(|u| {
            u.combat_target.is_some_and(|t| ctx.is_live_enemy(t)) || u.damaged_recently(now, window)
        })
    });
    if engaged {
        state.last_combat_tick = Some(now);
    }
}
