//! Adjustment trigger rules and leg selection.

use chrono::NaiveDateTime;

use straddle_core::{EngineConfig, UnsetPremiumPolicy};

use crate::schedule::SquareOffSchedule;
use crate::types::{Leg, LegId, QuoteSnapshot, Trigger};

/// Evaluates the trigger rules in priority order; the first match wins.
pub fn evaluate(
    legs: &[Leg],
    snapshot: &QuoteSnapshot,
    baseline: f64,
    now: NaiveDateTime,
    schedule: &SquareOffSchedule,
    config: &EngineConfig,
) -> Option<Trigger> {
    let adjustments_allowed = schedule.adjustments_allowed(now);

    // 1. Premium breach: combined live premium above the baseline
    if adjustments_allowed || !config.breach_respects_cutoff {
        if let Some(trigger) = check_premium_breach(snapshot, baseline) {
            return Some(trigger);
        }
    }

    // 2. Distress band: a single leg's premium inside a band, before cutoff
    if adjustments_allowed {
        return check_distress_band(legs, config);
    }

    None
}

fn check_premium_breach(snapshot: &QuoteSnapshot, baseline: f64) -> Option<Trigger> {
    if snapshot.live_total > baseline {
        tracing::warn!(
            live_total = snapshot.live_total,
            baseline,
            "Adjustment trigger: combined premium above baseline"
        );
        return Some(Trigger::PremiumBreach {
            live_total: snapshot.live_total,
            baseline,
        });
    }
    None
}

fn check_distress_band(legs: &[Leg], config: &EngineConfig) -> Option<Trigger> {
    for leg in legs.iter().filter(|l| !l.closed) {
        let premium = leg.live_or_zero();
        if let Some(band) = config.distress_bands.iter().find(|b| b.contains(premium)) {
            tracing::warn!(
                leg = %leg.id,
                instrument = %leg.instrument_id(),
                premium,
                low = band.low,
                high = band.high,
                "Adjustment trigger: leg premium inside distress band"
            );
            return Some(Trigger::DistressBand {
                leg: leg.id,
                premium,
                band: *band,
            });
        }
    }
    None
}

/// Picks the leg to close for a fired trigger.
///
/// Premium breach closes the open leg with the highest live premium (first one
/// on ties); distress band closes the matching leg.
pub fn select_leg_to_close(
    legs: &[Leg],
    trigger: &Trigger,
    policy: UnsetPremiumPolicy,
) -> Option<LegId> {
    match trigger {
        Trigger::PremiumBreach { .. } => highest_live_premium(legs, policy),
        Trigger::DistressBand { leg, .. } => legs
            .iter()
            .find(|l| l.id == *leg && !l.closed)
            .map(|l| l.id),
    }
}

fn highest_live_premium(legs: &[Leg], policy: UnsetPremiumPolicy) -> Option<LegId> {
    let mut best: Option<(LegId, f64)> = None;
    for leg in legs.iter().filter(|l| !l.closed) {
        let premium = match (leg.live_premium, policy) {
            (Some(p), _) => p,
            (None, UnsetPremiumPolicy::TreatAsZero) => 0.0,
            (None, UnsetPremiumPolicy::Exclude) => continue,
        };
        if best.map_or(true, |(_, p)| premium > p) {
            best = Some((leg.id, premium));
        }
    }
    best.map(|(id, _)| id)
}
