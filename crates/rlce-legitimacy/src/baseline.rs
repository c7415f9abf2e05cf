use rlce_schemas::{RfBaseline, ServingCellObservation};

use crate::EvaluationContext;

/// Source of the RF envelope an out-of-window cell is compared against.
///
/// Deployments differ on where (μ, σ) come from (static survey values or a
/// rolling estimate), so the evaluator only depends on this trait.
pub trait BaselineSource: Send + Sync {
    fn baseline_for(
        &self,
        obs: &ServingCellObservation,
        ctx: &EvaluationContext<'_>,
    ) -> Option<RfBaseline>;
}

/// Survey baseline of the nearest CAL entry in the window on the same RAT
/// and channel, falling back to the route-wide baseline.
///
/// "Nearest" ranks by same PLMN first, then smallest TAC difference, then
/// segment distance from the committed segment.
#[derive(Clone, Copy, Debug, Default)]
pub struct NearestCalBaseline;

impl BaselineSource for NearestCalBaseline {
    fn baseline_for(
        &self,
        obs: &ServingCellObservation,
        ctx: &EvaluationContext<'_>,
    ) -> Option<RfBaseline> {
        let from_cal = ctx.window.and_then(|w| {
            let k = w.segment_index();
            w.entries()
                .filter(|e| e.cal.rat == obs.rat && e.cal.channel == obs.channel)
                .min_by_key(|e| {
                    (
                        e.cal.plmn != obs.plmn,
                        e.cal.tac.abs_diff(obs.tac),
                        e.segment_index.abs_diff(k),
                        e.cal.identity(),
                    )
                })
                .map(|e| e.cal.baseline())
        });
        from_cal.or_else(|| ctx.route_baseline.copied())
    }
}

/// Always the route-wide baseline.
#[derive(Clone, Copy, Debug, Default)]
pub struct RouteBaselineOnly;

impl BaselineSource for RouteBaselineOnly {
    fn baseline_for(
        &self,
        _obs: &ServingCellObservation,
        ctx: &EvaluationContext<'_>,
    ) -> Option<RfBaseline> {
        ctx.route_baseline.copied()
    }
}
