use rlce_schemas::{LegitimacyChecks, Rat, RfBaseline, ServingCellObservation, SibInfo};

use crate::{
    BaselineSource, EvaluationContext, LegitimacyParameters, LegitimacyResult,
    NearestCalBaseline, PciPolicy, ReuseTablePolicy,
};

/// Evaluator with pluggable baseline and PCI strategies.
pub struct LegitimacyEvaluator {
    params: LegitimacyParameters,
    baseline: Box<dyn BaselineSource>,
    pci: Box<dyn PciPolicy>,
}

impl LegitimacyEvaluator {
    /// Nearest-CAL baselines and the reuse table from `params`.
    pub fn new(params: LegitimacyParameters) -> Self {
        let pci = ReuseTablePolicy::new(params.pci_reserved.clone());
        Self {
            params,
            baseline: Box::new(NearestCalBaseline),
            pci: Box::new(pci),
        }
    }

    pub fn with_baseline_source(mut self, source: impl BaselineSource + 'static) -> Self {
        self.baseline = Box::new(source);
        self
    }

    pub fn with_pci_policy(mut self, policy: impl PciPolicy + 'static) -> Self {
        self.pci = Box::new(policy);
        self
    }

    pub fn params(&self) -> &LegitimacyParameters {
        &self.params
    }

    pub fn evaluate(
        &self,
        obs: &ServingCellObservation,
        previous_tac: Option<u32>,
        ctx: &EvaluationContext<'_>,
    ) -> LegitimacyResult {
        let p = &self.params;
        let baseline = self.baseline.baseline_for(obs, ctx);

        let checks = LegitimacyChecks {
            plmn_allowed: p.allowed_plmns.contains(&obs.plmn),
            tac_continuous: previous_tac
                .map_or(true, |prev| obs.tac.abs_diff(prev) <= p.tac_delta_max),
            frequency_allowed: match obs.rat {
                Rat::Lte => p.allowed_lte_channels.contains(&obs.channel),
                Rat::Nr => p.allowed_nr_channels.contains(&obs.channel),
            },
            rf_envelope: baseline.is_some_and(|b| within_envelope(obs, &b)),
            pci_sane: self.pci.is_sane(obs, ctx),
            sib_sane: sib_sane(obs, &obs.sib, p.q_rx_lev_min_range_dbm),
            security_ok: matches!(
                (obs.integrity_alg, obs.cipher_alg),
                (Some(i), Some(c)) if !i.is_null() && !c.is_null()
            ),
        };

        LegitimacyResult {
            checks,
            pass: checks.all_pass(),
            baseline,
        }
    }
}

/// Default strategies over `params`.
pub fn evaluate(
    obs: &ServingCellObservation,
    previous_tac: Option<u32>,
    params: &LegitimacyParameters,
    ctx: &EvaluationContext<'_>,
) -> LegitimacyResult {
    LegitimacyEvaluator::new(params.clone()).evaluate(obs, previous_tac, ctx)
}

fn within_envelope(obs: &ServingCellObservation, b: &RfBaseline) -> bool {
    b.rsrp.contains(obs.rsrp_dbm) && b.rsrq.contains(obs.rsrq_db) && b.sinr.contains(obs.sinr_db)
}

fn sib_sane(obs: &ServingCellObservation, sib: &SibInfo, (lo, hi): (i32, i32)) -> bool {
    !sib.barred
        && !sib.broadcast_plmns.is_empty()
        && sib.broadcast_plmns.iter().all(|p| p.is_well_formed())
        && sib.broadcast_plmns.contains(&obs.plmn)
        && (lo..=hi).contains(&sib.q_rx_lev_min_dbm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rlce_schemas::{AlgorithmId, MetricBaseline, Plmn};

    fn obs() -> ServingCellObservation {
        ServingCellObservation {
            plmn: Plmn::new("310260"),
            rat: Rat::Lte,
            channel: 66486,
            pci: 321,
            cell_id: 99_001,
            tac: 8124,
            rsrp_dbm: -92.0,
            rsrq_db: -10.0,
            sinr_db: 12.0,
            integrity_alg: Some(AlgorithmId(2)),
            cipher_alg: Some(AlgorithmId(2)),
            sib: SibInfo {
                barred: false,
                q_rx_lev_min_dbm: -120,
                broadcast_plmns: vec![Plmn::new("310260")],
            },
            observed_at_ms: 0,
        }
    }

    fn params() -> LegitimacyParameters {
        LegitimacyParameters {
            allowed_plmns: [Plmn::new("310260")].into(),
            allowed_lte_channels: [66486].into(),
            ..LegitimacyParameters::default()
        }
    }

    fn route_baseline() -> RfBaseline {
        RfBaseline {
            rsrp: MetricBaseline::new(-95.0, 6.0),
            rsrq: MetricBaseline::new(-10.0, 3.0),
            sinr: MetricBaseline::new(12.0, 5.0),
        }
    }

    #[test]
    fn first_sample_tac_is_vacuously_continuous() {
        let rb = route_baseline();
        let ctx = EvaluationContext {
            window: None,
            route_baseline: Some(&rb),
        };
        let r = evaluate(&obs(), None, &params(), &ctx);
        assert!(r.checks.tac_continuous);
        assert!(r.pass);
    }

    #[test]
    fn no_applicable_baseline_fails_rf_check() {
        let r = evaluate(&obs(), Some(8124), &params(), &EvaluationContext::default());
        assert!(!r.checks.rf_envelope);
        assert!(r.baseline.is_none());
        assert!(!r.pass);
    }

    #[test]
    fn unreported_algorithm_fails_security() {
        let rb = route_baseline();
        let ctx = EvaluationContext {
            window: None,
            route_baseline: Some(&rb),
        };
        let mut o = obs();
        o.cipher_alg = None;
        assert!(!evaluate(&o, None, &params(), &ctx).checks.security_ok);
        o.cipher_alg = Some(AlgorithmId::NULL);
        assert!(!evaluate(&o, None, &params(), &ctx).checks.security_ok);
    }

    #[test]
    fn sib_must_broadcast_serving_plmn() {
        let mut o = obs();
        o.sib.broadcast_plmns = vec![Plmn::new("311480")];
        assert!(!sib_sane(&o, &o.sib, (-125, -85)));
        o.sib.broadcast_plmns = vec![Plmn::new("310260"), Plmn::new("31X")];
        assert!(!sib_sane(&o, &o.sib, (-125, -85)));
        o.sib.broadcast_plmns = vec![Plmn::new("310260")];
        o.sib.q_rx_lev_min_dbm = -84;
        assert!(!sib_sane(&o, &o.sib, (-125, -85)));
        o.sib.q_rx_lev_min_dbm = -125;
        assert!(sib_sane(&o, &o.sib, (-125, -85)));
    }
}
