//! `rlce simulate`: replay a recorded trace through the pure engine.
//!
//! No radio is driven. Each record is one tick at its own `t_ms`, so the
//! output is the decision sequence the vehicle would have produced.

use anyhow::{Context, Result};
use rlce_config::EnforcementConfig;
use rlce_engine::{DecisionEngine, RadioCommand, TickInput};
use rlce_legitimacy::LegitimacyEvaluator;
use rlce_profile::{load_profile_json, ProfileStore};
use rlce_runtime::{engine_params, legitimacy_params, load_trace_jsonl, TraceRecord};
use rlce_schemas::Decision;

/// Totals over one replay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationSummary {
    pub ticks: usize,
    pub allowed: usize,
    pub fail_open: usize,
    pub blocked: usize,
    pub events: usize,
    pub max_downtime_ms: Option<i64>,
}

impl SimulationSummary {
    fn line(&self) -> String {
        format!(
            "summary ticks={} allowed={} fail_open={} blocked={} events={} max_downtime_ms={}",
            self.ticks,
            self.allowed,
            self.fail_open,
            self.blocked,
            self.events,
            self.max_downtime_ms
                .map_or_else(|| "-".to_string(), |v| v.to_string())
        )
    }
}

pub fn simulate(
    cfg: &EnforcementConfig,
    profile_path: &str,
    trace_path: &str,
) -> Result<Vec<String>> {
    let store = ProfileStore::new();
    let profile = store
        .load(load_profile_json(profile_path).with_context(|| format!("profile {profile_path}"))?)
        .with_context(|| format!("profile {profile_path} rejected"))?;
    let records = load_trace_jsonl(trace_path).with_context(|| format!("trace {trace_path}"))?;

    let mut engine = DecisionEngine::new(
        engine_params(cfg),
        LegitimacyEvaluator::new(legitimacy_params(cfg)),
        None,
    );
    let (mut lines, summary) = replay(&mut engine, &profile, &records);
    lines.push(summary.line());
    Ok(lines)
}

/// One output line per record, plus the totals.
pub fn replay(
    engine: &mut DecisionEngine,
    profile: &rlce_schemas::RouteProfile,
    records: &[TraceRecord],
) -> (Vec<String>, SimulationSummary) {
    let mut lines = Vec::with_capacity(records.len() + 1);
    let mut s = SimulationSummary::default();

    for r in records {
        let o = engine.tick(TickInput {
            now_ms: r.t_ms,
            profile: Some(profile),
            position: r.position.as_ref(),
            serving_cell: r.serving_cell.as_ref(),
        });

        s.ticks += 1;
        match o.decision {
            Decision::Allowed => s.allowed += 1,
            Decision::FailOpen => s.fail_open += 1,
            Decision::Blocked => s.blocked += 1,
        }
        s.events += o.events.len();
        if let Some(ms) = o.recovered_after_ms {
            s.max_downtime_ms = Some(s.max_downtime_ms.map_or(ms, |m| m.max(ms)));
        }

        let commands: Vec<&str> = o.commands.iter().map(RadioCommand::name).collect();
        let mut line = format!(
            "t_ms={} decision={} cause={} segment={} cell={} commands={}",
            o.tick_ms,
            o.decision,
            o.block_cause.map_or_else(|| "-".to_string(), |c| c.to_string()),
            o.segment
                .and_then(|u| u.committed)
                .map_or_else(|| "-".to_string(), |k| k.to_string()),
            r.serving_cell
                .as_ref()
                .map_or_else(|| "-".to_string(), |c| c.identity().to_string()),
            if commands.is_empty() {
                "-".to_string()
            } else {
                commands.join(",")
            },
        );
        if let Some(ms) = o.recovered_after_ms {
            line.push_str(&format!(" downtime_ms={ms}"));
        }
        lines.push(line);
    }
    (lines, s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rlce_schemas::PositionSample;
    use rlce_testkit::fixtures::{demo_legitimacy, demo_profile, observe, rogue_cell};

    fn rec(t_ms: i64, m: f64, cell: Option<rlce_schemas::ServingCellObservation>) -> TraceRecord {
        TraceRecord {
            t_ms,
            position: Some(PositionSample::chainage(t_ms, m)),
            serving_cell: cell,
        }
    }

    #[test]
    fn rogue_tick_blocks_and_recovery_reports_downtime() {
        let profile = demo_profile(1);
        let home = observe(&profile.segments[0].cal[0]);
        let records = vec![
            rec(0, 100.0, Some(home.clone())),
            rec(250, 110.0, Some(rogue_cell())),
            rec(500, 120.0, Some(rogue_cell())),
            rec(750, 130.0, Some(home)),
        ];
        let mut engine = DecisionEngine::new(
            Default::default(),
            LegitimacyEvaluator::new(demo_legitimacy()),
            None,
        );
        let (lines, s) = replay(&mut engine, &profile, &records);

        assert!(lines[0].contains("decision=ALLOWED"));
        assert!(lines[0].ends_with("commands=ENABLE_TRAFFIC"));
        assert!(lines[1].contains("decision=BLOCKED cause=NOT_AUTHORIZED segment=0"));
        assert!(lines[1].ends_with("commands=DISABLE_TRAFFIC,DEREGISTER,TRY_RESELECT"));
        assert!(lines[2].ends_with("commands=-"));
        assert!(lines[3].ends_with("downtime_ms=500"));
        assert_eq!(
            s,
            SimulationSummary {
                ticks: 4,
                allowed: 2,
                fail_open: 0,
                blocked: 2,
                events: 1,
                max_downtime_ms: Some(500),
            }
        );
    }
}
