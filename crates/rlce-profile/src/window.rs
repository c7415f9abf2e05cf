use rlce_schemas::{CalEntry, CellIdentity, Plmn, Rat, RouteProfile, ServingCellObservation};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Cache key of a computed window.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct WindowKey {
    pub segment_index: usize,
    pub profile_epoch: u64,
    pub grace: usize,
}

/// One authorized cell and the segment whose CAL contributed it.
#[derive(Clone, Debug, PartialEq)]
pub struct WindowEntry {
    pub segment_index: usize,
    pub cal: CalEntry,
}

/// `W(k)`: every CAL entry of segments `lo..=hi`, keyed by full cell
/// identity. When the same cell appears in several segments the entry from
/// the segment closest to `k` is kept.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthorizedWindow {
    key: WindowKey,
    lo: usize,
    hi: usize,
    cells: BTreeMap<CellIdentity, WindowEntry>,
}

impl AuthorizedWindow {
    pub fn key(&self) -> WindowKey {
        self.key
    }

    pub fn segment_index(&self) -> usize {
        self.key.segment_index
    }

    pub fn profile_epoch(&self) -> u64 {
        self.key.profile_epoch
    }

    /// Inclusive range of segments whose CALs make up the window.
    pub fn segment_range(&self) -> (usize, usize) {
        (self.lo, self.hi)
    }

    pub fn contains(&self, identity: &CellIdentity) -> bool {
        self.cells.contains_key(identity)
    }

    /// Membership requires PLMN, RAT, channel, PCI, cell id and TAC to all
    /// match one window entry.
    pub fn contains_observation(&self, obs: &ServingCellObservation) -> bool {
        self.contains(&obs.identity())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &WindowEntry> {
        self.cells.values()
    }

    pub fn identities(&self) -> impl Iterator<Item = &CellIdentity> {
        self.cells.keys()
    }

    /// Distinct (RAT, channel) pairs, for band-mask pinning.
    pub fn channels(&self) -> BTreeSet<(Rat, u32)> {
        self.cells
            .keys()
            .map(|id| (id.key.rat, id.key.channel))
            .collect()
    }

    pub fn plmns(&self) -> BTreeSet<Plmn> {
        self.cells.keys().map(|id| id.key.plmn.clone()).collect()
    }

    /// Entry on `rat` with the highest surveyed mean RSRP.
    pub fn strongest_on(&self, rat: Rat) -> Option<&WindowEntry> {
        self.cells
            .values()
            .filter(|e| e.cal.rat == rat)
            .max_by(|a, b| {
                a.cal
                    .baseline_rsrp
                    .mean
                    .total_cmp(&b.cal.baseline_rsrp.mean)
            })
    }
}

/// Pure construction of `W(k)` with grace `g`. `None` when `k` is not a
/// segment of `profile`.
pub fn build_window(profile: &RouteProfile, k: usize, g: usize) -> Option<AuthorizedWindow> {
    let last = profile.last_index()?;
    if k > last {
        return None;
    }
    let lo = k.saturating_sub(g);
    let hi = k.saturating_add(g).min(last);

    // Visit k first, then alternate outward, so the nearest segment wins.
    let mut order = vec![k];
    for d in 1..=g.min(last) {
        if let Some(i) = k.checked_sub(d) {
            if i >= lo {
                order.push(i);
            }
        }
        let j = k + d;
        if j <= hi {
            order.push(j);
        }
    }

    let mut cells = BTreeMap::new();
    for i in order {
        let Some(seg) = profile.segment(i) else {
            continue;
        };
        for cal in &seg.cal {
            cells.entry(cal.identity()).or_insert_with(|| WindowEntry {
                segment_index: i,
                cal: cal.clone(),
            });
        }
    }

    Some(AuthorizedWindow {
        key: WindowKey {
            segment_index: k,
            profile_epoch: profile.epoch,
            grace: g,
        },
        lo,
        hi,
        cells,
    })
}

/// Single-entry cache in front of [`build_window`]. Owned by the decision
/// loop; any change of segment, epoch or grace recomputes.
#[derive(Debug, Default)]
pub struct WindowBuilder {
    cached: Option<Arc<AuthorizedWindow>>,
}

impl WindowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn window_for(
        &mut self,
        profile: &RouteProfile,
        segment_index: usize,
        grace: usize,
    ) -> Option<Arc<AuthorizedWindow>> {
        let key = WindowKey {
            segment_index,
            profile_epoch: profile.epoch,
            grace,
        };
        if let Some(w) = &self.cached {
            if w.key() == key {
                return Some(Arc::clone(w));
            }
        }

        match build_window(profile, segment_index, grace) {
            Some(w) => {
                let w = Arc::new(w);
                self.cached = Some(Arc::clone(&w));
                Some(w)
            }
            None => {
                self.cached = None;
                None
            }
        }
    }

    pub fn cached_key(&self) -> Option<WindowKey> {
        self.cached.as_ref().map(|w| w.key())
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rlce_schemas::{
        CalEntry, MetricBaseline, Segment, SegmentExtent, VerificationStatus,
    };

    fn cal(pci: u16, tac: u32, rsrp_mean: f64) -> CalEntry {
        CalEntry {
            plmn: Plmn::new("310260"),
            rat: Rat::Lte,
            channel: 66486,
            pci,
            cell_id: 1000 + pci as u64,
            tac,
            baseline_rsrp: MetricBaseline::new(rsrp_mean, 6.0),
            baseline_rsrq: MetricBaseline::new(-10.0, 3.0),
            baseline_sinr: MetricBaseline::new(12.0, 5.0),
            last_validated: "2026-01-01T00:00:00Z".parse().unwrap(),
            signature: String::new(),
        }
    }

    fn profile(epoch: u64) -> RouteProfile {
        RouteProfile {
            route_id: "R1".to_string(),
            epoch,
            verification: VerificationStatus::Verified,
            segments: (0..4)
                .map(|i| Segment {
                    index: i,
                    extent: SegmentExtent::Chainage {
                        start_m: i as f64 * 100.0,
                        end_m: (i + 1) as f64 * 100.0,
                    },
                    cal: vec![cal(100 + i as u16, 8000 + i as u32, -90.0 - i as f64)],
                })
                .collect(),
            route_baseline: None,
        }
    }

    #[test]
    fn cache_hits_on_same_key_and_recomputes_on_epoch_change() {
        let mut wb = WindowBuilder::new();
        let p1 = profile(1);
        let a = wb.window_for(&p1, 1, 1).unwrap();
        let b = wb.window_for(&p1, 1, 1).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let p2 = profile(2);
        let c = wb.window_for(&p2, 1, 1).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(wb.cached_key().unwrap().profile_epoch, 2);
    }

    #[test]
    fn out_of_range_segment_clears_cache() {
        let mut wb = WindowBuilder::new();
        let p = profile(1);
        wb.window_for(&p, 0, 1).unwrap();
        assert!(wb.window_for(&p, 9, 1).is_none());
        assert!(wb.cached_key().is_none());
    }

    #[test]
    fn strongest_entry_uses_baseline_rsrp() {
        let w = build_window(&profile(1), 1, 1).unwrap();
        // Segment 0 has the highest mean (-90).
        assert_eq!(w.strongest_on(Rat::Lte).unwrap().cal.pci, 100);
        assert!(w.strongest_on(Rat::Nr).is_none());
    }
}
