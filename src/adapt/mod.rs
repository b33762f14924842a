//! Adaptation driver: marks to topology change.
//!
//! One cycle coarsens every family whose children are all leaves marked for
//! coarsening, then bisects every leaf marked for refinement once, and
//! finally closes the cycle on the forest so that released hierarchic
//! indices become reusable and are reported to the index sets.

use crate::forest::traits::AdaptGrid;
use crate::grid_error::GridError;
use crate::traverse::walk::LeafWalk;
use hashbrown::HashSet;

/// Options controlling an adaptation cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AdaptivityOptions {
    /// Leaves on this level are not refined further.
    pub max_level: Option<usize>,
    /// Validate the index sets after every cycle and every compression.
    pub check_invariants: bool,
}

/// Outcome of one or more adaptation cycles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AdaptReport {
    /// Leaves bisected.
    pub refined: usize,
    /// Families removed (elements that became leaves again).
    pub coarsened: usize,
    /// Marked leaves left alone because of `max_level`.
    pub skipped: usize,
    /// Maximum level after the last cycle.
    pub max_level: usize,
}

impl AdaptReport {
    /// Returns true if the topology changed.
    pub fn changed(&self) -> bool {
        self.refined > 0 || self.coarsened > 0
    }

    /// Fold in the report of a later cycle.
    pub fn merge(&mut self, later: AdaptReport) {
        self.refined += later.refined;
        self.coarsened += later.coarsened;
        self.skipped += later.skipped;
        self.max_level = later.max_level;
    }
}

/// Returns true if the children of `father` are all leaves marked for
/// coarsening.
pub fn can_coarsen<G>(grid: &G, father: G::Element) -> bool
where
    G: AdaptGrid + ?Sized,
{
    let children = grid.children(father);
    !children.is_empty()
        && children
            .iter()
            .all(|&c| grid.is_leaf(c) && grid.get_mark(c) < 0)
}

/// Returns true if the next cycle will coarsen at least one family.
pub fn pre_adapt<G>(grid: &G) -> bool
where
    G: AdaptGrid + ?Sized,
{
    LeafWalk::new(grid, grid.max_level())
        .filter(|&e| grid.get_mark(e) < 0)
        .filter_map(|e| grid.father(e))
        .any(|f| can_coarsen(grid, f))
}

/// Run one adaptation cycle on `grid`.
pub fn adapt<G>(grid: &mut G, options: &AdaptivityOptions) -> Result<AdaptReport, GridError>
where
    G: AdaptGrid + ?Sized,
{
    let leaves: Vec<G::Element> = LeafWalk::new(&*grid, grid.max_level()).collect();

    let mut seen = HashSet::new();
    let fathers: Vec<G::Element> = leaves
        .iter()
        .filter(|&&e| grid.get_mark(e) < 0)
        .filter_map(|&e| grid.father(e))
        .filter(|&f| seen.insert(f))
        .filter(|&f| can_coarsen(&*grid, f))
        .collect();
    for &f in &fathers {
        grid.coarsen_children(f)?;
    }

    let mut report = AdaptReport {
        coarsened: fathers.len(),
        ..AdaptReport::default()
    };
    for e in leaves {
        if !grid.contains(e) || grid.get_mark(e) <= 0 {
            continue;
        }
        if options.max_level.is_some_and(|max| grid.level(e) >= max) {
            report.skipped += 1;
            continue;
        }
        grid.refine_element(e)?;
        report.refined += 1;
    }

    grid.end_adaptation();
    report.max_level = grid.max_level();
    log::debug!(
        "adaptation cycle: {} refined, {} coarsened, {} skipped, max level {}",
        report.refined,
        report.coarsened,
        report.skipped,
        report.max_level
    );
    Ok(report)
}
