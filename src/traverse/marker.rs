//! Marker vectors: first-claim ownership of shared sub-entities in a view.
//!
//! A vertex is shared by every element around it, an edge by every element
//! containing it. To report each sub-entity once per traversal, the marker
//! records for each sub-entity the hierarchic index of the first element of
//! the view (in traversal order) that reaches it; only that element reports
//! it. While claiming, the partition types of all incident view elements are
//! folded into the sub-entity's partition type.

use crate::forest::traits::HierarchicGrid;
use crate::topology::partition::{IncidentPartitions, PartitionType, classify_element};
use crate::traverse::walk::{LeafWalk, LevelWalk, View};

/// Claims of one codimension, keyed by the sub-entity's hierarchic index.
#[derive(Clone, Debug, Default)]
struct CodimMarker {
    claimed_by: Vec<Option<usize>>,
    incident: Vec<IncidentPartitions>,
}

/// First-claim table for codimensions `1..=dim` of one view.
#[derive(Clone, Debug)]
pub struct MarkerVector {
    view: View,
    /// `codims[c - 1]` holds codimension `c`.
    codims: Vec<CodimMarker>,
}

impl MarkerVector {
    /// Build the marker for the elements of `level`.
    pub fn for_level<G>(grid: &G, level: usize) -> Self
    where
        G: HierarchicGrid + ?Sized,
    {
        Self::build(grid, View::Level(level), LevelWalk::new(grid, level))
    }

    /// Build the marker for the leaves up to `max_level`.
    pub fn for_leaves<G>(grid: &G, max_level: usize) -> Self
    where
        G: HierarchicGrid + ?Sized,
    {
        Self::build(grid, View::Leaf(max_level), LeafWalk::new(grid, max_level))
    }

    fn build<G, I>(grid: &G, view: View, elements: I) -> Self
    where
        G: HierarchicGrid + ?Sized,
        I: IntoIterator<Item = G::Element>,
    {
        let dim = grid.dimension();
        let mut codims: Vec<CodimMarker> = (1..=dim)
            .map(|codim| {
                let n = grid.max_hierarchic_index(codim);
                CodimMarker {
                    claimed_by: vec![None; n],
                    incident: vec![IncidentPartitions::default(); n],
                }
            })
            .collect();
        let mut claimed = 0usize;
        for e in elements {
            let owner = grid.hierarchic_index(e);
            let pt = classify_element(grid, e, |n| view.contains(grid, n));
            for (codim, marker) in (1..=dim).zip(codims.iter_mut()) {
                for i in 0..grid.sub_entity_count(e, codim) {
                    let h = grid.sub_index(e, codim, i);
                    if marker.claimed_by[h].is_none() {
                        marker.claimed_by[h] = Some(owner);
                        claimed += 1;
                    }
                    marker.incident[h].add(pt);
                }
            }
        }
        log::trace!("marker vector for {view:?}: {claimed} sub-entities claimed");
        Self { view, codims }
    }

    /// The view this marker was built for.
    pub fn view(&self) -> View {
        self.view
    }

    /// Returns true if the element with hierarchic index `element` reports
    /// the codim-`codim` sub-entity `sub`.
    pub fn is_claimed_by(&self, codim: usize, sub: usize, element: usize) -> bool {
        self.claimed_by(codim, sub) == Some(element)
    }

    /// Hierarchic index of the element that claimed sub-entity `sub`.
    pub fn claimed_by(&self, codim: usize, sub: usize) -> Option<usize> {
        self.codims
            .get(codim.checked_sub(1)?)?
            .claimed_by
            .get(sub)
            .copied()
            .flatten()
    }

    /// Partition type of sub-entity `sub`, folded from its incident view
    /// elements. `None` if no view element touches it.
    pub fn partition_type(&self, codim: usize, sub: usize) -> Option<PartitionType> {
        self.incident(codim, sub).map(|incident| incident.partition_type())
    }

    /// Partition types of the view elements around sub-entity `sub`. `None`
    /// if no view element touches it.
    pub fn incident(&self, codim: usize, sub: usize) -> Option<IncidentPartitions> {
        let incident = self.codims.get(codim.checked_sub(1)?)?.incident.get(sub)?;
        incident.is_touched().then_some(*incident)
    }

    /// Number of claimed sub-entities of `codim`.
    pub fn claimed_count(&self, codim: usize) -> usize {
        codim
            .checked_sub(1)
            .and_then(|c| self.codims.get(c))
            .map_or(0, |m| m.claimed_by.iter().flatten().count())
    }
}
