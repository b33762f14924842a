//! Partition types for distributed grids.
//!
//! Every element carries the rank that owns it. Relative to the local rank an
//! element, or a sub-entity shared by several elements, is classified as
//! `Interior`, `Border`, `Overlap`, `Front` or `Ghost`. Traversals select
//! entities through a [`PartitionIteratorType`]. Apart from `InteriorBorder`
//! and `Ghost`, which pick the two sides of the process boundary, these name
//! cumulative sets of partition types.
//!
//! Classification looks only at the elements of the current view (one level,
//! or the leaves) and is evaluated locally; no communication happens here.

use crate::forest::traits::HierarchicGrid;

/// Partition type of a single entity relative to the local rank.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PartitionType {
    /// Owned, not touching any foreign element.
    Interior,
    /// Owned, touching a foreign element (or shared between owned and foreign).
    Border,
    /// Foreign, not touching an owned element.
    Overlap,
    /// Foreign sub-entity on the outer rim of the ghost layer.
    Front,
    /// Foreign, touching an owned element.
    Ghost,
}

/// Which partition types a traversal reports.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PartitionIteratorType {
    /// `Interior` only.
    Interior,
    /// Owned entities adjacent to a ghost.
    InteriorBorder,
    /// `Interior`, `Border` and `Overlap`.
    Overlap,
    /// `Interior`, `Border`, `Overlap` and `Front`.
    OverlapFront,
    /// Every entity.
    All,
    /// `Ghost` only.
    Ghost,
}

impl PartitionIteratorType {
    /// Returns true if elements of partition type `pt` are reported.
    pub fn contains(self, pt: PartitionType) -> bool {
        use PartitionType as P;
        match self {
            Self::Interior => pt == P::Interior,
            Self::InteriorBorder => pt == P::Border,
            Self::Overlap => matches!(pt, P::Interior | P::Border | P::Overlap),
            Self::OverlapFront => !matches!(pt, P::Ghost),
            Self::All => true,
            Self::Ghost => pt == P::Ghost,
        }
    }

    /// Returns true if a sub-entity with the folded incident types is
    /// reported.
    ///
    /// `InteriorBorder` needs both an owned and a ghost element around the
    /// sub-entity; an owned one that only touches overlap is left out.
    pub fn accepts(self, incident: &IncidentPartitions) -> bool {
        match self {
            Self::InteriorBorder => incident.owned && incident.ghost,
            _ => self.contains(incident.partition_type()),
        }
    }
}

/// Classify element `e` among the elements accepted by `in_view`.
///
/// An owned element is `Border` if any neighbor in the view is foreign and
/// `Interior` otherwise. A foreign element is `Ghost` if any neighbor in the
/// view is owned and `Overlap` otherwise.
pub fn classify_element<G, F>(grid: &G, e: G::Element, in_view: F) -> PartitionType
where
    G: HierarchicGrid + ?Sized,
    F: Fn(G::Element) -> bool,
{
    let rank = grid.rank();
    let owned = grid.owner(e) == rank;
    let touches_other = grid
        .neighbors(e)
        .into_iter()
        .filter(|&n| n != e && in_view(n))
        .any(|n| (grid.owner(n) == rank) != owned);
    match (owned, touches_other) {
        (true, false) => PartitionType::Interior,
        (true, true) => PartitionType::Border,
        (false, true) => PartitionType::Ghost,
        (false, false) => PartitionType::Overlap,
    }
}

/// Accumulates the partition types of the elements incident to a sub-entity.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IncidentPartitions {
    owned: bool,
    ghost: bool,
    overlap: bool,
}

impl IncidentPartitions {
    /// Fold in one incident element classified as `pt`.
    pub fn add(&mut self, pt: PartitionType) {
        match pt {
            PartitionType::Interior | PartitionType::Border => self.owned = true,
            PartitionType::Ghost => self.ghost = true,
            PartitionType::Overlap | PartitionType::Front => self.overlap = true,
        }
    }

    /// Returns true once at least one incident element has been folded in.
    pub fn is_touched(&self) -> bool {
        self.owned || self.ghost || self.overlap
    }

    /// Partition type of the sub-entity.
    pub fn partition_type(&self) -> PartitionType {
        match (self.owned, self.ghost || self.overlap) {
            (true, false) => PartitionType::Interior,
            (true, true) => PartitionType::Border,
            (false, _) => match (self.ghost, self.overlap) {
                (true, false) => PartitionType::Ghost,
                (true, true) => PartitionType::Front,
                _ => PartitionType::Overlap,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::PartitionIteratorType as It;
    use super::PartitionType as P;

    #[test]
    fn iterator_type_membership() {
        let all = [P::Interior, P::Border, P::Overlap, P::Front, P::Ghost];
        let count = |it: It| all.iter().filter(|&&p| it.contains(p)).count();
        assert_eq!(count(It::Interior), 1);
        assert_eq!(count(It::InteriorBorder), 1);
        assert!(It::InteriorBorder.contains(P::Border));
        assert!(!It::InteriorBorder.contains(P::Interior));
        assert_eq!(count(It::Overlap), 3);
        assert_eq!(count(It::OverlapFront), 4);
        assert_eq!(count(It::All), 5);
        assert_eq!(count(It::Ghost), 1);
        assert!(!It::OverlapFront.contains(P::Ghost));
    }

    #[test]
    fn incident_fold() {
        let mut acc = IncidentPartitions::default();
        assert!(!acc.is_touched());
        acc.add(P::Interior);
        assert_eq!(acc.partition_type(), P::Interior);
        acc.add(P::Ghost);
        assert_eq!(acc.partition_type(), P::Border);

        let mut rim = IncidentPartitions::default();
        rim.add(P::Ghost);
        assert_eq!(rim.partition_type(), P::Ghost);
        rim.add(P::Overlap);
        assert_eq!(rim.partition_type(), P::Front);

        let mut far = IncidentPartitions::default();
        far.add(P::Overlap);
        assert_eq!(far.partition_type(), P::Overlap);
    }

    #[test]
    fn interior_border_on_sub_entities_needs_a_ghost() {
        let mut seam = IncidentPartitions::default();
        seam.add(P::Border);
        assert!(!It::InteriorBorder.accepts(&seam));
        seam.add(P::Ghost);
        assert!(It::InteriorBorder.accepts(&seam));
        assert!(It::Overlap.accepts(&seam));

        // owned corner touching only overlap elements
        let mut corner = IncidentPartitions::default();
        corner.add(P::Interior);
        corner.add(P::Overlap);
        assert_eq!(corner.partition_type(), P::Border);
        assert!(!It::InteriorBorder.accepts(&corner));
        assert!(It::Overlap.accepts(&corner));

        let mut halo = IncidentPartitions::default();
        halo.add(P::Ghost);
        assert!(!It::InteriorBorder.accepts(&halo));
        assert!(It::Ghost.accepts(&halo));
    }
}
