//! Invariant validation shared by the index manager and the index sets.

use crate::grid_error::GridError;

/// Trait for validating data structure invariants.
pub trait DebugInvariants {
    /// Assert invariants in debug builds or when invariant checking is enabled.
    fn debug_assert_invariants(&self);
    /// Validate invariants and return the first error encountered.
    fn validate_invariants(&self) -> Result<(), GridError>;
}

/// Run a fallible check and panic with context when invariant checking is
/// enabled (debug builds, `check-invariants` or `strict-invariants`).
#[macro_export]
macro_rules! debug_invariants {
    ($expr:expr, $($ctx:tt)*) => {
        #[cfg(any(debug_assertions, feature = "strict-invariants", feature = "check-invariants"))]
        if let Err(e) = $expr {
            panic!(concat!("[invariants] ", $($ctx)*, ": {}"), e);
        }
    };
}

/// Check that the assigned entries of `indices` form exactly `0..size`.
///
/// `None` entries are ignored. Fails on an index `>= size`, on a duplicate,
/// or when some value in `0..size` is not taken.
pub fn check_consecutive<I>(indices: I, size: usize, what: &str) -> Result<(), GridError>
where
    I: IntoIterator<Item = Option<usize>>,
{
    let mut taken = vec![false; size];
    let mut count = 0usize;
    for index in indices.into_iter().flatten() {
        if index >= size {
            return Err(GridError::InvariantViolation(format!(
                "{what}: index {index} outside 0..{size}"
            )));
        }
        if std::mem::replace(&mut taken[index], true) {
            return Err(GridError::InvariantViolation(format!(
                "{what}: index {index} assigned twice"
            )));
        }
        count += 1;
    }
    if count != size {
        return Err(GridError::InvariantViolation(format!(
            "{what}: {count} indices assigned for size {size}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_accepts_permutation_with_gaps_in_keys() {
        let idx = vec![Some(2), None, Some(0), Some(1), None];
        assert!(check_consecutive(idx, 3, "test").is_ok());
    }

    #[test]
    fn consecutive_rejects_duplicates_and_holes() {
        assert!(check_consecutive(vec![Some(0), Some(0)], 2, "dup").is_err());
        assert!(check_consecutive(vec![Some(0), Some(2)], 3, "hole").is_err());
        assert!(check_consecutive(vec![Some(3)], 3, "range").is_err());
    }
}
