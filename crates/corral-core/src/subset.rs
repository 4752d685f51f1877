//! Environment-index subsets.
//!
//! [`EnvIds`] names which of the N parallel environment instances an
//! operation applies to: all of them, or an explicit ordered set of indices.
//! Used uniformly across `reset`/`apply`/state-indexing operations.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// EnvIds
// ---------------------------------------------------------------------------

/// Which environment instances an operation applies to.
///
/// # Example
///
/// ```
/// use corral_core::subset::EnvIds;
///
/// let ids = EnvIds::from(vec![2, 5]);
/// assert_eq!(ids.indices(8), vec![2, 5]);
/// assert_eq!(EnvIds::All.indices(3), vec![0, 1, 2]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvIds {
    /// Unrestricted: every environment instance.
    All,
    /// An explicit ordered set of environment indices.
    Subset(Vec<usize>),
}

impl EnvIds {
    /// Materialize the subset as an ordered index list.
    #[must_use]
    pub fn indices(&self, num_envs: usize) -> Vec<usize> {
        match self {
            Self::All => (0..num_envs).collect(),
            Self::Subset(ids) => ids.clone(),
        }
    }

    /// Number of environments selected.
    #[must_use]
    pub fn len(&self, num_envs: usize) -> usize {
        match self {
            Self::All => num_envs,
            Self::Subset(ids) => ids.len(),
        }
    }

    /// Whether the selection is empty.
    #[must_use]
    pub fn is_empty(&self, num_envs: usize) -> bool {
        self.len(num_envs) == 0
    }

    /// Whether `index` is selected. `All` selects every index.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        match self {
            Self::All => true,
            Self::Subset(ids) => ids.contains(&index),
        }
    }

    /// Whether this is the unrestricted selection.
    #[must_use]
    pub const fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl From<Vec<usize>> for EnvIds {
    fn from(ids: Vec<usize>) -> Self {
        Self::Subset(ids)
    }
}

impl From<&[usize]> for EnvIds {
    fn from(ids: &[usize]) -> Self {
        Self::Subset(ids.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_materializes_every_index() {
        assert_eq!(EnvIds::All.indices(4), vec![0, 1, 2, 3]);
        assert_eq!(EnvIds::All.len(4), 4);
        assert!(!EnvIds::All.is_empty(4));
        assert!(EnvIds::All.is_all());
    }

    #[test]
    fn subset_keeps_order() {
        let ids = EnvIds::Subset(vec![5, 1, 3]);
        assert_eq!(ids.indices(8), vec![5, 1, 3]);
        assert_eq!(ids.len(8), 3);
        assert!(!ids.is_all());
    }

    #[test]
    fn empty_subset() {
        let ids = EnvIds::Subset(vec![]);
        assert!(ids.is_empty(8));
        assert_eq!(ids.indices(8), Vec::<usize>::new());
    }

    #[test]
    fn contains() {
        let ids = EnvIds::Subset(vec![0, 2]);
        assert!(ids.contains(0));
        assert!(!ids.contains(1));
        assert!(EnvIds::All.contains(7));
    }

    #[test]
    fn from_vec_and_slice() {
        let from_vec = EnvIds::from(vec![1, 2]);
        let from_slice = EnvIds::from(&[1usize, 2][..]);
        assert_eq!(from_vec, from_slice);
    }

    #[test]
    fn serialize_roundtrip() {
        let ids = EnvIds::Subset(vec![0, 3, 7]);
        let json = serde_json::to_string(&ids).unwrap();
        let ids2: EnvIds = serde_json::from_str(&json).unwrap();
        assert_eq!(ids, ids2);

        let all = EnvIds::All;
        let json = serde_json::to_string(&all).unwrap();
        let all2: EnvIds = serde_json::from_str(&json).unwrap();
        assert_eq!(all, all2);
    }
}
