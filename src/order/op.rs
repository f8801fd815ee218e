//! The writes a collection mutation asks the caller to persist.
//!
//! The ranker never touches the store. A mutation produces a `ChangeSet`:
//! - Rank writes: normally one, for the item that moved or was created.
//!   Pinning legacy placeholders or a renumbering pass adds more.
//! - The regenerated explicit order of the parent, replaced wholesale.
//! - The removed item, for deletions.

use smallvec::SmallVec;

/// A new rank for one item.
#[derive(Clone, Debug, PartialEq)]
pub struct RankWrite {
    pub id: String,
    pub rank: f64,
}

/// Everything one mutation needs written back.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChangeSet {
    /// Rank writes, the subject's last.
    pub ranks: SmallVec<[RankWrite; 1]>,
    /// The parent's full ordered id list after the mutation.
    pub member_ids: Vec<String>,
    /// The item removed from the collection, if any.
    pub removed: Option<String>,
    /// Set when every rank was reassigned to recover precision.
    pub renumbered: bool,
}

impl ChangeSet {
    /// The new rank written for an item, if this change set writes one.
    pub fn rank_of(&self, id: &str) -> Option<f64> {
        return self.ranks.iter().rev().find(|w| w.id == id).map(|w| w.rank);
    }

    /// The rank assigned to the subject of the mutation.
    pub fn subject_rank(&self) -> Option<f64> {
        return self.ranks.last().map(|w| w.rank);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn subject_is_last_write() {
        let changes = ChangeSet {
            ranks: smallvec![
                RankWrite { id: "a".into(), rank: 10.0 },
                RankWrite { id: "b".into(), rank: 20.0 },
            ],
            member_ids: vec!["a".into(), "b".into()],
            removed: None,
            renumbered: true,
        };
        assert_eq!(changes.subject_rank(), Some(20.0));
        assert_eq!(changes.rank_of("a"), Some(10.0));
        assert_eq!(changes.rank_of("c"), None);
    }

    #[test]
    fn removal_has_no_rank_writes() {
        let changes = ChangeSet {
            removed: Some("a".into()),
            ..ChangeSet::default()
        };
        assert!(changes.ranks.is_empty());
        assert_eq!(changes.subject_rank(), None);
    }
}
