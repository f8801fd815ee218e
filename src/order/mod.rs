//! Fractional-index ordering for admin-reorderable lists.
//!
//! Every item in an ordered collection carries a numeric rank that is only
//! ever compared, never interpreted. New positions are found by taking the
//! midpoint between two neighbors, or by stepping one `GAP` past either end,
//! so placing an item writes exactly one rank.

mod op;
pub mod rank;

use serde::Deserialize;
use serde::Serialize;

pub use op::ChangeSet;
pub use op::RankWrite;
pub use rank::GAP;
pub use rank::Ranker;
pub use rank::Slot;
pub use rank::Step;
pub use rank::materialize_order;

/// An item of an ordered collection, as read from the store.
#[derive(Clone, Debug, PartialEq)]
pub struct RankedItem {
    pub id: String,
    /// The stored rank. `None` for legacy items that were never ranked.
    pub rank: Option<f64>,
    /// Position of the item in the parent's explicit id list.
    pub sequence_hint: usize,
}

impl RankedItem {
    pub fn new(id: impl Into<String>, rank: Option<f64>, sequence_hint: usize) -> RankedItem {
        return RankedItem { id: id.into(), rank, sequence_hint };
    }

    pub fn ranked(id: impl Into<String>, rank: f64, sequence_hint: usize) -> RankedItem {
        return RankedItem::new(id, Some(rank), sequence_hint);
    }

    pub fn unranked(id: impl Into<String>, sequence_hint: usize) -> RankedItem {
        return RankedItem::new(id, None, sequence_hint);
    }

    /// The stored rank, ignoring values that cannot be ordered.
    pub fn stored_rank(&self) -> Option<f64> {
        return self.rank.filter(|rank| rank.is_finite());
    }
}

/// Where to put an item.
#[derive(Clone, Debug, PartialEq)]
pub enum Placement {
    /// Before the first item.
    Start,
    /// After the last item.
    End,
    /// Immediately after the item with this id.
    After(String),
    /// Use this rank as-is.
    Explicit(f64),
}

impl Placement {
    pub fn after(id: impl Into<String>) -> Placement {
        return Placement::After(id.into());
    }
}

/// What `After` does when its target is not in the snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetPolicy {
    /// Place the item at the end, and log it.
    #[default]
    FallbackToEnd,
    /// Reject the placement.
    Strict,
}

/// Errors from computing a rank.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum RankError {
    /// The request cannot be satisfied as asked.
    #[error("invalid placement: {reason}")]
    InvalidPlacement { reason: String },

    /// No representable rank lies strictly between the neighbors.
    /// The collection needs a renumbering pass.
    #[error("rank precision exhausted between {lower:?} and {upper:?}")]
    RankExhausted { lower: Option<f64>, upper: Option<f64> },

    /// The subject of a move is not part of the collection.
    #[error("item {id} is not in the collection")]
    UnknownItem { id: String },
}

impl RankError {
    pub(crate) fn invalid(reason: impl Into<String>) -> RankError {
        return RankError::InvalidPlacement { reason: reason.into() };
    }
}
