//! A parent record whose children are kept in rank order.
//!
//! The parent stores an explicit list of child ids (`member_ids`) so that
//! readers without rank-aware sorting can trust positional order. Every
//! mutation here recomputes a rank with the `Ranker`, regenerates the list,
//! and returns the `ChangeSet` the caller must persist.
//!
//! The first mutation of a list that still has unranked (legacy) members
//! also writes their placeholder ranks, so their position no longer depends
//! on the ranks around them.

use rustc_hash::FxHashMap;
use tracing::info;
use tracing::warn;

use crate::order::ChangeSet;
use crate::order::Placement;
use crate::order::RankError;
use crate::order::RankWrite;
use crate::order::RankedItem;
use crate::order::Ranker;
use crate::order::Step;

/// A child record as stored: its id and its rank, if any.
#[derive(Clone, Debug, PartialEq)]
pub struct Member {
    pub id: String,
    pub rank: Option<f64>,
}

impl Member {
    pub fn new(id: impl Into<String>, rank: Option<f64>) -> Member {
        return Member { id: id.into(), rank };
    }
}

/// The parent record of an ordered collection.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrderedCollection {
    pub id: String,
    pub member_ids: Vec<String>,
}

impl OrderedCollection {
    pub fn new(id: impl Into<String>, member_ids: Vec<String>) -> OrderedCollection {
        return OrderedCollection { id: id.into(), member_ids };
    }

    /// Ranked items for `members`, hinted by their position in `member_ids`.
    ///
    /// Members missing from the list are hinted after it, in input order.
    /// Listed ids with no matching member are ignored.
    pub fn snapshot(&self, members: &[Member]) -> Vec<RankedItem> {
        let index: FxHashMap<&str, usize> = self
            .member_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let mut next = self.member_ids.len();
        return members
            .iter()
            .map(|member| {
                let hint = match index.get(member.id.as_str()) {
                    Some(&i) => i,
                    None => {
                        next += 1;
                        next - 1
                    }
                };
                return RankedItem::new(member.id.clone(), member.rank, hint);
            })
            .collect();
    }

    /// Add a new member at `placement`.
    pub fn insert(
        &mut self,
        ranker: &Ranker,
        members: &[Member],
        new_id: &str,
        placement: &Placement,
    ) -> Result<ChangeSet, RankError> {
        if members.iter().any(|m| m.id == new_id) {
            return Err(RankError::invalid(format!("{} is already in {}", new_id, self.id)));
        }
        let items = self.snapshot(members);
        return self.apply(ranker, items, new_id, |items| ranker.place(items, placement));
    }

    /// Move an existing member to `placement`.
    pub fn reposition(
        &mut self,
        ranker: &Ranker,
        members: &[Member],
        id: &str,
        placement: &Placement,
    ) -> Result<ChangeSet, RankError> {
        let items = self.snapshot(members);
        return self.apply(ranker, items, id, |items| ranker.place_item(items, id, placement));
    }

    /// Overwrite a member's rank with a value the admin typed in.
    pub fn set_rank(
        &mut self,
        ranker: &Ranker,
        members: &[Member],
        id: &str,
        rank: f64,
    ) -> Result<ChangeSet, RankError> {
        return self.reposition(ranker, members, id, &Placement::Explicit(rank));
    }

    /// Swap a member with its predecessor. `None` if it is already first.
    pub fn move_up(
        &mut self,
        ranker: &Ranker,
        members: &[Member],
        id: &str,
    ) -> Result<Option<ChangeSet>, RankError> {
        return self.step(ranker, members, id, Step::Up);
    }

    /// Swap a member with its successor. `None` if it is already last.
    pub fn move_down(
        &mut self,
        ranker: &Ranker,
        members: &[Member],
        id: &str,
    ) -> Result<Option<ChangeSet>, RankError> {
        return self.step(ranker, members, id, Step::Down);
    }

    /// Drop a member and prune it from `member_ids`.
    pub fn remove(&mut self, ranker: &Ranker, members: &[Member], id: &str) -> Result<ChangeSet, RankError> {
        let mut items = self.snapshot(members);
        let before = items.len();
        items.retain(|item| item.id != id);
        if items.len() == before {
            return Err(RankError::UnknownItem { id: id.to_string() });
        }

        self.member_ids = ranker.materialize_order(&items);
        info!(collection = %self.id, removed = %id, remaining = items.len(), "removed member");
        return Ok(ChangeSet {
            member_ids: self.member_ids.clone(),
            removed: Some(id.to_string()),
            ..ChangeSet::default()
        });
    }

    fn step(
        &mut self,
        ranker: &Ranker,
        members: &[Member],
        id: &str,
        step: Step,
    ) -> Result<Option<ChangeSet>, RankError> {
        let items = self.snapshot(members);
        return match ranker.step_placement(&items, id, step)? {
            Some(placement) => {
                let changes = self.apply(ranker, items, id, |items| ranker.place_item(items, id, &placement))?;
                Ok(Some(changes))
            }
            None => Ok(None),
        };
    }

    /// Rank `subject` with `place`, then regenerate `member_ids`.
    ///
    /// Unranked members get their placeholder ranks written alongside, and
    /// running out of precision renumbers the whole collection once.
    fn apply<F>(
        &mut self,
        ranker: &Ranker,
        mut items: Vec<RankedItem>,
        subject: &str,
        place: F,
    ) -> Result<ChangeSet, RankError>
    where
        F: Fn(&[RankedItem]) -> Result<f64, RankError>,
    {
        let mut changes = ChangeSet::default();

        let filled = ranker.placeholders(&items);
        if !filled.is_empty() {
            info!(collection = %self.id, count = filled.len(), "pinning placeholder ranks");
            let by_id: FxHashMap<&str, f64> = filled.iter().map(|w| (w.id.as_str(), w.rank)).collect();
            for item in items.iter_mut() {
                if let Some(&rank) = by_id.get(item.id.as_str()) {
                    item.rank = Some(rank);
                }
            }
            changes.ranks.extend(filled.iter().filter(|w| w.id != subject).cloned());
        }

        let rank = match place(items.as_slice()) {
            Ok(rank) => rank,
            Err(RankError::RankExhausted { lower, upper }) => {
                warn!(
                    collection = %self.id,
                    items = items.len(),
                    ?lower,
                    ?upper,
                    "rank precision exhausted, renumbering collection"
                );
                let fresh = ranker.renumber(&items)?;
                items = fresh
                    .iter()
                    .enumerate()
                    .map(|(i, write)| RankedItem::ranked(write.id.clone(), write.rank, i))
                    .collect();
                changes.renumbered = true;
                changes.ranks.clear();
                changes.ranks.extend(fresh.into_iter().filter(|write| write.id != subject));
                place(items.as_slice())?
            }
            Err(err) => return Err(err),
        };

        match items.iter_mut().find(|item| item.id == subject) {
            Some(item) => item.rank = Some(rank),
            None => {
                let hint = items.iter().map(|item| item.sequence_hint + 1).max().unwrap_or(0);
                items.push(RankedItem::ranked(subject, rank, hint));
            }
        }
        changes.ranks.push(RankWrite { id: subject.to_string(), rank });

        self.member_ids = ranker.materialize_order(&items);
        changes.member_ids = self.member_ids.clone();

        info!(
            collection = %self.id,
            subject = %subject,
            rank,
            writes = changes.ranks.len(),
            renumbered = changes.renumbered,
            "ranked member"
        );
        return Ok(changes);
    }
}
