//! The ranker: placement, moves, materialization and renumbering.
//!
//! All operations are pure functions of a caller-owned snapshot. The
//! algorithm:
//! 1. Normalize: items without a rank get a placeholder past every ranked
//!    item, spaced by `GAP` in `sequence_hint` order. A fully legacy list
//!    reads as `GAP, 2 * GAP, 3 * GAP, ...`.
//! 2. Sort by effective rank, then `sequence_hint`, then id.
//! 3. Resolve the placement against the sorted slots: one `GAP` beyond
//!    either end, or the midpoint between a target and its successor.
//!
//! A computed rank that does not land strictly between its bounds means
//! precision ran out, reported as `RankError::RankExhausted`.

use std::cmp::Ordering;

use rustc_hash::FxHashSet;
use tracing::debug;
use tracing::warn;

use super::Placement;
use super::RankError;
use super::RankedItem;
use super::TargetPolicy;
use super::op::RankWrite;
use crate::config::ConfigError;
use crate::config::RankerConfig;

/// Default spacing between ranks assigned at either end of a list.
pub const GAP: f64 = 10.0;

/// An item with its effective rank resolved.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Slot<'a> {
    pub id: &'a str,
    pub rank: f64,
    pub sequence_hint: usize,
}

/// A one-position move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Up,
    Down,
}

fn compare_slots(a: &Slot, b: &Slot) -> Ordering {
    return a
        .rank
        .total_cmp(&b.rank)
        .then(a.sequence_hint.cmp(&b.sequence_hint))
        .then_with(|| a.id.cmp(b.id));
}

/// Computes ranks for a flat, externally stored collection.
#[derive(Clone, Debug, PartialEq)]
pub struct Ranker {
    gap: f64,
    target_policy: TargetPolicy,
}

impl Default for Ranker {
    fn default() -> Self {
        return Ranker {
            gap: GAP,
            target_policy: TargetPolicy::default(),
        };
    }
}

impl Ranker {
    /// Build a ranker from a validated configuration.
    pub fn new(config: &RankerConfig) -> Result<Ranker, ConfigError> {
        config.validate()?;
        return Ok(Ranker {
            gap: config.gap,
            target_policy: config.target_policy,
        });
    }

    pub fn gap(&self) -> f64 {
        return self.gap;
    }

    pub fn target_policy(&self) -> TargetPolicy {
        return self.target_policy;
    }

    /// Resolve every item's effective rank and sort.
    pub fn normalize<'a>(&self, items: &'a [RankedItem]) -> Vec<Slot<'a>> {
        let base = items
            .iter()
            .filter_map(RankedItem::stored_rank)
            .reduce(f64::max)
            .unwrap_or(0.0);

        let mut slots: Vec<Slot<'a>> = items
            .iter()
            .map(|item| {
                let rank = match item.stored_rank() {
                    Some(rank) => rank,
                    None => base + (item.sequence_hint as f64 + 1.0) * self.gap,
                };
                return Slot { id: &item.id, rank, sequence_hint: item.sequence_hint };
            })
            .collect();
        slots.sort_by(compare_slots);
        return slots;
    }

    /// Compute the rank of a new item.
    pub fn place(&self, items: &[RankedItem], placement: &Placement) -> Result<f64, RankError> {
        let slots = self.normalize(items);
        return self.resolve(&slots, placement);
    }

    /// Compute a new rank for an item already in `items`.
    ///
    /// The subject's current position is ignored while resolving, so
    /// `After(x)` lands between `x` and whatever else follows it.
    pub fn place_item(
        &self,
        items: &[RankedItem],
        subject: &str,
        placement: &Placement,
    ) -> Result<f64, RankError> {
        if let Placement::After(target) = placement {
            if target == subject {
                return Err(RankError::invalid(format!("item {} cannot be placed after itself", subject)));
            }
        }
        if !items.iter().any(|item| item.id == subject) {
            return Err(RankError::UnknownItem { id: subject.to_string() });
        }

        let slots: Vec<Slot> = self
            .normalize(items)
            .into_iter()
            .filter(|slot| slot.id != subject)
            .collect();
        return self.resolve(&slots, placement);
    }

    /// The placement that moves `subject` one position.
    /// `None` when it is already at that end of the list.
    pub fn step_placement(
        &self,
        items: &[RankedItem],
        subject: &str,
        step: Step,
    ) -> Result<Option<Placement>, RankError> {
        let slots = self.normalize(items);
        let index = slots
            .iter()
            .position(|slot| slot.id == subject)
            .ok_or_else(|| RankError::UnknownItem { id: subject.to_string() })?;

        let placement = match step {
            Step::Up if index == 0 => None,
            Step::Up if index == 1 => Some(Placement::Start),
            Step::Up => Some(Placement::after(slots[index - 2].id)),
            Step::Down => slots.get(index + 1).map(|next| Placement::after(next.id)),
        };
        return Ok(placement);
    }

    /// Rank that moves `subject` one position up, if it is not already first.
    pub fn move_up(&self, items: &[RankedItem], subject: &str) -> Result<Option<f64>, RankError> {
        return self.move_item(items, subject, Step::Up);
    }

    /// Rank that moves `subject` one position down, if it is not already last.
    pub fn move_down(&self, items: &[RankedItem], subject: &str) -> Result<Option<f64>, RankError> {
        return self.move_item(items, subject, Step::Down);
    }

    fn move_item(&self, items: &[RankedItem], subject: &str, step: Step) -> Result<Option<f64>, RankError> {
        return match self.step_placement(items, subject, step)? {
            Some(placement) => self.place_item(items, subject, &placement).map(Some),
            None => Ok(None),
        };
    }

    /// The ids of `items` in display order.
    pub fn materialize_order(&self, items: &[RankedItem]) -> Vec<String> {
        return self
            .normalize(items)
            .into_iter()
            .map(|slot| slot.id.to_string())
            .collect();
    }

    /// The placeholder ranks of the items that have none, in display order.
    ///
    /// Persisting these pins legacy items where they currently sort, so a
    /// later placement cannot shift them.
    pub fn placeholders(&self, items: &[RankedItem]) -> Vec<RankWrite> {
        let unranked: FxHashSet<&str> = items
            .iter()
            .filter(|item| item.stored_rank().is_none())
            .map(|item| item.id.as_str())
            .collect();
        if unranked.is_empty() {
            return Vec::new();
        }

        return self
            .normalize(items)
            .into_iter()
            .filter(|slot| unranked.contains(slot.id))
            .map(|slot| RankWrite { id: slot.id.to_string(), rank: slot.rank })
            .collect();
    }

    /// Fresh, evenly spaced ranks for every item, keeping the current order.
    ///
    /// Fails with `RankExhausted` when the collection is too long for the
    /// gap, so that `len * gap` would overflow.
    pub fn renumber(&self, items: &[RankedItem]) -> Result<Vec<RankWrite>, RankError> {
        let mut fresh = Vec::with_capacity(items.len());
        let mut previous = None;
        for (i, slot) in self.normalize(items).into_iter().enumerate() {
            let rank = checked((i as f64 + 1.0) * self.gap, previous, None)?;
            fresh.push(RankWrite { id: slot.id.to_string(), rank });
            previous = Some(rank);
        }
        return Ok(fresh);
    }

    fn resolve(&self, slots: &[Slot], placement: &Placement) -> Result<f64, RankError> {
        let rank = match placement {
            Placement::Start => match slots.first() {
                Some(first) => checked(first.rank - self.gap, None, Some(first.rank))?,
                None => self.gap,
            },
            Placement::End => self.after_last(slots)?,
            Placement::After(target) => match slots.iter().position(|slot| slot.id == target) {
                Some(index) => {
                    let lower = slots[index].rank;
                    match slots.get(index + 1) {
                        Some(next) => checked((lower + next.rank) / 2.0, Some(lower), Some(next.rank))?,
                        None => checked(lower + self.gap, Some(lower), None)?,
                    }
                }
                None => match self.target_policy {
                    TargetPolicy::Strict => {
                        return Err(RankError::invalid(format!("target {} not found", target)));
                    }
                    TargetPolicy::FallbackToEnd => {
                        warn!(target_id = %target, "placement target not found, placing at end");
                        self.after_last(slots)?
                    }
                },
            },
            Placement::Explicit(value) => {
                if !value.is_finite() {
                    return Err(RankError::invalid(format!("explicit rank {} is not finite", value)));
                }
                *value
            }
        };

        debug!(?placement, rank, items = slots.len(), "resolved placement");
        return Ok(rank);
    }

    fn after_last(&self, slots: &[Slot]) -> Result<f64, RankError> {
        return match slots.last() {
            Some(last) => checked(last.rank + self.gap, Some(last.rank), None),
            None => Ok(self.gap),
        };
    }
}

/// Accept `candidate` only if it is finite and strictly inside its bounds.
fn checked(candidate: f64, lower: Option<f64>, upper: Option<f64>) -> Result<f64, RankError> {
    let above = lower.is_none_or(|l| candidate > l);
    let below = upper.is_none_or(|u| candidate < u);
    if candidate.is_finite() && above && below {
        return Ok(candidate);
    }
    return Err(RankError::RankExhausted { lower, upper });
}

/// `Ranker::materialize_order` with the default gap.
pub fn materialize_order(items: &[RankedItem]) -> Vec<String> {
    return Ranker::default().materialize_order(items);
}
