//! Academy - ordering core and admin workflows for a ski-coaching backoffice.
//!
//! # Quick Start
//!
//! ```
//! use academy::order::{Placement, RankedItem, Ranker};
//!
//! let ranker = Ranker::default();
//! let items = vec![
//!     RankedItem::ranked("warmup", 10.0, 0),
//!     RankedItem::ranked("carving", 20.0, 1),
//! ];
//!
//! // Slot a new drill between the two existing ones
//! let rank = ranker.place(&items, &Placement::after("warmup")).unwrap();
//! assert_eq!(rank, 15.0);
//! ```
//!
//! Sessions, conversations, challenges and their posts are persisted through the
//! [`docstore::DocumentStore`] trait; [`docstore::MemoryStore`] backs tests.

pub mod challenge;
pub mod collection;
pub mod config;
pub mod conversation;
pub mod curriculum;
pub mod moderation;
pub mod order;

pub use docstore;
