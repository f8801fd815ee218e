//! Identity of one-to-one conversations.
//!
//! A direct conversation between two users is keyed by their sorted ids
//! joined with `__`, so either side computes the same key. Conversations
//! written before the key existed are found by scanning the caller's
//! conversations for one that holds both users and looks direct.

use chrono::Utc;
use docstore::Document;
use docstore::DocumentStore;
use docstore::Fields;
use docstore::Filter;
use docstore::Query;
use docstore::StoreError;
use serde_json::Value;
use serde_json::json;
use tracing::debug;
use tracing::info;

pub const CONVERSATIONS: &str = "conversations";

const PAIR_SEPARATOR: &str = "__";

#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    #[error("missing user id")]
    MissingUser,

    #[error("both users are the same: {0}")]
    SameUser(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One side of a conversation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Participant {
    pub id: String,
    pub display_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub photo_url: Option<String>,
    pub frequence: u64,
}

impl Participant {
    pub fn new(id: impl Into<String>) -> Participant {
        return Participant { id: id.into(), ..Participant::default() };
    }

    /// Display name, else "first last", else empty.
    pub fn name(&self) -> String {
        if let Some(name) = self.display_name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        let first = self.first_name.as_deref().unwrap_or_default();
        let last = self.last_name.as_deref().unwrap_or_default();
        return format!("{} {}", first, last).trim().to_string();
    }

    fn photo(&self) -> &str {
        return self.photo_url.as_deref().unwrap_or_default();
    }
}

/// The conversation an `open_direct` call resolved to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationHandle {
    pub id: String,
    pub created: bool,
}

/// The order-independent key of the conversation between `a` and `b`.
pub fn pair_key(a: &str, b: &str) -> Result<String, ConversationError> {
    if a.is_empty() || b.is_empty() {
        return Err(ConversationError::MissingUser);
    }
    if a == b {
        return Err(ConversationError::SameUser(a.to_string()));
    }
    let (low, high) = if a < b { (a, b) } else { (b, a) };
    return Ok(format!("{}{}{}", low, PAIR_SEPARATOR, high));
}

/// Whether a stored conversation is the direct conversation of `a` and `b`.
///
/// Both users must be participants, and the record must say it is direct:
/// a two-person flag, the same pair key, or the older `type: "direct"`.
pub fn is_direct_match(doc: &Document, a: &str, b: &str, key: &str) -> bool {
    let participants = doc.str_array("participants");
    if !participants.contains(&a) || !participants.contains(&b) {
        return false;
    }

    let two_person = doc.str_field("kind") == Some("two_person") || doc.bool_field("isTwoPeople") == Some(true);
    let same_key = doc.str_field("pairKey") == Some(key);
    let direct = doc.str_field("type") == Some("direct");
    return two_person || same_key || direct;
}

/// The id of the other participant, looking at `members`, then
/// `participantsMap`, then `memberIds`.
///
/// `participantsMap` is keyed by user id; a `uid` stored inside an entry is
/// not consulted.
pub fn other_participant(doc: &Document, self_id: &str) -> Option<String> {
    if let Some(Value::Array(members)) = doc.get("members") {
        let other = members
            .iter()
            .filter_map(|m| m.get("id").and_then(Value::as_str))
            .find(|id| *id != self_id);
        if let Some(id) = other {
            return Some(id.to_string());
        }
    }

    if let Some(Value::Object(map)) = doc.get("participantsMap") {
        if let Some(key) = map.keys().find(|k| k.as_str() != self_id) {
            return Some(key.clone());
        }
    }

    return doc
        .str_array("memberIds")
        .into_iter()
        .find(|id| *id != self_id)
        .map(str::to_string);
}

/// Find the direct conversation between two users, creating it if needed.
pub fn open_direct<S: DocumentStore>(
    store: &mut S,
    current: &Participant,
    other: &Participant,
) -> Result<ConversationHandle, ConversationError> {
    let key = pair_key(&current.id, &other.id)?;

    let by_key = store.query(CONVERSATIONS, &Query::new().filter(Filter::eq("pairKey", key.as_str())).limit(1))?;
    if let Some(doc) = by_key.into_iter().next() {
        debug!(conversation = %doc.id, pair = %key, "found conversation by pair key");
        return Ok(ConversationHandle { id: doc.id, created: false });
    }

    let candidates = store.query(
        CONVERSATIONS,
        &Query::new().filter(Filter::array_contains("participants", current.id.as_str())),
    )?;
    if let Some(doc) = candidates
        .into_iter()
        .find(|doc| is_direct_match(doc, &current.id, &other.id, &key))
    {
        debug!(conversation = %doc.id, pair = %key, "found legacy conversation");
        return Ok(ConversationHandle { id: doc.id, created: false });
    }

    let fields = new_conversation(current, other, &key, &Utc::now().to_rfc3339());
    let id = store.insert(CONVERSATIONS, fields)?;
    info!(conversation = %id, pair = %key, "created conversation");
    return Ok(ConversationHandle { id, created: true });
}

fn new_conversation(current: &Participant, other: &Participant, key: &str, now: &str) -> Fields {
    let mut participants = [current.id.as_str(), other.id.as_str()];
    participants.sort_unstable();

    let mut participants_map = Fields::new();
    for p in [current, other] {
        participants_map.insert(p.id.clone(), json!({
            "uid": p.id,
            "name": p.name(),
            "photoURL": p.photo(),
        }));
    }

    let member = |p: &Participant| {
        return json!({
            "id": p.id,
            "frequence": p.frequence,
            "name": p.name(),
            "imageURL": p.photo(),
        });
    };

    return docstore::fields(json!({
        "kind": "two_person",
        "isTwoPeople": true,
        "type": "direct",
        "participants": participants,
        "participantsMap": participants_map,
        "pairKey": key,
        "createdAt": now,
        "updatedAt": now,
        "lastMessage": {
            "text": null,
            "createdAt": null,
            "seenBy": [],
            "senderId": null,
        },
        "memberIds": [current.id, other.id],
        "members": [member(other), member(current)],
    }));
}
