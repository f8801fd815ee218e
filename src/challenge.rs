//! Relaunching finished challenges.
//!
//! Every challenge whose deadline has passed is archived and copied into a
//! fresh, inactive challenge due on the Sunday two weeks after the coming
//! one. Copies wait in review until an admin validates, edits or discards
//! them.

use chrono::DateTime;
use chrono::Datelike;
use chrono::Days;
use chrono::NaiveTime;
use chrono::SecondsFormat;
use chrono::Utc;
use docstore::Batch;
use docstore::Direction;
use docstore::Document;
use docstore::DocumentStore;
use docstore::Fields;
use docstore::Filter;
use docstore::Query;
use docstore::StoreError;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use tracing::info;
use tracing::warn;

pub const CHALLENGES: &str = "challenges";

/// Station challenges run on their own schedule and are never relaunched.
pub const STATION_KIND: &str = "station";

pub const PENDING_STATUS: &str = "non_active";
pub const ACTIVE_STATUS: &str = "active";

/// Fields a relaunched copy never inherits from its original.
const COPY_EXCLUDED: [&str; 6] = ["participantsCount", "createdAt", "updatedAt", "deadline", "archived", "id"];

#[derive(Debug, thiserror::Error)]
pub enum RelaunchError {
    #[error("challenge {0} not found")]
    NotFound(String),

    #[error("challenge {0} is not a pending relaunch")]
    NotPending(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Midnight UTC on the Sunday two weeks after the next Sunday.
/// On a Sunday, the next Sunday is a week away.
pub fn next_sunday_in_two_weeks(now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive();
    let from_sunday = today.weekday().num_days_from_sunday();
    let until_sunday = if from_sunday == 0 { 7 } else { 7 - from_sunday };
    let day = today + Days::new(u64::from(until_sunday) + 14);
    return day.and_time(NaiveTime::MIN).and_utc();
}

/// Read a stored timestamp: an RFC 3339 string, epoch milliseconds, or a
/// `{ seconds, nanoseconds }` object.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    return match value {
        Value::String(text) => DateTime::parse_from_rfc3339(text).ok().map(|t| t.with_timezone(&Utc)),
        Value::Number(millis) => millis.as_i64().and_then(DateTime::from_timestamp_millis),
        Value::Object(map) => {
            let seconds = map.get("seconds").or_else(|| map.get("_seconds")).and_then(Value::as_i64)?;
            let nanos = map
                .get("nanoseconds")
                .or_else(|| map.get("_nanoseconds"))
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(0);
            DateTime::from_timestamp(seconds, nanos)
        }
        _ => None,
    };
}

fn iso(time: DateTime<Utc>) -> String {
    return time.to_rfc3339_opts(SecondsFormat::Millis, true);
}

/// The label shown for a challenge: its title, else its name, else its id.
pub fn challenge_title(doc: &Document) -> String {
    return doc
        .str_field("title")
        .filter(|t| !t.is_empty())
        .or_else(|| doc.str_field("name").filter(|n| !n.is_empty()))
        .unwrap_or(doc.id.as_str())
        .to_string();
}

/// Whether a challenge is finished and eligible for a relaunch.
/// A missing or unreadable deadline is never eligible.
pub fn is_relaunchable(doc: &Document, now: DateTime<Utc>) -> bool {
    if doc.bool_field("archived") == Some(true) || doc.str_field("kind") == Some(STATION_KIND) {
        return false;
    }
    return match doc.get("deadline").and_then(parse_timestamp) {
        Some(deadline) => deadline < now,
        None => false,
    };
}

/// The fields of the relaunched copy of `doc`.
pub fn relaunch_copy(doc: &Document, deadline: DateTime<Utc>, now: DateTime<Utc>) -> Fields {
    let mut copy: Fields = doc
        .fields
        .iter()
        .filter(|(key, _)| !COPY_EXCLUDED.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let now = iso(now);
    copy.insert("participantsCount".to_string(), json!(0));
    copy.insert("status".to_string(), json!(PENDING_STATUS));
    copy.insert("archived".to_string(), json!(false));
    copy.insert("deadline".to_string(), json!(iso(deadline)));
    copy.insert("createdAt".to_string(), json!(now));
    copy.insert("updatedAt".to_string(), json!(now));
    copy.insert("originalChallengeId".to_string(), json!(doc.id));
    return copy;
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlannedRelaunch {
    pub original_id: String,
    pub title: String,
    pub copy: Fields,
}

/// The relaunches due at one instant, all sharing one new deadline.
///
/// `finished` counts every challenge whose deadline has passed, including
/// archived and station challenges that are not relaunched.
#[derive(Clone, Debug, PartialEq)]
pub struct RelaunchPlan {
    pub deadline: DateTime<Utc>,
    pub finished: usize,
    pub relaunches: Vec<PlannedRelaunch>,
}

/// Select the finished challenges among `challenges` and prepare their copies.
pub fn plan_relaunch(challenges: &[Document], now: DateTime<Utc>) -> RelaunchPlan {
    let deadline = next_sunday_in_two_weeks(now);
    let mut relaunches = Vec::new();
    let mut finished = 0;

    for doc in challenges {
        match doc.get("deadline").map(parse_timestamp) {
            Some(None) => {
                warn!(challenge = %doc.id, "unreadable deadline, skipping");
                continue;
            }
            Some(Some(due)) if due < now => finished += 1,
            _ => {}
        }
        if !is_relaunchable(doc, now) {
            continue;
        }
        relaunches.push(PlannedRelaunch {
            original_id: doc.id.clone(),
            title: challenge_title(doc),
            copy: relaunch_copy(doc, deadline, now),
        });
    }

    return RelaunchPlan { deadline, finished, relaunches };
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelaunchResult {
    pub original_id: String,
    pub new_id: String,
    pub title: String,
    pub new_deadline: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelaunchReport {
    pub message: String,
    pub processed: usize,
    pub results: Vec<RelaunchResult>,
}

impl RelaunchReport {
    /// The empty-run message is reserved for a run that found no challenge
    /// past its deadline at all. Finished challenges that were all skipped
    /// still report `Processed 0 challenge(s)`.
    fn new(finished: usize, results: Vec<RelaunchResult>) -> RelaunchReport {
        let message = if finished == 0 {
            "No finished challenges to process".to_string()
        } else {
            format!("Processed {} challenge(s)", results.len())
        };
        return RelaunchReport { message, processed: results.len(), results };
    }
}

/// Archive every finished challenge and create its relaunch, in one batch.
pub fn relaunch<S: DocumentStore>(store: &mut S, now: DateTime<Utc>) -> Result<RelaunchReport, RelaunchError> {
    let challenges = store.query(CHALLENGES, &Query::new())?;
    let plan = plan_relaunch(&challenges, now);
    let finished = plan.finished;
    let new_deadline = iso(plan.deadline);
    let updated_at = json!(iso(now));

    let mut batch = Batch::new();
    let mut results = Vec::with_capacity(plan.relaunches.len());
    for planned in plan.relaunches {
        let mut archive = Fields::new();
        archive.insert("archived".to_string(), json!(true));
        archive.insert("updatedAt".to_string(), updated_at.clone());
        batch.update(CHALLENGES, &planned.original_id, archive);

        let new_id = store.new_id(CHALLENGES);
        batch.set(CHALLENGES, &new_id, planned.copy);
        results.push(RelaunchResult {
            original_id: planned.original_id,
            new_id,
            title: planned.title,
            new_deadline: new_deadline.clone(),
        });
    }

    if !batch.is_empty() {
        store.commit(batch)?;
    }

    let report = RelaunchReport::new(finished, results);
    info!(processed = report.processed, deadline = %new_deadline, "relaunched challenges");
    return Ok(report);
}

/// A relaunched copy waiting for review.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingRelaunch {
    pub id: String,
    pub original_id: String,
    pub title: String,
    pub document: Document,
}

fn is_pending(doc: &Document) -> bool {
    return doc.str_field("status") == Some(PENDING_STATUS)
        && doc.bool_field("archived") == Some(false)
        && doc.str_field("originalChallengeId").is_some();
}

/// Pending relaunches, newest first.
pub fn pending_relaunches<S: DocumentStore>(store: &S) -> Result<Vec<PendingRelaunch>, RelaunchError> {
    let query = Query::new()
        .filter(Filter::eq("status", PENDING_STATUS))
        .filter(Filter::eq("archived", false))
        .order_by("createdAt", Direction::Desc);

    let pending = store
        .query(CHALLENGES, &query)?
        .into_iter()
        .filter(is_pending)
        .map(|document| PendingRelaunch {
            id: document.id.clone(),
            original_id: document.str_field("originalChallengeId").unwrap_or_default().to_string(),
            title: challenge_title(&document),
            document,
        })
        .collect();
    return Ok(pending);
}

fn load_pending<S: DocumentStore>(store: &S, id: &str) -> Result<Document, RelaunchError> {
    let doc = store
        .get(CHALLENGES, id)?
        .ok_or_else(|| RelaunchError::NotFound(id.to_string()))?;
    if !is_pending(&doc) {
        return Err(RelaunchError::NotPending(id.to_string()));
    }
    return Ok(doc);
}

/// Publish a pending relaunch.
pub fn validate_relaunch<S: DocumentStore>(store: &mut S, id: &str, now: DateTime<Utc>) -> Result<(), RelaunchError> {
    load_pending(store, id)?;
    let mut fields = Fields::new();
    fields.insert("status".to_string(), json!(ACTIVE_STATUS));
    fields.insert("updatedAt".to_string(), json!(iso(now)));
    store.update(CHALLENGES, id, fields)?;
    info!(challenge = %id, "validated relaunch");
    return Ok(());
}

/// Delete a pending relaunch.
pub fn discard_relaunch<S: DocumentStore>(store: &mut S, id: &str) -> Result<(), RelaunchError> {
    load_pending(store, id)?;
    store.delete(CHALLENGES, id)?;
    info!(challenge = %id, "discarded relaunch");
    return Ok(());
}

/// Text edits to a pending relaunch. `None` leaves a field unchanged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RelaunchEdits {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub prize: Option<String>,
    pub goal: Option<String>,
}

impl RelaunchEdits {
    fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        let edits = [("title", self.title), ("subtitle", self.subtitle), ("prize", self.prize), ("goal", self.goal)];
        for (key, value) in edits {
            if let Some(value) = value {
                fields.insert(key.to_string(), Value::String(value));
            }
        }
        return fields;
    }
}

/// Merge text edits into a pending relaunch.
pub fn edit_relaunch<S: DocumentStore>(
    store: &mut S,
    id: &str,
    edits: RelaunchEdits,
    now: DateTime<Utc>,
) -> Result<(), RelaunchError> {
    load_pending(store, id)?;
    let mut fields = edits.into_fields();
    if fields.is_empty() {
        return Ok(());
    }
    fields.insert("updatedAt".to_string(), json!(iso(now)));
    store.update(CHALLENGES, id, fields)?;
    return Ok(());
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use docstore::fields;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        return Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap();
    }

    #[test]
    fn next_sunday_from_midweek() {
        // Wednesday 2026-10-14: next Sunday is the 18th, plus two weeks.
        assert_eq!(next_sunday_in_two_weeks(at(2026, 10, 14, 15)), at(2026, 11, 1, 0));
    }

    #[test]
    fn next_sunday_from_sunday_skips_a_week() {
        assert_eq!(next_sunday_in_two_weeks(at(2026, 10, 18, 9)), at(2026, 11, 8, 0));
    }

    #[test]
    fn next_sunday_from_saturday() {
        assert_eq!(next_sunday_in_two_weeks(at(2026, 10, 17, 23)), at(2026, 11, 1, 0));
    }

    #[test]
    fn timestamps_in_every_stored_shape() {
        let expected = at(2026, 1, 2, 3);
        assert_eq!(parse_timestamp(&json!("2026-01-02T03:00:00Z")), Some(expected));
        assert_eq!(parse_timestamp(&json!(expected.timestamp_millis())), Some(expected));
        assert_eq!(parse_timestamp(&json!({ "seconds": expected.timestamp(), "nanoseconds": 0 })), Some(expected));
        assert_eq!(parse_timestamp(&json!("next tuesday")), None);
        assert_eq!(parse_timestamp(&Value::Null), None);
    }

    #[test]
    fn selection_skips_archived_station_and_running() {
        let now = at(2026, 10, 14, 12);
        let challenge = |id: &str, value: Value| Document::new(id, fields(value));
        let docs = vec![
            challenge("done", json!({ "title": "Slalom", "deadline": "2026-10-01T00:00:00Z" })),
            challenge("archived", json!({ "deadline": "2026-10-01T00:00:00Z", "archived": true })),
            challenge("station", json!({ "deadline": "2026-10-01T00:00:00Z", "kind": "station" })),
            challenge("running", json!({ "deadline": "2026-12-01T00:00:00Z" })),
            challenge("undated", json!({ "title": "No deadline" })),
            challenge("garbled", json!({ "deadline": "soon" })),
        ];

        let plan = plan_relaunch(&docs, now);
        let ids: Vec<&str> = plan.relaunches.iter().map(|r| r.original_id.as_str()).collect();
        assert_eq!(ids, vec!["done"]);
        assert_eq!(plan.deadline, at(2026, 11, 1, 0));
        assert_eq!(plan.finished, 3);
    }

    #[test]
    fn copy_resets_counters_and_links_original() {
        let now = at(2026, 10, 14, 12);
        let doc = Document::new("c1", fields(json!({
            "id": "c1",
            "title": "Moguls",
            "goal": "10 runs",
            "participantsCount": 42,
            "archived": false,
            "status": "active",
            "deadline": "2026-10-01T00:00:00Z",
            "createdAt": "2026-09-01T00:00:00Z",
        })));

        let copy = relaunch_copy(&doc, next_sunday_in_two_weeks(now), now);
        assert_eq!(copy["title"], json!("Moguls"));
        assert_eq!(copy["goal"], json!("10 runs"));
        assert_eq!(copy["participantsCount"], json!(0));
        assert_eq!(copy["status"], json!(PENDING_STATUS));
        assert_eq!(copy["archived"], json!(false));
        assert_eq!(copy["deadline"], json!("2026-11-01T00:00:00.000Z"));
        assert_eq!(copy["originalChallengeId"], json!("c1"));
        assert_eq!(copy["createdAt"], json!("2026-10-14T12:00:00.000Z"));
        assert!(!copy.contains_key("id"));
    }

    #[test]
    fn title_falls_back_to_name_then_id() {
        let titled = Document::new("c1", fields(json!({ "title": "A", "name": "B" })));
        let named = Document::new("c2", fields(json!({ "name": "B" })));
        let bare = Document::new("c3", Fields::new());
        assert_eq!(challenge_title(&titled), "A");
        assert_eq!(challenge_title(&named), "B");
        assert_eq!(challenge_title(&bare), "c3");
    }

    #[test]
    fn report_message() {
        assert_eq!(RelaunchReport::new(0, Vec::new()).message, "No finished challenges to process");
        assert_eq!(RelaunchReport::new(3, Vec::new()).message, "Processed 0 challenge(s)");
        let one = RelaunchResult {
            original_id: "a".into(),
            new_id: "b".into(),
            title: "t".into(),
            new_deadline: "d".into(),
        };
        let report = RelaunchReport::new(1, vec![one]);
        assert_eq!(report.message, "Processed 1 challenge(s)");
        assert_eq!(serde_json::to_value(&report).unwrap()["results"][0]["originalId"], json!("a"));
    }

    #[test]
    fn empty_edits_write_nothing() {
        assert!(RelaunchEdits::default().into_fields().is_empty());
        let edits = RelaunchEdits { prize: Some("Goggles".into()), ..RelaunchEdits::default() };
        assert_eq!(edits.into_fields(), fields(json!({ "prize": "Goggles" })));
    }
}
