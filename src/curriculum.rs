//! Curriculum persistence: the sessions of a level and the exercises of a
//! session, each in order.
//!
//! A session (`seances/{id}`) lists its exercises in `seanceExercises`.
//! Older sessions have no list; their exercises are found by querying
//! `exercises` on `sessionId`, sorted by `order`. The first mutation of such
//! a session writes the list, after which it is authoritative.
//!
//! Levels keep no list. Their sessions are the `seances` whose `levelId`
//! names the level, ordered by rank alone.

use chrono::Utc;
use docstore::Batch;
use docstore::Direction;
use docstore::Document;
use docstore::DocumentStore;
use docstore::Fields;
use docstore::Filter;
use docstore::Query;
use docstore::StoreError;
use rustc_hash::FxHashMap;
use rustc_hash::FxHashSet;
use serde_json::Value;
use serde_json::json;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::collection::Member;
use crate::collection::OrderedCollection;
use crate::order::ChangeSet;
use crate::order::Placement;
use crate::order::RankError;
use crate::order::Ranker;

pub const LEVELS: &str = "levels";
pub const EXERCISES: &str = "exercises";
pub const SESSIONS: &str = "seances";
pub const ORDER_FIELD: &str = "order";
pub const MEMBERS_FIELD: &str = "seanceExercises";

/// Difficulty assigned to new exercises unless the draft says otherwise.
pub const DEFAULT_DIFFICULTY: &str = "debutant";

#[derive(Debug, thiserror::Error)]
pub enum CurriculumError {
    #[error("level {0} not found")]
    LevelNotFound(String),

    #[error("session {0} not found")]
    SessionNotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Rank(#[from] RankError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Where a session's exercise list came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExerciseSource {
    /// The session's `seanceExercises` array.
    IdList,
    /// A `sessionId` query, for sessions without the array.
    SessionQuery,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Exercise {
    pub id: String,
    pub title: String,
    pub order: Option<f64>,
    pub document: Document,
}

impl Exercise {
    fn from_document(document: Document) -> Exercise {
        let title = document
            .str_field("titre")
            .or_else(|| document.str_field("title"))
            .unwrap_or_default()
            .to_string();
        return Exercise {
            id: document.id.clone(),
            title,
            order: document.f64_field(ORDER_FIELD),
            document,
        };
    }
}

/// A session with its exercises in display order.
#[derive(Clone, Debug)]
pub struct SessionExercises {
    pub session: Document,
    pub collection: OrderedCollection,
    pub exercises: Vec<Exercise>,
    pub source: ExerciseSource,
}

impl SessionExercises {
    pub fn members(&self) -> Vec<Member> {
        return self
            .exercises
            .iter()
            .map(|exercise| Member::new(exercise.id.clone(), exercise.order))
            .collect();
    }

    pub fn ids(&self) -> Vec<&str> {
        return self.exercises.iter().map(|e| e.id.as_str()).collect();
    }
}

/// A session as listed under its level.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub id: String,
    pub title: String,
    pub order: Option<f64>,
    pub document: Document,
}

impl Session {
    fn from_document(document: Document) -> Session {
        return Session {
            id: document.id.clone(),
            title: document.str_field("title").unwrap_or_default().to_string(),
            order: document.f64_field(ORDER_FIELD),
            document,
        };
    }
}

/// A level with its sessions in display order.
#[derive(Clone, Debug)]
pub struct LevelSessions {
    pub level: Document,
    pub collection: OrderedCollection,
    pub sessions: Vec<Session>,
}

impl LevelSessions {
    pub fn members(&self) -> Vec<Member> {
        return self
            .sessions
            .iter()
            .map(|session| Member::new(session.id.clone(), session.order))
            .collect();
    }

    pub fn ids(&self) -> Vec<&str> {
        return self.sessions.iter().map(|s| s.id.as_str()).collect();
    }
}

/// The editable fields of a new exercise.
#[derive(Clone, Debug, PartialEq)]
pub struct ExerciseDraft {
    pub title: String,
    pub description: String,
    pub difficulty: String,
    pub tags: Vec<String>,
}

impl ExerciseDraft {
    pub fn new(title: impl Into<String>) -> ExerciseDraft {
        return ExerciseDraft {
            title: title.into(),
            description: String::new(),
            difficulty: DEFAULT_DIFFICULTY.to_string(),
            tags: Vec::new(),
        };
    }

    fn into_fields(self, session_id: &str, level_id: Value, order: f64, now: &str) -> Fields {
        return docstore::fields(json!({
            "sessionId": session_id,
            "levelId": level_id,
            "titre": self.title.trim(),
            "order": order,
            "description": self.description.trim(),
            "difficulty": self.difficulty,
            "tags": self.tags,
            "durationSeconds": null,
            "likesCount": 0,
            "commentsCount": 0,
            "isPublished": false,
            "createdAt": now,
            "updatedAt": now,
        }));
    }
}

/// Reads and reorders exercises through a document store.
pub struct CurriculumService<S> {
    store: S,
    ranker: Ranker,
}

impl<S: DocumentStore> CurriculumService<S> {
    pub fn new(store: S, ranker: Ranker) -> CurriculumService<S> {
        return CurriculumService { store, ranker };
    }

    pub fn store(&self) -> &S {
        return &self.store;
    }

    pub fn into_store(self) -> S {
        return self.store;
    }

    /// Load a session and its exercises in display order.
    pub fn load_session(&self, session_id: &str) -> Result<SessionExercises, CurriculumError> {
        let session = self
            .store
            .get(SESSIONS, session_id)?
            .ok_or_else(|| CurriculumError::SessionNotFound(session_id.to_string()))?;

        let listed: Vec<String> = {
            let mut seen = FxHashSet::default();
            session
                .str_array(MEMBERS_FIELD)
                .into_iter()
                .filter(|id| seen.insert(*id))
                .map(str::to_string)
                .collect()
        };

        let (documents, source) = if listed.is_empty() {
            let query = Query::new()
                .filter(Filter::eq("sessionId", session_id))
                .order_by(ORDER_FIELD, Direction::Asc);
            (self.store.query(EXERCISES, &query)?, ExerciseSource::SessionQuery)
        } else {
            let mut documents = Vec::with_capacity(listed.len());
            for id in &listed {
                match self.store.get(EXERCISES, id)? {
                    Some(doc) => documents.push(doc),
                    None => warn!(session = %session_id, exercise = %id, "listed exercise is missing, skipping"),
                }
            }
            (documents, ExerciseSource::IdList)
        };

        let collection = OrderedCollection::new(session_id, listed);
        let mut exercises: Vec<Exercise> = documents.into_iter().map(Exercise::from_document).collect();

        let members: Vec<Member> = exercises.iter().map(|e| Member::new(e.id.clone(), e.order)).collect();
        let position = self.display_positions(&collection, &members);
        exercises.sort_by_key(|e| position.get(&e.id).copied().unwrap_or(usize::MAX));

        debug!(session = %session_id, ?source, exercises = exercises.len(), "loaded session");
        return Ok(SessionExercises { session, collection, exercises, source });
    }

    /// Create an exercise at `placement` and return its id.
    pub fn create_exercise(
        &mut self,
        session_id: &str,
        draft: ExerciseDraft,
        placement: &Placement,
    ) -> Result<String, CurriculumError> {
        if draft.title.trim().is_empty() {
            return Err(CurriculumError::Validation("title is required".to_string()));
        }

        let loaded = self.load_session(session_id)?;
        let members = loaded.members();
        let mut collection = loaded.collection;
        let id = self.store.new_id(EXERCISES);
        let changes = collection.insert(&self.ranker, &members, &id, placement)?;
        let order = changes.rank_of(&id).unwrap_or(self.ranker.gap());

        let level_id = loaded.session.get("levelId").cloned().unwrap_or(Value::Null);
        let now = Utc::now().to_rfc3339();
        let fields = draft.into_fields(session_id, level_id, order, &now);

        self.persist(session_id, &changes, Some((id.as_str(), fields)))?;
        info!(session = %session_id, exercise = %id, order, "created exercise");
        return Ok(id);
    }

    /// Move an exercise to `placement`.
    pub fn reposition_exercise(
        &mut self,
        session_id: &str,
        exercise_id: &str,
        placement: &Placement,
    ) -> Result<ChangeSet, CurriculumError> {
        let changes = self.mutate(session_id, |collection, ranker, members| {
            return collection.reposition(ranker, members, exercise_id, placement).map(Some);
        })?;
        return Ok(changes.unwrap_or_default());
    }

    /// Store an order value typed in by an admin.
    pub fn set_exercise_order(
        &mut self,
        session_id: &str,
        exercise_id: &str,
        order: f64,
    ) -> Result<ChangeSet, CurriculumError> {
        return self.reposition_exercise(session_id, exercise_id, &Placement::Explicit(order));
    }

    /// Move an exercise one position up. `None` if it was already first.
    pub fn move_exercise_up(
        &mut self,
        session_id: &str,
        exercise_id: &str,
    ) -> Result<Option<ChangeSet>, CurriculumError> {
        return self.mutate(session_id, |collection, ranker, members| {
            return collection.move_up(ranker, members, exercise_id);
        });
    }

    /// Move an exercise one position down. `None` if it was already last.
    pub fn move_exercise_down(
        &mut self,
        session_id: &str,
        exercise_id: &str,
    ) -> Result<Option<ChangeSet>, CurriculumError> {
        return self.mutate(session_id, |collection, ranker, members| {
            return collection.move_down(ranker, members, exercise_id);
        });
    }

    /// Delete an exercise and drop it from the session's list.
    pub fn delete_exercise(&mut self, session_id: &str, exercise_id: &str) -> Result<ChangeSet, CurriculumError> {
        let changes = self.mutate(session_id, |collection, ranker, members| {
            return collection.remove(ranker, members, exercise_id).map(Some);
        })?;
        return Ok(changes.unwrap_or_default());
    }

    /// Load a level and its sessions in display order.
    ///
    /// Sessions without an `order` sort after the ranked ones.
    pub fn load_level_sessions(&self, level_id: &str) -> Result<LevelSessions, CurriculumError> {
        let level = self
            .store
            .get(LEVELS, level_id)?
            .ok_or_else(|| CurriculumError::LevelNotFound(level_id.to_string()))?;

        let query = Query::new().filter(Filter::eq("levelId", level_id));
        let mut sessions: Vec<Session> = self
            .store
            .query(SESSIONS, &query)?
            .into_iter()
            .map(Session::from_document)
            .collect();

        let collection = OrderedCollection::new(level_id, Vec::new());
        let members: Vec<Member> = sessions.iter().map(|s| Member::new(s.id.clone(), s.order)).collect();
        let position = self.display_positions(&collection, &members);
        sessions.sort_by_key(|s| position.get(&s.id).copied().unwrap_or(usize::MAX));

        debug!(level = %level_id, sessions = sessions.len(), "loaded level");
        return Ok(LevelSessions { level, collection, sessions });
    }

    /// Create an empty, unpublished session in a level and return its id.
    pub fn create_session(
        &mut self,
        level_id: &str,
        title: &str,
        placement: &Placement,
    ) -> Result<String, CurriculumError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(CurriculumError::Validation("title is required".to_string()));
        }

        let loaded = self.load_level_sessions(level_id)?;
        let members = loaded.members();
        let mut collection = loaded.collection;
        let id = self.store.new_id(SESSIONS);
        let changes = collection.insert(&self.ranker, &members, &id, placement)?;
        let order = changes.rank_of(&id).unwrap_or(self.ranker.gap());

        let now = Utc::now().to_rfc3339();
        let fields = docstore::fields(json!({
            "levelId": level_id,
            "title": title,
            "order": order,
            "shortDescription": "",
            "thumbnailUrl": "",
            "isPublished": false,
            "seanceExercises": [],
            "createdAt": now,
            "updatedAt": now,
        }));

        self.persist_sessions(level_id, &changes, Some((id.as_str(), fields)))?;
        info!(level = %level_id, session = %id, order, "created session");
        return Ok(id);
    }

    /// Rename a session. Returns `false`, writing nothing, when the trimmed
    /// title is empty or unchanged.
    pub fn rename_session(&mut self, session_id: &str, title: &str) -> Result<bool, CurriculumError> {
        let title = title.trim();
        if title.is_empty() {
            return Ok(false);
        }

        let session = self
            .store
            .get(SESSIONS, session_id)?
            .ok_or_else(|| CurriculumError::SessionNotFound(session_id.to_string()))?;
        if session.str_field("title") == Some(title) {
            debug!(session = %session_id, "title unchanged");
            return Ok(false);
        }

        let mut fields = Fields::new();
        fields.insert("title".to_string(), json!(title));
        fields.insert("updatedAt".to_string(), json!(Utc::now().to_rfc3339()));
        self.store.update(SESSIONS, session_id, fields)?;
        info!(session = %session_id, title, "renamed session");
        return Ok(true);
    }

    /// Move a session to `placement` within its level.
    pub fn reposition_session(
        &mut self,
        level_id: &str,
        session_id: &str,
        placement: &Placement,
    ) -> Result<ChangeSet, CurriculumError> {
        let changes = self.mutate_level(level_id, |collection, ranker, members| {
            return collection.reposition(ranker, members, session_id, placement).map(Some);
        })?;
        return Ok(changes.unwrap_or_default());
    }

    /// Move a session one position up. `None` if it was already first.
    pub fn move_session_up(
        &mut self,
        level_id: &str,
        session_id: &str,
    ) -> Result<Option<ChangeSet>, CurriculumError> {
        return self.mutate_level(level_id, |collection, ranker, members| {
            return collection.move_up(ranker, members, session_id);
        });
    }

    /// Move a session one position down. `None` if it was already last.
    pub fn move_session_down(
        &mut self,
        level_id: &str,
        session_id: &str,
    ) -> Result<Option<ChangeSet>, CurriculumError> {
        return self.mutate_level(level_id, |collection, ranker, members| {
            return collection.move_down(ranker, members, session_id);
        });
    }

    fn display_positions(&self, collection: &OrderedCollection, members: &[Member]) -> FxHashMap<String, usize> {
        return self
            .ranker
            .materialize_order(&collection.snapshot(members))
            .into_iter()
            .enumerate()
            .map(|(i, id)| (id, i))
            .collect();
    }

    fn mutate_level<F>(&mut self, level_id: &str, mutation: F) -> Result<Option<ChangeSet>, CurriculumError>
    where
        F: FnOnce(&mut OrderedCollection, &Ranker, &[Member]) -> Result<Option<ChangeSet>, RankError>,
    {
        let loaded = self.load_level_sessions(level_id)?;
        let members = loaded.members();
        let mut collection = loaded.collection;

        let changes = mutation(&mut collection, &self.ranker, members.as_slice())?;
        if let Some(changes) = &changes {
            self.persist_sessions(level_id, changes, None)?;
        }
        return Ok(changes);
    }

    /// Write session ranks, and optionally a new session, as one batch.
    fn persist_sessions(
        &mut self,
        level_id: &str,
        changes: &ChangeSet,
        created: Option<(&str, Fields)>,
    ) -> Result<(), StoreError> {
        let now = Value::String(Utc::now().to_rfc3339());
        let mut batch = Batch::new();

        let created_id = created.as_ref().map(|(id, _)| *id);
        if let Some((id, fields)) = created {
            batch.set(SESSIONS, id, fields);
        }
        for write in changes.ranks.iter().filter(|w| created_id != Some(w.id.as_str())) {
            let mut fields = Fields::new();
            fields.insert(ORDER_FIELD.to_string(), json!(write.rank));
            fields.insert("updatedAt".to_string(), now.clone());
            batch.update(SESSIONS, &write.id, fields);
        }

        let writes = batch.len();
        self.store.commit(batch)?;
        info!(level = %level_id, writes, renumbered = changes.renumbered, "persisted session order");
        return Ok(());
    }

    fn mutate<F>(&mut self, session_id: &str, mutation: F) -> Result<Option<ChangeSet>, CurriculumError>
    where
        F: FnOnce(&mut OrderedCollection, &Ranker, &[Member]) -> Result<Option<ChangeSet>, RankError>,
    {
        let loaded = self.load_session(session_id)?;
        let members = loaded.members();
        let mut collection = loaded.collection;

        let changes = mutation(&mut collection, &self.ranker, members.as_slice())?;
        if let Some(changes) = &changes {
            self.persist(session_id, changes, None)?;
        }
        return Ok(changes);
    }

    /// Write a change set, and optionally a new exercise, as one batch.
    fn persist(
        &mut self,
        session_id: &str,
        changes: &ChangeSet,
        created: Option<(&str, Fields)>,
    ) -> Result<(), StoreError> {
        let now = Value::String(Utc::now().to_rfc3339());
        let mut batch = Batch::new();

        let created_id = created.as_ref().map(|(id, _)| *id);
        if let Some((id, fields)) = created {
            batch.set(EXERCISES, id, fields);
        }

        for write in &changes.ranks {
            if created_id == Some(write.id.as_str()) {
                continue;
            }
            let mut fields = Fields::new();
            fields.insert(ORDER_FIELD.to_string(), json!(write.rank));
            fields.insert("updatedAt".to_string(), now.clone());
            batch.update(EXERCISES, &write.id, fields);
        }

        if let Some(id) = &changes.removed {
            batch.delete(EXERCISES, id);
        }

        let mut session_fields = Fields::new();
        session_fields.insert(MEMBERS_FIELD.to_string(), json!(changes.member_ids));
        session_fields.insert("updatedAt".to_string(), now);
        batch.update(SESSIONS, session_id, session_fields);

        let writes = batch.len();
        self.store.commit(batch)?;
        info!(session = %session_id, writes, renumbered = changes.renumbered, "persisted exercise order");
        return Ok(());
    }
}
