//! Removing a challenge post and everything that hangs off it.
//!
//! Posts live under their challenge (`challenges/{id}/posts`). Reactions and
//! comments point back at the post by `postId`, and each author keeps an
//! index of their posts under `users/{uid}/postsIndex`. Deleting a post
//! clears all of these in one batch and adjusts the counters that depend
//! on it.
//!
//! The hosted video itself is not touched here. The returned
//! `PostDeletion::stream_id` is what the caller hands to the video host.

use docstore::Batch;
use docstore::Document;
use docstore::DocumentStore;
use docstore::Filter;
use docstore::Query;
use docstore::StoreError;
use tracing::info;
use tracing::warn;

use crate::challenge::CHALLENGES;

pub const REACTIONS: &str = "postReactions";
pub const COMMENTS: &str = "postComments";
pub const USERS: &str = "users";
pub const CHALLENGE_MEMBERS: &str = "challengeMembers";

#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
    #[error("post {post} not found in challenge {challenge}")]
    PostNotFound { challenge: String, post: String },

    #[error("post {0} has no author")]
    MissingAuthor(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The subcollection holding a challenge's posts.
pub fn posts_collection(challenge_id: &str) -> String {
    return format!("{}/{}/posts", CHALLENGES, challenge_id);
}

fn posts_index(author_id: &str) -> String {
    return format!("{}/{}/postsIndex", USERS, author_id);
}

/// The author of a post, from `authorId`, `author_id` or `uid`.
pub fn post_author(post: &Document) -> Option<&str> {
    return ["authorId", "author_id", "uid"]
        .into_iter()
        .filter_map(|field| post.str_field(field))
        .find(|id| !id.is_empty());
}

/// What a post deletion removed.
#[derive(Clone, Debug, PartialEq)]
pub struct PostDeletion {
    pub challenge_id: String,
    pub post_id: String,
    pub author_id: String,
    /// The hosted video to delete, if the post had one.
    pub stream_id: Option<String>,
    pub reactions: usize,
    pub comments: usize,
    /// The author had no other post in the challenge and was dropped from it.
    pub left_challenge: bool,
}

/// Delete a post with its reactions, comments and index entry, and update
/// the counters that depend on it.
///
/// When this was the author's last post in the challenge, the challenge's
/// `participantsCount` goes down by one and the membership record is
/// deleted. Counters on documents that no longer exist are skipped.
pub fn delete_post<S: DocumentStore>(
    store: &mut S,
    challenge_id: &str,
    post_id: &str,
) -> Result<PostDeletion, ModerationError> {
    let posts = posts_collection(challenge_id);
    let post = store.get(&posts, post_id)?.ok_or_else(|| ModerationError::PostNotFound {
        challenge: challenge_id.to_string(),
        post: post_id.to_string(),
    })?;
    let author_id = post_author(&post)
        .ok_or_else(|| ModerationError::MissingAuthor(post_id.to_string()))?
        .to_string();

    let mut batch = Batch::new();
    batch.delete(&posts, post_id);

    let by_post = Query::new().filter(Filter::eq("postId", post_id));
    let reactions = store.query(REACTIONS, &by_post)?;
    for reaction in &reactions {
        batch.delete(REACTIONS, &reaction.id);
    }
    let comments = store.query(COMMENTS, &by_post)?;
    for comment in &comments {
        batch.delete(COMMENTS, &comment.id);
    }
    batch.delete(&posts_index(&author_id), post_id);

    let by_author = Query::new().filter(Filter::eq("authorId", author_id.as_str()));
    let left_challenge = store
        .query(&posts, &by_author)?
        .iter()
        .all(|other| other.id == post_id);
    if left_challenge {
        if store.get(CHALLENGES, challenge_id)?.is_some() {
            batch.increment(CHALLENGES, challenge_id, "participantsCount", -1);
        } else {
            warn!(challenge = %challenge_id, "challenge missing, participant count not updated");
        }
        batch.delete(CHALLENGE_MEMBERS, &format!("{}_{}", challenge_id, author_id));
    }

    if store.get(USERS, &author_id)?.is_some() {
        batch.increment(USERS, &author_id, "postsCount", -1);
    } else {
        warn!(author = %author_id, "author missing, post count not updated");
    }

    store.commit(batch)?;

    let deletion = PostDeletion {
        challenge_id: challenge_id.to_string(),
        post_id: post_id.to_string(),
        author_id,
        stream_id: post.str_field("streamId").filter(|s| !s.is_empty()).map(str::to_string),
        reactions: reactions.len(),
        comments: comments.len(),
        left_challenge,
    };
    info!(
        challenge = %deletion.challenge_id,
        post = %deletion.post_id,
        reactions = deletion.reactions,
        comments = deletion.comments,
        left_challenge,
        "deleted post"
    );
    return Ok(deletion);
}
