//! Operation layer over a [`NodeStore`]: creates story trees, attaches
//! branches, records toggle-votes and comments, and reassembles the tree in
//! its deterministic reading order.
//!
//! Every mutation follows the same optimistic discipline: read the touched
//! entities with their version tokens, compute the new state, and commit one
//! conditional [`WriteBatch`] carrying both the leaf mutation and the
//! matching aggregate update. A conflict means someone else committed in
//! between; the whole read-compute-commit cycle is retried with fresh reads,
//! a bounded number of times, before the failure is surfaced to the caller.

use std::collections::BTreeMap;
use std::time::Duration;

use braid_api::{
    validate_body, Comment, CommentId, Error, NodeId, NodeStore, Precondition, Story, StoryId,
    StoryNode, StoreError, UserId, Uuid, VoteKind, VoteTally, WriteBatch,
};
use chrono::Utc;

mod tree;
mod vote;

pub use tree::{StoryTree, StructuralAnomaly};

/// Attempt ceiling for optimistic transactions.
const MAX_TXN_ATTEMPTS: u32 = 5;

/// Base delay before re-reading after a conflict; grows linearly with the
/// attempt number.
const RETRY_BACKOFF: Duration = Duration::from_millis(5);

pub struct Engine<S> {
    store: S,
}

impl<S: NodeStore + Send + Sync> Engine<S> {
    pub fn new(store: S) -> Engine<S> {
        Engine { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates a story together with its root node, atomically.
    pub async fn create_story(
        &self,
        author_id: UserId,
        body: String,
    ) -> Result<(StoryId, NodeId), Error> {
        validate_body(&body)?;
        let now = Utc::now();
        let story_id = StoryId(Uuid::new_v4());
        let root_id = NodeId(Uuid::new_v4());
        let story = Story {
            id: story_id,
            author_id,
            branch_count: 1,
            total_comment_count: 0,
            created_at: now,
            updated_at: now,
        };
        let root = StoryNode {
            id: root_id,
            story_id,
            parent_id: None,
            author_id,
            body,
            sequence_key: 0,
            votes: BTreeMap::new(),
            tally: VoteTally::default(),
            comment_count: 0,
            created_at: now,
            updated_at: now,
        };
        let mut batch = WriteBatch::new();
        batch.expect(Precondition::StoryAbsent(story_id));
        batch.expect(Precondition::NodeAbsent(root_id));
        batch.put_story(story);
        batch.put_node(root);
        match self.store.commit(batch).await {
            Ok(()) => Ok((story_id, root_id)),
            Err(StoreError::Conflict) => Err(Error::UuidAlreadyUsed(story_id.0)),
            Err(e) => Err(store_error(e)),
        }
    }

    /// Attaches a new node under `parent_id` and bumps the story's branch
    /// count, in one transaction.
    pub async fn add_branch(
        &self,
        story_id: StoryId,
        parent_id: NodeId,
        author_id: UserId,
        body: String,
    ) -> Result<NodeId, Error> {
        validate_body(&body)?;
        let id = NodeId(Uuid::new_v4());
        for attempt in 1..=MAX_TXN_ATTEMPTS {
            let story = self
                .store
                .story(story_id)
                .await
                .map_err(store_error)?
                .ok_or(Error::StoryNotFound(story_id))?;
            let parent = self
                .store
                .node(parent_id)
                .await
                .map_err(store_error)?
                .ok_or(Error::ParentNotFound(parent_id))?;
            if parent.value.story_id != story_id {
                return Err(Error::ParentNotFound(parent_id));
            }
            let siblings = self
                .store
                .children_of(parent_id)
                .await
                .map_err(store_error)?;
            // the story version precondition serializes sibling creation,
            // so max+1 cannot hand out the same key twice
            let sequence_key = siblings
                .iter()
                .map(|s| s.value.sequence_key)
                .max()
                .map_or(0, |k| k + 1);

            let now = Utc::now();
            let mut updated_story = story.value;
            updated_story.branch_count += 1;
            updated_story.updated_at = now;
            let node = StoryNode {
                id,
                story_id,
                parent_id: Some(parent_id),
                author_id,
                body: body.clone(),
                sequence_key,
                votes: BTreeMap::new(),
                tally: VoteTally::default(),
                comment_count: 0,
                created_at: now,
                updated_at: now,
            };

            let mut batch = WriteBatch::new();
            batch.expect(Precondition::StoryAt(story_id, story.version));
            batch.expect(Precondition::NodeAbsent(id));
            batch.put_story(updated_story);
            batch.put_node(node);
            match self.store.commit(batch).await {
                Ok(()) => return Ok(id),
                Err(StoreError::Conflict) => {
                    tracing::debug!(?story_id, ?parent_id, attempt, "branch hit a concurrent update, retrying");
                    Self::backoff(attempt).await;
                }
                Err(e) => return Err(store_error(e)),
            }
        }
        tracing::warn!(?story_id, ?parent_id, "branch still conflicting after {MAX_TXN_ATTEMPTS} attempts");
        Err(Error::WriteFailed {
            attempts: MAX_TXN_ATTEMPTS,
        })
    }

    /// Records one toggle-vote and returns the node's new tally.
    ///
    /// Story aggregates are untouched: votes are not aggregated at story
    /// level, so the transaction spans only the node.
    pub async fn cast_vote(
        &self,
        node_id: NodeId,
        voter_id: UserId,
        kind: VoteKind,
    ) -> Result<VoteTally, Error> {
        for attempt in 1..=MAX_TXN_ATTEMPTS {
            let node = self
                .store
                .node(node_id)
                .await
                .map_err(store_error)?
                .ok_or(Error::NodeNotFound(node_id))?;
            let mut updated = node.value;
            vote::apply(&mut updated, voter_id, kind);
            updated.updated_at = Utc::now();
            let tally = updated.tally;

            let mut batch = WriteBatch::new();
            batch.expect(Precondition::NodeAt(node_id, node.version));
            batch.put_node(updated);
            match self.store.commit(batch).await {
                Ok(()) => return Ok(tally),
                Err(StoreError::Conflict) => {
                    tracing::debug!(?node_id, attempt, "vote hit a concurrent update, retrying");
                    Self::backoff(attempt).await;
                }
                Err(e) => return Err(store_error(e)),
            }
        }
        tracing::warn!(?node_id, "vote still conflicting after {MAX_TXN_ATTEMPTS} attempts");
        Err(Error::VoteFailed {
            attempts: MAX_TXN_ATTEMPTS,
        })
    }

    /// Appends a comment and bumps both the node's and the story's comment
    /// counts, in one transaction spanning node and story.
    pub async fn add_comment(
        &self,
        node_id: NodeId,
        author_id: UserId,
        body: String,
    ) -> Result<CommentId, Error> {
        validate_body(&body)?;
        let id = CommentId(Uuid::new_v4());
        for attempt in 1..=MAX_TXN_ATTEMPTS {
            let node = self
                .store
                .node(node_id)
                .await
                .map_err(store_error)?
                .ok_or(Error::NodeNotFound(node_id))?;
            let story_id = node.value.story_id;
            let story = self
                .store
                .story(story_id)
                .await
                .map_err(store_error)?
                .ok_or(Error::StoryNotFound(story_id))?;

            let now = Utc::now();
            let node_version = node.version;
            let mut updated_node = node.value;
            updated_node.comment_count += 1;
            updated_node.updated_at = now;
            let story_version = story.version;
            let mut updated_story = story.value;
            updated_story.total_comment_count += 1;
            updated_story.updated_at = now;

            let mut batch = WriteBatch::new();
            batch.expect(Precondition::NodeAt(node_id, node_version));
            batch.expect(Precondition::StoryAt(story_id, story_version));
            batch.append_comment(Comment {
                id,
                node_id,
                author_id,
                body: body.clone(),
                created_at: now,
            });
            batch.put_node(updated_node);
            batch.put_story(updated_story);
            match self.store.commit(batch).await {
                Ok(()) => return Ok(id),
                Err(StoreError::Conflict) => {
                    tracing::debug!(?node_id, attempt, "comment hit a concurrent update, retrying");
                    Self::backoff(attempt).await;
                }
                Err(e) => return Err(store_error(e)),
            }
        }
        tracing::warn!(?node_id, "comment still conflicting after {MAX_TXN_ATTEMPTS} attempts");
        Err(Error::WriteFailed {
            attempts: MAX_TXN_ATTEMPTS,
        })
    }

    /// The story's metadata, aggregates included.
    pub async fn story(&self, story_id: StoryId) -> Result<Story, Error> {
        Ok(self
            .store
            .story(story_id)
            .await
            .map_err(store_error)?
            .ok_or(Error::StoryNotFound(story_id))?
            .value)
    }

    /// Reassembles the whole story into its deterministic reading order.
    /// Reads the latest committed snapshot; no transaction involved.
    pub async fn story_tree(&self, story_id: StoryId) -> Result<StoryTree, Error> {
        let story = self
            .store
            .story(story_id)
            .await
            .map_err(store_error)?
            .ok_or(Error::StoryNotFound(story_id))?;
        let nodes = self
            .store
            .nodes_in_story(story_id)
            .await
            .map_err(store_error)?;
        Ok(tree::assemble(
            story.value,
            nodes.into_iter().map(|n| n.value).collect(),
        ))
    }

    /// The node's comment thread, chronological ascending.
    pub async fn comments(&self, node_id: NodeId) -> Result<Vec<Comment>, Error> {
        if self
            .store
            .node(node_id)
            .await
            .map_err(store_error)?
            .is_none()
        {
            return Err(Error::NodeNotFound(node_id));
        }
        self.store.comments_of(node_id).await.map_err(store_error)
    }

    async fn backoff(attempt: u32) {
        tokio::time::sleep(RETRY_BACKOFF * attempt).await;
    }
}

fn store_error(e: StoreError) -> Error {
    match e {
        // reads take no preconditions, so this only surfaces from commits
        // whose conflicts are not retried
        StoreError::Conflict => Error::Unknown(String::from("conflicting concurrent update")),
        StoreError::Backend(e) => Error::Unknown(format!("{e:#}")),
    }
}
