use std::collections::BTreeMap;

use uuid::Uuid;

use crate::{StoryId, Time, UserId, STUB_UUID};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub fn stub() -> NodeId {
        NodeId(STUB_UUID)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub enum VoteKind {
    Up,
    Down,
}

/// Cached per-node vote counts, floored at zero.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct VoteTally {
    pub up: u64,
    pub down: u64,
}

/// One unit of content in a story tree.
///
/// `parent_id` is `None` only for the root node and is immutable once set;
/// nodes are never re-parented, so the parent/child relation stays a forest
/// of single-rooted trees. The vote map keys by voter, which makes the
/// at-most-one-vote-per-voter rule structural rather than checked.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct StoryNode {
    pub id: NodeId,
    pub story_id: StoryId,
    pub parent_id: Option<NodeId>,
    pub author_id: UserId,

    /// Opaque payload, not interpreted by the core.
    pub body: String,

    /// Orders siblings chronologically; strictly increasing under one parent.
    pub sequence_key: u64,

    pub votes: BTreeMap<UserId, VoteKind>,
    pub tally: VoteTally,
    pub comment_count: u64,

    pub created_at: Time,
    pub updated_at: Time,
}
