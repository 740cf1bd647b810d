use uuid::Uuid;

use crate::{Time, UserId, STUB_UUID};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct StoryId(pub Uuid);

impl StoryId {
    pub fn stub() -> StoryId {
        StoryId(STUB_UUID)
    }
}

/// The root entity owning one whole branching tree of [`StoryNode`]s.
///
/// The counters are denormalized aggregates and are authoritative:
/// `branch_count` is the number of nodes whose `story_id` is this story, and
/// `total_comment_count` is the sum of `comment_count` over those nodes.
/// Every committed write batch that changes a node-level count carries the
/// matching update to these fields, so they never drift.
///
/// [`StoryNode`]: crate::StoryNode
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Story {
    pub id: StoryId,
    pub author_id: UserId,

    pub branch_count: u64,
    pub total_comment_count: u64,

    pub created_at: Time,
    pub updated_at: Time,
}
