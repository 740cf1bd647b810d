use uuid::Uuid;

use crate::{NodeId, Time, UserId, STUB_UUID};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct CommentId(pub Uuid);

impl CommentId {
    pub fn stub() -> CommentId {
        CommentId(STUB_UUID)
    }
}

/// One remark attached to a node. Append-only: the core never edits,
/// re-orders or deletes a comment (moderation is an external concern).
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub node_id: NodeId,
    pub author_id: UserId,
    pub body: String,
    pub created_at: Time,
}
