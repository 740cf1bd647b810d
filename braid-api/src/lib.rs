pub use uuid::{uuid, Uuid};
pub type Time = chrono::DateTime<chrono::Utc>;

pub const STUB_UUID: Uuid = uuid!("ffffffff-ffff-ffff-ffff-ffffffffffff");

mod comment;
pub use comment::{Comment, CommentId};

mod error;
pub use error::Error;

mod node;
pub use node::{NodeId, StoryNode, VoteKind, VoteTally};

mod store;
pub use store::{NodeStore, Precondition, StoreError, Version, Versioned, Write, WriteBatch};

mod story;
pub use story::{Story, StoryId};

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn stub() -> UserId {
        UserId(STUB_UUID)
    }
}

/// Validates caller-supplied text before anything is written.
///
/// Bodies are opaque to the core apart from these two rules: postgres-style
/// backends choke on null bytes, and blank units/comments are meaningless.
pub fn validate_body(body: &str) -> Result<(), Error> {
    if body.contains('\0') {
        return Err(Error::NullByteInString(body.to_string()));
    }
    if body.trim().is_empty() {
        return Err(Error::EmptyContent);
    }
    Ok(())
}
