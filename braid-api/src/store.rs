use async_trait::async_trait;

use crate::{Comment, NodeId, Story, StoryId, StoryNode};

/// Version token handed out on every read; a write batch must present the
/// token back for every entity it touches.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize,
    serde::Serialize,
)]
pub struct Version(pub u64);

impl Version {
    pub fn next(self) -> Version {
        Version(self.0 + 1)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Versioned<T> {
    pub value: T,
    pub version: Version,
}

/// What must still hold at commit time for a [`WriteBatch`] to apply.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Precondition {
    StoryAt(StoryId, Version),
    NodeAt(NodeId, Version),
    StoryAbsent(StoryId),
    NodeAbsent(NodeId),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Write {
    PutStory(Story),
    PutNode(StoryNode),
    AppendComment(Comment),
}

/// An atomic conditional write: either every precondition holds and every
/// write lands, or nothing is applied and the commit fails with
/// [`StoreError::Conflict`]. This is the only way the core ever mutates
/// stored state, which is what keeps denormalized aggregates from drifting
/// under concurrent writers.
#[derive(Clone, Debug, Default)]
pub struct WriteBatch {
    pub preconditions: Vec<Precondition>,
    pub writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new() -> WriteBatch {
        WriteBatch::default()
    }

    pub fn expect(&mut self, p: Precondition) {
        self.preconditions.push(p);
    }

    pub fn put_story(&mut self, s: Story) {
        self.writes.push(Write::PutStory(s));
    }

    pub fn put_node(&mut self, n: StoryNode) {
        self.writes.push(Write::PutNode(n));
    }

    pub fn append_comment(&mut self, c: Comment) {
        self.writes.push(Write::AppendComment(c));
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A precondition no longer held at commit time; the caller should
    /// re-read and retry.
    #[error("conflicting concurrent update")]
    Conflict,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Contract between the core and whatever holds the data of record.
///
/// Reads return the latest committed snapshot together with version tokens;
/// [`NodeStore::commit`] is the single mutation path. Any backend able to
/// honor compare-and-swap on the version tokens can implement this —
/// relational, key-value, or in-memory.
#[async_trait]
pub trait NodeStore {
    async fn story(&self, id: StoryId) -> Result<Option<Versioned<Story>>, StoreError>;

    async fn node(&self, id: NodeId) -> Result<Option<Versioned<StoryNode>>, StoreError>;

    /// All nodes of one story, as an unordered flat set.
    async fn nodes_in_story(&self, story: StoryId)
        -> Result<Vec<Versioned<StoryNode>>, StoreError>;

    /// Direct children of one node, in no particular order.
    async fn children_of(&self, parent: NodeId) -> Result<Vec<Versioned<StoryNode>>, StoreError>;

    /// Comments of one node, chronological ascending, insertion order on
    /// equal timestamps.
    async fn comments_of(&self, node: NodeId) -> Result<Vec<Comment>, StoreError>;

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
}
