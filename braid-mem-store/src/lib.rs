use std::collections::HashMap;

use async_trait::async_trait;
use braid_api::{
    Comment, NodeId, NodeStore, Precondition, Story, StoryId, StoryNode, StoreError, Version,
    Versioned, Write, WriteBatch,
};
use tokio::sync::Mutex;

/// In-memory [`NodeStore`], used as the reference implementation and as the
/// backing store for tests.
///
/// The whole state sits behind one mutex, so a commit checks its
/// preconditions and applies its writes under a single guard: concurrent
/// readers never observe a partially-applied batch.
#[derive(Debug, Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    stories: HashMap<StoryId, Versioned<Story>>,
    nodes: HashMap<NodeId, Versioned<StoryNode>>,
    comments: HashMap<NodeId, Vec<Comment>>,
}

impl MemStore {
    pub fn new() -> MemStore {
        MemStore::default()
    }
}

impl Inner {
    fn holds(&self, p: &Precondition) -> bool {
        match p {
            Precondition::StoryAt(id, v) => self.stories.get(id).map(|s| s.version) == Some(*v),
            Precondition::NodeAt(id, v) => self.nodes.get(id).map(|n| n.version) == Some(*v),
            Precondition::StoryAbsent(id) => !self.stories.contains_key(id),
            Precondition::NodeAbsent(id) => !self.nodes.contains_key(id),
        }
    }
}

#[async_trait]
impl NodeStore for MemStore {
    async fn story(&self, id: StoryId) -> Result<Option<Versioned<Story>>, StoreError> {
        Ok(self.inner.lock().await.stories.get(&id).cloned())
    }

    async fn node(&self, id: NodeId) -> Result<Option<Versioned<StoryNode>>, StoreError> {
        Ok(self.inner.lock().await.nodes.get(&id).cloned())
    }

    async fn nodes_in_story(
        &self,
        story: StoryId,
    ) -> Result<Vec<Versioned<StoryNode>>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .nodes
            .values()
            .filter(|n| n.value.story_id == story)
            .cloned()
            .collect())
    }

    async fn children_of(&self, parent: NodeId) -> Result<Vec<Versioned<StoryNode>>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .nodes
            .values()
            .filter(|n| n.value.parent_id == Some(parent))
            .cloned()
            .collect())
    }

    async fn comments_of(&self, node: NodeId) -> Result<Vec<Comment>, StoreError> {
        let mut comments = self
            .inner
            .lock()
            .await
            .comments
            .get(&node)
            .cloned()
            .unwrap_or_default();
        // stable sort: insertion order breaks created_at ties
        comments.sort_by_key(|c| c.created_at);
        Ok(comments)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if !batch.preconditions.iter().all(|p| inner.holds(p)) {
            return Err(StoreError::Conflict);
        }
        for w in batch.writes {
            match w {
                Write::PutStory(s) => {
                    let version = inner
                        .stories
                        .get(&s.id)
                        .map_or(Version(1), |old| old.version.next());
                    inner.stories.insert(s.id, Versioned { value: s, version });
                }
                Write::PutNode(n) => {
                    let version = inner
                        .nodes
                        .get(&n.id)
                        .map_or(Version(1), |old| old.version.next());
                    inner.nodes.insert(n.id, Versioned { value: n, version });
                }
                Write::AppendComment(c) => {
                    inner.comments.entry(c.node_id).or_default().push(c);
                }
            }
        }
        Ok(())
    }
}
