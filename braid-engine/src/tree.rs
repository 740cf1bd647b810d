use std::collections::{HashMap, HashSet};

use braid_api::{NodeId, Story, StoryNode};

/// Structural defect found while assembling a story tree.
///
/// These cannot occur through the normal write path, but a damaged store
/// must not make reads fail: the affected subtree is excluded from the
/// traversal and the defect is reported here (and logged).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StructuralAnomaly {
    /// A node referencing a parent that is not part of the story.
    OrphanedParent { node: NodeId, parent: NodeId },
    /// A parentless node other than the traversed root.
    ExtraRoot { node: NodeId },
    /// The story has nodes but none of them is a root.
    MissingRoot,
}

/// The reading order of one story: depth-first from the root, siblings by
/// ascending sequence key. Two assemblies of the same node set produce the
/// same order.
#[derive(Clone, Debug)]
pub struct StoryTree {
    pub story: Story,
    pub nodes: Vec<StoryNode>,
    pub anomalies: Vec<StructuralAnomaly>,
}

pub(crate) fn assemble(story: Story, mut nodes: Vec<StoryNode>) -> StoryTree {
    // stores hand the node set back unordered; pin the order down first so
    // every derived structure below is deterministic
    nodes.sort_unstable_by_key(|n| (n.sequence_key, n.id));

    let ids: HashSet<NodeId> = nodes.iter().map(|n| n.id).collect();
    let mut children: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    let mut roots = Vec::new();
    let mut anomalies = Vec::new();
    for n in &nodes {
        match n.parent_id {
            None => roots.push(n.id),
            Some(parent) if ids.contains(&parent) => {
                children.entry(parent).or_default().push(n.id);
            }
            Some(parent) => {
                tracing::warn!(
                    node = ?n.id,
                    ?parent,
                    story = ?story.id,
                    "node references a missing parent, excluding its subtree"
                );
                anomalies.push(StructuralAnomaly::OrphanedParent { node: n.id, parent });
            }
        }
    }
    if roots.is_empty() && !nodes.is_empty() {
        tracing::warn!(story = ?story.id, "story has nodes but no root");
        anomalies.push(StructuralAnomaly::MissingRoot);
    }
    for extra in roots.iter().skip(1) {
        tracing::warn!(node = ?extra, story = ?story.id, "story has more than one root");
        anomalies.push(StructuralAnomaly::ExtraRoot { node: *extra });
    }

    let mut by_id: HashMap<NodeId, StoryNode> = nodes.into_iter().map(|n| (n.id, n)).collect();

    // explicit stack instead of recursion, so a deep story cannot exhaust
    // the call stack
    let mut ordered = Vec::with_capacity(by_id.len());
    let mut stack: Vec<NodeId> = roots.first().copied().into_iter().collect();
    while let Some(id) = stack.pop() {
        // children were collected in sibling order; pushing them reversed
        // makes the smallest sequence key pop first
        if let Some(kids) = children.get(&id) {
            stack.extend(kids.iter().rev());
        }
        if let Some(n) = by_id.remove(&id) {
            ordered.push(n);
        }
    }

    StoryTree {
        story,
        nodes: ordered,
        anomalies,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use braid_api::{StoryId, Time, UserId, Uuid, VoteTally};
    use std::collections::BTreeMap;

    fn now() -> Time {
        chrono::Utc::now()
    }

    fn story() -> Story {
        Story {
            id: StoryId::stub(),
            author_id: UserId::stub(),
            branch_count: 0,
            total_comment_count: 0,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn node(id: NodeId, parent_id: Option<NodeId>, sequence_key: u64) -> StoryNode {
        StoryNode {
            id,
            story_id: StoryId::stub(),
            parent_id,
            author_id: UserId::stub(),
            body: format!("node {sequence_key}"),
            sequence_key,
            votes: BTreeMap::new(),
            tally: VoteTally::default(),
            comment_count: 0,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn id() -> NodeId {
        NodeId(Uuid::new_v4())
    }

    #[test]
    fn depth_first_sibling_order() {
        let (root, a, b, a1) = (id(), id(), id(), id());
        // inserted shuffled on purpose
        let nodes = vec![
            node(b, Some(root), 1),
            node(root, None, 0),
            node(a1, Some(a), 0),
            node(a, Some(root), 0),
        ];
        let tree = assemble(story(), nodes);
        assert!(tree.anomalies.is_empty());
        let order: Vec<NodeId> = tree.nodes.iter().map(|n| n.id).collect();
        assert_eq!(order, vec![root, a, a1, b]);
    }

    #[test]
    fn assembly_is_deterministic() {
        let (root, a, b, c) = (id(), id(), id(), id());
        let nodes = vec![
            node(root, None, 0),
            node(a, Some(root), 0),
            node(b, Some(root), 1),
            node(c, Some(b), 0),
        ];
        let first = assemble(story(), nodes.clone());
        let second = assemble(story(), nodes.into_iter().rev().collect());
        let order = |t: &StoryTree| t.nodes.iter().map(|n| n.id).collect::<Vec<_>>();
        assert_eq!(order(&first), order(&second));
    }

    #[test]
    fn orphan_subtree_is_excluded_not_fatal() {
        let (root, child, missing, orphan, orphan_child) = (id(), id(), id(), id(), id());
        let nodes = vec![
            node(root, None, 0),
            node(child, Some(root), 0),
            node(orphan, Some(missing), 1),
            node(orphan_child, Some(orphan), 0),
        ];
        let tree = assemble(story(), nodes);
        let order: Vec<NodeId> = tree.nodes.iter().map(|n| n.id).collect();
        assert_eq!(order, vec![root, child]);
        assert_eq!(
            tree.anomalies,
            vec![StructuralAnomaly::OrphanedParent {
                node: orphan,
                parent: missing
            }]
        );
    }

    #[test]
    fn extra_roots_are_reported() {
        let (root, extra) = (id(), id());
        let nodes = vec![node(root, None, 0), node(extra, None, 1)];
        let tree = assemble(story(), nodes);
        let order: Vec<NodeId> = tree.nodes.iter().map(|n| n.id).collect();
        assert_eq!(order, vec![root]);
        assert_eq!(
            tree.anomalies,
            vec![StructuralAnomaly::ExtraRoot { node: extra }]
        );
    }

    #[test]
    fn missing_root_is_reported() {
        let (a, missing) = (id(), id());
        let tree = assemble(story(), vec![node(a, Some(missing), 0)]);
        assert!(tree.nodes.is_empty());
        assert!(tree
            .anomalies
            .contains(&StructuralAnomaly::MissingRoot));
    }

    #[test]
    fn deep_chain_does_not_recurse() {
        let mut nodes = Vec::new();
        let mut parent = None;
        for i in 0..10_000u64 {
            let n = id();
            nodes.push(node(n, parent, i));
            parent = Some(n);
        }
        let tree = assemble(story(), nodes);
        assert_eq!(tree.nodes.len(), 10_000);
        assert!(tree.anomalies.is_empty());
    }

    #[test]
    fn empty_story_is_empty_and_clean() {
        let tree = assemble(story(), Vec::new());
        assert!(tree.nodes.is_empty());
        assert!(tree.anomalies.is_empty());
    }
}
