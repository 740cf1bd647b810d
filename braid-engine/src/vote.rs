use braid_api::{StoryNode, UserId, VoteKind, VoteTally};

/// Applies one toggle-vote to the node's vote map and cached tally.
///
/// Casting the same direction a voter already holds withdraws the vote;
/// casting the opposite direction replaces it. A repeated identical cast is
/// therefore a withdrawal — deliberate toggle semantics, not a bug.
pub(crate) fn apply(node: &mut StoryNode, voter: UserId, kind: VoteKind) {
    match node.votes.get(&voter).copied() {
        Some(prior) if prior == kind => {
            node.votes.remove(&voter);
            drop_one(&mut node.tally, kind);
        }
        Some(prior) => {
            node.votes.insert(voter, kind);
            drop_one(&mut node.tally, prior);
            bump_one(&mut node.tally, kind);
        }
        None => {
            node.votes.insert(voter, kind);
            bump_one(&mut node.tally, kind);
        }
    }
}

fn slot(tally: &mut VoteTally, kind: VoteKind) -> &mut u64 {
    match kind {
        VoteKind::Up => &mut tally.up,
        VoteKind::Down => &mut tally.down,
    }
}

fn bump_one(tally: &mut VoteTally, kind: VoteKind) {
    *slot(tally, kind) += 1;
}

fn drop_one(tally: &mut VoteTally, kind: VoteKind) {
    // floor at zero: an inconsistent cached tally must never underflow
    let s = slot(tally, kind);
    *s = s.saturating_sub(1);
}
