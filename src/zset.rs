use std::cmp::Ordering;

use ordered_float::OrderedFloat;

use crate::avl::{AvlTree, NodeId};
use crate::hashtable::{fnv1a_hash, HMap};

/// Member index entry: the hash side of the set, keyed by member name and
/// carrying the current score.
struct MemberEntry {
    member: String,
    score: f64,
}

/// Tree payload: the ordering side of the set.
struct ScoreKey {
    score: f64,
    member: String,
}

fn zorder(a: &ScoreKey, b: &ScoreKey) -> Ordering {
    (OrderedFloat(a.score), a.member.as_str()).cmp(&(OrderedFloat(b.score), b.member.as_str()))
}

/// Sorted set: a hash map from member to score paired with an AVL tree
/// ordered by (score, member).
///
/// Both structures index the same member set. Each member has exactly one
/// map entry and one tree node, and the scores agree; ranked queries go
/// through the tree, point lookups through the map.
pub struct SortedSet {
    map: HMap<MemberEntry>,
    tree: AvlTree<ScoreKey>,
}

impl SortedSet {
    pub fn new() -> Self {
        Self {
            map: HMap::new(),
            tree: AvlTree::new(),
        }
    }

    pub fn len(&self) -> usize {
        debug_assert_eq!(self.map.len(), self.tree.len());
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Insert or update a member. Returns true only when the member is new;
    /// score updates (and equal-score re-adds) return false.
    pub fn add(&mut self, score: f64, member: &str) -> bool {
        let hcode = fnv1a_hash(member.as_bytes());
        let old_score = self
            .map
            .lookup(hcode, |e| e.member == member)
            .map(|e| e.score);

        match old_score {
            Some(old) => {
                if OrderedFloat(old) == OrderedFloat(score) {
                    return false;
                }
                // Reposition: drop the (old score, member) tree node and
                // insert a fresh one; the map entry is re-keyed in place by
                // remove + insert.
                let id = self
                    .tree
                    .find(|key| probe(old, member, key))
                    .expect("indexed member has a tree node");
                self.tree.detach(id);
                self.tree.insert(
                    ScoreKey {
                        score,
                        member: member.to_string(),
                    },
                    zorder,
                );
                let mut entry = self
                    .map
                    .remove(hcode, |e| e.member == member)
                    .expect("indexed member has a map entry");
                entry.score = score;
                self.map.insert(hcode, entry);
                false
            }
            None => {
                self.map.insert(
                    hcode,
                    MemberEntry {
                        member: member.to_string(),
                        score,
                    },
                );
                self.tree.insert(
                    ScoreKey {
                        score,
                        member: member.to_string(),
                    },
                    zorder,
                );
                true
            }
        }
    }

    /// Remove a member from both sides. Returns true if it was present.
    pub fn remove(&mut self, member: &str) -> bool {
        let hcode = fnv1a_hash(member.as_bytes());
        match self.map.remove(hcode, |e| e.member == member) {
            Some(entry) => {
                let id = self
                    .tree
                    .find(|key| probe(entry.score, member, key))
                    .expect("indexed member has a tree node");
                self.tree.detach(id);
                true
            }
            None => false,
        }
    }

    pub fn score(&mut self, member: &str) -> Option<f64> {
        let hcode = fnv1a_hash(member.as_bytes());
        self.map.lookup(hcode, |e| e.member == member).map(|e| e.score)
    }

    /// Node at the given zero-based rank in (score, member) order.
    pub fn select(&self, rank: usize) -> Option<NodeId> {
        self.tree.find_by_rank(rank)
    }

    /// In-order neighbor of a node returned by [`select`](Self::select).
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.tree.successor(id)
    }

    pub fn entry(&self, id: NodeId) -> (&str, f64) {
        let key = self.tree.get(id);
        (key.member.as_str(), key.score)
    }
}

impl Default for SortedSet {
    fn default() -> Self {
        Self::new()
    }
}

fn probe(score: f64, member: &str, key: &ScoreKey) -> Ordering {
    (OrderedFloat(score), member).cmp(&(OrderedFloat(key.score), key.member.as_str()))
}
