//! Forwarding Information Base. See spec §3, §4.2.
//!
//! Grounded on `fidinda-reto/src/tables.rs`'s `register_prefix` /
//! `unregister_prefix` pair, generalized from a single best-face-per-prefix
//! slot to the spec's ordered `(faceId, cost)` next-hop sequence (needed to
//! host the RIB's `E(P)` next-hop sets, spec §4.8).

use generational_arena::{Arena, Index};
use tracing::debug;

use crate::face::FaceId;
use crate::name::Name;
use crate::name_tree::{NameTree, NameTreeEntryId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FibEntryId(pub(crate) Index);

impl FibEntryId {
    #[cfg(test)]
    pub(crate) fn dummy_for_test() -> Self {
        let mut arena: Arena<()> = Arena::new();
        FibEntryId(arena.insert(()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextHop {
    pub face: FaceId,
    pub cost: u32,
}

pub struct FibEntry {
    name_tree_entry: NameTreeEntryId,
    prefix: Name,
    next_hops: Vec<NextHop>,
}

impl FibEntry {
    pub fn prefix(&self) -> &Name {
        &self.prefix
    }

    /// Sorted by ascending cost, ties broken by ascending `faceId`.
    pub fn next_hops(&self) -> &[NextHop] {
        &self.next_hops
    }

    fn resort(&mut self) {
        self.next_hops
            .sort_by(|a, b| a.cost.cmp(&b.cost).then_with(|| a.face.cmp(&b.face)));
    }
}

#[derive(Default)]
pub struct Fib {
    entries: Arena<FibEntry>,
}

impl Fib {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, id: FibEntryId) -> &FibEntry {
        self.entries.get(id.0).expect("stale FibEntryId")
    }

    /// Upserts the FIB entry for `prefix`, registering it on the NameTree
    /// node if newly created.
    pub fn insert(&mut self, tree: &mut NameTree, prefix: &Name) -> (FibEntryId, bool) {
        let node = tree
            .lookup(prefix)
            .expect("prefix already validated by caller");
        if let Some(existing) = tree.fib(node) {
            return (existing, false);
        }
        let idx = self.entries.insert(FibEntry {
            name_tree_entry: node,
            prefix: prefix.clone(),
            next_hops: Vec::new(),
        });
        let id = FibEntryId(idx);
        tree.set_fib(node, Some(id));
        debug!(prefix = %prefix, "fib entry created");
        (id, true)
    }

    pub fn find_exact_match(&self, tree: &NameTree, prefix: &Name) -> Option<FibEntryId> {
        tree.find_exact_match(prefix).and_then(|n| tree.fib(n))
    }

    /// Longest-prefix match delegating to the NameTree (spec §4.2).
    pub fn find_longest_prefix_match(&self, tree: &NameTree, name: &Name) -> Option<FibEntryId> {
        tree.find_longest_prefix_match(name, |t, id| t.fib(id).is_some())
            .and_then(|id| tree.fib(id))
    }

    pub fn add_or_update_next_hop(&mut self, entry: FibEntryId, face: FaceId, cost: u32) {
        let e = self.entries.get_mut(entry.0).expect("stale FibEntryId");
        match e.next_hops.iter_mut().find(|nh| nh.face == face) {
            Some(nh) => nh.cost = cost,
            None => e.next_hops.push(NextHop { face, cost }),
        }
        e.resort();
        debug!(prefix = %e.prefix, face_id = face.value(), cost, "fib next hop added or updated");
    }

    /// Removes `face` from the entry's next hops. If the entry becomes
    /// empty it is erased and the NameTree node pruned if eligible.
    pub fn remove_next_hop(&mut self, tree: &mut NameTree, entry: FibEntryId, face: FaceId) {
        let (node, prefix) = {
            let e = self.entries.get_mut(entry.0).expect("stale FibEntryId");
            e.next_hops.retain(|nh| nh.face != face);
            (e.name_tree_entry, e.prefix.clone())
        };
        debug!(prefix = %prefix, face_id = face.value(), "fib next hop removed");
        if self.entries.get(entry.0).unwrap().next_hops.is_empty() {
            self.erase(tree, entry, node);
        }
    }

    fn erase(&mut self, tree: &mut NameTree, entry: FibEntryId, node: NameTreeEntryId) {
        if let Some(e) = self.entries.get(entry.0) {
            debug!(prefix = %e.prefix, "fib entry erased");
        }
        self.entries.remove(entry.0);
        tree.set_fib(node, None);
        tree.erase_if_empty(node);
    }

    /// Iterates all FIB entries and drops `face`, pruning any entry that
    /// becomes empty.
    pub fn remove_face(&mut self, tree: &mut NameTree, face: FaceId) {
        let ids: Vec<FibEntryId> = self
            .entries
            .iter()
            .map(|(idx, _)| FibEntryId(idx))
            .collect();
        for id in ids {
            if self
                .entries
                .get(id.0)
                .map(|e| e.next_hops.iter().any(|nh| nh.face == face))
                .unwrap_or(false)
            {
                self.remove_next_hop(tree, id, face);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_hops_sorted_by_cost_then_face() {
        let mut tree = NameTree::new();
        let mut fib = Fib::new();
        let (id, is_new) = fib.insert(&mut tree, &Name::parse_uri("/a").unwrap());
        assert!(is_new);
        fib.add_or_update_next_hop(id, FaceId::new(3), 20);
        fib.add_or_update_next_hop(id, FaceId::new(1), 10);
        fib.add_or_update_next_hop(id, FaceId::new(2), 10);
        let hops = fib.entry(id).next_hops();
        assert_eq!(
            hops.iter().map(|h| (h.face, h.cost)).collect::<Vec<_>>(),
            vec![
                (FaceId::new(1), 10),
                (FaceId::new(2), 10),
                (FaceId::new(3), 20),
            ]
        );
    }

    #[test]
    fn removing_last_next_hop_erases_entry_and_prunes() {
        let mut tree = NameTree::new();
        let mut fib = Fib::new();
        let (id, _) = fib.insert(&mut tree, &Name::parse_uri("/a/b").unwrap());
        fib.add_or_update_next_hop(id, FaceId::new(1), 10);
        fib.remove_next_hop(&mut tree, id, FaceId::new(1));
        assert!(fib.is_empty());
        assert!(tree.find_exact_match(&Name::parse_uri("/a/b").unwrap()).is_none());
    }

    #[test]
    fn longest_prefix_match() {
        let mut tree = NameTree::new();
        let mut fib = Fib::new();
        let (root_fib, _) = fib.insert(&mut tree, &Name::root());
        fib.add_or_update_next_hop(root_fib, FaceId::new(1), 1);
        let (a_fib, _) = fib.insert(&mut tree, &Name::parse_uri("/a").unwrap());
        fib.add_or_update_next_hop(a_fib, FaceId::new(2), 1);

        let matched = fib
            .find_longest_prefix_match(&tree, &Name::parse_uri("/a/b/c").unwrap())
            .unwrap();
        assert_eq!(matched, a_fib);

        fib.remove_next_hop(&mut tree, a_fib, FaceId::new(2));
        let matched = fib
            .find_longest_prefix_match(&tree, &Name::parse_uri("/a/b/c").unwrap())
            .unwrap();
        assert_eq!(matched, root_fib);
    }

    #[test]
    fn remove_face_prunes_all_entries() {
        let mut tree = NameTree::new();
        let mut fib = Fib::new();
        let (a, _) = fib.insert(&mut tree, &Name::parse_uri("/a").unwrap());
        let (b, _) = fib.insert(&mut tree, &Name::parse_uri("/b").unwrap());
        fib.add_or_update_next_hop(a, FaceId::new(9), 1);
        fib.add_or_update_next_hop(b, FaceId::new(9), 1);
        fib.remove_face(&mut tree, FaceId::new(9));
        assert!(fib.is_empty());
    }
}
