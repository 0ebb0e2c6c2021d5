//! Prefix-indexed shared trie. See spec §3, §4.1.
//!
//! Grounded on the spec's own design note (§9): nodes live in a
//! generation-counted arena (`generational-arena`) so that the FIB/PIT/
//! Measurements tables can hold a stable, checked back-pointer to their
//! NameTree node instead of a raw pointer or `Rc<RefCell<_>>` cycle -- the
//! same tradeoff `holo-routing-holo` makes for its own long-lived route
//! tables. The teacher's `fidinda-reto/src/tables.rs` keeps a flat
//! `Entries` arena with a `pruning_stack`; the eager bottom-up-create /
//! lazy-prune-on-release shape here is the same idea applied to four
//! separate owner tables instead of one combined one.

use std::collections::HashMap;

use generational_arena::{Arena, Index};

use crate::error::NameTreeError;
use crate::fib::FibEntryId;
use crate::measurements::MeasurementsEntryId;
use crate::name::Name;
use crate::pit::PitEntryId;

/// Stable handle to a node in the NameTree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NameTreeEntryId(pub(crate) Index);

struct Node {
    prefix: Name,
    parent: Option<NameTreeEntryId>,
    children: Vec<NameTreeEntryId>,
    fib: Option<FibEntryId>,
    pit: Vec<PitEntryId>,
    measurements: Option<MeasurementsEntryId>,
}

impl Node {
    fn has_back_pointers(&self) -> bool {
        self.fib.is_some() || !self.pit.is_empty() || self.measurements.is_some()
    }

    fn is_prunable(&self) -> bool {
        !self.has_back_pointers() && self.children.is_empty()
    }
}

pub struct NameTree {
    nodes: Arena<Node>,
    by_key: HashMap<Vec<u8>, NameTreeEntryId>,
    root: NameTreeEntryId,
}

impl Default for NameTree {
    fn default() -> Self {
        Self::new()
    }
}

impl NameTree {
    pub fn new() -> Self {
        let mut nodes = Arena::new();
        let root_idx = nodes.insert(Node {
            prefix: Name::root(),
            parent: None,
            children: Vec::new(),
            fib: None,
            pit: Vec::new(),
            measurements: None,
        });
        let root = NameTreeEntryId(root_idx);
        let mut by_key = HashMap::new();
        by_key.insert(Name::root().canonical_key(), root);
        NameTree {
            nodes,
            by_key,
            root,
        }
    }

    pub fn root(&self) -> NameTreeEntryId {
        self.root
    }

    pub fn prefix(&self, id: NameTreeEntryId) -> &Name {
        &self.node(id).prefix
    }

    pub fn parent(&self, id: NameTreeEntryId) -> Option<NameTreeEntryId> {
        self.node(id).parent
    }

    fn node(&self, id: NameTreeEntryId) -> &Node {
        self.nodes
            .get(id.0)
            .expect("NameTreeEntryId used after its node was freed")
    }

    fn node_mut(&mut self, id: NameTreeEntryId) -> &mut Node {
        self.nodes
            .get_mut(id.0)
            .expect("NameTreeEntryId used after its node was freed")
    }

    /// Returns the entry for `name`, creating it and every missing ancestor
    /// (bottom-up from the deepest missing one) if absent.
    pub fn lookup(&mut self, name: &Name) -> Result<NameTreeEntryId, NameTreeError> {
        if let Some(&id) = self.by_key.get(&name.canonical_key()) {
            return Ok(id);
        }

        // Walk toward the root collecting missing ancestors, innermost
        // first, then build them outermost (root-ward) first.
        let mut missing = vec![name.clone()];
        let mut cursor = name.parent();
        let mut nearest_existing = self.root;
        while let Some(ancestor) = cursor {
            if let Some(&id) = self.by_key.get(&ancestor.canonical_key()) {
                nearest_existing = id;
                break;
            }
            cursor = ancestor.parent();
            missing.push(ancestor);
        }

        let mut parent = nearest_existing;
        for missing_name in missing.into_iter().rev() {
            let idx = self.nodes.insert(Node {
                prefix: missing_name.clone(),
                parent: Some(parent),
                children: Vec::new(),
                fib: None,
                pit: Vec::new(),
                measurements: None,
            });
            let id = NameTreeEntryId(idx);
            self.by_key.insert(missing_name.canonical_key(), id);
            self.node_mut(parent).children.push(id);
            parent = id;
        }

        Ok(parent)
    }

    pub fn find_exact_match(&self, name: &Name) -> Option<NameTreeEntryId> {
        self.by_key.get(&name.canonical_key()).copied()
    }

    /// Walks from `name` toward the root, returning the first entry (which
    /// may be `name` itself, if present) satisfying `predicate`.
    pub fn find_longest_prefix_match(
        &self,
        name: &Name,
        mut predicate: impl FnMut(&Self, NameTreeEntryId) -> bool,
    ) -> Option<NameTreeEntryId> {
        let mut candidate = Some(name.clone());
        loop {
            let name = candidate.take()?;
            if let Some(id) = self.find_exact_match(&name) {
                if predicate(self, id) {
                    return Some(id);
                }
            }
            candidate = name.parent();
        }
    }

    pub fn set_fib(&mut self, id: NameTreeEntryId, fib: Option<FibEntryId>) {
        self.node_mut(id).fib = fib;
    }

    pub fn fib(&self, id: NameTreeEntryId) -> Option<FibEntryId> {
        self.node(id).fib
    }

    pub fn add_pit(&mut self, id: NameTreeEntryId, pit: PitEntryId) {
        self.node_mut(id).pit.push(pit);
    }

    pub fn remove_pit(&mut self, id: NameTreeEntryId, pit: PitEntryId) {
        self.node_mut(id).pit.retain(|p| *p != pit);
    }

    pub fn pit_entries(&self, id: NameTreeEntryId) -> &[PitEntryId] {
        &self.node(id).pit
    }

    pub fn set_measurements(&mut self, id: NameTreeEntryId, entry: Option<MeasurementsEntryId>) {
        self.node_mut(id).measurements = entry;
    }

    pub fn measurements(&self, id: NameTreeEntryId) -> Option<MeasurementsEntryId> {
        self.node(id).measurements
    }

    /// If `id` has no back-pointers and no children, detaches it from its
    /// parent and frees it, then recursively tries the parent. Never prunes
    /// the root.
    pub fn erase_if_empty(&mut self, id: NameTreeEntryId) {
        let mut current = id;
        loop {
            if current == self.root {
                return;
            }
            if !self.node(current).is_prunable() {
                return;
            }
            let parent = self.node(current).parent;
            let key = self.node(current).prefix.canonical_key();
            self.by_key.remove(&key);
            self.nodes.remove(current.0);
            if let Some(parent) = parent {
                self.node_mut(parent).children.retain(|c| *c != current);
                current = parent;
            } else {
                return;
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
