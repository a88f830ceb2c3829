//! Union-find (disjoint set) over sparse document identifiers.
//!
//! Both the fuzzy and the semantic engines reduce a candidate-edge stream to
//! connected components with this structure. Identifiers are interned into
//! dense slots on first sight, `find` uses iterative path halving, and
//! `union` is by rank, so merging `E` edges over `N` identifiers runs in
//! near-linear time with `O(N)` memory and no recursion.

use ahash::AHashMap;

use crate::Identifier;

/// Disjoint-set forest keyed by [`Identifier`].
#[derive(Debug, Default, Clone)]
pub struct UnionFind {
    slots: AHashMap<Identifier, usize>,
    ids: Vec<Identifier>,
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    /// Create an empty forest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty forest with room for `capacity` identifiers.
    pub fn with_capacity(capacity: usize) -> Self {
        UnionFind {
            slots: AHashMap::with_capacity(capacity),
            ids: Vec::with_capacity(capacity),
            parent: Vec::with_capacity(capacity),
            rank: Vec::with_capacity(capacity),
        }
    }

    /// Number of identifiers seen so far.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether no identifier has been added.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Register an identifier as a singleton set if it is new.
    pub fn insert(&mut self, id: Identifier) -> usize {
        if let Some(&slot) = self.slots.get(&id) {
            return slot;
        }
        let slot = self.ids.len();
        self.slots.insert(id, slot);
        self.ids.push(id);
        self.parent.push(slot);
        self.rank.push(0);
        slot
    }

    fn find_slot(&mut self, mut slot: usize) -> usize {
        while self.parent[slot] != slot {
            let grandparent = self.parent[self.parent[slot]];
            self.parent[slot] = grandparent;
            slot = grandparent;
        }
        slot
    }

    /// Representative identifier of the set containing `id`, if `id` is known.
    pub fn find(&mut self, id: Identifier) -> Option<Identifier> {
        let slot = *self.slots.get(&id)?;
        let root = self.find_slot(slot);
        Some(self.ids[root])
    }

    /// Merge the sets of `a` and `b`, registering either if new.
    ///
    /// Returns `true` if two distinct sets were merged.
    pub fn union(&mut self, a: Identifier, b: Identifier) -> bool {
        let slot_a = self.insert(a);
        let slot_b = self.insert(b);
        let root_a = self.find_slot(slot_a);
        let root_b = self.find_slot(slot_b);

        if root_a == root_b {
            return false;
        }

        match self.rank[root_a].cmp(&self.rank[root_b]) {
            std::cmp::Ordering::Less => self.parent[root_a] = root_b,
            std::cmp::Ordering::Greater => self.parent[root_b] = root_a,
            std::cmp::Ordering::Equal => {
                self.parent[root_b] = root_a;
                self.rank[root_a] += 1;
            }
        }
        true
    }

    /// Whether `a` and `b` are in the same set.
    pub fn connected(&mut self, a: Identifier, b: Identifier) -> bool {
        match (self.find(a), self.find(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    /// Collapse the forest into `(member, root)` pairs for every non-root member.
    ///
    /// This is the compact form a shuffle partition hands to the global merge:
    /// replaying these pairs into another forest reproduces the same sets.
    pub fn into_edges(mut self) -> Vec<(Identifier, Identifier)> {
        let mut edges = Vec::with_capacity(self.ids.len());
        for slot in 0..self.ids.len() {
            let root = self.find_slot(slot);
            if root != slot {
                edges.push((self.ids[slot], self.ids[root]));
            }
        }
        edges
    }

    /// All sets with at least `min_size` members.
    ///
    /// Members are sorted ascending within each set and sets are ordered by
    /// their smallest member, so the result is independent of insertion order.
    pub fn components(&mut self, min_size: usize) -> Vec<Vec<Identifier>> {
        let mut groups: AHashMap<usize, Vec<Identifier>> = AHashMap::new();
        for slot in 0..self.ids.len() {
            let root = self.find_slot(slot);
            groups.entry(root).or_default().push(self.ids[slot]);
        }

        let mut components: Vec<Vec<Identifier>> = groups
            .into_values()
            .filter(|members| members.len() >= min_size)
            .map(|mut members| {
                members.sort_unstable();
                members
            })
            .collect();
        components.sort_unstable_by_key(|members| members[0]);
        components
    }
}
