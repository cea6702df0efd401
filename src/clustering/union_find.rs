//! Disjoint-set forest over dense event positions.
//!
//! Parents and sizes live in flat arrays addressed by the event's position in
//! catalog order. `find` is iterative with path halving; `union` attaches the
//! smaller tree under the larger. Component membership never depends on which
//! root wins a union, only on which pairs were united.

/// Union-find keyed by dense `u32` positions.
#[derive(Debug, Clone)]
pub struct DisjointSet {
    parent: Vec<u32>,
    size: Vec<u32>,
    components: usize,
}

impl DisjointSet {
    /// Creates `len` singleton sets.
    pub fn new(len: usize) -> Self {
        Self { parent: (0..len as u32).collect(), size: vec![1; len], components: len }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Number of disjoint sets currently held.
    pub fn component_count(&self) -> usize {
        self.components
    }

    /// Root of `x`'s set, halving the path on the way up.
    pub fn find(&mut self, x: u32) -> u32 {
        let mut current = x;
        while self.parent[current as usize] != current {
            let grandparent = self.parent[self.parent[current as usize] as usize];
            self.parent[current as usize] = grandparent;
            current = grandparent;
        }
        current
    }

    /// Merge the sets holding `a` and `b`. Returns `true` if they were distinct.
    pub fn union(&mut self, a: u32, b: u32) -> bool {
        let mut root_a = self.find(a);
        let mut root_b = self.find(b);
        if root_a == root_b {
            return false;
        }
        if self.size[root_a as usize] < self.size[root_b as usize] {
            std::mem::swap(&mut root_a, &mut root_b);
        }
        self.parent[root_b as usize] = root_a;
        self.size[root_a as usize] += self.size[root_b as usize];
        self.components -= 1;
        true
    }

    pub fn same(&mut self, a: u32, b: u32) -> bool {
        self.find(a) == self.find(b)
    }

    /// Size of the set holding `x`.
    pub fn set_size(&mut self, x: u32) -> u32 {
        let root = self.find(x);
        self.size[root as usize]
    }

    /// Every set as ascending member positions, ordered by smallest member.
    pub fn components(&mut self) -> Vec<Vec<u32>> {
        let mut slot_of_root: Vec<u32> = vec![u32::MAX; self.parent.len()];
        let mut groups: Vec<Vec<u32>> = Vec::with_capacity(self.components);
        for x in 0..self.parent.len() as u32 {
            let root = self.find(x) as usize;
            if slot_of_root[root] == u32::MAX {
                slot_of_root[root] = groups.len() as u32;
                groups.push(Vec::new());
            }
            groups[slot_of_root[root] as usize].push(x);
        }
        groups
    }
}
