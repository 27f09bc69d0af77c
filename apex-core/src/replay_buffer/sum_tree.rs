//! Array-backed sum tree for proportional sampling.

/// A complete binary tree of priority sums, stored in an array.
///
/// The array has `2 * capacity - 1` nodes. Leaves `[capacity - 1, 2 * capacity - 2]`
/// hold the priorities of the memory slots, and every internal node `i` holds
/// `node[2i + 1] + node[2i + 2]`. The root is the total priority.
#[derive(Clone, Debug)]
pub struct SumTree {
    capacity: usize,
    nodes: Vec<f64>,
}

impl SumTree {
    /// Creates a tree with all priorities zero.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity of SumTree must be positive");
        Self {
            capacity,
            nodes: vec![0.; 2 * capacity - 1],
        }
    }

    /// Returns the number of leaves.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of nodes, i.e., `2 * capacity - 1`.
    pub fn len_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the sum of all priorities.
    #[inline]
    pub fn total_priority(&self) -> f64 {
        self.nodes[0]
    }

    /// Returns the priority of a memory slot.
    pub fn get(&self, index: usize) -> f64 {
        assert!(index < self.capacity);
        self.nodes[index + self.capacity - 1]
    }

    /// Sets the priority of a memory slot and propagates the change to the root.
    pub fn update(&mut self, index: usize, priority: f64) {
        assert!(index < self.capacity, "{} >= {}", index, self.capacity);
        let mut node = index + self.capacity - 1;
        let delta = priority - self.nodes[node];
        self.nodes[node] = priority;

        while node != 0 {
            node = (node - 1) / 2;
            self.nodes[node] += delta;
        }
    }

    /// Finds the leaf whose cumulative range contains `value`.
    ///
    /// Returns `(priority, index)`. `value` is clamped into `[0, total_priority)`.
    ///
    /// # Panics
    ///
    /// Panics if the tree is empty, i.e., `total_priority() == 0`.
    pub fn find(&self, value: f64) -> (f64, usize) {
        let total = self.total_priority();
        assert!(total > 0., "find() called on an empty SumTree");

        let mut value = value.max(0.).min(total);
        let mut node = 0;
        let first_leaf = self.capacity - 1;

        while node < first_leaf {
            let left = 2 * node + 1;
            let right = left + 1;
            if value < self.nodes[left] || self.nodes[right] <= 0. {
                node = left;
            } else {
                value -= self.nodes[left];
                node = right;
            }
        }

        (self.nodes[node], node - first_leaf)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn sum_of_leaves(tree: &SumTree) -> f64 {
        (0..tree.capacity()).map(|i| tree.get(i)).sum()
    }

    fn check_internal_nodes(tree: &SumTree) {
        for i in 0..tree.capacity() - 1 {
            let sum = tree.nodes[2 * i + 1] + tree.nodes[2 * i + 2];
            assert!((tree.nodes[i] - sum).abs() < 1e-9);
        }
    }

    #[test]
    fn test_new_is_empty() {
        let tree = SumTree::new(8);
        assert_eq!(tree.total_priority(), 0.);
        assert_eq!(tree.len_nodes(), 15);
    }

    #[test]
    fn test_total_equals_sum_of_leaves() {
        let mut rng = StdRng::seed_from_u64(42);
        for capacity in [1, 2, 5, 8, 13] {
            let mut tree = SumTree::new(capacity);
            for _ in 0..500 {
                let ix = rng.gen_range(0..capacity);
                tree.update(ix, rng.gen_range(0.0..10.0));
                assert!((tree.total_priority() - sum_of_leaves(&tree)).abs() < 1e-6);
            }
            check_internal_nodes(&tree);
        }
    }

    #[test]
    fn test_find_cumulative_ranges() {
        let mut tree = SumTree::new(8);
        for (i, p) in [1., 2., 3., 4.].iter().enumerate() {
            tree.update(i, *p);
        }
        assert_eq!(tree.total_priority(), 10.);
        assert_eq!(tree.find(0.5), (1., 0));
        assert_eq!(tree.find(2.0), (2., 1));
        // 3.0 opens the range [3, 6) of slot 2
        assert_eq!(tree.find(3.0), (3., 2));
        assert_eq!(tree.find(5.5), (3., 2));
        assert_eq!(tree.find(9.9), (4., 3));
        assert_eq!(tree.find(1.0).1, 1);
        assert_eq!(tree.find(6.0).1, 3);
    }

    #[test]
    fn test_find_boundaries() {
        let mut rng = StdRng::seed_from_u64(0);
        for capacity in [1, 3, 7, 8, 100] {
            let mut tree = SumTree::new(capacity);
            for i in 0..capacity {
                if i % 3 != 1 {
                    tree.update(i, rng.gen_range(0.1..5.0));
                }
            }
            let total = tree.total_priority();
            for value in [0., total - 1e-9, total, total * 2., -1.] {
                let (p, ix) = tree.find(value);
                assert!(ix < capacity);
                assert!(p > 0.);
            }
        }
    }

    #[test]
    fn test_find_skips_zero_leaves() {
        let mut tree = SumTree::new(4);
        tree.update(1, 2.);
        assert_eq!(tree.find(0.).1, 1);
        assert_eq!(tree.find(2.).1, 1);
    }

    #[test]
    #[should_panic]
    fn test_find_on_empty_tree_panics() {
        SumTree::new(4).find(0.);
    }
}
