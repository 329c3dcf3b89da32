//! Stable topological ordering of mixins.

use std::collections::BTreeSet;

/// Precedence graph over declaration indices
#[derive(Debug, Clone)]
pub(crate) struct DependencyGraph {
    successors: Vec<BTreeSet<usize>>,
    predecessors: Vec<BTreeSet<usize>>,
}

impl DependencyGraph {
    pub(crate) fn new(nodes: usize) -> Self {
        Self {
            successors: vec![BTreeSet::new(); nodes],
            predecessors: vec![BTreeSet::new(); nodes],
        }
    }

    /// `before` must be applied before `after`
    pub(crate) fn add_edge(&mut self, before: usize, after: usize) {
        if before == after {
            return;
        }
        self.successors[before].insert(after);
        self.predecessors[after].insert(before);
    }

    pub(crate) fn edge_count(&self) -> usize {
        self.successors.iter().map(BTreeSet::len).sum()
    }

    /// Kahn's algorithm; among ready nodes the lowest index goes first.
    ///
    /// On failure returns one cycle in precedence order, with the first
    /// node repeated at the end.
    pub(crate) fn sort(&self) -> Result<Vec<usize>, Vec<usize>> {
        let count = self.successors.len();
        let mut in_degree: Vec<usize> = self.predecessors.iter().map(BTreeSet::len).collect();
        let mut ready: BTreeSet<usize> = (0..count).filter(|n| in_degree[*n] == 0).collect();
        let mut order = Vec::with_capacity(count);

        while let Some(node) = ready.pop_first() {
            order.push(node);
            for next in &self.successors[node] {
                in_degree[*next] -= 1;
                if in_degree[*next] == 0 {
                    ready.insert(*next);
                }
            }
        }

        if order.len() == count {
            return Ok(order);
        }
        let remaining: BTreeSet<usize> = (0..count).filter(|n| in_degree[*n] > 0).collect();
        Err(self.find_cycle(&remaining))
    }

    /// Every unsorted node keeps an unsorted predecessor, so walking
    /// predecessors from any of them must revisit a node.
    fn find_cycle(&self, remaining: &BTreeSet<usize>) -> Vec<usize> {
        let mut path: Vec<usize> = Vec::new();
        let mut current = remaining.first().copied();

        while let Some(node) = current {
            if let Some(start) = path.iter().position(|n| *n == node) {
                let mut cycle: Vec<usize> = path[start..].iter().rev().copied().collect();
                if let Some(first) = cycle.first().copied() {
                    cycle.push(first);
                }
                return cycle;
            }
            path.push(node);
            current = self.predecessors[node]
                .iter()
                .find(|p| remaining.contains(p))
                .copied();
        }
        path
    }
}
