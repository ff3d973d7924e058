use std::{cmp::Ordering, collections::BinaryHeap};

use itertools::Itertools;
use log::debug;

use crate::error::{Error, Result};

/// Maximum number of nodes stored in a leaf of the k-d tree.
const BUCKET_SIZE: usize = 8;

/// Spatial search structure over the nodes of a container domain.
///
/// It answers two questions:
/// - which nodes are closest to a given point (with a k-d tree), and
/// - which elements are incident to a given node (with an incidence map).
///
/// Both structures are arenas: the k-d tree is backed by a [`Vec`] of nodes addressed by their
/// index, and the incidence map is stored in compressed form (a flat list of element ids plus
/// offsets), the same way the connectivity of a domain is. Neither owns the elements, they only
/// store indices.
///
/// The index is built once and reflects the connectivity it was built from. It is never updated.
#[derive(Debug)]
pub struct SpatialIndex<const D: usize> {
    tree: KdTree<D>,
    incidence: Incidence,
    element_count: usize,
}

impl<const D: usize> SpatialIndex<D> {
    /// Builds the spatial index of the elements `cells` over the node `positions`.
    ///
    /// Only the nodes referenced by at least one cell are indexed.
    ///
    /// Fails if there are no nodes or no cells, or if a cell references a node that does not
    /// exist in `positions`.
    pub fn new<'a, I>(positions: &[[f64; D]], cells: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a [usize]>,
    {
        let incidence = Incidence::new(positions.len(), cells)?;
        let element_count = incidence.element_count;
        let nodes = (0..positions.len())
            .filter(|&node| !incidence.get(node).is_empty())
            .collect_vec();
        if nodes.is_empty() || element_count == 0 {
            return Err(Error::EmptyMesh);
        }

        let tree = KdTree::new(positions, nodes);
        debug!(
            "Built spatial index of {} elements over {} nodes ({} k-d tree nodes)",
            element_count,
            tree.len(),
            tree.arena.len()
        );

        Ok(Self {
            tree,
            incidence,
            element_count,
        })
    }

    /// Number of indexed nodes, i.e. the nodes incident to at least one element.
    pub fn node_count(&self) -> usize {
        self.tree.len()
    }

    /// Number of elements of the incidence map.
    pub fn element_count(&self) -> usize {
        self.element_count
    }

    /// Returns the `k` nodes closest to `point`, closest first.
    ///
    /// Nodes at the same distance are sorted by ascending node id. If `k` exceeds the number of
    /// indexed nodes, every indexed node is returned.
    pub fn nearest_nodes(&self, point: &[f64; D], k: usize) -> Vec<usize> {
        self.tree
            .nearest(point, k)
            .into_iter()
            .map(|neighbour| neighbour.node)
            .collect()
    }

    /// Returns the nearest node to `point`.
    pub fn nearest_node(&self, point: &[f64; D]) -> usize {
        self.tree
            .nearest(point, 1)
            .first()
            .map(|neighbour| neighbour.node)
            .expect("The spatial index is never empty.")
    }

    /// Elements incident to `node`, sorted by ascending element id.
    ///
    /// The slice is empty if the node is not referenced by any element (or does not exist).
    pub fn elements_of_node(&self, node: usize) -> &[usize] {
        self.incidence.get(node)
    }
}

/// Node to elements adjacency, in compressed form.
#[derive(Debug)]
struct Incidence {
    elements: Vec<usize>,
    offsets: Vec<usize>,
    element_count: usize,
}

impl Incidence {
    fn new<'a, I>(node_count: usize, cells: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a [usize]>,
    {
        // First pass: count the incident elements of each node
        let mut pairs = Vec::new();
        let mut counts = vec![0; node_count];
        let mut element_count = 0;
        for (element, cell) in cells.into_iter().enumerate() {
            // A degenerate cell may repeat a node, it is still incident only once
            for &node in cell.iter().sorted_unstable().dedup() {
                let Some(count) = counts.get_mut(node) else {
                    return Err(Error::InvalidConnectivity(format!(
                        "element {} references node {} of a mesh of {} nodes",
                        element, node, node_count
                    )));
                };
                *count += 1;
                pairs.push((node, element));
            }
            element_count = element + 1;
        }

        // Second pass: fill the buckets. The pairs are visited in element order, so each bucket
        // ends up sorted.
        let mut offsets = Vec::with_capacity(node_count + 1);
        offsets.push(0);
        for count in &counts {
            offsets.push(offsets[offsets.len() - 1] + count);
        }
        let mut cursor = offsets[..node_count].to_vec();
        let mut elements = vec![0; pairs.len()];
        for (node, element) in pairs {
            elements[cursor[node]] = element;
            cursor[node] += 1;
        }

        Ok(Self {
            elements,
            offsets,
            element_count,
        })
    }

    fn get(&self, node: usize) -> &[usize] {
        match (self.offsets.get(node), self.offsets.get(node + 1)) {
            (Some(&start), Some(&end)) => &self.elements[start..end],
            _ => &[],
        }
    }
}

/// A k-d tree over a subset of the nodes of a mesh.
#[derive(Debug)]
struct KdTree<const D: usize> {
    arena: Vec<KdNode>,
    // Node ids, permuted so that each leaf covers a contiguous range
    nodes: Vec<usize>,
    // Coordinates of `nodes`, in the same order
    points: Vec<[f64; D]>,
}

#[derive(Debug)]
enum KdNode {
    Leaf {
        start: usize,
        end: usize,
    },
    Split {
        axis: usize,
        value: f64,
        left: usize,
        right: usize,
    },
}

/// A candidate nearest node. Ordered by distance, then by node id.
#[derive(Debug, Clone, Copy)]
struct Neighbour {
    distance: f64,
    node: usize,
}

impl PartialEq for Neighbour {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Neighbour {}

impl PartialOrd for Neighbour {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbour {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.node.cmp(&other.node))
    }
}

pub(crate) fn squared_distance<const D: usize>(a: &[f64; D], b: &[f64; D]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

impl<const D: usize> KdTree<D> {
    fn new(positions: &[[f64; D]], nodes: Vec<usize>) -> Self {
        let mut tree = Self {
            arena: Vec::new(),
            points: nodes.iter().map(|&node| positions[node]).collect(),
            nodes,
        };
        let mut order = (0..tree.nodes.len()).collect_vec();
        tree.split(&mut order, 0);

        // Apply the permutation computed by the splits
        tree.nodes = order.iter().map(|&i| tree.nodes[i]).collect();
        tree.points = order.iter().map(|&i| tree.points[i]).collect();
        tree
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Recursively splits `order[..]`, whose first element is at position `offset` in the final
    /// permutation. Returns the index of the created node in the arena.
    fn split(&mut self, order: &mut [usize], offset: usize) -> usize {
        let id = self.arena.len();
        if order.len() <= BUCKET_SIZE {
            self.arena.push(KdNode::Leaf {
                start: offset,
                end: offset + order.len(),
            });
            return id;
        }

        // Split along the axis of largest spread, at the median. Splitting by position rather
        // than by value means duplicated coordinates cannot prevent the recursion from ending.
        let axis = (0..D)
            .map(|axis| {
                let (min, max) = order.iter().fold((f64::MAX, f64::MIN), |(min, max), &i| {
                    let x = self.points[i][axis];
                    (min.min(x), max.max(x))
                });
                (axis, max - min)
            })
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(axis, _)| axis)
            .unwrap_or(0);
        let mid = order.len() / 2;
        let points = &self.points;
        order.select_nth_unstable_by(mid, |&i, &j| points[i][axis].total_cmp(&points[j][axis]));
        let value = self.points[order[mid]][axis];

        // Placeholder, patched once the children exist
        self.arena.push(KdNode::Leaf { start: 0, end: 0 });
        let (lower, upper) = order.split_at_mut(mid);
        let left = self.split(lower, offset);
        let right = self.split(upper, offset + mid);
        self.arena[id] = KdNode::Split {
            axis,
            value,
            left,
            right,
        };
        id
    }

    /// Returns the (at most) `k` nearest nodes to `point`, sorted by distance then node id.
    fn nearest(&self, point: &[f64; D], k: usize) -> Vec<Neighbour> {
        if k == 0 || self.arena.is_empty() {
            return Vec::new();
        }
        let mut heap = BinaryHeap::with_capacity(k.min(self.len()) + 1);
        self.search(0, point, k, &mut heap);
        heap.into_sorted_vec()
    }

    fn search(&self, id: usize, point: &[f64; D], k: usize, heap: &mut BinaryHeap<Neighbour>) {
        match self.arena[id] {
            KdNode::Leaf { start, end } => {
                for (&node, position) in self.nodes[start..end].iter().zip(&self.points[start..end])
                {
                    let candidate = Neighbour {
                        distance: squared_distance(point, position),
                        node,
                    };
                    if heap.len() < k {
                        heap.push(candidate);
                    } else if heap.peek().is_some_and(|worst| candidate < *worst) {
                        heap.pop();
                        heap.push(candidate);
                    }
                }
            }
            KdNode::Split {
                axis,
                value,
                left,
                right,
            } => {
                let diff = point[axis] - value;
                let (near, far) = if diff < 0. {
                    (left, right)
                } else {
                    (right, left)
                };
                self.search(near, point, k, heap);
                // Nodes at exactly the same distance as the worst candidate may still win on
                // their id, so the far side is pruned only when strictly farther.
                if heap.len() < k || heap.peek().is_some_and(|worst| diff * diff <= worst.distance) {
                    self.search(far, point, k, heap);
                }
            }
        }
    }
}
