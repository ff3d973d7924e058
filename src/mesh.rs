use std::{
    marker::PhantomData,
    sync::atomic::{AtomicUsize, Ordering},
};

use itertools::{iproduct, Itertools};
use smallvec::SmallVec;

use crate::element::{Element, Hexahedron, Quad};
use crate::error::{Error, Result};

static NEXT_MESH_ID: AtomicUsize = AtomicUsize::new(0);

/// Identity of a [`Mesh`].
///
/// Every mesh gets a new identity when it is created (or cloned), and identities are never
/// reused within a process. It is what the
/// [`BarycentricLocator`](crate::BarycentricLocator) uses to cache the location of the nodes of
/// an embedded mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(usize);

impl MeshId {
    fn next() -> Self {
        Self(NEXT_MESH_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// An immutable set of nodes in a `D`-dimensional world.
///
/// The index of a node in the mesh is its id.
#[derive(Debug)]
pub struct Mesh<const D: usize> {
    id: MeshId,
    positions: Vec<[f64; D]>,
}

impl<const D: usize> Clone for Mesh<D> {
    fn clone(&self) -> Self {
        Self::new(self.positions.clone())
    }
}

impl<const D: usize> Mesh<D> {
    /// Constructs a new `Mesh` from the world coordinates of its nodes.
    pub fn new(positions: Vec<[f64; D]>) -> Self {
        Self {
            id: MeshId::next(),
            positions,
        }
    }

    /// Constructs a new `Mesh` from a flat buffer of coordinates (`x0, y0, x1, y1, ...` in 2D).
    ///
    /// Fails with [`Error::DimensionMismatch`] (reporting the length of the buffer) if that length
    /// is not a multiple of `D`.
    pub fn from_flat(coordinates: Vec<f64>) -> Result<Self> {
        if D == 0 || coordinates.len() % D != 0 {
            return Err(Error::DimensionMismatch {
                expected: D,
                found: coordinates.len(),
            });
        }
        let positions = coordinates
            .chunks_exact(D)
            .map(|chunk| std::array::from_fn(|i| chunk[i]))
            .collect();
        Ok(Self::new(positions))
    }

    pub fn id(&self) -> MeshId {
        self.id
    }

    pub fn number_of_nodes(&self) -> usize {
        self.positions.len()
    }

    /// World coordinates of the node `node_id`, if it exists.
    pub fn position(&self, node_id: usize) -> Option<&[f64; D]> {
        self.positions.get(node_id)
    }

    pub fn positions(&self) -> &[[f64; D]] {
        &self.positions
    }
}

/// A set of elements of type `E` defined over the nodes of a [`Mesh`].
///
/// The connectivity is stored as a flat list of node indices, with a stride equal to
/// [`Element::NUMBER_OF_NODES`]. The domain borrows its mesh, which therefore cannot change for
/// as long as the domain (and anything built upon it) lives.
#[derive(Debug)]
pub struct Domain<'m, E, const L: usize, const D: usize> {
    mesh: &'m Mesh<D>,
    cells: Vec<usize>,
    element: PhantomData<fn() -> E>,
}

/// Iterator over the connectivity of the elements of a [`Domain`].
pub struct Cells<'a> {
    cells: &'a [usize],
    stride: usize,
    idx: usize,
}

impl<'a> Iterator for Cells<'a> {
    type Item = &'a [usize];

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.idx * self.stride;
        let end = start + self.stride;
        if self.stride == 0 || end > self.cells.len() {
            return None;
        }
        self.idx += 1;
        Some(&self.cells[start..end])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.cells.len() / self.stride.max(1)).saturating_sub(self.idx);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Cells<'_> {}

impl<'m, E, const L: usize, const D: usize> Domain<'m, E, L, D>
where
    E: Element<L, D>,
{
    /// Constructs a new `Domain` over `mesh`.
    ///
    /// Fails if the length of `cells` is not a multiple of the number of nodes per element, or if
    /// a node index does not exist in `mesh`.
    pub fn new(mesh: &'m Mesh<D>, cells: Vec<usize>) -> Result<Self> {
        let stride = E::NUMBER_OF_NODES;
        if cells.len() % stride != 0 {
            return Err(Error::InvalidConnectivity(format!(
                "{} node indices cannot be split into elements of {} nodes",
                cells.len(),
                stride
            )));
        }
        if let Some(&node) = cells.iter().find(|&&node| node >= mesh.number_of_nodes()) {
            return Err(Error::InvalidConnectivity(format!(
                "node {} does not exist in a mesh of {} nodes",
                node,
                mesh.number_of_nodes()
            )));
        }

        Ok(Self {
            mesh,
            cells,
            element: PhantomData,
        })
    }

    pub fn mesh(&self) -> &'m Mesh<D> {
        self.mesh
    }

    pub fn number_of_elements(&self) -> usize {
        self.cells.len() / E::NUMBER_OF_NODES
    }

    /// Node indices of the element `element_id`, in connectivity order.
    ///
    /// Panics if the element does not exist.
    pub fn element_nodes(&self, element_id: usize) -> &[usize] {
        let stride = E::NUMBER_OF_NODES;
        &self.cells[element_id * stride..(element_id + 1) * stride]
    }

    /// Builds the element `element_id` from the positions of its nodes.
    ///
    /// Panics if the element does not exist.
    pub fn element(&self, element_id: usize) -> E {
        let nodes: SmallVec<[[f64; D]; 8]> = self
            .element_nodes(element_id)
            .iter()
            .map(|&node| self.mesh.positions[node])
            .collect();
        E::from_nodes(&nodes)
    }

    /// An iterator over the connectivity of every element, in element id order.
    pub fn cells(&self) -> Cells<'_> {
        Cells {
            cells: &self.cells,
            stride: E::NUMBER_OF_NODES,
            idx: 0,
        }
    }
}

fn check_range(name: &str, min: f64, max: f64, n: usize) -> Result<()> {
    if !(min.is_finite() && max.is_finite() && min < max) {
        return Err(Error::InvalidGrid(format!(
            "the {} range [{}, {}] is empty",
            name, min, max
        )));
    }
    if n == 0 {
        return Err(Error::InvalidGrid(format!(
            "there should be at least one cell along {}",
            name
        )));
    }
    Ok(())
}

fn subdivide(min: f64, max: f64, n: usize) -> Vec<f64> {
    let h = (max - min) / n as f64;
    (0..=n)
        .map(|i| if i == n { max } else { min + i as f64 * h })
        .collect()
}

/// Creates a structured grid of `nx` by `ny` [`Quad`]s spanning `[xmin, xmax] x [ymin, ymax]`.
///
/// Returns the mesh and the flat connectivity of the quads. Nodes and cells are numbered first
/// from left to right, and then from bottom to top. Each cell is counter-clockwise.
pub fn rectangular_grid(
    xmin: f64,
    xmax: f64,
    ymin: f64,
    ymax: f64,
    nx: usize,
    ny: usize,
) -> Result<(Mesh<2>, Vec<usize>)> {
    check_range("x", xmin, xmax, nx)?;
    check_range("y", ymin, ymax, ny)?;

    let xs = subdivide(xmin, xmax, nx);
    let ys = subdivide(ymin, ymax, ny);
    let positions = iproduct!(&ys, &xs).map(|(&y, &x)| [x, y]).collect_vec();

    let stride = <Quad<2> as Element<2, 2>>::NUMBER_OF_NODES;
    let mut cells = Vec::with_capacity(nx * ny * stride);
    for (j, i) in iproduct!(0..ny, 0..nx) {
        let bottom_left = j * (nx + 1) + i;
        let top_left = bottom_left + nx + 1;
        cells.extend([bottom_left, bottom_left + 1, top_left + 1, top_left]);
    }

    Ok((Mesh::new(positions), cells))
}

/// Creates a structured grid of `n[0] x n[1] x n[2]` [`Hexahedron`]s spanning the box
/// `[min, max]`.
///
/// Nodes and cells are numbered along x first, then y, then z.
pub fn box_grid(min: [f64; 3], max: [f64; 3], n: [usize; 3]) -> Result<(Mesh<3>, Vec<usize>)> {
    for (axis, name) in ["x", "y", "z"].into_iter().enumerate() {
        check_range(name, min[axis], max[axis], n[axis])?;
    }

    let [xs, ys, zs] = [0, 1, 2].map(|axis| subdivide(min[axis], max[axis], n[axis]));
    let positions = iproduct!(&zs, &ys, &xs)
        .map(|(&z, &y, &x)| [x, y, z])
        .collect_vec();

    let [nx, ny, nz] = n;
    let node = |i: usize, j: usize, k: usize| (k * (ny + 1) + j) * (nx + 1) + i;
    let stride = <Hexahedron as Element<3, 3>>::NUMBER_OF_NODES;
    let mut cells = Vec::with_capacity(nx * ny * nz * stride);
    for (k, j, i) in iproduct!(0..nz, 0..ny, 0..nx) {
        cells.extend([
            node(i, j, k),
            node(i + 1, j, k),
            node(i + 1, j + 1, k),
            node(i, j + 1, k),
            node(i, j, k + 1),
            node(i + 1, j, k + 1),
            node(i + 1, j + 1, k + 1),
            node(i, j + 1, k + 1),
        ]);
    }

    Ok((Mesh::new(positions), cells))
}
