//! Geometric contract of the container elements.
//!
//! The [`BarycentricLocator`](crate::BarycentricLocator) never looks at a concrete element type:
//! everything it needs (forward isoparametric map, reference centroid, membership test and
//! connectivity size) is exposed by the [`Element`] trait. The crate ships the usual first-order
//! Lagrange elements, but any type implementing the trait can be located against.
//!
//! The const parameters are the dimension `L` of the reference (local) domain and the dimension
//! `D` of the world space, with `L <= D`.
use smallvec::SmallVec;

mod hexahedron;
mod quad;
mod segment;
mod tetrahedron;
mod triangle;

pub use hexahedron::Hexahedron;
pub use quad::Quad;
pub use segment::Segment;
pub use tetrahedron::Tetrahedron;
pub use triangle::Triangle;

/// Values of the shape functions at one point, one value per element node.
pub type ShapeValues = SmallVec<[f64; 8]>;

/// Reference-space gradients of the shape functions at one point, one per element node.
pub type ShapeDerivatives<const L: usize> = SmallVec<[[f64; L]; 8]>;

/// A quadrature point of an element, given in local coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussNode<const L: usize> {
    pub position: [f64; L],
    pub weight: f64,
}

/// An isoparametric element with `L` local dimensions living in a `D`-dimensional world.
pub trait Element<const L: usize, const D: usize>: Sized {
    /// Number of nodes of the element, i.e. the connectivity stride of a domain of such elements.
    const NUMBER_OF_NODES: usize;

    /// Builds an element from the world coordinates of its nodes, in connectivity order.
    ///
    /// `nodes` must contain exactly [`Self::NUMBER_OF_NODES`] positions.
    fn from_nodes(nodes: &[[f64; D]]) -> Self;

    /// World coordinates of the nodes of the element.
    fn nodes(&self) -> &[[f64; D]];

    /// Local coordinates of the nodes in the reference element.
    fn reference_nodes() -> &'static [[f64; L]];

    /// Quadrature points of the reference element.
    fn gauss_nodes() -> &'static [GaussNode<L>];

    /// Local coordinates of the centroid of the reference element.
    fn center() -> [f64; L];

    /// Shape functions evaluated at `local`.
    fn shape_values(local: &[f64; L]) -> ShapeValues;

    /// Derivatives of the shape functions with respect to the local coordinates at `local`.
    fn shape_derivatives(local: &[f64; L]) -> ShapeDerivatives<L>;

    /// Returns `true` if `local` lies inside the reference element, the reference domain being
    /// expanded by `tolerance` in every direction.
    fn contains_local(local: &[f64; L], tolerance: f64) -> bool;

    /// Maps local coordinates to world coordinates: `x(ξ) = Σ N_i(ξ) x_i`.
    fn world_coordinates(&self, local: &[f64; L]) -> [f64; D] {
        let mut x = [0.; D];
        for (n, node) in Self::shape_values(local).iter().zip(self.nodes()) {
            for (xi, ni) in x.iter_mut().zip(node) {
                *xi += n * ni;
            }
        }
        x
    }

    /// Jacobian of the isoparametric map at `local`, stored row-wise (`D` rows of `L` columns).
    fn jacobian(&self, local: &[f64; L]) -> [[f64; L]; D] {
        let mut jacobian = [[0.; L]; D];
        for (dn, node) in Self::shape_derivatives(local).iter().zip(self.nodes()) {
            for (row, x) in jacobian.iter_mut().zip(node) {
                for (j, dn_dl) in row.iter_mut().zip(dn) {
                    *j += x * dn_dl;
                }
            }
        }
        jacobian
    }

    /// World coordinates of the centroid of the element.
    fn world_center(&self) -> [f64; D] {
        self.world_coordinates(&Self::center())
    }
}
