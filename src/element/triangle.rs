use smallvec::smallvec;

use super::{Element, GaussNode, ShapeDerivatives, ShapeValues};

static REFERENCE_NODES: [[f64; 2]; 3] = [[0., 0.], [1., 0.], [0., 1.]];

static GAUSS_NODES: [GaussNode<2>; 3] = [
    GaussNode {
        position: [1. / 6., 1. / 6.],
        weight: 1. / 6.,
    },
    GaussNode {
        position: [2. / 3., 1. / 6.],
        weight: 1. / 6.,
    },
    GaussNode {
        position: [1. / 6., 2. / 3.],
        weight: 1. / 6.,
    },
];

/// A linear triangle in a `D`-dimensional world.
///
/// The reference element is the unit right triangle `(0, 0), (1, 0), (0, 1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Triangle<const D: usize> {
    nodes: [[f64; D]; 3],
}

impl<const D: usize> Element<2, D> for Triangle<D> {
    const NUMBER_OF_NODES: usize = 3;

    fn from_nodes(nodes: &[[f64; D]]) -> Self {
        debug_assert_eq!(nodes.len(), Self::NUMBER_OF_NODES);
        Self {
            nodes: [nodes[0], nodes[1], nodes[2]],
        }
    }

    fn nodes(&self) -> &[[f64; D]] {
        &self.nodes
    }

    fn reference_nodes() -> &'static [[f64; 2]] {
        &REFERENCE_NODES
    }

    fn gauss_nodes() -> &'static [GaussNode<2>] {
        &GAUSS_NODES
    }

    fn center() -> [f64; 2] {
        [1. / 3., 1. / 3.]
    }

    fn shape_values(&[u, v]: &[f64; 2]) -> ShapeValues {
        smallvec![1. - u - v, u, v]
    }

    fn shape_derivatives(_local: &[f64; 2]) -> ShapeDerivatives<2> {
        smallvec![[-1., -1.], [1., 0.], [0., 1.]]
    }

    fn contains_local(&[u, v]: &[f64; 2], tolerance: f64) -> bool {
        u >= -tolerance && v >= -tolerance && u + v <= 1. + tolerance
    }
}
