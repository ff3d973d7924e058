use smallvec::smallvec;

use super::{Element, GaussNode, ShapeDerivatives, ShapeValues};

static REFERENCE_NODES: [[f64; 3]; 4] = [[0., 0., 0.], [1., 0., 0.], [0., 1., 0.], [0., 0., 1.]];

const A: f64 = 0.585_410_196_624_968_5;
const B: f64 = 0.138_196_601_125_010_5;

static GAUSS_NODES: [GaussNode<3>; 4] = [
    GaussNode {
        position: [B, B, B],
        weight: 1. / 24.,
    },
    GaussNode {
        position: [A, B, B],
        weight: 1. / 24.,
    },
    GaussNode {
        position: [B, A, B],
        weight: 1. / 24.,
    },
    GaussNode {
        position: [B, B, A],
        weight: 1. / 24.,
    },
];

/// A linear tetrahedron.
///
/// The reference element is the unit tetrahedron `(0, 0, 0), (1, 0, 0), (0, 1, 0), (0, 0, 1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tetrahedron {
    nodes: [[f64; 3]; 4],
}

impl Element<3, 3> for Tetrahedron {
    const NUMBER_OF_NODES: usize = 4;

    fn from_nodes(nodes: &[[f64; 3]]) -> Self {
        debug_assert_eq!(nodes.len(), Self::NUMBER_OF_NODES);
        Self {
            nodes: [nodes[0], nodes[1], nodes[2], nodes[3]],
        }
    }

    fn nodes(&self) -> &[[f64; 3]] {
        &self.nodes
    }

    fn reference_nodes() -> &'static [[f64; 3]] {
        &REFERENCE_NODES
    }

    fn gauss_nodes() -> &'static [GaussNode<3>] {
        &GAUSS_NODES
    }

    fn center() -> [f64; 3] {
        [0.25, 0.25, 0.25]
    }

    fn shape_values(&[u, v, w]: &[f64; 3]) -> ShapeValues {
        smallvec![1. - u - v - w, u, v, w]
    }

    fn shape_derivatives(_local: &[f64; 3]) -> ShapeDerivatives<3> {
        smallvec![
            [-1., -1., -1.],
            [1., 0., 0.],
            [0., 1., 0.],
            [0., 0., 1.]
        ]
    }

    fn contains_local(&[u, v, w]: &[f64; 3], tolerance: f64) -> bool {
        u >= -tolerance && v >= -tolerance && w >= -tolerance && u + v + w <= 1. + tolerance
    }
}
