use smallvec::smallvec;

use super::{Element, GaussNode, ShapeDerivatives, ShapeValues};

static REFERENCE_NODES: [[f64; 1]; 2] = [[-1.], [1.]];

static GAUSS_NODES: [GaussNode<1>; 2] = [
    GaussNode {
        position: [-0.577_350_269_189_625_8],
        weight: 1.,
    },
    GaussNode {
        position: [0.577_350_269_189_625_8],
        weight: 1.,
    },
];

/// A linear segment in a `D`-dimensional world.
///
/// The reference element is `[-1, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment<const D: usize> {
    nodes: [[f64; D]; 2],
}

impl<const D: usize> Element<1, D> for Segment<D> {
    const NUMBER_OF_NODES: usize = 2;

    fn from_nodes(nodes: &[[f64; D]]) -> Self {
        debug_assert_eq!(nodes.len(), Self::NUMBER_OF_NODES);
        Self {
            nodes: [nodes[0], nodes[1]],
        }
    }

    fn nodes(&self) -> &[[f64; D]] {
        &self.nodes
    }

    fn reference_nodes() -> &'static [[f64; 1]] {
        &REFERENCE_NODES
    }

    fn gauss_nodes() -> &'static [GaussNode<1>] {
        &GAUSS_NODES
    }

    fn center() -> [f64; 1] {
        [0.]
    }

    fn shape_values(&[u]: &[f64; 1]) -> ShapeValues {
        smallvec![0.5 * (1. - u), 0.5 * (1. + u)]
    }

    fn shape_derivatives(_local: &[f64; 1]) -> ShapeDerivatives<1> {
        smallvec![[-0.5], [0.5]]
    }

    fn contains_local(&[u]: &[f64; 1], tolerance: f64) -> bool {
        u.abs() <= 1. + tolerance
    }
}
