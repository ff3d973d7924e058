use smallvec::smallvec;

use super::{Element, GaussNode, ShapeDerivatives, ShapeValues};

//
//  3 +-------+ 2
//    |   v   |
//    |   +-u |
//    |       |
//  0 +-------+ 1
//
static REFERENCE_NODES: [[f64; 2]; 4] = [[-1., -1.], [1., -1.], [1., 1.], [-1., 1.]];

const G: f64 = 0.577_350_269_189_625_8;

static GAUSS_NODES: [GaussNode<2>; 4] = [
    GaussNode {
        position: [-G, -G],
        weight: 1.,
    },
    GaussNode {
        position: [G, -G],
        weight: 1.,
    },
    GaussNode {
        position: [-G, G],
        weight: 1.,
    },
    GaussNode {
        position: [G, G],
        weight: 1.,
    },
];

/// A bilinear quadrangle in a `D`-dimensional world.
///
/// The reference element is `[-1, 1]²` and the nodes are numbered counter-clockwise.
#[derive(Debug, Clone, PartialEq)]
pub struct Quad<const D: usize> {
    nodes: [[f64; D]; 4],
}

impl<const D: usize> Element<2, D> for Quad<D> {
    const NUMBER_OF_NODES: usize = 4;

    fn from_nodes(nodes: &[[f64; D]]) -> Self {
        debug_assert_eq!(nodes.len(), Self::NUMBER_OF_NODES);
        Self {
            nodes: [nodes[0], nodes[1], nodes[2], nodes[3]],
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
        [0., 0.]
    }

    fn shape_values(&[u, v]: &[f64; 2]) -> ShapeValues {
        REFERENCE_NODES
            .iter()
            .map(|&[ui, vi]| 0.25 * (1. + ui * u) * (1. + vi * v))
            .collect()
    }

    fn shape_derivatives(&[u, v]: &[f64; 2]) -> ShapeDerivatives<2> {
        let mut derivatives = smallvec![];
        for &[ui, vi] in &REFERENCE_NODES {
            derivatives.push([0.25 * ui * (1. + vi * v), 0.25 * vi * (1. + ui * u)]);
        }
        derivatives
    }

    fn contains_local(local: &[f64; 2], tolerance: f64) -> bool {
        local.iter().all(|x| x.abs() <= 1. + tolerance)
    }
}
