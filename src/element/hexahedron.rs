use super::{Element, GaussNode, ShapeDerivatives, ShapeValues};

static REFERENCE_NODES: [[f64; 3]; 8] = [
    [-1., -1., -1.],
    [1., -1., -1.],
    [1., 1., -1.],
    [-1., 1., -1.],
    [-1., -1., 1.],
    [1., -1., 1.],
    [1., 1., 1.],
    [-1., 1., 1.],
];

const G: f64 = 0.577_350_269_189_625_8;

static GAUSS_NODES: [GaussNode<3>; 8] = [
    GaussNode {
        position: [-G, -G, -G],
        weight: 1.,
    },
    GaussNode {
        position: [G, -G, -G],
        weight: 1.,
    },
    GaussNode {
        position: [-G, G, -G],
        weight: 1.,
    },
    GaussNode {
        position: [G, G, -G],
        weight: 1.,
    },
    GaussNode {
        position: [-G, -G, G],
        weight: 1.,
    },
    GaussNode {
        position: [G, -G, G],
        weight: 1.,
    },
    GaussNode {
        position: [-G, G, G],
        weight: 1.,
    },
    GaussNode {
        position: [G, G, G],
        weight: 1.,
    },
];

/// A trilinear hexahedron.
///
/// The reference element is `[-1, 1]³`. Nodes 0 to 3 are the bottom face (`w = -1`) numbered
/// counter-clockwise, nodes 4 to 7 the top face in the same order.
#[derive(Debug, Clone, PartialEq)]
pub struct Hexahedron {
    nodes: [[f64; 3]; 8],
}

impl Element<3, 3> for Hexahedron {
    const NUMBER_OF_NODES: usize = 8;

    fn from_nodes(nodes: &[[f64; 3]]) -> Self {
        debug_assert_eq!(nodes.len(), Self::NUMBER_OF_NODES);
        Self {
            nodes: std::array::from_fn(|i| nodes[i]),
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
        [0., 0., 0.]
    }

    fn shape_values(&[u, v, w]: &[f64; 3]) -> ShapeValues {
        REFERENCE_NODES
            .iter()
            .map(|&[ui, vi, wi]| 0.125 * (1. + ui * u) * (1. + vi * v) * (1. + wi * w))
            .collect()
    }

    fn shape_derivatives(&[u, v, w]: &[f64; 3]) -> ShapeDerivatives<3> {
        REFERENCE_NODES
            .iter()
            .map(|&[ui, vi, wi]| {
                let (fu, fv, fw) = (1. + ui * u, 1. + vi * v, 1. + wi * w);
                [
                    0.125 * ui * fv * fw,
                    0.125 * vi * fu * fw,
                    0.125 * wi * fu * fv,
                ]
            })
            .collect()
    }

    fn contains_local(local: &[f64; 3], tolerance: f64) -> bool {
        local.iter().all(|x| x.abs() <= 1. + tolerance)
    }
}

#[cfg(test)]
mod tests {
    use itertools::iproduct;

    use super::*;

    /// An axis-aligned hexahedron given by two opposite corners.
    fn aligned(min: [f64; 3], max: [f64; 3]) -> Hexahedron {
        let nodes = REFERENCE_NODES.map(|reference| {
            let mut node = [0.; 3];
            for (((x, r), lo), hi) in node.iter_mut().zip(reference).zip(min).zip(max) {
                *x = if r < 0. { lo } else { hi };
            }
            node
        });
        Hexahedron::from_nodes(&nodes)
    }

    #[test]
    fn aligned_hexahedron_maps_the_reference_cube() {
        let hexa = aligned([0., 0., 0.], [2., 4., 6.]);

        for (u, v, w) in iproduct!([-1., 1.], [-1., 1.], [-1., 1.]) {
            let [x, y, z] = hexa.world_coordinates(&[u, v, w]);
            assert_eq!([x, y, z], [1. + u, 2. + 2. * v, 3. + 3. * w]);
        }
        assert_eq!(hexa.world_center(), [1., 2., 3.]);
    }
}
