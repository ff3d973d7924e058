use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, OnceLock, RwLock},
};

use itertools::Itertools;
use log::{debug, trace};

use crate::element::Element;
use crate::error::{Error, Result};
use crate::inversion::invert;
use crate::mesh::{Domain, MeshId};
use crate::point_locator::PointLocator;
use crate::spatial_index::{squared_distance, SpatialIndex};
use crate::transfer::Registration;

/// Tuning parameters of a [`BarycentricLocator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocatorOptions {
    /// Absolute tolerance on the residual `‖W(ξ) - p‖` of the local coordinates inversion, in
    /// world units. Default: 1e-10
    pub residual_tolerance: f64,

    /// Maximum number of Newton iterations per element. Default: 25
    pub max_iterations: usize,

    /// Amount by which the reference domain of an element is expanded when checking if converged
    /// local coordinates are inside of it, in local units. Default: 1e-8
    pub inclusion_tolerance: f64,

    /// Number of nearest nodes whose incident elements are tried first. Default: 1
    pub initial_neighbours: usize,

    /// Factor by which the number of nearest nodes grows each time none of the candidate elements
    /// contains the point. Default: 4
    pub growth_factor: usize,

    /// Maximum number of nearest nodes considered before giving up. If None, the search goes on
    /// until every element of the domain has been tried. Default: None
    pub max_neighbours: Option<usize>,
}

impl Default for LocatorOptions {
    fn default() -> Self {
        Self {
            residual_tolerance: 1e-10,
            max_iterations: 25,
            inclusion_tolerance: 1e-8,
            initial_neighbours: 1,
            growth_factor: 4,
            max_neighbours: None,
        }
    }
}

impl LocatorOptions {
    #[must_use]
    pub fn with_residual_tolerance(self, residual_tolerance: f64) -> Self {
        Self {
            residual_tolerance,
            ..self
        }
    }

    #[must_use]
    pub fn with_inclusion_tolerance(self, inclusion_tolerance: f64) -> Self {
        Self {
            inclusion_tolerance,
            ..self
        }
    }

    #[must_use]
    pub fn with_max_iterations(self, max_iterations: usize) -> Self {
        Self {
            max_iterations,
            ..self
        }
    }

    /// Sets the escalation schedule: `initial` nearest nodes first, then `initial * growth`,
    /// `initial * growth²`, ...
    #[must_use]
    pub fn with_escalation(self, initial: usize, growth: usize) -> Self {
        Self {
            initial_neighbours: initial,
            growth_factor: growth,
            ..self
        }
    }

    #[must_use]
    pub fn with_max_neighbours(self, max_neighbours: Option<usize>) -> Self {
        Self {
            max_neighbours,
            ..self
        }
    }

    /// Checks that the options are usable.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| Err(Error::InvalidOptions(message.to_string()));
        if !(self.residual_tolerance.is_finite() && self.residual_tolerance > 0.) {
            return invalid("the residual tolerance should be finite and positive");
        }
        if !(self.inclusion_tolerance.is_finite() && self.inclusion_tolerance >= 0.) {
            return invalid("the inclusion tolerance should be finite and non-negative");
        }
        if self.max_iterations == 0 {
            return invalid("at least one iteration is needed");
        }
        if self.initial_neighbours == 0 || self.max_neighbours == Some(0) {
            return invalid("at least one neighbour is needed");
        }
        if self.growth_factor < 2 {
            return invalid("the growth factor should be at least 2");
        }
        Ok(())
    }
}

/// The location of a point in a container domain.
#[derive(Debug, Clone, Copy)]
pub struct BarycentricPoint<const L: usize> {
    /// Index of the element containing the point, or [`None`] if the point is outside of the
    /// container domain.
    pub element_index: Option<usize>,
    /// Local coordinates of the point in the element. Meaningless (NaN) when the point was not
    /// found.
    pub local_coordinates: [f64; L],
}

impl<const L: usize> BarycentricPoint<L> {
    pub fn new(element_index: usize, local_coordinates: [f64; L]) -> Self {
        Self {
            element_index: Some(element_index),
            local_coordinates,
        }
    }

    pub fn not_found() -> Self {
        Self {
            element_index: None,
            local_coordinates: [f64::NAN; L],
        }
    }

    pub fn is_found(&self) -> bool {
        self.element_index.is_some()
    }
}

impl<const L: usize> PartialEq for BarycentricPoint<L> {
    fn eq(&self, other: &Self) -> bool {
        match (self.element_index, other.element_index) {
            (Some(a), Some(b)) => a == b && self.local_coordinates == other.local_coordinates,
            (None, None) => true,
            _ => false,
        }
    }
}

/// Per embedded mesh location results, each computed at most once.
pub(crate) type Slot<const L: usize> = Arc<OnceLock<Registration<L>>>;

/// A point locator for an arbitrary domain of isoparametric elements.
///
/// The location of a point `p` is performed in two stages:
/// - the nearest node of the domain is found with a k-d tree, and the elements incident to it are
///   the candidates;
/// - for each candidate, in ascending id order, the isoparametric map of the element is inverted
///   (see [`LocatorOptions::residual_tolerance`]) and the element is accepted if the resulting
///   local coordinates lie in its reference domain (see [`LocatorOptions::inclusion_tolerance`]).
///
/// Points lying on a face shared by several elements are thus attributed to the element with the
/// smallest id among the candidates. If no candidate contains the point, the search is repeated
/// with the elements incident to the `k` nearest nodes, `k` growing geometrically (see
/// [`LocatorOptions::growth_factor`]). The search stops as soon as the `k`-th nearest node is
/// farther from the point than the largest element diameter: the elements left untried have all
/// of their nodes even farther, so none of them can contain the point.
///
/// The locator also keeps the location of the nodes of the embedded meshes registered with
/// [`add_embedded_mesh`](Self::add_embedded_mesh), so that fields can be transferred from the
/// container to these meshes without locating their nodes again.
#[derive(Debug)]
pub struct BarycentricLocator<'a, E, const L: usize, const D: usize> {
    pub(crate) domain: &'a Domain<'a, E, L, D>,
    index: SpatialIndex<D>,
    options: LocatorOptions,
    /// Largest distance between a point contained in an element and any node of that element.
    reach: f64,
    pub(crate) registry: RwLock<HashMap<MeshId, Slot<L>>>,
}

impl<'a, E, const L: usize, const D: usize> BarycentricLocator<'a, E, L, D>
where
    E: Element<L, D>,
{
    /// Constructs a new `BarycentricLocator` with the default options.
    ///
    /// Fails if the domain has no elements.
    pub fn new(domain: &'a Domain<'a, E, L, D>) -> Result<Self> {
        Self::with_options(domain, LocatorOptions::default())
    }

    /// Constructs a new `BarycentricLocator`.
    ///
    /// Fails if the domain has no elements or if the options are invalid.
    pub fn with_options(domain: &'a Domain<'a, E, L, D>, options: LocatorOptions) -> Result<Self> {
        options.validate()?;
        let positions = domain.mesh().positions();
        let index = SpatialIndex::new(positions, domain.cells())?;

        // Elements lie in the convex hull of their nodes, so the diameter bounds the distance
        // from any contained point to the nodes. The tolerances widen the element slightly.
        let diameter = domain
            .cells()
            .flat_map(|cell| cell.iter().tuple_combinations())
            .map(|(&a, &b)| squared_distance(&positions[a], &positions[b]))
            .fold(0., f64::max)
            .sqrt();
        let reach = diameter * (1. + 2. * L as f64 * options.inclusion_tolerance)
            + options.residual_tolerance;
        debug!(
            "Built barycentric locator over {} elements of {} nodes (largest diameter {})",
            domain.number_of_elements(),
            E::NUMBER_OF_NODES,
            diameter
        );

        Ok(Self {
            domain,
            index,
            options,
            reach,
            registry: RwLock::new(HashMap::new()),
        })
    }

    pub fn domain(&self) -> &'a Domain<'a, E, L, D> {
        self.domain
    }

    pub fn options(&self) -> &LocatorOptions {
        &self.options
    }

    pub fn spatial_index(&self) -> &SpatialIndex<D> {
        &self.index
    }

    /// Locates `point` in the container domain.
    pub fn locate(&self, point: &[f64; D]) -> BarycentricPoint<L> {
        self.search(point).0
    }

    /// Locates `point`, also returning the number of elements tried.
    fn search(&self, point: &[f64; D]) -> (BarycentricPoint<L>, usize) {
        if point.iter().any(|x| !x.is_finite()) {
            return (BarycentricPoint::not_found(), 0);
        }

        let node_count = self.index.node_count();
        let limit = self
            .options
            .max_neighbours
            .map_or(node_count, |max| max.min(node_count));
        let mut k = self.options.initial_neighbours.min(limit);
        let mut tried = HashSet::new();
        loop {
            let nearest = self.index.nearest_nodes(point, k);
            let candidates = nearest
                .iter()
                .flat_map(|&node| self.index.elements_of_node(node).iter().copied())
                .filter(|element| !tried.contains(element))
                .sorted_unstable()
                .dedup()
                .collect_vec();
            for element in candidates {
                if let Some(local) = self.try_element(element, point) {
                    return (BarycentricPoint::new(element, local), tried.len() + 1);
                }
                tried.insert(element);
            }

            let out_of_reach = nearest
                .last()
                .and_then(|&node| self.domain.mesh().position(node))
                .map_or(true, |position| {
                    squared_distance(point, position) > self.reach * self.reach
                });
            if k >= limit || out_of_reach {
                break;
            }
            k = k.saturating_mul(self.options.growth_factor).min(limit);
            trace!("Escalating the search of {:?} to {} nearest nodes", point, k);
        }

        trace!(
            "{:?} is outside of the container domain ({} elements tried)",
            point,
            tried.len()
        );
        (BarycentricPoint::not_found(), tried.len())
    }

    /// Locates a point given as a slice of coordinates.
    ///
    /// Fails if the slice does not have exactly `D` coordinates.
    pub fn locate_coordinates(&self, point: &[f64]) -> Result<BarycentricPoint<L>> {
        let point: [f64; D] = point.try_into().map_err(|_| Error::DimensionMismatch {
            expected: D,
            found: point.len(),
        })?;
        Ok(self.locate(&point))
    }

    /// Returns the local coordinates of `point` in the element `element_id` if it contains it.
    fn try_element(&self, element_id: usize, point: &[f64; D]) -> Option<[f64; L]> {
        let element = self.domain.element(element_id);
        let local = invert(
            &element,
            point,
            self.options.residual_tolerance,
            self.options.max_iterations,
        )?;
        E::contains_local(&local, self.options.inclusion_tolerance).then_some(local)
    }
}

impl<'a, E, const L: usize, const D: usize> PointLocator<L, D> for BarycentricLocator<'a, E, L, D>
where
    E: Element<L, D>,
{
    fn locate_one(&self, point: &[f64; D]) -> BarycentricPoint<L> {
        self.locate(point)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use itertools::iproduct;
    use proptest::prelude::*;
    use rand::prelude::*;
    use rand::Rng;
    use rand_chacha::ChaCha8Rng;
    use rstest::rstest;

    use crate::element::{tests::assert_near, Hexahedron, Quad, Segment, Triangle};
    use crate::mesh::{box_grid, rectangular_grid, Mesh};

    use super::*;

    prop_compose! {
        fn coords_in_range(xmin: f64, xmax: f64, ymin: f64, ymax: f64)
                          (x in xmin..xmax, y in ymin..ymax) -> [f64; 2] {
           [x, y]
        }
    }

    // 6:(-5, 5)              7:(0, 5)       8:(5, 5)
    //             +-------------+--------------+
    //             |             |              |
    //             |      2      |      3       |
    //             |             |              |
    // 3:(-5, 0)   +-------------+--------------+ 5:(5, 0)
    //             |             | 4:(0, 0)     |
    //             |      0      |      1       |
    //             |             |              |
    //             +-------------+--------------+
    //         0:(-5, -5)     1:(0, -5)      2:(5, -5)
    pub(crate) fn container() -> Mesh<2> {
        rectangular_grid(-5., 5., -5., 5., 2, 2).unwrap().0
    }

    pub(crate) fn quads(mesh: &Mesh<2>) -> Domain<'_, Quad<2>, 2, 2> {
        Domain::new(mesh, vec![0, 1, 4, 3, 1, 2, 5, 4, 3, 4, 7, 6, 4, 5, 8, 7]).unwrap()
    }

    /// Checks that every node, gauss point and center of the domain is found, in the element
    /// it comes from for the gauss points and the centers.
    fn check_self_consistency<E, const L: usize, const D: usize>(
        locator: &BarycentricLocator<'_, E, L, D>,
    ) where
        E: Element<L, D>,
    {
        let domain = locator.domain();
        for position in domain.mesh().positions() {
            let res = locator.locate(position);
            let element_id = res.element_index.expect("Nodes should be found");
            assert!(domain.element_nodes(element_id).iter().any(|&node| {
                domain.mesh().position(node) == Some(position)
            }));
            let element = domain.element(element_id);
            assert_near(&element.world_coordinates(&res.local_coordinates), position, 1e-10);
        }

        for element_id in 0..domain.number_of_elements() {
            let element = domain.element(element_id);
            for gauss_node in E::gauss_nodes() {
                let res = locator.locate(&element.world_coordinates(&gauss_node.position));
                assert_eq!(res.element_index, Some(element_id));
                assert_near(&res.local_coordinates, &gauss_node.position, 1e-10);
            }

            let res = locator.locate(&element.world_center());
            assert_eq!(res.element_index, Some(element_id));
            assert_near(&res.local_coordinates, &E::center(), 1e-10);
        }
    }

    #[test]
    fn empty_domain_returns_error() {
        let mesh = container();
        let domain = Domain::<Quad<2>, 2, 2>::new(&mesh, vec![]).unwrap();

        assert!(matches!(
            BarycentricLocator::new(&domain),
            Err(Error::EmptyMesh)
        ));
    }

    #[rstest]
    #[case(LocatorOptions::default().with_residual_tolerance(0.))]
    #[case(LocatorOptions::default().with_residual_tolerance(f64::NAN))]
    #[case(LocatorOptions::default().with_inclusion_tolerance(-1e-3))]
    #[case(LocatorOptions::default().with_max_iterations(0))]
    #[case(LocatorOptions::default().with_escalation(0, 4))]
    #[case(LocatorOptions::default().with_escalation(1, 1))]
    #[case(LocatorOptions::default().with_max_neighbours(Some(0)))]
    fn invalid_options_return_error(#[case] options: LocatorOptions) {
        let mesh = container();
        let domain = quads(&mesh);

        assert!(matches!(
            BarycentricLocator::with_options(&domain, options),
            Err(Error::InvalidOptions(..))
        ));
    }

    #[test]
    fn shared_node_is_found_in_the_first_element() -> anyhow::Result<()> {
        let mesh = container();
        let domain = quads(&mesh);
        let locator = BarycentricLocator::new(&domain)?;

        for _ in 0..10 {
            let res = locator.locate(&[0., 0.]);
            assert_eq!(res.element_index, Some(0));
            assert_near(&res.local_coordinates, &[1., 1.], 1e-10);
        }

        Ok(())
    }

    #[test]
    fn quad_grid_self_consistency() -> anyhow::Result<()> {
        let mesh = container();
        let domain = quads(&mesh);
        let locator = BarycentricLocator::new(&domain)?;

        check_self_consistency(&locator);

        Ok(())
    }

    #[test]
    fn distorted_quad_mesh_self_consistency() -> anyhow::Result<()> {
        // Move the interior nodes of a regular grid around
        let (mesh, cells) = rectangular_grid(0., 6., 0., 6., 6, 6)?;
        let mut rng = ChaCha8Rng::seed_from_u64(1234);
        let positions = mesh
            .positions()
            .iter()
            .map(|&[x, y]| {
                if x > 0. && x < 6. && y > 0. && y < 6. {
                    [x + rng.gen_range(-0.3..0.3), y + rng.gen_range(-0.3..0.3)]
                } else {
                    [x, y]
                }
            })
            .collect();
        let mesh = Mesh::new(positions);
        let domain = Domain::<Quad<2>, 2, 2>::new(&mesh, cells)?;
        let locator = BarycentricLocator::new(&domain)?;

        check_self_consistency(&locator);

        Ok(())
    }

    #[test]
    fn triangle_mesh_self_consistency() -> anyhow::Result<()> {
        //
        //  5
        //  +
        //  |\
        //  | \
        // 3+--+4
        //  |\ |\
        //  | \| \
        //  +--+--+
        //  0  1  2
        //
        let mesh = Mesh::new(vec![
            [0., 0.],
            [1., 0.],
            [2., 0.],
            [0., 1.],
            [1., 1.],
            [0., 2.],
        ]);
        let domain = Domain::<Triangle<2>, 2, 2>::new(&mesh, vec![0, 1, 3, 1, 2, 4, 3, 4, 5])?;
        let locator = BarycentricLocator::new(&domain)?;

        check_self_consistency(&locator);

        // There is no triangle between 1, 4 and 3
        assert!(!locator.locate(&[2. / 3., 2. / 3.]).is_found());

        Ok(())
    }

    #[test]
    fn hexahedral_mesh_self_consistency() -> anyhow::Result<()> {
        let (mesh, cells) = box_grid([0., 0., 0.], [3., 2., 1.], [3, 2, 2])?;
        let domain = Domain::<Hexahedron, 3, 3>::new(&mesh, cells)?;
        let locator = BarycentricLocator::new(&domain)?;

        check_self_consistency(&locator);
        assert!(!locator.locate(&[1.5, 1., 1.01]).is_found());

        Ok(())
    }

    #[test]
    fn segments_in_the_plane() -> anyhow::Result<()> {
        // A polyline: points off the line are never found
        let mesh = Mesh::new(vec![[0., 0.], [1., 0.], [2., 1.]]);
        let domain = Domain::<Segment<2>, 1, 2>::new(&mesh, vec![0, 1, 1, 2])?;
        let locator = BarycentricLocator::new(&domain)?;

        let res = locator.locate(&[1.5, 0.5]);
        assert_eq!(res.element_index, Some(1));
        assert_near(&res.local_coordinates, &[0.], 1e-12);
        assert!(!locator.locate(&[1.5, 0.4]).is_found());

        Ok(())
    }

    #[test]
    fn far_away_points_are_not_found() -> anyhow::Result<()> {
        let mesh = container();
        let domain = quads(&mesh);
        let locator = BarycentricLocator::new(&domain)?;

        assert_eq!(locator.locate(&[5.5, 0.]), BarycentricPoint::not_found());
        assert!(!locator.locate(&[-1e9, 1e9]).is_found());
        assert!(!locator.locate(&[f64::NAN, 0.]).is_found());
        assert!(!locator.locate(&[f64::INFINITY, 0.]).is_found());

        Ok(())
    }

    #[test]
    fn escalation_finds_elements_away_from_the_nearest_node() -> anyhow::Result<()> {
        // A small triangle (2) straddles the right edge of the rectangle
        //
        //  3 +-------------+ 2
        //    |        _/  6|
        //    |     _/   4 <|
        //    |  _/        5|
        //  0 +-------------+ 1
        //
        let mesh = Mesh::new(vec![
            [0., 0.],
            [4., 0.],
            [4., 2.],
            [0., 2.],
            [3.9, 1.],
            [4.1, 0.9],
            [4.1, 1.1],
        ]);
        let domain = Domain::<Triangle<2>, 2, 2>::new(&mesh, vec![0, 1, 3, 1, 2, 3, 4, 5, 6])?;
        let locator = BarycentricLocator::new(&domain)?;
        assert_eq!(locator.spatial_index().node_count(), 7);

        // Nearest node is 4, whose only element (2) does not contain the point
        assert_eq!(locator.spatial_index().nearest_node(&[3.5, 1.]), 4);
        let res = locator.locate(&[3.5, 1.]);
        assert_eq!(res.element_index, Some(1));

        // Unless the escalation is capped
        let options = LocatorOptions::default().with_max_neighbours(Some(1));
        let capped = BarycentricLocator::with_options(&domain, options)?;
        assert!(!capped.locate(&[3.5, 1.]).is_found());

        Ok(())
    }

    #[rstest]
    #[case([10.5, 5.1], 2)]
    #[case([-3., -3.], 2)]
    #[case([10.05, 5.1], 32)]
    #[case([5.1, 10.2], 32)]
    fn outside_points_are_rejected_after_a_few_elements(
        #[case] point: [f64; 2],
        #[case] max_tried: usize,
    ) -> anyhow::Result<()> {
        let (mesh, cells) = rectangular_grid(0., 10., 0., 10., 50, 50)?;
        let domain = Domain::<Quad<2>, 2, 2>::new(&mesh, cells)?;
        let locator = BarycentricLocator::new(&domain)?;

        let (res, tried) = locator.search(&point);

        assert!(!res.is_found());
        assert!(tried <= max_tried, "{} elements tried out of 2500", tried);

        Ok(())
    }

    #[test]
    fn locate_coordinates_checks_the_dimension() -> anyhow::Result<()> {
        let mesh = container();
        let domain = quads(&mesh);
        let locator = BarycentricLocator::new(&domain)?;

        assert_eq!(
            locator.locate_coordinates(&[2.5, -2.5])?,
            locator.locate(&[2.5, -2.5])
        );
        assert_eq!(
            locator.locate_coordinates(&[0., 0., 0.]),
            Err(Error::DimensionMismatch {
                expected: 2,
                found: 3
            })
        );

        Ok(())
    }

    #[test]
    fn parallel_location_is_deterministic() -> anyhow::Result<()> {
        let (mesh, cells) = rectangular_grid(0., 1., 0., 1., 10, 10)?;
        let domain = Domain::<Quad<2>, 2, 2>::new(&mesh, cells)?;
        let locator = BarycentricLocator::new(&domain)?;

        // Points on the edges and corners of the grid, where several elements compete
        let points = iproduct!(0..=20, 0..=20)
            .map(|(i, j)| [i as f64 * 0.05, j as f64 * 0.05])
            .collect_vec();

        let sequential = locator.locate_many(&points);
        let parallel = locator.par_locate_many(&points);

        assert_eq!(sequential, parallel);
        assert!(sequential.iter().all(|res| res.is_found()));

        Ok(())
    }

    #[test]
    fn random_triangulation() -> anyhow::Result<()> {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let points = (0..200)
            .map(|_| delaunator::Point {
                x: rng.gen::<f64>() * 10.,
                y: rng.gen::<f64>() * 10.,
            })
            .collect_vec();
        let triangulation = delaunator::triangulate(&points);
        let mesh = Mesh::new(points.iter().map(|p| [p.x, p.y]).collect());
        let domain = Domain::<Triangle<2>, 2, 2>::new(&mesh, triangulation.triangles)?;
        let locator = BarycentricLocator::new(&domain)?;

        check_self_consistency(&locator);

        // Check the results against a brute force search
        for _ in 0..200 {
            let point = [rng.gen::<f64>() * 12. - 1., rng.gen::<f64>() * 12. - 1.];
            let res = locator.locate(&point);
            let inside = (0..domain.number_of_elements())
                .filter(|&id| {
                    let element = domain.element(id);
                    invert(&element, &point, 1e-10, 25)
                        .is_some_and(|local| Triangle::<2>::contains_local(&local, 1e-8))
                })
                .collect_vec();
            assert_eq!(res.element_index, inside.first().copied());
        }

        Ok(())
    }

    #[test]
    fn barycentric_locator_proptest() -> anyhow::Result<()> {
        let (xmin, xmax) = (0., 10.);
        let (ymin, ymax) = (0., 10.);
        let (nx, ny) = (6, 6); // Use numbers that don't divide the sides evenly on purpose

        let (mesh, cells) = rectangular_grid(xmin, xmax, ymin, ymax, nx, ny)?;
        let domain = Domain::<Quad<2>, 2, 2>::new(&mesh, cells)?;
        let locator = BarycentricLocator::new(&domain)?;

        // Select the number of points generated. The higher it is, the more time the test takes.
        let np = 20;
        proptest!(|(points in proptest::collection::vec(coords_in_range(xmin, xmax, ymin, ymax), np))| {
            let locations = locator.locate_many(&points);

            for (point, res) in points.iter().zip(&locations) {
                let Some(idx) = res.element_index else {
                    panic!("All points should be in a cell but {:?} is not", &point);
                };
                let element = domain.element(idx);
                assert_near(&element.world_coordinates(&res.local_coordinates), point, 1e-10);
                assert!(Quad::<2>::contains_local(&res.local_coordinates, 1e-8));
            }
        });

        Ok(())
    }
}
