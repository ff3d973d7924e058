//! Point location and field transfer between a container mesh and embedded meshes.
//!
//! A [`BarycentricLocator`] finds, for any world point, the element of a container [`Domain`]
//! containing it together with the local coordinates of the point in that element (a
//! [`BarycentricPoint`]). Fields sampled at the nodes of the container mesh can then be
//! interpolated at the nodes of other meshes through the shape functions of the elements.
//!
//! ```
//! use baryloc::{rectangular_grid, BarycentricLocator, Domain, Mesh, Quad};
//!
//! # fn main() -> baryloc::Result<()> {
//! let (mesh, cells) = rectangular_grid(-5., 5., -5., 5., 2, 2)?;
//! let domain = Domain::<Quad<2>, 2, 2>::new(&mesh, cells)?;
//! let locator = BarycentricLocator::new(&domain)?;
//!
//! let point = locator.locate(&[-2.5, -2.5]);
//! assert_eq!(point.element_index, Some(0));
//!
//! // Interpolate the x coordinate at the nodes of a finer mesh
//! let embedded = Mesh::new(vec![[-7.5, 0.], [-1., 1.], [3., 2.]]);
//! let source: Vec<f64> = mesh.positions().iter().map(|[x, _]| *x).collect();
//! let mut destination = vec![0.; 3];
//! locator.interpolate_field(&embedded, &source, &mut destination)?;
//! assert_eq!(locator.outside_nodes(&embedded), Some(vec![0]));
//! assert!((destination[2] - 3.).abs() < 1e-12);
//! # Ok(())
//! # }
//! ```
pub mod element;
mod error;
mod inversion;
mod locator;
mod mesh;
mod point_locator;
mod spatial_index;
mod transfer;

pub use element::{Element, GaussNode, Hexahedron, Quad, Segment, Tetrahedron, Triangle};
pub use error::{Error, Result};
pub use locator::{BarycentricLocator, BarycentricPoint, LocatorOptions};
pub use mesh::{box_grid, rectangular_grid, Cells, Domain, Mesh, MeshId};
pub use point_locator::PointLocator;
pub use spatial_index::SpatialIndex;
pub use transfer::FieldValue;
