//! Transfer of nodal fields from a container domain to embedded meshes.
//!
//! The nodes of an embedded mesh are located once in the container domain, and the results are
//! kept by the locator for as long as the mesh is registered. A field sampled at the nodes of the
//! container mesh is then interpolated at each embedded node through the shape functions of the
//! element containing it:
//!
//! ```text
//! destination[i] = Σ_j N_j(ξ_i) · source[element_i.node_j]
//! ```
use std::sync::{Arc, PoisonError};

use itertools::Itertools;
use log::{debug, warn};
use rayon::prelude::*;

use crate::element::Element;
use crate::error::{Error, Result};
use crate::locator::{BarycentricLocator, BarycentricPoint, Slot};
use crate::mesh::{Mesh, MeshId};
use crate::point_locator::PointLocator;

/// A value that can be interpolated: a linear combination of values is a value.
pub trait FieldValue: Copy + Send + Sync {
    /// The neutral element of the addition.
    fn zero() -> Self;

    /// Adds `factor * other` to `self`.
    fn add_scaled(&mut self, other: &Self, factor: f64);
}

impl FieldValue for f64 {
    fn zero() -> Self {
        0.
    }

    fn add_scaled(&mut self, other: &Self, factor: f64) {
        *self += factor * other;
    }
}

impl<const N: usize> FieldValue for [f64; N] {
    fn zero() -> Self {
        [0.; N]
    }

    fn add_scaled(&mut self, other: &Self, factor: f64) {
        for (x, y) in self.iter_mut().zip(other) {
            *x += factor * y;
        }
    }
}

/// Location of every node of an embedded mesh.
#[derive(Debug)]
pub(crate) struct Registration<const L: usize> {
    points: Vec<BarycentricPoint<L>>,
    outside: Vec<usize>,
}

impl<'a, E, const L: usize, const D: usize> BarycentricLocator<'a, E, L, D>
where
    E: Element<L, D>,
{
    /// Locates every node of `mesh` and keeps the results for later transfers.
    ///
    /// Returns the ids of the nodes lying outside of the container domain, in ascending order.
    /// Registering a mesh that is already registered does not locate its nodes again.
    pub fn add_embedded_mesh(&self, mesh: &Mesh<D>) -> Vec<usize> {
        self.with_registration(mesh, |registration| registration.outside.clone())
    }

    /// Returns the location of the node `node_id` of `mesh` in the container domain.
    ///
    /// If the mesh is registered, the stored result is returned. Otherwise the node is located
    /// on the fly and the result is not stored.
    pub fn barycentric_point_of(
        &self,
        mesh: &Mesh<D>,
        node_id: usize,
    ) -> Result<BarycentricPoint<L>> {
        let position = mesh.position(node_id).ok_or(Error::NodeOutOfRange {
            node: node_id,
            count: mesh.number_of_nodes(),
        })?;

        let cached = self
            .registered(mesh.id())
            .and_then(|slot| slot.get().map(|registration| registration.points[node_id]));
        Ok(cached.unwrap_or_else(|| self.locate(position)))
    }

    /// Interpolates the nodal field `source_values` of the container mesh at the nodes of `mesh`.
    ///
    /// `source_values` must have one value per node of the container mesh, and `destination`
    /// one value per node of `mesh`. The mesh is registered if it was not already. The values
    /// at the nodes lying outside of the container domain are left untouched.
    pub fn interpolate_field<V>(
        &self,
        mesh: &Mesh<D>,
        source_values: &[V],
        destination: &mut [V],
    ) -> Result<()>
    where
        V: FieldValue,
    {
        self.check_source(source_values)?;
        if destination.len() != mesh.number_of_nodes() {
            return Err(Error::DimensionMismatch {
                expected: mesh.number_of_nodes(),
                found: destination.len(),
            });
        }

        self.with_registration(mesh, |registration| {
            destination
                .par_iter_mut()
                .zip(&registration.points)
                .for_each(|(value, point)| {
                    if let Some(interpolated) = self.interpolate(point, source_values) {
                        *value = interpolated;
                    }
                });
        });

        Ok(())
    }

    /// Interpolates the nodal field `source_values` of the container mesh at `point`.
    ///
    /// Returns [`None`] if the point was not found.
    ///
    /// Panics if the element of `point` does not exist in the container domain.
    pub fn interpolate_at<V>(
        &self,
        point: &BarycentricPoint<L>,
        source_values: &[V],
    ) -> Result<Option<V>>
    where
        V: FieldValue,
    {
        self.check_source(source_values)?;
        Ok(self.interpolate(point, source_values))
    }

    /// Whether the nodes of `mesh` have been located and stored.
    pub fn is_registered(&self, mesh: &Mesh<D>) -> bool {
        self.registered(mesh.id())
            .is_some_and(|slot| slot.get().is_some())
    }

    /// Drops the stored location of the nodes of `mesh`.
    ///
    /// Returns whether the mesh was registered.
    pub fn forget_embedded_mesh(&self, mesh: &Mesh<D>) -> bool {
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&mesh.id())
            .is_some_and(|slot| slot.get().is_some())
    }

    /// The ids of the nodes of `mesh` lying outside of the container domain, or [`None`] if the
    /// mesh is not registered.
    pub fn outside_nodes(&self, mesh: &Mesh<D>) -> Option<Vec<usize>> {
        self.registered(mesh.id())?
            .get()
            .map(|registration| registration.outside.clone())
    }

    fn check_source<V>(&self, source_values: &[V]) -> Result<()> {
        let expected = self.domain.mesh().number_of_nodes();
        if source_values.len() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                found: source_values.len(),
            });
        }
        Ok(())
    }

    fn interpolate<V>(&self, point: &BarycentricPoint<L>, source_values: &[V]) -> Option<V>
    where
        V: FieldValue,
    {
        let element_id = point.element_index?;
        let shape_values = E::shape_values(&point.local_coordinates);
        let value = self
            .domain
            .element_nodes(element_id)
            .iter()
            .zip(shape_values)
            .fold(V::zero(), |mut value, (&node, n)| {
                value.add_scaled(&source_values[node], n);
                value
            });
        Some(value)
    }

    fn registered(&self, mesh_id: MeshId) -> Option<Slot<L>> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&mesh_id)
            .map(Arc::clone)
    }

    /// Calls `f` with the registration of `mesh`, locating its nodes first if needed.
    ///
    /// Concurrent registrations of the same mesh locate its nodes only once, the other callers
    /// wait for the result.
    fn with_registration<T>(&self, mesh: &Mesh<D>, f: impl FnOnce(&Registration<L>) -> T) -> T {
        let slot = match self.registered(mesh.id()) {
            Some(slot) => slot,
            None => Arc::clone(
                self.registry
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .entry(mesh.id())
                    .or_default(),
            ),
        };
        f(slot.get_or_init(|| self.register(mesh)))
    }

    fn register(&self, mesh: &Mesh<D>) -> Registration<L> {
        let points = self.par_locate_many(mesh.positions());
        let outside = points.iter().positions(|point| !point.is_found()).collect_vec();
        if !outside.is_empty() {
            warn!(
                "{} of the {} nodes of embedded mesh {:?} are outside of the container domain",
                outside.len(),
                points.len(),
                mesh.id()
            );
        }
        debug!(
            "Registered embedded mesh {:?} of {} nodes",
            mesh.id(),
            points.len()
        );

        Registration { points, outside }
    }
}
