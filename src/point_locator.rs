use rayon::prelude::*;

use crate::locator::BarycentricPoint;

/// A trait to locate one or several query points within a domain.
pub trait PointLocator<const L: usize, const D: usize> {
    /// Locates one query point within a domain.
    ///
    /// The result is [not found](BarycentricPoint::not_found) if the query point does not lie in
    /// any element of the domain.
    fn locate_one(&self, point: &[f64; D]) -> BarycentricPoint<L>;

    /// Locates several query points within a domain.
    fn locate_many(&self, points: &[[f64; D]]) -> Vec<BarycentricPoint<L>> {
        points.iter().map(|point| self.locate_one(point)).collect()
    }

    /// Locates several query points within a domain in parallel.
    fn par_locate_many(&self, points: &[[f64; D]]) -> Vec<BarycentricPoint<L>>
    where
        Self: std::marker::Sync,
    {
        points
            .par_iter()
            .map(|point| self.locate_one(point))
            .collect()
    }
}
