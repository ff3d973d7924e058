//! Inversion of the isoparametric map of an element.
//!
//! Given an element with forward map `W: ξ -> x` and a world point `p`, we look for the local
//! coordinates `ξ` such that `W(ξ) = p` with a Gauss-Newton iteration: at each step the
//! linearized problem `J δ = p - W(ξ)` is solved in the least-squares sense through the normal
//! equations `(JᵀJ) δ = Jᵀ (p - W(ξ))`, factorized with an LU decomposition. When the element has
//! as many local dimensions as the world (`L = D`), this is exactly Newton's method; when it has
//! fewer (a surface in 3D for instance), points away from the element never reach the residual
//! tolerance.
use nalgebra::{DMatrix, DVector};

use crate::element::Element;

/// Returns the local coordinates of `point` in `element`, or [`None`] if the iteration did not
/// converge to a residual below `tolerance` within `max_iterations` steps.
///
/// The iteration starts at the center of the reference element. The result is *not* checked
/// against the reference domain: a converged `ξ` may very well lie outside of the element.
pub(crate) fn invert<E, const L: usize, const D: usize>(
    element: &E,
    point: &[f64; D],
    tolerance: f64,
    max_iterations: usize,
) -> Option<[f64; L]>
where
    E: Element<L, D>,
{
    let mut local = E::center();
    for _ in 0..max_iterations {
        let r = residual(element, &local, point);
        if r.norm() <= tolerance {
            return Some(local);
        }

        let jacobian = element.jacobian(&local);
        let j = DMatrix::from_fn(D, L, |row, col| jacobian[row][col]);
        let jt = j.transpose();
        // Singular normal matrices (degenerate elements) have no step
        let step = (&jt * &j).lu().solve(&(&jt * r))?;
        for (x, dx) in local.iter_mut().zip(step.iter()) {
            *x += dx;
        }
        if local.iter().any(|x| !x.is_finite()) {
            return None;
        }
    }

    (residual(element, &local, point).norm() <= tolerance).then_some(local)
}

/// `p - W(ξ)`
fn residual<E, const L: usize, const D: usize>(
    element: &E,
    local: &[f64; L],
    point: &[f64; D],
) -> DVector<f64>
where
    E: Element<L, D>,
{
    let x = element.world_coordinates(local);
    DVector::from_fn(D, |i, _| point[i] - x[i])
}
