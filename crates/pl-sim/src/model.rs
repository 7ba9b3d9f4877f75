//! TransientModel trait for pluggable dynamic systems.

use crate::error::SimResult;
use pl_core::Tolerances;

/// Trait for transient (dynamic) system models.
///
/// A TransientModel must implement:
/// - State type (Clone, for snapshots)
/// - Initial state
/// - RHS (right-hand side) computation: x_dot = f(t, x)
/// - Vector arithmetic for integration: add states, scale by scalar
/// - An error norm so adaptive integrators can control the step size
///
/// `rhs` takes `&self`: adaptive integrators evaluate at rejected and
/// repeated points, so the right-hand side must not depend on call history.
pub trait TransientModel {
    /// State type (must be Clone).
    type State: Clone;

    /// Return the initial state.
    fn initial_state(&self) -> Self::State;

    /// Compute state derivative dxdt = f(t, x).
    fn rhs(&self, t: f64, x: &Self::State) -> SimResult<Self::State>;

    /// Add two states element-wise: result = a + b.
    fn add(&self, a: &Self::State, b: &Self::State) -> Self::State;

    /// Scale a state by a scalar: result = scale * a.
    fn scale(&self, a: &Self::State, scale: f64) -> Self::State;

    /// True when every component is finite.
    fn is_finite(&self, x: &Self::State) -> bool;

    /// Weighted RMS norm of the local error `err`, each component weighted
    /// by `tol.abs + tol.rel * max(|y0|, |y1|)`. Values <= 1 are acceptable.
    fn error_norm(
        &self,
        err: &Self::State,
        y0: &Self::State,
        y1: &Self::State,
        tol: Tolerances,
    ) -> f64;

    /// Linear combination `base + sum(c_i * k_i)`.
    fn combine(&self, base: &Self::State, terms: &[(f64, &Self::State)]) -> Self::State {
        terms.iter().fold(base.clone(), |acc, (c, k)| {
            self.add(&acc, &self.scale(k, *c))
        })
    }
}
