//! Time integrators.

use crate::error::SimResult;
use crate::model::TransientModel;

/// Trait for time integrators.
pub trait Integrator {
    /// Advance state by one time step using the transient model.
    fn step<M: TransientModel>(
        &self,
        model: &M,
        t: f64,
        x: &M::State,
        dt: f64,
    ) -> SimResult<M::State>;
}

/// Integrators with an embedded local error estimate.
pub trait EmbeddedIntegrator: Integrator {
    /// Order of the embedded (lower order) solution.
    const ERROR_ORDER: i32;

    /// Advance by `dt`, returning the new state and the local error estimate.
    fn step_with_error<M: TransientModel>(
        &self,
        model: &M,
        t: f64,
        x: &M::State,
        dt: f64,
    ) -> SimResult<(M::State, M::State)>;
}

/// Classical RK4 (Runge-Kutta 4th order) integrator.
#[derive(Clone, Debug)]
pub struct RK4;

impl Integrator for RK4 {
    fn step<M: TransientModel>(
        &self,
        model: &M,
        t: f64,
        x: &M::State,
        dt: f64,
    ) -> SimResult<M::State> {
        let k1 = model.rhs(t, x)?;

        let x2 = model.add(x, &model.scale(&k1, 0.5 * dt));
        let k2 = model.rhs(t + 0.5 * dt, &x2)?;

        let x3 = model.add(x, &model.scale(&k2, 0.5 * dt));
        let k3 = model.rhs(t + 0.5 * dt, &x3)?;

        let x4 = model.add(x, &model.scale(&k3, dt));
        let k4 = model.rhs(t + dt, &x4)?;

        // Combine: x_new = x + (dt/6) * (k1 + 2*k2 + 2*k3 + k4)
        let k_sum = model.add(
            &model.add(&k1, &model.scale(&k2, 2.0)),
            &model.add(&model.scale(&k3, 2.0), &k4),
        );

        Ok(model.add(x, &model.scale(&k_sum, dt / 6.0)))
    }
}

/// Forward Euler (explicit, 1st order, fast for testing).
/// Calls rhs() once per step instead of 4 times (RK4).
#[derive(Clone, Debug)]
pub struct ForwardEuler;

impl Integrator for ForwardEuler {
    fn step<M: TransientModel>(
        &self,
        model: &M,
        t: f64,
        x: &M::State,
        dt: f64,
    ) -> SimResult<M::State> {
        let xdot = model.rhs(t, x)?;
        Ok(model.add(x, &model.scale(&xdot, dt)))
    }
}

/// Dormand-Prince 5(4) explicit Runge-Kutta pair.
///
/// Propagates the 5th order solution; the difference to the embedded 4th
/// order solution is the local error estimate.
#[derive(Clone, Debug)]
pub struct DormandPrince45;

mod dp {
    pub const C: [f64; 7] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0];

    pub const A2: [f64; 1] = [1.0 / 5.0];
    pub const A3: [f64; 2] = [3.0 / 40.0, 9.0 / 40.0];
    pub const A4: [f64; 3] = [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0];
    pub const A5: [f64; 4] = [
        19372.0 / 6561.0,
        -25360.0 / 2187.0,
        64448.0 / 6561.0,
        -212.0 / 729.0,
    ];
    pub const A6: [f64; 5] = [
        9017.0 / 3168.0,
        -355.0 / 33.0,
        46732.0 / 5247.0,
        49.0 / 176.0,
        -5103.0 / 18656.0,
    ];

    /// 5th order weights (also the last stage row, FSAL).
    pub const B: [f64; 6] = [
        35.0 / 384.0,
        0.0,
        500.0 / 1113.0,
        125.0 / 192.0,
        -2187.0 / 6784.0,
        11.0 / 84.0,
    ];

    /// 5th minus 4th order weights.
    pub const E: [f64; 7] = [
        71.0 / 57600.0,
        0.0,
        -71.0 / 16695.0,
        71.0 / 1920.0,
        -17253.0 / 339200.0,
        22.0 / 525.0,
        -1.0 / 40.0,
    ];
}

impl DormandPrince45 {
    fn stage<M: TransientModel>(
        model: &M,
        t: f64,
        x: &M::State,
        dt: f64,
        c: f64,
        a: &[f64],
        k: &[M::State],
    ) -> SimResult<M::State> {
        let terms: Vec<(f64, &M::State)> = a.iter().zip(k).map(|(ai, ki)| (ai * dt, ki)).collect();
        let xs = model.combine(x, &terms);
        model.rhs(t + c * dt, &xs)
    }
}

impl Integrator for DormandPrince45 {
    fn step<M: TransientModel>(
        &self,
        model: &M,
        t: f64,
        x: &M::State,
        dt: f64,
    ) -> SimResult<M::State> {
        self.step_with_error(model, t, x, dt).map(|(x_new, _)| x_new)
    }
}

impl EmbeddedIntegrator for DormandPrince45 {
    const ERROR_ORDER: i32 = 4;

    fn step_with_error<M: TransientModel>(
        &self,
        model: &M,
        t: f64,
        x: &M::State,
        dt: f64,
    ) -> SimResult<(M::State, M::State)> {
        let rows: [&[f64]; 5] = [&dp::A2, &dp::A3, &dp::A4, &dp::A5, &dp::A6];

        let mut k: Vec<M::State> = Vec::with_capacity(7);
        k.push(model.rhs(t, x)?);
        for (i, a) in rows.iter().enumerate() {
            let ki = Self::stage(model, t, x, dt, dp::C[i + 1], a, &k)?;
            k.push(ki);
        }

        let x_new = {
            let terms: Vec<(f64, &M::State)> =
                dp::B.iter().zip(&k).map(|(b, ki)| (b * dt, ki)).collect();
            model.combine(x, &terms)
        };
        k.push(model.rhs(t + dt, &x_new)?);

        let zero = model.scale(x, 0.0);
        let err_terms: Vec<(f64, &M::State)> =
            dp::E.iter().zip(&k).map(|(e, ki)| (e * dt, ki)).collect();
        let err = model.combine(&zero, &err_terms);

        Ok((x_new, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pl_core::Tolerances;

    /// dx/dt = -x, x(0) = 1.
    struct Decay;

    impl TransientModel for Decay {
        type State = f64;

        fn initial_state(&self) -> f64 {
            1.0
        }

        fn rhs(&self, _t: f64, x: &f64) -> SimResult<f64> {
            Ok(-x)
        }

        fn add(&self, a: &f64, b: &f64) -> f64 {
            a + b
        }

        fn scale(&self, a: &f64, scale: f64) -> f64 {
            a * scale
        }

        fn is_finite(&self, x: &f64) -> bool {
            x.is_finite()
        }

        fn error_norm(&self, err: &f64, y0: &f64, y1: &f64, tol: Tolerances) -> f64 {
            err.abs() / tol.weight(y0.abs().max(y1.abs()))
        }
    }

    fn integrate<I: Integrator>(integrator: &I, dt: f64, t_end: f64) -> f64 {
        let model = Decay;
        let mut x = model.initial_state();
        let steps = (t_end / dt).round() as usize;
        for i in 0..steps {
            x = integrator.step(&model, i as f64 * dt, &x, dt).unwrap();
        }
        x
    }

    #[test]
    fn rk4_accuracy() {
        let x = integrate(&RK4, 0.01, 1.0);
        assert!((x - (-1.0_f64).exp()).abs() < 1e-9);
    }

    #[test]
    fn forward_euler_first_order() {
        let x = integrate(&ForwardEuler, 0.001, 1.0);
        assert!((x - (-1.0_f64).exp()).abs() < 1e-3);
    }

    #[test]
    fn dormand_prince_accuracy_and_error_estimate() {
        let x = integrate(&DormandPrince45, 0.1, 1.0);
        assert!((x - (-1.0_f64).exp()).abs() < 1e-7);

        let (x1, err) = DormandPrince45.step_with_error(&Decay, 0.0, &1.0, 0.1).unwrap();
        let true_err = (x1 - (-0.1_f64).exp()).abs();
        assert!(err.abs() > 0.0);
        assert!(err.abs() < 1e-6);
        assert!(true_err < 1e-8);
    }

    #[test]
    fn dormand_prince_error_shrinks_with_step() {
        let (_, e_big) = DormandPrince45.step_with_error(&Decay, 0.0, &1.0, 0.4).unwrap();
        let (_, e_small) = DormandPrince45.step_with_error(&Decay, 0.0, &1.0, 0.2).unwrap();
        // local error of the embedded 4th order solution scales like h^5
        let ratio = e_big.abs() / e_small.abs();
        assert!(ratio > 20.0 && ratio < 45.0, "ratio = {ratio}");
    }
}
