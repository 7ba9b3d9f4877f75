//! Transient simulation of the closed PI loop.
//!
//! Provides:
//! - `TransientModel` trait for pluggable ODE systems
//! - Adaptive Dormand-Prince 5(4), fixed-step RK4 and forward Euler
//! - Sampling driver that reports the state at requested times
//! - Closed-loop trajectories with derived controller quantities
//! - Step-response metrics (overshoot, settling, steady state)

pub mod analysis;
pub mod closed_loop;
pub mod error;
pub mod integrator;
pub mod model;
pub mod sim;

pub use analysis::{StepMetrics, step_metrics};
pub use closed_loop::{ClosedLoopSystem, Sample, Trajectory, simulate};
pub use error::{FailureReason, SimError, SimResult};
pub use integrator::{DormandPrince45, EmbeddedIntegrator, ForwardEuler, Integrator, RK4};
pub use model::TransientModel;
pub use sim::{IntegratorType, SampleTimes, SimOptions, SimRecord, run_sim, run_sim_with_observer};
