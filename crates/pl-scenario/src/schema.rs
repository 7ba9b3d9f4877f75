//! Scenario schema definitions.

use pl_controls::{ControlLimits, PiParams, SignalSpec};
use pl_core::Tolerances;
use pl_sim::{IntegratorType, SampleTimes, SimOptions};
use serde::{Deserialize, Serialize};

/// Current scenario file version.
pub const LATEST_VERSION: u32 = 1;

/// One closed-loop run: plant, controller, exogenous signals, initial state
/// and solver settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub plant: PlantDef,
    #[serde(default)]
    pub controller: ControllerDef,
    #[serde(default = "default_setpoint")]
    pub setpoint: SignalSpec,
    #[serde(default = "default_load")]
    pub load: SignalSpec,
    #[serde(default)]
    pub initial: InitialDef,
    #[serde(default)]
    pub span: SpanDef,
    #[serde(default, with = "serde_yaml::with::singleton_map")]
    pub samples: SamplesDef,
    #[serde(default)]
    pub solver: SolverDef,
}

fn default_setpoint() -> SignalSpec {
    SignalSpec::step(2.0, 1.0)
}

fn default_load() -> SignalSpec {
    SignalSpec::constant(0.0)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlantDef {
    pub c_p: f64,
}

impl Default for PlantDef {
    fn default() -> Self {
        Self { c_p: 1.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControllerDef {
    pub t_cl: f64,
    pub t_n: f64,
    #[serde(default)]
    pub use_ref: bool,
    #[serde(default)]
    pub adapt_t: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<LimitsDef>,
    #[serde(default)]
    pub integrator_relax: bool,
}

impl Default for ControllerDef {
    fn default() -> Self {
        Self {
            t_cl: 0.5,
            t_n: 1.5,
            use_ref: false,
            adapt_t: false,
            limits: None,
            integrator_relax: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LimitsDef {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct InitialDef {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub u: f64,
    #[serde(default)]
    pub r: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SpanDef {
    pub t_start: f64,
    pub t_end: f64,
}

impl Default for SpanDef {
    fn default() -> Self {
        Self {
            t_start: 0.0,
            t_end: 20.0,
        }
    }
}

/// Reported sample times: either a count of evenly spaced points or an
/// explicit list, written as a single-key map (`resolution: 1000` or
/// `times: [...]`) in both YAML and JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SamplesDef {
    Resolution(usize),
    Times(Vec<f64>),
}

impl Default for SamplesDef {
    fn default() -> Self {
        SamplesDef::Resolution(1000)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SolverMethod {
    #[default]
    DormandPrince45,
    Rk4,
    ForwardEuler,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SolverDef {
    #[serde(default)]
    pub method: SolverMethod,
    /// Fixed step for RK4 / forward Euler.
    #[serde(default = "default_dt")]
    pub dt: f64,
    #[serde(default = "default_abs_tol")]
    pub abs_tol: f64,
    #[serde(default = "default_rel_tol")]
    pub rel_tol: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_step: Option<f64>,
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

fn default_dt() -> f64 {
    1e-3
}

fn default_abs_tol() -> f64 {
    1e-9
}

fn default_rel_tol() -> f64 {
    1e-7
}

fn default_max_steps() -> usize {
    1_000_000
}

impl Default for SolverDef {
    fn default() -> Self {
        Self {
            method: SolverMethod::default(),
            dt: default_dt(),
            abs_tol: default_abs_tol(),
            rel_tol: default_rel_tol(),
            max_step: None,
            max_steps: default_max_steps(),
        }
    }
}

impl Scenario {
    /// Setpoint step to 1 at t = 2 s and load step to 0.5 at t = 10 s on a
    /// matched plant, with the command clamped to [-1, 1] and the integral
    /// relaxed back toward the bound while the command saturates.
    pub fn demo() -> Self {
        Self {
            version: LATEST_VERSION,
            name: "Setpoint and load step".to_string(),
            plant: PlantDef::default(),
            controller: ControllerDef {
                limits: Some(LimitsDef {
                    min: -1.0,
                    max: 1.0,
                }),
                integrator_relax: true,
                ..ControllerDef::default()
            },
            setpoint: default_setpoint(),
            load: SignalSpec::step(10.0, 0.5),
            initial: InitialDef::default(),
            span: SpanDef::default(),
            samples: SamplesDef::default(),
            solver: SolverDef::default(),
        }
    }

    /// Loop parameters for the model. Limits are carried as given; the model
    /// rejects inconsistent ones at construction.
    pub fn params(&self) -> PiParams {
        PiParams {
            c_p: self.plant.c_p,
            t_cl: self.controller.t_cl,
            t_n: self.controller.t_n,
            use_ref: self.controller.use_ref,
            adapt_t: self.controller.adapt_t,
            u_lim: self.controller.limits.map(|l| ControlLimits {
                u_min: l.min,
                u_max: l.max,
            }),
            integrator_relax: self.controller.integrator_relax,
        }
    }

    pub fn initial_state(&self) -> pl_controls::ClosedLoopState {
        pl_controls::ClosedLoopState::new(self.initial.x, self.initial.u, self.initial.r)
    }

    pub fn sim_options(&self) -> SimOptions {
        SimOptions {
            t_start: self.span.t_start,
            t_end: self.span.t_end,
            samples: match &self.samples {
                SamplesDef::Resolution(n) => SampleTimes::Resolution(*n),
                SamplesDef::Times(times) => SampleTimes::Explicit(times.clone()),
            },
            integrator: match self.solver.method {
                SolverMethod::DormandPrince45 => IntegratorType::DormandPrince45,
                SolverMethod::Rk4 => IntegratorType::RK4,
                SolverMethod::ForwardEuler => IntegratorType::ForwardEuler,
            },
            dt: self.solver.dt,
            tolerances: Tolerances {
                abs: self.solver.abs_tol,
                rel: self.solver.rel_tol,
            },
            initial_step: None,
            max_step: self.solver.max_step,
            max_steps: self.solver.max_steps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_yaml_uses_defaults() {
        let yaml = "version: 1\nname: minimal\n";
        let scenario: Scenario = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(scenario.plant.c_p, 1.0);
        assert_eq!(scenario.controller, ControllerDef::default());
        assert_eq!(scenario.setpoint, SignalSpec::step(2.0, 1.0));
        assert_eq!(scenario.load, SignalSpec::constant(0.0));
        assert_eq!(scenario.samples, SamplesDef::Resolution(1000));
        assert_eq!(scenario.solver, SolverDef::default());
    }

    #[test]
    fn solver_and_samples_parse() {
        let yaml = "\
version: 1
name: rk4
samples:
  times: [0.0, 1.0, 2.0]
solver:
  method: rk4
  dt: 0.01
";
        let scenario: Scenario = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(scenario.samples, SamplesDef::Times(vec![0.0, 1.0, 2.0]));
        let opts = scenario.sim_options();
        assert_eq!(opts.integrator, IntegratorType::RK4);
        assert_eq!(opts.dt, 0.01);
        assert_eq!(opts.samples, SampleTimes::Explicit(vec![0.0, 1.0, 2.0]));
    }

    #[test]
    fn samples_use_map_layout_in_yaml_and_json() {
        let yaml = serde_yaml::to_string(&Scenario::demo()).unwrap();
        assert!(yaml.contains("samples:\n  resolution: 1000"), "{yaml}");
        assert!(!yaml.contains('!'), "{yaml}");

        let json = serde_json::to_value(Scenario::demo()).unwrap();
        assert_eq!(json["samples"], serde_json::json!({ "resolution": 1000 }));

        let from_json: Scenario = serde_json::from_str(
            r#"{"version": 1, "name": "json", "samples": {"times": [0.0, 2.5]}}"#,
        )
        .unwrap();
        assert_eq!(from_json.samples, SamplesDef::Times(vec![0.0, 2.5]));
    }

    #[test]
    fn demo_maps_to_params() {
        let demo = Scenario::demo();
        let params = demo.params();
        assert_eq!(params.c_p, 1.0);
        assert_eq!(params.t_cl, 0.5);
        assert_eq!(params.t_n, 1.5);
        assert_eq!(
            params.u_lim,
            Some(ControlLimits {
                u_min: -1.0,
                u_max: 1.0
            })
        );
        assert!(params.integrator_relax);
        assert!(!params.use_ref);
        let opts = demo.sim_options();
        assert_eq!(opts.t_end, 20.0);
        assert_eq!(opts.samples, SampleTimes::Resolution(1000));
        assert_eq!(opts.tolerances.rel, 1e-7);
    }
}
