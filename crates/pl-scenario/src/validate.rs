//! Scenario validation logic.

use crate::schema::{LATEST_VERSION, SamplesDef, Scenario};
use pl_controls::SignalSpec;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Invalid signal: {field} ({reason})")]
    InvalidSignal { field: String, reason: String },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn positive(field: &str, v: f64) -> Result<(), ValidationError> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, v, "must be positive and finite"))
    }
}

fn finite(field: &str, v: f64) -> Result<(), ValidationError> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, v, "must be finite"))
    }
}

fn signal(field: &str, spec: &SignalSpec) -> Result<(), ValidationError> {
    spec.validate().map_err(|e| ValidationError::InvalidSignal {
        field: field.to_string(),
        reason: e.to_string(),
    })
}

pub fn validate_scenario(scenario: &Scenario) -> Result<(), ValidationError> {
    if scenario.version == 0 || scenario.version > LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: scenario.version,
        });
    }

    positive("plant.c_p", scenario.plant.c_p)?;

    let controller = &scenario.controller;
    positive("controller.t_cl", controller.t_cl)?;
    positive("controller.t_n", controller.t_n)?;
    if let Some(limits) = controller.limits {
        finite("controller.limits.min", limits.min)?;
        finite("controller.limits.max", limits.max)?;
        if limits.min > limits.max {
            return Err(invalid(
                "controller.limits",
                format!("[{}, {}]", limits.min, limits.max),
                "min must not exceed max",
            ));
        }
    }

    signal("setpoint", &scenario.setpoint)?;
    signal("load", &scenario.load)?;

    finite("initial.x", scenario.initial.x)?;
    finite("initial.u", scenario.initial.u)?;
    finite("initial.r", scenario.initial.r)?;

    let span = scenario.span;
    finite("span.t_start", span.t_start)?;
    finite("span.t_end", span.t_end)?;
    if span.t_end <= span.t_start {
        return Err(invalid(
            "span.t_end",
            span.t_end,
            "must be greater than span.t_start",
        ));
    }

    match &scenario.samples {
        SamplesDef::Resolution(0) => {
            return Err(invalid("samples.resolution", 0, "must be at least 1"));
        }
        SamplesDef::Resolution(_) => {}
        SamplesDef::Times(times) => {
            if times.is_empty() {
                return Err(invalid("samples.times", "[]", "must not be empty"));
            }
            if let Some(t) = times
                .iter()
                .find(|t| !t.is_finite() || **t < span.t_start || **t > span.t_end)
            {
                return Err(invalid("samples.times", t, "must lie within the span"));
            }
            if times.windows(2).any(|w| w[1] < w[0]) {
                return Err(invalid(
                    "samples.times",
                    format!("{times:?}"),
                    "must be non-decreasing",
                ));
            }
        }
    }

    let solver = &scenario.solver;
    positive("solver.dt", solver.dt)?;
    positive("solver.abs_tol", solver.abs_tol)?;
    if !(solver.rel_tol.is_finite() && solver.rel_tol >= 0.0) {
        return Err(invalid(
            "solver.rel_tol",
            solver.rel_tol,
            "must be non-negative and finite",
        ));
    }
    if let Some(h) = solver.max_step {
        positive("solver.max_step", h)?;
    }
    if solver.max_steps == 0 {
        return Err(invalid("solver.max_steps", 0, "must be at least 1"));
    }

    Ok(())
}
