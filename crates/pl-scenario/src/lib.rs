//! pl-scenario: scenario file format, validation and model assembly.

pub mod schema;
pub mod validate;

use pl_controls::{ClosedLoopModel, ControlError};
use pl_sim::{SimError, Trajectory};

pub use schema::*;
pub use validate::{ValidationError, validate_scenario};

pub type ScenarioResult<T> = Result<T, ScenarioError>;

#[derive(thiserror::Error, Debug)]
pub enum ScenarioError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Model error: {0}")]
    Control(#[from] ControlError),

    #[error("Simulation error: {0}")]
    Simulation(#[from] SimError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn load_yaml(path: &std::path::Path) -> ScenarioResult<Scenario> {
    let content = std::fs::read_to_string(path)?;
    let scenario: Scenario = serde_yaml::from_str(&content)?;
    validate_scenario(&scenario)?;
    Ok(scenario)
}

pub fn save_yaml(path: &std::path::Path, scenario: &Scenario) -> ScenarioResult<()> {
    validate_scenario(scenario)?;
    let content = serde_yaml::to_string(scenario)?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn load_json(path: &std::path::Path) -> ScenarioResult<Scenario> {
    let content = std::fs::read_to_string(path)?;
    let scenario: Scenario = serde_json::from_str(&content)?;
    validate_scenario(&scenario)?;
    Ok(scenario)
}

pub fn save_json(path: &std::path::Path, scenario: &Scenario) -> ScenarioResult<()> {
    validate_scenario(scenario)?;
    let content = serde_json::to_string_pretty(scenario)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Load by extension: `.json` as JSON, anything else as YAML.
pub fn load(path: &std::path::Path) -> ScenarioResult<Scenario> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => load_json(path),
        _ => load_yaml(path),
    }
}

/// Build the closed-loop model described by `scenario`.
pub fn build_model(scenario: &Scenario) -> ScenarioResult<ClosedLoopModel> {
    validate_scenario(scenario)?;
    let model = ClosedLoopModel::new(
        &scenario.params(),
        scenario.setpoint.clone(),
        scenario.load.clone(),
    )?;
    Ok(model)
}

/// Validate, build and simulate `scenario`.
pub fn run(scenario: &Scenario) -> ScenarioResult<Trajectory> {
    let model = build_model(scenario)?;
    let trajectory = pl_sim::simulate(&model, scenario.initial_state(), &scenario.sim_options())?;
    Ok(trajectory)
}
