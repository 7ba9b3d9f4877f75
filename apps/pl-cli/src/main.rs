use clap::{Parser, Subcommand, ValueEnum};
use pl_scenario::{SamplesDef, Scenario, ScenarioError, SolverMethod};
use pl_sim::{SimError, StepMetrics, Trajectory, step_metrics};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pl-cli")]
#[command(about = "PI-Loop CLI - closed-loop PI controller simulation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a scenario and write the sample table
    Run {
        /// Scenario YAML/JSON file (defaults to the built-in demo)
        scenario: Option<PathBuf>,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = TableFormat::Csv)]
        format: TableFormat,
        /// Output file (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Validate scenario file syntax and values
    Validate {
        /// Path to the scenario file
        scenario: PathBuf,
    },
    /// Print the built-in demo scenario
    DefaultScenario {
        #[arg(short, long, value_enum, default_value_t = ScenarioFormat::Yaml)]
        format: ScenarioFormat,
        /// Output file (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compare setpoint-driven and reference-driven integral action
    Compare {
        /// Scenario YAML/JSON file (defaults to the built-in demo)
        scenario: Option<PathBuf>,
        /// Settling band relative to the step size
        #[arg(long, default_value_t = 0.02)]
        band: f64,
        /// Start of the step-response window (defaults to span start)
        #[arg(long)]
        from: Option<f64>,
        /// End of the step-response window (defaults to span end)
        #[arg(long)]
        to: Option<f64>,
        #[command(flatten)]
        overrides: Overrides,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum TableFormat {
    Csv,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ScenarioFormat {
    Yaml,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Method {
    Dopri,
    Rk4,
    Euler,
}

/// Flags applied on top of the scenario file.
#[derive(clap::Args, Debug, Default)]
struct Overrides {
    /// Drive the integral with the reference trajectory
    #[arg(long)]
    use_ref: bool,
    /// Scale time constants instead of clamping at the limits
    #[arg(long)]
    adapt_t: bool,
    /// Relax an out-of-range integral state while clamping
    #[arg(long)]
    relax: bool,
    /// Command limits as MIN,MAX
    #[arg(long, value_parser = parse_limits, allow_hyphen_values = true)]
    limits: Option<(f64, f64)>,
    /// Remove command limits
    #[arg(long, conflicts_with = "limits")]
    unbounded: bool,
    /// End of the span in seconds
    #[arg(long)]
    t_end: Option<f64>,
    /// Number of evenly spaced samples
    #[arg(long)]
    samples: Option<usize>,
    /// Integration method
    #[arg(long, value_enum)]
    method: Option<Method>,
    /// Fixed step for rk4/euler in seconds
    #[arg(long)]
    dt: Option<f64>,
}

impl Overrides {
    fn apply(&self, scenario: &mut Scenario) {
        let controller = &mut scenario.controller;
        controller.use_ref |= self.use_ref;
        controller.adapt_t |= self.adapt_t;
        controller.integrator_relax |= self.relax;
        if let Some((min, max)) = self.limits {
            controller.limits = Some(pl_scenario::LimitsDef { min, max });
        }
        if self.unbounded {
            controller.limits = None;
        }
        if let Some(t_end) = self.t_end {
            scenario.span.t_end = t_end;
        }
        if let Some(n) = self.samples {
            scenario.samples = SamplesDef::Resolution(n);
        }
        if let Some(method) = self.method {
            scenario.solver.method = match method {
                Method::Dopri => SolverMethod::DormandPrince45,
                Method::Rk4 => SolverMethod::Rk4,
                Method::Euler => SolverMethod::ForwardEuler,
            };
        }
        if let Some(dt) = self.dt {
            scenario.solver.dt = dt;
        }
    }
}

fn parse_limits(s: &str) -> Result<(f64, f64), String> {
    let (min, max) = s
        .split_once(',')
        .ok_or_else(|| format!("expected MIN,MAX, got '{s}'"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid limit '{v}': {e}"))
    };
    Ok((parse(min)?, parse(max)?))
}

type CliResult<T> = Result<T, CliError>;

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No step response in window [{from}, {to}]")]
    EmptyWindow { from: f64, to: f64 },
}

impl From<SimError> for CliError {
    fn from(e: SimError) -> Self {
        CliError::Scenario(ScenarioError::Simulation(e))
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            scenario,
            format,
            output,
            overrides,
        } => cmd_run(scenario.as_deref(), &overrides, format, output.as_deref()),
        Commands::Validate { scenario } => cmd_validate(&scenario),
        Commands::DefaultScenario { format, output } => {
            cmd_default_scenario(format, output.as_deref())
        }
        Commands::Compare {
            scenario,
            band,
            from,
            to,
            overrides,
        } => cmd_compare(scenario.as_deref(), &overrides, band, from, to),
    }
}

fn load_scenario(path: Option<&Path>, overrides: &Overrides) -> CliResult<Scenario> {
    let mut scenario = match path {
        Some(path) => pl_scenario::load(path)?,
        None => Scenario::demo(),
    };
    overrides.apply(&mut scenario);
    pl_scenario::validate_scenario(&scenario).map_err(ScenarioError::from)?;
    Ok(scenario)
}

fn cmd_run(
    path: Option<&Path>,
    overrides: &Overrides,
    format: TableFormat,
    output: Option<&Path>,
) -> CliResult<()> {
    let scenario = load_scenario(path, overrides)?;
    info!(name = %scenario.name, "running scenario");

    match pl_scenario::run(&scenario) {
        Ok(trajectory) => write_table(&trajectory, format, output),
        Err(ScenarioError::Simulation(SimError::IntegrationFailed {
            t_last,
            reason,
            partial,
        })) => {
            if let Some(partial) = &partial {
                warn!(t_last, samples = partial.len(), "writing partial trajectory");
                write_table(partial, format, output)?;
            }
            Err(SimError::IntegrationFailed {
                t_last,
                reason,
                partial,
            }
            .into())
        }
        Err(e) => Err(e.into()),
    }
}

fn write_table(trajectory: &Trajectory, format: TableFormat, output: Option<&Path>) -> CliResult<()> {
    let content = match format {
        TableFormat::Csv => to_csv(trajectory),
        TableFormat::Json => serde_json::to_string_pretty(&trajectory.samples)?,
    };
    emit(&content, output)?;
    if let Some(path) = output {
        println!(
            "✓ Wrote {} samples to {}",
            trajectory.len(),
            path.display()
        );
    }
    Ok(())
}

fn emit(content: &str, output: Option<&Path>) -> CliResult<()> {
    match output {
        Some(path) => std::fs::write(path, content)?,
        None => print!("{}", content),
    }
    Ok(())
}

fn to_csv(trajectory: &Trajectory) -> String {
    let mut csv = String::from("t,x,u,r,u_ctrl,sp,ul\n");
    for s in trajectory {
        let _ = writeln!(
            csv,
            "{},{},{},{},{},{},{}",
            s.t, s.x, s.u, s.r, s.u_ctrl, s.sp, s.ul
        );
    }
    csv
}

fn cmd_validate(path: &Path) -> CliResult<()> {
    println!("Validating scenario: {}", path.display());
    let scenario = pl_scenario::load(path)?;
    pl_scenario::build_model(&scenario)?;
    println!("✓ Scenario '{}' is valid", scenario.name);
    Ok(())
}

fn cmd_default_scenario(format: ScenarioFormat, output: Option<&Path>) -> CliResult<()> {
    let scenario = Scenario::demo();
    let content = match format {
        ScenarioFormat::Yaml => serde_yaml::to_string(&scenario)?,
        ScenarioFormat::Json => serde_json::to_string_pretty(&scenario)? + "\n",
    };
    emit(&content, output)?;
    if let Some(path) = output {
        println!("✓ Wrote default scenario to {}", path.display());
    }
    Ok(())
}

fn cmd_compare(
    path: Option<&Path>,
    overrides: &Overrides,
    band: f64,
    from: Option<f64>,
    to: Option<f64>,
) -> CliResult<()> {
    let base = load_scenario(path, overrides)?;
    let from = from.unwrap_or(base.span.t_start);
    let to = to.unwrap_or(base.span.t_end);

    let mut rows = Vec::new();
    for use_ref in [false, true] {
        let mut scenario = base.clone();
        scenario.controller.use_ref = use_ref;
        let trajectory = pl_scenario::run(&scenario)?;
        let metrics = step_metrics(&trajectory, from, to, band)
            .ok_or(CliError::EmptyWindow { from, to })?;
        let label = if use_ref { "reference" } else { "setpoint" };
        rows.push((label, metrics));
    }

    println!("Scenario: {}", base.name);
    println!("Window: [{}, {}] s, band {}%", from, to, band * 100.0);
    print!("{}", format_comparison(&rows));
    Ok(())
}

fn format_comparison(rows: &[(&str, StepMetrics)]) -> String {
    let mut out = format!(
        "{:<10} {:>11} {:>10} {:>10} {:>10} {:>10}\n",
        "integral", "overshoot", "peak_t", "settle_t", "final_x", "iae"
    );
    for (label, m) in rows {
        let settle = m
            .settling_time
            .map(|t| format!("{t:.3}"))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:<10} {:>10.2}% {:>10.3} {:>10} {:>10.5} {:>10.4}",
            label,
            m.overshoot_fraction * 100.0,
            m.peak_time,
            settle,
            m.steady_x,
            m.iae
        );
    }
    out
}
