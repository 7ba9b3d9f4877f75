//! Integration test: closed-loop PI responses to setpoint and load steps.
//!
//! Scenario (unless noted): c_p = 1, t_cl = 0.5, t_n = 1.5, unit setpoint
//! step at t = 2 s, state starting at rest.

use pl_controls::{ClosedLoopModel, ClosedLoopState, PiParams, Sine, Step};
use pl_core::Tolerances;
use pl_sim::{
    FailureReason, IntegratorType, SampleTimes, SimError, SimOptions, Trajectory, simulate,
    step_metrics,
};

fn run(params: &PiParams, load: Option<Step>, opts: &SimOptions) -> Trajectory {
    let ul = load.unwrap_or(Step::new(0.0, 0.0));
    let model = ClosedLoopModel::new(params, Step::new(2.0, 1.0), ul).unwrap();
    simulate(&model, ClosedLoopState::default(), opts).unwrap()
}

#[test]
fn matched_plant_without_load_settles_on_setpoint() {
    let traj = run(&PiParams::default(), None, &SimOptions::default());

    assert_eq!(traj.len(), 1000);
    let last = traj.last().unwrap();
    assert_eq!(last.t, 20.0);
    assert!((last.x - 1.0).abs() < 1e-4, "x(20) = {}", last.x);
    assert!(last.u.abs() < 1e-4, "u(20) = {}", last.u);

    // nothing moves before the setpoint step
    let before = traj.at(1.9).unwrap();
    assert_eq!(before.x, 0.0);
    assert_eq!(before.u, 0.0);
}

#[test]
fn integral_action_rejects_constant_load() {
    let opts = SimOptions::with_span(0.0, 40.0, 2001);
    for use_ref in [false, true] {
        let params = PiParams::default().with_reference(use_ref);
        let traj = run(&params, Some(Step::new(10.0, 0.5)), &opts);

        let last = traj.last().unwrap();
        assert!((last.x - 1.0).abs() < 1e-4, "use_ref={use_ref}: x = {}", last.x);
        assert!((last.u - 0.5).abs() < 1e-4, "use_ref={use_ref}: u = {}", last.u);

        // the load pushes x below the setpoint before the integral catches up
        let dip = traj
            .iter()
            .filter(|s| s.t > 10.0)
            .map(|s| s.x)
            .fold(f64::INFINITY, f64::min);
        assert!(dip < 0.95);
    }
}

#[test]
fn gain_scheduling_is_inert_without_limits() {
    let load = Some(Step::new(10.0, 0.5));
    let opts = SimOptions::default();
    for use_ref in [false, true] {
        let plain = PiParams::default().with_reference(use_ref);
        let scheduled = plain.clone().with_gain_scheduling(true);
        assert_eq!(run(&plain, load, &opts), run(&scheduled, load, &opts));
    }
}

#[test]
fn inert_reference_mirrors_setpoint() {
    let params = PiParams::default().with_limits(-1.0, 1.0).unwrap();
    let traj = run(&params, Some(Step::new(10.0, 0.5)), &SimOptions::default());
    for s in &traj {
        assert_eq!(s.r, s.sp, "t = {}", s.t);
    }
}

#[test]
fn reference_trajectory_matches_first_order_response() {
    let params = PiParams::default().with_reference(true);
    let traj = run(&params, None, &SimOptions::default());
    for s in traj.iter().filter(|s| s.t >= 2.0) {
        let expected = 1.0 - (-(s.t - 2.0) / 0.5).exp();
        assert!((s.r - expected).abs() < 1e-6, "t = {}", s.t);
        // with no load x follows r exactly
        assert!((s.x - expected).abs() < 1e-6, "t = {}", s.t);
        assert!(s.u.abs() < 1e-6);
    }
}

#[test]
fn reference_integral_reduces_overshoot() {
    let opts = SimOptions::default();
    let standard = run(&PiParams::default(), None, &opts);
    let improved = run(&PiParams::default().with_reference(true), None, &opts);

    let standard = step_metrics(&standard, 2.0, 20.0, 0.02).unwrap();
    let improved = step_metrics(&improved, 2.0, 20.0, 0.02).unwrap();

    assert!(standard.overshoot > 0.1, "standard overshoot {}", standard.overshoot);
    assert!(improved.overshoot < standard.overshoot);
    assert!(improved.overshoot < 1e-6);
    assert!(improved.iae < standard.iae);
}

#[test]
fn gain_scheduling_holds_command_on_limit() {
    let params = PiParams::default()
        .with_limits(-1.0, 1.0)
        .unwrap()
        .with_gain_scheduling(true);
    let model = ClosedLoopModel::new(&params, Step::new(2.0, 1.0), Step::new(10.0, 0.5)).unwrap();
    let traj = simulate(&model, ClosedLoopState::default(), &SimOptions::default()).unwrap();

    for s in &traj {
        assert!(s.u_ctrl <= 1.0 + 1e-9 && s.u_ctrl >= -1.0 - 1e-9, "t = {}", s.t);
    }

    // right after the step the nominal command (about 2) exceeds the limit
    let s = traj.at(2.01).unwrap();
    let ev = model.evaluate(s.t, &ClosedLoopState::new(s.x, s.u, s.r));
    assert!(ev.u_ctrl_raw > 1.0);
    assert!((ev.u_ctrl - 1.0).abs() < 1e-9);
    assert!(ev.schedule_factor > 1.0);
    assert!((ev.t_n_eff / ev.t_cl_eff - 3.0).abs() < 1e-9);

    let last = traj.last().unwrap();
    assert!((last.x - 1.0).abs() < 1e-3);
}

#[test]
fn clamping_winds_up_more_than_scheduling() {
    let opts = SimOptions::with_span(0.0, 10.0, 500);
    let clamped = PiParams::default().with_limits(-1.0, 1.0).unwrap();
    let scheduled = clamped.clone().with_gain_scheduling(true);

    let clamped = run(&clamped, None, &opts);
    let scheduled = run(&scheduled, None, &opts);
    for s in &clamped {
        assert!(s.u_ctrl <= 1.0 && s.u_ctrl >= -1.0);
    }

    let clamped = step_metrics(&clamped, 2.0, 10.0, 0.02).unwrap();
    let scheduled = step_metrics(&scheduled, 2.0, 10.0, 0.02).unwrap();
    assert!(clamped.overshoot > scheduled.overshoot);
}

#[test]
fn explicit_sample_times_are_hit() {
    let params = PiParams::default();
    let opts = SimOptions {
        samples: SampleTimes::Explicit(vec![0.0, 2.5, 2.5, 5.0, 20.0]),
        ..SimOptions::default()
    };
    let traj = run(&params, None, &opts);
    assert_eq!(traj.times(), vec![0.0, 2.5, 2.5, 5.0, 20.0]);
    assert_eq!(traj.samples[1], traj.samples[2]);

    let dense = run(&params, None, &SimOptions::with_span(0.0, 20.0, 9));
    let at_5 = dense.at(5.0).unwrap();
    assert_eq!(at_5.t, 5.0);
    assert!((at_5.x - traj.samples[3].x).abs() < 1e-6);
}

#[test]
fn fixed_step_integrators_agree_with_adaptive() {
    // smooth setpoint: no step edge for a fixed step to straddle
    let params = PiParams::default().with_reference(true);
    let sp = Sine {
        amplitude: 1.0,
        period: 5.0,
        phase: 0.0,
        offset: 0.0,
    };
    let model = ClosedLoopModel::new(&params, sp, Step::new(0.0, 0.0)).unwrap();
    let span = SimOptions::with_span(0.0, 10.0, 11);
    let solve = |opts: &SimOptions| simulate(&model, ClosedLoopState::default(), opts).unwrap();

    let adaptive = solve(&SimOptions {
        tolerances: Tolerances {
            abs: 1e-12,
            rel: 1e-10,
        },
        ..span.clone()
    });
    let rk4 = solve(&SimOptions {
        integrator: IntegratorType::RK4,
        dt: 1e-3,
        ..span.clone()
    });
    let euler = solve(&SimOptions {
        integrator: IntegratorType::ForwardEuler,
        dt: 1e-4,
        ..span
    });

    assert_eq!(adaptive.len(), 11);
    for ((a, b), c) in adaptive.iter().zip(&rk4).zip(&euler) {
        assert_eq!(a.t, b.t);
        assert_eq!(a.t, c.t);
        assert!((a.x - b.x).abs() < 1e-6, "t = {}: {} vs {}", a.t, a.x, b.x);
        assert!((a.u - b.u).abs() < 1e-6, "t = {}: {} vs {}", a.t, a.u, b.u);
        assert!((a.x - c.x).abs() < 1e-3, "t = {}: {} vs {}", a.t, a.x, c.x);
    }
}

#[test]
fn non_finite_signal_reports_last_valid_time() {
    let params = PiParams::default();
    let sp = |t: f64| if t >= 5.0 { f64::NAN } else if t >= 2.0 { 1.0 } else { 0.0 };
    let model = ClosedLoopModel::new(&params, sp, |_t: f64| 0.0).unwrap();
    let err = simulate(&model, ClosedLoopState::default(), &SimOptions::default()).unwrap_err();

    match err {
        SimError::IntegrationFailed {
            t_last,
            reason,
            partial,
        } => {
            assert!(t_last > 4.9 && t_last <= 5.0, "t_last = {t_last}");
            assert_eq!(reason, FailureReason::NonFinite);
            let partial = partial.expect("closed-loop failures carry samples");
            assert!(!partial.is_empty());
            assert!(partial.iter().all(|s| s.t <= t_last && s.x.is_finite()));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn fixed_step_non_finite_fails_fast() {
    let params = PiParams::default();
    let sp = |t: f64| if t >= 1.0 { f64::INFINITY } else { 0.0 };
    let model = ClosedLoopModel::new(&params, sp, |_t: f64| 0.0).unwrap();
    let opts = SimOptions {
        integrator: IntegratorType::RK4,
        dt: 0.01,
        ..SimOptions::with_span(0.0, 2.0, 21)
    };
    let err = simulate(&model, ClosedLoopState::default(), &opts).unwrap_err();
    assert!(matches!(
        err,
        SimError::IntegrationFailed { t_last, reason: FailureReason::NonFinite, .. }
            if t_last < 1.0
    ));
}

#[test]
fn step_budget_is_enforced() {
    let opts = SimOptions {
        max_steps: 10,
        ..SimOptions::default()
    };
    let model = ClosedLoopModel::new(&PiParams::default(), Step::new(2.0, 1.0), |_t: f64| 0.0)
        .unwrap();
    let err = simulate(&model, ClosedLoopState::default(), &opts).unwrap_err();
    assert!(matches!(
        err,
        SimError::IntegrationFailed {
            reason: FailureReason::StepBudgetExhausted { max_steps: 10 },
            ..
        }
    ));
}

#[test]
fn invalid_span_rejected_before_integration() {
    let model = ClosedLoopModel::new(&PiParams::default(), Step::new(2.0, 1.0), |_t: f64| 0.0)
        .unwrap();
    let err = simulate(
        &model,
        ClosedLoopState::default(),
        &SimOptions::with_span(5.0, 5.0, 10),
    )
    .unwrap_err();
    assert!(matches!(err, SimError::InvalidArg { .. }));
}
