//! Joint fit of a temperature-dependent resistor: a quadratic temperature
//! curve T(U) and a current I(U) = U / (R0 (1 + alph T(U))) sharing the
//! quadratic coefficients.

use std::sync::Arc;

use approx::assert_relative_eq;
use chi2fit::data::{Dataset, XYDataset};
use chi2fit::domain::Axis;
use chi2fit::fit::{FitOptions, Multifit, ParameterSlot};
use chi2fit::models::FitFunction;
use chi2fit::observer::RecordingObserver;

const CURRENT: [f64; 20] = [
    0.5, 0.89, 1.41, 1.67, 2.3, 2.59, 2.77, 3.57, 3.94, 4.24, 4.73, 4.87, 5.35, 5.74, 5.77, 6.17, 6.32, 6.83, 6.87,
    7.17,
];

const KELVIN: [f64; 20] = [
    293.5, 293.8, 295.4, 296.8, 299.4, 301., 303., 307.4, 310.9, 315.1, 318., 323.2, 327.4, 333.7, 338.2, 343.1, 350.,
    354.7, 358.6, 367.9,
];

const EXPECTED_VALUES: [f64; 5] = [
    0.6652477959838384,
    0.9816573999783497,
    19.385533966182802,
    1.0178678541401343,
    0.003898574372118895,
];

const EXPECTED_ERRORS: [f64; 5] = [
    0.01961884566547464,
    0.16289007985365606,
    0.21597896334699487,
    0.023866059935156978,
    0.0004299490173879757,
];

/// `|a - b| <= atol + rtol·|b|`, elementwise.
fn allclose(actual: &[f64], expected: &[f64], rtol: f64, atol: f64) -> bool {
    actual.len() == expected.len()
        && actual
            .iter()
            .zip(expected)
            .all(|(a, b)| (a - b).abs() <= atol + rtol * b.abs())
}

fn voltages() -> Vec<f64> {
    (1..=20).map(|i| 0.5 * f64::from(i)).collect()
}

fn with_errors(x: Vec<f64>, y: Vec<f64>, name: &str) -> Arc<dyn Dataset> {
    let mut d = XYDataset::new(x, y).unwrap().with_basename(name);
    d.add_simple_error(Axis::X, 0.1).unwrap();
    d.add_simple_error(Axis::Y, 0.1).unwrap();
    Arc::new(d)
}

fn quadric() -> FitFunction {
    FitFunction::new("quadric", &["p5", "p4", "p3"], &[0.5, 0.9, 19.38], |u, p| {
        p[0] * u * u + p[1] * u + p[2]
    })
    .unwrap()
}

fn iu_model() -> FitFunction {
    FitFunction::new(
        "IUmodel",
        &["R0", "alph", "p5", "p4", "p3"],
        &[1.0, 0.004, 0.5, 0.9, 19.38],
        |u, p| {
            let t = p[2] * u * u + p[3] * u + p[4];
            u / (p[0] * (1.0 + t * p[1]))
        },
    )
    .unwrap()
}

fn resistor_multifit(rec: &Arc<RecordingObserver>) -> Multifit {
    let temperature: Vec<f64> = KELVIN.iter().map(|k| k - 273.15).collect();
    let mut mf: Multifit = Multifit::with_options(FitOptions {
        observer: rec.clone(),
        label: Some("resistor".to_string()),
        ..FitOptions::default()
    });
    mf.add_pair(with_errors(voltages(), temperature, "ut"), quadric())
        .unwrap();
    mf.add_pair(with_errors(voltages(), CURRENT.to_vec(), "ui"), iu_model())
        .unwrap();
    mf.autolink_parameters().unwrap();
    mf
}

#[test]
fn autolinked_parameters_follow_first_appearance() {
    let rec = RecordingObserver::new();
    let mf = resistor_multifit(&rec);
    assert_eq!(mf.parameter_names(), vec!["p5", "p4", "p3", "R0", "alph"]);
    assert_eq!(
        mf.links().slots(2),
        &[ParameterSlot { pair: 0, local: 2 }, ParameterSlot { pair: 1, local: 4 }]
    );
    assert_eq!(mf.ndf(), 40 - 5);
}

#[test]
fn joint_fit_reproduces_reference_values_and_errors() {
    let rec = RecordingObserver::new();
    let mut mf = resistor_multifit(&rec);
    let result = mf.do_fit(true, false).unwrap();

    assert!(result.x_iterations <= 10);
    assert!(result.converged);
    assert!(
        allclose(&result.values, &EXPECTED_VALUES, 1e-5, 1e-8),
        "{:?}",
        result.values
    );
    // the quadratic coefficients are pinned by the temperature data
    assert!(
        allclose(&result.errors[..3], &EXPECTED_ERRORS[..3], 1e-4, 1e-8),
        "{:?}",
        result.errors
    );
    // R0 and alph are anti-correlated (rho ~ -0.97), which amplifies any
    // curvature approximation; the exact second derivatives put both errors
    // 0.161% above the tabulated ones
    for i in 3..5 {
        assert_relative_eq!(result.errors[i], EXPECTED_ERRORS[i] * 1.00161, max_relative = 2e-4);
    }
    assert_eq!(result.ndf, 35);
    assert!(result.chi2_probability.is_some());

    let report = mf.report().unwrap_or_default();
    let order = ["# Dataset #", "# Fit function #", "# Fit result #", "# Final fit parameters #", "# Fit details #"];
    let positions: Vec<usize> = order.iter().map(|s| report.find(s).unwrap()).collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    assert!(report.contains("HYPTEST"));
}

#[test]
fn fixing_a_shared_parameter_keeps_it_exact() {
    let rec = RecordingObserver::new();
    let mut mf = resistor_multifit(&rec);
    mf.fix_parameters(["p3"], Some(&[19.0])).unwrap();
    assert_eq!(mf.pair_ndf(0), Some(20 - 3 + 1));
    assert_eq!(mf.pair_ndf(1), Some(20 - 5 + 1));

    let result = mf.do_fit(true, false).unwrap();
    assert_eq!(result.value_of("p3"), Some(19.0));
    assert_eq!(result.errors[2], 0.0);
    assert!(result.fixed[2]);
    assert_eq!(result.ndf, 36);
    assert!(mf.report().unwrap_or_default().contains("p3 = 19    -fixed-"));
}
