//! Simulate -> write dataset -> read -> fit -> report/log/export.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use approx::assert_abs_diff_eq;
use chi2fit::data::{Dataset, SampleSpec, generate_sample};
use chi2fit::domain::{FitConfig, ParamSpec};
use chi2fit::fit::{Fit, FitOptions};
use chi2fit::io::{read_dataset, write_dataset_file, write_result_json};
use chi2fit::models::{by_name, linear_2par};
use chi2fit::observer::{FitEvent, RecordingObserver};

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("chi2fit-e2e-{tag}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn simulated_line_is_recovered_through_a_dataset_file() {
    let dir = scratch_dir("line");
    let spec = SampleSpec {
        x_min: 0.0,
        x_max: 10.0,
        points: 25,
        x_error: 0.05,
        y_error: 0.2,
        seed: 7,
    };
    let sample = generate_sample(&linear_2par(), &[1.5, -2.0], &spec).unwrap();
    let path = dir.join("line.json");
    write_dataset_file(&path, &sample).unwrap();

    let dataset = read_dataset(&path).unwrap();
    assert_eq!(dataset.size(), 25);
    let rec = RecordingObserver::new();
    let mut fit = Fit::with_options(
        Arc::new(dataset),
        by_name("linear_2par").unwrap(),
        FitOptions {
            observer: rec.clone(),
            ..FitOptions::default()
        },
    )
    .unwrap();
    fit.set_parameters(&[1.0, 0.0], Some(&[0.1, 0.1])).unwrap();
    let result = fit.do_fit(true, false).unwrap();

    assert!(result.converged);
    assert!(result.x_iterations >= 1);
    // five sigma of the fitted errors
    assert_abs_diff_eq!(result.values[0], 1.5, epsilon = 5.0 * result.errors[0]);
    assert_abs_diff_eq!(result.values[1], -2.0, epsilon = 5.0 * result.errors[1]);
    assert_eq!(result.ndf, 23);
    assert!(rec.warnings().is_empty());

    let export = dir.join("result.json");
    write_result_json(&export, &result).unwrap();
    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&export).unwrap()).unwrap();
    assert_eq!(json["parameter_names"][1], "y_intercept");
    assert_eq!(json["converged"], true);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn each_fit_writes_a_log_and_old_logs_are_kept() {
    let dir = scratch_dir("logs");
    let sample = generate_sample(&linear_2par(), &[2.0, 1.0], &SampleSpec::default())
        .unwrap()
        .with_basename("calib");
    let dataset: Arc<dyn Dataset> = Arc::new(sample);
    let rec = RecordingObserver::new();
    let options = FitOptions {
        config: FitConfig {
            log_dir: Some(dir.clone()),
            ..FitConfig::default()
        },
        observer: rec.clone(),
        label: None,
    };

    for _ in 0..2 {
        let mut fit = Fit::with_options(dataset.clone(), linear_2par(), options.clone()).unwrap();
        fit.set_parameter("slope", ParamSpec::ValueError(1.0, 0.5)).unwrap();
        fit.set_parameter("y_intercept", ParamSpec::ValueError(0.0, 0.5)).unwrap();
        fit.do_fit(true, false).unwrap();
    }

    let current = fs::read_to_string(dir.join("calib.log")).unwrap();
    assert!(current.starts_with("Fit performed on "));
    assert!(current.contains("# Fit details #"));
    assert!(dir.join("calib.1.log").exists());
    assert!(rec
        .warnings()
        .iter()
        .any(|e| matches!(e, FitEvent::OldLogRotated { .. })));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn report_sections_come_in_order() {
    let sample = generate_sample(&linear_2par(), &[2.0, 1.0], &SampleSpec::default()).unwrap();
    let rec = RecordingObserver::new();
    let mut fit = Fit::with_options(
        Arc::new(sample),
        linear_2par(),
        FitOptions {
            observer: rec.clone(),
            ..FitOptions::default()
        },
    )
    .unwrap();
    fit.constrain_parameters(["slope"], &[2.0], &[0.5]).unwrap();
    fit.do_fit(true, false).unwrap();

    let report = fit.report().unwrap();
    let order = [
        "# Dataset #",
        "# Fit function #",
        "# Constraints #",
        "# Fit result #",
        "# Final fit parameters #",
        "# Fit details #",
    ];
    let positions: Vec<usize> = order.iter().map(|s| report.find(s).unwrap()).collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    assert!(report.contains("slope: 2 +/- 0.5"));
    assert!(report.contains("linear_2par(x; slope, y_intercept)"));
}
