//! Plain-text fit reports.
//!
//! A report is a sequence of banner-headed sections:
//!
//! - `# Dataset #` and `# Fit function #` describe the inputs
//! - `# Constraints #` lists active parameter constraints
//! - `# Fit result #`, `# Final fit parameters #` and `# Fit details #`
//!   describe the minimum
//!
//! Formatting lives here so the fit engines only assemble a [`ReportContext`].

use nalgebra::DMatrix;

use crate::data::Dataset;
use crate::domain::{Constraint, FitConfig};
use crate::math::{cov_to_cor, errors_from_cov, format_e, format_g, round_to_decimals, round_to_significance};
use crate::minimizer::FitInfo;
use crate::models::FitFunction;

/// Snapshot of a finished fit, enough to render the result sections.
#[derive(Debug, Clone, Copy)]
pub struct ReportContext<'a> {
    pub names: &'a [String],
    pub values: &'a [f64],
    /// Minimizer errors; 0 marks a fixed parameter.
    pub errors: &'a [f64],
    pub error_matrix: &'a DMatrix<f64>,
    pub info: FitInfo,
    pub ndf: i64,
    pub chi2_probability: f64,
    pub config: &'a FitConfig,
}

pub fn banner(title: &str) -> String {
    let line = "#".repeat(title.len() + 4);
    format!("{line}\n# {title} #\n{line}\n\n")
}

pub fn format_dataset_section(dataset: &dyn Dataset) -> String {
    let mut out = banner("Dataset");
    out.push_str(&dataset.formatted());
    out.push('\n');
    out
}

pub fn format_function_section(function: &FitFunction) -> String {
    let mut out = banner("Fit function");
    out.push_str(&function.signature());
    if let Some(eq) = function.equation() {
        out.push_str(&format!(" = {eq}"));
    }
    out.push_str("\n\n");
    out
}

/// Empty when no constraint is active.
pub fn format_constraints_section(names: &[String], constraints: &[Option<Constraint>]) -> String {
    let active: Vec<(&String, Constraint)> = names
        .iter()
        .zip(constraints)
        .filter_map(|(name, c)| c.filter(Constraint::is_active).map(|c| (name, c)))
        .collect();
    if active.is_empty() {
        return String::new();
    }
    let mut out = banner("Constraints");
    for (name, c) in active {
        out.push_str(&format!("{name}: {} +/- {}\n", format_g(c.target), format_g(c.sigma)));
    }
    out.push('\n');
    out
}

/// Values, errors and the lower triangle of the correlation matrix.
pub fn format_fit_result(ctx: &ReportContext<'_>) -> String {
    let mut out = banner("Fit result");
    let errors = errors_from_cov(ctx.error_matrix);
    let cor = cov_to_cor(ctx.error_matrix);

    out.push_str("# value        error   ");
    if ctx.names.len() > 1 {
        out.push_str(" correlations");
    }
    out.push('\n');

    for (i, name) in ctx.names.iter().enumerate() {
        out.push_str(&format!("# {name}\n"));
        out.push_str(&format!("{}  ", format_e(ctx.values[i], 4)));
        if errors[i] != 0.0 {
            out.push_str(&format!("{}  ", format_e(errors[i], 2)));
            for j in 0..i {
                out.push_str(&format!("{:.3}  ", cor[(i, j)]));
            }
        } else {
            out.push_str("-fixed- ");
        }
        out.push('\n');
    }
    out.push('\n');
    out
}

/// `name = value +- error`, rounded to the configured significance.
pub fn format_final_parameters(ctx: &ReportContext<'_>) -> String {
    let mut out = banner("Final fit parameters");
    for (i, name) in ctx.names.iter().enumerate() {
        let (value, error) = round_to_significance(ctx.values[i], ctx.errors[i], ctx.config.error_places);
        if ctx.errors[i] != 0.0 {
            out.push_str(&format!("{name} = {} +- {}\n", format_g(value), format_g(error)));
        } else {
            out.push_str(&format!("{name} = {}    -fixed-\n", format_g(value)));
        }
    }
    out.push('\n');
    out
}

pub fn hypothesis_status(chi2_probability: f64, significance_level: f64) -> String {
    let percent = (significance_level * 100.0).round() as i64;
    if chi2_probability.is_nan() {
        format!("undefined (sig. {percent}%)")
    } else if chi2_probability < significance_level {
        format!("rejected (sig. {percent}%)")
    } else {
        format!("accepted (sig. {percent}%)")
    }
}

pub fn format_fit_details(ctx: &ReportContext<'_>) -> String {
    let mut out = banner("Fit details");

    if ctx.ndf == 0 {
        out.push_str("# WARNING: Number of degrees of freedom is zero!\n");
        out.push_str("# Please review parameterization...\n\n");
    } else if ctx.ndf < 0 {
        out.push_str("# WARNING: Number of degrees of freedom is negative!\n");
        out.push_str("# Please review parameterization...\n\n");
    }

    out.push_str(&format!("FCN      {}\n", format_g(ctx.info.fcn)));
    if ctx.ndf != 0 {
        out.push_str(&format!("FCN/ndf  {}\n", format_g(ctx.info.fcn / ctx.ndf as f64)));
    } else {
        out.push_str("FCN/ndf  NaN\n");
    }
    out.push_str(&format!("EdM      {}\n", format_g(ctx.info.edm)));
    out.push_str(&format!("UP       {}\n", format_g(ctx.info.err_def)));
    out.push_str(&format!("STA      {}\n", ctx.info.status_code));
    out.push('\n');
    out.push_str(&format!(
        "chi2prob {}\n",
        format_g(round_to_decimals(ctx.chi2_probability, 3))
    ));
    out.push_str(&format!(
        "HYPTEST  {}\n",
        hypothesis_status(ctx.chi2_probability, ctx.config.significance_level)
    ));
    out.push('\n');
    out
}

/// The three result sections in report order.
pub fn format_result_sections(ctx: &ReportContext<'_>) -> String {
    let mut out = format_fit_result(ctx);
    out.push_str(&format_final_parameters(ctx));
    out.push_str(&format_fit_details(ctx));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context<'a>(
        names: &'a [String],
        values: &'a [f64],
        errors: &'a [f64],
        matrix: &'a DMatrix<f64>,
        config: &'a FitConfig,
        ndf: i64,
    ) -> ReportContext<'a> {
        ReportContext {
            names,
            values,
            errors,
            error_matrix: matrix,
            info: FitInfo {
                fcn: 12.5,
                edm: 2.5e-12,
                err_def: 1.0,
                status_code: 0,
            },
            ndf,
            chi2_probability: crate::math::chi2_probability(12.5, ndf),
            config,
        }
    }

    #[test]
    fn banner_box_matches_title() {
        assert_eq!(banner("Fit details"), "###############\n# Fit details #\n###############\n\n");
    }

    #[test]
    fn fixed_parameters_are_marked() {
        let names = vec!["slope".to_string(), "y_intercept".to_string()];
        let values = [2.012_345, 1.0];
        let errors = [0.012_345, 0.0];
        let matrix = DMatrix::from_row_slice(2, 2, &[0.012_345f64.powi(2), 0.0, 0.0, 0.0]);
        let config = FitConfig::default();
        let ctx = context(&names, &values, &errors, &matrix, &config, 8);

        let params = format_final_parameters(&ctx);
        assert!(params.contains("slope = 2.012 +- 0.012\n"), "{params}");
        assert!(params.contains("y_intercept = 1    -fixed-\n"), "{params}");

        let result = format_fit_result(&ctx);
        assert!(result.contains("# slope\n2.0123e+00  1.23e-02"), "{result}");
        assert!(result.contains("-fixed-"));
    }

    #[test]
    fn details_warn_on_zero_ndf() {
        let names = vec!["a".to_string()];
        let matrix = DMatrix::from_element(1, 1, 0.01);
        let config = FitConfig::default();
        let ctx = context(&names, &[1.0], &[0.1], &matrix, &config, 0);
        let details = format_fit_details(&ctx);
        assert!(details.contains("degrees of freedom is zero"));
        assert!(details.contains("FCN/ndf  NaN"));
        assert!(details.contains("chi2prob nan"));
        assert!(details.contains("HYPTEST  undefined (sig. 5%)"));
    }

    #[test]
    fn details_report_goodness_of_fit() {
        let names = vec!["a".to_string()];
        let matrix = DMatrix::from_element(1, 1, 0.01);
        let config = FitConfig::default();
        let ctx = context(&names, &[1.0], &[0.1], &matrix, &config, 10);
        let details = format_fit_details(&ctx);
        assert!(details.contains("FCN      12.5\n"));
        assert!(details.contains("FCN/ndf  1.25\n"));
        assert!(details.contains("EdM      2.5e-12\n"));
        assert!(details.contains("UP       1\n"));
        assert!(details.contains("HYPTEST  accepted (sig. 5%)"));
    }

    #[test]
    fn hypothesis_rejects_small_probabilities() {
        assert_eq!(hypothesis_status(0.01, 0.05), "rejected (sig. 5%)");
        assert_eq!(hypothesis_status(0.5, 0.01), "accepted (sig. 1%)");
    }

    #[test]
    fn constraints_section_skips_zero_sigma() {
        let names = vec!["a".to_string(), "b".to_string()];
        let section = format_constraints_section(
            &names,
            &[Some(Constraint::new(1.0, 0.0)), Some(Constraint::new(2.5, 0.1))],
        );
        assert!(section.starts_with("###############\n# Constraints #"));
        assert!(!section.contains("a:"));
        assert!(section.contains("b: 2.5 +/- 0.1\n"));
        assert!(format_constraints_section(&names, &[None, None]).is_empty());
    }
}
