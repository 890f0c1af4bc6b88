//! Export fit results to JSON.

use std::fs::File;
use std::path::Path;

use crate::domain::FitResult;
use crate::error::FitError;

/// Write a fit result as pretty-printed JSON.
pub fn write_result_json(path: &Path, result: &FitResult) -> Result<(), FitError> {
    let file = File::create(path).map_err(|source| FitError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::to_writer_pretty(file, result).map_err(|source| FitError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exported_json_has_names_and_values() {
        let result = FitResult {
            label: Some("line".to_string()),
            parameter_names: vec!["slope".to_string()],
            values: vec![2.0],
            errors: vec![0.1],
            fixed: vec![false],
            error_matrix: vec![vec![0.01]],
            fcn: 3.2,
            edm: 1e-12,
            status_code: 0,
            ndf: 4,
            chi2_probability: Some(0.52),
            x_iterations: 0,
            converged: true,
            report: Some("not exported".to_string()),
        };
        let dir = std::env::temp_dir().join(format!("chi2fit-export-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("result.json");
        write_result_json(&path, &result).unwrap();

        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["parameter_names"][0], "slope");
        assert_eq!(value["ndf"], 4);
        assert_eq!(value["values"][0], 2.0);
        assert!(value.get("report").is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
