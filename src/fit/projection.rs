//! Bounded fixed-point loop for the x-uncertainty projection.

use crate::domain::FitConfig;
use crate::error::FitError;
use crate::observer::{FitEvent, FitObserver};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionLoop {
    pub max_iterations: usize,
    /// Relative tolerance on every covariance element (absolute tolerance is 0).
    pub rtol: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectionOutcome {
    pub iterations: usize,
    pub converged: bool,
}

impl ProjectionLoop {
    pub fn from_config(config: &FitConfig) -> Self {
        Self {
            max_iterations: config.max_x_iterations,
            rtol: config.cov_rtol,
        }
    }

    /// Run `step` until it reports convergence or the cap is hit.
    ///
    /// `step` receives the zero-based iteration number, performs one
    /// project-and-minimize pass and returns whether the covariance settled.
    /// Hitting the cap is not an error.
    pub fn run<F>(&self, observer: &dyn FitObserver, mut step: F) -> Result<ProjectionOutcome, FitError>
    where
        F: FnMut(usize) -> Result<bool, FitError>,
    {
        for iteration in 0..self.max_iterations {
            observer.on_event(&FitEvent::ProjectionIteration { iteration });
            if step(iteration)? {
                let iterations = iteration + 1;
                observer.on_event(&FitEvent::ProjectionConverged { iterations });
                return Ok(ProjectionOutcome {
                    iterations,
                    converged: true,
                });
            }
        }
        observer.on_event(&FitEvent::ProjectionCapReached {
            iterations: self.max_iterations,
        });
        Ok(ProjectionOutcome {
            iterations: self.max_iterations,
            converged: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::RecordingObserver;

    #[test]
    fn stops_at_first_converged_pass() {
        let rec = RecordingObserver::new();
        let lp = ProjectionLoop::from_config(&FitConfig::default());
        let outcome = lp.run(rec.as_ref(), |i| Ok(i == 2)).unwrap();
        assert_eq!(
            outcome,
            ProjectionOutcome {
                iterations: 3,
                converged: true
            }
        );
        assert!(rec.warnings().is_empty());
    }

    #[test]
    fn never_runs_more_than_the_cap() {
        let rec = RecordingObserver::new();
        let lp = ProjectionLoop {
            max_iterations: 10,
            rtol: 1e-4,
        };
        let mut calls = 0;
        let outcome = lp
            .run(rec.as_ref(), |_| {
                calls += 1;
                Ok(false)
            })
            .unwrap();
        assert_eq!(calls, 10);
        assert!(!outcome.converged);
        assert_eq!(rec.warnings(), vec![FitEvent::ProjectionCapReached { iterations: 10 }]);
    }

    #[test]
    fn step_errors_propagate() {
        let rec = RecordingObserver::new();
        let lp = ProjectionLoop::from_config(&FitConfig::default());
        let err = lp
            .run(rec.as_ref(), |_| Err(FitError::invalid_parameter("p")))
            .unwrap_err();
        assert!(matches!(err, FitError::InvalidParameter { .. }));
    }
}
