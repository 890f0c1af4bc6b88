//! Structured fit events and the observers that receive them.
//!
//! Fits never log directly. Every notable step (warnings about recovered
//! numeric edge cases, parameter lifecycle changes, projection progress) is
//! described by a [`FitEvent`] and handed to the injected [`FitObserver`].
//! [`TracingObserver`] forwards events to `tracing`; [`RecordingObserver`]
//! keeps them for inspection.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::Level;

use crate::math::CovFallback;

#[derive(Debug, Clone, PartialEq)]
pub enum FitEvent {
    /// Start errors were not given and defaulted to 10% of the values.
    DefaultParameterErrors { parameters: Vec<String> },
    /// Parameters changed before a minimizer existed; they are applied when it is built.
    MinimizerNotReady,
    /// Some x-derivative steps were zero and were replaced.
    ZeroDerivativeStep { count: usize, replacement: f64 },
    /// A singular matrix was replaced before use.
    SingularCovariance { context: String, fallback: CovFallback },
    /// The dataset has no y errors; unit errors are assumed.
    NoYErrors,
    NonPositiveNdf { ndf: i64 },
    OldLogRotated { from: PathBuf, to: PathBuf },
    ParameterFixed { id: usize, name: String },
    ParameterReleased { id: usize, name: String },
    AllParametersReleased,
    ParameterConstrained { id: usize, name: String, target: f64, sigma: f64 },
    ParametersLinked { canonical: String, slots: usize },
    MinimizerCalled { final_fit: bool },
    ProjectionIteration { iteration: usize },
    ProjectionConverged { iterations: usize },
    ProjectionCapReached { iterations: usize },
}

impl FitEvent {
    pub fn level(&self) -> Level {
        match self {
            FitEvent::DefaultParameterErrors { .. }
            | FitEvent::MinimizerNotReady
            | FitEvent::ZeroDerivativeStep { .. }
            | FitEvent::SingularCovariance { .. }
            | FitEvent::NonPositiveNdf { .. }
            | FitEvent::OldLogRotated { .. }
            | FitEvent::ProjectionCapReached { .. } => Level::WARN,
            FitEvent::NoYErrors
            | FitEvent::ParameterFixed { .. }
            | FitEvent::ParameterReleased { .. }
            | FitEvent::AllParametersReleased
            | FitEvent::ParameterConstrained { .. }
            | FitEvent::ParametersLinked { .. } => Level::INFO,
            FitEvent::MinimizerCalled { .. }
            | FitEvent::ProjectionIteration { .. }
            | FitEvent::ProjectionConverged { .. } => Level::DEBUG,
        }
    }

    pub fn is_warning(&self) -> bool {
        self.level() == Level::WARN
    }
}

impl fmt::Display for FitEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitEvent::DefaultParameterErrors { parameters } => write!(
                f,
                "parameter start errors not given for {}; using 1/10th of the values",
                parameters.join(", ")
            ),
            FitEvent::MinimizerNotReady => write!(
                f,
                "minimizer not initialized yet; parameters will be applied when it is"
            ),
            FitEvent::ZeroDerivativeStep { count, replacement } => write!(
                f,
                "{count} input error(s) are zero; derivative step set to {replacement:e}"
            ),
            FitEvent::SingularCovariance { context, fallback } => {
                write!(f, "singular {context} covariance matrix; using {fallback}")
            }
            FitEvent::NoYErrors => write!(
                f,
                "no y errors provided for dataset; assuming all points have y error 1.0"
            ),
            FitEvent::NonPositiveNdf { ndf } => write!(
                f,
                "number of degrees of freedom is {ndf}; please review parameterization"
            ),
            FitEvent::OldLogRotated { from, to } => write!(
                f,
                "old log file '{}' moved to '{}'; remove old logs to reduce clutter",
                from.display(),
                to.display()
            ),
            FitEvent::ParameterFixed { id, name } => write!(f, "fixed parameter {id} ({name})"),
            FitEvent::ParameterReleased { id, name } => {
                write!(f, "released parameter {id} ({name})")
            }
            FitEvent::AllParametersReleased => write!(f, "released all parameters"),
            FitEvent::ParameterConstrained {
                id,
                name,
                target,
                sigma,
            } => write!(f, "constrained parameter {id} ({name}) to {target} +/- {sigma}"),
            FitEvent::ParametersLinked { canonical, slots } => {
                write!(f, "linked {slots} parameter slots as `{canonical}`")
            }
            FitEvent::MinimizerCalled { final_fit } => {
                write!(f, "calling minimizer (final fit: {final_fit})")
            }
            FitEvent::ProjectionIteration { iteration } => {
                write!(f, "x fit iteration {iteration}")
            }
            FitEvent::ProjectionConverged { iterations } => write!(
                f,
                "matrix for x fit iteration has converged after {iterations} iteration(s)"
            ),
            FitEvent::ProjectionCapReached { iterations } => write!(
                f,
                "x fit iteration stopped after {iterations} iterations without convergence"
            ),
        }
    }
}

pub trait FitObserver: Send + Sync {
    fn on_event(&self, event: &FitEvent);
}

/// Forwards events to `tracing` at their own level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl FitObserver for TracingObserver {
    fn on_event(&self, event: &FitEvent) {
        match event.level() {
            Level::WARN => tracing::warn!("{event}"),
            Level::INFO => tracing::info!("{event}"),
            _ => tracing::debug!("{event}"),
        }
    }
}

/// Keeps every event; handy in tests and for post-fit inspection.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<FitEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<FitEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn warnings(&self) -> Vec<FitEvent> {
        self.events().into_iter().filter(FitEvent::is_warning).collect()
    }
}

impl FitObserver for RecordingObserver {
    fn on_event(&self, event: &FitEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}

pub fn default_observer() -> Arc<dyn FitObserver> {
    Arc::new(TracingObserver)
}
