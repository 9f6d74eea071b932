//! Error taxonomy for solver construction and stepping.
//!
//! Per-particle problems are never raised mid-pass. Every pass runs to
//! completion and the solver inspects the aggregate state afterwards, so a
//! failed step is reported once with the step number it happened at.

use std::fmt;

use crate::solver::SolverPhase;

/// What made a step numerically unstable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstabilityCause {
    /// At least one density became NaN or infinite.
    NonFiniteDensity,
    /// At least one pressure became NaN or infinite.
    NonFinitePressure,
    /// At least one velocity component became NaN or infinite.
    NonFiniteVelocity,
    /// At least one position component became NaN or infinite.
    NonFinitePosition,
    /// The acceleration field was non-finite when the timestep was chosen.
    NonFiniteAcceleration,
    /// Some particles found more neighbors than the per-particle buffer holds.
    /// The buffers saturate; this is a symptom of particle clustering.
    NeighborOverflow {
        /// Number of particles whose neighbor list was truncated.
        particles: usize,
    },
}

impl fmt::Display for InstabilityCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonFiniteDensity => write!(f, "non-finite density"),
            Self::NonFinitePressure => write!(f, "non-finite pressure"),
            Self::NonFiniteVelocity => write!(f, "non-finite velocity"),
            Self::NonFinitePosition => write!(f, "non-finite position"),
            Self::NonFiniteAcceleration => write!(f, "non-finite acceleration"),
            Self::NeighborOverflow { particles } => {
                write!(f, "neighbor capacity exceeded for {particles} particles")
            }
        }
    }
}

/// Errors surfaced by the solver and its configuration layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SimError {
    /// Invalid startup parameters. Fatal; the simulation does not start.
    Configuration(String),
    /// The state diverged during `step`. The caller decides whether to stop,
    /// reset, or retry from a snapshot it kept.
    NumericalInstability {
        /// Step counter value of the step that diverged.
        step: u64,
        /// First non-finite quantity found.
        cause: InstabilityCause,
    },
    /// A lifecycle operation was called in the wrong solver phase.
    InvalidPhase(SolverPhase),
}

impl SimError {
    /// Shorthand for building a [`SimError::Configuration`].
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// `true` for [`SimError::NumericalInstability`].
    pub fn is_instability(&self) -> bool {
        matches!(self, Self::NumericalInstability { .. })
    }
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "invalid configuration: {msg}"),
            Self::NumericalInstability { step, cause } => {
                write!(f, "simulation diverged at step {step}: {cause}")
            }
            Self::InvalidPhase(phase) => {
                write!(f, "operation not allowed while solver is {phase:?}")
            }
        }
    }
}

impl std::error::Error for SimError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instability_message_names_step() {
        let err = SimError::NumericalInstability {
            step: 42,
            cause: InstabilityCause::NonFiniteVelocity,
        };
        assert_eq!(
            err.to_string(),
            "simulation diverged at step 42: non-finite velocity"
        );
        assert!(err.is_instability());
    }

    #[test]
    fn overflow_message_counts_particles() {
        let cause = InstabilityCause::NeighborOverflow { particles: 3 };
        assert_eq!(cause.to_string(), "neighbor capacity exceeded for 3 particles");
    }

    #[test]
    fn configuration_message() {
        let err = SimError::config("smoothing length must be positive");
        assert_eq!(
            err.to_string(),
            "invalid configuration: smoothing length must be positive"
        );
        assert!(!err.is_instability());
    }

    #[test]
    fn phase_message() {
        let err = SimError::InvalidPhase(SolverPhase::Terminated);
        assert_eq!(err.to_string(), "operation not allowed while solver is Terminated");
    }
}
