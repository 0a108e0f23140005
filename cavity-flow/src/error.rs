use thiserror::Error;

/// Errors raised by the simulation engine.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// The configured pressure solver name is not one of `SOR`, `GaussSeidel`.
    #[error("pressure solver \"{name}\" is not understood (expected \"SOR\" or \"GaussSeidel\")")]
    UnknownPressureSolver { name: String },

    /// A field was accessed outside its logical index range.
    #[error("{axis}-index {index} of field {field} out of range [{begin}, {end})")]
    IndexOutOfRange {
        field: &'static str,
        axis: char,
        index: isize,
        begin: isize,
        end: isize,
    },

    /// A numeric parameter is outside its admissible range.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("time step width {dt} is not finite and positive")]
    NonFiniteTimeStep { dt: f64 },

    /// Failure reported by an output sink.
    #[error("output failed: {0}")]
    Output(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SimulationError>;
