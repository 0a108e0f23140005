//! Incompressible 2-D Navier-Stokes flow on a staggered MAC grid, advanced
//! with an explicit projection method.

pub mod config;
pub mod discretization;
pub mod error;
pub mod fields;
pub mod grid;
pub mod output;
pub mod pressure_solver;
pub mod simulation;

pub use config::Config;
pub use discretization::{Discretization, Scheme};
pub use error::{Result, SimulationError};
pub use grid::{FieldKind, FieldVariable, StaggeredGrid};
pub use output::{ImageWriter, OutputSink, Snapshot, TextWriter};
pub use pressure_solver::{PressureSolver, PressureSolverKind, SolveStats};
pub use simulation::{BoundaryVelocities, FlowParams, RunSummary, Simulation, StepReport, TimeSettings};
