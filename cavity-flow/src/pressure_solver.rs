use crate::error::{Result, SimulationError};
use crate::grid::StaggeredGrid;

/// Relaxation method for the pressure Poisson equation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PressureSolverKind {
    GaussSeidel,
    Sor { omega: f64 },
}

impl PressureSolverKind {
    /// Resolve the configured solver name. `omega` is only used by SOR.
    pub fn from_name(name: &str, omega: f64) -> Result<Self> {
        match name {
            "GaussSeidel" => Ok(PressureSolverKind::GaussSeidel),
            "SOR" => Ok(PressureSolverKind::Sor { omega }),
            _ => Err(SimulationError::UnknownPressureSolver {
                name: name.to_string(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PressureSolverKind::GaussSeidel => "GaussSeidel",
            PressureSolverKind::Sor { .. } => "SOR",
        }
    }
}

/// Outcome of one pressure solve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolveStats {
    pub iterations: usize,
    /// RMS residual over the interior cells after the last sweep.
    pub residual: f64,
    pub converged: bool,
}

#[derive(Clone, Debug)]
pub struct PressureSolver {
    kind: PressureSolverKind,
    epsilon: f64,
    maximum_iterations: usize,
}

impl PressureSolver {
    pub fn new(kind: PressureSolverKind, epsilon: f64, maximum_iterations: usize) -> Self {
        PressureSolver {
            kind,
            epsilon,
            maximum_iterations,
        }
    }

    pub fn kind(&self) -> PressureSolverKind {
        self.kind
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn maximum_iterations(&self) -> usize {
        self.maximum_iterations
    }

    /// Relax `p` towards `Δp = rhs` with homogeneous Neumann boundaries.
    ///
    /// Stops once the RMS residual is at most `epsilon` or after
    /// `maximum_iterations` sweeps. Hitting the cap is reported through
    /// [`SolveStats::converged`], not as an error.
    pub fn solve(&self, grid: &mut StaggeredGrid) -> SolveStats {
        let shift = rhs_mean(grid);

        set_boundary_values(grid);
        let mut residual = residual_with_shift(grid, shift);
        let mut iterations = 0;

        while residual > self.epsilon && iterations < self.maximum_iterations {
            self.relax_interior(grid, shift);
            set_boundary_values(grid);
            residual = residual_with_shift(grid, shift);
            iterations += 1;
        }

        SolveStats {
            iterations,
            residual,
            converged: residual <= self.epsilon,
        }
    }

    /// Exactly one sweep: refresh the ghost layer, then update every
    /// interior cell once.
    pub fn sweep(&self, grid: &mut StaggeredGrid) {
        let shift = rhs_mean(grid);
        set_boundary_values(grid);
        self.relax_interior(grid, shift);
    }

    // In-place lexicographic sweep (i fastest). Cells updated earlier in the
    // sweep are already used by their neighbors.
    fn relax_interior(&self, grid: &mut StaggeredGrid, shift: f64) {
        let dx2 = grid.dx() * grid.dx();
        let dy2 = grid.dy() * grid.dy();
        let factor = dx2 * dy2 / (2.0 * (dx2 + dy2));

        for j in grid.p_j_begin() + 1..grid.p_j_end() - 1 {
            for i in grid.p_i_begin() + 1..grid.p_i_end() - 1 {
                let neighbors_x = (grid.p(i - 1, j) + grid.p(i + 1, j)) / dx2;
                let neighbors_y = (grid.p(i, j - 1) + grid.p(i, j + 1)) / dy2;
                let gauss_seidel = factor * (neighbors_x + neighbors_y - (grid.rhs(i, j) - shift));

                let value = match self.kind {
                    PressureSolverKind::GaussSeidel => gauss_seidel,
                    PressureSolverKind::Sor { omega } => (1.0 - omega) * grid.p(i, j) + omega * gauss_seidel,
                };
                grid.set_p(i, j, value);
            }
        }
    }
}

/// Copy the adjacent interior value into the ghost layer on all four edges
/// (zero normal gradient).
pub fn set_boundary_values(grid: &mut StaggeredGrid) {
    let (i_first, i_last) = (grid.p_i_begin(), grid.p_i_end() - 1);
    let (j_first, j_last) = (grid.p_j_begin(), grid.p_j_end() - 1);

    for i in i_first + 1..i_last {
        let bottom = grid.p(i, j_first + 1);
        let top = grid.p(i, j_last - 1);
        grid.set_p(i, j_first, bottom);
        grid.set_p(i, j_last, top);
    }
    for j in j_first + 1..j_last {
        let left = grid.p(i_first + 1, j);
        let right = grid.p(i_last - 1, j);
        grid.set_p(i_first, j, left);
        grid.set_p(i_last, j, right);
    }
}

/// RMS residual of `Δp = rhs` over the interior cells, with `rhs` taken
/// relative to its interior mean.
pub fn residual_norm(grid: &StaggeredGrid) -> f64 {
    residual_with_shift(grid, rhs_mean(grid))
}

// The pure Neumann problem only has a solution for zero-mean data, so the
// interior mean of rhs is removed before relaxing.
fn rhs_mean(grid: &StaggeredGrid) -> f64 {
    let [nx, ny] = grid.n_cells();
    let mut sum = 0.0;
    for j in grid.p_j_begin() + 1..grid.p_j_end() - 1 {
        for i in grid.p_i_begin() + 1..grid.p_i_end() - 1 {
            sum += grid.rhs(i, j);
        }
    }
    sum / (nx * ny) as f64
}

fn residual_with_shift(grid: &StaggeredGrid, shift: f64) -> f64 {
    let [nx, ny] = grid.n_cells();
    let dx2 = grid.dx() * grid.dx();
    let dy2 = grid.dy() * grid.dy();

    let mut sum = 0.0;
    for j in grid.p_j_begin() + 1..grid.p_j_end() - 1 {
        for i in grid.p_i_begin() + 1..grid.p_i_end() - 1 {
            let p = grid.p(i, j);
            let laplace_x = (grid.p(i - 1, j) - 2.0 * p + grid.p(i + 1, j)) / dx2;
            let laplace_y = (grid.p(i, j - 1) - 2.0 * p + grid.p(i, j + 1)) / dy2;
            let r = laplace_x + laplace_y - (grid.rhs(i, j) - shift);
            sum += r * r;
        }
    }
    (sum / (nx * ny) as f64).sqrt()
}
