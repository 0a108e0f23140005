use crate::config::Config;
use crate::discretization::{Discretization, Scheme};
use crate::error::{Result, SimulationError};
use crate::grid::{FieldKind, StaggeredGrid};
use crate::output::{OutputSink, Snapshot};
use crate::pressure_solver::{PressureSolver, PressureSolverKind, SolveStats};
use log::{debug, info, warn};

/// Physical parameters of the momentum equations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlowParams {
    pub re: f64,
    /// Body force `[gx, gy]`
    pub g: [f64; 2],
}

/// Dirichlet velocities `[u, v]` on the four domain edges.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundaryVelocities {
    pub bottom: [f64; 2],
    pub top: [f64; 2],
    pub left: [f64; 2],
    pub right: [f64; 2],
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeSettings {
    pub end_time: f64,
    /// Safety factor on the stability bound
    pub tau: f64,
    pub maximum_dt: f64,
}

/// The three stability limits on the time step width.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeStepBounds {
    pub diffusion: f64,
    /// `dx / max|u|`, infinite when u vanishes everywhere
    pub convection_u: f64,
    /// `dy / max|v|`, infinite when v vanishes everywhere
    pub convection_v: f64,
}

impl TimeStepBounds {
    pub fn min(&self) -> f64 {
        self.diffusion.min(self.convection_u).min(self.convection_v)
    }
}

// Relative slack when comparing the summed step widths with the end time.
const END_TIME_TOLERANCE: f64 = 1e-10;

/// Diffusive stability limit for an explicit step.
pub fn diffusion_bound(re: f64, dx: f64, dy: f64) -> f64 {
    if dx == dy {
        re * dx * dy / 4.0
    } else {
        let h2x = dx * dx;
        let h2y = dy * dy;
        (re / 2.0) * (h2x * h2y) / (h2x + h2y)
    }
}

// A vanishing velocity puts no limit on the step.
fn convection_bound(h: f64, max_velocity: f64) -> f64 {
    if max_velocity > 0.0 {
        h / max_velocity
    } else {
        f64::INFINITY
    }
}

/// One accepted time step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepReport {
    pub step: usize,
    pub dt: f64,
    pub time: f64,
    pub pressure: SolveStats,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunSummary {
    pub steps: usize,
    pub final_time: f64,
    pub non_converged_solves: usize,
}

pub struct Simulation {
    discretization: Discretization,
    pressure_solver: PressureSolver,
    flow: FlowParams,
    boundary: BoundaryVelocities,
    time: TimeSettings,
    dt: f64,
    current_time: f64,
    current_step: usize,
}

impl Simulation {
    pub fn new(
        discretization: Discretization,
        pressure_solver: PressureSolver,
        flow: FlowParams,
        boundary: BoundaryVelocities,
        time: TimeSettings,
    ) -> Result<Self> {
        let invalid = |name: &'static str, reason: String| Err(SimulationError::InvalidParameter { name, reason });
        if flow.re <= 0.0 {
            return invalid("re", format!("must be positive, got {}", flow.re));
        }
        if time.end_time <= 0.0 {
            return invalid("end_time", format!("must be positive, got {}", time.end_time));
        }
        if time.tau <= 0.0 || time.tau > 1.0 {
            return invalid("tau", format!("must be in (0, 1], got {}", time.tau));
        }
        if time.maximum_dt <= 0.0 {
            return invalid("maximum_dt", format!("must be positive, got {}", time.maximum_dt));
        }

        Ok(Self {
            discretization,
            pressure_solver,
            flow,
            boundary,
            time,
            dt: 0.0,
            current_time: 0.0,
            current_step: 0,
        })
    }

    /// Build the engine from a parameter file. Fails on an unknown pressure
    /// solver before any step runs.
    pub fn from_config(config: &Config) -> Result<Self> {
        let n_cells = config.domain.n_cells;
        if n_cells[0] == 0 || n_cells[1] == 0 {
            return Err(SimulationError::InvalidParameter {
                name: "n_cells",
                reason: format!("must be positive, got {:?}", n_cells),
            });
        }
        let mesh_width = config.domain.mesh_width();
        if !(mesh_width[0] > 0.0 && mesh_width[1] > 0.0) {
            return Err(SimulationError::InvalidParameter {
                name: "physical_size",
                reason: format!("must be positive, got {:?}", config.domain.physical_size),
            });
        }

        let kind = PressureSolverKind::from_name(&config.solver.pressure_solver, config.solver.omega)?;
        let pressure_solver = PressureSolver::new(kind, config.solver.epsilon, config.solver.maximum_iterations);

        let scheme = if config.discretization.use_donor_cell {
            Scheme::DonorCell {
                alpha: config.discretization.alpha,
            }
        } else {
            Scheme::CentralDifferences
        };
        let discretization = Discretization::new(StaggeredGrid::new(n_cells, mesh_width), scheme);

        let flow = FlowParams {
            re: config.physics.re,
            g: config.physics.g,
        };
        let boundary = BoundaryVelocities {
            bottom: config.boundary.bottom,
            top: config.boundary.top,
            left: config.boundary.left,
            right: config.boundary.right,
        };
        let time = TimeSettings {
            end_time: config.time.end_time,
            tau: config.time.tau,
            maximum_dt: config.time.maximum_dt,
        };

        Self::new(discretization, pressure_solver, flow, boundary, time)
    }

    pub fn grid(&self) -> &StaggeredGrid {
        self.discretization.grid()
    }

    pub fn grid_mut(&mut self) -> &mut StaggeredGrid {
        self.discretization.grid_mut()
    }

    pub fn discretization(&self) -> &Discretization {
        &self.discretization
    }

    pub fn pressure_solver(&self) -> &PressureSolver {
        &self.pressure_solver
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Width of the last accepted step.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn is_finished(&self) -> bool {
        self.current_time >= self.time.end_time
    }

    /// Run from the current time to the end time, handing every accepted
    /// step to the sinks.
    pub fn run(&mut self, sinks: &mut [Box<dyn OutputSink>]) -> Result<RunSummary> {
        info!("Starting simulation at t={}", self.current_time);
        let [nx, ny] = self.grid().n_cells();
        info!("Grid: {}x{} cells, end time {}", nx, ny, self.time.end_time);
        info!(
            "Convection: {:?}, pressure: {}",
            self.discretization.scheme(),
            self.pressure_solver.kind().name()
        );

        let mut non_converged_solves = 0;
        while !self.is_finished() {
            let report = self.step(sinks)?;
            if !report.pressure.converged {
                non_converged_solves += 1;
            }
            if report.step % 100 == 0 {
                info!("Step {} (t={:.6}, dt={:.3e})", report.step, report.time, report.dt);
            }
        }

        info!(
            "Simulation complete: {} steps, t={}, {} pressure solve(s) hit the iteration cap",
            self.current_step, self.current_time, non_converged_solves
        );
        Ok(RunSummary {
            steps: self.current_step,
            final_time: self.current_time,
            non_converged_solves,
        })
    }

    /// Advance by one time step and write output.
    pub fn step(&mut self, sinks: &mut [Box<dyn OutputSink>]) -> Result<StepReport> {
        // 1. Boundary values for u, v and F, G
        self.apply_boundary_values();

        // 2. Stable step width, shortened to land on the end time
        self.compute_time_step_width()?;
        let is_final = self.advance_clock();
        debug!("t={} dt={}{}", self.current_time, self.dt, if is_final { " (final step)" } else { "" });

        // 3. Predicted velocities
        self.compute_preliminary_velocities();

        // 4. Pressure equation right-hand side
        self.compute_right_hand_side();

        // 5. Pressure
        let pressure = self.compute_pressure();

        // 6. Projected velocities
        self.compute_velocities();

        self.current_step += 1;

        // 7. Output
        let snapshot = Snapshot {
            grid: self.discretization.grid(),
            time: self.current_time,
            step: self.current_step,
            is_final,
        };
        for sink in sinks.iter_mut() {
            sink.write(&snapshot)?;
        }

        Ok(StepReport {
            step: self.current_step,
            dt: self.dt,
            time: self.current_time,
            pressure,
        })
    }

    // Moves the clock by dt. If the step reaches the end time (up to
    // accumulated round-off) it is shortened so the clock lands exactly on
    // it; returns true in that case.
    fn advance_clock(&mut self) -> bool {
        let end_time = self.time.end_time;
        let remaining = end_time - self.current_time;
        if self.dt >= remaining - END_TIME_TOLERANCE * end_time.abs().max(1.0) {
            self.dt = remaining;
            self.current_time = end_time;
            true
        } else {
            self.current_time += self.dt;
            false
        }
    }

    /// Set ghost and edge values of u, v from the Dirichlet data and copy
    /// them into F, G.
    ///
    /// Bottom/top are applied before left/right, so the corner values follow
    /// the side rule.
    pub fn apply_boundary_values(&mut self) {
        let bc = self.boundary;
        let grid = self.discretization.grid_mut();

        let (u_i0, u_i1) = (grid.u_i_begin(), grid.u_i_end() - 1);
        let (u_j0, u_j1) = (grid.u_j_begin(), grid.u_j_end() - 1);
        let (v_i0, v_i1) = (grid.v_i_begin(), grid.v_i_end() - 1);
        let (v_j0, v_j1) = (grid.v_j_begin(), grid.v_j_end() - 1);

        // bottom and top: u is tangential (mirrored), v is normal
        for i in u_i0..=u_i1 {
            let bottom = 2.0 * bc.bottom[0] - grid.u(i, u_j0 + 1);
            let top = 2.0 * bc.top[0] - grid.u(i, u_j1 - 1);
            grid.set_u(i, u_j0, bottom);
            grid.set_u(i, u_j1, top);
        }
        for i in v_i0..=v_i1 {
            grid.set_v(i, v_j0, bc.bottom[1]);
            grid.set_v(i, v_j1, bc.top[1]);
        }

        // left and right: u is normal, v is tangential (mirrored)
        for j in u_j0..=u_j1 {
            grid.set_u(u_i0, j, bc.left[0]);
            grid.set_u(u_i1, j, bc.right[0]);
        }
        for j in v_j0..=v_j1 {
            let left = 2.0 * bc.left[1] - grid.v(v_i0 + 1, j);
            let right = 2.0 * bc.right[1] - grid.v(v_i1 - 1, j);
            grid.set_v(v_i0, j, left);
            grid.set_v(v_i1, j, right);
        }

        // F, G take the velocities on the edges, again sides last
        for i in u_i0..=u_i1 {
            let (bottom, top) = (grid.u(i, u_j0), grid.u(i, u_j1));
            grid.set_f(i, u_j0, bottom);
            grid.set_f(i, u_j1, top);
        }
        for i in v_i0..=v_i1 {
            let (bottom, top) = (grid.v(i, v_j0), grid.v(i, v_j1));
            grid.set_g(i, v_j0, bottom);
            grid.set_g(i, v_j1, top);
        }
        for j in u_j0..=u_j1 {
            let (left, right) = (grid.u(u_i0, j), grid.u(u_i1, j));
            grid.set_f(u_i0, j, left);
            grid.set_f(u_i1, j, right);
        }
        for j in v_j0..=v_j1 {
            let (left, right) = (grid.v(v_i0, j), grid.v(v_i1, j));
            grid.set_g(v_i0, j, left);
            grid.set_g(v_i1, j, right);
        }
    }

    /// Stability limits for the current velocity field.
    pub fn time_step_bounds(&self) -> TimeStepBounds {
        let grid = self.discretization.grid();
        let (dx, dy) = (grid.dx(), grid.dy());

        // max |u|, max |v| over the full index range, ghost layers included
        let u_max = grid.field(FieldKind::U).max_abs();
        let v_max = grid.field(FieldKind::V).max_abs();

        TimeStepBounds {
            diffusion: diffusion_bound(self.flow.re, dx, dy),
            convection_u: convection_bound(dx, u_max),
            convection_v: convection_bound(dy, v_max),
        }
    }

    /// Compute and store the step width `min(tau * bound, maximum_dt)`.
    pub fn compute_time_step_width(&mut self) -> Result<f64> {
        let bounds = self.time_step_bounds();
        debug!(
            "dt bounds: diffusion={} convection_u={} convection_v={}",
            bounds.diffusion, bounds.convection_u, bounds.convection_v
        );

        let dt = (bounds.min() * self.time.tau).min(self.time.maximum_dt);
        if !dt.is_finite() || dt <= 0.0 {
            return Err(SimulationError::NonFiniteTimeStep { dt });
        }
        self.dt = dt;
        Ok(dt)
    }

    /// F and G on the interior u- and v-points.
    pub fn compute_preliminary_velocities(&mut self) {
        let dt = self.dt;
        let FlowParams { re, g } = self.flow;
        let d = &mut self.discretization;

        let (i0, i1) = (d.grid().u_i_begin() + 1, d.grid().u_i_end() - 1);
        let (j0, j1) = (d.grid().u_j_begin() + 1, d.grid().u_j_end() - 1);
        for j in j0..j1 {
            for i in i0..i1 {
                let diffusion = d.d2u_dx2(i, j) + d.d2u_dy2(i, j);
                let convection = d.du2_dx(i, j) + d.duv_dy(i, j);
                let f = d.grid().u(i, j) + dt * (diffusion / re - convection + g[0]);
                d.grid_mut().set_f(i, j, f);
            }
        }

        let (i0, i1) = (d.grid().v_i_begin() + 1, d.grid().v_i_end() - 1);
        let (j0, j1) = (d.grid().v_j_begin() + 1, d.grid().v_j_end() - 1);
        for j in j0..j1 {
            for i in i0..i1 {
                let diffusion = d.d2v_dx2(i, j) + d.d2v_dy2(i, j);
                let convection = d.duv_dx(i, j) + d.dv2_dy(i, j);
                let value = d.grid().v(i, j) + dt * (diffusion / re - convection + g[1]);
                d.grid_mut().set_g(i, j, value);
            }
        }
    }

    /// `rhs = div(F, G) / dt` on the interior pressure cells.
    pub fn compute_right_hand_side(&mut self) {
        let dt = self.dt;
        let grid = self.discretization.grid_mut();
        let (dx, dy) = (grid.dx(), grid.dy());

        for j in grid.p_j_begin() + 1..grid.p_j_end() - 1 {
            for i in grid.p_i_begin() + 1..grid.p_i_end() - 1 {
                let df = (grid.f(i, j) - grid.f(i - 1, j)) / dx;
                let dg = (grid.g(i, j) - grid.g(i, j - 1)) / dy;
                grid.set_rhs(i, j, (df + dg) / dt);
            }
        }
    }

    pub fn compute_pressure(&mut self) -> SolveStats {
        let stats = self.pressure_solver.solve(self.discretization.grid_mut());
        if stats.converged {
            debug!("pressure: {} iterations, residual {:.3e}", stats.iterations, stats.residual);
        } else {
            warn!(
                "pressure solver hit the cap of {} iterations at t={} (residual {:.3e} > {:.3e})",
                self.pressure_solver.maximum_iterations(),
                self.current_time,
                stats.residual,
                self.pressure_solver.epsilon()
            );
        }
        stats
    }

    /// `u = F - dt dp/dx`, `v = G - dt dp/dy` on the interior points.
    pub fn compute_velocities(&mut self) {
        let dt = self.dt;
        let d = &mut self.discretization;

        let (i0, i1) = (d.grid().u_i_begin() + 1, d.grid().u_i_end() - 1);
        let (j0, j1) = (d.grid().u_j_begin() + 1, d.grid().u_j_end() - 1);
        for j in j0..j1 {
            for i in i0..i1 {
                let u = d.grid().f(i, j) - dt * d.dp_dx(i, j);
                d.grid_mut().set_u(i, j, u);
            }
        }

        let (i0, i1) = (d.grid().v_i_begin() + 1, d.grid().v_i_end() - 1);
        let (j0, j1) = (d.grid().v_j_begin() + 1, d.grid().v_j_end() - 1);
        for j in j0..j1 {
            for i in i0..i1 {
                let v = d.grid().g(i, j) - dt * d.dp_dy(i, j);
                d.grid_mut().set_v(i, j, v);
            }
        }
    }

    /// Exercise the pressure solver on the simulation's own grid:
    /// first `rhs = 0` with uniform `p = 1`, then `rhs = 1` with `p = 0`.
    pub fn pressure_self_test(&mut self) -> [SolveStats; 2] {
        let run_case = |sim: &mut Self, rhs: f64, p: f64| {
            let grid = sim.discretization.grid_mut();
            for j in grid.p_j_begin() + 1..grid.p_j_end() - 1 {
                for i in grid.p_i_begin() + 1..grid.p_i_end() - 1 {
                    grid.set_rhs(i, j, rhs);
                    grid.set_p(i, j, p);
                }
            }
            let stats = sim.pressure_solver.solve(sim.discretization.grid_mut());
            info!(
                "{} with rhs={} p0={}: {} iterations, residual {:.3e}, converged={}",
                sim.pressure_solver.kind().name(),
                rhs,
                p,
                stats.iterations,
                stats.residual,
                stats.converged
            );
            log_pressure(sim.discretization.grid());
            stats
        };

        let uniform = run_case(self, 0.0, 1.0);
        let constant_rhs = run_case(self, 1.0, 0.0);
        [uniform, constant_rhs]
    }
}

// Pressure table, top row first, at debug level.
fn log_pressure(grid: &StaggeredGrid) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }
    for j in (grid.p_j_begin()..grid.p_j_end()).rev() {
        let row: Vec<String> = (grid.p_i_begin()..grid.p_i_end())
            .map(|i| format!("{:9.3}", grid.p(i, j)))
            .collect();
        debug!("{:4} |{}", j, row.join(""));
    }
}
