use crate::grid::{FieldKind, StaggeredGrid};
use ndarray::Array2;

/// Derived quantities sampled from the staggered velocity and pressure
/// fields, used by the output writers.
pub struct DerivedFields<'a> {
    grid: &'a StaggeredGrid,
}

impl<'a> DerivedFields<'a> {
    pub fn new(grid: &'a StaggeredGrid) -> Self {
        DerivedFields { grid }
    }

    // Samples one field at every cell center.
    fn at_cell_centers(&self, kind: FieldKind) -> Array2<f64> {
        let g = self.grid;
        let [nx, ny] = g.n_cells();
        let (dx, dy) = (g.dx(), g.dy());
        let field = g.field(kind);
        Array2::from_shape_fn((nx, ny), |(i, j)| {
            field.interpolate_at((i as f64 + 0.5) * dx, (j as f64 + 0.5) * dy)
        })
    }

    /// u interpolated to cell centers, shape `(nx, ny)`
    pub fn u_center(&self) -> Array2<f64> {
        self.at_cell_centers(FieldKind::U)
    }

    /// v interpolated to cell centers, shape `(nx, ny)`
    pub fn v_center(&self) -> Array2<f64> {
        self.at_cell_centers(FieldKind::V)
    }

    /// Interior pressure, shape `(nx, ny)`
    pub fn pressure(&self) -> Array2<f64> {
        self.at_cell_centers(FieldKind::P)
    }

    /// |v| = sqrt(u² + v²) at cell centers
    pub fn velocity_magnitude(&self) -> Array2<f64> {
        let u = self.u_center();
        let v = self.v_center();
        ndarray::Zip::from(&u).and(&v).map_collect(|&u, &v| (u * u + v * v).sqrt())
    }

    /// Discrete divergence per cell; vanishes (up to the pressure solver
    /// tolerance) after the projection step.
    pub fn divergence(&self) -> Array2<f64> {
        let g = self.grid;
        let [nx, ny] = g.n_cells();
        let (dx, dy) = (g.dx(), g.dy());
        Array2::from_shape_fn((nx, ny), |(i, j)| {
            let (i, j) = (i as isize, j as isize);
            (g.u(i, j) - g.u(i - 1, j)) / dx + (g.v(i, j) - g.v(i, j - 1)) / dy
        })
    }

    /// Vorticity dv/dx - du/dy on the cell corners, boundary corners
    /// included: shape `(nx + 1, ny + 1)`, node `(0, 0)` is the lower left
    /// corner of the domain.
    pub fn vorticity(&self) -> Array2<f64> {
        let g = self.grid;
        let [nx, ny] = g.n_cells();
        let (dx, dy) = (g.dx(), g.dy());
        Array2::from_shape_fn((nx + 1, ny + 1), |(a, b)| {
            let (i, j) = (a as isize - 1, b as isize - 1);
            let dv_dx = (g.v(i + 1, j) - g.v(i, j)) / dx;
            let du_dy = (g.u(i, j + 1) - g.u(i, j)) / dy;
            dv_dx - du_dy
        })
    }

    /// Field by output name, see the `field` option of the output section.
    pub fn by_name(&self, name: &str) -> Option<Array2<f64>> {
        match name {
            "u" => Some(self.u_center()),
            "v" => Some(self.v_center()),
            "p" => Some(self.pressure()),
            "vmag" => Some(self.velocity_magnitude()),
            "divergence" => Some(self.divergence()),
            "vorticity" => Some(self.vorticity()),
            _ => None,
        }
    }
}
