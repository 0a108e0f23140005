use crate::grid::StaggeredGrid;

/// Stencil family used for the convective terms.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scheme {
    /// Symmetric second-order differences.
    CentralDifferences,
    /// Blend of donor-cell upwinding (weight `alpha`) and central
    /// differences (weight `1 - alpha`).
    DonorCell { alpha: f64 },
}

impl Scheme {
    fn alpha(self) -> f64 {
        match self {
            Scheme::CentralDifferences => 0.0,
            Scheme::DonorCell { alpha } => alpha,
        }
    }
}

/// Staggered grid together with the finite-difference operators on it.
///
/// All operators read the grid only. Indices are the logical indices of the
/// field the derivative is evaluated for: u-points for the momentum terms of
/// the x-equation and `dp_dx`, v-points for the y-equation and `dp_dy`.
#[derive(Clone, Debug)]
pub struct Discretization {
    grid: StaggeredGrid,
    scheme: Scheme,
}

impl Discretization {
    pub fn new(grid: StaggeredGrid, scheme: Scheme) -> Self {
        Discretization { grid, scheme }
    }

    pub fn grid(&self) -> &StaggeredGrid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut StaggeredGrid {
        &mut self.grid
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    // diffusion

    pub fn d2u_dx2(&self, i: isize, j: isize) -> f64 {
        let g = &self.grid;
        let dx = g.dx();
        (g.u(i + 1, j) - 2.0 * g.u(i, j) + g.u(i - 1, j)) / (dx * dx)
    }

    pub fn d2u_dy2(&self, i: isize, j: isize) -> f64 {
        let g = &self.grid;
        let dy = g.dy();
        (g.u(i, j + 1) - 2.0 * g.u(i, j) + g.u(i, j - 1)) / (dy * dy)
    }

    pub fn d2v_dx2(&self, i: isize, j: isize) -> f64 {
        let g = &self.grid;
        let dx = g.dx();
        (g.v(i + 1, j) - 2.0 * g.v(i, j) + g.v(i - 1, j)) / (dx * dx)
    }

    pub fn d2v_dy2(&self, i: isize, j: isize) -> f64 {
        let g = &self.grid;
        let dy = g.dy();
        (g.v(i, j + 1) - 2.0 * g.v(i, j) + g.v(i, j - 1)) / (dy * dy)
    }

    // convection
    //
    // Each term is written as the central difference of face fluxes plus
    // alpha times the donor-cell correction |k| * (q_left - q_right) / 2,
    // which turns the face value into the upstream one for alpha = 1.

    pub fn du2_dx(&self, i: isize, j: isize) -> f64 {
        let g = &self.grid;
        let (u_w, u_c, u_e) = (g.u(i - 1, j), g.u(i, j), g.u(i + 1, j));

        let right = (u_c + u_e) / 2.0;
        let left = (u_w + u_c) / 2.0;
        let central = right * right - left * left;
        let upwind = right.abs() * (u_c - u_e) / 2.0 - left.abs() * (u_w - u_c) / 2.0;

        (central + self.scheme.alpha() * upwind) / g.dx()
    }

    pub fn duv_dy(&self, i: isize, j: isize) -> f64 {
        let g = &self.grid;
        let (u_s, u_c, u_n) = (g.u(i, j - 1), g.u(i, j), g.u(i, j + 1));

        // v interpolated to the upper and lower corners of the u cell
        let v_top = (g.v(i, j) + g.v(i + 1, j)) / 2.0;
        let v_bottom = (g.v(i, j - 1) + g.v(i + 1, j - 1)) / 2.0;

        let central = v_top * (u_c + u_n) / 2.0 - v_bottom * (u_s + u_c) / 2.0;
        let upwind = v_top.abs() * (u_c - u_n) / 2.0 - v_bottom.abs() * (u_s - u_c) / 2.0;

        (central + self.scheme.alpha() * upwind) / g.dy()
    }

    pub fn duv_dx(&self, i: isize, j: isize) -> f64 {
        let g = &self.grid;
        let (v_w, v_c, v_e) = (g.v(i - 1, j), g.v(i, j), g.v(i + 1, j));

        // u interpolated to the right and left corners of the v cell
        let u_right = (g.u(i, j) + g.u(i, j + 1)) / 2.0;
        let u_left = (g.u(i - 1, j) + g.u(i - 1, j + 1)) / 2.0;

        let central = u_right * (v_c + v_e) / 2.0 - u_left * (v_w + v_c) / 2.0;
        let upwind = u_right.abs() * (v_c - v_e) / 2.0 - u_left.abs() * (v_w - v_c) / 2.0;

        (central + self.scheme.alpha() * upwind) / g.dx()
    }

    pub fn dv2_dy(&self, i: isize, j: isize) -> f64 {
        let g = &self.grid;
        let (v_s, v_c, v_n) = (g.v(i, j - 1), g.v(i, j), g.v(i, j + 1));

        let top = (v_c + v_n) / 2.0;
        let bottom = (v_s + v_c) / 2.0;
        let central = top * top - bottom * bottom;
        let upwind = top.abs() * (v_c - v_n) / 2.0 - bottom.abs() * (v_s - v_c) / 2.0;

        (central + self.scheme.alpha() * upwind) / g.dy()
    }

    // pressure gradient

    pub fn dp_dx(&self, i: isize, j: isize) -> f64 {
        let g = &self.grid;
        (g.p(i + 1, j) - g.p(i, j)) / g.dx()
    }

    pub fn dp_dy(&self, i: isize, j: isize) -> f64 {
        let g = &self.grid;
        (g.p(i, j + 1) - g.p(i, j)) / g.dy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::FieldKind;
    use approx::assert_relative_eq;

    fn fill(grid: &mut StaggeredGrid, kind: FieldKind, func: impl Fn(f64, f64) -> f64) {
        let field = grid.field_mut(kind);
        for j in field.j_begin()..field.j_end() {
            for i in field.i_begin()..field.i_end() {
                let (x, y) = field.position(i, j);
                field.set(i, j, func(x, y));
            }
        }
    }

    /// Grid with u, v and p sampled from functions of the physical position.
    fn grid_from(
        n: [usize; 2],
        h: [f64; 2],
        u: impl Fn(f64, f64) -> f64,
        v: impl Fn(f64, f64) -> f64,
        p: impl Fn(f64, f64) -> f64,
    ) -> StaggeredGrid {
        let mut grid = StaggeredGrid::new(n, h);
        fill(&mut grid, FieldKind::U, u);
        fill(&mut grid, FieldKind::V, v);
        fill(&mut grid, FieldKind::P, p);
        grid
    }

    #[test]
    fn test_second_derivatives_are_exact_for_quadratics() {
        let grid = grid_from(
            [6, 6],
            [0.1, 0.2],
            |x, y| x * x + 3.0 * y * y,
            |x, y| 2.0 * x * x - y * y,
            |_, _| 0.0,
        );
        let d = Discretization::new(grid, Scheme::CentralDifferences);
        assert_relative_eq!(d.d2u_dx2(2, 2), 2.0, epsilon = 1e-9);
        assert_relative_eq!(d.d2u_dy2(2, 2), 6.0, epsilon = 1e-9);
        assert_relative_eq!(d.d2v_dx2(2, 2), 4.0, epsilon = 1e-9);
        assert_relative_eq!(d.d2v_dy2(2, 2), -2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_pressure_gradient_on_linear_field() {
        let grid = grid_from([5, 5], [0.2, 0.1], |_, _| 0.0, |_, _| 0.0, |x, y| 3.0 * x - 2.0 * y);
        let d = Discretization::new(grid, Scheme::CentralDifferences);
        assert_relative_eq!(d.dp_dx(1, 1), 3.0, epsilon = 1e-12);
        assert_relative_eq!(d.dp_dy(1, 1), -2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_uniform_flow_has_no_convection() {
        let grid = grid_from([5, 5], [0.2, 0.2], |_, _| 1.5, |_, _| -0.5, |_, _| 0.0);
        for scheme in [Scheme::CentralDifferences, Scheme::DonorCell { alpha: 0.7 }] {
            let d = Discretization::new(grid.clone(), scheme);
            assert_relative_eq!(d.du2_dx(2, 2), 0.0, epsilon = 1e-12);
            assert_relative_eq!(d.duv_dy(2, 2), 0.0, epsilon = 1e-12);
            assert_relative_eq!(d.duv_dx(2, 2), 0.0, epsilon = 1e-12);
            assert_relative_eq!(d.dv2_dy(2, 2), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_central_convection_on_linear_u() {
        // u = x gives d(u^2)/dx = 2x exactly for the averaged stencil
        let grid = grid_from([6, 6], [0.1, 0.1], |x, _| x, |_, _| 0.0, |_, _| 0.0);
        let d = Discretization::new(grid, Scheme::CentralDifferences);
        let (x, _) = d.grid().field(FieldKind::U).position(2, 2);
        assert_relative_eq!(d.du2_dx(2, 2), 2.0 * x, epsilon = 1e-12);
    }

    #[test]
    fn test_donor_cell_alpha_zero_matches_central() {
        let grid = grid_from(
            [6, 5],
            [0.1, 0.15],
            |x, y| (3.0 * x).sin() + y,
            |x, y| x * y - 0.3,
            |_, _| 0.0,
        );
        let central = Discretization::new(grid.clone(), Scheme::CentralDifferences);
        let donor = Discretization::new(grid, Scheme::DonorCell { alpha: 0.0 });
        for (i, j) in [(0, 0), (2, 3), (4, 1)] {
            assert_eq!(central.du2_dx(i, j), donor.du2_dx(i, j));
            assert_eq!(central.duv_dy(i, j), donor.duv_dy(i, j));
            assert_eq!(central.duv_dx(i, j), donor.duv_dx(i, j));
            assert_eq!(central.dv2_dy(i, j), donor.dv2_dy(i, j));
        }
    }

    #[test]
    fn test_full_upwind_takes_donor_values() {
        // positive u everywhere: the face value is the left (upstream) neighbor
        let mut grid = StaggeredGrid::new([4, 4], [1.0, 1.0]);
        grid.set_u(0, 1, 1.0);
        grid.set_u(1, 1, 2.0);
        grid.set_u(2, 1, 4.0);
        let d = Discretization::new(grid, Scheme::DonorCell { alpha: 1.0 });
        // faces carry (1+2)/2 and (2+4)/2; donors are u(0)=1 and u(1)=2
        let expected = 3.0 * 2.0 - 1.5 * 1.0;
        assert_relative_eq!(d.du2_dx(1, 1), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_full_upwind_du2_dx_negative_flow() {
        // u flows to the left: the donors are the right neighbors
        let mut grid = StaggeredGrid::new([4, 4], [1.0, 1.0]);
        grid.set_u(0, 1, -4.0);
        grid.set_u(1, 1, -2.0);
        grid.set_u(2, 1, -1.0);
        let d = Discretization::new(grid, Scheme::DonorCell { alpha: 1.0 });
        // faces carry -1.5 and -3; donors are u(2)=-1 and u(1)=-2
        let expected = -1.5 * -1.0 - (-3.0 * -2.0);
        assert_relative_eq!(d.du2_dx(1, 1), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_full_upwind_dv2_dy_both_directions() {
        for (values, expected) in [([1.0, 2.0, 4.0], 3.0 * 2.0 - 1.5 * 1.0), ([-4.0, -2.0, -1.0], 1.5 - 6.0)] {
            let mut grid = StaggeredGrid::new([4, 4], [1.0, 1.0]);
            for (k, value) in values.into_iter().enumerate() {
                grid.set_v(1, k as isize, value);
            }
            let d = Discretization::new(grid, Scheme::DonorCell { alpha: 1.0 });
            assert_relative_eq!(d.dv2_dy(1, 1), expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_full_upwind_duv_dy_follows_sign_of_v() {
        // u(1, 0..3) = 3, 5, 7 transported by v = +-2 on the top corner and
        // +-1 on the bottom corner
        for (sign, expected) in [(1.0, 2.0 * 5.0 - 1.0 * 3.0), (-1.0, -2.0 * 7.0 - (-1.0 * 5.0))] {
            let mut grid = StaggeredGrid::new([4, 4], [1.0, 1.0]);
            grid.set_u(1, 0, 3.0);
            grid.set_u(1, 1, 5.0);
            grid.set_u(1, 2, 7.0);
            for i in [1, 2] {
                grid.set_v(i, 1, sign * 2.0);
                grid.set_v(i, 0, sign * 1.0);
            }
            let d = Discretization::new(grid, Scheme::DonorCell { alpha: 1.0 });
            assert_relative_eq!(d.duv_dy(1, 1), expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_full_upwind_duv_dx_follows_sign_of_u() {
        // v(0..3, 1) = 3, 5, 7 transported by u = +-2 on the right corner and
        // +-1 on the left corner
        for (sign, expected) in [(1.0, 2.0 * 5.0 - 1.0 * 3.0), (-1.0, -2.0 * 7.0 - (-1.0 * 5.0))] {
            let mut grid = StaggeredGrid::new([4, 4], [1.0, 1.0]);
            grid.set_v(0, 1, 3.0);
            grid.set_v(1, 1, 5.0);
            grid.set_v(2, 1, 7.0);
            for j in [1, 2] {
                grid.set_u(1, j, sign * 2.0);
                grid.set_u(0, j, sign * 1.0);
            }
            let d = Discretization::new(grid, Scheme::DonorCell { alpha: 1.0 });
            assert_relative_eq!(d.duv_dx(1, 1), expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_donor_cell_with_mixed_face_directions() {
        // flow converging onto u(1): right face moves left, left face moves right
        let mut grid = StaggeredGrid::new([4, 4], [1.0, 1.0]);
        grid.set_u(0, 1, 3.0);
        grid.set_u(1, 1, 1.0);
        grid.set_u(2, 1, -5.0);
        let d = Discretization::new(grid, Scheme::DonorCell { alpha: 1.0 });
        // right face -2 takes u(2) = -5, left face 2 takes u(0) = 3
        let expected = -2.0 * -5.0 - 2.0 * 3.0;
        assert_relative_eq!(d.du2_dx(1, 1), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_diffusion_independent_of_scheme() {
        let grid = grid_from([5, 5], [0.2, 0.1], |x, y| x * y * y, |x, _| x.exp(), |_, _| 0.0);
        let central = Discretization::new(grid.clone(), Scheme::CentralDifferences);
        let donor = Discretization::new(grid, Scheme::DonorCell { alpha: 0.9 });
        assert_eq!(central.d2u_dy2(1, 2), donor.d2u_dy2(1, 2));
        assert_eq!(central.d2v_dx2(1, 2), donor.d2v_dx2(1, 2));
    }
}
