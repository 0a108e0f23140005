use crate::error::{Result, SimulationError};
use ndarray::Array2;

/// The six staggered quantities stored by a [`StaggeredGrid`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    U,
    V,
    P,
    F,
    G,
    Rhs,
}

impl FieldKind {
    pub const ALL: [FieldKind; 6] = [
        FieldKind::U,
        FieldKind::V,
        FieldKind::P,
        FieldKind::F,
        FieldKind::G,
        FieldKind::Rhs,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FieldKind::U => "u",
            FieldKind::V => "v",
            FieldKind::P => "p",
            FieldKind::F => "f",
            FieldKind::G => "g",
            FieldKind::Rhs => "rhs",
        }
    }
}

/// One staggered scalar field.
///
/// Values are addressed by logical indices which start at -1 (the ghost
/// layer). Storage index = logical index + 1 in both directions.
#[derive(Clone, Debug)]
pub struct FieldVariable {
    name: &'static str,
    data: Array2<f64>,
    offset: [f64; 2],
    mesh_width: [f64; 2],
}

impl FieldVariable {
    pub fn new(name: &'static str, size: [usize; 2], offset: [f64; 2], mesh_width: [f64; 2]) -> Self {
        FieldVariable {
            name,
            data: Array2::zeros((size[0], size[1])),
            offset,
            mesh_width,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Storage extents (including ghost layers).
    pub fn size(&self) -> [usize; 2] {
        let (nx, ny) = self.data.dim();
        [nx, ny]
    }

    pub fn mesh_width(&self) -> [f64; 2] {
        self.mesh_width
    }

    pub fn i_begin(&self) -> isize {
        -1
    }

    pub fn i_end(&self) -> isize {
        self.data.dim().0 as isize - 1
    }

    pub fn j_begin(&self) -> isize {
        -1
    }

    pub fn j_end(&self) -> isize {
        self.data.dim().1 as isize - 1
    }

    /// Raw storage, indexed by storage coordinates.
    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    fn storage_index(&self, i: isize, j: isize) -> Result<[usize; 2]> {
        let check = |axis: char, index: isize, begin: isize, end: isize| {
            if index < begin || index >= end {
                Err(SimulationError::IndexOutOfRange {
                    field: self.name,
                    axis,
                    index,
                    begin,
                    end,
                })
            } else {
                Ok((index + 1) as usize)
            }
        };
        let x = check('i', i, self.i_begin(), self.i_end())?;
        let y = check('j', j, self.j_begin(), self.j_end())?;
        Ok([x, y])
    }

    pub fn try_get(&self, i: isize, j: isize) -> Result<f64> {
        let [x, y] = self.storage_index(i, j)?;
        Ok(self.data[[x, y]])
    }

    pub fn try_get_mut(&mut self, i: isize, j: isize) -> Result<&mut f64> {
        let [x, y] = self.storage_index(i, j)?;
        Ok(&mut self.data[[x, y]])
    }

    /// Read a value. An index outside the field's range is a stencil bug and
    /// aborts with the offending index and the valid range.
    pub fn get(&self, i: isize, j: isize) -> f64 {
        match self.try_get(i, j) {
            Ok(value) => value,
            Err(e) => panic!("{e}"),
        }
    }

    pub fn get_mut(&mut self, i: isize, j: isize) -> &mut f64 {
        match self.try_get_mut(i, j) {
            Ok(value) => value,
            Err(e) => panic!("{e}"),
        }
    }

    pub fn set(&mut self, i: isize, j: isize, value: f64) {
        *self.get_mut(i, j) = value;
    }

    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    /// Largest absolute value over the whole field, ghost layers included.
    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0_f64, |acc, &v| acc.max(v.abs()))
    }

    /// Physical position of the value stored at logical index `(i, j)`.
    pub fn position(&self, i: isize, j: isize) -> (f64, f64) {
        let [dx, dy] = self.mesh_width;
        (
            (i + 1) as f64 * dx - self.offset[0],
            (j + 1) as f64 * dy - self.offset[1],
        )
    }

    /// Bilinear interpolation at the physical position `(x, y)`.
    ///
    /// Positions outside the stored points are clamped to the nearest
    /// storage cell.
    pub fn interpolate_at(&self, x: f64, y: f64) -> f64 {
        let (nx, ny) = self.data.dim();
        let [dx, dy] = self.mesh_width;

        let locate = |pos: f64, h: f64, offset: f64, n: usize| -> (usize, f64) {
            let s = (pos + offset) / h;
            let k = (s.floor().max(0.0) as usize).min(n.saturating_sub(2));
            let t = (s - k as f64).clamp(0.0, 1.0);
            (k, t)
        };
        let (kx, tx) = locate(x, dx, self.offset[0], nx);
        let (ky, ty) = locate(y, dy, self.offset[1], ny);

        let v00 = self.data[[kx, ky]];
        let v10 = self.data[[kx + 1, ky]];
        let v01 = self.data[[kx, ky + 1]];
        let v11 = self.data[[kx + 1, ky + 1]];

        (1.0 - tx) * (1.0 - ty) * v00 + tx * (1.0 - ty) * v10 + (1.0 - tx) * ty * v01 + tx * ty * v11
    }
}

/// MAC grid: u on vertical cell faces, v on horizontal cell faces, p in
/// cell centers. F and G share the layout of u and v, rhs that of p.
#[derive(Clone, Debug)]
pub struct StaggeredGrid {
    n_cells: [usize; 2],
    mesh_width: [f64; 2],
    u: FieldVariable,
    v: FieldVariable,
    p: FieldVariable,
    f: FieldVariable,
    g: FieldVariable,
    rhs: FieldVariable,
}

impl StaggeredGrid {
    pub fn new(n_cells: [usize; 2], mesh_width: [f64; 2]) -> Self {
        let [nx, ny] = n_cells;
        let [dx, dy] = mesh_width;

        let u_size = [nx + 1, ny + 2];
        let v_size = [nx + 2, ny + 1];
        let p_size = [nx + 2, ny + 2];
        let u_offset = [0.0, dy / 2.0];
        let v_offset = [dx / 2.0, 0.0];
        let p_offset = [dx / 2.0, dy / 2.0];

        StaggeredGrid {
            n_cells,
            mesh_width,
            u: FieldVariable::new("u", u_size, u_offset, mesh_width),
            v: FieldVariable::new("v", v_size, v_offset, mesh_width),
            p: FieldVariable::new("p", p_size, p_offset, mesh_width),
            f: FieldVariable::new("f", u_size, u_offset, mesh_width),
            g: FieldVariable::new("g", v_size, v_offset, mesh_width),
            rhs: FieldVariable::new("rhs", p_size, p_offset, mesh_width),
        }
    }

    pub fn n_cells(&self) -> [usize; 2] {
        self.n_cells
    }

    pub fn mesh_width(&self) -> [f64; 2] {
        self.mesh_width
    }

    pub fn dx(&self) -> f64 {
        self.mesh_width[0]
    }

    pub fn dy(&self) -> f64 {
        self.mesh_width[1]
    }

    /// Physical extent of the domain.
    pub fn physical_size(&self) -> [f64; 2] {
        [
            self.n_cells[0] as f64 * self.mesh_width[0],
            self.n_cells[1] as f64 * self.mesh_width[1],
        ]
    }

    pub fn field(&self, kind: FieldKind) -> &FieldVariable {
        match kind {
            FieldKind::U => &self.u,
            FieldKind::V => &self.v,
            FieldKind::P => &self.p,
            FieldKind::F => &self.f,
            FieldKind::G => &self.g,
            FieldKind::Rhs => &self.rhs,
        }
    }

    pub fn field_mut(&mut self, kind: FieldKind) -> &mut FieldVariable {
        match kind {
            FieldKind::U => &mut self.u,
            FieldKind::V => &mut self.v,
            FieldKind::P => &mut self.p,
            FieldKind::F => &mut self.f,
            FieldKind::G => &mut self.g,
            FieldKind::Rhs => &mut self.rhs,
        }
    }

    // index ranges; f shares u's, g shares v's, rhs shares p's

    pub fn u_i_begin(&self) -> isize {
        self.u.i_begin()
    }

    pub fn u_i_end(&self) -> isize {
        self.u.i_end()
    }

    pub fn u_j_begin(&self) -> isize {
        self.u.j_begin()
    }

    pub fn u_j_end(&self) -> isize {
        self.u.j_end()
    }

    pub fn v_i_begin(&self) -> isize {
        self.v.i_begin()
    }

    pub fn v_i_end(&self) -> isize {
        self.v.i_end()
    }

    pub fn v_j_begin(&self) -> isize {
        self.v.j_begin()
    }

    pub fn v_j_end(&self) -> isize {
        self.v.j_end()
    }

    pub fn p_i_begin(&self) -> isize {
        self.p.i_begin()
    }

    pub fn p_i_end(&self) -> isize {
        self.p.i_end()
    }

    pub fn p_j_begin(&self) -> isize {
        self.p.j_begin()
    }

    pub fn p_j_end(&self) -> isize {
        self.p.j_end()
    }

    // scalar access

    pub fn u(&self, i: isize, j: isize) -> f64 {
        self.u.get(i, j)
    }

    pub fn v(&self, i: isize, j: isize) -> f64 {
        self.v.get(i, j)
    }

    pub fn p(&self, i: isize, j: isize) -> f64 {
        self.p.get(i, j)
    }

    pub fn f(&self, i: isize, j: isize) -> f64 {
        self.f.get(i, j)
    }

    pub fn g(&self, i: isize, j: isize) -> f64 {
        self.g.get(i, j)
    }

    pub fn rhs(&self, i: isize, j: isize) -> f64 {
        self.rhs.get(i, j)
    }

    pub fn set_u(&mut self, i: isize, j: isize, value: f64) {
        self.u.set(i, j, value);
    }

    pub fn set_v(&mut self, i: isize, j: isize, value: f64) {
        self.v.set(i, j, value);
    }

    pub fn set_p(&mut self, i: isize, j: isize, value: f64) {
        self.p.set(i, j, value);
    }

    pub fn set_f(&mut self, i: isize, j: isize, value: f64) {
        self.f.set(i, j, value);
    }

    pub fn set_g(&mut self, i: isize, j: isize, value: f64) {
        self.g.set(i, j, value);
    }

    pub fn set_rhs(&mut self, i: isize, j: isize, value: f64) {
        self.rhs.set(i, j, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_index_ranges_follow_staggering() {
        let grid = StaggeredGrid::new([4, 3], [0.25, 0.5]);

        assert_eq!((grid.u_i_begin(), grid.u_i_end()), (-1, 4));
        assert_eq!((grid.u_j_begin(), grid.u_j_end()), (-1, 4));
        assert_eq!((grid.v_i_begin(), grid.v_i_end()), (-1, 5));
        assert_eq!((grid.v_j_begin(), grid.v_j_end()), (-1, 3));
        assert_eq!((grid.p_i_begin(), grid.p_i_end()), (-1, 5));
        assert_eq!((grid.p_j_begin(), grid.p_j_end()), (-1, 4));

        assert_eq!(grid.field(FieldKind::F).size(), grid.field(FieldKind::U).size());
        assert_eq!(grid.field(FieldKind::G).size(), grid.field(FieldKind::V).size());
        assert_eq!(grid.field(FieldKind::Rhs).size(), grid.field(FieldKind::P).size());
    }

    #[test]
    fn test_write_then_read_every_logical_index() {
        let mut grid = StaggeredGrid::new([3, 5], [0.1, 0.2]);
        for kind in FieldKind::ALL {
            let field = grid.field_mut(kind);
            let mut counter = 0.0;
            for j in field.j_begin()..field.j_end() {
                for i in field.i_begin()..field.i_end() {
                    counter += 1.0;
                    field.set(i, j, counter);
                }
            }
            let mut expected = 0.0;
            for j in field.j_begin()..field.j_end() {
                for i in field.i_begin()..field.i_end() {
                    expected += 1.0;
                    assert_eq!(field.get(i, j), expected, "field {} at ({}, {})", kind.name(), i, j);
                }
            }
        }
    }

    #[test]
    fn test_logical_index_maps_to_shifted_storage() {
        let mut grid = StaggeredGrid::new([2, 2], [1.0, 1.0]);
        grid.set_p(-1, -1, 3.0);
        grid.set_p(2, 0, 5.0);
        let data = grid.field(FieldKind::P).data();
        assert_eq!(data[[0, 0]], 3.0);
        assert_eq!(data[[3, 1]], 5.0);
    }

    #[test]
    fn test_out_of_range_access_reports_field_and_bounds() {
        let grid = StaggeredGrid::new([4, 4], [0.25, 0.25]);
        let err = grid.field(FieldKind::U).try_get(4, 0).unwrap_err();
        match err {
            SimulationError::IndexOutOfRange { field, axis, index, begin, end } => {
                assert_eq!(field, "u");
                assert_eq!(axis, 'i');
                assert_eq!(index, 4);
                assert_eq!((begin, end), (-1, 4));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(grid.field(FieldKind::V).try_get(0, -2).is_err());
    }

    #[test]
    #[should_panic(expected = "of field rhs out of range")]
    fn test_out_of_range_write_is_fatal() {
        let mut grid = StaggeredGrid::new([4, 4], [0.25, 0.25]);
        grid.set_rhs(0, 5, 1.0);
    }

    #[test]
    fn test_positions_honor_offsets() {
        let grid = StaggeredGrid::new([4, 4], [0.5, 0.25]);
        // u(-1, j) sits on the left wall
        let (x, y) = grid.field(FieldKind::U).position(-1, 0);
        assert_relative_eq!(x, 0.0);
        assert_relative_eq!(y, 0.125);
        // first pressure cell center
        let (x, y) = grid.field(FieldKind::P).position(0, 0);
        assert_relative_eq!(x, 0.25);
        assert_relative_eq!(y, 0.125);
        // v(i, -1) sits on the bottom wall
        let (_, y) = grid.field(FieldKind::V).position(1, -1);
        assert_relative_eq!(y, 0.0);
    }

    #[test]
    fn test_interpolation_reproduces_linear_field() {
        let mut grid = StaggeredGrid::new([4, 4], [0.25, 0.25]);
        for kind in [FieldKind::U, FieldKind::V, FieldKind::P] {
            let field = grid.field_mut(kind);
            for j in field.j_begin()..field.j_end() {
                for i in field.i_begin()..field.i_end() {
                    let (x, y) = field.position(i, j);
                    field.set(i, j, 2.0 * x + 3.0 * y);
                }
            }
            let value = field.interpolate_at(0.4, 0.7);
            assert_relative_eq!(value, 2.0 * 0.4 + 3.0 * 0.7, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_max_abs_scans_ghost_layers() {
        let mut grid = StaggeredGrid::new([3, 3], [1.0, 1.0]);
        grid.set_u(-1, -1, -4.0);
        grid.set_u(1, 1, 2.0);
        assert_eq!(grid.field(FieldKind::U).max_abs(), 4.0);
    }
}
