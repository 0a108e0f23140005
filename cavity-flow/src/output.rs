use crate::config::OutputConfig;
use crate::error::{Result, SimulationError};
use crate::fields::DerivedFields;
use crate::grid::{FieldKind, FieldVariable, StaggeredGrid};
use log::debug;
use ndarray::Array2;
use plotters::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Read-only view of the simulation handed to the sinks after every
/// accepted time step.
pub struct Snapshot<'a> {
    pub grid: &'a StaggeredGrid,
    pub time: f64,
    /// Number of accepted steps so far
    pub step: usize,
    pub is_final: bool,
}

impl Snapshot<'_> {
    /// True if a writer with the given interval should write this snapshot.
    /// The final step is always written.
    pub fn is_due(&self, interval: usize) -> bool {
        self.is_final || self.step % interval.max(1) == 0
    }
}

pub trait OutputSink {
    fn write(&mut self, snapshot: &Snapshot) -> Result<()>;
}

/// Plain-text dump of all six fields, one file per written step.
pub struct TextWriter {
    directory: PathBuf,
    interval: usize,
    file_no: usize,
}

impl TextWriter {
    pub fn new(directory: impl AsRef<Path>, interval: usize) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory)?;
        Ok(Self {
            directory,
            interval,
            file_no: 0,
        })
    }

    /// Render the snapshot as text, fields printed top row first.
    pub fn render(grid: &StaggeredGrid, time: f64) -> String {
        let [dx, dy] = grid.mesh_width();
        let [nx, ny] = grid.n_cells();
        let mut text = format!("t: {time}\nn_cells: {nx} x {ny}, mesh width: {dx} x {dy}\n");
        for kind in FieldKind::ALL {
            text.push('\n');
            render_field(&mut text, grid.field(kind));
        }
        text
    }
}

fn render_field(text: &mut String, field: &FieldVariable) {
    let (i_begin, i_end) = (field.i_begin(), field.i_end());
    let (j_begin, j_end) = (field.j_begin(), field.j_end());
    let [sx, sy] = field.size();
    text.push_str(&format!(
        "{} ({sx}x{sy} entries, i=[{i_begin}, {i_end}), j=[{j_begin}, {j_end}))\n",
        field.name()
    ));

    text.push_str("     |");
    for i in i_begin..i_end {
        text.push_str(&format!("{:>12}", i));
    }
    text.push('\n');
    text.push_str(&"-".repeat(6 + 12 * (i_end - i_begin) as usize));
    text.push('\n');

    for j in (j_begin..j_end).rev() {
        text.push_str(&format!("{:>4} |", j));
        for i in i_begin..i_end {
            text.push_str(&format!("{:>12.4e}", field.get(i, j)));
        }
        text.push('\n');
    }
}

impl OutputSink for TextWriter {
    fn write(&mut self, snapshot: &Snapshot) -> Result<()> {
        if !snapshot.is_due(self.interval) {
            return Ok(());
        }
        let path = self.directory.join(format!("output_{:04}.txt", self.file_no));
        fs::write(&path, Self::render(snapshot.grid, snapshot.time))?;
        debug!("Wrote {}", path.display());
        self.file_no += 1;
        Ok(())
    }
}

/// Color map image of one derived field per written step.
pub struct ImageWriter {
    directory: PathBuf,
    field: String,
    interval: usize,
    width: u32,
    height: u32,
    gradient: Box<dyn colorgrad::Gradient>,
}

fn plot_error<E: std::fmt::Display>(e: E) -> SimulationError {
    SimulationError::Output(e.to_string())
}

impl ImageWriter {
    pub fn new(directory: impl AsRef<Path>, field: &str, interval: usize, width: u32, height: u32) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory)?;

        // magnitudes are one-signed, everything else gets a diverging map
        let gradient: Box<dyn colorgrad::Gradient> = if field == "vmag" {
            Box::new(colorgrad::preset::viridis())
        } else {
            Box::new(colorgrad::preset::rd_yl_bu())
        };

        Ok(Self {
            directory,
            field: field.to_string(),
            interval,
            width,
            height,
            gradient,
        })
    }

    pub fn plot_field(&self, data: &Array2<f64>, step: usize, time: f64) -> Result<PathBuf> {
        let path = self.directory.join(format!("{}_{:06}.png", self.field, step));
        let root = BitMapBackend::new(&path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(plot_error)?;

        let (nx, ny) = data.dim();
        let (min_val, max_val) = self.color_range(data);

        let title = format!("{} at t={:.4} (step {})", self.field, time, step);
        let mut chart = ChartBuilder::on(&root)
            .caption(&title, ("sans-serif", 30))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(40)
            .build_cartesian_2d(0..nx, 0..ny)
            .map_err(plot_error)?;

        chart
            .configure_mesh()
            .x_desc("i")
            .y_desc("j")
            .draw()
            .map_err(plot_error)?;

        let cells = (0..nx).flat_map(|i| (0..ny).map(move |j| (i, j)));
        chart
            .draw_series(cells.map(|(i, j)| {
                let color = self.value_to_color(data[[i, j]], min_val, max_val);
                Rectangle::new([(i, j), (i + 1, j + 1)], color.filled())
            }))
            .map_err(plot_error)?;

        root.present().map_err(plot_error)?;
        // the backend borrows `path` until it is dropped
        drop(chart);
        drop(root);
        debug!("Saved frame: {}", path.display());
        Ok(path)
    }

    fn color_range(&self, data: &Array2<f64>) -> (f64, f64) {
        if self.field == "vmag" {
            let max = data.iter().fold(0.0_f64, |acc, &v| acc.max(v));
            (0.0, max)
        } else {
            let max_abs = data.iter().fold(0.0_f64, |acc, &v| acc.max(v.abs()));
            (-max_abs, max_abs)
        }
    }

    fn value_to_color(&self, value: f64, min_val: f64, max_val: f64) -> RGBColor {
        let normalized = if max_val > min_val {
            (value - min_val) / (max_val - min_val)
        } else {
            0.5
        };
        let normalized = normalized.clamp(0.0, 1.0);
        let rgba = self.gradient.at(normalized as f32).to_rgba8();
        RGBColor(rgba[0], rgba[1], rgba[2])
    }
}

impl OutputSink for ImageWriter {
    fn write(&mut self, snapshot: &Snapshot) -> Result<()> {
        if !snapshot.is_due(self.interval) {
            return Ok(());
        }
        let data = DerivedFields::new(snapshot.grid)
            .by_name(&self.field)
            .ok_or_else(|| SimulationError::Output(format!("unknown output field '{}'", self.field)))?;
        self.plot_field(&data, snapshot.step, snapshot.time)?;
        Ok(())
    }
}

/// Writers selected by the output section of the parameter file.
pub fn sinks_from_config(config: &OutputConfig) -> Result<Vec<Box<dyn OutputSink>>> {
    let mut sinks: Vec<Box<dyn OutputSink>> = Vec::new();
    if config.text {
        sinks.push(Box::new(TextWriter::new(&config.directory, config.interval)?));
    }
    if config.images {
        sinks.push(Box::new(ImageWriter::new(
            &config.directory,
            &config.field,
            config.interval,
            config.image_width,
            config.image_height,
        )?));
    }
    Ok(sinks)
}
