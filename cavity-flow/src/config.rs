use anyhow::{anyhow, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Domain geometry and resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    pub physical_size: [f64; 2],
    pub n_cells: [usize; 2],
}

impl DomainConfig {
    fn validate(&self) -> Result<()> {
        if self.n_cells[0] == 0 || self.n_cells[1] == 0 {
            return Err(anyhow!(
                "Cell counts must be positive (nx={}, ny={})",
                self.n_cells[0],
                self.n_cells[1]
            ));
        }
        if self.physical_size[0] <= 0.0 || self.physical_size[1] <= 0.0 {
            return Err(anyhow!(
                "Physical size must be positive (x={}, y={})",
                self.physical_size[0],
                self.physical_size[1]
            ));
        }
        Ok(())
    }

    pub fn mesh_width(&self) -> [f64; 2] {
        [
            self.physical_size[0] / self.n_cells[0] as f64,
            self.physical_size[1] / self.n_cells[1] as f64,
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsConfig {
    pub re: f64,
    /// Body force (gravity) per unit mass
    #[serde(default)]
    pub g: [f64; 2],
}

impl PhysicsConfig {
    fn validate(&self) -> Result<()> {
        if self.re <= 0.0 {
            return Err(anyhow!("Reynolds number must be positive, got {}", self.re));
        }
        Ok(())
    }
}

/// Dirichlet velocities `[u, v]` on each edge of the domain
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoundaryConfig {
    #[serde(default)]
    pub bottom: [f64; 2],
    #[serde(default)]
    pub top: [f64; 2],
    #[serde(default)]
    pub left: [f64; 2],
    #[serde(default)]
    pub right: [f64; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscretizationConfig {
    #[serde(default = "default_use_donor_cell")]
    pub use_donor_cell: bool,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
}

fn default_use_donor_cell() -> bool {
    true
}

fn default_alpha() -> f64 {
    0.5
}

impl Default for DiscretizationConfig {
    fn default() -> Self {
        Self {
            use_donor_cell: default_use_donor_cell(),
            alpha: default_alpha(),
        }
    }
}

impl DiscretizationConfig {
    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(anyhow!("alpha must be in [0, 1], got {}", self.alpha));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConfig {
    pub end_time: f64,
    /// Safety factor applied to the stability bound
    #[serde(default = "default_tau")]
    pub tau: f64,
    #[serde(default = "default_maximum_dt")]
    pub maximum_dt: f64,
}

fn default_tau() -> f64 {
    0.5
}

fn default_maximum_dt() -> f64 {
    0.1
}

impl TimeConfig {
    fn validate(&self) -> Result<()> {
        if self.end_time <= 0.0 {
            return Err(anyhow!("end_time must be positive, got {}", self.end_time));
        }
        if self.tau <= 0.0 || self.tau > 1.0 {
            return Err(anyhow!("tau must be in (0, 1], got {}", self.tau));
        }
        if self.maximum_dt <= 0.0 {
            return Err(anyhow!("maximum_dt must be positive, got {}", self.maximum_dt));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// "SOR" or "GaussSeidel"; checked when the simulation is built
    #[serde(default = "default_pressure_solver")]
    pub pressure_solver: String,
    #[serde(default = "default_omega")]
    pub omega: f64,
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    #[serde(default = "default_maximum_iterations")]
    pub maximum_iterations: usize,
}

fn default_pressure_solver() -> String {
    "SOR".to_string()
}

fn default_omega() -> f64 {
    1.6
}

fn default_epsilon() -> f64 {
    1e-5
}

fn default_maximum_iterations() -> usize {
    10_000
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            pressure_solver: default_pressure_solver(),
            omega: default_omega(),
            epsilon: default_epsilon(),
            maximum_iterations: default_maximum_iterations(),
        }
    }
}

impl SolverConfig {
    fn validate(&self) -> Result<()> {
        if self.omega <= 0.0 || self.omega >= 2.0 {
            return Err(anyhow!("omega must be in (0, 2), got {}", self.omega));
        }
        if self.epsilon <= 0.0 {
            return Err(anyhow!("epsilon must be positive, got {}", self.epsilon));
        }
        Ok(())
    }
}

/// Output writers configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_directory")]
    pub directory: String,
    #[serde(default = "default_true")]
    pub text: bool,
    #[serde(default)]
    pub images: bool,
    #[serde(default = "default_field")]
    pub field: String,
    /// Write every n-th accepted step
    #[serde(default = "default_interval")]
    pub interval: usize,
    #[serde(default = "default_image_width")]
    pub image_width: u32,
    #[serde(default = "default_image_height")]
    pub image_height: u32,
}

fn default_directory() -> String {
    "out".to_string()
}

fn default_true() -> bool {
    true
}

fn default_field() -> String {
    "vmag".to_string()
}

fn default_interval() -> usize {
    1
}

fn default_image_width() -> u32 {
    800
}

fn default_image_height() -> u32 {
    800
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            text: default_true(),
            images: false,
            field: default_field(),
            interval: default_interval(),
            image_width: default_image_width(),
            image_height: default_image_height(),
        }
    }
}

impl OutputConfig {
    fn validate(&self) -> Result<()> {
        let valid_fields = ["u", "v", "p", "vmag", "divergence", "vorticity"];
        if !valid_fields.contains(&self.field.as_str()) {
            return Err(anyhow!(
                "Invalid field '{}'. Must be one of: {:?}",
                self.field,
                valid_fields
            ));
        }
        if self.interval == 0 {
            return Err(anyhow!("output interval must be at least 1"));
        }
        if self.image_width == 0 || self.image_height == 0 {
            return Err(anyhow!(
                "Image dimensions must be positive (width={}, height={})",
                self.image_width,
                self.image_height
            ));
        }
        Ok(())
    }
}

/// Complete parameter file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub domain: DomainConfig,
    pub physics: PhysicsConfig,
    #[serde(default)]
    pub boundary: BoundaryConfig,
    #[serde(default)]
    pub discretization: DiscretizationConfig,
    pub time: TimeConfig,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse TOML config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.domain.validate()?;
        self.physics.validate()?;
        self.discretization.validate()?;
        self.time.validate()?;
        self.solver.validate()?;
        self.output.validate()?;
        Ok(())
    }

    pub fn log_summary(&self) {
        let [dx, dy] = self.domain.mesh_width();
        info!("=== Simulation Configuration ===");
        info!(
            "Domain: {} x {} cells, {} x {} physical size, mesh width {} x {}",
            self.domain.n_cells[0],
            self.domain.n_cells[1],
            self.domain.physical_size[0],
            self.domain.physical_size[1],
            dx,
            dy
        );
        info!("Physics: Re={}, g={:?}", self.physics.re, self.physics.g);
        info!(
            "Boundary [u, v]: bottom={:?} top={:?} left={:?} right={:?}",
            self.boundary.bottom, self.boundary.top, self.boundary.left, self.boundary.right
        );
        if self.discretization.use_donor_cell {
            info!("Discretization: donor cell, alpha={}", self.discretization.alpha);
        } else {
            info!("Discretization: central differences");
        }
        info!(
            "Time: end_time={}, tau={}, maximum_dt={}",
            self.time.end_time, self.time.tau, self.time.maximum_dt
        );
        info!(
            "Pressure solver: {} (omega={}, epsilon={}, max iterations={})",
            self.solver.pressure_solver, self.solver.omega, self.solver.epsilon, self.solver.maximum_iterations
        );
        info!(
            "Output: '{}' text={} images={} field={} every {} step(s)",
            self.output.directory, self.output.text, self.output.images, self.output.field, self.output.interval
        );
        info!("================================");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAVITY: &str = r#"
[domain]
physical_size = [2.0, 2.0]
n_cells = [20, 20]

[physics]
re = 1000.0

[boundary]
top = [1.0, 0.0]

[time]
end_time = 10.0
"#;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let cfg = Config::from_toml(CAVITY).unwrap();
        assert_eq!(cfg.domain.n_cells, [20, 20]);
        assert_eq!(cfg.physics.g, [0.0, 0.0]);
        assert_eq!(cfg.boundary.top, [1.0, 0.0]);
        assert_eq!(cfg.boundary.left, [0.0, 0.0]);
        assert!(cfg.discretization.use_donor_cell);
        assert_eq!(cfg.discretization.alpha, 0.5);
        assert_eq!(cfg.time.tau, 0.5);
        assert_eq!(cfg.time.maximum_dt, 0.1);
        assert_eq!(cfg.solver.pressure_solver, "SOR");
        assert_eq!(cfg.solver.omega, 1.6);
        assert_eq!(cfg.solver.epsilon, 1e-5);
        assert_eq!(cfg.solver.maximum_iterations, 10_000);
        assert_eq!(cfg.output.field, "vmag");
        assert_eq!(cfg.output.interval, 1);
    }

    #[test]
    fn test_mesh_width() {
        let cfg = Config::from_toml(CAVITY).unwrap();
        assert_eq!(cfg.domain.mesh_width(), [0.1, 0.1]);
    }

    #[test]
    fn test_rejects_non_positive_reynolds() {
        let text = CAVITY.replace("re = 1000.0", "re = 0.0");
        let err = Config::from_toml(&text).unwrap_err();
        assert!(err.to_string().contains("Reynolds"));
    }

    #[test]
    fn test_rejects_zero_cells() {
        let text = CAVITY.replace("n_cells = [20, 20]", "n_cells = [0, 20]");
        assert!(Config::from_toml(&text).is_err());
    }

    #[test]
    fn test_rejects_unknown_output_field() {
        let text = format!("{CAVITY}\n[output]\nfield = \"enstrophy\"\n");
        assert!(Config::from_toml(&text).is_err());
    }

    #[test]
    fn test_unknown_solver_name_passes_file_validation() {
        // the engine reports unknown solvers when it is built
        let text = format!("{CAVITY}\n[solver]\npressure_solver = \"Multigrid\"\n");
        let cfg = Config::from_toml(&text).unwrap();
        assert_eq!(cfg.solver.pressure_solver, "Multigrid");
    }

    #[test]
    fn test_from_file_reports_missing_file() {
        let err = Config::from_file("/nonexistent/cavity.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
