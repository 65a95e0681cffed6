//! Plain-text camera layout report: an ASCII top-down grid of the capture
//! center and cameras, followed by a table of each camera's angle, horizontal
//! distance and height relative to the center.

use std::fmt;
use std::fs;
use std::path::Path;

use nalgebra::Vector3;
use tracing::{error, info, warn};

use crate::config::ExportConfig;
use crate::error::{PlacementError, PlacementResult};
use crate::geometry::{azimuth_deg, horizontal_distance};

const CENTER_MARK: char = '^';
const DEGENERATE_EPS: f32 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutExporter {
    grid_width: usize,
    grid_height: usize,
}

impl Default for LayoutExporter {
    fn default() -> Self {
        Self::new(60, 20)
    }
}

impl LayoutExporter {
    /// Grid dimensions are clamped to at least 2x2.
    pub fn new(grid_width: usize, grid_height: usize) -> Self {
        Self {
            grid_width: grid_width.max(2),
            grid_height: grid_height.max(2),
        }
    }

    pub fn from_config(config: &ExportConfig) -> Self {
        Self::new(config.grid_width, config.grid_height)
    }

    pub fn render(&self, cameras: &[Vector3<f32>], center: &Vector3<f32>) -> String {
        self.report(cameras, center).to_string()
    }

    /// Report view over the given cameras, formatted lazily through `Display`.
    pub fn report<'a>(&'a self, cameras: &'a [Vector3<f32>], center: &'a Vector3<f32>) -> LayoutReport<'a> {
        LayoutReport { exporter: self, cameras, center }
    }

    /// Renders and writes the report. An empty camera list is rejected.
    pub fn write<P: AsRef<Path>>(
        &self,
        path: P,
        cameras: &[Vector3<f32>],
        center: &Vector3<f32>,
    ) -> PlacementResult<()> {
        if cameras.is_empty() {
            return Err(PlacementError::EmptyExport);
        }
        fs::write(path.as_ref(), self.render(cameras, center))?;
        Ok(())
    }

    /// Like `write`, but failures are logged and reported as `false`.
    pub fn export<P: AsRef<Path>>(&self, path: P, cameras: &[Vector3<f32>], center: &Vector3<f32>) -> bool {
        let path = path.as_ref();
        match self.write(path, cameras, center) {
            Ok(()) => {
                info!("Exported camera layout to file: {}", path.display());
                true
            }
            Err(PlacementError::EmptyExport) => {
                warn!("No camera positions to export ({})", path.display());
                false
            }
            Err(e) => {
                error!("Failed to export camera layout to {}: {}", path.display(), e);
                false
            }
        }
    }

    /// World XZ to (column, row). Row 0 is the maximum Z.
    fn cell(&self, bounds: &Bounds, p: &Vector3<f32>) -> (usize, usize) {
        let nx = (p.x - bounds.min_x) / (bounds.max_x - bounds.min_x);
        let nz = (p.z - bounds.min_z) / (bounds.max_z - bounds.min_z);
        let col = grid_index(nx * (self.grid_width - 1) as f32, self.grid_width);
        let row = grid_index((1.0 - nz) * (self.grid_height - 1) as f32, self.grid_height);
        (col, row)
    }
}

pub struct LayoutReport<'a> {
    exporter: &'a LayoutExporter,
    cameras: &'a [Vector3<f32>],
    center: &'a Vector3<f32>,
}

impl fmt::Display for LayoutReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let exporter = self.exporter;
        let bounds = Bounds::around(self.cameras, self.center);
        let mut grid = vec![vec![' '; exporter.grid_width]; exporter.grid_height];

        let (col, row) = exporter.cell(&bounds, self.center);
        grid[row][col] = CENTER_MARK;
        for (i, p) in self.cameras.iter().enumerate() {
            let (col, row) = exporter.cell(&bounds, p);
            grid[row][col] = camera_mark(i + 1);
        }

        writeln!(f, "CAMERA LAYOUT (ASCII Top-Down View)")?;
        writeln!(
            f,
            "Bounding Box: X[{:.1}, {:.1}]  Z[{:.1}, {:.1}]",
            bounds.min_x, bounds.max_x, bounds.min_z, bounds.max_z
        )?;
        writeln!(f)?;
        for row in &grid {
            writeln!(f, "{}", row.iter().collect::<String>())?;
        }
        writeln!(f)?;

        writeln!(f, "Camera Data Table:")?;
        writeln!(f, " Camera |   Angle   |  Dist  | Height ")?;
        writeln!(f, "---------------------------------------")?;
        for (i, p) in self.cameras.iter().enumerate() {
            writeln!(
                f,
                "   C{}   | {:>7.1}° | {:>6.2} | {:>6.2}",
                i + 1,
                azimuth_deg(p, self.center),
                horizontal_distance(p, self.center),
                p.y - self.center.y
            )?;
        }
        Ok(())
    }
}

struct Bounds {
    min_x: f32,
    max_x: f32,
    min_z: f32,
    max_z: f32,
}

impl Bounds {
    fn around(cameras: &[Vector3<f32>], center: &Vector3<f32>) -> Self {
        let mut b = Bounds { min_x: center.x, max_x: center.x, min_z: center.z, max_z: center.z };
        for p in cameras {
            b.min_x = b.min_x.min(p.x);
            b.max_x = b.max_x.max(p.x);
            b.min_z = b.min_z.min(p.z);
            b.max_z = b.max_z.max(p.z);
        }
        if (b.max_x - b.min_x).abs() < DEGENERATE_EPS {
            b.min_x -= 1.0;
            b.max_x += 1.0;
        }
        if (b.max_z - b.min_z).abs() < DEGENERATE_EPS {
            b.min_z -= 1.0;
            b.max_z += 1.0;
        }
        b
    }
}

fn grid_index(value: f32, len: usize) -> usize {
    (value.floor().max(0.0) as usize).min(len - 1)
}

/// First digit of the 1-based camera number.
fn camera_mark(number: usize) -> char {
    number.to_string().chars().next().unwrap_or('?')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Vector3<f32>> {
        vec![
            Vector3::new(5.0, 1.0, 0.0),
            Vector3::new(0.0, 2.0, 5.0),
            Vector3::new(-5.0, 1.5, 0.0),
            Vector3::new(0.0, 3.0, -5.0),
        ]
    }

    fn grid_rows(report: &str) -> Vec<&str> {
        report.lines().skip(3).take(20).collect()
    }

    #[test]
    fn test_render_header_and_bounds() {
        let report = LayoutExporter::default().render(&square(), &Vector3::zeros());
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines[0], "CAMERA LAYOUT (ASCII Top-Down View)");
        assert_eq!(lines[1], "Bounding Box: X[-5.0, 5.0]  Z[-5.0, 5.0]");
        assert_eq!(lines[2], "");
    }

    #[test]
    fn test_render_grid_positions() {
        let report = LayoutExporter::default().render(&square(), &Vector3::zeros());
        let rows = grid_rows(&report);
        assert_eq!(rows.len(), 20);
        for row in &rows {
            assert_eq!(row.chars().count(), 60);
        }
        let at = |row: usize, col: usize| rows[row].chars().nth(col).unwrap();
        // 中心: nx = nz = 0.5 → (29, 9)
        assert_eq!(at(9, 29), '^');
        // カメラ1: +X 端
        assert_eq!(at(9, 59), '1');
        // カメラ2: +Z は最上段
        assert_eq!(at(0, 29), '2');
        assert_eq!(at(9, 0), '3');
        assert_eq!(at(19, 29), '4');
    }

    #[test]
    fn test_render_table() {
        let report = LayoutExporter::default().render(&square(), &Vector3::zeros());
        assert!(report.contains("Camera Data Table:\n Camera |   Angle   |  Dist  | Height \n"));
        assert!(report.contains("   C1   |     0.0° |   5.00 |   1.00\n"), "{}", report);
        assert!(report.contains("   C2   |    90.0° |   5.00 |   2.00\n"), "{}", report);
        assert!(report.contains("   C3   |   180.0° |   5.00 |   1.50\n"), "{}", report);
        assert!(report.contains("   C4   |   270.0° |   5.00 |   3.00\n"), "{}", report);
    }

    #[test]
    fn test_degenerate_bounds_are_widened() {
        let report = LayoutExporter::default().render(&[Vector3::new(0.0, 1.0, 3.0)], &Vector3::zeros());
        assert!(report.contains("Bounding Box: X[-1.0, 1.0]  Z[0.0, 3.0]"), "{}", report);
    }

    #[test]
    fn test_report_display_matches_render() {
        let exporter = LayoutExporter::new(12, 6);
        let cameras = square();
        let center = Vector3::zeros();
        let shown = format!("{}", exporter.report(&cameras, &center));
        assert_eq!(shown, exporter.render(&cameras, &center));
        assert_eq!(shown.lines().nth(3).map(|l| l.chars().count()), Some(12));
        assert!(shown.ends_with("   C4   |   270.0° |   5.00 |   3.00\n"));
    }

    #[test]
    fn test_camera_marks_use_first_digit() {
        assert_eq!(camera_mark(1), '1');
        assert_eq!(camera_mark(9), '9');
        assert_eq!(camera_mark(12), '1');
        assert_eq!(camera_mark(30), '3');
    }

    #[test]
    fn test_camera_overwrites_center() {
        let report = LayoutExporter::new(10, 5).render(&[Vector3::zeros(), Vector3::new(1.0, 0.0, 1.0)], &Vector3::zeros());
        assert!(!report.contains('^'));
    }

    #[test]
    fn test_write_and_errors() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = LayoutExporter::default();
        let path = dir.path().join("CameraLayout_Best.txt");

        exporter.write(&path, &square(), &Vector3::zeros()).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, exporter.render(&square(), &Vector3::zeros()));

        assert!(matches!(
            exporter.write(dir.path().join("empty.txt"), &[], &Vector3::zeros()),
            Err(PlacementError::EmptyExport)
        ));
        assert!(!dir.path().join("empty.txt").exists());

        let unwritable = dir.path().join("missing_dir").join("layout.txt");
        assert!(matches!(
            exporter.write(&unwritable, &square(), &Vector3::zeros()),
            Err(PlacementError::Io(_))
        ));
        assert!(!exporter.export(&unwritable, &square(), &Vector3::zeros()));
        assert!(exporter.export(&path, &square(), &Vector3::zeros()));
    }

    #[test]
    fn test_from_config() {
        let config = ExportConfig { grid_width: 1, ..ExportConfig::default() };
        let exporter = LayoutExporter::from_config(&config);
        assert_eq!(exporter, LayoutExporter::new(2, 20));
    }
}
