use crate::types::{CubeError, CubeResult, GeoTransform};
use ndarray::Array1;

/// Shared target grid for one site.
///
/// Both the index series and every classification epoch are resampled onto
/// exactly these axes, so a single polygon mask stays valid for all layers.
/// Axes are monotonically increasing and span the union bounding box of the
/// two sources at a compromise resolution (rounded mean of the native
/// sample counts).
#[derive(Debug, Clone, PartialEq)]
pub struct CommonGrid {
    pub x: Array1<f64>,
    pub y: Array1<f64>,
}

impl CommonGrid {
    /// Reconcile two sources, already reprojected into the same target CRS,
    /// into one compromise grid.
    ///
    /// Neither source dictates the other's resolution: the extent is the
    /// per-axis union (rounded to integer grid units to stabilize floating
    /// point extremes) and the sample count is the rounded mean of the two
    /// native counts. An empty axis on either side fails fast so the caller
    /// can skip the site instead of working on a degenerate grid.
    pub fn reconcile(
        a_x: &Array1<f64>,
        a_y: &Array1<f64>,
        b_x: &Array1<f64>,
        b_y: &Array1<f64>,
    ) -> CubeResult<Self> {
        let x = reconcile_axis(a_x, b_x, "x")?;
        let y = reconcile_axis(a_y, b_y, "y")?;
        log::debug!(
            "common grid: {} x {} cells, x [{:.1}, {:.1}], y [{:.1}, {:.1}]",
            y.len(),
            x.len(),
            x[0],
            x[x.len() - 1],
            y[0],
            y[y.len() - 1]
        );
        Ok(CommonGrid { x, y })
    }

    /// Grid shape as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.y.len(), self.x.len())
    }

    /// Affine transform whose pixel centers coincide with the grid axes
    pub fn transform(&self) -> GeoTransform {
        let nx = self.x.len();
        let ny = self.y.len();
        let dx = (self.x[nx - 1] - self.x[0]) / (nx - 1) as f64;
        let dy = (self.y[ny - 1] - self.y[0]) / (ny - 1) as f64;
        GeoTransform {
            top_left_x: self.x[0] - dx / 2.0,
            pixel_width: dx,
            rotation_x: 0.0,
            top_left_y: self.y[0] - dy / 2.0,
            rotation_y: 0.0,
            pixel_height: dy,
        }
    }
}

fn reconcile_axis(a: &Array1<f64>, b: &Array1<f64>, name: &str) -> CubeResult<Array1<f64>> {
    if a.is_empty() || b.is_empty() {
        return Err(CubeError::DegenerateGrid(format!(
            "{} axis has no coordinates in one of the sources",
            name
        )));
    }

    // Axes may be ascending or descending; take elementwise extremes.
    let (a_min, a_max) = axis_range(a);
    let (b_min, b_max) = axis_range(b);
    let grid_min = a_min.min(b_min).round();
    let grid_max = a_max.max(b_max).round();
    if grid_max <= grid_min {
        return Err(CubeError::DegenerateGrid(format!(
            "{} axis collapses to a zero-width extent [{}, {}]",
            name, grid_min, grid_max
        )));
    }

    let count = ((a.len() + b.len()) as f64 / 2.0).round() as usize;
    if count < 2 {
        return Err(CubeError::DegenerateGrid(format!(
            "{} axis would have {} sample(s)",
            name, count
        )));
    }

    Ok(Array1::linspace(grid_min, grid_max, count))
}

fn axis_range(axis: &Array1<f64>) -> (f64, f64) {
    axis.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
        (lo.min(v), hi.max(v))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_union_extent() {
        let a = Array1::linspace(0.0, 100.0, 11);
        let b = Array1::linspace(50.0, 200.0, 11);
        let grid = CommonGrid::reconcile(&a, &a, &b, &b).unwrap();
        assert_relative_eq!(grid.x[0], 0.0);
        assert_relative_eq!(grid.x[grid.x.len() - 1], 200.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rounded_mean_sample_count() {
        let a = Array1::linspace(0.0, 90.0, 10);
        let b = Array1::linspace(0.0, 95.0, 20);
        let grid = CommonGrid::reconcile(&a, &a, &b, &b).unwrap();
        assert_eq!(grid.x.len(), 15);
        assert_eq!(grid.y.len(), 15);
    }

    #[test]
    fn test_descending_axis_contributes_its_range() {
        let a = Array1::linspace(0.0, 100.0, 11);
        let desc = Array1::linspace(300.0, -20.0, 9);
        let grid = CommonGrid::reconcile(&a, &a, &desc, &desc).unwrap();
        assert_relative_eq!(grid.y[0], -20.0);
        assert_relative_eq!(grid.y[grid.y.len() - 1], 300.0, epsilon = 1e-9);
        // Output axes are always ascending
        let y = grid.y.to_vec();
        assert!(y.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_empty_source_fails_fast() {
        let a = Array1::linspace(0.0, 100.0, 11);
        let empty = Array1::<f64>::zeros(0);
        assert!(matches!(
            CommonGrid::reconcile(&a, &a, &empty, &a),
            Err(CubeError::DegenerateGrid(_))
        ));
    }

    #[test]
    fn test_single_point_sources_fail_fast() {
        let single = Array1::from_vec(vec![42.0]);
        assert!(matches!(
            CommonGrid::reconcile(&single, &single, &single, &single),
            Err(CubeError::DegenerateGrid(_))
        ));
    }

    #[test]
    fn test_transform_pixel_centers_match_axes() {
        let a = Array1::linspace(0.0, 100.0, 11);
        let b = Array1::linspace(0.0, 100.0, 11);
        let grid = CommonGrid::reconcile(&a, &a, &b, &b).unwrap();
        let t = grid.transform();
        let (x0, y0) = t.pixel_center(0, 0);
        assert_relative_eq!(x0, grid.x[0], epsilon = 1e-9);
        assert_relative_eq!(y0, grid.y[0], epsilon = 1e-9);
        let (x3, y2) = t.pixel_center(2, 3);
        assert_relative_eq!(x3, grid.x[3], epsilon = 1e-9);
        assert_relative_eq!(y2, grid.y[2], epsilon = 1e-9);
    }
}
