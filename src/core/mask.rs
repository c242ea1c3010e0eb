use crate::core::grid::CommonGrid;
use crate::types::{CellValue, CubeError, CubeResult, Polygon, MISSING};
use ndarray::{Array2, Array3, Axis, Zip};

/// Boolean raster marking polygon-interior cells at common-grid resolution.
///
/// Computed once per site and applied to every layer; all layers share the
/// grid's shape and transform by construction, so one mask instance is
/// always valid.
#[derive(Debug, Clone)]
pub struct SiteMask {
    inside: Array2<bool>,
}

impl SiteMask {
    /// Rasterize the site polygon at the grid's transform: a cell is inside
    /// when its center falls within the polygon.
    pub fn from_polygon(polygon: &Polygon, grid: &CommonGrid) -> Self {
        let transform = grid.transform();
        let (ny, nx) = grid.shape();
        let inside = Array2::from_shape_fn((ny, nx), |(r, c)| {
            let (x, y) = transform.pixel_center(r, c);
            polygon.contains(x, y)
        });
        let mask = SiteMask { inside };
        log::debug!(
            "site mask: {} of {} cells inside polygon",
            mask.interior_count(),
            ny * nx
        );
        mask
    }

    pub fn shape(&self) -> (usize, usize) {
        self.inside.dim()
    }

    pub fn interior_count(&self) -> usize {
        self.inside.iter().filter(|&&m| m).count()
    }

    pub fn is_inside(&self, row: usize, col: usize) -> bool {
        self.inside[[row, col]]
    }

    /// Overwrite outside-polygon cells of a (y, x) layer with the missing
    /// sentinel. Idempotent.
    pub fn apply(&self, layer: &mut Array2<CellValue>) -> CubeResult<()> {
        if layer.dim() != self.inside.dim() {
            return Err(CubeError::Registration(format!(
                "mask shape {:?} does not match layer shape {:?}",
                self.inside.dim(),
                layer.dim()
            )));
        }
        Zip::from(layer).and(&self.inside).for_each(|v, &m| {
            if !m {
                *v = MISSING;
            }
        });
        Ok(())
    }

    /// Apply the mask to every time step of a (time, y, x) series
    pub fn apply_series(&self, values: &mut Array3<CellValue>) -> CubeResult<()> {
        let (_, ny, nx) = values.dim();
        if (ny, nx) != self.inside.dim() {
            return Err(CubeError::Registration(format!(
                "mask shape {:?} does not match series spatial shape {:?}",
                self.inside.dim(),
                (ny, nx)
            )));
        }
        for mut plane in values.axis_iter_mut(Axis(0)) {
            Zip::from(&mut plane).and(&self.inside).for_each(|v, &m| {
                if !m {
                    *v = MISSING;
                }
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    fn unit_grid() -> CommonGrid {
        CommonGrid {
            x: Array1::linspace(0.0, 10.0, 11),
            y: Array1::linspace(0.0, 10.0, 11),
        }
    }

    fn center_square() -> Polygon {
        Polygon::new(vec![(2.5, 2.5), (7.5, 2.5), (7.5, 7.5), (2.5, 7.5)])
    }

    #[test]
    fn test_rasterization_marks_interior_cells() {
        let mask = SiteMask::from_polygon(&center_square(), &unit_grid());
        // grid coordinates 3..=7 lie strictly inside the square
        assert_eq!(mask.interior_count(), 25);
        assert!(mask.is_inside(5, 5));
        assert!(!mask.is_inside(0, 0));
        assert!(!mask.is_inside(10, 10));
    }

    #[test]
    fn test_apply_sets_outside_cells_missing() {
        let mask = SiteMask::from_polygon(&center_square(), &unit_grid());
        let mut layer = Array2::<CellValue>::ones((11, 11));
        mask.apply(&mut layer).unwrap();
        assert!(layer[[0, 0]].is_nan());
        assert_eq!(layer[[5, 5]], 1.0);
        let nan_count = layer.iter().filter(|v| v.is_nan()).count();
        assert_eq!(nan_count, 11 * 11 - 25);
    }

    #[test]
    fn test_mask_is_idempotent() {
        let mask = SiteMask::from_polygon(&center_square(), &unit_grid());
        let mut once = Array2::<CellValue>::from_shape_fn((11, 11), |(r, c)| (r * 11 + c) as f32);
        mask.apply(&mut once).unwrap();
        let mut twice = once.clone();
        mask.apply(&mut twice).unwrap();
        for (a, b) in once.iter().zip(twice.iter()) {
            assert!((a.is_nan() && b.is_nan()) || a == b);
        }
    }

    #[test]
    fn test_apply_series_broadcasts_over_time() {
        let mask = SiteMask::from_polygon(&center_square(), &unit_grid());
        let mut values = Array3::<CellValue>::ones((3, 11, 11));
        mask.apply_series(&mut values).unwrap();
        for t in 0..3 {
            assert!(values[[t, 0, 0]].is_nan());
            assert_eq!(values[[t, 5, 5]], 1.0);
        }
    }

    #[test]
    fn test_shape_mismatch_is_registration_error() {
        let mask = SiteMask::from_polygon(&center_square(), &unit_grid());
        let mut wrong = Array2::<CellValue>::ones((5, 5));
        assert!(matches!(
            mask.apply(&mut wrong),
            Err(CubeError::Registration(_))
        ));
    }
}
