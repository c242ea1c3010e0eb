use crate::core::grid::CommonGrid;
use crate::types::{CellValue, EpochLayer, IndexSeries, MISSING};
#[cfg(feature = "parallel")]
use ndarray::parallel::prelude::*;
use ndarray::{Array2, Array3, ArrayView2, ArrayViewMut1, Axis};
use num_traits::Float;

/// Per-target-coordinate lookup into a source axis: lower bracketing index
/// plus interpolation fraction, or `None` outside the source coverage.
type AxisMap = Vec<Option<(usize, f64)>>;

/// Resample a single (y, x) layer onto the common grid with bilinear
/// interpolation. Target cells outside the source's native coverage become
/// missing values; nothing is extrapolated.
pub fn resample_layer(layer: &EpochLayer, grid: &CommonGrid) -> EpochLayer {
    let x_map = build_axis_map(&layer.x, &grid.x);
    let y_map = build_axis_map(&layer.y, &grid.y);
    let (ny, nx) = grid.shape();
    let mut out = Array2::<CellValue>::from_elem((ny, nx), MISSING);
    let src = layer.values.view();

    #[cfg(feature = "parallel")]
    out.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(r, mut row)| fill_row(&mut row, &src, &y_map[r], &x_map));
    #[cfg(not(feature = "parallel"))]
    for (r, mut row) in out.axis_iter_mut(Axis(0)).enumerate() {
        fill_row(&mut row, &src, &y_map[r], &x_map);
    }

    EpochLayer {
        values: out,
        x: grid.x.clone(),
        y: grid.y.clone(),
        crs: layer.crs.clone(),
    }
}

/// Resample an index series onto the common grid. Interpolation is
/// spatial-only; the time axis passes through unchanged.
pub fn resample_series(series: &IndexSeries, grid: &CommonGrid) -> IndexSeries {
    let x_map = build_axis_map(&series.x, &grid.x);
    let y_map = build_axis_map(&series.y, &grid.y);
    let (ny, nx) = grid.shape();
    let nt = series.times.len();
    let mut out = Array3::<CellValue>::from_elem((nt, ny, nx), MISSING);

    let fill_plane = |t: usize, plane: &mut ndarray::ArrayViewMut2<CellValue>| {
        let src = series.values.index_axis(Axis(0), t);
        for (r, mut row) in plane.axis_iter_mut(Axis(0)).enumerate() {
            fill_row(&mut row, &src, &y_map[r], &x_map);
        }
    };
    #[cfg(feature = "parallel")]
    out.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(t, mut plane)| fill_plane(t, &mut plane));
    #[cfg(not(feature = "parallel"))]
    for (t, mut plane) in out.axis_iter_mut(Axis(0)).enumerate() {
        fill_plane(t, &mut plane);
    }

    IndexSeries {
        name: series.name.clone(),
        times: series.times.clone(),
        values: out,
        x: grid.x.clone(),
        y: grid.y.clone(),
        crs: series.crs.clone(),
    }
}

fn fill_row(
    row: &mut ArrayViewMut1<CellValue>,
    src: &ArrayView2<CellValue>,
    y_hit: &Option<(usize, f64)>,
    x_map: &AxisMap,
) {
    let Some((yi, fy)) = *y_hit else {
        return; // whole row outside source coverage, stays missing
    };
    for (j, x_hit) in x_map.iter().enumerate() {
        if let Some((xi, fx)) = *x_hit {
            let v00 = src[[yi, xi]];
            let v01 = src[[yi, xi + 1]];
            let v10 = src[[yi + 1, xi]];
            let v11 = src[[yi + 1, xi + 1]];
            row[j] = bilinear(v00, v01, v10, v11, fy as CellValue, fx as CellValue);
        }
    }
}

/// Bilinear blend of the four bracketing samples. NaN corners propagate,
/// matching linear interpolation over incomplete data.
fn bilinear<T: Float>(v00: T, v01: T, v10: T, v11: T, fy: T, fx: T) -> T {
    let one = T::one();
    let top = v00 * (one - fx) + v01 * fx;
    let bottom = v10 * (one - fx) + v11 * fx;
    top * (one - fy) + bottom * fy
}

fn build_axis_map(src: &ndarray::Array1<f64>, dst: &ndarray::Array1<f64>) -> AxisMap {
    let src: Vec<f64> = src.to_vec();
    dst.iter().map(|&t| axis_fraction(&src, t)).collect()
}

/// Locate `target` in a monotonic (ascending or descending) source axis.
///
/// Returns the lower bracketing index and the fraction towards the next
/// sample. Targets within a small relative tolerance of the endpoints are
/// clamped onto them; anything further out is outside coverage.
fn axis_fraction(axis: &[f64], target: f64) -> Option<(usize, f64)> {
    let n = axis.len();
    if n < 2 {
        return None;
    }
    let ascending = axis[n - 1] >= axis[0];
    let (lo, hi) = if ascending {
        (axis[0], axis[n - 1])
    } else {
        (axis[n - 1], axis[0])
    };
    let tol = (hi - lo).abs() * 1e-9;
    if target < lo - tol || target > hi + tol {
        return None;
    }
    let t = target.clamp(lo, hi);

    let i = if ascending {
        axis.partition_point(|&v| v <= t)
    } else {
        axis.partition_point(|&v| v >= t)
    };
    let i0 = i.saturating_sub(1).min(n - 2);
    let step = axis[i0 + 1] - axis[i0];
    let frac = if step == 0.0 { 0.0 } else { (t - axis[i0]) / step };
    Some((i0, frac.clamp(0.0, 1.0)))
}
