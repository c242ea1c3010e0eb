use crate::types::{CellValue, CubeError, CubeResult, RasterTimeSeries, MISSING};
use chrono::{DateTime, Utc};
use ndarray::{Array2, Array4, Axis, Zip};

/// Collapse duplicate timestamps in a fetched time series.
///
/// Multiple raw captures mapped to the same nominal date are merged into
/// one layer per distinct timestamp by a missing-value-aware mean: NaN
/// cells are ignored, and a cell that is NaN in every duplicate stays NaN.
/// A series whose time axis is already unique and sorted is returned
/// value-identical.
pub fn consolidate(series: &RasterTimeSeries) -> CubeResult<RasterTimeSeries> {
    if series.times.is_empty() {
        return Err(CubeError::EmptyTimeSeries);
    }

    // Strictly increasing means unique and sorted; nothing to do.
    if series.times.windows(2).all(|w| w[0] < w[1]) {
        log::debug!("time axis already unique ({} steps)", series.times.len());
        return Ok(series.clone());
    }

    let mut unique: Vec<DateTime<Utc>> = series.times.clone();
    unique.sort();
    unique.dedup();
    log::info!(
        "consolidating {} captures into {} unique timestamps",
        series.times.len(),
        unique.len()
    );

    let (_, nb, ny, nx) = series.values.dim();
    let mut out = Array4::<CellValue>::from_elem((unique.len(), nb, ny, nx), MISSING);

    for (ti, stamp) in unique.iter().enumerate() {
        let members: Vec<usize> = series
            .times
            .iter()
            .enumerate()
            .filter(|(_, t)| *t == stamp)
            .map(|(i, _)| i)
            .collect();
        log::debug!("{}: {} capture(s)", stamp.format("%Y-%m-%d"), members.len());

        for band in 0..nb {
            let mut sum = Array2::<f64>::zeros((ny, nx));
            let mut count = Array2::<u32>::zeros((ny, nx));
            for &m in &members {
                let layer = series.values.index_axis(Axis(0), m).index_axis_move(Axis(0), band);
                Zip::from(&mut sum).and(&mut count).and(&layer).for_each(
                    |s, c, &v| {
                        if !v.is_nan() {
                            *s += v as f64;
                            *c += 1;
                        }
                    },
                );
            }
            let mut target = out.index_axis_mut(Axis(0), ti).index_axis_move(Axis(0), band);
            Zip::from(&mut target).and(&sum).and(&count).for_each(|o, &s, &c| {
                if c > 0 {
                    *o = (s / c as f64) as CellValue;
                }
            });
        }
    }

    RasterTimeSeries::new(
        unique,
        series.bands.clone(),
        out,
        series.x.clone(),
        series.y.clone(),
        series.crs.clone(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ndarray::{Array1, Array4};

    fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn series(times: Vec<DateTime<Utc>>, values: Array4<CellValue>) -> RasterTimeSeries {
        let (_, _, ny, nx) = values.dim();
        RasterTimeSeries::new(
            times,
            vec!["B04".into()],
            values,
            Array1::linspace(0.0, (nx - 1) as f64, nx),
            Array1::linspace(0.0, (ny - 1) as f64, ny),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_unique_time_axis_is_identity() {
        let values = Array4::from_shape_fn((3, 1, 2, 2), |(t, _, i, j)| {
            (t * 10 + i * 2 + j) as CellValue
        });
        let s = series(
            vec![date(2018, 3, 1), date(2018, 5, 1), date(2018, 7, 1)],
            values.clone(),
        );
        let out = consolidate(&s).unwrap();
        assert_eq!(out.times, s.times);
        assert_eq!(out.values, values);
    }

    #[test]
    fn test_mean_under_duplication_skips_nan() {
        // Two captures on the same date: cell 0 sees [2, 6] and averages to
        // 4, cell 1 sees [6, NaN] and keeps its single valid value 6.
        let mut values = Array4::<CellValue>::zeros((2, 1, 1, 2));
        values[[0, 0, 0, 0]] = 2.0;
        values[[0, 0, 0, 1]] = 6.0;
        values[[1, 0, 0, 0]] = 6.0;
        values[[1, 0, 0, 1]] = MISSING;
        let s = series(vec![date(2019, 6, 1), date(2019, 6, 1)], values);
        let out = consolidate(&s).unwrap();
        assert_eq!(out.times.len(), 1);
        assert_eq!(out.values[[0, 0, 0, 0]], 4.0);
        assert_eq!(out.values[[0, 0, 0, 1]], 6.0);
    }

    #[test]
    fn test_all_nan_duplicates_stay_missing() {
        let values = Array4::<CellValue>::from_elem((2, 1, 1, 1), MISSING);
        let s = series(vec![date(2020, 1, 1), date(2020, 1, 1)], values);
        let out = consolidate(&s).unwrap();
        assert!(out.values[[0, 0, 0, 0]].is_nan());
    }

    #[test]
    fn test_unsorted_times_are_sorted() {
        let values = Array4::from_shape_fn((2, 1, 1, 1), |(t, _, _, _)| t as CellValue);
        let s = series(vec![date(2018, 9, 1), date(2018, 4, 1)], values);
        let out = consolidate(&s).unwrap();
        assert_eq!(out.times, vec![date(2018, 4, 1), date(2018, 9, 1)]);
        assert_eq!(out.values[[0, 0, 0, 0]], 1.0);
        assert_eq!(out.values[[1, 0, 0, 0]], 0.0);
    }

    #[test]
    fn test_empty_time_axis_fails() {
        let s = series(vec![], Array4::zeros((0, 1, 1, 1)));
        assert!(matches!(consolidate(&s), Err(CubeError::EmptyTimeSeries)));
    }
}
