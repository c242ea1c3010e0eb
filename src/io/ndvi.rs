use crate::io::IndexCalculator;
use crate::types::{CubeError, CubeResult, IndexSeries, RasterTimeSeries};
use ndarray::{Array3, Axis, Zip};

/// Normalized difference vegetation index: (NIR - red) / (NIR + red).
///
/// Cloud-affected or otherwise missing pixels stay NaN; a zero denominator
/// also yields NaN. The pipeline enforces no value-range invariant, the
/// formula owns its output range.
pub struct Ndvi;

impl IndexCalculator for Ndvi {
    fn compute(
        &self,
        series: &RasterTimeSeries,
        red_band: &str,
        nir_band: &str,
    ) -> CubeResult<IndexSeries> {
        let red_idx = series.band_index(red_band).ok_or_else(|| {
            CubeError::Processing(format!("band {} not present in series", red_band))
        })?;
        let nir_idx = series.band_index(nir_band).ok_or_else(|| {
            CubeError::Processing(format!("band {} not present in series", nir_band))
        })?;
        let crs = series.crs.clone().ok_or_else(|| {
            CubeError::Processing("series carries no CRS, cannot derive an index".into())
        })?;

        let red = series.values.index_axis(Axis(1), red_idx);
        let nir = series.values.index_axis(Axis(1), nir_idx);
        let mut values = Array3::zeros(red.dim());
        Zip::from(&mut values).and(&red).and(&nir).for_each(|o, &r, &n| {
            *o = (n - r) / (n + r);
        });

        Ok(IndexSeries {
            name: "NDVI".into(),
            times: series.times.clone(),
            values,
            x: series.x.clone(),
            y: series.y.clone(),
            crs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Crs;
    use approx::assert_relative_eq;
    use chrono::TimeZone;
    use ndarray::{Array1, Array4};

    fn two_band_series() -> RasterTimeSeries {
        let mut values = Array4::<f32>::zeros((1, 2, 1, 2));
        values[[0, 0, 0, 0]] = 1.0; // B04
        values[[0, 1, 0, 0]] = 3.0; // B08
        values[[0, 0, 0, 1]] = 2.0;
        values[[0, 1, 0, 1]] = f32::NAN;
        RasterTimeSeries::new(
            vec![chrono::Utc.with_ymd_and_hms(2018, 3, 1, 0, 0, 0).unwrap()],
            vec!["B04".into(), "B08".into()],
            values,
            Array1::linspace(0.0, 10.0, 2),
            Array1::linspace(0.0, 0.0, 1),
            Some(Crs::new("EPSG:32632")),
        )
        .unwrap()
    }

    #[test]
    fn test_ndvi_formula() {
        let series = two_band_series();
        let index = Ndvi.compute(&series, "B04", "B08").unwrap();
        assert_eq!(index.name, "NDVI");
        assert_relative_eq!(index.values[[0, 0, 0]], 0.5);
        assert!(index.values[[0, 0, 1]].is_nan());
    }

    #[test]
    fn test_missing_band_is_an_error() {
        let series = two_band_series();
        assert!(Ndvi.compute(&series, "B04", "B09").is_err());
    }

    #[test]
    fn test_series_without_crs_is_rejected() {
        let mut series = two_band_series();
        series.crs = None;
        assert!(Ndvi.compute(&series, "B04", "B08").is_err());
    }
}
