//! Boundary contracts for the external collaborators.
//!
//! Imagery retrieval, radiometric correction, classification access,
//! reprojection and persistence are black-box services as far as the cube
//! pipeline is concerned; each is a trait here so the pipeline can be
//! driven by real backends or by in-memory test doubles.

pub mod ndvi;

pub use ndvi::Ndvi;

use crate::core::assemble::SiteCube;
use crate::core::site::SiteDescriptor;
use crate::types::{Crs, CubeResult, Epoch, EpochLayer, Extent, RasterTimeSeries};
use chrono::NaiveDate;

/// Query parameters for the remote imagery source
#[derive(Debug, Clone)]
pub struct ImageryQuery {
    pub center_lat: f64,
    pub center_lon: f64,
    pub bands: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Requested edge length in pixels
    pub edge_pixels: f64,
    /// Ground resolution in meters per pixel
    pub resolution: f64,
    /// Maximum acceptable cloud cover, percent
    pub max_cloud_pct: f64,
}

/// Remote satellite-imagery retrieval.
///
/// One best-effort attempt per site; an error or an empty result means the
/// site is skipped. Implementations must attach the series CRS when the
/// backend only reports it as a side attribute.
pub trait ImagerySource: Send + Sync {
    fn fetch(&self, query: &ImageryQuery) -> CubeResult<RasterTimeSeries>;
}

/// Radiometric (BRDF/NBAR) correction; shape and axes pass through unchanged
pub trait RadiometricCorrector: Send + Sync {
    fn correct(&self, series: RasterTimeSeries) -> CubeResult<RasterTimeSeries>;
}

/// Vegetation-index computation from two named band selections
pub trait IndexCalculator: Send + Sync {
    fn compute(
        &self,
        series: &RasterTimeSeries,
        red_band: &str,
        nir_band: &str,
    ) -> CubeResult<crate::types::IndexSeries>;
}

/// Pre-clipped per-epoch classification access by coordinate-range selection
pub trait ClassificationSource: Send + Sync {
    fn epoch_slice(&self, epoch: Epoch, extent: &Extent) -> CubeResult<EpochLayer>;
}

/// External reprojection of a single layer into a target CRS.
///
/// The resolution change implied by reprojection is governed by the
/// backend's own interpolation policy, distinct from the pipeline's
/// deliberate compromise-grid resampling.
pub trait Reprojector: Send + Sync {
    fn reproject(&self, layer: &EpochLayer, target: &Crs) -> CubeResult<EpochLayer>;
}

/// Persistence of the final cube into a chunked, self-describing array
/// store, keyed by the site's store name. Always overwrites.
pub trait CubeSink: Send + Sync {
    fn write(&self, site: &SiteDescriptor, cube: &SiteCube) -> CubeResult<()>;
}
