//! minicube: per-site raster minicube builder
//!
//! Builds, per geographic site, a spatially- and temporally-aligned raster
//! cube combining a vegetation index derived from multi-band satellite
//! imagery with a four-epoch land-cover classification raster. The two
//! sources arrive with different native grids and CRSs; the pipeline
//! reconciles them onto one compromise grid, masks by the site polygon and
//! assembles a single registered dataset ready for persistence.

pub mod core;
pub mod io;
pub mod pipeline;
pub mod types;

// Re-export main types and functions for easier access
pub use types::{
    CellValue, Crs, CubeError, CubeResult, Epoch, EpochLayer, EpochStack, Extent,
    GeoTransform, IndexSeries, Polygon, RasterTimeSeries, MISSING,
};

pub use crate::core::{
    consolidate, resample_layer, resample_series, CommonGrid, SiteCube, SiteDescriptor,
    SiteMask,
};

pub use io::{
    ClassificationSource, CubeSink, ImageryQuery, ImagerySource, IndexCalculator, Ndvi,
    RadiometricCorrector, Reprojector,
};

pub use pipeline::{BatchSummary, PipelineParams, SiteOutcome, SitePipeline, SiteReport};
