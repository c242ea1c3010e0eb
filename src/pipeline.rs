//! Per-site orchestration and the batch loop.
//!
//! Each site runs the same sequential chain: fetch, correct, consolidate,
//! derive the index, slice and reproject the classification epochs,
//! reconcile a common grid, resample, mask, assemble, persist. Any failure
//! skips that site with a logged reason; one bad site never aborts the
//! batch.

use crate::core::assemble::SiteCube;
use crate::core::consolidate::consolidate;
use crate::core::grid::CommonGrid;
use crate::core::mask::SiteMask;
use crate::core::resample::{resample_layer, resample_series};
use crate::core::site::SiteDescriptor;
use crate::io::{
    ClassificationSource, CubeSink, ImageryQuery, ImagerySource, IndexCalculator,
    RadiometricCorrector, Reprojector,
};
use crate::types::{CubeError, CubeResult, Epoch, EpochLayer, EpochStack};
use chrono::NaiveDate;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Fixed pipeline parameters shared by every site of a batch
#[derive(Debug, Clone)]
pub struct PipelineParams {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub red_band: String,
    pub nir_band: String,
    /// Imagery ground resolution in meters per pixel
    pub resolution: f64,
    pub max_cloud_pct: f64,
}

impl Default for PipelineParams {
    fn default() -> Self {
        PipelineParams {
            start: NaiveDate::from_ymd_opt(2018, 1, 1).expect("valid calendar date"),
            end: NaiveDate::from_ymd_opt(2021, 12, 31).expect("valid calendar date"),
            red_band: "B04".into(),
            nir_band: "B08".into(),
            resolution: 10.0,
            max_cloud_pct: 10.0,
        }
    }
}

/// Diagnostics for one successfully processed site
#[derive(Debug, Clone)]
pub struct SiteReport {
    pub id: u32,
    pub time_steps: usize,
    pub grid_shape: (usize, usize),
    pub interior_cells: usize,
    pub megabytes: f64,
}

/// Explicit per-site result: either a processed report or a skip reason.
/// There is no catch-all; only `CubeError` values reach the skip branch.
#[derive(Debug)]
pub enum SiteOutcome {
    Processed(SiteReport),
    Skipped { id: u32, reason: CubeError },
}

/// Tally over one batch run
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub processed: usize,
    pub skipped: Vec<(u32, String)>,
}

/// Drives the per-site chain against the external collaborators
pub struct SitePipeline<'a> {
    imagery: &'a dyn ImagerySource,
    corrector: &'a dyn RadiometricCorrector,
    index: &'a dyn IndexCalculator,
    classification: &'a dyn ClassificationSource,
    reprojector: &'a dyn Reprojector,
    sink: &'a dyn CubeSink,
    params: PipelineParams,
}

impl<'a> SitePipeline<'a> {
    pub fn new(
        imagery: &'a dyn ImagerySource,
        corrector: &'a dyn RadiometricCorrector,
        index: &'a dyn IndexCalculator,
        classification: &'a dyn ClassificationSource,
        reprojector: &'a dyn Reprojector,
        sink: &'a dyn CubeSink,
        params: PipelineParams,
    ) -> Self {
        SitePipeline {
            imagery,
            corrector,
            index,
            classification,
            reprojector,
            sink,
            params,
        }
    }

    /// Process one site, converting any failure into an explicit skip
    pub fn process_site(&self, site: &SiteDescriptor) -> SiteOutcome {
        match self.try_site(site) {
            Ok(report) => {
                log::info!("site {} saved ({:.1} MB)", site.id, report.megabytes);
                SiteOutcome::Processed(report)
            }
            Err(reason) => {
                log::warn!("site {} skipped: {}", site.id, reason);
                SiteOutcome::Skipped { id: site.id, reason }
            }
        }
    }

    fn try_site(&self, site: &SiteDescriptor) -> CubeResult<SiteReport> {
        log::info!("processing site {}", site.id);

        // Single best-effort fetch; empty results are a skip, not a retry.
        let query = ImageryQuery {
            center_lat: site.center_lat,
            center_lon: site.center_lon,
            bands: vec![self.params.red_band.clone(), self.params.nir_band.clone()],
            start: self.params.start,
            end: self.params.end,
            edge_pixels: site.edge_pixels(self.params.resolution),
            resolution: self.params.resolution,
            max_cloud_pct: self.params.max_cloud_pct,
        };
        let series = self.imagery.fetch(&query)?;
        if series.times.is_empty() {
            return Err(CubeError::Fetch("imagery query returned no scenes".into()));
        }
        match &series.crs {
            Some(crs) if *crs == site.crs => {}
            Some(crs) => {
                return Err(CubeError::CrsMismatch {
                    expected: site.crs.clone(),
                    actual: crs.clone(),
                })
            }
            None => {
                return Err(CubeError::Fetch(
                    "fetched series carries no CRS attribute".into(),
                ))
            }
        }
        log::info!(
            "  data found: {:.1} MB, {} time steps",
            series.megabytes(),
            series.times.len()
        );

        let series = self.corrector.correct(series)?;
        let series = consolidate(&series)?;
        let index = self
            .index
            .compute(&series, &self.params.red_band, &self.params.nir_band)?;

        // Each epoch is sliced from the classification source and handed to
        // the external reprojector; the compromise grid comes afterwards.
        let epochs = EpochStack::try_build(|epoch| {
            let layer = self.classification.epoch_slice(epoch, &site.extent)?;
            self.reprojector.reproject(&layer, &site.crs)
        })?;
        epochs.assert_uniform_axes()?;

        // The grid is the same for every epoch, so the first one stands in
        // for the whole classification source.
        let reference = epochs.get(Epoch::ALL[0]);
        let grid = CommonGrid::reconcile(&index.x, &index.y, &reference.x, &reference.y)?;
        let (rows, cols) = grid.shape();
        log::info!("  common grid: {} x {} cells", rows, cols);

        // Reconcile, then resample, then mask; every layer is produced from
        // the same grid, so the single mask is valid for all of them.
        let mut index = resample_series(&index, &grid);
        let mut epochs = epochs.try_map(|_, layer| Ok(resample_layer(layer, &grid)))?;
        let mask = SiteMask::from_polygon(&site.polygon, &grid);
        mask.apply_series(&mut index.values)?;
        for epoch in Epoch::ALL {
            let EpochLayer { values, .. } = epochs.get_mut(epoch);
            mask.apply(values)?;
        }

        let cube = SiteCube::assemble(index, epochs)?;
        self.sink.write(site, &cube)?;

        Ok(SiteReport {
            id: site.id,
            time_steps: cube.times.len(),
            grid_shape: cube.shape(),
            interior_cells: mask.interior_count(),
            megabytes: cube.megabytes(),
        })
    }

    /// Process a batch strictly sequentially, tolerating per-site failure
    pub fn run(&self, sites: &[SiteDescriptor]) -> BatchSummary {
        let outcomes: Vec<SiteOutcome> = sites.iter().map(|s| self.process_site(s)).collect();
        summarize(outcomes)
    }

    /// Sites are fully independent, so a batch may also be processed with
    /// task-level parallelism; per-site behavior is identical to `run`.
    #[cfg(feature = "parallel")]
    pub fn run_parallel(&self, sites: &[SiteDescriptor]) -> BatchSummary
    where
        Self: Sync,
    {
        let outcomes: Vec<SiteOutcome> =
            sites.par_iter().map(|s| self.process_site(s)).collect();
        summarize(outcomes)
    }

    /// Without the `parallel` feature a batch is always sequential
    #[cfg(not(feature = "parallel"))]
    pub fn run_parallel(&self, sites: &[SiteDescriptor]) -> BatchSummary {
        self.run(sites)
    }
}

fn summarize(outcomes: Vec<SiteOutcome>) -> BatchSummary {
    let mut summary = BatchSummary::default();
    for outcome in outcomes {
        match outcome {
            SiteOutcome::Processed(_) => summary.processed += 1,
            SiteOutcome::Skipped { id, reason } => {
                summary.skipped.push((id, reason.to_string()))
            }
        }
    }
    log::info!(
        "batch complete: {} site(s) processed, {} skipped",
        summary.processed,
        summary.skipped.len()
    );
    summary
}
