use crate::types::{Crs, CubeError, CubeResult, Extent, Polygon};
use serde::{Deserialize, Serialize};

/// Immutable per-site descriptor, computed once before any raster work.
///
/// The polygon, extent, centroid and edge length are all expressed in the
/// site's metric target CRS; only the center kept for imagery queries is
/// geographic. No field changes after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteDescriptor {
    pub id: u32,
    /// Site polygon in the target CRS
    pub polygon: Polygon,
    /// Projected target CRS (typically the site's UTM zone)
    pub crs: Crs,
    /// Geographic center (lon, lat) for the imagery query
    pub center_lon: f64,
    pub center_lat: f64,
    /// Projected centroid
    pub center: (f64, f64),
    /// Projected bounding extent
    pub extent: Extent,
    /// Characteristic edge length: max of extent width/height, in metric units
    pub edge_length: f64,
}

impl SiteDescriptor {
    /// Build a descriptor from a projected polygon and its target CRS.
    ///
    /// The geographic center is consumed as an already-computed attribute
    /// (CRS determination for a site is not this crate's job).
    pub fn new(
        id: u32,
        polygon: Polygon,
        crs: Crs,
        center_lon: f64,
        center_lat: f64,
    ) -> CubeResult<Self> {
        let extent = polygon.bounds().ok_or_else(|| {
            CubeError::Processing(format!("site {} has an empty polygon", id))
        })?;
        let center = polygon.centroid().ok_or_else(|| {
            CubeError::Processing(format!("site {} polygon has no centroid", id))
        })?;
        let edge_length = extent.width().max(extent.height());
        log::debug!(
            "site {}: crs={}, edge={:.1}m, extent {:.1}x{:.1}",
            id,
            crs,
            edge_length,
            extent.width(),
            extent.height()
        );
        Ok(SiteDescriptor {
            id,
            polygon,
            crs,
            center_lon,
            center_lat,
            center,
            extent,
            edge_length,
        })
    }

    /// Requested imagery edge in pixels at the given resolution, with a
    /// few extra pixels of margin around the polygon.
    pub fn edge_pixels(&self, resolution: f64) -> f64 {
        self.edge_length / resolution + 5.0
    }

    /// Per-site name under which the final cube is persisted
    pub fn store_name(&self) -> String {
        format!("Site{:03}", self.id)
    }
}
