use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, Array3, Array4};
use serde::{Deserialize, Serialize};

/// Cell value type for all raster layers
pub type CellValue = f32;

/// Sentinel for cells outside coverage or outside the site polygon
pub const MISSING: CellValue = f32::NAN;

/// Coordinate reference system identifier (`EPSG:<code>` style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crs(String);

impl Crs {
    pub fn new<S: Into<String>>(code: S) -> Self {
        Crs(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// UTM CRS for a geographic coordinate: zone from the 6-degree
    /// longitude band, 326xx north of the equator, 327xx south.
    pub fn utm_for(lon: f64, lat: f64) -> Self {
        let zone = (((lon + 180.0) / 6.0).floor() as i32 + 1).clamp(1, 60);
        if lat >= 0.0 {
            Crs(format!("EPSG:326{:02}", zone))
        } else {
            Crs(format!("EPSG:327{:02}", zone))
        }
    }
}

impl PartialEq for Crs {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for Crs {}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Projected bounding extent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Geospatial transformation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Map coordinate of the center of pixel (row, col)
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        let x = self.top_left_x + (col as f64 + 0.5) * self.pixel_width;
        let y = self.top_left_y + (row as f64 + 0.5) * self.pixel_height;
        (x, y)
    }
}

/// Site polygon as a single exterior ring of projected vertices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Polygon {
    exterior: Vec<(f64, f64)>,
}

impl Polygon {
    pub fn new(exterior: Vec<(f64, f64)>) -> Self {
        Polygon { exterior }
    }

    pub fn vertices(&self) -> &[(f64, f64)] {
        &self.exterior
    }

    /// Bounding extent, or `None` for an empty ring
    pub fn bounds(&self) -> Option<Extent> {
        if self.exterior.is_empty() {
            return None;
        }
        let mut ext = Extent {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for &(x, y) in &self.exterior {
            ext.min_x = ext.min_x.min(x);
            ext.min_y = ext.min_y.min(y);
            ext.max_x = ext.max_x.max(x);
            ext.max_y = ext.max_y.max(y);
        }
        Some(ext)
    }

    /// Area-weighted centroid; falls back to the vertex mean for
    /// degenerate (near zero area) rings
    pub fn centroid(&self) -> Option<(f64, f64)> {
        let n = self.exterior.len();
        if n == 0 {
            return None;
        }
        let mut area2 = 0.0;
        let mut cx = 0.0;
        let mut cy = 0.0;
        for i in 0..n {
            let (xi, yi) = self.exterior[i];
            let (xj, yj) = self.exterior[(i + 1) % n];
            let cross = xi * yj - xj * yi;
            area2 += cross;
            cx += (xi + xj) * cross;
            cy += (yi + yj) * cross;
        }
        if area2.abs() < 1e-12 {
            let sx: f64 = self.exterior.iter().map(|p| p.0).sum();
            let sy: f64 = self.exterior.iter().map(|p| p.1).sum();
            return Some((sx / n as f64, sy / n as f64));
        }
        Some((cx / (3.0 * area2), cy / (3.0 * area2)))
    }

    /// Even-odd point-in-polygon test
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let n = self.exterior.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (xi, yi) = self.exterior[i];
            let (xj, yj) = self.exterior[j];
            if (yi > y) != (yj > y) {
                let x_cross = xj + (y - yj) / (yi - yj) * (xi - xj);
                if x < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }
}

/// One yearly snapshot of the classification raster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Epoch {
    Y2018,
    Y2019,
    Y2020,
    Y2021,
}

impl Epoch {
    pub const ALL: [Epoch; 4] = [Epoch::Y2018, Epoch::Y2019, Epoch::Y2020, Epoch::Y2021];

    pub fn year(self) -> i32 {
        match self {
            Epoch::Y2018 => 2018,
            Epoch::Y2019 => 2019,
            Epoch::Y2020 => 2020,
            Epoch::Y2021 => 2021,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Epoch::Y2018 => 0,
            Epoch::Y2019 => 1,
            Epoch::Y2020 => 2,
            Epoch::Y2021 => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Epoch::Y2018 => "2018",
            Epoch::Y2019 => "2019",
            Epoch::Y2020 => "2020",
            Epoch::Y2021 => "2021",
        }
    }
}

impl std::fmt::Display for Epoch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Multi-band satellite time series: (time, band, y, x).
///
/// The time axis may contain duplicate timestamps until it has been
/// run through the temporal consolidator.
#[derive(Debug, Clone)]
pub struct RasterTimeSeries {
    pub times: Vec<DateTime<Utc>>,
    pub bands: Vec<String>,
    pub values: Array4<CellValue>,
    pub x: Array1<f64>,
    pub y: Array1<f64>,
    /// May be absent on a freshly fetched series; the imagery source is
    /// responsible for attaching it from a returned attribute.
    pub crs: Option<Crs>,
}

impl RasterTimeSeries {
    pub fn new(
        times: Vec<DateTime<Utc>>,
        bands: Vec<String>,
        values: Array4<CellValue>,
        x: Array1<f64>,
        y: Array1<f64>,
        crs: Option<Crs>,
    ) -> CubeResult<Self> {
        let (nt, nb, ny, nx) = values.dim();
        if nt != times.len() || nb != bands.len() || ny != y.len() || nx != x.len() {
            return Err(CubeError::Processing(format!(
                "series shape {:?} does not match axes (t={}, band={}, y={}, x={})",
                values.dim(),
                times.len(),
                bands.len(),
                y.len(),
                x.len()
            )));
        }
        Ok(RasterTimeSeries {
            times,
            bands,
            values,
            x,
            y,
            crs,
        })
    }

    pub fn with_crs(mut self, crs: Crs) -> Self {
        self.crs = Some(crs);
        self
    }

    pub fn band_index(&self, name: &str) -> Option<usize> {
        self.bands.iter().position(|b| b == name)
    }

    pub fn megabytes(&self) -> f64 {
        (self.values.len() * std::mem::size_of::<CellValue>()) as f64 / 1e6
    }
}

/// Derived vegetation index series: (time, y, x)
#[derive(Debug, Clone)]
pub struct IndexSeries {
    pub name: String,
    pub times: Vec<DateTime<Utc>>,
    pub values: Array3<CellValue>,
    pub x: Array1<f64>,
    pub y: Array1<f64>,
    pub crs: Crs,
}

/// Single classification epoch: (y, x)
#[derive(Debug, Clone)]
pub struct EpochLayer {
    pub values: Array2<CellValue>,
    pub x: Array1<f64>,
    pub y: Array1<f64>,
    pub crs: Crs,
}

impl EpochLayer {
    pub fn new(
        values: Array2<CellValue>,
        x: Array1<f64>,
        y: Array1<f64>,
        crs: Crs,
    ) -> CubeResult<Self> {
        let (ny, nx) = values.dim();
        if ny != y.len() || nx != x.len() {
            return Err(CubeError::Processing(format!(
                "layer shape {:?} does not match axes (y={}, x={})",
                values.dim(),
                y.len(),
                x.len()
            )));
        }
        Ok(EpochLayer { values, x, y, crs })
    }
}

/// One classification layer per epoch, each slot filled independently
#[derive(Debug, Clone)]
pub struct EpochStack {
    layers: [EpochLayer; 4],
}

impl EpochStack {
    /// Build the stack by invoking `f` once per epoch
    pub fn try_build<F>(mut f: F) -> CubeResult<Self>
    where
        F: FnMut(Epoch) -> CubeResult<EpochLayer>,
    {
        Ok(EpochStack {
            layers: [
                f(Epoch::Y2018)?,
                f(Epoch::Y2019)?,
                f(Epoch::Y2020)?,
                f(Epoch::Y2021)?,
            ],
        })
    }

    pub fn get(&self, epoch: Epoch) -> &EpochLayer {
        &self.layers[epoch.index()]
    }

    pub fn get_mut(&mut self, epoch: Epoch) -> &mut EpochLayer {
        &mut self.layers[epoch.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Epoch, &EpochLayer)> {
        Epoch::ALL.iter().map(move |&e| (e, self.get(e)))
    }

    /// Transform every layer, keeping the per-epoch association
    pub fn try_map<F>(&self, mut f: F) -> CubeResult<EpochStack>
    where
        F: FnMut(Epoch, &EpochLayer) -> CubeResult<EpochLayer>,
    {
        EpochStack::try_build(|e| f(e, self.get(e)))
    }

    /// All epochs must share identical spatial axes and CRS
    pub fn assert_uniform_axes(&self) -> CubeResult<()> {
        let first = self.get(Epoch::ALL[0]);
        for (epoch, layer) in self.iter().skip(1) {
            if layer.x != first.x || layer.y != first.y {
                return Err(CubeError::Registration(format!(
                    "classification epoch {} is not on the same grid as epoch {}",
                    epoch,
                    Epoch::ALL[0]
                )));
            }
            if layer.crs != first.crs {
                return Err(CubeError::CrsMismatch {
                    expected: first.crs.clone(),
                    actual: layer.crs.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Error types for cube processing
#[derive(Debug, thiserror::Error)]
pub enum CubeError {
    #[error("imagery fetch failed: {0}")]
    Fetch(String),

    #[error("time axis is empty")]
    EmptyTimeSeries,

    #[error("degenerate grid: {0}")]
    DegenerateGrid(String),

    #[error("registration failure: {0}")]
    Registration(String),

    #[error("CRS mismatch: expected {expected}, got {actual}")]
    CrsMismatch { expected: Crs, actual: Crs },

    #[error("processing error: {0}")]
    Processing(String),

    #[error("persistence error: {0}")]
    Persistence(String),
}

/// Result type for cube operations
pub type CubeResult<T> = Result<T, CubeError>;
