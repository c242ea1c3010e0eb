use crate::types::{
    CellValue, Crs, CubeError, CubeResult, Epoch, EpochStack, IndexSeries,
};
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, Array3};

/// Final per-site dataset: the masked index series plus one masked
/// classification layer per epoch, all on identical y/x axes and tagged
/// with the site's target CRS.
///
/// Per-layer CRS annotations are collapsed into the single cube-level
/// attribute during assembly; no grid-mapping helper variable is carried.
#[derive(Debug, Clone)]
pub struct SiteCube {
    pub index_name: String,
    pub times: Vec<DateTime<Utc>>,
    pub x: Array1<f64>,
    pub y: Array1<f64>,
    pub index: Array3<CellValue>,
    cover: [Array2<CellValue>; 4],
    pub crs: Crs,
}

impl SiteCube {
    /// Combine the index series and the four epoch layers into one cube.
    ///
    /// Every layer must already be on the common grid and masked; assembly
    /// rejects any layer whose coordinate axes are not element-wise
    /// identical to the index's, since cell-wise combination is only valid
    /// under exact registration.
    pub fn assemble(index: IndexSeries, epochs: EpochStack) -> CubeResult<Self> {
        for (epoch, layer) in epochs.iter() {
            if layer.x != index.x || layer.y != index.y {
                return Err(CubeError::Registration(format!(
                    "epoch {} axes differ from the index axes",
                    epoch
                )));
            }
            if layer.crs != index.crs {
                return Err(CubeError::CrsMismatch {
                    expected: index.crs.clone(),
                    actual: layer.crs.clone(),
                });
            }
        }

        let cover = [
            epochs.get(Epoch::Y2018).values.clone(),
            epochs.get(Epoch::Y2019).values.clone(),
            epochs.get(Epoch::Y2020).values.clone(),
            epochs.get(Epoch::Y2021).values.clone(),
        ];

        Ok(SiteCube {
            index_name: index.name,
            times: index.times,
            x: index.x,
            y: index.y,
            index: index.values,
            cover,
            crs: index.crs,
        })
    }

    /// Classification layer for one epoch
    pub fn cover(&self, epoch: Epoch) -> &Array2<CellValue> {
        &self.cover[epoch.index()]
    }

    /// Grid shape as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.y.len(), self.x.len())
    }

    /// Variable names as persisted: one labelled layer per epoch plus the
    /// index under its own name
    pub fn variable_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Epoch::ALL
            .iter()
            .map(|e| format!("cover_{}", e.label()))
            .collect();
        names.push(self.index_name.to_lowercase());
        names
    }

    pub fn megabytes(&self) -> f64 {
        let cells = self.index.len() + self.cover.iter().map(|c| c.len()).sum::<usize>();
        (cells * std::mem::size_of::<CellValue>()) as f64 / 1e6
    }
}
