//! Core cube-building modules

pub mod assemble;
pub mod consolidate;
pub mod grid;
pub mod mask;
pub mod resample;
pub mod site;

// Re-export main types
pub use assemble::SiteCube;
pub use consolidate::consolidate;
pub use grid::CommonGrid;
pub use mask::SiteMask;
pub use resample::{resample_layer, resample_series};
pub use site::SiteDescriptor;
