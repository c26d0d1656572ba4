pub mod converter;
pub mod dispatch;
pub mod inflight;
pub mod libre;
pub mod raster;
