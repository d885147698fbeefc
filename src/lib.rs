pub mod channel;
pub mod color;
pub mod compose;
pub mod config;
pub mod dots;
pub mod error;
pub mod grid;
pub mod math;
pub mod occupancy;
pub mod raster;
pub mod resample;
pub mod separation;
