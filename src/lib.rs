//! Command line tracker for daily resolutions.
//! Resolutions are logged day by day into a single json store, exported to csv for any date range,
//! and drawn as calendar heatmaps.
//!

pub mod cli;
pub mod export;
pub mod graph;
pub mod store;
pub mod tracker;
pub mod utils;
