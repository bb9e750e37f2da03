//! Sensor readings stored under sortable time keys in a document store,
//! with ten-minute, hourly and daily rollups.

pub mod cli;
pub mod config;
pub mod keys;
pub mod store;
pub mod timeseries;
