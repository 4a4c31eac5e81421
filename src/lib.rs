//! Performance metrics for multi-source employee reviews.
//!
//! The scoring functions ([`scoring`], [`outliers`], [`goals`]) read through a
//! [`store::PerformanceStore`] and return plain values; [`classifier`] works on
//! pre-aggregated quarterly series. [`db`] loads a [`store::Snapshot`] from
//! Postgres for the CLI.

pub mod aggregate;
pub mod classifier;
pub mod config;
pub mod db;
pub mod error;
pub mod goals;
pub mod models;
pub mod outliers;
pub mod report;
pub mod scoring;
pub mod store;
