//! Feed Dash - telemetry feed normalizer and chart-ready dashboard API
//!
//! Polls a sensor backend's history endpoint, normalizes the readings into per-device series
//! with sensor faults turned into gaps, derives axis ranges, and serves the result over HTTP.
//! This library exposes the core modules for testing and reuse.

pub mod cards;
pub mod chart;
pub mod common;
pub mod config;
pub mod error;
pub mod feed;
pub mod normalize;
pub mod routes;
pub mod sync;
