#![forbid(unsafe_code)]

//! Channel analytics for public YouTube data.
//!
//! Data flows from the provider client (`youtube`) through the record
//! normalizer into the pure `analytics` and `trends` engines. The
//! `cache_gate` decides whether a same-day snapshot from `snapshots` can be
//! served instead of recomputing.

pub mod analytics;
pub mod cache_gate;
pub mod config;
pub mod error;
pub mod models;
pub mod normalize;
pub mod service;
pub mod snapshots;
pub mod trends;
pub mod youtube;

pub use error::{InsightsError, InsightsResult};
