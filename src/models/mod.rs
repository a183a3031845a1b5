// src/models/mod.rs

//! Domain models for the crawler application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod shop;
mod stats;

// Re-export all public types
pub use config::{Config, CrawlerConfig, PathsConfig, PortalConfig};
pub use shop::{
    COLUMNS, Dataset, KEY_COLUMN, STATE_CODES, ShopBatch, ShopRecord, StateCode, TehsilDescriptor,
    TehsilListing,
};
pub use stats::{ChangeCounts, RunStats, StateReport, StateStatus};
