//! Core types for the sleep log tools.
//!
//! Holds the day-table data model, the recognized-metric configuration, the
//! token normalizer, calendar and circular-time helpers, output formatting
//! and CLI settings shared by the data layer and the binary.

pub mod error;
pub mod formatting;
pub mod metrics;
pub mod models;
pub mod normalize;
pub mod settings;
pub mod time_utils;

pub use error::{Result, SleepLogError};
