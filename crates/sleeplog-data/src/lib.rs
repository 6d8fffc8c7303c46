//! Data layer for the sleep log tools.
//!
//! Turns weekly sleep logs (indented text or spreadsheet CSV exports) into
//! the ordered day table, summarizes it per week and overall, and writes the
//! results out as TSV or JSON.

pub mod aggregator;
pub mod assemble;
pub mod classify;
pub mod diagnostics;
pub mod export;
pub mod extract;
pub mod parser;
pub mod reader;
pub mod segment;
pub mod sheets;

pub use diagnostics::{AnomalySink, NullSink};
pub use parser::{LogParser, ParseOptions};
pub use sleeplog_core as core;
