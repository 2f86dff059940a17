//! Aggregation of raw observations onto an anchor geography, and validation
//! of the result against independent totals.

#![deny(unsafe_code)]

pub mod aggregate;
pub mod coverage;

pub use aggregate::{Aggregation, DroppedRows, aggregate};
pub use coverage::{
    AnchorCoverage, CoverageReport, TotalComparison, check, check_anchor_codes,
};
