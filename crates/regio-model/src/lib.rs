//! Core types for administrative code harmonization.
//!
//! Region codes, dated change events, override rules, observations and the
//! run configuration shared by the ingest, replay, aggregation and report
//! crates.

#![deny(unsafe_code)]

pub mod code;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod event;
pub mod observation;
pub mod period;
pub mod rule;

pub use code::{CodeFormat, RegionCode};
pub use config::{
    CoverageSpec, DerivedMeasure, HarmonizeConfig, MeasureSpec, ObservationLayout, ReplayScope,
    Sources,
};
pub use diagnostic::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use error::{HarmonizeError, Result};
pub use event::{ChangeEvent, RawEventRow, parse_date};
pub use observation::{HarmonizedObservation, RawObservation, ReferenceTotal};
pub use period::Period;
pub use rule::{OverrideKind, OverrideRule};
