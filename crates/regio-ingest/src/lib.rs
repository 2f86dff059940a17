//! Readers for harmonization inputs: the change-event registry export,
//! per-measure observation tables, reference totals, code lists and the
//! TOML run configuration.

#![deny(unsafe_code)]

pub mod codes;
pub mod config;
pub mod csv_table;
pub mod error;
pub mod events;
pub mod observations;
pub mod reference;

pub use codes::read_code_list;
pub use config::load_config;
pub use csv_table::{CsvRow, CsvTable, read_csv_table};
pub use error::{IngestError, Result};
pub use events::read_change_events;
pub use observations::{ObservationTable, read_observations};
pub use reference::read_reference_totals;
