//! Library side of the `regio` command: logging setup and the harmonization
//! pipeline, kept out of the binary so they can be tested directly.

#![deny(unsafe_code)]

pub mod logging;
pub mod pipeline;
pub mod types;
