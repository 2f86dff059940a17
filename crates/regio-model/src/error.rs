#![deny(unsafe_code)]

use crate::code::RegionCode;

/// Fatal harmonization errors.
///
/// Any of these aborts the run: output produced past one of them would be
/// silently wrong. Data-quality findings that allow the run to continue are
/// reported as [`crate::Diagnostic`] values instead.
#[derive(Debug, thiserror::Error)]
pub enum HarmonizeError {
    #[error("malformed change event at row {row}: {reason}")]
    MalformedEvent { row: usize, reason: String },

    #[error("cyclic change chain: {}", render_path(.path))]
    CyclicChange { path: Vec<RegionCode> },

    #[error("override `{rule}` injects {from} -> {to}, which already exists in the change list")]
    InjectionCollision {
        rule: String,
        from: RegionCode,
        to: RegionCode,
    },

    #[error("override `{rule}` suppresses {from} -> {to}, which is not in the change list")]
    OverrideNotFound {
        rule: String,
        from: RegionCode,
        to: RegionCode,
    },

    #[error("replay order violation: {0}")]
    ReplayOrder(String),

    #[error("invalid region code: {0:?}")]
    InvalidCode(String),

    #[error("invalid period: {0:?}")]
    InvalidPeriod(String),

    #[error("invalid date: {0:?}")]
    InvalidDate(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

fn render_path(path: &[RegionCode]) -> String {
    path.iter()
        .map(RegionCode::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

pub type Result<T> = std::result::Result<T, HarmonizeError>;
