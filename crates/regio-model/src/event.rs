use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{HarmonizeError, RegionCode};

/// One recorded boundary change: `from_code` ceased and its area (or part of
/// it) continued under `to_code` from `effective_date`.
///
/// Field order defines the deterministic replay order: date, then source
/// code, then target code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChangeEvent {
    effective_date: NaiveDate,
    from_code: RegionCode,
    to_code: RegionCode,
}

impl ChangeEvent {
    pub fn new(
        from_code: RegionCode,
        to_code: RegionCode,
        effective_date: NaiveDate,
    ) -> Result<Self, HarmonizeError> {
        if from_code == to_code {
            return Err(HarmonizeError::MalformedEvent {
                row: 0,
                reason: format!("self-loop on {from_code}"),
            });
        }
        Ok(Self {
            effective_date,
            from_code,
            to_code,
        })
    }

    pub fn from_code(&self) -> &RegionCode {
        &self.from_code
    }

    pub fn to_code(&self) -> &RegionCode {
        &self.to_code
    }

    pub fn effective_date(&self) -> NaiveDate {
        self.effective_date
    }

    /// Whether this event connects `from` to `to`, regardless of date.
    pub fn is_edge(&self, from: &RegionCode, to: &RegionCode) -> bool {
        &self.from_code == from && &self.to_code == to
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({})",
            self.from_code, self.to_code, self.effective_date
        )
    }
}

/// An unparsed change-event row as read from the registry export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEventRow {
    /// 1-based source line, for error messages.
    pub row: usize,
    pub old_code: String,
    pub new_code: String,
    pub change_date: String,
}

/// Parse an ISO date, ignoring a trailing time component.
pub fn parse_date(raw: &str) -> Result<NaiveDate, HarmonizeError> {
    let trimmed = raw.trim();
    let date_part = match trimmed.char_indices().nth(10) {
        Some((idx, 'T' | 't' | ' ')) => &trimmed[..idx],
        _ => trimmed,
    };
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|_| HarmonizeError::InvalidDate(raw.to_string()))
}
