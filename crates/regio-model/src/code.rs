#![deny(unsafe_code)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::HarmonizeError;

/// Opaque administrative region identifier.
///
/// Ordering is only used to break ties deterministically; it carries no
/// geographic meaning.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RegionCode(String);

impl RegionCode {
    pub fn new(value: impl Into<String>) -> Result<Self, HarmonizeError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(HarmonizeError::InvalidCode(value));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RegionCode {
    type Err = HarmonizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl From<u32> for RegionCode {
    fn from(value: u32) -> Self {
        Self(value.to_string())
    }
}

// Configuration files write codes either as `"0114"` or as `114`.
impl<'de> Deserialize<'de> for RegionCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }
        let text = match Raw::deserialize(deserializer)? {
            Raw::Text(text) => text,
            Raw::Number(number) => number.to_string(),
        };
        Self::new(text).map_err(serde::de::Error::custom)
    }
}

/// How raw code strings are normalized before they are compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodeFormat {
    /// Strip leading zeros from all-digit codes so `0114` and `114` match.
    pub numeric: bool,
    /// Expected code length in observation files. Rows with other lengths
    /// are aggregates (country, county) and are skipped at ingest.
    pub width: Option<usize>,
}

impl Default for CodeFormat {
    fn default() -> Self {
        Self {
            numeric: true,
            width: None,
        }
    }
}

impl CodeFormat {
    pub fn normalize(&self, raw: &str) -> Result<RegionCode, HarmonizeError> {
        let trimmed = raw.trim();
        if self.numeric && !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            let stripped = trimmed.trim_start_matches('0');
            let canonical = if stripped.is_empty() { "0" } else { stripped };
            return RegionCode::new(canonical);
        }
        RegionCode::new(trimmed)
    }

    pub fn normalize_code(&self, code: &RegionCode) -> RegionCode {
        self.normalize(code.as_str()).unwrap_or_else(|_| code.clone())
    }

    /// Whether a raw observation code has the configured width.
    pub fn accepts_width(&self, raw: &str) -> bool {
        match self.width {
            Some(width) => raw.trim().chars().count() == width,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_format_strips_leading_zeros() {
        let format = CodeFormat::default();
        assert_eq!(format.normalize("0114").unwrap(), RegionCode::from(114u32));
        assert_eq!(format.normalize(" 5012 ").unwrap().as_str(), "5012");
        assert_eq!(format.normalize("0000").unwrap().as_str(), "0");
        assert_eq!(format.normalize("K-0301").unwrap().as_str(), "K-0301");
    }

    #[test]
    fn text_format_keeps_zeros() {
        let format = CodeFormat {
            numeric: false,
            width: Some(4),
        };
        assert_eq!(format.normalize("0114").unwrap().as_str(), "0114");
        assert!(format.accepts_width("0301"));
        assert!(!format.accepts_width("03"));
        assert!(!format.accepts_width("EAK"));
    }

    #[test]
    fn empty_code_is_rejected() {
        assert!(matches!(
            RegionCode::new("   "),
            Err(HarmonizeError::InvalidCode(_))
        ));
        assert!(CodeFormat::default().normalize("").is_err());
    }
}
