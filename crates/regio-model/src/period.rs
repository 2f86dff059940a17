use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::HarmonizeError;

/// Observation time unit.
///
/// Statistics tables report periods as `2022`, `2022K1` (quarter) or
/// `2022M01` (month); `2022Q1` and `2022-01` are accepted as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Period {
    Year(i32),
    Quarter { year: i32, quarter: u8 },
    Month { year: i32, month: u8 },
}

impl Period {
    pub fn year(&self) -> i32 {
        match *self {
            Self::Year(year) | Self::Quarter { year, .. } | Self::Month { year, .. } => year,
        }
    }

    /// First day of the period.
    ///
    /// Change events dated on or before this day are already reflected in the
    /// codes reported for the period.
    pub fn reference_date(&self) -> NaiveDate {
        let month = match *self {
            Self::Year(_) => 1,
            Self::Quarter { quarter, .. } => u32::from(quarter) * 3 - 2,
            Self::Month { month, .. } => u32::from(month),
        };
        NaiveDate::from_ymd_opt(self.year(), month, 1).unwrap_or(NaiveDate::MIN)
    }
}

impl FromStr for Period {
    type Err = HarmonizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || HarmonizeError::InvalidPeriod(s.to_string());
        let trimmed = s.trim();
        if trimmed.len() < 4 || !trimmed.is_char_boundary(4) {
            return Err(invalid());
        }
        let (year_part, rest) = trimmed.split_at(4);
        if !year_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let year: i32 = year_part.parse().map_err(|_| invalid())?;
        if rest.is_empty() {
            return Ok(Self::Year(year));
        }
        let mut chars = rest.chars();
        let marker = chars.next().ok_or_else(invalid)?;
        let number = chars.as_str();
        if !number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let value: u8 = number.parse().map_err(|_| invalid())?;
        match marker {
            'K' | 'Q' | 'k' | 'q' if (1..=4).contains(&value) && number.len() == 1 => {
                Ok(Self::Quarter {
                    year,
                    quarter: value,
                })
            }
            'M' | 'm' | '-' if (1..=12).contains(&value) && number.len() == 2 => {
                Ok(Self::Month { year, month: value })
            }
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Year(year) => write!(f, "{year}"),
            Self::Quarter { year, quarter } => write!(f, "{year}Q{quarter}"),
            Self::Month { year, month } => write!(f, "{year}M{month:02}"),
        }
    }
}

impl Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_statistics_period_formats() {
        assert_eq!("2022".parse::<Period>().unwrap(), Period::Year(2022));
        assert_eq!(
            "1990K2".parse::<Period>().unwrap(),
            Period::Quarter {
                year: 1990,
                quarter: 2
            }
        );
        assert_eq!(
            "2023Q4".parse::<Period>().unwrap(),
            Period::Quarter {
                year: 2023,
                quarter: 4
            }
        );
        assert_eq!(
            "2021M07".parse::<Period>().unwrap(),
            Period::Month {
                year: 2021,
                month: 7
            }
        );
        assert_eq!(
            "2021-11".parse::<Period>().unwrap(),
            Period::Month {
                year: 2021,
                month: 11
            }
        );
    }

    #[test]
    fn rejects_malformed_periods() {
        for raw in ["", "22", "2022K5", "2022M13", "2022M1", "year", "2022X1", "20é2"] {
            assert!(raw.parse::<Period>().is_err(), "{raw} should not parse");
        }
    }

    #[test]
    fn reference_date_is_first_day() {
        let quarter: Period = "2020K3".parse().unwrap();
        assert_eq!(
            quarter.reference_date(),
            NaiveDate::from_ymd_opt(2020, 7, 1).unwrap()
        );
        assert_eq!(
            Period::Year(2024).reference_date(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
    }

    #[test]
    fn display_round_trips_through_parse() {
        for raw in ["2022", "2022Q1", "2022M03"] {
            let period: Period = raw.parse().unwrap();
            assert_eq!(period.to_string(), raw);
        }
    }
}
