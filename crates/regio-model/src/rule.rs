use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{CodeFormat, RegionCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideKind {
    /// Remove the `(from, to)` edge from the change list.
    Suppress,
    /// Add a synthetic `(from, to)` edge on `effective_date`.
    Inject,
}

/// A documented exception to literal replay of the change registry.
///
/// Each rule names the analyst's choice of successor or predecessor for an
/// ambiguous merge or split, together with the evidence for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverrideRule {
    pub name: String,
    pub kind: OverrideKind,
    pub from: RegionCode,
    pub to: RegionCode,
    /// Required for injections. For suppressions it restricts the match to
    /// one date; without it every `(from, to)` edge is removed.
    #[serde(default)]
    pub effective_date: Option<NaiveDate>,
    pub justification: String,
}

impl OverrideRule {
    pub fn suppress(
        name: impl Into<String>,
        from: RegionCode,
        to: RegionCode,
        justification: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: OverrideKind::Suppress,
            from,
            to,
            effective_date: None,
            justification: justification.into(),
        }
    }

    pub fn inject(
        name: impl Into<String>,
        from: RegionCode,
        to: RegionCode,
        effective_date: NaiveDate,
        justification: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: OverrideKind::Inject,
            from,
            to,
            effective_date: Some(effective_date),
            justification: justification.into(),
        }
    }

    /// Restrict a suppression to edges on one date.
    #[must_use]
    pub fn on(mut self, effective_date: NaiveDate) -> Self {
        self.effective_date = Some(effective_date);
        self
    }

    /// Apply the run's code normalization to both endpoints.
    #[must_use]
    pub fn normalized(mut self, format: &CodeFormat) -> Self {
        self.from = format.normalize_code(&self.from);
        self.to = format.normalize_code(&self.to);
        self
    }
}
