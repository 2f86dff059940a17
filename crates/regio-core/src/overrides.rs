//! Analyst overrides of the literal change registry.
//!
//! The registry records every boundary change, including splits where only a
//! sliver of land moved. Replaying those literally would send whole
//! populations to the wrong successor, so each exception is a named,
//! justified [`OverrideRule`]: suppressions remove registry edges, injections
//! add edges the registry does not carry.

use regio_model::{
    ChangeEvent, Diagnostic, DiagnosticKind, Diagnostics, HarmonizeError, OverrideKind,
    OverrideRule, RegionCode, Result,
};
use tracing::{info, warn};

/// An ordered set of override rules.
#[derive(Debug, Clone, Default)]
pub struct OverrideRuleSet {
    rules: Vec<OverrideRule>,
    strict: bool,
}

/// What one rule did to the event list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleApplication {
    pub name: String,
    pub kind: OverrideKind,
    pub from: RegionCode,
    pub to: RegionCode,
    pub removed: usize,
    pub added: usize,
    pub justification: String,
}

/// A registry or injected event with the rule that touched it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedEvent {
    pub event: ChangeEvent,
    pub suppressed_by: Option<String>,
    pub injected_by: Option<String>,
}

/// The event list after overrides, with the bookkeeping needed to explain it.
#[derive(Debug, Clone, Default)]
pub struct OverrideOutcome {
    events: Vec<ChangeEvent>,
    suppressed: Vec<(ChangeEvent, String)>,
    injected: Vec<(ChangeEvent, String)>,
    applications: Vec<RuleApplication>,
    diagnostics: Diagnostics,
}

impl OverrideOutcome {
    /// Events in replay order, suppressions removed and injections added.
    pub fn events(&self) -> &[ChangeEvent] {
        &self.events
    }

    /// Removed registry events with the name of the suppressing rule.
    pub fn suppressed(&self) -> &[(ChangeEvent, String)] {
        &self.suppressed
    }

    pub fn injected(&self) -> &[(ChangeEvent, String)] {
        &self.injected
    }

    pub fn applications(&self) -> &[RuleApplication] {
        &self.applications
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Every registry event plus every injected event, in replay order, each
    /// tagged with the rule that suppressed or injected it.
    pub fn annotated(&self, registry: &[ChangeEvent]) -> Vec<AnnotatedEvent> {
        let mut annotated: Vec<AnnotatedEvent> = registry
            .iter()
            .map(|event| AnnotatedEvent {
                event: event.clone(),
                suppressed_by: self
                    .suppressed
                    .iter()
                    .find(|(removed, _)| removed == event)
                    .map(|(_, rule)| rule.clone()),
                injected_by: None,
            })
            .collect();
        annotated.extend(self.injected.iter().map(|(event, rule)| AnnotatedEvent {
            event: event.clone(),
            suppressed_by: None,
            injected_by: Some(rule.clone()),
        }));
        annotated.sort_by(|a, b| a.event.cmp(&b.event));
        annotated
    }
}

impl OverrideRuleSet {
    pub fn new(rules: Vec<OverrideRule>) -> Self {
        Self {
            rules,
            strict: false,
        }
    }

    /// Fail instead of warning when a suppression matches nothing.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn rules(&self) -> &[OverrideRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply all suppressions, then all injections, to an ordered event list.
    ///
    /// Injections are checked against the list after suppression, so an edge
    /// can be suppressed on its registry date and re-injected on another.
    pub fn apply(&self, events: &[ChangeEvent]) -> Result<OverrideOutcome> {
        let mut outcome = OverrideOutcome {
            events: events.to_vec(),
            ..OverrideOutcome::default()
        };
        for rule in self
            .rules
            .iter()
            .filter(|rule| rule.kind == OverrideKind::Suppress)
        {
            self.suppress(rule, &mut outcome)?;
        }
        for rule in self
            .rules
            .iter()
            .filter(|rule| rule.kind == OverrideKind::Inject)
        {
            inject(rule, &mut outcome)?;
        }
        outcome.events.sort();
        info!(
            rules = self.rules.len(),
            suppressed = outcome.suppressed.len(),
            injected = outcome.injected.len(),
            events = outcome.events.len(),
            "applied overrides"
        );
        Ok(outcome)
    }

    fn suppress(&self, rule: &OverrideRule, outcome: &mut OverrideOutcome) -> Result<()> {
        let matches = |event: &ChangeEvent| {
            event.is_edge(&rule.from, &rule.to)
                && rule
                    .effective_date
                    .is_none_or(|date| event.effective_date() == date)
        };
        let (removed, kept): (Vec<ChangeEvent>, Vec<ChangeEvent>) =
            std::mem::take(&mut outcome.events)
                .into_iter()
                .partition(matches);
        outcome.events = kept;
        if removed.is_empty() {
            if self.strict {
                return Err(HarmonizeError::OverrideNotFound {
                    rule: rule.name.clone(),
                    from: rule.from.clone(),
                    to: rule.to.clone(),
                });
            }
            let message = format!(
                "override `{}` suppresses {} -> {}, which is not in the change list",
                rule.name, rule.from, rule.to
            );
            warn!(rule = %rule.name, from = %rule.from, to = %rule.to, "{message}");
            outcome.diagnostics.push(
                Diagnostic::warning(DiagnosticKind::OverrideNotFound, message)
                    .with_code(rule.from.clone()),
            );
        }
        outcome.applications.push(RuleApplication {
            name: rule.name.clone(),
            kind: rule.kind,
            from: rule.from.clone(),
            to: rule.to.clone(),
            removed: removed.len(),
            added: 0,
            justification: rule.justification.clone(),
        });
        outcome
            .suppressed
            .extend(removed.into_iter().map(|event| (event, rule.name.clone())));
        Ok(())
    }
}

fn inject(rule: &OverrideRule, outcome: &mut OverrideOutcome) -> Result<()> {
    let Some(date) = rule.effective_date else {
        return Err(HarmonizeError::InvalidConfig(format!(
            "injection `{}` needs an effective_date",
            rule.name
        )));
    };
    if rule.from == rule.to {
        return Err(HarmonizeError::MalformedEvent {
            row: 0,
            reason: format!("override `{}` injects a self-loop on {}", rule.name, rule.from),
        });
    }
    if outcome
        .events
        .iter()
        .any(|event| event.is_edge(&rule.from, &rule.to))
    {
        return Err(HarmonizeError::InjectionCollision {
            rule: rule.name.clone(),
            from: rule.from.clone(),
            to: rule.to.clone(),
        });
    }
    let event = ChangeEvent::new(rule.from.clone(), rule.to.clone(), date)?;
    outcome.events.push(event.clone());
    outcome.injected.push((event, rule.name.clone()));
    outcome.applications.push(RuleApplication {
        name: rule.name.clone(),
        kind: rule.kind,
        from: rule.from.clone(),
        to: rule.to.clone(),
        removed: 0,
        added: 1,
        justification: rule.justification.clone(),
    });
    Ok(())
}
