//! Change-event handling for administrative code harmonization.
//!
//! The pipeline is `ChangeEventStore` (registry rows to ordered events),
//! `OverrideRuleSet` (analyst exceptions), `ChangeGraph` (closure, components
//! and cycle checks) and `TemporalReplayer` (events to an `AnchorMapping`).

#![deny(unsafe_code)]

pub mod graph;
pub mod mapping;
pub mod overrides;
pub mod replay;
pub mod store;

pub use graph::{ChangeGraph, component_splits};
pub use mapping::{AnchorMapping, Crosswalk};
pub use overrides::{AnnotatedEvent, OverrideOutcome, OverrideRuleSet, RuleApplication};
pub use replay::{
    Ambiguity, Direction, PassOutcome, ReplayPhase, ReplayReport, ReplayStats, TemporalReplayer,
    WorkingMap,
};
pub use store::{ChangeEventStore, ChangeShape, change_shapes};
