//! Liquid-class policies: rules, conditions, and resolution.
//!
//! A policy attaches liquid-class-specific behaviour (mixing,
//! z-offsets, speed limits) to instructions. Rules carry ordered
//! conditions and a named policy fragment; resolution merges every
//! matched fragment, in priority order, onto the reserved `default`
//! policy.

mod engine;
mod rule;

pub use engine::{ClassQuery, PolicyQuery, PolicyRuleSet, DEFAULT_POLICY};
pub use rule::{options, Comparison, Condition, Policy, PolicyValue, Rule, LIQUID_CLASS_ATTR};
