//! Policies, rules, and conditions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::units::Volume;

/// The attribute name that carries a liquid's class.
///
/// Exactly one matched rule must condition on this attribute for a
/// resolution to be considered typed; see the engine for the error
/// taxonomy around it.
pub const LIQUID_CLASS_ATTR: &str = "liquid_class";

/// Well-known policy option names.
pub mod options {
    /// Number of post-dispense mix cycles (int).
    pub const POST_MIX: &str = "POST_MIX";
    /// Volume of each post-mix cycle in microlitres (volume).
    pub const POST_MIX_VOLUME: &str = "POST_MIX_VOLUME";
    /// Aspiration speed in microlitres per second (float).
    pub const ASP_SPEED: &str = "ASPSPEED";
    /// Dispense speed in microlitres per second (float).
    pub const DSP_SPEED: &str = "DSPSPEED";
    /// Aspiration z-offset above the well bottom in millimetres (float).
    pub const ASP_Z_OFFSET: &str = "ASPZOFFSET";
    /// Dispense z-offset above the well bottom in millimetres (float).
    pub const DSP_Z_OFFSET: &str = "DSPZOFFSET";
    /// Whether transfers of this class may join multi-channel batches (bool).
    pub const CAN_MULTI: &str = "CAN_MULTI";
    /// Whether to blow out after dispensing (bool).
    pub const BLOWOUT: &str = "BLOWOUT";
    /// Whether to touch off on the well wall after dispensing (bool).
    pub const TOUCH_OFF: &str = "TOUCHOFF";
}

/// A value a policy option or instruction attribute can hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PolicyValue {
    /// Boolean flag.
    Bool(bool),
    /// Integer count.
    Int(i64),
    /// Floating-point quantity.
    Float(f64),
    /// String tag.
    Str(String),
    /// Typed volume.
    Vol(Volume),
}

impl PolicyValue {
    /// Numeric view of the value, if it has one.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Vol(v) => Some(v.as_ul()),
            Self::Bool(_) | Self::Str(_) => None,
        }
    }

    /// String view of the value, if it is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }
}

/// How a condition compares the attribute against its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// Attribute equals the value.
    Eq,
    /// Attribute differs from the value.
    Ne,
    /// Attribute is numerically greater than the value.
    Gt,
    /// Attribute is numerically less than the value.
    Lt,
    /// Attribute (a string) matches the value (a regex).
    Matches,
}

/// One (attribute, comparison, value) condition of a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// The instruction attribute to query.
    pub attribute: String,
    /// How to compare.
    pub comparison: Comparison,
    /// The reference value.
    pub value: PolicyValue,
}

impl Condition {
    /// Shorthand for an equality condition on the liquid class.
    #[must_use]
    pub fn liquid_class(class: impl Into<String>) -> Self {
        Self {
            attribute: LIQUID_CLASS_ATTR.to_string(),
            comparison: Comparison::Eq,
            value: PolicyValue::Str(class.into()),
        }
    }

    /// Evaluates this condition against an attribute value.
    ///
    /// A missing attribute fails the condition. Returns `Err(reason)`
    /// only when the condition itself cannot be evaluated (bad regex,
    /// type mismatch on an ordered comparison).
    pub fn holds(&self, actual: Option<&PolicyValue>) -> Result<bool, String> {
        let Some(actual) = actual else {
            return Ok(false);
        };
        match self.comparison {
            Comparison::Eq => Ok(actual == &self.value),
            Comparison::Ne => Ok(actual != &self.value),
            Comparison::Gt | Comparison::Lt => {
                let (a, b) = match (actual.as_f64(), self.value.as_f64()) {
                    (Some(a), Some(b)) => (a, b),
                    _ => {
                        return Err(format!(
                            "ordered comparison on non-numeric attribute '{}'",
                            self.attribute
                        ))
                    }
                };
                Ok(if self.comparison == Comparison::Gt {
                    a > b
                } else {
                    a < b
                })
            }
            Comparison::Matches => {
                let pattern = self
                    .value
                    .as_str()
                    .ok_or_else(|| "matches comparison needs a string pattern".to_string())?;
                let re = regex::Regex::new(pattern).map_err(|e| format!("bad pattern: {e}"))?;
                Ok(actual.as_str().is_some_and(|s| re.is_match(s)))
            }
        }
    }
}

/// A named set of option values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Policy {
    options: BTreeMap<String, PolicyValue>,
}

impl Policy {
    /// An empty policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an option, replacing any previous value.
    #[must_use]
    pub fn with(mut self, option: impl Into<String>, value: PolicyValue) -> Self {
        self.options.insert(option.into(), value);
        self
    }

    /// Merges `other` on top of this policy; later values override.
    pub fn merge_from(&mut self, other: &Self) {
        for (k, v) in &other.options {
            self.options.insert(k.clone(), v.clone());
        }
    }

    /// Raw option lookup.
    #[must_use]
    pub fn get(&self, option: &str) -> Option<&PolicyValue> {
        self.options.get(option)
    }

    /// Boolean option, with a default for absence.
    #[must_use]
    pub fn get_bool(&self, option: &str, default: bool) -> bool {
        match self.options.get(option) {
            Some(PolicyValue::Bool(b)) => *b,
            _ => default,
        }
    }

    /// Integer option, zero if absent.
    #[must_use]
    pub fn get_int(&self, option: &str) -> i64 {
        match self.options.get(option) {
            Some(PolicyValue::Int(v)) => *v,
            _ => 0,
        }
    }

    /// Numeric option, if present.
    #[must_use]
    pub fn get_f64(&self, option: &str) -> Option<f64> {
        self.options.get(option).and_then(PolicyValue::as_f64)
    }

    /// Volume option, if present.
    #[must_use]
    pub fn get_volume(&self, option: &str) -> Option<Volume> {
        match self.options.get(option) {
            Some(PolicyValue::Vol(v)) => Some(*v),
            Some(PolicyValue::Float(v)) => Some(Volume::ul(*v)),
            _ => None,
        }
    }

    /// Number of options set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// True if no options are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

/// A rule: conditions gating a named policy fragment, with a priority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Rule name, for diagnostics.
    pub name: String,
    /// Merge priority; higher priorities merge later and win.
    pub priority: i32,
    /// All conditions must hold for the rule to fire.
    pub conditions: Vec<Condition>,
    /// Name of the policy fragment this rule applies.
    pub policy: String,
}

impl Rule {
    /// True if any condition references the liquid-class attribute.
    #[must_use]
    pub fn references_liquid_class(&self) -> bool {
        self.conditions
            .iter()
            .any(|c| c.attribute == LIQUID_CLASS_ATTR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eq_condition_on_missing_attribute_fails_closed() {
        let c = Condition::liquid_class("water");
        assert!(!c.holds(None).unwrap());
        assert!(c
            .holds(Some(&PolicyValue::Str("water".to_string())))
            .unwrap());
        assert!(!c
            .holds(Some(&PolicyValue::Str("glycerol".to_string())))
            .unwrap());
    }

    #[test]
    fn ordered_comparison_needs_numbers() {
        let c = Condition {
            attribute: "volume".to_string(),
            comparison: Comparison::Gt,
            value: PolicyValue::Float(50.0),
        };
        assert!(c.holds(Some(&PolicyValue::Vol(Volume::ul(100.0)))).unwrap());
        assert!(!c.holds(Some(&PolicyValue::Float(10.0))).unwrap());
        assert!(c.holds(Some(&PolicyValue::Str("x".to_string()))).is_err());
    }

    #[test]
    fn matches_condition_uses_regex() {
        let c = Condition {
            attribute: "name".to_string(),
            comparison: Comparison::Matches,
            value: PolicyValue::Str("^master".to_string()),
        };
        assert!(c
            .holds(Some(&PolicyValue::Str("mastermix_1".to_string())))
            .unwrap());
        assert!(!c
            .holds(Some(&PolicyValue::Str("water".to_string())))
            .unwrap());
    }

    #[test]
    fn bad_regex_is_an_evaluation_error() {
        let c = Condition {
            attribute: "name".to_string(),
            comparison: Comparison::Matches,
            value: PolicyValue::Str("(".to_string()),
        };
        assert!(c.holds(Some(&PolicyValue::Str("x".to_string()))).is_err());
    }

    #[test]
    fn merge_overrides_in_order() {
        let mut base = Policy::new()
            .with(options::CAN_MULTI, PolicyValue::Bool(true))
            .with(options::POST_MIX, PolicyValue::Int(0));
        let frag = Policy::new().with(options::POST_MIX, PolicyValue::Int(3));
        base.merge_from(&frag);
        assert_eq!(base.get_int(options::POST_MIX), 3);
        assert!(base.get_bool(options::CAN_MULTI, false));
    }

    #[test]
    fn typed_getters() {
        let p = Policy::new()
            .with(options::ASP_SPEED, PolicyValue::Float(20.0))
            .with(options::POST_MIX_VOLUME, PolicyValue::Vol(Volume::ul(50.0)));
        assert_eq!(p.get_f64(options::ASP_SPEED), Some(20.0));
        assert_eq!(p.get_volume(options::POST_MIX_VOLUME), Some(Volume::ul(50.0)));
        assert_eq!(p.get_volume(options::DSP_Z_OFFSET), None);
    }

    #[test]
    fn rule_liquid_class_detection() {
        let rule = Rule {
            name: "water".to_string(),
            priority: 1,
            conditions: vec![Condition::liquid_class("water")],
            policy: "water".to_string(),
        };
        assert!(rule.references_liquid_class());
    }
}
