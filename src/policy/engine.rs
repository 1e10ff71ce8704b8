//! Rule matching and policy resolution.
//!
//! Resolution is a pure function over the instruction's queryable
//! attributes and the rule set: collect every rule whose conditions all
//! hold, sort by priority, and merge the matched fragments onto a copy
//! of the default policy. Later merges override, and a stable sort
//! keeps table order among equal priorities.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::policy::rule::{Condition, Policy, PolicyValue, Rule, LIQUID_CLASS_ATTR};
use crate::policy::rule::options;
use crate::units::Volume;

/// Something the policy engine can query attributes from.
pub trait PolicyQuery {
    /// Returns the named attribute, if the instruction has it.
    fn attribute(&self, name: &str) -> Option<PolicyValue>;

    /// One-line summary for error messages.
    fn summary(&self) -> String;
}

/// A minimal query for resolving by liquid class alone.
#[derive(Debug, Clone)]
pub struct ClassQuery {
    /// The liquid class to resolve for.
    pub liquid_class: String,
    /// Transfer volume, if known.
    pub volume: Option<Volume>,
}

impl ClassQuery {
    /// Creates a query for a liquid class.
    #[must_use]
    pub fn new(liquid_class: impl Into<String>) -> Self {
        Self {
            liquid_class: liquid_class.into(),
            volume: None,
        }
    }
}

impl PolicyQuery for ClassQuery {
    fn attribute(&self, name: &str) -> Option<PolicyValue> {
        match name {
            LIQUID_CLASS_ATTR => Some(PolicyValue::Str(self.liquid_class.clone())),
            "volume" => self.volume.map(PolicyValue::Vol),
            _ => None,
        }
    }

    fn summary(&self) -> String {
        format!("class {}", self.liquid_class)
    }
}

/// The reserved name of the always-present base policy.
pub const DEFAULT_POLICY: &str = "default";

/// A named set of policies plus the rules that select them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRuleSet {
    policies: BTreeMap<String, Policy>,
    rules: Vec<Rule>,
}

impl PolicyRuleSet {
    /// Creates a rule set containing only the default policy.
    #[must_use]
    pub fn new() -> Self {
        let mut policies = BTreeMap::new();
        policies.insert(DEFAULT_POLICY.to_string(), Self::base_default());
        Self {
            policies,
            rules: Vec::new(),
        }
    }

    fn base_default() -> Policy {
        Policy::new()
            .with(options::CAN_MULTI, PolicyValue::Bool(true))
            .with(options::POST_MIX, PolicyValue::Int(0))
            .with(options::BLOWOUT, PolicyValue::Bool(false))
            .with(options::TOUCH_OFF, PolicyValue::Bool(false))
            .with(options::ASP_Z_OFFSET, PolicyValue::Float(0.5))
            .with(options::DSP_Z_OFFSET, PolicyValue::Float(0.5))
    }

    /// The standard rule set used by the test suites: water and
    /// glycerol classes on top of the defaults.
    #[must_use]
    pub fn standard() -> Self {
        let mut set = Self::new();
        set.add_class_policy("water", Policy::new());
        set.add_class_policy(
            "glycerol",
            Policy::new()
                .with(options::ASP_SPEED, PolicyValue::Float(20.0))
                .with(options::DSP_SPEED, PolicyValue::Float(20.0))
                .with(options::POST_MIX, PolicyValue::Int(3))
                .with(
                    options::POST_MIX_VOLUME,
                    PolicyValue::Vol(Volume::ul(20.0)),
                )
                .with(options::CAN_MULTI, PolicyValue::Bool(false)),
        );
        set
    }

    /// Registers a policy fragment under a name.
    pub fn add_policy(&mut self, name: impl Into<String>, policy: Policy) {
        self.policies.insert(name.into(), policy);
    }

    /// Appends a rule. Rules keep table order among equal priorities.
    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Registers a liquid-class policy together with the rule that
    /// selects it (`liquid_class == class`, priority 1).
    pub fn add_class_policy(&mut self, class: impl Into<String>, policy: Policy) {
        let class = class.into();
        self.add_policy(class.clone(), policy);
        self.add_rule(Rule {
            name: class.clone(),
            priority: 1,
            conditions: vec![Condition::liquid_class(class.clone())],
            policy: class,
        });
    }

    /// The default policy.
    #[must_use]
    pub fn default_policy(&self) -> &Policy {
        // The constructor guarantees the entry exists.
        &self.policies[DEFAULT_POLICY]
    }

    /// Names of all known policies, sorted.
    #[must_use]
    pub fn policy_names(&self) -> Vec<String> {
        self.policies.keys().cloned().collect()
    }

    /// Resolves the effective policy for an instruction.
    ///
    /// # Errors
    /// - [`PolicyError::NoMatchingRules`] if no rule fired at all.
    /// - [`PolicyError::NoLiquidType`] if rules fired but none of them
    ///   references the liquid-class attribute.
    /// - [`PolicyError::InvalidLiquidType`] if liquid-class rules fired
    ///   but every fragment they name is unknown to the table.
    /// - [`PolicyError::InvalidRule`] if a condition cannot be
    ///   evaluated.
    pub fn resolve(&self, query: &dyn PolicyQuery) -> Result<Policy, PolicyError> {
        let mut matched: Vec<&Rule> = Vec::new();
        for rule in &self.rules {
            let mut all_hold = true;
            for cond in &rule.conditions {
                let actual = query.attribute(&cond.attribute);
                let holds = cond.holds(actual.as_ref()).map_err(|reason| {
                    PolicyError::InvalidRule {
                        rule: rule.name.clone(),
                        reason,
                    }
                })?;
                if !holds {
                    all_hold = false;
                    break;
                }
            }
            if all_hold && !rule.conditions.is_empty() {
                matched.push(rule);
            }
        }

        if matched.is_empty() {
            return Err(PolicyError::NoMatchingRules {
                instruction: query.summary(),
            });
        }

        let class_rules: Vec<&&Rule> = matched
            .iter()
            .filter(|r| r.references_liquid_class())
            .collect();
        if class_rules.is_empty() {
            return Err(PolicyError::NoLiquidType {
                instruction: query.summary(),
            });
        }
        if class_rules
            .iter()
            .all(|r| !self.policies.contains_key(&r.policy))
        {
            return Err(PolicyError::InvalidLiquidType {
                bad: class_rules.iter().map(|r| r.policy.clone()).collect(),
                valid: self.policy_names(),
            });
        }

        matched.sort_by_key(|r| r.priority);

        let mut effective = self.default_policy().clone();
        for rule in matched {
            if let Some(fragment) = self.policies.get(&rule.policy) {
                effective.merge_from(fragment);
            }
        }
        Ok(effective)
    }

    /// Resolves for a bare liquid class, falling back to the default
    /// policy on the three non-fatal resolution errors.
    ///
    /// An unevaluable rule is still an error: that is a broken table,
    /// not a missing liquid type.
    pub fn resolve_for_class_or_default(&self, liquid_class: &str) -> Result<Policy, PolicyError> {
        match self.resolve(&ClassQuery::new(liquid_class)) {
            Ok(p) => Ok(p),
            Err(
                PolicyError::NoLiquidType { .. }
                | PolicyError::InvalidLiquidType { .. }
                | PolicyError::NoMatchingRules { .. },
            ) => Ok(self.default_policy().clone()),
            Err(e @ PolicyError::InvalidRule { .. }) => Err(e),
        }
    }
}

impl Default for PolicyRuleSet {
    fn default() -> Self {
        Self::new()
    }
}
