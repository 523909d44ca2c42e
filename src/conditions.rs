//! Condition authority
//!
//! Panels and dynamic variables gate on opaque condition ids. Both consult the
//! same [`ConditionEvaluator`], so a panel and a variable may share an id.
//!
//! [`ConditionTable`] is a small declarative evaluator used by install
//! definition files. Anything richer plugs in through the trait.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::variables::VariableStore;

/// Boolean predicate lookup by condition id.
pub trait ConditionEvaluator: Send + Sync {
    fn is_true(&self, id: &str, variables: &VariableStore) -> bool;
}

impl<F> ConditionEvaluator for F
where
    F: Fn(&str, &VariableStore) -> bool + Send + Sync,
{
    fn is_true(&self, id: &str, variables: &VariableStore) -> bool {
        self(id, variables)
    }
}

/// A declarative condition.
///
/// Exactly one test is used, checked in this order: `all`, `any`, `equals`,
/// `not_equals`, `defined`. `negate` inverts the outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub id: String,
    #[serde(default)]
    pub variable: Option<String>,
    #[serde(default)]
    pub equals: Option<String>,
    #[serde(default)]
    pub not_equals: Option<String>,
    #[serde(default)]
    pub defined: Option<bool>,
    /// Ids of conditions that must all hold
    #[serde(default)]
    pub all: Vec<String>,
    /// Ids of conditions of which one must hold
    #[serde(default)]
    pub any: Vec<String>,
    #[serde(default)]
    pub negate: bool,
}

impl Condition {
    /// Condition that holds when `variable` equals `value`.
    pub fn equals(id: impl Into<String>, variable: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            variable: Some(variable.into()),
            equals: Some(value.into()),
            ..Self::default()
        }
    }

    /// Condition that holds when `variable` is set.
    pub fn defined(id: impl Into<String>, variable: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            variable: Some(variable.into()),
            defined: Some(true),
            ..Self::default()
        }
    }

    /// Invert this condition
    pub fn negated(mut self) -> Self {
        self.negate = !self.negate;
        self
    }

    /// Ids of other conditions this one refers to
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.all.iter().chain(self.any.iter()).map(String::as_str)
    }
}

/// Condition evaluator backed by a table of [`Condition`]s.
#[derive(Debug, Clone, Default)]
pub struct ConditionTable {
    conditions: HashMap<String, Condition>,
}

/// Composite conditions deeper than this are treated as false
const MAX_DEPTH: usize = 32;

impl ConditionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition, replacing any previous one with the same id.
    pub fn insert(&mut self, condition: Condition) {
        self.conditions.insert(condition.id.clone(), condition);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.conditions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    fn evaluate(&self, id: &str, variables: &VariableStore, depth: usize) -> bool {
        if depth > MAX_DEPTH {
            warn!("Condition '{}' nests too deeply, treating as false", id);
            return false;
        }
        let Some(cond) = self.conditions.get(id) else {
            warn!("Unknown condition '{}', treating as false", id);
            return false;
        };

        let value = cond.variable.as_deref().and_then(|v| variables.get(v));
        let result = if !cond.all.is_empty() {
            cond.all
                .iter()
                .all(|c| self.evaluate(c, variables, depth + 1))
        } else if !cond.any.is_empty() {
            cond.any
                .iter()
                .any(|c| self.evaluate(c, variables, depth + 1))
        } else if let Some(expected) = &cond.equals {
            value == Some(expected.as_str())
        } else if let Some(unexpected) = &cond.not_equals {
            value != Some(unexpected.as_str())
        } else if let Some(defined) = cond.defined {
            value.is_some() == defined
        } else {
            warn!("Condition '{}' has no test, treating as false", id);
            false
        };

        result != cond.negate
    }
}

impl ConditionEvaluator for ConditionTable {
    fn is_true(&self, id: &str, variables: &VariableStore) -> bool {
        self.evaluate(id, variables, 0)
    }
}

impl FromIterator<Condition> for ConditionTable {
    fn from_iter<I: IntoIterator<Item = Condition>>(iter: I) -> Self {
        let mut table = Self::new();
        for condition in iter {
            table.insert(condition);
        }
        table
    }
}
