//! Dynamic variables
//!
//! A dynamic variable is a named value recomputed from an expression, and
//! optionally gated by a condition, on every refresh pass.
//!
//! # Refresh pass
//!
//! Definitions are evaluated in registration order into two staging
//! collections (`to_set`, `to_unset`). Nothing touches the store until every
//! definition has been evaluated:
//!
//! 1. unsets are applied for names that no definition of the same pass staged a
//!    value for, so a later definition can re-supply a name an earlier one dropped
//! 2. sets are applied, last definition in registration order winning
//!
//! Any evaluation error aborts the pass before the commit, leaving the store and
//! the `evaluated` flags exactly as they were.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::conditions::ConditionEvaluator;
use crate::error::{EvaluationError, RefreshError};
use crate::variables::VariableStore;

/// Computes the value of a dynamic variable from its expression.
///
/// `Ok(None)` means the expression produced no value; the variable is unset.
pub trait ExpressionEvaluator: Send + Sync {
    fn evaluate(
        &self,
        expression: &str,
        variables: &VariableStore,
    ) -> Result<Option<String>, EvaluationError>;
}

impl<F> ExpressionEvaluator for F
where
    F: Fn(&str, &VariableStore) -> Result<Option<String>, EvaluationError> + Send + Sync,
{
    fn evaluate(
        &self,
        expression: &str,
        variables: &VariableStore,
    ) -> Result<Option<String>, EvaluationError> {
        self(expression, variables)
    }
}

/// Evaluates an expression by running it through the store's substitutor.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstitutingEvaluator;

impl ExpressionEvaluator for SubstitutingEvaluator {
    fn evaluate(
        &self,
        expression: &str,
        variables: &VariableStore,
    ) -> Result<Option<String>, EvaluationError> {
        Ok(Some(variables.try_replace(expression)?))
    }
}

/// Definition of one dynamic variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicVariableDef {
    pub name: String,
    /// Expression handed to the [`ExpressionEvaluator`]
    #[serde(rename = "value")]
    pub expression: String,
    #[serde(default)]
    pub condition: Option<String>,
    /// Evaluate once, then only carry the value forward
    #[serde(default, rename = "checkonce")]
    pub one_shot: bool,
    /// Unset the variable while the condition is false
    #[serde(default = "default_true", rename = "unset")]
    pub auto_unset: bool,
    /// Treat non-fatal evaluation errors as "no value"
    #[serde(default)]
    pub ignore_failure: bool,
    #[serde(skip)]
    evaluated: bool,
}

fn default_true() -> bool {
    true
}

impl DynamicVariableDef {
    pub fn new(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expression: expression.into(),
            condition: None,
            one_shot: false,
            auto_unset: true,
            ignore_failure: false,
            evaluated: false,
        }
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn one_shot(mut self) -> Self {
        self.one_shot = true;
        self
    }

    pub fn keep_when_false(mut self) -> Self {
        self.auto_unset = false;
        self
    }

    pub fn ignore_failure(mut self) -> Self {
        self.ignore_failure = true;
        self
    }

    /// True once a value has been computed; never resets.
    pub fn is_evaluated(&self) -> bool {
        self.evaluated
    }
}

/// Staged outcome of evaluating all definitions
#[derive(Debug, Default)]
struct RefreshPlan {
    to_set: BTreeMap<String, String>,
    to_unset: BTreeSet<String>,
    newly_evaluated: Vec<usize>,
}

/// Ordered collection of dynamic variable definitions.
///
/// `add` and `refresh` are serialized by an internal mutex so an accidental
/// concurrent refresh cannot interleave with another.
#[derive(Debug, Default)]
pub struct DynamicVariableSet {
    defs: Mutex<Vec<DynamicVariableDef>>,
}

impl Clone for DynamicVariableSet {
    fn clone(&self) -> Self {
        Self {
            defs: Mutex::new(self.lock().clone()),
        }
    }
}

impl DynamicVariableSet {
    pub fn new() -> Self {
        Self::default()
    }

    // The definitions stay consistent even if a holder panicked: a pass only
    // writes to them after every evaluation succeeded.
    fn lock(&self) -> MutexGuard<'_, Vec<DynamicVariableDef>> {
        self.defs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a definition after all existing ones.
    pub fn add(&self, def: DynamicVariableDef) {
        debug!("Registering dynamic variable '{}'", def.name);
        self.lock().push(def);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot of the registered definitions, in registration order.
    pub fn definitions(&self) -> Vec<DynamicVariableDef> {
        self.lock().clone()
    }

    /// Re-derive every dynamic variable into `store`.
    ///
    /// # Errors
    ///
    /// - `RefreshError::Fatal` when an evaluator reports a fatal error
    /// - `RefreshError::Wrapped` for any other evaluation error
    ///
    /// In both cases nothing has been written to `store`.
    pub fn refresh(
        &self,
        store: &mut VariableStore,
        conditions: &dyn ConditionEvaluator,
        evaluator: &dyn ExpressionEvaluator,
    ) -> Result<(), RefreshError> {
        let mut defs = self.lock();
        let plan = Self::plan(&defs, store, conditions, evaluator)?;

        for index in plan.newly_evaluated {
            defs[index].evaluated = true;
        }
        drop(defs);

        for name in &plan.to_unset {
            if plan.to_set.contains_key(name) {
                continue;
            }
            if store.is_blocked(name) {
                debug!("Keeping blocked variable '{}'", name);
                continue;
            }
            if store.unset(name).is_some() {
                debug!("Unset dynamic variable '{}'", name);
            }
        }
        for (name, value) in plan.to_set {
            if store.is_blocked(&name) {
                debug!("Keeping blocked variable '{}'", name);
                continue;
            }
            store.set(name, value);
        }

        Ok(())
    }

    fn plan(
        defs: &[DynamicVariableDef],
        store: &VariableStore,
        conditions: &dyn ConditionEvaluator,
        evaluator: &dyn ExpressionEvaluator,
    ) -> Result<RefreshPlan, RefreshError> {
        let mut plan = RefreshPlan::default();

        for (index, def) in defs.iter().enumerate() {
            let name = &def.name;

            if let Some(cond) = &def.condition {
                if !conditions.is_true(cond, store) {
                    if def.auto_unset {
                        plan.to_unset.insert(name.clone());
                    }
                    continue;
                }
            }

            if def.one_shot && def.evaluated {
                if let Some(current) = store.get(name) {
                    plan.to_set.insert(name.clone(), current.to_string());
                }
                continue;
            }

            match evaluator.evaluate(&def.expression, store) {
                Ok(Some(value)) => {
                    plan.to_set.insert(name.clone(), value);
                }
                Ok(None) => {
                    plan.to_unset.insert(name.clone());
                }
                Err(EvaluationError::Fatal(message)) => {
                    return Err(RefreshError::Fatal {
                        name: name.clone(),
                        message,
                    });
                }
                Err(EvaluationError::Other(e)) if def.ignore_failure => {
                    warn!("Ignoring failure of dynamic variable '{}': {:#}", name, e);
                    plan.to_unset.insert(name.clone());
                    continue;
                }
                Err(EvaluationError::Other(source)) => {
                    return Err(RefreshError::Wrapped {
                        name: name.clone(),
                        source,
                    });
                }
            }
            plan.newly_evaluated.push(index);
        }

        Ok(plan)
    }
}

impl FromIterator<DynamicVariableDef> for DynamicVariableSet {
    fn from_iter<I: IntoIterator<Item = DynamicVariableDef>>(iter: I) -> Self {
        Self {
            defs: Mutex::new(iter.into_iter().collect()),
        }
    }
}
