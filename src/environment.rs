//! Installation environment
//!
//! Bundles the variable store with the dynamic variable definitions and the
//! two external authorities they are evaluated against. Panels and the
//! sequencer only ever refresh variables through [`InstallEnvironment::refresh`].

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::conditions::{ConditionEvaluator, ConditionTable};
use crate::dynamic::{DynamicVariableDef, DynamicVariableSet, ExpressionEvaluator, SubstitutingEvaluator};
use crate::error::RefreshError;
use crate::variables::VariableStore;

/// Variables, dynamic definitions and the condition/expression authorities.
pub struct InstallEnvironment {
    pub variables: VariableStore,
    dynamic: DynamicVariableSet,
    conditions: Arc<dyn ConditionEvaluator>,
    evaluator: Arc<dyn ExpressionEvaluator>,
}

impl fmt::Debug for InstallEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallEnvironment")
            .field("variables", &self.variables)
            .field("dynamic", &self.dynamic)
            .finish_non_exhaustive()
    }
}

impl Default for InstallEnvironment {
    fn default() -> Self {
        Self::new(VariableStore::new())
    }
}

impl InstallEnvironment {
    /// Environment with an empty condition table and substitution-based
    /// dynamic variable evaluation.
    pub fn new(variables: VariableStore) -> Self {
        Self {
            variables,
            dynamic: DynamicVariableSet::new(),
            conditions: Arc::new(ConditionTable::new()),
            evaluator: Arc::new(SubstitutingEvaluator),
        }
    }

    pub fn with_conditions(mut self, conditions: impl ConditionEvaluator + 'static) -> Self {
        self.conditions = Arc::new(conditions);
        self
    }

    pub fn with_evaluator(mut self, evaluator: impl ExpressionEvaluator + 'static) -> Self {
        self.evaluator = Arc::new(evaluator);
        self
    }

    pub fn with_dynamic_variables(mut self, dynamic: DynamicVariableSet) -> Self {
        self.dynamic = dynamic;
        self
    }

    pub fn add_dynamic_variable(&self, def: DynamicVariableDef) {
        self.dynamic.add(def);
    }

    pub fn dynamic_variables(&self) -> &DynamicVariableSet {
        &self.dynamic
    }

    /// Evaluate condition `id` against the current variables.
    pub fn is_condition_true(&self, id: &str) -> bool {
        self.conditions.is_true(id, &self.variables)
    }

    /// Run one refresh pass of every dynamic variable.
    pub fn refresh(&mut self) -> Result<(), RefreshError> {
        debug!("Refreshing {} dynamic variable(s)", self.dynamic.len());
        self.dynamic.refresh(
            &mut self.variables,
            self.conditions.as_ref(),
            self.evaluator.as_ref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::Condition;

    #[test]
    fn test_refresh_uses_shared_condition_authority() {
        let conditions: ConditionTable = [Condition::equals("is_custom", "TYPE", "custom")]
            .into_iter()
            .collect();
        let mut env = InstallEnvironment::default().with_conditions(conditions);
        env.add_dynamic_variable(
            DynamicVariableDef::new("DATA_DIR", "${ROOT}/data").with_condition("is_custom"),
        );
        env.variables.set("ROOT", "/srv");

        env.refresh().unwrap();
        assert_eq!(env.variables.get("DATA_DIR"), None);
        assert!(!env.is_condition_true("is_custom"));

        env.variables.set("TYPE", "custom");
        assert!(env.is_condition_true("is_custom"));
        env.refresh().unwrap();
        assert_eq!(env.variables.get("DATA_DIR"), Some("/srv/data"));
    }
}
