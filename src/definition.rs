//! Install definition files
//!
//! A definition describes one installer: initial variables, conditions,
//! dynamic variables, validators and the ordered panels. It is stored as JSON:
//!
//! ```json
//! {
//!   "variables": { "INSTALL_PATH": "/opt/app" },
//!   "conditions": [ { "id": "is_custom", "variable": "INSTALL_TYPE", "equals": "custom" } ],
//!   "dynamic_variables": [
//!     { "name": "DATA_DIR", "value": "${INSTALL_PATH}/data", "condition": "is_custom" }
//!   ],
//!   "validators": [ { "id": "need_path", "required": ["INSTALL_PATH"] } ],
//!   "panels": [
//!     { "id": "welcome", "class": "HelloPanel" },
//!     { "id": "target", "class": "TargetPanel", "validators": ["need_path"] }
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::conditions::{Condition, ConditionTable};
use crate::dynamic::{DynamicVariableDef, DynamicVariableSet};
use crate::environment::InstallEnvironment;
use crate::panels::{
    PanelDescriptor, PanelFactory, PanelRegistry, ValidationStatus, ValidatorCatalog,
};
use crate::sequencer::PanelSequencer;
use crate::variables::VariableStore;

/// Built-in validator: every listed variable must be set and non-blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSpec {
    pub id: String,
    #[serde(default)]
    pub required: Vec<String>,
    /// Report missing variables as a warning instead of an error
    #[serde(default)]
    pub warn_only: bool,
}

impl ValidatorSpec {
    fn check(&self, variables: &VariableStore) -> ValidationStatus {
        let missing: Vec<&str> = self
            .required
            .iter()
            .map(String::as_str)
            .filter(|name| variables.get(name).is_none_or(|v| v.trim().is_empty()))
            .collect();
        if missing.is_empty() {
            return ValidationStatus::Ok;
        }
        let msg = format!("missing required variable(s): {}", missing.join(", "));
        if self.warn_only {
            ValidationStatus::Warning(msg)
        } else {
            ValidationStatus::Error(msg)
        }
    }
}

/// Installer definition that can be loaded from disk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallDefinition {
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub dynamic_variables: Vec<DynamicVariableDef>,
    #[serde(default)]
    pub validators: Vec<ValidatorSpec>,
    pub panels: Vec<PanelDescriptor>,
}

impl InstallDefinition {
    /// Load a definition from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read definition from {:?}", path.as_ref()))?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse definition JSON")
    }

    /// Save the definition as pretty JSON
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize definition to JSON")?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write definition to {:?}", path.as_ref()))?;
        Ok(())
    }

    /// Validate the definition
    pub fn validate(&self) -> Result<()> {
        if self.panels.is_empty() {
            anyhow::bail!("Definition must declare at least one panel");
        }

        let mut panel_ids = HashSet::new();
        for panel in &self.panels {
            if panel.id.trim().is_empty() {
                anyhow::bail!("Panel id must not be empty");
            }
            if !panel_ids.insert(panel.id.as_str()) {
                anyhow::bail!("Duplicate panel id '{}'", panel.id);
            }
        }

        let mut condition_ids = HashSet::new();
        for cond in &self.conditions {
            if cond.id.trim().is_empty() {
                anyhow::bail!("Condition id must not be empty");
            }
            if !condition_ids.insert(cond.id.as_str()) {
                anyhow::bail!("Duplicate condition id '{}'", cond.id);
            }
        }
        for cond in &self.conditions {
            if let Some(missing) = cond.references().find(|r| !condition_ids.contains(r)) {
                anyhow::bail!(
                    "Condition '{}' refers to unknown condition '{}'",
                    cond.id,
                    missing
                );
            }
        }

        for var in &self.dynamic_variables {
            if var.name.trim().is_empty() {
                anyhow::bail!("Dynamic variable name must not be empty");
            }
            if let Some(cond) = &var.condition {
                if !condition_ids.contains(cond.as_str()) {
                    anyhow::bail!(
                        "Dynamic variable '{}' refers to unknown condition '{}'",
                        var.name,
                        cond
                    );
                }
            }
        }

        let validator_ids: HashSet<&str> = self.validators.iter().map(|v| v.id.as_str()).collect();
        for panel in &self.panels {
            if let Some(cond) = &panel.condition {
                if !condition_ids.contains(cond.as_str()) {
                    anyhow::bail!(
                        "Panel '{}' refers to unknown condition '{}'",
                        panel.id,
                        cond
                    );
                }
            }
            if let Some(missing) = panel
                .validators
                .iter()
                .find(|v| !validator_ids.contains(v.as_str()))
            {
                anyhow::bail!(
                    "Panel '{}' refers to unknown validator '{}'",
                    panel.id,
                    missing
                );
            }
        }

        Ok(())
    }

    /// Environment holding the initial variables, conditions and dynamic variables
    pub fn build_environment(&self) -> InstallEnvironment {
        let mut variables = VariableStore::new();
        variables.extend(self.variables.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        let conditions: ConditionTable = self.conditions.iter().cloned().collect();
        let dynamic: DynamicVariableSet = self.dynamic_variables.iter().cloned().collect();

        InstallEnvironment::new(variables)
            .with_conditions(conditions)
            .with_dynamic_variables(dynamic)
    }

    pub fn validator_catalog(&self) -> ValidatorCatalog {
        let mut catalog = ValidatorCatalog::new();
        for spec in &self.validators {
            let spec = spec.clone();
            catalog.register(
                spec.id.clone(),
                move |_: &PanelDescriptor, vars: &VariableStore| spec.check(vars),
            );
        }
        catalog
    }

    /// Validate the definition and assemble a sequencer using `factory` for views
    pub fn build_sequencer(&self, factory: impl PanelFactory + 'static) -> Result<PanelSequencer> {
        self.validate()?;
        let registry = PanelRegistry::new(self.panels.clone(), factory)
            .with_validators(self.validator_catalog());
        Ok(PanelSequencer::new(registry, self.build_environment()))
    }
}
