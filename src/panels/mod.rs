//! Panels
//!
//! A panel is one step of the wizard. Its static description lives in a
//! [`PanelDescriptor`]; its behaviour is a [`PanelView`] created lazily by the
//! [`PanelRegistry`]. Views only implement the hooks they care about; the
//! shared validation sequence is provided by [`validate_panel`] and
//! [`commit_without_validation`].

pub mod registry;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::environment::InstallEnvironment;
use crate::error::{InstallerError, Result};
use crate::variables::VariableStore;

pub use registry::{PanelFactory, PanelRegistry};

/// Static description of a panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelDescriptor {
    pub id: String,
    /// Implementation the [`PanelFactory`] resolves a view from
    #[serde(rename = "class")]
    pub class_name: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub condition: Option<String>,
    /// Validator ids, run in order
    #[serde(default)]
    pub validators: Vec<String>,
    #[serde(skip)]
    visited: bool,
}

fn default_visible() -> bool {
    true
}

impl PanelDescriptor {
    pub fn new(id: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            class_name: class_name.into(),
            visible: true,
            condition: None,
            validators: Vec::new(),
            visited: false,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_validator(mut self, validator: impl Into<String>) -> Self {
        self.validators.push(validator.into());
        self
    }

    /// True if this panel was current since the last backward jump past it.
    pub fn is_visited(&self) -> bool {
        self.visited
    }

    pub(crate) fn set_visited(&mut self, visited: bool) {
        self.visited = visited;
    }
}

/// Navigation switches panels may flip while they are being validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationFlags {
    pub next_enabled: bool,
    pub previous_enabled: bool,
}

impl Default for NavigationFlags {
    fn default() -> Self {
        Self {
            next_enabled: true,
            previous_enabled: true,
        }
    }
}

/// Outcome of a single validator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationStatus {
    Ok,
    /// Passes, but the message is logged
    Warning(String),
    /// Fails validation and stops the remaining validators
    Error(String),
}

impl ValidationStatus {
    pub fn is_ok(&self) -> bool {
        !matches!(self, Self::Error(_))
    }
}

/// Validates the data a panel collected.
pub trait PanelValidator: Send + Sync {
    fn validate(&self, panel: &PanelDescriptor, variables: &VariableStore) -> ValidationStatus;
}

impl<F> PanelValidator for F
where
    F: Fn(&PanelDescriptor, &VariableStore) -> ValidationStatus + Send + Sync,
{
    fn validate(&self, panel: &PanelDescriptor, variables: &VariableStore) -> ValidationStatus {
        self(panel, variables)
    }
}

/// Validators by id, shared by every panel of a registry.
#[derive(Clone, Default)]
pub struct ValidatorCatalog {
    validators: HashMap<String, Arc<dyn PanelValidator>>,
}

impl fmt::Debug for ValidatorCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&str> = self.validators.keys().map(String::as_str).collect();
        ids.sort_unstable();
        f.debug_struct("ValidatorCatalog").field("ids", &ids).finish()
    }
}

impl ValidatorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: impl Into<String>, validator: impl PanelValidator + 'static) {
        self.validators.insert(id.into(), Arc::new(validator));
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn PanelValidator>> {
        self.validators.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.validators.contains_key(id)
    }
}

/// Everything a view may touch while one of its hooks runs.
pub struct PanelContext<'a> {
    pub descriptor: &'a PanelDescriptor,
    pub env: &'a mut InstallEnvironment,
    pub navigation: &'a mut NavigationFlags,
    validators: &'a ValidatorCatalog,
}

impl<'a> PanelContext<'a> {
    pub fn new(
        descriptor: &'a PanelDescriptor,
        env: &'a mut InstallEnvironment,
        navigation: &'a mut NavigationFlags,
        validators: &'a ValidatorCatalog,
    ) -> Self {
        Self {
            descriptor,
            env,
            navigation,
            validators,
        }
    }

    pub fn variables(&self) -> &VariableStore {
        &self.env.variables
    }

    pub fn variables_mut(&mut self) -> &mut VariableStore {
        &mut self.env.variables
    }

    pub fn refresh(&mut self) -> Result<()> {
        Ok(self.env.refresh()?)
    }

    /// Run the panel's validators in order, stopping at the first error.
    ///
    /// # Errors
    ///
    /// `UnknownValidator` if the descriptor names a validator missing from the catalog.
    pub fn run_validators(&self) -> Result<bool> {
        for id in &self.descriptor.validators {
            let validator =
                self.validators
                    .get(id)
                    .ok_or_else(|| InstallerError::UnknownValidator {
                        panel: self.descriptor.id.clone(),
                        validator: id.clone(),
                    })?;
            match validator.validate(self.descriptor, &self.env.variables) {
                ValidationStatus::Ok => {}
                ValidationStatus::Warning(msg) => {
                    warn!("Panel '{}' validator '{}': {}", self.descriptor.id, id, msg);
                }
                ValidationStatus::Error(msg) => {
                    debug!(
                        "Panel '{}' rejected by validator '{}': {}",
                        self.descriptor.id, id, msg
                    );
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

/// Behaviour of one panel.
///
/// Every hook has a default, so a view only overrides what it needs. Concrete
/// rendering (console prompts, GUI widgets) lives behind `activate`.
pub trait PanelView {
    /// Additional gate beyond the descriptor's visibility and condition.
    fn can_show(&self, _descriptor: &PanelDescriptor, _env: &InstallEnvironment) -> bool {
        true
    }

    /// Views reporting `false` are skipped by navigation.
    fn is_visible(&self, descriptor: &PanelDescriptor) -> bool {
        descriptor.visible
    }

    fn is_valid(&mut self, ctx: &mut PanelContext<'_>) -> Result<bool> {
        validate_panel(self, ctx)
    }

    fn pre_validate(&mut self, _ctx: &mut PanelContext<'_>) {}

    fn post_validate(&mut self, _ctx: &mut PanelContext<'_>) {}

    /// Persist collected input into the variable store.
    fn save_data(&mut self, _ctx: &mut PanelContext<'_>) {}

    /// Called when the panel becomes current; `false` vetoes the switch.
    fn activate(&mut self, _ctx: &mut PanelContext<'_>) -> bool {
        true
    }

    /// Called when the panel stops being current; `false` vetoes the switch.
    fn deactivate(&mut self, _ctx: &mut PanelContext<'_>) -> bool {
        true
    }

    /// Data written to the installation record for this panel.
    fn record_data(&self, _ctx: &PanelContext<'_>) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}

/// Standard validation sequence: refresh, pre hooks, validators, post hooks.
pub fn validate_panel<V: PanelView + ?Sized>(view: &mut V, ctx: &mut PanelContext<'_>) -> Result<bool> {
    ctx.refresh()?;
    view.pre_validate(ctx);
    if !ctx.run_validators()? {
        return Ok(false);
    }
    view.post_validate(ctx);
    Ok(true)
}

/// Commit a panel's side effects without running its validators.
///
/// Used on replay paths that skip validation; always succeeds unless the
/// refresh itself fails.
pub fn commit_without_validation<V: PanelView + ?Sized>(
    view: &mut V,
    ctx: &mut PanelContext<'_>,
) -> Result<bool> {
    ctx.refresh()?;
    view.pre_validate(ctx);
    view.post_validate(ctx);
    view.save_data(ctx);
    Ok(true)
}

/// View with no behaviour of its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainPanelView;

impl PanelView for PlainPanelView {}
