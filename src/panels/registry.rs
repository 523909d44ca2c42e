//! Panel registry
//!
//! Owns the ordered panel descriptors and their views. A view is created by the
//! [`PanelFactory`] the first time it is needed and cached for the rest of the
//! run.

use std::fmt;

use tracing::debug;

use super::{NavigationFlags, PanelContext, PanelDescriptor, PanelView, ValidatorCatalog};
use crate::environment::InstallEnvironment;
use crate::error::{InstallerError, Result};

/// Creates the view for a descriptor.
pub trait PanelFactory {
    fn create(&self, descriptor: &PanelDescriptor) -> Result<Box<dyn PanelView>>;
}

impl<F> PanelFactory for F
where
    F: Fn(&PanelDescriptor) -> Result<Box<dyn PanelView>>,
{
    fn create(&self, descriptor: &PanelDescriptor) -> Result<Box<dyn PanelView>> {
        self(descriptor)
    }
}

/// Ordered panels with lazily constructed views.
pub struct PanelRegistry {
    descriptors: Vec<PanelDescriptor>,
    views: Vec<Option<Box<dyn PanelView>>>,
    factory: Box<dyn PanelFactory>,
    validators: ValidatorCatalog,
}

impl fmt::Debug for PanelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanelRegistry")
            .field("descriptors", &self.descriptors)
            .field("validators", &self.validators)
            .finish_non_exhaustive()
    }
}

impl PanelRegistry {
    pub fn new(descriptors: Vec<PanelDescriptor>, factory: impl PanelFactory + 'static) -> Self {
        let views = descriptors.iter().map(|_| None).collect();
        Self {
            descriptors,
            views,
            factory: Box::new(factory),
            validators: ValidatorCatalog::new(),
        }
    }

    pub fn with_validators(mut self, validators: ValidatorCatalog) -> Self {
        self.validators = validators;
        self
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn descriptors(&self) -> &[PanelDescriptor] {
        &self.descriptors
    }

    pub fn descriptor(&self, index: usize) -> Option<&PanelDescriptor> {
        self.descriptors.get(index)
    }

    /// Index of the panel with id `id`.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.descriptors.iter().position(|d| d.id == id)
    }

    /// True once the view of panel `index` has been created.
    pub fn has_view(&self, index: usize) -> bool {
        self.views.get(index).is_some_and(Option::is_some)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.descriptors.len() {
            Ok(())
        } else {
            Err(InstallerError::PanelIndex {
                index,
                len: self.descriptors.len(),
            })
        }
    }

    fn ensure_view(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        if self.views[index].is_none() {
            let descriptor = &self.descriptors[index];
            debug!(
                "Creating view for panel '{}' ({})",
                descriptor.id, descriptor.class_name
            );
            self.views[index] = Some(self.factory.create(descriptor)?);
        }
        Ok(())
    }

    /// Run `f` against the view of panel `index`, creating it if needed.
    pub fn with_view<R>(
        &mut self,
        index: usize,
        env: &mut InstallEnvironment,
        navigation: &mut NavigationFlags,
        f: impl FnOnce(&mut dyn PanelView, &mut PanelContext<'_>) -> Result<R>,
    ) -> Result<R> {
        self.ensure_view(index)?;
        let descriptor = &self.descriptors[index];
        let view = self.views[index]
            .as_deref_mut()
            .ok_or_else(|| InstallerError::panel_view(&descriptor.id, "view missing after creation"))?;
        let mut ctx = PanelContext::new(descriptor, env, navigation, &self.validators);
        f(view, &mut ctx)
    }

    /// Whether panel `index` may be shown.
    ///
    /// With `visible_only` the descriptor flag must be set. Independently the
    /// view must report itself visible, the descriptor's condition (if any)
    /// must hold and the view's own `can_show` must agree.
    pub fn can_show(
        &mut self,
        index: usize,
        visible_only: bool,
        env: &InstallEnvironment,
    ) -> Result<bool> {
        self.ensure_view(index)?;
        let descriptor = &self.descriptors[index];
        let Some(view) = self.views[index].as_deref() else {
            return Ok(false);
        };

        if visible_only && !descriptor.visible {
            return Ok(false);
        }
        if !view.is_visible(descriptor) {
            return Ok(false);
        }
        if let Some(cond) = &descriptor.condition {
            if !env.is_condition_true(cond) {
                debug!("Panel '{}' hidden by condition '{}'", descriptor.id, cond);
                return Ok(false);
            }
        }
        Ok(view.can_show(descriptor, env))
    }

    /// 1-based position of panel `index` among visible panels, or `None` if
    /// that panel is not visible.
    pub fn visible_index(&self, index: usize) -> Option<usize> {
        let target = self.descriptors.get(index)?;
        if !target.visible {
            return None;
        }
        Some(
            self.descriptors[..=index]
                .iter()
                .filter(|d| d.visible)
                .count(),
        )
    }

    pub fn visible_count(&self) -> usize {
        self.descriptors.iter().filter(|d| d.visible).count()
    }

    pub(crate) fn set_visited(&mut self, index: usize, visited: bool) {
        if let Some(d) = self.descriptors.get_mut(index) {
            d.set_visited(visited);
        }
    }

    /// Forget the visited trail of every panel after `index`.
    pub(crate) fn reset_visited_after(&mut self, index: usize) {
        for d in self.descriptors.iter_mut().skip(index + 1) {
            d.set_visited(false);
        }
    }
}
