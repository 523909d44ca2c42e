//! Panel Sequencer
//!
//! The navigation state machine of the wizard. It owns the current panel
//! index, the next/previous switches and the installation environment, and
//! orchestrates variable refreshes, validation and view transitions on every
//! move.
//!
//! # Transition
//!
//! ```text
//! next(validate) / previous() / show(id)
//!     ↓
//! gate: forward moves require next to be enabled
//!     ↓
//! forward moves commit the panel being left
//!     ↓
//! refresh dynamic variables
//!     ↓
//! deactivate old view, activate new view
//!     ↓ success                      ↓ veto
//! backward jump: forget visited      restore old index
//! trail after the new index
//! mark new panel visited
//! ```
//!
//! Navigation failures (invalid panel, nothing further to show, a vetoed
//! switch) are ordinary outcomes and are reported as `Ok(false)`. Only refresh
//! and view construction failures surface as errors.

use tracing::{debug, info};

use crate::environment::InstallEnvironment;
use crate::error::Result;
use crate::panels::{
    NavigationFlags, PanelDescriptor, PanelRegistry, commit_without_validation,
};
use crate::record::{PanelRecord, RecordSink};

/// Mutable navigation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SequencerState {
    /// Current panel, `None` before the first switch
    pub index: Option<usize>,
    pub navigation: NavigationFlags,
}

/// Drives the user through the registered panels.
#[derive(Debug)]
pub struct PanelSequencer {
    registry: PanelRegistry,
    env: InstallEnvironment,
    state: SequencerState,
}

impl PanelSequencer {
    pub fn new(registry: PanelRegistry, env: InstallEnvironment) -> Self {
        Self {
            registry,
            env,
            state: SequencerState::default(),
        }
    }

    pub fn registry(&self) -> &PanelRegistry {
        &self.registry
    }

    pub fn env(&self) -> &InstallEnvironment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut InstallEnvironment {
        &mut self.env
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    /// Index of the current panel
    pub fn index(&self) -> Option<usize> {
        self.state.index
    }

    pub fn current_panel(&self) -> Option<&PanelDescriptor> {
        self.state.index.and_then(|i| self.registry.descriptor(i))
    }

    pub fn panel_index(&self, id: &str) -> Option<usize> {
        self.registry.index_of(id)
    }

    pub fn set_next_enabled(&mut self, enabled: bool) {
        self.state.navigation.next_enabled = enabled;
    }

    pub fn set_previous_enabled(&mut self, enabled: bool) {
        self.state.navigation.previous_enabled = enabled;
    }

    /// True if next is switched on and there is a panel to move to.
    pub fn is_next_enabled(&mut self) -> Result<bool> {
        Ok(self.state.navigation.next_enabled && self.has_next()?)
    }

    /// True if previous is switched on and there is a panel to move back to.
    pub fn is_previous_enabled(&mut self) -> Result<bool> {
        Ok(self.state.navigation.previous_enabled && self.has_previous()?)
    }

    pub fn has_next(&mut self) -> Result<bool> {
        Ok(self.find_next(self.next_start(), false)?.is_some())
    }

    pub fn has_previous(&mut self) -> Result<bool> {
        match self.state.index {
            Some(current) => Ok(self.find_previous(current, false)?.is_some()),
            None => Ok(false),
        }
    }

    /// True if a panel is current and no visible panel follows it.
    pub fn is_last(&mut self) -> Result<bool> {
        if self.state.index.is_none() {
            return Ok(false);
        }
        Ok(self.find_next(self.next_start(), true)?.is_none())
    }

    /// 1-based position of `panel_index` among visible panels.
    pub fn visible_index(&self, panel_index: usize) -> Option<usize> {
        self.registry.visible_index(panel_index)
    }

    pub fn visible_panel_count(&self) -> usize {
        self.registry.visible_count()
    }

    fn next_start(&self) -> usize {
        self.state.index.map_or(0, |i| i + 1)
    }

    /// First showable panel at or after `from`.
    fn find_next(&mut self, from: usize, visible_only: bool) -> Result<Option<usize>> {
        for i in from..self.registry.len() {
            if self.registry.can_show(i, visible_only, &self.env)? {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    /// Last showable panel before `before`.
    fn find_previous(&mut self, before: usize, visible_only: bool) -> Result<Option<usize>> {
        for i in (0..before).rev() {
            if self.registry.can_show(i, visible_only, &self.env)? {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    /// Move to the next showable panel.
    ///
    /// With `validate` set, an invalid current panel blocks the move.
    pub fn next(&mut self, validate: bool) -> Result<bool> {
        if validate && !self.is_valid()? {
            debug!("Current panel is not valid, staying put");
            return Ok(false);
        }
        match self.find_next(self.next_start(), false)? {
            Some(i) => self.switch_to(i, validate),
            None => {
                debug!("No further panel can be shown");
                Ok(false)
            }
        }
    }

    /// Move back to the previous showable panel.
    pub fn previous(&mut self) -> Result<bool> {
        if !self.is_previous_enabled()? {
            return Ok(false);
        }
        let Some(current) = self.state.index else {
            return Ok(false);
        };
        match self.find_previous(current, false)? {
            Some(i) => self.switch_to(i, false),
            None => Ok(false),
        }
    }

    /// Jump directly to the panel with id `id`.
    pub fn show(&mut self, id: &str) -> Result<bool> {
        match self.registry.index_of(id) {
            Some(i) => self.switch_to(i, false),
            None => {
                debug!("No panel with id '{}'", id);
                Ok(false)
            }
        }
    }

    /// Make panel `new_index` current.
    ///
    /// Returns `Ok(false)` when `new_index` is out of range, the move is gated
    /// or a view vetoes it. On `Ok(false)` and on `Err` the index is unchanged.
    ///
    /// A forward move commits the panel being left before the view hooks run,
    /// so the target panel's refresh sees its data. Those writes are not
    /// rolled back when a hook vetoes the switch.
    pub fn switch_to(&mut self, new_index: usize, validate: bool) -> Result<bool> {
        if new_index >= self.registry.len() {
            debug!(
                "No panel at index {} ({} registered)",
                new_index,
                self.registry.len()
            );
            return Ok(false);
        }
        let old = self.state.index;
        let forward = old.is_none_or(|o| new_index > o);

        // Re-checked here: validation may have switched next off
        if forward && !self.is_next_enabled()? {
            debug!("Next is disabled, not moving to panel {}", new_index);
            return Ok(false);
        }

        if forward {
            if let Some(o) = old {
                self.commit_panel(o, validate)?;
            }
        }

        self.env.refresh()?;

        self.state.index = Some(new_index);
        match self.switch_views(old, new_index) {
            Ok(true) => {}
            Ok(false) => {
                debug!("Switch to panel {} vetoed, staying at {:?}", new_index, old);
                self.state.index = old;
                return Ok(false);
            }
            Err(e) => {
                self.state.index = old;
                return Err(e);
            }
        }

        if old.is_some_and(|o| new_index < o) {
            self.registry.reset_visited_after(new_index);
        }
        self.registry.set_visited(new_index, true);

        if let Some(d) = self.registry.descriptor(new_index) {
            info!(
                "Showing panel '{}' ({}/{})",
                d.id,
                new_index + 1,
                self.registry.len()
            );
        }
        Ok(true)
    }

    /// Persist the panel being left on a forward move.
    fn commit_panel(&mut self, index: usize, validated: bool) -> Result<()> {
        if validated {
            self.registry
                .with_view(index, &mut self.env, &mut self.state.navigation, |view, ctx| {
                    view.save_data(ctx);
                    Ok(())
                })
        } else {
            self.execute_validation_actions(index, false).map(|_| ())
        }
    }

    fn switch_views(&mut self, old: Option<usize>, new_index: usize) -> Result<bool> {
        let nav = &mut self.state.navigation;
        if let Some(o) = old {
            let left = self
                .registry
                .with_view(o, &mut self.env, nav, |view, ctx| Ok(view.deactivate(ctx)))?;
            if !left {
                return Ok(false);
            }
        }
        self.registry
            .with_view(new_index, &mut self.env, nav, |view, ctx| Ok(view.activate(ctx)))
    }

    /// True if no panel is current or the current panel validates.
    pub fn is_valid(&mut self) -> Result<bool> {
        match self.state.index {
            Some(i) => self.execute_validation_actions(i, true),
            None => Ok(true),
        }
    }

    /// Run the validation sequence of panel `index`.
    ///
    /// With `validate` the view's own `is_valid` decides. Without it the hooks
    /// run, data is saved and the result is always `true`.
    pub fn execute_validation_actions(&mut self, index: usize, validate: bool) -> Result<bool> {
        self.registry
            .with_view(index, &mut self.env, &mut self.state.navigation, |view, ctx| {
                if validate {
                    view.is_valid(ctx)
                } else {
                    commit_without_validation(view, ctx)
                }
            })
    }

    /// Ordered records of every visited panel.
    pub fn installation_record(&mut self) -> Result<Vec<PanelRecord>> {
        let visited: Vec<usize> = self
            .registry
            .descriptors()
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_visited())
            .map(|(i, _)| i)
            .collect();

        let mut records = Vec::with_capacity(visited.len());
        for i in visited {
            let record = self.registry.with_view(
                i,
                &mut self.env,
                &mut self.state.navigation,
                |view, ctx| Ok(PanelRecord::new(&ctx.descriptor.id, view.record_data(ctx))),
            )?;
            records.push(record);
        }
        Ok(records)
    }

    /// Emit the installation record to `sink`, returning the number of panels written.
    pub fn write_record(&mut self, sink: &mut dyn RecordSink) -> Result<usize> {
        let records = self.installation_record()?;
        for record in &records {
            sink.write_panel(record)?;
        }
        sink.finish()?;
        Ok(records.len())
    }
}
