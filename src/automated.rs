//! Unattended replay
//!
//! Views that re-apply a recorded installation instead of asking the user.
//! Every panel id found in the record gets its data copied into the variable
//! store when the panel is activated. Those variables are blocked so dynamic
//! variables cannot overwrite the recorded answers.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::error::Result;
use crate::panels::{PanelContext, PanelDescriptor, PanelFactory, PanelView};
use crate::record::PanelRecord;

/// Replays the recorded data of a single panel.
#[derive(Debug, Clone, Default)]
pub struct AutomatedPanelView {
    data: BTreeMap<String, String>,
}

impl AutomatedPanelView {
    pub fn new(data: BTreeMap<String, String>) -> Self {
        Self { data }
    }
}

impl PanelView for AutomatedPanelView {
    fn activate(&mut self, ctx: &mut PanelContext<'_>) -> bool {
        let blocker = ctx.descriptor.id.clone();
        let vars = ctx.variables_mut();
        for (name, value) in &self.data {
            vars.set(name.clone(), value.clone());
            vars.block(name.clone(), blocker.clone());
        }
        debug!(
            "Replayed {} value(s) for panel '{}'",
            self.data.len(),
            blocker
        );
        true
    }

    fn record_data(&self, ctx: &PanelContext<'_>) -> BTreeMap<String, String> {
        self.data
            .keys()
            .filter_map(|name| {
                ctx.variables()
                    .get(name)
                    .map(|value| (name.clone(), value.to_string()))
            })
            .collect()
    }
}

/// Builds an [`AutomatedPanelView`] for every panel, whatever its class.
#[derive(Debug, Clone, Default)]
pub struct AutomatedPanelFactory {
    records: HashMap<String, BTreeMap<String, String>>,
}

impl AutomatedPanelFactory {
    pub fn new(records: impl IntoIterator<Item = PanelRecord>) -> Self {
        let mut by_panel: HashMap<String, BTreeMap<String, String>> = HashMap::new();
        for record in records {
            // A panel visited twice on the recorded path keeps its last answers
            by_panel
                .entry(record.panel_id)
                .or_default()
                .extend(record.data);
        }
        Self { records: by_panel }
    }
}

impl PanelFactory for AutomatedPanelFactory {
    fn create(&self, descriptor: &PanelDescriptor) -> Result<Box<dyn PanelView>> {
        let data = self.records.get(&descriptor.id).cloned().unwrap_or_default();
        Ok(Box::new(AutomatedPanelView::new(data)))
    }
}
