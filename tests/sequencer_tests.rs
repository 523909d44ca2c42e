//! Tests for the Panel Sequencer
//!
//! These tests verify:
//! - Visited trail is cut back on backward jumps
//! - Hidden and conditional panels are skipped
//! - Validation gates forward moves
//! - Vetoed view switches leave the index untouched
//! - Refresh ordering and error propagation
//! - Installation records only cover the visited path

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use installwiz::error::Result;
use installwiz::{
    Condition, ConditionTable, DynamicVariableDef, DynamicVariableSet, EvaluationError,
    InstallEnvironment, InstallerError, PanelContext, PanelDescriptor, PanelRecord, PanelRegistry,
    PanelSequencer, PanelView, VariableStore, validate_panel,
};

// =============================================================================
// Scripted test views
// =============================================================================

#[derive(Debug, Clone, Default)]
struct Behaviour {
    invalid: bool,
    veto_activate: bool,
    veto_deactivate: bool,
    disable_next_on_validate: bool,
    unbuildable: bool,
}

type Behaviours = Rc<RefCell<HashMap<String, Behaviour>>>;
type CallLog = Rc<RefCell<Vec<String>>>;

struct ScriptedView {
    id: String,
    behaviours: Behaviours,
    log: CallLog,
}

impl ScriptedView {
    fn behaviour(&self) -> Behaviour {
        self.behaviours
            .borrow()
            .get(&self.id)
            .cloned()
            .unwrap_or_default()
    }

    fn note(&self, hook: &str) {
        self.log.borrow_mut().push(format!("{hook}:{}", self.id));
    }
}

impl PanelView for ScriptedView {
    fn is_valid(&mut self, ctx: &mut PanelContext<'_>) -> Result<bool> {
        let behaviour = self.behaviour();
        if behaviour.disable_next_on_validate {
            ctx.navigation.next_enabled = false;
        }
        if behaviour.invalid {
            return Ok(false);
        }
        validate_panel(self, ctx)
    }

    fn save_data(&mut self, ctx: &mut PanelContext<'_>) {
        self.note("save");
        ctx.variables_mut().set(format!("{}_SAVED", self.id), "1");
    }

    fn activate(&mut self, _ctx: &mut PanelContext<'_>) -> bool {
        self.note("activate");
        !self.behaviour().veto_activate
    }

    fn deactivate(&mut self, _ctx: &mut PanelContext<'_>) -> bool {
        self.note("deactivate");
        !self.behaviour().veto_deactivate
    }

    fn record_data(&self, ctx: &PanelContext<'_>) -> BTreeMap<String, String> {
        let mut data = BTreeMap::new();
        data.insert("panel".to_string(), ctx.descriptor.id.clone());
        data
    }
}

struct Harness {
    seq: PanelSequencer,
    behaviours: Behaviours,
    log: CallLog,
}

impl Harness {
    fn new(descriptors: Vec<PanelDescriptor>, env: InstallEnvironment) -> Self {
        let behaviours: Behaviours = Rc::default();
        let log: CallLog = Rc::default();
        let (b, l) = (Rc::clone(&behaviours), Rc::clone(&log));
        let factory = move |d: &PanelDescriptor| -> Result<Box<dyn PanelView>> {
            if b.borrow().get(&d.id).is_some_and(|x| x.unbuildable) {
                return Err(InstallerError::panel_view(&d.id, "no view for this panel"));
            }
            Ok(Box::new(ScriptedView {
                id: d.id.clone(),
                behaviours: Rc::clone(&b),
                log: Rc::clone(&l),
            }))
        };
        let seq = PanelSequencer::new(PanelRegistry::new(descriptors, factory), env);
        Self {
            seq,
            behaviours,
            log,
        }
    }

    fn plain(count: usize) -> Self {
        Self::new(panels(count), InstallEnvironment::default())
    }

    fn set(&self, id: &str, f: impl FnOnce(&mut Behaviour)) {
        f(self.behaviours.borrow_mut().entry(id.to_string()).or_default());
    }

    fn calls(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    fn visited(&self) -> Vec<bool> {
        self.seq
            .registry()
            .descriptors()
            .iter()
            .map(PanelDescriptor::is_visited)
            .collect()
    }
}

fn dynamic(def: DynamicVariableDef) -> DynamicVariableSet {
    let set = DynamicVariableSet::new();
    set.add(def);
    set
}

fn panels(count: usize) -> Vec<PanelDescriptor> {
    (0..count)
        .map(|i| PanelDescriptor::new(format!("p{i}"), "Scripted"))
        .collect()
}

// =============================================================================
// Visited Trail Tests
// =============================================================================

#[test]
fn test_backtrack_resets_visited_after_target() {
    let mut h = Harness::plain(5);
    for _ in 0..4 {
        assert!(h.seq.next(true).unwrap());
    }
    assert_eq!(h.seq.index(), Some(3));
    assert_eq!(h.visited(), vec![true, true, true, true, false]);

    assert!(h.seq.previous().unwrap());
    assert!(h.seq.previous().unwrap());
    assert_eq!(h.seq.index(), Some(1));
    assert_eq!(h.visited(), vec![true, true, false, false, false]);
}

#[test]
fn test_show_backwards_resets_trail() {
    let mut h = Harness::plain(4);
    for _ in 0..4 {
        h.seq.next(true).unwrap();
    }
    assert!(h.seq.show("p0").unwrap());
    assert_eq!(h.visited(), vec![true, false, false, false]);
}

#[test]
fn test_forward_after_backtrack_rebuilds_trail() {
    let mut h = Harness::plain(4);
    for _ in 0..3 {
        h.seq.next(true).unwrap();
    }
    h.seq.previous().unwrap();
    h.seq.previous().unwrap();
    assert!(h.seq.next(true).unwrap());
    assert_eq!(h.visited(), vec![true, true, false, false]);
}

// =============================================================================
// Skipping Tests
// =============================================================================

#[test]
fn test_next_skips_hidden_panel() {
    let mut descriptors = panels(4);
    descriptors[2] = descriptors[2].clone().hidden();
    let mut h = Harness::new(descriptors, InstallEnvironment::default());

    h.seq.next(true).unwrap();
    h.seq.next(true).unwrap();
    assert_eq!(h.seq.index(), Some(1));

    assert!(h.seq.next(true).unwrap());
    assert_eq!(h.seq.index(), Some(3));
    assert!(!h.visited()[2]);

    assert!(h.seq.previous().unwrap());
    assert_eq!(h.seq.index(), Some(1));
}

#[test]
fn test_panel_condition_follows_variables() {
    let mut descriptors = panels(3);
    descriptors[1] = descriptors[1].clone().with_condition("is_custom");
    let conditions: ConditionTable = [Condition::equals("is_custom", "TYPE", "custom")]
        .into_iter()
        .collect();
    let env = InstallEnvironment::default().with_conditions(conditions);
    let mut h = Harness::new(descriptors, env);

    h.seq.next(true).unwrap();
    assert!(h.seq.next(true).unwrap());
    assert_eq!(h.seq.index(), Some(2));

    h.seq.show("p0").unwrap();
    h.seq.env_mut().variables.set("TYPE", "custom");
    assert!(h.seq.next(true).unwrap());
    assert_eq!(h.seq.index(), Some(1));
}

#[test]
fn test_visible_index_ignores_hidden_panels() {
    let mut descriptors = panels(4);
    descriptors[1] = descriptors[1].clone().hidden();
    let h = Harness::new(descriptors, InstallEnvironment::default());

    assert_eq!(h.seq.visible_index(0), Some(1));
    assert_eq!(h.seq.visible_index(1), None);
    assert_eq!(h.seq.visible_index(3), Some(3));
    assert_eq!(h.seq.visible_panel_count(), 3);
}

// =============================================================================
// Validation Gate Tests
// =============================================================================

#[test]
fn test_invalid_panel_blocks_validated_next() {
    let mut h = Harness::plain(3);
    h.seq.next(true).unwrap();
    h.set("p0", |b| b.invalid = true);

    assert!(!h.seq.next(true).unwrap());
    assert_eq!(h.seq.index(), Some(0));

    assert!(h.seq.next(false).unwrap());
    assert_eq!(h.seq.index(), Some(1));
}

#[test]
fn test_skipping_validation_still_commits_panel() {
    let mut h = Harness::plain(2);
    h.seq.next(true).unwrap();
    h.set("p0", |b| b.invalid = true);

    assert!(h.seq.next(false).unwrap());
    assert!(h.calls().contains(&"save:p0".to_string()));
    assert_eq!(h.seq.env().variables.get("p0_SAVED"), Some("1"));
}

#[test]
fn test_validation_may_switch_next_off() {
    let mut h = Harness::plain(3);
    h.seq.next(true).unwrap();
    h.set("p0", |b| b.disable_next_on_validate = true);

    assert!(!h.seq.next(true).unwrap());
    assert_eq!(h.seq.index(), Some(0));
    assert!(!h.seq.is_next_enabled().unwrap());
}

#[test]
fn test_validated_move_saves_data_once() {
    let mut h = Harness::plain(2);
    h.seq.next(true).unwrap();
    h.seq.next(true).unwrap();

    let saves = h.calls().iter().filter(|c| *c == "save:p0").count();
    assert_eq!(saves, 1);
}

// =============================================================================
// View Switch Tests
// =============================================================================

#[test]
fn test_vetoed_activation_restores_index() {
    let mut h = Harness::plain(3);
    h.seq.next(true).unwrap();
    h.set("p1", |b| b.veto_activate = true);

    assert!(!h.seq.next(true).unwrap());
    assert_eq!(h.seq.index(), Some(0));
    assert_eq!(h.visited(), vec![true, false, false]);
    assert!(h.calls().ends_with(&["deactivate:p0".to_string(), "activate:p1".to_string()]));
}

#[test]
fn test_vetoed_switch_keeps_committed_data() {
    let mut h = Harness::plain(2);
    h.seq.next(true).unwrap();
    h.set("p1", |b| b.veto_activate = true);

    assert!(!h.seq.next(true).unwrap());
    assert_eq!(h.seq.index(), Some(0));
    assert_eq!(h.seq.env().variables.get("p0_SAVED"), Some("1"));
}

#[test]
fn test_failed_view_construction_leaves_index() {
    let mut h = Harness::plain(4);
    h.set("p3", |b| b.unbuildable = true);
    h.seq.next(true).unwrap();

    let err = h.seq.show("p3").unwrap_err();
    assert!(matches!(err, InstallerError::PanelView { ref panel, .. } if panel == "p3"));
    assert_eq!(h.seq.index(), Some(0));
    assert!(!h.visited()[3]);

    assert!(h.seq.next(true).unwrap());
    assert_eq!(h.seq.index(), Some(1));
    assert!(h.seq.previous().unwrap());
    assert_eq!(h.seq.index(), Some(0));
}

#[test]
fn test_out_of_range_switch_is_refused() {
    let mut h = Harness::plain(4);
    h.seq.next(true).unwrap();
    h.seq.next(true).unwrap();

    assert!(!h.seq.switch_to(9, false).unwrap());
    assert_eq!(h.seq.index(), Some(1));
    assert!(h.seq.previous().unwrap());
    assert_eq!(h.seq.index(), Some(0));
}

#[test]
fn test_vetoed_deactivation_never_activates_target() {
    let mut h = Harness::plain(3);
    h.seq.next(true).unwrap();
    h.set("p0", |b| b.veto_deactivate = true);

    assert!(!h.seq.next(true).unwrap());
    assert_eq!(h.seq.index(), Some(0));
    assert!(!h.calls().contains(&"activate:p1".to_string()));
}

#[test]
fn test_first_switch_has_no_deactivation() {
    let mut h = Harness::plain(2);
    h.seq.next(true).unwrap();
    assert_eq!(h.calls(), vec!["activate:p0".to_string()]);
}

// =============================================================================
// Refresh Tests
// =============================================================================

#[test]
fn test_refresh_sees_data_saved_by_previous_panel() {
    let env = InstallEnvironment::default()
        .with_dynamic_variables(dynamic(DynamicVariableDef::new("SEEN", "p0 saved ${p0_SAVED}")));
    let mut h = Harness::new(panels(2), env);

    h.seq.next(true).unwrap();
    assert_eq!(h.seq.env().variables.get("SEEN"), Some("p0 saved ${p0_SAVED}"));

    h.seq.next(true).unwrap();
    assert_eq!(h.seq.env().variables.get("SEEN"), Some("p0 saved 1"));
}

#[test]
fn test_fatal_refresh_aborts_switch() {
    let evaluator = |_: &str, _: &VariableStore| -> std::result::Result<Option<String>, EvaluationError> {
        Err(EvaluationError::fatal("disk unreadable"))
    };
    let env = InstallEnvironment::default()
        .with_evaluator(evaluator)
        .with_dynamic_variables(dynamic(DynamicVariableDef::new("X", "anything")));
    let mut h = Harness::new(panels(2), env);

    let err = h.seq.next(true).unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.to_string(), "disk unreadable");
    assert_eq!(h.seq.index(), None);
    assert!(h.calls().is_empty());
}

#[test]
fn test_wrapped_refresh_error_names_variable() {
    let evaluator = |_: &str, _: &VariableStore| -> std::result::Result<Option<String>, EvaluationError> {
        Err(anyhow::anyhow!("bad expression").into())
    };
    let env = InstallEnvironment::default()
        .with_evaluator(evaluator)
        .with_dynamic_variables(dynamic(DynamicVariableDef::new("X", "anything")));
    let mut h = Harness::new(panels(2), env);

    let err = h.seq.next(true).unwrap_err();
    assert!(matches!(err, InstallerError::Refresh(_)));
    assert!(!err.is_fatal());
    assert_eq!(err.to_string(), "failed to refresh dynamic variable X");
}

// =============================================================================
// Installation Record Tests
// =============================================================================

#[test]
fn test_record_covers_visited_panels_in_order() {
    let mut h = Harness::plain(4);
    for _ in 0..3 {
        h.seq.next(true).unwrap();
    }
    h.seq.previous().unwrap();

    let mut sink: Vec<PanelRecord> = Vec::new();
    let written = h.seq.write_record(&mut sink).unwrap();
    assert_eq!(written, 2);
    let ids: Vec<&str> = sink.iter().map(|r| r.panel_id.as_str()).collect();
    assert_eq!(ids, vec!["p0", "p1"]);
    assert_eq!(sink[1].data.get("panel").map(String::as_str), Some("p1"));
}
