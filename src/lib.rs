//! installwiz Library
//!
//! Core runtime of an installer wizard: the panel sequencing state machine and
//! the dynamic variable engine it refreshes on every navigation step.

pub mod automated;
pub mod cli;
pub mod conditions;
pub mod definition;
pub mod dynamic;
pub mod environment;
pub mod error;
pub mod panels;
pub mod record;
pub mod sequencer;
pub mod variables;

// Re-export main types for convenience
pub use automated::{AutomatedPanelFactory, AutomatedPanelView};
pub use conditions::{Condition, ConditionEvaluator, ConditionTable};
pub use definition::{InstallDefinition, ValidatorSpec};
pub use dynamic::{DynamicVariableDef, DynamicVariableSet, ExpressionEvaluator, SubstitutingEvaluator};
pub use environment::InstallEnvironment;
pub use error::{ErrorKind, EvaluationError, InstallerError, RefreshError, SubstitutionError};
pub use panels::{
    NavigationFlags, PanelContext, PanelDescriptor, PanelFactory, PanelRegistry, PanelValidator,
    PanelView, PlainPanelView, ValidationStatus, ValidatorCatalog, commit_without_validation,
    validate_panel,
};
pub use record::{JsonRecordSink, PanelRecord, RecordSink};
pub use sequencer::{PanelSequencer, SequencerState};
pub use variables::{PlaceholderSubstitutor, Substitutor, VariableStore};
