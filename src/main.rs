//! installwiz - command line entry point
//!
//! Validates install definitions, lists their panels and runs them unattended,
//! replaying a previous installation record when one is given.

use std::fs::File;
use std::io::{BufWriter, stdout};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use installwiz::cli::{Cli, Commands};
use installwiz::record::{JsonRecordSink, load_records};
use installwiz::{
    AutomatedPanelFactory, InstallDefinition, PanelDescriptor, PanelSequencer, PanelView,
    PlainPanelView,
};

/// Initialize logging on stderr; `RUST_LOG` overrides the default level
fn init_logger() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_logger();
    let cli = Cli::parse_args();
    debug!("CLI arguments parsed");

    let result = match cli.command {
        Commands::Validate { definition } => validate_definition(&definition),
        Commands::Panels { definition } => list_panels(&definition),
        Commands::Run {
            definition,
            replay,
            record,
            skip_validation,
        } => run_definition(
            &definition,
            replay.as_deref(),
            record.as_deref(),
            !skip_validation,
        ),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn validate_definition(path: &Path) -> Result<()> {
    info!("Validating definition file: {:?}", path);
    let definition = InstallDefinition::load_from_file(path)?;
    definition.validate()?;
    println!(
        "✓ Definition is valid: {} panel(s), {} dynamic variable(s)",
        definition.panels.len(),
        definition.dynamic_variables.len()
    );
    Ok(())
}

fn list_panels(path: &Path) -> Result<()> {
    let definition = InstallDefinition::load_from_file(path)?;
    let plain = |_: &PanelDescriptor| -> installwiz::error::Result<Box<dyn PanelView>> {
        Ok(Box::new(PlainPanelView))
    };
    let sequencer = definition.build_sequencer(plain)?;

    let registry = sequencer.registry();
    for (i, panel) in registry.descriptors().iter().enumerate() {
        let step = registry
            .visible_index(i)
            .map_or_else(|| "-".to_string(), |n| n.to_string());
        let condition = panel.condition.as_deref().unwrap_or("");
        println!(
            "{:>3}  step {:>2}  {:<20} {:<24} {}",
            i, step, panel.id, panel.class_name, condition
        );
    }
    Ok(())
}

fn run_definition(
    path: &Path,
    replay: Option<&Path>,
    record: Option<&Path>,
    validate: bool,
) -> Result<()> {
    let definition = InstallDefinition::load_from_file(path)?;
    let records = match replay {
        Some(replay) => load_records(replay)
            .with_context(|| format!("Failed to load installation record {:?}", replay))?,
        None => Vec::new(),
    };
    info!(
        "Running {:?} unattended ({} recorded panel(s))",
        path,
        records.len()
    );

    let mut sequencer = definition.build_sequencer(AutomatedPanelFactory::new(records))?;
    while sequencer.next(validate)? {}

    let stopped_early = sequencer.has_next()?;
    if stopped_early || (validate && !sequencer.is_valid()?) {
        let panel = sequencer
            .current_panel()
            .map_or_else(|| "<none>".to_string(), |p| p.id.clone());
        anyhow::bail!("Installation stopped at panel '{}': panel data is not valid", panel);
    }
    if sequencer.index().is_none() {
        warn!("No panel could be shown");
    }

    write_record(&mut sequencer, record)
}

fn write_record(sequencer: &mut PanelSequencer, path: Option<&Path>) -> Result<()> {
    let written = match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create record file {:?}", path))?;
            sequencer.write_record(&mut JsonRecordSink::new(BufWriter::new(file)))?
        }
        None => sequencer.write_record(&mut JsonRecordSink::new(stdout().lock()))?,
    };
    info!("Installation record written ({} panel(s))", written);
    Ok(())
}
