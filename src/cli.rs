use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// installwiz - drive an installer definition through its panels
#[derive(Parser)]
#[command(name = "installwiz")]
#[command(about = "Panel sequencing and dynamic variable runtime for installer wizards")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate an install definition file
    Validate {
        /// Path to the definition file
        definition: PathBuf,
    },
    /// List the panels of a definition with their visible step numbers
    Panels {
        /// Path to the definition file
        definition: PathBuf,
    },
    /// Run a definition unattended and emit its installation record
    Run {
        /// Path to the definition file
        definition: PathBuf,

        /// Installation record to replay panel data from
        #[arg(short, long)]
        replay: Option<PathBuf>,

        /// Write the installation record here instead of stdout
        #[arg(long)]
        record: Option<PathBuf>,

        /// Move forward without running panel validators
        #[arg(long)]
        skip_validation: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_requires_a_command() {
        assert!(Cli::try_parse_from(["installwiz"]).is_err());
    }

    #[test]
    fn test_cli_validate() {
        let cli = Cli::try_parse_from(["installwiz", "validate", "setup.json"]).unwrap();
        match cli.command {
            Commands::Validate { definition } => {
                assert_eq!(definition, PathBuf::from("setup.json"));
            }
            _ => panic!("Expected Validate command"),
        }
    }

    #[test]
    fn test_cli_run_with_replay() {
        let cli = Cli::try_parse_from([
            "installwiz",
            "run",
            "setup.json",
            "--replay",
            "previous.json",
            "--record",
            "out.json",
            "--skip-validation",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                definition,
                replay,
                record,
                skip_validation,
            } => {
                assert_eq!(definition, PathBuf::from("setup.json"));
                assert_eq!(replay, Some(PathBuf::from("previous.json")));
                assert_eq!(record, Some(PathBuf::from("out.json")));
                assert!(skip_validation);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_run_defaults() {
        let cli = Cli::try_parse_from(["installwiz", "run", "setup.json"]).unwrap();
        match cli.command {
            Commands::Run {
                replay,
                record,
                skip_validation,
                ..
            } => {
                assert!(replay.is_none());
                assert!(record.is_none());
                assert!(!skip_validation);
            }
            _ => panic!("Expected Run command"),
        }
    }
}
