//! Command-line argument definitions for the tgis tool
//!
//! This module defines the complete CLI interface using the clap derive API.
//! Options shared by every subcommand (database, mapset, verbosity, output
//! format) are declared once on [`Args`] and marked global.

use crate::app::models::{DatasetKind, RelativeUnit, SemanticType, TemporalType};
use crate::app::services::sampling::MethodSet;
use crate::constants::DEFAULT_SEPARATOR;
use crate::{Error, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;

/// CLI arguments for the temporal GIS tool
///
/// Manages space-time datasets of time-stamped maps and evaluates temporal
/// map algebra over them.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "tgis",
    version,
    about = "Manage space-time datasets and evaluate temporal map algebra",
    long_about = "Registers time-stamped raster, 3D raster and vector maps in space-time datasets, \
                  analyses their temporal topology and granularity, samples datasets onto shared \
                  time slots and evaluates map algebra statements such as 'D = A[-1] + A[1]', \
                  running one backend computation per time slot."
)]
pub struct Args {
    /// Metadata database file
    ///
    /// Overrides the configured database path and the TGIS_DATABASE variable.
    #[arg(
        long = "database",
        value_name = "FILE",
        global = true,
        help = "Metadata database file"
    )]
    pub database: Option<PathBuf>,

    /// Current mapset used to qualify unqualified names
    #[arg(
        long = "mapset",
        value_name = "NAME",
        global = true,
        help = "Current mapset for unqualified names"
    )]
    pub mapset: Option<String>,

    /// Path to configuration file
    ///
    /// TOML configuration file. If not specified, looks for
    /// <config dir>/tgis/config.toml
    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        global = true,
        help = "Path to configuration file (TOML format)"
    )]
    pub config_file: Option<PathBuf>,

    /// Logging verbosity level
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        global = true,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Suppress output (quiet mode)
    ///
    /// Only show errors. Overrides verbose settings and hides progress bars.
    #[arg(
        short = 'q',
        long = "quiet",
        global = true,
        help = "Suppress output except errors",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    /// Output format for results
    #[arg(
        long = "format",
        value_enum,
        default_value = "human",
        global = true,
        help = "Output format for results"
    )]
    pub output_format: OutputFormat,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Create a space-time dataset
    Create(CreateArgs),
    /// Register time-stamped maps in a dataset
    Register(RegisterArgs),
    /// Remove maps from a dataset
    Unregister(UnregisterArgs),
    /// Remove a dataset and detach its maps
    Remove(RemoveArgs),
    /// List datasets, or the maps of one dataset
    List(ListArgs),
    /// Show dataset metadata
    Info(InfoArgs),
    /// Show temporal relations between the maps of two datasets
    Topology(TopologyArgs),
    /// Compute the temporal granularity of datasets
    Granularity(GranularityArgs),
    /// Sample datasets onto common time slots
    Sample(SampleArgs),
    /// Evaluate a temporal map algebra statement
    Algebra(AlgebraArgs),
}

/// Arguments for the create command
#[derive(Debug, Clone, Parser)]
pub struct CreateArgs {
    /// Name of the new dataset
    #[arg(value_name = "DATASET")]
    pub dataset: String,

    /// Dataset kind
    #[arg(
        short = 't',
        long = "type",
        value_name = "KIND",
        default_value = "strds",
        help = "Dataset kind (strds, stvds, str3ds)"
    )]
    pub kind: DatasetKind,

    /// Temporal type of the time stamps
    #[arg(
        long = "temporal-type",
        value_name = "TYPE",
        default_value = "absolute",
        help = "Temporal type (absolute, relative)"
    )]
    pub temporal_type: TemporalType,

    /// Unit of relative time stamps
    #[arg(
        long = "unit",
        value_name = "UNIT",
        help = "Relative time unit (years, months, days, hours, minutes, seconds)"
    )]
    pub unit: Option<RelativeUnit>,

    /// Dataset title
    #[arg(long = "title", default_value = "", help = "Dataset title")]
    pub title: String,

    /// Dataset description
    #[arg(long = "description", default_value = "", help = "Dataset description")]
    pub description: String,

    /// Semantic type of the values
    #[arg(
        long = "semantic-type",
        value_name = "TYPE",
        default_value = "mean",
        help = "Semantic type of the values (mean, min, max, sum)"
    )]
    pub semantic_type: SemanticType,

    /// Replace an existing dataset of the same name
    #[arg(long = "overwrite", help = "Replace an existing dataset")]
    pub overwrite: bool,
}

/// Arguments for the register command
#[derive(Debug, Clone, Parser)]
pub struct RegisterArgs {
    /// Dataset to register the maps in
    #[arg(value_name = "DATASET")]
    pub dataset: String,

    /// Maps to register (comma-separated list)
    #[arg(
        long = "maps",
        value_name = "LIST",
        help = "Comma-separated list of maps",
        required_unless_present = "file",
        conflicts_with = "file"
    )]
    pub maps: Option<NameList>,

    /// File with one map per line: name[SEP start[SEP end]]
    #[arg(
        long = "file",
        value_name = "FILE",
        help = "File with one map per line: name[|start[|end]]"
    )]
    pub file: Option<PathBuf>,

    /// Column separator of the map file
    #[arg(
        long = "separator",
        value_name = "SEP",
        default_value = DEFAULT_SEPARATOR,
        help = "Column separator of the map file"
    )]
    pub separator: String,

    /// Start time of the first map
    ///
    /// Maps without their own time stamps are stamped sequentially from here.
    #[arg(
        long = "start",
        value_name = "TIME",
        help = "Start time of the first map"
    )]
    pub start: Option<String>,

    /// Time between consecutive map starts
    #[arg(
        long = "increment",
        value_name = "STEP",
        requires = "start",
        help = "Increment between map starts, e.g. '1 month' or '5'"
    )]
    pub increment: Option<String>,

    /// Stamp intervals ending at the next map's start instead of time points
    #[arg(
        short = 'i',
        long = "interval",
        requires = "increment",
        help = "Create time intervals instead of time points"
    )]
    pub interval: bool,
}

/// Arguments for the unregister command
#[derive(Debug, Clone, Parser)]
pub struct UnregisterArgs {
    /// Dataset owning the maps
    #[arg(value_name = "DATASET")]
    pub dataset: String,

    /// Maps to remove (comma-separated list)
    #[arg(long = "maps", value_name = "LIST", help = "Comma-separated list of maps")]
    pub maps: NameList,
}

/// Arguments for the remove command
#[derive(Debug, Clone, Parser)]
pub struct RemoveArgs {
    /// Datasets to remove
    #[arg(value_name = "DATASET", required = true)]
    pub datasets: Vec<String>,
}

/// Arguments for the list command
#[derive(Debug, Clone, Parser)]
pub struct ListArgs {
    /// Dataset whose maps to list; lists datasets when omitted
    #[arg(value_name = "DATASET")]
    pub dataset: Option<String>,

    /// Only list datasets of this kind
    #[arg(
        short = 't',
        long = "type",
        value_name = "KIND",
        help = "Only list datasets of this kind"
    )]
    pub kind: Option<DatasetKind>,

    /// Map filter, e.g. "start_time >= '2001-01-01' AND name LIKE 'a%'"
    #[arg(
        short = 'w',
        long = "where",
        value_name = "CONDITION",
        requires = "dataset",
        help = "Filter on map columns"
    )]
    pub filter: Option<String>,

    /// Column separator for csv output
    #[arg(
        long = "separator",
        value_name = "SEP",
        default_value = DEFAULT_SEPARATOR,
        help = "Column separator for csv output"
    )]
    pub separator: String,
}

/// Arguments for the info command
#[derive(Debug, Clone, Parser)]
pub struct InfoArgs {
    /// Dataset to describe
    #[arg(value_name = "DATASET")]
    pub dataset: String,
}

/// Arguments for the topology command
#[derive(Debug, Clone, Parser)]
pub struct TopologyArgs {
    /// First dataset
    #[arg(value_name = "DATASET")]
    pub dataset: String,

    /// Second dataset; the first dataset is related to itself when omitted
    #[arg(value_name = "OTHER")]
    pub other: Option<String>,

    /// Include strictly separated pairs (precedes/follows)
    #[arg(
        short = 'a',
        long = "all",
        help = "Include pairs that precede or follow each other"
    )]
    pub all: bool,

    /// Map filter applied to both datasets
    #[arg(short = 'w', long = "where", value_name = "CONDITION")]
    pub filter: Option<String>,
}

/// Arguments for the granularity command
#[derive(Debug, Clone, Parser)]
pub struct GranularityArgs {
    /// Datasets to analyse; several are combined into one granularity
    #[arg(value_name = "DATASET", required = true)]
    pub datasets: Vec<String>,
}

/// Arguments for the sample command
#[derive(Debug, Clone, Parser)]
pub struct SampleArgs {
    /// Datasets to sample (comma-separated list)
    #[arg(long = "inputs", value_name = "LIST", help = "Comma-separated list of datasets")]
    pub inputs: NameList,

    /// Dataset whose maps define the slots
    ///
    /// Without a sampler the slots are a regular grid of the common granularity.
    #[arg(
        long = "sampler",
        value_name = "DATASET",
        help = "Dataset whose maps define the time slots"
    )]
    pub sampler: Option<String>,

    /// Sampling methods (comma-separated list)
    #[arg(
        short = 'm',
        long = "method",
        value_name = "LIST",
        default_value = "equal",
        help = "Sampling methods: equal, during, contains, overlap, starts, finishes, precedes, follows"
    )]
    pub method: MethodSet,

    /// Map filter applied to every dataset
    #[arg(short = 'w', long = "where", value_name = "CONDITION")]
    pub filter: Option<String>,

    /// Grid granularity, e.g. '1 month' or '5'
    #[arg(
        long = "granularity",
        value_name = "STEP",
        conflicts_with = "sampler",
        help = "Slot granularity (computed when omitted)"
    )]
    pub granularity: Option<String>,

    /// Keep slots in which a dataset has no map
    #[arg(short = 'n', long = "register-null", help = "Keep slots with missing maps")]
    pub register_null: bool,

    /// Column separator of the slot lines
    #[arg(
        long = "separator",
        value_name = "SEP",
        default_value = DEFAULT_SEPARATOR,
        help = "Column separator of the slot lines"
    )]
    pub separator: String,
}

/// Arguments for the algebra command
#[derive(Debug, Clone, Parser)]
pub struct AlgebraArgs {
    /// Statement of the form `output = expression`
    #[arg(
        short = 'e',
        long = "expression",
        value_name = "STATEMENT",
        help = "Algebra statement, e.g. 'D = A[-1] + A[1]'"
    )]
    pub expression: String,

    /// Base name of the result maps, suffixed with the slot index
    #[arg(
        short = 'b',
        long = "basename",
        value_name = "NAME",
        help = "Base name of the result maps"
    )]
    pub basename: String,

    /// Number of concurrent backend computations
    #[arg(
        short = 'j',
        long = "nprocs",
        value_name = "COUNT",
        help = "Number of concurrent backend computations"
    )]
    pub nprocs: Option<usize>,

    /// Sampling methods used to assign maps to slots
    #[arg(
        short = 'm',
        long = "method",
        value_name = "LIST",
        default_value = "equal",
        help = "Sampling methods used to assign maps to slots"
    )]
    pub method: MethodSet,

    /// Substitute null() for missing operands instead of skipping the slot
    #[arg(short = 'n', long = "register-null", help = "Register null maps for missing operands")]
    pub register_null: bool,

    /// Skip slots whose operand maps do not overlap in space
    #[arg(short = 's', long = "spatial", help = "Require spatially overlapping operands")]
    pub spatial: bool,

    /// Plan and report without running the backend or writing metadata
    #[arg(long = "dry-run", help = "Show what would be computed")]
    pub dry_run: bool,

    /// Continue past failed slots and register the successful ones
    #[arg(long = "skip-failures", help = "Continue after failed slots")]
    pub skip_failures: bool,

    /// Replace an existing output dataset and its maps
    #[arg(long = "overwrite", help = "Replace an existing output dataset")]
    pub overwrite: bool,

    /// Slot granularity, e.g. '1 month' or '5'
    #[arg(
        long = "granularity",
        value_name = "STEP",
        help = "Slot granularity (computed when omitted)"
    )]
    pub granularity: Option<String>,
}

/// Output format options for machine-readable results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON format for scripting
    Json,
    /// Delimited text for data analysis
    Csv,
}

/// Wrapper for parsing comma-separated name lists
#[derive(Debug, Clone, PartialEq)]
pub struct NameList {
    pub names: Vec<String>,
}

impl FromStr for NameList {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let names: Vec<String> = s
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if names.is_empty() {
            return Err(Error::invalid_value("Name list cannot be empty"));
        }

        if let Some(bad) = names.iter().find(|name| name.contains(char::is_whitespace)) {
            return Err(Error::invalid_value(format!(
                "Invalid name '{}': names cannot contain whitespace",
                bad
            )));
        }

        Ok(NameList { names })
    }
}

impl Args {
    /// Determine the appropriate log level based on verbosity flags
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }

    /// Progress bars only for interactive, human-readable runs
    pub fn show_progress(&self) -> bool {
        !self.quiet && self.output_format == OutputFormat::Human
    }

    /// Validate options that clap cannot check on its own
    pub fn validate(&self) -> Result<()> {
        if let Some(config_file) = &self.config_file {
            if !config_file.exists() {
                return Err(Error::configuration(format!(
                    "Config file does not exist: {}",
                    config_file.display()
                )));
            }
        }

        if let Some(mapset) = &self.mapset {
            if mapset.trim().is_empty() || mapset.contains('@') {
                return Err(Error::configuration(format!("Invalid mapset '{}'", mapset)));
            }
        }

        match &self.command {
            Some(Commands::Algebra(algebra)) => algebra.validate(),
            Some(Commands::Register(register)) => register.validate(),
            _ => Ok(()),
        }
    }
}

impl AlgebraArgs {
    pub fn validate(&self) -> Result<()> {
        if self.nprocs == Some(0) {
            return Err(Error::configuration(
                "Number of processes must be greater than 0",
            ));
        }
        if self.expression.trim().is_empty() {
            return Err(Error::configuration("Expression must not be empty"));
        }
        Ok(())
    }
}

impl RegisterArgs {
    pub fn validate(&self) -> Result<()> {
        if let Some(file) = &self.file {
            if !file.exists() {
                return Err(Error::configuration(format!(
                    "Map file does not exist: {}",
                    file.display()
                )));
            }
        }
        if self.separator.is_empty() {
            return Err(Error::configuration("Separator must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::services::sampling::SamplingMethod;
    use clap::CommandFactory;
    use tempfile::TempDir;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_name_list_parsing() {
        let result = NameList::from_str("a1,a2").unwrap();
        assert_eq!(result.names, vec!["a1", "a2"]);

        let result = NameList::from_str(" a1 , a2@other ").unwrap();
        assert_eq!(result.names, vec!["a1", "a2@other"]);

        assert!(NameList::from_str("").is_err());
        assert!(NameList::from_str(",,,").is_err());
        assert!(NameList::from_str("a b").is_err());
    }

    #[test]
    fn test_algebra_arguments() {
        let args = parse(&[
            "tgis",
            "--mapset",
            "user1",
            "algebra",
            "-e",
            "D = A[-1] + A[1]",
            "-b",
            "d",
            "-j",
            "4",
            "-m",
            "during,overlap",
            "-n",
            "-s",
            "--dry-run",
        ]);
        assert_eq!(args.mapset.as_deref(), Some("user1"));
        match args.command {
            Some(Commands::Algebra(algebra)) => {
                assert_eq!(algebra.expression, "D = A[-1] + A[1]");
                assert_eq!(algebra.basename, "d");
                assert_eq!(algebra.nprocs, Some(4));
                assert!(algebra.method.accepts(crate::app::services::topology::Relation::Overlaps));
                assert!(algebra.register_null);
                assert!(algebra.spatial);
                assert!(algebra.dry_run);
                assert!(!algebra.overwrite);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let args = parse(&["tgis", "list", "--format", "json", "-vv"]);
        assert_eq!(args.output_format, OutputFormat::Json);
        assert_eq!(args.verbose, 2);
        assert!(!args.show_progress());
    }

    #[test]
    fn test_register_requires_maps_or_file() {
        assert!(Args::try_parse_from(["tgis", "register", "A"]).is_err());
        assert!(Args::try_parse_from(["tgis", "register", "A", "--increment", "1 day"]).is_err());

        let args = parse(&[
            "tgis",
            "register",
            "A",
            "--maps",
            "a1,a2",
            "--start",
            "2001-01-01",
            "--increment",
            "1 month",
            "-i",
        ]);
        match args.command {
            Some(Commands::Register(register)) => {
                assert_eq!(register.maps.unwrap().names, vec!["a1", "a2"]);
                assert!(register.interval);
                assert_eq!(register.separator, "|");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_sample_method_parsing() {
        let args = parse(&["tgis", "sample", "--inputs", "A,B", "-m", "contains"]);
        match args.command {
            Some(Commands::Sample(sample)) => {
                assert_eq!(sample.inputs.names, vec!["A", "B"]);
                assert_eq!(sample.method, MethodSet::single(SamplingMethod::Contains));
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Args::try_parse_from(["tgis", "sample", "--inputs", "A", "-m", "nearby"]).is_err());
    }

    #[test]
    fn test_validation() {
        let args = parse(&["tgis", "algebra", "-e", "D = A", "-b", "d", "-j", "0"]);
        assert!(args.validate().is_err());

        let args = parse(&["tgis", "algebra", "-e", "D = A", "-b", "d"]);
        assert!(args.validate().is_ok());

        let args = parse(&["tgis", "--mapset", "a@b", "list"]);
        assert!(args.validate().is_err());

        let args = parse(&["tgis", "--config", "/nonexistent/tgis.toml", "list"]);
        assert!(args.validate().is_err());

        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("maps.txt");
        let args = Args::try_parse_from([
            "tgis",
            "register",
            "A",
            "--file",
            missing.to_str().unwrap(),
        ])
        .unwrap();
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = parse(&["tgis", "list"]);

        // Default level
        assert_eq!(args.get_log_level(), "warn");

        args.verbose = 1;
        assert_eq!(args.get_log_level(), "info");

        args.verbose = 2;
        assert_eq!(args.get_log_level(), "debug");

        args.verbose = 3;
        assert_eq!(args.get_log_level(), "trace");

        // Quiet mode
        args.quiet = true;
        assert_eq!(args.get_log_level(), "error");
        assert!(!args.show_progress());
    }
}
