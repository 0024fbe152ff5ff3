use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Update machine image references to the latest available versions.
///
/// `amibump` replaces image ids (`ami-xxxx`) in configuration files with the
/// latest versions available from AWS, assuming roles in the specified
/// accounts and discovering images that match configured name patterns.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Update AMI references in configuration files to the latest versions",
    long_about = "amibump - Replace stale AMI ids in configuration files with the latest
available versions from AWS.

The tool queries the specified accounts and regions for images matching
name patterns (or the exact ids referenced by a single target file),
computes which references are superseded, and rewrites them in place with
a .backup sibling saved next to every modified file.

Configuration sources, in order of precedence:
  1. Command line flags
  2. Environment variables (AMI_* prefix)
  3. Configuration file (amibump.yaml, amibump.yml, or amibump.toml in
     ., ~/.amibump, or /etc/amibump)
  4. Default values

QUICK EXAMPLES:
  amibump update --account-ids 137112412989 -f config.yaml
  amibump update --account-ids 137112412989 -f infra/ --patterns 'my-app-*'
  amibump extract config.yaml                # List ids a file references
  amibump undo -d infra/                     # Restore from backups

For detailed help on any command, use: amibump <command> --help"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

/// Flags for the `update` command.
///
/// Every flag can also come from an `AMI_*` environment variable; values
/// absent from both fall back to the configuration file and then to
/// built-in defaults.
#[derive(clap::Args, Debug, Default)]
pub struct UpdateArgs {
    /// Comma-separated list of AWS account IDs to search.
    #[arg(long = "account-ids", env = "AMI_ACCOUNTS", value_delimiter = ',')]
    pub account_ids: Vec<String>,

    /// The file or directory whose image references should be updated.
    #[arg(short, long, env = "AMI_FILE")]
    pub file: Option<PathBuf>,

    /// AWS profile to use for authentication.
    #[arg(long, env = "AMI_PROFILE")]
    pub profile: Option<String>,

    /// Comma-separated list of regions to search. Defaults to the region
    /// configured in the AWS profile.
    #[arg(long, env = "AMI_REGIONS", value_delimiter = ',')]
    pub regions: Vec<String>,

    /// Role ARN to assume (overrides the AWS_ROLE_ARN environment variable).
    #[arg(long = "role-arn", env = "AMI_ROLE_ARN")]
    pub role_arn: Option<String>,

    /// Comma-separated list of image name patterns to search for.
    #[arg(long, env = "AMI_PATTERNS", value_delimiter = ',')]
    pub patterns: Vec<String>,

    /// Enable verbose output.
    #[arg(short, long, env = "AMI_VERBOSE")]
    pub verbose: bool,
}

/// Output formats for the `extract` command.
#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum ExtractFormat {
    /// One id per line.
    Text,
    /// A JSON array of ids.
    Json,
}

/// The set of available commands for the `amibump` CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve the latest images and rewrite references in the target
    ///
    /// EXAMPLES:
    ///   amibump update --account-ids 137112412989 -f config.yaml
    ///   amibump update --account-ids 137112412989 -f infra/ --patterns 'al2023-ami-*'
    ///   AMI_ACCOUNTS=137112412989 amibump update -f config.yaml
    ///
    /// When the target is a single file, the ids it references are
    /// discovered automatically; when it is a directory, the configured
    /// name patterns drive the search.
    Update(UpdateArgs),

    /// List the image ids referenced by a file
    ///
    /// EXAMPLES:
    ///   amibump extract config.yaml
    ///   amibump extract -f json config.yaml
    Extract {
        /// The file to scan for image ids.
        file: PathBuf,

        /// The output format.
        #[arg(short, long, value_enum, default_value_t = ExtractFormat::Text)]
        format: ExtractFormat,
    },

    /// Write a sample configuration file
    ///
    /// EXAMPLES:
    ///   amibump init                  # Creates amibump.yaml
    ///   amibump init custom.toml      # Creates custom.toml
    Init {
        /// Where to write the sample configuration (YAML or TOML by
        /// extension).
        filename: Option<PathBuf>,
    },

    /// Restore files from their .backup siblings
    ///
    /// EXAMPLES:
    ///   amibump undo -d .                    # Restore all files
    ///   amibump undo -d infra/ --keep-backups
    Undo {
        /// The directory where the update was run.
        #[arg(short, long, required = true)]
        dir: PathBuf,

        /// Keep the backup files after restoring the originals.
        #[arg(long)]
        keep_backups: bool,
    },
}

/// Parses command-line arguments and returns the populated `Args` struct.
pub fn parse_args() -> Args {
    Args::parse()
}
