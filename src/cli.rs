use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

use crate::{export::OutputFormat, manifest::GenotypingSite, pipeline::ConfirmationStep};

#[derive(Parser, Debug)]
#[command(version, about = "Check GP2 sample manifests and allocate GP2 sample IDs")]
pub struct Cli {
    /// TOML settings file, layered under `GP2_*` environment variables
    #[arg(long, env = "GP2_MANIFEST_SETTINGS", global = true)]
    pub settings: Option<Utf8PathBuf>,
    /// Overrides the registry path from the settings
    #[arg(long, env = "GP2_MANIFEST_REGISTRY", global = true)]
    pub registry: Option<Utf8PathBuf>,
    #[arg(long, env = "GP2_MANIFEST_LOG_DIR", global = true)]
    pub log_dir: Option<Utf8PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check a manifest, allocate IDs and export the enriched manifest per study
    Check(CheckArgs),
    /// Print the registered GP2 sample IDs of a study
    Lookup { study: String },
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// A .csv, .tsv or .txt manifest
    pub manifest: Utf8PathBuf,
    /// Category mappings, .toml or .json
    #[arg(long)]
    pub mappings: Utf8PathBuf,
    #[arg(long, value_enum)]
    pub site: Option<GenotypingSite>,
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
    #[arg(long, default_value = ".")]
    pub output_dir: Utf8PathBuf,
    /// Mappings the submitter has reviewed
    #[arg(long = "confirm", value_enum, value_delimiter = ',')]
    pub confirmations: Vec<ConfirmationStep>,
    #[arg(long, conflicts_with = "confirmations")]
    pub confirm_all: bool,
    /// Run every check without touching the registry or writing exports
    #[arg(long)]
    pub dry_run: bool,
}
