use std::fs;

use anyhow::{Context, bail};
use camino::Utf8Path;

use crate::{
    cli::CheckArgs,
    config::{Settings, load_mappings},
    error::Error,
    manifest::RawManifest,
    normalize::Mappings,
    pipeline::{CheckedManifest, Confirmations, Pipeline},
    registry::{FileStore, MemoryStore, RegistryStore},
};

pub mod allocate;
pub mod cli;
pub mod config;
pub mod crosstab;
pub mod error;
pub mod export;
pub mod gp2_id;
pub mod manifest;
pub mod normalize;
pub mod pipeline;
pub mod plate;
pub mod registry;
pub mod validate;

#[cfg(test)]
mod test_util;

pub fn initialize_logging(log_dir: Option<&Utf8Path>) {
    use tracing::Level;
    use tracing_subscriber::{filter::Targets, prelude::*};

    let log_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match log_dir {
        None => {
            let dev_log_filter = Targets::new().with_target("gp2_manifest", Level::DEBUG);
            let log_layer = log_layer.pretty().with_filter(dev_log_filter);

            tracing_subscriber::registry().with(log_layer).init();
        }
        Some(path) => {
            let log_writer = tracing_appender::rolling::daily(path, "gp2_manifest.log");
            let prod_log_filter = Targets::new().with_target("gp2_manifest", Level::INFO);
            let log_layer = log_layer
                .json()
                .with_writer(log_writer)
                .with_filter(prod_log_filter);

            tracing_subscriber::registry().with(log_layer).init();
        }
    }
}

fn run_pipeline<S: RegistryStore>(
    store: S,
    settings: Settings,
    manifest: &RawManifest,
    mappings: &Mappings,
) -> Result<CheckedManifest, Error> {
    Pipeline::new(store, settings).run(manifest, mappings)
}

/// # Errors
pub fn check_manifest(args: CheckArgs, mut settings: Settings) -> anyhow::Result<()> {
    let CheckArgs {
        manifest,
        mappings,
        site,
        format,
        output_dir,
        confirmations,
        confirm_all,
        dry_run,
    } = args;

    if let Some(site) = site {
        settings.genotyping_site = site;
    }
    if let Some(format) = format {
        settings.output_format = format;
    }
    let format = settings.output_format;

    let raw = RawManifest::from_path(&manifest).context(format!("failed to read {manifest}"))?;
    let mappings = load_mappings(&mappings)?;

    let checked = if dry_run {
        let registry = FileStore::open(&settings.registry_path)?.load()?;
        run_pipeline(MemoryStore::new(registry), settings, &raw, &mappings)?
    } else {
        let store = FileStore::open(&settings.registry_path)?;
        run_pipeline(store, settings, &raw, &mappings)?
    };

    println!("{}", serde_json::to_string_pretty(checked.report())?);

    let confirmations = if confirm_all {
        Confirmations::all()
    } else {
        confirmations.into_iter().collect()
    };
    let files = checked
        .finish(&confirmations, format, chrono::Local::now().date_naive())
        .context("manifest is not ready for export")?;

    if dry_run {
        tracing::info!(n_files = files.len(), "dry run, no export written");
        return Ok(());
    }

    fs::create_dir_all(&output_dir).context(format!("failed to create {output_dir}"))?;
    for file in files {
        let path = output_dir.join(&file.file_name);
        fs::write(&path, &file.contents).context(format!("failed to write {path}"))?;
        tracing::info!(study = %file.study, %path, "wrote export");
    }

    Ok(())
}

/// # Errors
pub fn lookup_study(study: &str, settings: &Settings) -> anyhow::Result<()> {
    let registry = FileStore::open(&settings.registry_path)?.load()?;

    let Some(entry) = registry.lookup(study) else {
        bail!("study {study} is not in the registry");
    };

    let output = serde_json::json!({
        "study": study,
        "highest_sequence": registry.highest_sequence(study),
        "samples": entry,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
