use clap::Parser;
use gp2_manifest::{
    check_manifest,
    cli::{Cli, Command},
    config::Settings,
    initialize_logging, lookup_study,
};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().unwrap_or_default();
    let Cli {
        settings,
        registry,
        log_dir,
        command,
    } = Cli::parse();

    initialize_logging(log_dir.as_deref());

    let mut settings = Settings::load(settings.as_deref())?;
    if let Some(registry) = registry {
        settings.registry_path = registry;
    }

    match command {
        Command::Check(args) => check_manifest(args, settings)?,
        Command::Lookup { study } => lookup_study(&study, &settings)?,
    }

    Ok(())
}
