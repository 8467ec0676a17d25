use std::fs;

use anyhow::{Context, bail};
use camino::{Utf8Path, Utf8PathBuf};
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::{
    error::Result, export::OutputFormat, manifest::GenotypingSite, normalize::Mappings,
    plate::PLATE_CAPACITY,
};

pub const ENV_PREFIX: &str = "GP2";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Settings {
    #[garde(skip)]
    pub registry_path: Utf8PathBuf,
    #[garde(skip)]
    pub genotyping_site: GenotypingSite,
    #[garde(skip)]
    pub output_format: OutputFormat,
    #[garde(range(min = 1))]
    pub plate_capacity: usize,
    #[garde(range(min = 0.0, max = 1.0))]
    pub other_sex_warning_fraction: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            registry_path: Utf8PathBuf::from("gp2_id_registry.json"),
            genotyping_site: GenotypingSite::default(),
            output_format: OutputFormat::default(),
            plate_capacity: PLATE_CAPACITY,
            other_sex_warning_fraction: 0.1,
        }
    }
}

impl Settings {
    /// Layers the defaults, then the TOML file at `path` if given, then `GP2_*` environment
    /// variables.
    ///
    /// # Errors
    /// [`crate::error::Error::Config`] if a source cannot be read or the result is out of range.
    pub fn load(path: Option<&Utf8Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(::config::File::new(
                path.as_str(),
                ::config::FileFormat::Toml,
            ));
        }

        let settings: Self = builder
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        settings.validate()?;

        Ok(settings)
    }
}

/// Reads category mappings from a `.toml` or `.json` file.
///
/// # Errors
pub fn load_mappings(path: &Utf8Path) -> anyhow::Result<Mappings> {
    let contents =
        fs::read_to_string(path).context(format!("failed to read mappings file {path}"))?;

    let mappings = match path.extension() {
        Some("toml") => toml::from_str(&contents).context(format!("failed to parse {path}"))?,
        Some("json") => {
            serde_json::from_str(&contents).context(format!("failed to parse {path}"))?
        }
        _ => bail!("mappings file {path} must be .toml or .json"),
    };

    Ok(mappings)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    use super::*;
    use crate::{error::Error, normalize::Sex};

    #[fixture]
    fn dir() -> TempDir {
        tempfile::tempdir().unwrap()
    }

    fn write(dir: &TempDir, name: &str, contents: &str) -> Utf8PathBuf {
        let path = Utf8PathBuf::try_from(dir.path().join(name)).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    #[rstest]
    fn settings_file_overrides_defaults(dir: TempDir) {
        let path = write(
            &dir,
            "settings.toml",
            r#"
            genotyping_site = "NIH"
            output_format = "tsv"
            plate_capacity = 384
            "#,
        );

        let settings = Settings::load(Some(&path)).unwrap();

        assert_eq!(settings.genotyping_site, GenotypingSite::Nih);
        assert_eq!(settings.output_format, OutputFormat::Tsv);
        assert_eq!(settings.plate_capacity, 384);
        assert_eq!(settings.other_sex_warning_fraction, 0.1);
    }

    #[rstest]
    #[case("plate_capacity = 0")]
    #[case("other_sex_warning_fraction = 1.5")]
    #[case("genotyping_site = \"Broad\"")]
    fn invalid_settings_are_rejected(dir: TempDir, #[case] contents: &str) {
        let path = write(&dir, "settings.toml", contents);

        assert!(matches!(
            Settings::load(Some(&path)),
            Err(Error::Config { .. })
        ));
    }

    #[rstest]
    #[case("mappings.toml", "[sex]\nM = \"Male\"\n")]
    #[case("mappings.json", r#"{"sex": {"M": "Male"}}"#)]
    fn reads_mappings(dir: TempDir, #[case] name: &str, #[case] contents: &str) {
        let path = write(&dir, name, contents);

        let mappings = load_mappings(&path).unwrap();

        assert_eq!(mappings.sex["M"], Sex::Male);
    }

    #[rstest]
    fn rejects_unknown_terms(dir: TempDir) {
        let path = write(&dir, "mappings.toml", "[sex]\nM = \"man\"\n");

        assert!(load_mappings(&path).is_err());
    }
}
