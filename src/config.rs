use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::AbundanceColumn;
use crate::error::KronaError;
use crate::gtdb::{AR_TAXONOMY, BAC_TAXONOMY, DEFAULT_MIRRORS};

pub const DEFAULT_CONFIG_FILE: &str = "sylph2krona.json";
pub const DEFAULT_OUTDIR: &str = "krona_out";

/// On-disk configuration; every field is optional.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub abundance: Option<AbundanceColumn>,
    #[serde(default)]
    pub outdir: Option<String>,
    #[serde(default)]
    pub bac: Option<String>,
    #[serde(default)]
    pub ar: Option<String>,
    #[serde(default)]
    pub mirrors: Option<Vec<String>>,
    #[serde(default)]
    pub offline: Option<bool>,
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub abundance: Option<AbundanceColumn>,
    pub outdir: Option<String>,
    pub bac: Option<String>,
    pub ar: Option<String>,
    pub offline: bool,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub abundance: AbundanceColumn,
    pub outdir: Utf8PathBuf,
    pub bac: PathBuf,
    pub ar: PathBuf,
    pub mirrors: Vec<String>,
    pub offline: bool,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        ConfigLoader::resolve_config(Config::default(), ConfigOverrides::default())
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path`, or `sylph2krona.json` from the working directory when it
    /// exists, then applies `overrides`.
    pub fn resolve(
        path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, KronaError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(Self::resolve_config(Config::default(), overrides));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| KronaError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| KronaError::ConfigParse(err.to_string()))?;

        Ok(Self::resolve_config(config, overrides))
    }

    pub fn resolve_config(config: Config, overrides: ConfigOverrides) -> ResolvedConfig {
        let mirrors = config
            .mirrors
            .filter(|mirrors| !mirrors.is_empty())
            .unwrap_or_else(default_mirrors);

        ResolvedConfig {
            abundance: overrides
                .abundance
                .or(config.abundance)
                .unwrap_or_default(),
            outdir: Utf8PathBuf::from(
                overrides
                    .outdir
                    .or(config.outdir)
                    .unwrap_or_else(|| DEFAULT_OUTDIR.to_string()),
            ),
            bac: PathBuf::from(
                overrides
                    .bac
                    .or(config.bac)
                    .unwrap_or_else(|| BAC_TAXONOMY.to_string()),
            ),
            ar: PathBuf::from(
                overrides
                    .ar
                    .or(config.ar)
                    .unwrap_or_else(|| AR_TAXONOMY.to_string()),
            ),
            mirrors,
            offline: overrides.offline || config.offline.unwrap_or(false),
        }
    }
}

pub fn default_mirrors() -> Vec<String> {
    DEFAULT_MIRRORS.iter().map(|mirror| mirror.to_string()).collect()
}
