//! `labgrade.toml` configuration and source factory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use labgrade_core::anomaly::ReferenceConfig;
use labgrade_core::grading::{GradingConfig, GradingMode};
use labgrade_core::params::{parse_bareme_lenient, parse_reference_lenient, Lenient};
use labgrade_core::scores::{Bareme, WeightMatrix};
use labgrade_core::traits::EventSource;

use crate::file::FileSource;
use crate::http::{HttpSource, DEFAULT_TIMEOUT_SECS};

/// Where the event log comes from.
///
/// Note: Custom Debug impl masks the shared secret.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    File {
        path: PathBuf,
    },
    Http {
        url: String,
        #[serde(default)]
        secret: String,
        #[serde(default = "default_timeout")]
        timeout_secs: u64,
    },
}

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceConfig::File { path } => f.debug_struct("File").field("path", path).finish(),
            SourceConfig::Http {
                url,
                secret: _,
                timeout_secs,
            } => f
                .debug_struct("Http")
                .field("url", url)
                .field("secret", &"***")
                .field("timeout_secs", timeout_secs)
                .finish(),
        }
    }
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Integrity monitoring settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Reference parameters, as operator dictionary text.
    #[serde(default)]
    pub parameters: String,
    /// Reference keys excluded from comparison.
    #[serde(default)]
    pub ignore_keys: Vec<String>,
    /// Also compare the composite `full_hash`.
    #[serde(default)]
    pub use_full_hash: bool,
    /// Hide RAS rows.
    #[serde(default)]
    pub only_anomalies: bool,
    /// Re-pull period for `monitor --watch`.
    #[serde(default = "default_refresh")]
    pub refresh_minutes: u64,
}

fn default_refresh() -> u64 {
    5
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            parameters: String::new(),
            ignore_keys: Vec::new(),
            use_full_hash: false,
            only_anomalies: false,
            refresh_minutes: default_refresh(),
        }
    }
}

impl MonitoringConfig {
    /// Parsed reference parameters; malformed text yields an empty
    /// reference and a warning.
    pub fn reference(&self) -> Lenient<ReferenceConfig> {
        parse_reference_lenient(&self.parameters)
    }
}

/// Grading settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingSettings {
    /// Floor for final marks.
    #[serde(default)]
    pub threshold: f64,
    #[serde(default = "default_max_tries")]
    pub max_tries: u32,
    /// Empty for fixed-title grading.
    #[serde(default)]
    pub exam_title: String,
    /// Initial coefficients, as operator dictionary text.
    #[serde(default)]
    pub bareme: String,
    #[serde(default)]
    pub weights: WeightMatrix,
}

fn default_max_tries() -> u32 {
    1
}

impl Default for GradingSettings {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            max_tries: default_max_tries(),
            exam_title: String::new(),
            bareme: String::new(),
            weights: WeightMatrix::default(),
        }
    }
}

impl GradingSettings {
    /// Build the engine configuration. Coefficients declared in the quiz
    /// definition come first; the configured bareme overrides them.
    pub fn grading_config(&self, declared: &Bareme) -> Lenient<GradingConfig> {
        let parsed = parse_bareme_lenient(&self.bareme);
        let mut bareme = declared.clone();
        for (question, coefficient) in parsed.value.iter() {
            bareme.set(question.clone(), *coefficient);
        }

        Lenient {
            value: GradingConfig {
                weights: self.weights,
                bareme,
                threshold: self.threshold,
                max_tries: self.max_tries,
                mode: GradingMode::from_exam_title(&self.exam_title),
            },
            warning: parsed.warning,
        }
    }
}

/// Top-level labgrade configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabgradeConfig {
    #[serde(default)]
    pub source: Option<SourceConfig>,
    /// Quiz definition TOML file.
    #[serde(default = "default_quiz_file")]
    pub quiz_file: PathBuf,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub grading: GradingSettings,
    /// Output directory for exported tables and reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_quiz_file() -> PathBuf {
    PathBuf::from("quiz.toml")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./labgrade-results")
}

impl Default for LabgradeConfig {
    fn default() -> Self {
        Self {
            source: None,
            quiz_file: default_quiz_file(),
            monitoring: MonitoringConfig::default(),
            grading: GradingSettings::default(),
            output_dir: default_output_dir(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        result.push_str(&rest[..start]);
        let var_name = &rest[start + 2..start + len];
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + len + 1..];
    }
    result.push_str(rest);
    result
}

fn resolve_source_config(config: &SourceConfig) -> SourceConfig {
    match config {
        SourceConfig::File { path } => SourceConfig::File {
            path: PathBuf::from(resolve_env_vars(&path.to_string_lossy())),
        },
        SourceConfig::Http {
            url,
            secret,
            timeout_secs,
        } => SourceConfig::Http {
            url: resolve_env_vars(url),
            secret: resolve_env_vars(secret),
            timeout_secs: *timeout_secs,
        },
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `labgrade.toml` in the current directory
/// 2. `~/.config/labgrade/config.toml`
///
/// Environment variable override: `LABGRADE_SECRET` replaces the HTTP
/// source secret.
pub fn load_config() -> Result<LabgradeConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<LabgradeConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("labgrade.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|home| home.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            tracing::debug!(path = %path.display(), "loading config");
            parse_config_str(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => LabgradeConfig::default(),
    };

    if let Ok(key) = std::env::var("LABGRADE_SECRET") {
        if let Some(SourceConfig::Http { secret, .. }) = config.source.as_mut() {
            *secret = key;
        }
    }

    Ok(config)
}

/// Parse config text and resolve `${VAR}` references in the source.
pub fn parse_config_str(content: &str) -> Result<LabgradeConfig> {
    let mut config: LabgradeConfig = toml::from_str(content)?;
    config.source = config.source.as_ref().map(resolve_source_config);
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("labgrade"))
}

/// Create a source instance from its configuration.
pub fn create_source(config: &SourceConfig) -> Result<Box<dyn EventSource>> {
    match config {
        SourceConfig::File { path } => Ok(Box::new(FileSource::new(path))),
        SourceConfig::Http {
            url,
            secret,
            timeout_secs,
        } => Ok(Box::new(HttpSource::new(url, secret, *timeout_secs)?)),
    }
}
