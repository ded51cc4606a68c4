use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    export::ExportOptions,
    format::{ColumnSeparator, Format, ReaperType},
    sdif::{SdifSelection, Signature},
};

pub const CONFIG_FILE_NAME: &str = "resultlane.config.toml";
pub const CONFIG_PATH_ENV: &str = "RESULTLANE_CONFIG_PATH";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultsConfig {
    pub export: ExportConfig,
    pub diagnostics: DiagnosticsConfig,
}

/// Defaults applied to every export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub separator: ColumnSeparator,
    pub include_header: bool,
    pub use_end_time: bool,
    pub escape_labels: bool,
    pub include_description: bool,
    pub apply_extra_thresholds: bool,
    pub reaper_type: ReaperType,
    pub sdif_frame_signature: Signature,
    pub sdif_matrix_signature: Signature,
    pub sdif_column_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub rust_log_filter: String,
    pub trace_file_prefix: String,
    pub log_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            separator: ColumnSeparator::Comma,
            include_header: false,
            use_end_time: false,
            escape_labels: true,
            include_description: false,
            apply_extra_thresholds: false,
            reaper_type: ReaperType::Marker,
            sdif_frame_signature: Signature::ANY,
            sdif_matrix_signature: Signature::ANY,
            sdif_column_name: None,
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            rust_log_filter: "info,resultlane_core=trace".to_string(),
            trace_file_prefix: "resultlane".to_string(),
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl ExportConfig {
    /// Export options for `path`, with the format taken from its extension.
    pub fn options_for(&self, path: &Path) -> crate::error::Result<ExportOptions> {
        let format = Format::from_path(path)?;
        Ok(self.options(format))
    }

    #[must_use]
    pub fn options(&self, format: Format) -> ExportOptions {
        ExportOptions {
            include_header: self.include_header,
            separator: self.separator,
            use_end_time: self.use_end_time,
            escape_labels: self.escape_labels,
            reaper_type: self.reaper_type,
            include_description: self.include_description,
            apply_extra_thresholds: self.apply_extra_thresholds,
            sdif: SdifSelection {
                column_name: self.sdif_column_name.clone(),
                ..SdifSelection::new(self.sdif_frame_signature, self.sdif_matrix_signature)
            },
            ..ExportOptions::new(format)
        }
    }
}

impl ResultsConfig {
    pub fn load() -> Result<Self> {
        let config_path = discover_config_path().with_context(|| {
            format!("failed to locate {CONFIG_FILE_NAME}; looked in ${CONFIG_PATH_ENV}, cwd and parent directory")
        })?;
        Self::load_from(&config_path)
    }

    /// Like [`Self::load`], with defaults when no configuration file exists.
    /// A file that exists but does not parse is still an error.
    pub fn load_or_default() -> Result<Self> {
        match discover_config_path() {
            Ok(path) => Self::load_from(&path),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("failed to parse config TOML from {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("invalid resultlane configuration")
    }
}

fn discover_config_path() -> Result<PathBuf> {
    let cwd = env::current_dir().context("failed to resolve current directory")?;
    find_config_path(env::var_os(CONFIG_PATH_ENV).map(PathBuf::from), &cwd)
        .ok_or_else(|| anyhow::anyhow!("{CONFIG_FILE_NAME} not found"))
}

fn find_config_path(override_path: Option<PathBuf>, cwd: &Path) -> Option<PathBuf> {
    if let Some(path) = override_path.filter(|path| path.is_file()) {
        return Some(path);
    }
    [cwd.join(CONFIG_FILE_NAME), cwd.join("..").join(CONFIG_FILE_NAME)]
        .into_iter()
        .find(|path| path.is_file())
}
