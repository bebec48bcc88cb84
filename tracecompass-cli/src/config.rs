//! Harness configuration loading and parsing

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracecompass_plugin::{Backend, DeviceEventRecord, HostEventRecord};

/// Main harness configuration (loaded from harness.toml)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub plugin: PluginConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default = "default_host_event")]
    pub host_event: HostEventRecord,
    #[serde(default = "default_device_event")]
    pub device_event: DeviceEventRecord,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PluginConfig {
    /// Shared library exporting `tracecompass_register_with`.
    /// Unset means the plugin linked into this binary.
    pub library: Option<PathBuf>,
    #[serde(default)]
    pub register_twice: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatchConfig {
    #[serde(default = "default_iterations")]
    pub iterations: u64,
    #[serde(default = "default_threads")]
    pub threads: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            threads: default_threads(),
        }
    }
}

fn default_iterations() -> u64 {
    1000
}

fn default_threads() -> usize {
    1
}

fn default_host_event() -> HostEventRecord {
    HostEventRecord::new("localhost", "zeCommandListAppendLaunchKernel")
        .with_backend(Backend::Ze)
        .with_ids(1, 1)
        .with_timing(0, 1_000)
}

fn default_device_event() -> DeviceEventRecord {
    DeviceEventRecord::new(
        HostEventRecord::new("localhost", "kernel")
            .with_backend(Backend::Ze)
            .with_ids(1, 1)
            .with_timing(500, 10_000),
        0,
        0,
    )
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    pub output_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Txt,
    Json,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            plugin: PluginConfig::default(),
            dispatch: DispatchConfig::default(),
            host_event: default_host_event(),
            device_event: default_device_event(),
            output: OutputConfig::default(),
        }
    }
}

/// Configuration problems detected after parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("dispatch.threads must be at least 1")]
    ZeroThreads,

    #[error("Plugin library not found: {0:?}")]
    MissingPlugin(PathBuf),
}

impl HarnessConfig {
    /// Check values that parse fine but cannot run
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.dispatch.threads == 0 {
            return Err(ConfigError::ZeroThreads);
        }
        if let Some(library) = &self.plugin.library {
            if !library.exists() {
                return Err(ConfigError::MissingPlugin(library.clone()));
            }
        }
        Ok(())
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<HarnessConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: HarnessConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_deserialization() {
        let toml_content = r#"
            [dispatch]
            iterations = 50
            threads = 4

            [host_event]
            hostname = "x1000c0s0b0n0"
            name = "cuLaunchKernel"
            backend_id = 3
            vpid = 10
            vtid = 11
            dur = 200

            [device_event]
            hostname = "x1000c0s0b0n0"
            name = "vectorAdd"
            backend_id = 3
            did = 2
            sdid = 0
            metadata = "grid=128"

            [output]
            format = "json"
        "#;

        let config: HarnessConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.dispatch.iterations, 50);
        assert_eq!(config.dispatch.threads, 4);
        assert_eq!(config.host_event.backend(), Backend::Cuda);
        assert_eq!(config.host_event.dur, 200);
        assert_eq!(config.device_event.did, 2);
        assert_eq!(config.device_event.common.name, "vectorAdd");
        assert_eq!(config.device_event.metadata, "grid=128");
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.plugin.library.is_none());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: HarnessConfig = toml::from_str("").unwrap();
        assert_eq!(config.dispatch.iterations, 1000);
        assert_eq!(config.dispatch.threads, 1);
        assert_eq!(config.host_event.backend(), Backend::Ze);
        assert_eq!(config.output.format, OutputFormat::Txt);
        assert!(!config.plugin.register_twice);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_threads() {
        let mut config = HarnessConfig::default();
        config.dispatch.threads = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroThreads)));
    }

    #[test]
    fn test_validate_rejects_missing_plugin() {
        let mut config = HarnessConfig::default();
        config.plugin.library = Some(PathBuf::from("/nonexistent/libplugin.so"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingPlugin(_))
        ));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[plugin]\nregister_twice = true\n\n[dispatch]\niterations = 3").unwrap();

        let config = load_config(file.path()).unwrap();
        assert!(config.plugin.register_twice);
        assert_eq!(config.dispatch.iterations, 3);
    }

    #[test]
    fn test_load_config_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[dispatch]\niterations = \"many\"").unwrap();

        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
