//! Loading, overriding and expanding experiment configurations.

use std::fs::File;
use std::path::Path;

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use log::{debug, info};
use serde_yaml::Value;

use crate::config::Config;

/// Label used for the single value of an experiment without a varying
/// parameter.
pub const DEFAULT_VALUE_LABEL: &str = "default";

/// Properties read once per experiment rather than per varying value.
/// Varying them would be silently ignored, so they are rejected.
const EXPERIMENT_WIDE_KEYS: &[&str] = &[
    "general.seed",
    "general.runs",
    "general.log_level",
    "experiment",
    "statistics",
];

fn is_experiment_wide(key: &str) -> bool {
    EXPERIMENT_WIDE_KEYS.iter().any(|fixed| {
        key == *fixed
            || key
                .strip_prefix(fixed)
                .is_some_and(|rest| rest.starts_with('.'))
    })
}

/// Load and parse configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<Config> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open configuration file {:?}", config_path))?;
    let config: Config = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse configuration file {:?}", config_path))?;

    config.validate()?;

    // Resolve every varying value now so a bad key fails before any run.
    expand_experiment(&config)?;

    Ok(config)
}

/// CLI arguments that override YAML settings
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub runs: Option<u32>,
    pub seed: Option<u64>,
}

/// Apply CLI overrides to a configuration
pub fn apply_overrides(config: &mut Config, overrides: &CliOverrides) -> Result<()> {
    if let Some(runs) = overrides.runs {
        info!("Overriding runs: {} -> {}", config.general.runs, runs);
        config.general.runs = runs;
    }
    if let Some(seed) = overrides.seed {
        info!("Overriding seed: {} -> {}", config.general.seed, seed);
        config.general.seed = seed;
    }

    config.validate()?;
    Ok(())
}

/// Copy of `config` with the property at the dotted `key` replaced by
/// `value`. The property must already exist.
pub fn apply_varying_value(config: &Config, key: &str, value: &Value) -> Result<Config> {
    if is_experiment_wide(key) {
        return Err(eyre!(
            "Varying key '{}' is fixed for the whole experiment and cannot be varied",
            key
        ));
    }

    let mut tree = serde_yaml::to_value(config).wrap_err("Failed to serialize configuration")?;

    let mut slot = &mut tree;
    for segment in key.split('.') {
        slot = slot
            .as_mapping_mut()
            .and_then(|mapping| mapping.get_mut(segment))
            .ok_or_else(|| eyre!("Varying key '{}' does not name a property", key))?;
    }
    *slot = value.clone();

    let varied: Config = serde_yaml::from_value(tree)
        .wrap_err_with(|| format!("Value {} is not valid for '{}'", value_label(value), key))?;
    varied
        .validate()
        .wrap_err_with(|| format!("Invalid configuration for {} = {}", key, value_label(value)))?;
    Ok(varied)
}

/// One configuration per varying value, paired with its display label.
pub fn expand_experiment(config: &Config) -> Result<Vec<(String, Config)>> {
    let Some(varying) = &config.experiment.varying else {
        return Ok(vec![(DEFAULT_VALUE_LABEL.to_string(), config.clone())]);
    };

    varying
        .values
        .iter()
        .map(|value| {
            let label = value_label(value);
            debug!("Expanding {} = {}", varying.key, label);
            apply_varying_value(config, &varying.key, value).map(|varied| (label, varied))
        })
        .collect()
}

/// Compact single-line rendering of a YAML value.
pub fn value_label(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null => "null".to_string(),
        other => serde_yaml::to_string(other)
            .map(|text| text.trim().replace('\n', " "))
            .unwrap_or_else(|_| format!("{:?}", other)),
    }
}
