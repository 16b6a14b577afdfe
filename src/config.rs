use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::runtime::ExecutionLimits;

pub const BACKEND_NAMES: [&str; 2] = ["interpreter", "vm"];

/// Run settings read from a YAML file; every field is optional.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub backend: Option<String>,
    pub max_steps: Option<u64>,
    /// Program input file, resolved relative to the config file.
    pub input: Option<PathBuf>,
}

/// Values given on the command line; they win over the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub backend: Option<String>,
    pub max_steps: Option<u64>,
    pub input: Option<PathBuf>,
}

/// Effective settings after merging defaults, file and overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub backend: String,
    pub limits: ExecutionLimits,
    pub input: Option<PathBuf>,
}

impl Config {
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(raw).context("Parsing config YAML")?;
        if let Some(backend) = &config.backend {
            ensure!(
                BACKEND_NAMES.contains(&backend.as_str()),
                "Unknown backend '{backend}' in config (expected one of: {})",
                BACKEND_NAMES.join(", ")
            );
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Reading config {}", path.display()))?;
        let mut config =
            Self::from_yaml(&raw).with_context(|| format!("Loading config {}", path.display()))?;
        if let (Some(input), Some(dir)) = (&config.input, path.parent())
            && input.is_relative()
        {
            config.input = Some(dir.join(input));
        }
        Ok(config)
    }

    pub fn resolve(self, overrides: Overrides) -> Result<Settings> {
        let backend = overrides
            .backend
            .or(self.backend)
            .unwrap_or_else(|| "interpreter".to_string());
        ensure!(
            BACKEND_NAMES.contains(&backend.as_str()),
            "Unknown backend '{backend}' (expected one of: {})",
            BACKEND_NAMES.join(", ")
        );
        Ok(Settings {
            backend,
            limits: ExecutionLimits {
                max_steps: overrides.max_steps.or(self.max_steps),
            },
            input: overrides.input.or(self.input),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn parses_all_fields() {
        let config = Config::from_yaml(indoc! {"
            backend: vm
            max_steps: 1000
            input: numbers.txt
        "})
        .expect("config");
        assert_eq!(
            config,
            Config {
                backend: Some("vm".to_string()),
                max_steps: Some(1000),
                input: Some(PathBuf::from("numbers.txt")),
            }
        );
    }

    #[test]
    fn overrides_win_and_defaults_fill_gaps() {
        let config = Config::from_yaml("backend: vm\nmax_steps: 10\n").expect("config");
        let settings = config
            .resolve(Overrides {
                max_steps: Some(99),
                ..Overrides::default()
            })
            .expect("settings");
        assert_eq!(settings.backend, "vm");
        assert_eq!(settings.limits.max_steps, Some(99));
        assert_eq!(settings.input, None);

        let defaults = Config::default().resolve(Overrides::default()).expect("settings");
        assert_eq!(defaults.backend, "interpreter");
        assert_eq!(defaults.limits, ExecutionLimits::unlimited());
    }

    #[test]
    fn rejects_unknown_backend_and_fields() {
        assert!(Config::from_yaml("backend: jit\n").is_err());
        assert!(Config::from_yaml("verbose: true\n").is_err());
        assert!(
            Config::default()
                .resolve(Overrides {
                    backend: Some("llvm".to_string()),
                    ..Overrides::default()
                })
                .is_err()
        );
    }
}
