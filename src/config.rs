//! Layered configuration: flags > environment > file > defaults.
//!
//! The flags > environment layers are handled by clap's `env` bindings;
//! this module loads the file layer, supplies defaults, and merges the
//! result explicitly. Components receive the merged value — there is no
//! ambient settings state.

use crate::cli::UpdateArgs;
use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// The AWS profile used when none is configured.
pub const DEFAULT_PROFILE: &str = "default";

/// Base names of the configuration file, tried in order.
const CONFIG_FILE_NAMES: &[&str] = &["amibump.yaml", "amibump.yml", "amibump.toml"];

/// Name patterns searched when none are configured: the Amazon Linux 2023
/// image families.
pub fn default_patterns() -> Vec<String> {
    [
        "al2023-ami-*",
        "al2023-ami-kernel-*",
        "al2023-ami-minimal-*",
        "al2023-ami-docker-*",
        "al2023-ami-ecs-*",
        "al2023-ami-eks-*",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// The merged run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Account IDs whose images are searched.
    pub accounts: Vec<String>,
    /// The file or directory to rewrite.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    /// AWS profile for authentication.
    pub profile: String,
    /// Verbose diagnostics.
    pub verbose: bool,
    /// Regions to search; empty means "use the profile's region".
    pub regions: Vec<String>,
    /// Optional role to assume in the target accounts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,
    /// Image name patterns searched when the target is a directory.
    pub patterns: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            accounts: Vec::new(),
            file: None,
            profile: DEFAULT_PROFILE.to_string(),
            verbose: false,
            regions: Vec::new(),
            role_arn: None,
            patterns: default_patterns(),
        }
    }
}

impl Config {
    /// Loads the file layer (or defaults when no config file exists).
    pub fn load() -> Result<Config> {
        match find_config_file() {
            Some(path) => Self::from_file(&path),
            None => Ok(Config::default()),
        }
    }

    /// Parses a configuration file, choosing the format by extension.
    pub fn from_file(path: &Path) -> Result<Config> {
        let raw = fs::read_to_string(path)?;
        match path.extension().and_then(|os| os.to_str()) {
            Some("toml") => Ok(toml::from_str(&raw)?),
            _ => Ok(serde_yaml::from_str(&raw)?),
        }
    }

    /// Applies command-line/environment overrides on top of this
    /// configuration. Flags that were not supplied leave the file-layer
    /// values in place.
    pub fn apply_overrides(&mut self, args: &UpdateArgs) {
        if !args.account_ids.is_empty() {
            self.accounts = args.account_ids.clone();
        }
        if let Some(file) = &args.file {
            self.file = Some(file.clone());
        }
        if let Some(profile) = &args.profile {
            self.profile = profile.clone();
        }
        if !args.regions.is_empty() {
            self.regions = args.regions.clone();
        }
        if let Some(role_arn) = &args.role_arn {
            self.role_arn = Some(role_arn.clone());
        }
        if !args.patterns.is_empty() {
            self.patterns = args.patterns.clone();
        }
        if args.verbose {
            self.verbose = true;
        }
    }

    /// Fails fast before any query or mutation begins.
    pub fn validate(&self) -> Result<()> {
        if self.accounts.is_empty() {
            return Err(Error::NoAccounts);
        }
        if self.file.is_none() {
            return Err(Error::NoFilePath);
        }
        Ok(())
    }

    /// Writes this configuration to `path`, creating parent directories.
    /// The format follows the file extension (TOML or YAML).
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let serialized = match path.extension().and_then(|os| os.to_str()) {
            Some("toml") => toml::to_string_pretty(self)?,
            _ => serde_yaml::to_string(self)?,
        };

        fs::write(path, serialized)?;
        Ok(())
    }
}

/// Searches the prioritized locations for a configuration file: the
/// current directory, `~/.amibump/`, then `/etc/amibump/`.
fn find_config_file() -> Option<PathBuf> {
    let mut search_dirs = vec![PathBuf::from(".")];
    if let Some(home) = dirs::home_dir() {
        search_dirs.push(home.join(".amibump"));
    }
    search_dirs.push(PathBuf::from("/etc/amibump"));

    for dir in search_dirs {
        for name in CONFIG_FILE_NAMES {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }

    None
}

/// The main entry point for the `init` command.
pub fn run_init(filename: Option<PathBuf>) -> Result<()> {
    let filename = filename.unwrap_or_else(|| PathBuf::from("amibump.yaml"));

    // Amazon's public Linux AMI account makes a working starting point.
    let sample = Config {
        accounts: vec!["137112412989".to_string()],
        file: Some(PathBuf::from("config.yaml")),
        ..Config::default()
    };

    sample.save(&filename)?;

    println!("Configuration file created: {}", filename.display());
    println!("Edit the file to customize your settings, then run:");
    println!("  amibump update -f your-target-file.yaml");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_cover_profile_and_patterns() {
        let cfg = Config::default();
        assert_eq!(cfg.profile, "default");
        assert!(cfg.patterns.contains(&"al2023-ami-ecs-*".to_string()));
        assert!(cfg.accounts.is_empty());
        assert!(cfg.regions.is_empty());
    }

    #[test]
    fn validation_requires_accounts_and_target() {
        let mut cfg = Config::default();
        assert!(matches!(cfg.validate(), Err(Error::NoAccounts)));

        cfg.accounts = vec!["123456789012".to_string()];
        assert!(matches!(cfg.validate(), Err(Error::NoFilePath)));

        cfg.file = Some(PathBuf::from("config.yaml"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn overrides_beat_file_values_but_absence_does_not() {
        let mut cfg = Config {
            accounts: vec!["111111111111".to_string()],
            profile: "staging".to_string(),
            patterns: vec!["my-app-*".to_string()],
            ..Config::default()
        };

        let args = UpdateArgs {
            account_ids: vec!["222222222222".to_string()],
            file: Some(PathBuf::from("stack.yaml")),
            ..UpdateArgs::default()
        };
        cfg.apply_overrides(&args);

        assert_eq!(cfg.accounts, vec!["222222222222".to_string()]);
        assert_eq!(cfg.file, Some(PathBuf::from("stack.yaml")));
        // Untouched by the empty/None override fields:
        assert_eq!(cfg.profile, "staging");
        assert_eq!(cfg.patterns, vec!["my-app-*".to_string()]);
    }

    #[test]
    fn yaml_config_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("amibump.yaml");

        let cfg = Config {
            accounts: vec!["123456789012".to_string()],
            file: Some(PathBuf::from("config.yaml")),
            regions: vec!["eu-west-1".to_string()],
            role_arn: Some("arn:aws:iam::123456789012:role/updater".to_string()),
            ..Config::default()
        };
        cfg.save(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.accounts, cfg.accounts);
        assert_eq!(loaded.regions, cfg.regions);
        assert_eq!(loaded.role_arn, cfg.role_arn);
    }

    #[test]
    fn toml_config_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("amibump.toml");

        let cfg = Config {
            accounts: vec!["123456789012".to_string()],
            file: Some(PathBuf::from("infra")),
            ..Config::default()
        };
        cfg.save(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.accounts, cfg.accounts);
        assert_eq!(loaded.file, cfg.file);
        assert_eq!(loaded.patterns, default_patterns());
    }

    #[test]
    fn partial_yaml_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("amibump.yaml");
        fs::write(&path, "accounts:\n  - '123456789012'\n").unwrap();

        let cfg = Config::from_file(&path).unwrap();
        assert_eq!(cfg.accounts, vec!["123456789012".to_string()]);
        assert_eq!(cfg.profile, "default");
        assert_eq!(cfg.patterns, default_patterns());
    }
}
