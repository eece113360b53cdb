use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::target::{Locations, PathPrefix, Target, Variant};

/// Catalog compiled into the binary, used when no catalog file exists.
const DEFAULT_CATALOG: &str = include_str!("../catalog.toml");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_negate_tool")]
    pub negate_tool: String,
    #[serde(default = "default_negate_args")]
    pub negate_args: Vec<String>,
    #[serde(default = "default_elevate")]
    pub elevate: bool,
    #[serde(default = "default_system_applications")]
    pub system_applications: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            negate_tool: default_negate_tool(),
            negate_args: default_negate_args(),
            elevate: default_elevate(),
            system_applications: default_system_applications(),
        }
    }
}

/// One catalog entry. Everything beyond `kind` and `name` customizes the
/// target built from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub kind: Variant,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub image_globs: Vec<String>,
    #[serde(default)]
    pub prefix: Option<PathPrefix>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub kill_process: Option<String>,
    #[serde(default)]
    pub launch: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub swap: Option<[String; 2]>,
}

impl TargetConfig {
    #[cfg(test)]
    pub fn new(kind: Variant, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            image: None,
            images: Vec::new(),
            image_globs: Vec::new(),
            prefix: None,
            location: None,
            kill_process: None,
            launch: None,
            path: None,
            swap: None,
        }
    }

    /// Build the target this entry describes.
    pub fn to_target(&self, locations: &Locations) -> Target {
        let home = &locations.home;
        let mut target = Target::new(self.name.clone(), self.kind, locations.clone());
        target.image = self.image.as_ref().map(PathBuf::from);
        target.images = self.images.iter().map(PathBuf::from).collect();
        target.image_globs = self.image_globs.clone();
        target.prefix = self.prefix;
        target.location = self.location.as_ref().map(PathBuf::from);
        target.kill_process = self.kill_process.clone();
        target.launch = self.launch.as_deref().map(|l| expand_path(l, home));
        target.path_override = self.path.as_deref().map(|p| expand_path(p, home));
        target.swap = self
            .swap
            .as_ref()
            .map(|[a, b]| (PathBuf::from(a), PathBuf::from(b)));
        target
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

impl Config {
    pub fn locations(&self, home: PathBuf) -> Locations {
        let system = expand_path(&self.settings.system_applications, &home);
        Locations::new(home, system)
    }

    /// Entries whose name matches one of `names`, in catalog order. An empty
    /// filter keeps everything.
    pub fn select(&self, names: &[String]) -> Vec<&TargetConfig> {
        self.targets
            .iter()
            .filter(|t| names.is_empty() || names.iter().any(|n| n.eq_ignore_ascii_case(&t.name)))
            .collect()
    }
}

fn default_negate_tool() -> String {
    "convert".to_string()
}

fn default_negate_args() -> Vec<String> {
    vec!["-negate".to_string()]
}

fn default_elevate() -> bool {
    true
}

fn default_system_applications() -> String {
    "/Applications".to_string()
}

pub fn config_path(home: &Path) -> PathBuf {
    home.join(".menubar-invert").join("catalog.toml")
}

/// Load the catalog from `~/.menubar-invert/catalog.toml`, falling back to the
/// built-in catalog when that file does not exist.
pub fn load(home: &Path) -> Result<Config> {
    let path = config_path(home);
    if !path.exists() {
        log::debug!("{} not found, using built-in catalog", path.display());
        return builtin();
    }
    load_from(&path)
}

pub fn load_from(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed reading catalog {}", path.display()))?;
    let config: Config = toml::from_str(&contents)
        .with_context(|| format!("failed parsing TOML {}", path.display()))?;
    validate(&config)?;
    Ok(config)
}

pub fn builtin() -> Result<Config> {
    let config: Config =
        toml::from_str(DEFAULT_CATALOG).context("failed parsing built-in catalog")?;
    validate(&config)?;
    Ok(config)
}

/// Reject catalogs that cannot be run as written: blank or duplicate names,
/// a blank negate tool, swap pairs naming one file twice.
fn validate(config: &Config) -> Result<()> {
    if config.settings.negate_tool.trim().is_empty() {
        anyhow::bail!("config error: negate_tool is empty");
    }

    let mut seen = std::collections::HashSet::new();
    for target in &config.targets {
        if target.name.trim().is_empty() {
            anyhow::bail!("config error: target has empty name");
        }
        let key = target.name.to_ascii_lowercase();
        if !seen.insert(key) {
            anyhow::bail!("config error: duplicate target name '{}'", target.name);
        }
        if let Some([a, b]) = &target.swap {
            if a == b {
                anyhow::bail!(
                    "config error: target '{}' swaps '{}' with itself",
                    target.name,
                    a
                );
            }
        }
    }

    Ok(())
}

pub fn expand_path(path: &str, home: &Path) -> PathBuf {
    if path == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = path.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(path)
}
