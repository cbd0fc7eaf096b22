//! Build configuration loaded from TOML.
//!
//! The host configuration layer writes one file per container build; see
//! `cont-kernel.toml.example` at the repository root for the full layout.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::container::Container;
use crate::error::ConfigError;
use crate::patch::switch::ConfigSwitch;
use crate::paths::{normalize_lexically, resolve_repo_path};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "CONT_KERNEL_CONFIG";
/// Config file used when [`CONFIG_ENV`] is unset.
pub const DEFAULT_CONFIG_FILE: &str = "cont-kernel.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub project_root: PathBuf,
    pub build_root: PathBuf,
    pub kernel_dir: PathBuf,
    pub container: Container,
    pub toolchain: ToolchainConfig,
    pub patch: PatchPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolchainConfig {
    pub arch: String,
    /// Prefix of the cross tools, e.g. `arm-none-linux-gnueabi-`. May include
    /// a directory.
    pub cross_compile: String,
    pub make: String,
    /// Make target that writes the initial `.config`.
    pub defconfig: String,
    /// Parallel make jobs; 0 uses the host's available parallelism.
    pub jobs: usize,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            arch: "arm".to_string(),
            cross_compile: "arm-none-linux-gnueabi-".to_string(),
            make: "make".to_string(),
            defconfig: "defconfig".to_string(),
            jobs: 0,
        }
    }
}

impl ToolchainConfig {
    pub fn cpp(&self) -> String {
        format!("{}cpp", self.cross_compile)
    }

    pub fn gcc(&self) -> String {
        format!("{}gcc", self.cross_compile)
    }

    pub fn jobs(&self) -> usize {
        if self.jobs > 0 {
            return self.jobs;
        }
        match std::thread::available_parallelism() {
            Ok(n) => n.get(),
            Err(e) => {
                tracing::warn!("could not detect CPU count ({}), using 4 jobs", e);
                4
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchPolicy {
    /// Abort when a patch target line is missing instead of warning.
    pub strict: bool,
    pub switches: Vec<ConfigSwitch>,
}

impl Default for PatchPolicy {
    fn default() -> Self {
        Self {
            strict: false,
            switches: crate::kernel::params::default_switches(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigToml {
    paths: PathsToml,
    container: Container,
    #[serde(default)]
    toolchain: ToolchainConfig,
    #[serde(default)]
    patch: PatchToml,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PathsToml {
    project_root: PathBuf,
    build_root: PathBuf,
    kernel_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PatchToml {
    strict: bool,
    enable: Vec<String>,
    disable: Vec<String>,
}

impl Default for PatchToml {
    fn default() -> Self {
        Self {
            strict: false,
            enable: vec!["MAGIC_SYSRQ".to_string(), "DEBUG_KERNEL".to_string()],
            disable: Vec::new(),
        }
    }
}

impl BuildConfig {
    /// Load from `$CONT_KERNEL_CONFIG`, or `cont-kernel.toml` in the current
    /// directory.
    pub fn load_default() -> Result<Self> {
        let path = match std::env::var_os(CONFIG_ENV) {
            Some(path) => PathBuf::from(path),
            None => current_dir()?.join(DEFAULT_CONFIG_FILE),
        };
        Self::load(&path)
    }

    /// Load a config file. A relative `project_root` is taken relative to the
    /// directory holding the file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading build config '{}'", path.display()))?;
        let base = current_dir()?.join(path.parent().unwrap_or(Path::new("")));
        Self::parse_relative_to(&text, &base)
            .with_context(|| format!("parsing build config '{}'", path.display()))
    }

    /// Parse config text. A relative `project_root` is taken relative to the
    /// current directory.
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_relative_to(text, &current_dir()?)
    }

    /// Parse config text, resolving a relative `project_root` against `base`.
    ///
    /// All paths come out absolute and free of `.`/`..`, since the toolchain
    /// runs from inside the kernel tree.
    pub fn parse_relative_to(text: &str, base: &Path) -> Result<Self> {
        let parsed: ConfigToml = toml::from_str(text)?;

        let project_root =
            normalize_lexically(&resolve_repo_path(base, &parsed.paths.project_root));
        let build_root =
            normalize_lexically(&resolve_repo_path(&project_root, &parsed.paths.build_root));
        let kernel_dir =
            normalize_lexically(&resolve_repo_path(&project_root, &parsed.paths.kernel_dir));
        if !kernel_dir.starts_with(&project_root) {
            return Err(ConfigError::Layout {
                kernel_dir,
                project_root,
            }
            .into());
        }

        let patch = parse_patch_policy(parsed.patch)?;

        Ok(Self {
            project_root,
            build_root,
            kernel_dir,
            container: parsed.container,
            toolchain: parsed.toolchain,
            patch,
        })
    }
}

fn current_dir() -> Result<PathBuf> {
    std::env::current_dir().context("resolving current directory")
}

fn parse_patch_policy(raw: PatchToml) -> Result<PatchPolicy> {
    let normalize = |name: &str| {
        let name = name.trim();
        name.strip_prefix("CONFIG_").unwrap_or(name).to_string()
    };

    let enable: Vec<String> = raw.enable.iter().map(|n| normalize(n.as_str())).collect();
    let disable: Vec<String> = raw.disable.iter().map(|n| normalize(n.as_str())).collect();

    let enabled: BTreeSet<&str> = enable.iter().map(String::as_str).collect();
    if let Some(conflict) = disable.iter().find(|name| enabled.contains(name.as_str())) {
        return Err(ConfigError::ConflictingSwitch(conflict.clone()).into());
    }

    let mut seen = BTreeSet::new();
    let switches = enable
        .into_iter()
        .map(ConfigSwitch::enable)
        .chain(disable.into_iter().map(ConfigSwitch::disable))
        .filter(|switch| !switch.name.is_empty() && seen.insert(switch.name.clone()))
        .collect();

    Ok(PatchPolicy {
        strict: raw.strict,
        switches,
    })
}
