//! Generated configuration (`configvars.toml`).
//!
//! The configure step inspects the host and writes this file; a run only
//! reads it. Tool locations default to bare names resolved through `PATH`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::Fatal;
use crate::layout::{Arch, StagingLayout};

pub const CONFIG_FILENAME: &str = "configvars.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MakerConfig {
    /// Install prefix; `install` and `uninstall` work under it.
    pub prefix: PathBuf,
    /// Packaging tool (`makensis`); `package` is unavailable without it.
    pub make_nsis: Option<PathBuf>,
    /// Native build-tool generator, e.g. `Visual Studio 17 2022`.
    pub generator: Option<String>,
    /// C++ compiler override handed to the configure step.
    pub compiler: Option<String>,
    pub vcvars_32: Option<PathBuf>,
    pub vcvars_64: Option<PathBuf>,
    #[serde(default = "default_architectures")]
    pub architectures: Vec<Arch>,
    #[serde(default = "default_git")]
    pub git: PathBuf,
    #[serde(default = "default_cmake")]
    pub cmake: PathBuf,
    pub package_name: Option<String>,
}

fn default_architectures() -> Vec<Arch> {
    Arch::DEFAULT_BUILD.to_vec()
}

fn default_git() -> PathBuf {
    PathBuf::from("git")
}

fn default_cmake() -> PathBuf {
    PathBuf::from("cmake")
}

impl MakerConfig {
    pub fn path(root: &Path) -> PathBuf {
        root.join(CONFIG_FILENAME)
    }

    /// Load `configvars.toml` from `root`; `Ok(None)` when it does not exist.
    pub fn load(root: &Path) -> Result<Option<Self>> {
        let path = Self::path(root);
        if !path.is_file() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading configuration '{}'", path.display()))?;
        let config = Self::parse(&text)
            .with_context(|| format!("parsing configuration '{}'", path.display()))?;
        Ok(Some(config))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: MakerConfig = toml::from_str(text)?;
        Ok(config)
    }

    pub fn require<'a>(config: Option<&'a Self>, root: &Path) -> Result<&'a Self> {
        config.ok_or_else(|| {
            Fatal::NotConfigured {
                path: Self::path(root),
            }
            .into()
        })
    }

    pub fn layout(&self, root: &Path) -> StagingLayout {
        StagingLayout::new(
            root,
            Some(self.prefix.clone()),
            self.make_nsis.is_some(),
            self.architectures.clone(),
        )
    }

    pub fn toolchain(&self) -> Toolchain {
        let mut env_scripts = BTreeMap::new();
        if let Some(script) = &self.vcvars_32 {
            env_scripts.insert(Arch::Win32, script.clone());
        }
        if let Some(script) = &self.vcvars_64 {
            env_scripts.insert(Arch::X64, script.clone());
        }
        Toolchain {
            git: self.git.clone(),
            cmake: self.cmake.clone(),
            generator: self.generator.clone(),
            compiler: self.compiler.clone(),
            env_scripts,
        }
    }

    /// Name used for the installer script and the installer itself.
    pub fn package_name(&self, root: &Path) -> String {
        self.package_name.clone().unwrap_or_else(|| {
            root.file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("package")
                .to_string()
        })
    }
}

/// Tools and settings every element is built with.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub git: PathBuf,
    pub cmake: PathBuf,
    pub generator: Option<String>,
    pub compiler: Option<String>,
    /// Environment-setup script sourced before build-tool calls, per arch.
    pub env_scripts: BTreeMap<Arch, PathBuf>,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            git: default_git(),
            cmake: default_cmake(),
            generator: None,
            compiler: None,
            env_scripts: BTreeMap::new(),
        }
    }
}
