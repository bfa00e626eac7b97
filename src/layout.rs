//! Staging directory model.
//!
//! Three trees share one shape:
//!
//! ```text
//! <root>/build/                    build tree
//!     source/<element>/            synchronized checkouts
//!     build/<element>/<arch>/      native build output
//!     include/  lib/<arch>/  bin/<arch>/
//!     nsis/{include,lib/<arch>,bin/<arch>}   packaging tree
//! <prefix>/{include,lib/<arch>,bin/<arch>}   install tree
//! ```
//!
//! Each map is computed on first access and cached for the life of the
//! layout; later calls hand back the same value without touching the disk.

use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use serde::Deserialize;

use crate::error::Fatal;

/// Target architecture, named the way the MSVC generators spell it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
pub enum Arch {
    #[serde(rename = "Win32")]
    Win32,
    #[serde(rename = "x64")]
    X64,
    #[serde(rename = "arm64")]
    Arm64,
}

impl Arch {
    /// Every architecture the staging trees reserve a directory for.
    pub const ALL: [Arch; 3] = [Arch::Win32, Arch::X64, Arch::Arm64];

    /// Architectures built when the configuration does not say otherwise.
    pub const DEFAULT_BUILD: [Arch; 2] = [Arch::Win32, Arch::X64];

    pub fn as_str(self) -> &'static str {
        match self {
            Arch::Win32 => "Win32",
            Arch::X64 => "x64",
            Arch::Arm64 => "arm64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Locations inside `<root>/build`.
#[derive(Debug, Clone)]
pub struct BuildDirs {
    pub root: PathBuf,
    pub source: PathBuf,
    pub build: PathBuf,
    pub include: PathBuf,
    pub lib_root: PathBuf,
    pub bin_root: PathBuf,
    pub lib: BTreeMap<Arch, PathBuf>,
    pub bin: BTreeMap<Arch, PathBuf>,
}

impl BuildDirs {
    fn new(root: &Path) -> Self {
        let build_root = root.join("build");
        let lib_root = build_root.join("lib");
        let bin_root = build_root.join("bin");
        Self {
            source: build_root.join("source"),
            build: build_root.join("build"),
            include: build_root.join("include"),
            lib: per_arch(&lib_root),
            bin: per_arch(&bin_root),
            lib_root,
            bin_root,
            root: build_root,
        }
    }

    /// Every directory of the tree, parents before children.
    pub fn all(&self) -> Vec<&Path> {
        let mut dirs = vec![
            self.root.as_path(),
            self.source.as_path(),
            self.build.as_path(),
            self.include.as_path(),
            self.lib_root.as_path(),
            self.bin_root.as_path(),
        ];
        dirs.extend(self.lib.values().map(PathBuf::as_path));
        dirs.extend(self.bin.values().map(PathBuf::as_path));
        dirs
    }
}

/// A destination for gathered artifacts: the install prefix or the
/// packaging staging directory.
#[derive(Debug, Clone)]
pub struct InstallTree {
    pub root: PathBuf,
    pub include: PathBuf,
    pub lib_root: PathBuf,
    pub bin_root: PathBuf,
    pub lib: BTreeMap<Arch, PathBuf>,
    pub bin: BTreeMap<Arch, PathBuf>,
}

impl InstallTree {
    pub fn new(root: &Path) -> Self {
        let lib_root = root.join("lib");
        let bin_root = root.join("bin");
        Self {
            root: root.to_path_buf(),
            include: root.join("include"),
            lib: per_arch(&lib_root),
            bin: per_arch(&bin_root),
            lib_root,
            bin_root,
        }
    }

    pub fn lib_dir(&self, arch: Arch) -> &Path {
        &self.lib[&arch]
    }

    pub fn bin_dir(&self, arch: Arch) -> &Path {
        &self.bin[&arch]
    }

    /// False when none of the include, lib and bin roots exist.
    pub fn exists(&self) -> bool {
        self.include.is_dir() || self.lib_root.is_dir() || self.bin_root.is_dir()
    }

    pub fn all(&self) -> Vec<&Path> {
        let mut dirs = vec![
            self.root.as_path(),
            self.include.as_path(),
            self.lib_root.as_path(),
            self.bin_root.as_path(),
        ];
        dirs.extend(self.lib.values().map(PathBuf::as_path));
        dirs.extend(self.bin.values().map(PathBuf::as_path));
        dirs
    }
}

fn per_arch(parent: &Path) -> BTreeMap<Arch, PathBuf> {
    Arch::ALL
        .iter()
        .map(|arch| (*arch, parent.join(arch.as_str())))
        .collect()
}

/// Every filesystem location used by a run.
#[derive(Debug)]
pub struct StagingLayout {
    root: PathBuf,
    prefix: Option<PathBuf>,
    packaging_enabled: bool,
    archs: Vec<Arch>,
    build_dirs: OnceCell<BuildDirs>,
    install_dirs: OnceCell<InstallTree>,
    packaging_dirs: OnceCell<InstallTree>,
}

impl StagingLayout {
    pub fn new(
        root: impl Into<PathBuf>,
        prefix: Option<PathBuf>,
        packaging_enabled: bool,
        archs: Vec<Arch>,
    ) -> Self {
        Self {
            root: root.into(),
            prefix,
            packaging_enabled,
            archs,
            build_dirs: OnceCell::new(),
            install_dirs: OnceCell::new(),
            packaging_dirs: OnceCell::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Architectures this run builds and gathers for.
    pub fn archs(&self) -> &[Arch] {
        &self.archs
    }

    pub fn build_dirs(&self) -> &BuildDirs {
        self.build_dirs.get_or_init(|| BuildDirs::new(&self.root))
    }

    /// Install tree under the configured prefix.
    pub fn install_dirs(&self) -> Result<&InstallTree> {
        let Some(prefix) = &self.prefix else {
            bail!("no install prefix is configured");
        };
        Ok(self.install_dirs.get_or_init(|| InstallTree::new(prefix)))
    }

    /// Packaging tree, present only when a packaging tool is configured.
    pub fn packaging_dirs(&self) -> Option<&InstallTree> {
        if !self.packaging_enabled {
            return None;
        }
        Some(
            self.packaging_dirs
                .get_or_init(|| InstallTree::new(&self.build_dirs().root.join("nsis"))),
        )
    }

    pub fn build_root(&self) -> &Path {
        &self.build_dirs().root
    }

    pub fn source_dir(&self) -> &Path {
        &self.build_dirs().source
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dirs().build
    }

    pub fn include_dir(&self) -> &Path {
        &self.build_dirs().include
    }

    pub fn lib_dir(&self, arch: Arch) -> &Path {
        &self.build_dirs().lib[&arch]
    }

    pub fn bin_dir(&self, arch: Arch) -> &Path {
        &self.build_dirs().bin[&arch]
    }

    pub fn patches_dir(&self) -> PathBuf {
        self.root.join("patches")
    }

    pub fn create_build_dirs(&self) -> Result<()> {
        create_all(self.build_dirs().all())
    }

    pub fn create_install_dirs(&self) -> Result<()> {
        create_all(self.install_dirs()?.all())
    }

    pub fn create_packaging_dirs(&self) -> Result<()> {
        match self.packaging_dirs() {
            Some(tree) => create_all(tree.all()),
            None => Ok(()),
        }
    }
}

/// Create a directory and its parents; failure is fatal with its own exit code.
pub fn mkdir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|source| Fatal::CreateDir {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn create_all(dirs: Vec<&Path>) -> Result<()> {
    for dir in dirs {
        mkdir(dir)?;
    }
    Ok(())
}
