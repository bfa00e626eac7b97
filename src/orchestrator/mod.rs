//! Verb resolution and the run loop.
//!
//! A run takes the verbs from the command line, puts them in canonical
//! order, and drives every element through the lifecycle phase each verb
//! names. Elements are loaded from the level documents at most once per run.

pub mod package;

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use fs2::FileExt;

use crate::config::MakerConfig;
use crate::element::{Element, TargetFailure};
use crate::error::Fatal;
use crate::layout::{Arch, StagingLayout};
use crate::level::load_levels;
use crate::preflight;

pub const LOCK_FILENAME: &str = ".levelmake.lock";

/// Native build-tool cache files that `scrub` removes from the working directory.
pub const BUILD_TOOL_CACHE: [&str; 2] = ["CMakeCache.txt", "CMakeFiles"];

pub const HELP: &str = "\
usage: levelmake [-v|--verbose] [VERB...]

Verbs (default: all):
  all        synchronize and build every element
  install    gather headers and deliverables into the install prefix
  uninstall  remove what install placed under the prefix
  package    gather into the packaging tree and build the installer
  clean      remove every checkout and build output under build/
  scrub      remove the build tree and the generated configuration
  help       print this message

Elements are read from the *.yaml level documents in the working
directory, in file-name order. Run the configure step first to write
configvars.toml.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Verb {
    All,
    Install,
    Uninstall,
    Package,
    Clean,
    Scrub,
    Help,
}

impl Verb {
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::All => "all",
            Verb::Install => "install",
            Verb::Uninstall => "uninstall",
            Verb::Package => "package",
            Verb::Clean => "clean",
            Verb::Scrub => "scrub",
            Verb::Help => "help",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical execution order for the requested verbs.
///
/// `help` anywhere wins alone. Otherwise `clean` moves to the front and the
/// rest keep their relative order. Nothing requested means `all`. Repeats
/// collapse to their first occurrence.
pub fn resolve_order(requested: &[Verb]) -> Vec<Verb> {
    if requested.contains(&Verb::Help) {
        return vec![Verb::Help];
    }
    if requested.is_empty() {
        return vec![Verb::All];
    }

    let mut order = Vec::with_capacity(requested.len());
    if requested.contains(&Verb::Clean) {
        order.push(Verb::Clean);
    }
    for verb in requested {
        if !order.contains(verb) {
            order.push(*verb);
        }
    }
    order
}

/// Exclusive hold on the working directory for the life of a run.
#[derive(Debug)]
struct RunLock {
    _file: File,
}

fn acquire_lock(root: &Path) -> Result<RunLock> {
    let path = root.join(LOCK_FILENAME);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&path)
        .with_context(|| format!("creating lock file '{}'", path.display()))?;

    if file.try_lock_exclusive().is_err() {
        drop(file);
        return Err(Fatal::Busy { path }.into());
    }
    Ok(RunLock { _file: file })
}

#[derive(Debug)]
pub struct Orchestrator {
    root: PathBuf,
    config: Option<MakerConfig>,
    layout: StagingLayout,
    elements: Vec<Element>,
    loaded: bool,
    failures: Vec<TargetFailure>,
    verbose: bool,
}

impl Orchestrator {
    /// `configvars.toml` is read on first use, so `clean`, `scrub` and `help`
    /// still run when it is missing or no longer parses.
    pub fn new(root: impl Into<PathBuf>, verbose: bool) -> Self {
        let root = root.into();
        let layout = StagingLayout::new(&root, None, false, Arch::DEFAULT_BUILD.to_vec());
        Self {
            root,
            config: None,
            layout,
            elements: Vec::new(),
            loaded: false,
            failures: Vec::new(),
            verbose,
        }
    }

    pub fn layout(&self) -> &StagingLayout {
        &self.layout
    }

    /// Elements loaded so far; empty until a verb needed them.
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Build targets that failed during this run.
    pub fn failures(&self) -> &[TargetFailure] {
        &self.failures
    }

    /// Run `requested` in canonical order. Returns whether any verb did work.
    pub fn run(&mut self, requested: &[Verb]) -> Result<bool> {
        let verbs = resolve_order(requested);
        let _lock = if verbs == [Verb::Help] {
            None
        } else {
            Some(acquire_lock(&self.root)?)
        };

        let mut did_work = false;
        for verb in &verbs {
            let worked = match verb {
                Verb::All => self.all(),
                Verb::Install => self.install(),
                Verb::Uninstall => self.uninstall(),
                Verb::Package => self.package(),
                Verb::Clean => self.clean(),
                Verb::Scrub => self.scrub(),
                Verb::Help => self.help(),
            }
            .with_context(|| format!("running '{verb}'"))?;
            did_work |= worked;
        }

        if !did_work {
            let names: Vec<&str> = verbs.iter().map(|verb| verb.as_str()).collect();
            println!("Nothing to do for targets, [{}]", names.join(", "));
        }
        Ok(did_work)
    }

    /// Load the configuration once and switch to the layout it describes.
    fn config(&mut self) -> Result<&MakerConfig> {
        if self.config.is_none() {
            let config = MakerConfig::load(&self.root)?.ok_or_else(|| Fatal::NotConfigured {
                path: MakerConfig::path(&self.root),
            })?;
            self.layout = config.layout(&self.root);
            self.config = Some(config);
        }
        MakerConfig::require(self.config.as_ref(), &self.root)
    }

    fn ensure_loaded(&mut self) -> Result<()> {
        if self.loaded {
            return Ok(());
        }
        let toolchain = self.config()?.toolchain();
        let descriptors = load_levels(&self.root)?;
        println!(
            "[levelmake] loaded {} element(s) from {}",
            descriptors.len(),
            self.root.display()
        );
        self.elements = descriptors
            .into_iter()
            .map(|descriptor| Element::new(descriptor, &self.layout, &toolchain, self.verbose))
            .collect();
        self.loaded = true;
        Ok(())
    }

    fn all(&mut self) -> Result<bool> {
        let toolchain = self.config()?.toolchain();
        preflight::check_toolchain(&toolchain)?;
        self.ensure_loaded()?;
        self.layout.create_build_dirs()?;

        let mut level = None;
        for element in &mut self.elements {
            announce_level(&mut level, element);
            element.sync()?;
            report_state("sync", element);
        }

        let mut level = None;
        for element in &mut self.elements {
            announce_level(&mut level, element);
            let failures = element.build()?;
            self.failures.extend(failures);
            report_state("build", element);
        }

        self.report_failures();
        Ok(!self.elements.is_empty())
    }

    fn install(&mut self) -> Result<bool> {
        self.ensure_loaded()?;
        self.layout.create_install_dirs()?;
        let tree = self.layout.install_dirs()?;

        for element in &mut self.elements {
            println!(
                "[levelmake:install:{}] gathering into {}",
                element.name(),
                tree.root.display()
            );
            element.gather(tree)?;
            report_state("install", element);
        }
        Ok(!self.elements.is_empty())
    }

    fn uninstall(&mut self) -> Result<bool> {
        self.ensure_loaded()?;
        let tree = self.layout.install_dirs()?;
        if !tree.exists() {
            println!(
                "[levelmake:uninstall] nothing installed under {}",
                tree.root.display()
            );
            return Ok(false);
        }

        let mut removed = 0;
        for element in &mut self.elements {
            removed += element.uninstall(tree)?;
            report_state("uninstall", element);
        }
        println!(
            "[levelmake:uninstall] removed {removed} file(s) from {}",
            tree.root.display()
        );
        Ok(!self.elements.is_empty())
    }

    fn package(&mut self) -> Result<bool> {
        let config = self.config()?.clone();
        let package_name = config.package_name(&self.root);
        let prefix = config.prefix.clone();
        let Some(make_nsis) = config
            .make_nsis
            .clone()
            .filter(|tool| preflight::tool_exists(tool))
        else {
            println!("[levelmake:package] feature unavailable: no usable packaging tool is configured");
            return Ok(false);
        };

        self.ensure_loaded()?;
        self.layout.create_packaging_dirs()?;
        let Some(tree) = self.layout.packaging_dirs() else {
            return Ok(false);
        };

        for element in &mut self.elements {
            println!(
                "[levelmake:package:{}] gathering into {}",
                element.name(),
                tree.root.display()
            );
            element.gather(tree)?;
            report_state("package", element);
        }

        let script = package::write_installer_script(tree, &package_name, &prefix)?;
        println!(
            "[levelmake:package] building {}",
            self.layout
                .build_root()
                .join(package::installer_name(&package_name))
                .display()
        );
        package::run_packager(&make_nsis, &script, &package_name, self.verbose)?;
        Ok(true)
    }

    fn clean(&mut self) -> Result<bool> {
        let build_root = self.layout.build_root().to_path_buf();
        if !build_root.is_dir() {
            return Ok(false);
        }

        let entries = fs::read_dir(&build_root)
            .with_context(|| format!("reading build tree '{}'", build_root.display()))?;
        for entry in entries {
            let path = entry
                .with_context(|| format!("reading entry under '{}'", build_root.display()))?
                .path();
            remove_path(&path)?;
        }

        self.layout.create_build_dirs()?;
        println!(
            "[levelmake:clean] removed checkouts and build output under {}",
            build_root.display()
        );
        Ok(true)
    }

    fn scrub(&mut self) -> Result<bool> {
        let mut targets = vec![
            self.layout.build_root().to_path_buf(),
            MakerConfig::path(&self.root),
        ];
        targets.extend(BUILD_TOOL_CACHE.iter().map(|name| self.root.join(name)));

        let mut removed = false;
        for path in targets {
            if path.symlink_metadata().is_ok() {
                remove_path(&path)?;
                println!("[levelmake:scrub] removed {}", path.display());
                removed = true;
            }
        }
        Ok(removed)
    }

    fn help(&mut self) -> Result<bool> {
        println!("{HELP}");
        Ok(true)
    }

    fn report_failures(&self) {
        if self.failures.is_empty() {
            return;
        }
        eprintln!("WARNING: {} build target(s) failed:", self.failures.len());
        for failure in &self.failures {
            eprintln!(
                "  {} {} ({}): exit code {}",
                failure.element, failure.target, failure.arch, failure.code
            );
        }
    }
}

fn announce_level(current: &mut Option<usize>, element: &Element) {
    let level = element.descriptor().level;
    if *current == Some(level) {
        return;
    }
    if element.descriptor().is_base_level() {
        println!("[levelmake] level {level} (base)");
    } else {
        println!("[levelmake] level {level}");
    }
    *current = Some(level);
}

fn report_state(phase: &str, element: &Element) {
    println!(
        "[levelmake:{phase}:{}] {}",
        element.name(),
        element.state()
    );
}

fn remove_path(path: &Path) -> Result<()> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("removing '{}'", path.display())),
    }
}
