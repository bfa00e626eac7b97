//! Per-element lifecycle: sync, build, gather, uninstall.
//!
//! An element keeps no state between runs beyond what is on disk: the
//! checkout under `build/source/<name>`, the build output under
//! `build/build/<name>`, and whatever patches are applied to the checkout.
//! Patches are always reverse-applied before pulling and re-applied after,
//! so syncing an unchanged remote twice leaves the tree as it was.

mod builder;

pub use builder::{ElementBuilder, TargetFailure, BUILD_CONFIG};

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::config::Toolchain;
use crate::error::Fatal;
use crate::layout::{mkdir, Arch, InstallTree, StagingLayout};
use crate::level::{DeliverableKind, ElementDescriptor};
use crate::process::{ProcessRunner, RunningProcess};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementState {
    Unsynced,
    Synced,
    Built,
    Gathered,
    Uninstalled,
}

impl fmt::Display for ElementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementState::Unsynced => write!(f, "Unsynced"),
            ElementState::Synced => write!(f, "Synced"),
            ElementState::Built => write!(f, "Built"),
            ElementState::Gathered => write!(f, "Gathered"),
            ElementState::Uninstalled => write!(f, "Uninstalled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatchDirection {
    Forward,
    Reverse,
}

/// Runtime unit built from one [`ElementDescriptor`].
#[derive(Debug)]
pub struct Element {
    descriptor: ElementDescriptor,
    root: PathBuf,
    source_root: PathBuf,
    source_dir: PathBuf,
    build_dir: PathBuf,
    script_path: PathBuf,
    patches_dir: PathBuf,
    git: PathBuf,
    archs: Vec<Arch>,
    builder: ElementBuilder,
    state: ElementState,
    verbose: bool,
}

impl Element {
    pub fn new(
        descriptor: ElementDescriptor,
        layout: &StagingLayout,
        toolchain: &Toolchain,
        verbose: bool,
    ) -> Self {
        let source_dir = layout.source_dir().join(&descriptor.name);
        let build_dir = layout.build_dir().join(&descriptor.name);
        let script_path = match &descriptor.script_path {
            Some(relative) => source_dir.join(relative),
            None => source_dir.clone(),
        };
        let builder = ElementBuilder::new(
            &descriptor.name,
            descriptor.builder,
            toolchain.clone(),
            layout.archs().to_vec(),
            verbose,
        );

        Self {
            root: layout.root().to_path_buf(),
            source_root: layout.source_dir().to_path_buf(),
            patches_dir: layout.patches_dir(),
            git: toolchain.git.clone(),
            archs: layout.archs().to_vec(),
            descriptor,
            source_dir,
            build_dir,
            script_path,
            builder,
            state: ElementState::Unsynced,
            verbose,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &ElementDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> ElementState {
        self.state
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    pub fn builder(&self) -> &ElementBuilder {
        &self.builder
    }

    /// Bring the checkout up to date with its remote and re-apply patches.
    pub fn sync(&mut self) -> Result<()> {
        if !self.descriptor.has_remote() {
            println!(
                "[levelmake:sync:{}] no source remote; nothing to synchronize",
                self.name()
            );
            self.state = ElementState::Synced;
            return Ok(());
        }

        if self.source_dir.is_dir() {
            self.apply_patches(PatchDirection::Reverse);
            println!("[levelmake:sync:{}] pulling", self.name());
            self.run_git("pull", self.git().arg("pull"))?;
        } else {
            println!(
                "[levelmake:sync:{}] cloning {}",
                self.name(),
                self.descriptor.source
            );
            mkdir(&self.source_root)?;
            let clone = ProcessRunner::new(&self.git)
                .capture()
                .current_dir(&self.source_root)
                .arg("clone")
                .arg(&self.descriptor.source)
                .arg(&self.source_dir);
            self.run_git("clone", clone)?;
        }

        if !self.source_dir.is_dir() || !self.source_dir.join(".git").exists() {
            eprintln!(
                "FATAL: The project source for {} could not be cloned",
                self.name()
            );
            return Err(Fatal::CloneMissing {
                element: self.name().to_string(),
                path: self.source_dir.clone(),
            }
            .into());
        }

        self.run_git(
            "submodule",
            self.git()
                .args(["submodule", "update", "--init", "--recursive"]),
        )?;
        self.run_git("status", self.git().arg("status"))?;

        self.apply_patches(PatchDirection::Forward);
        self.copy_additional_files()?;
        self.state = ElementState::Synced;
        Ok(())
    }

    /// Apply every declared patch in declaration order.
    pub fn apply_patches_forward(&self) {
        self.apply_patches(PatchDirection::Forward);
    }

    /// Reverse-apply the declared patches, last first.
    pub fn revert_patches(&self) {
        self.apply_patches(PatchDirection::Reverse);
    }

    fn apply_patches(&self, direction: PatchDirection) {
        let patches: Vec<&String> = match direction {
            PatchDirection::Forward => self.descriptor.patches.iter().collect(),
            PatchDirection::Reverse => self.descriptor.patches.iter().rev().collect(),
        };

        for patch in patches {
            let patch_file = self.patches_dir.join(patch);
            let mut runner = self.git().arg("apply");
            if direction == PatchDirection::Reverse {
                runner = runner.arg("-R");
            }
            let mut process = self.start(runner.arg(&patch_file));
            // Best effort: reverting a patch that is not applied fails harmlessly.
            if !process.ok() && self.verbose {
                eprintln!(
                    "WARNING: git apply{} {} did not apply cleanly to {}",
                    if direction == PatchDirection::Reverse { " -R" } else { "" },
                    patch,
                    self.name()
                );
            }
        }
    }

    fn copy_additional_files(&self) -> Result<()> {
        for file in &self.descriptor.files {
            let source = self.root.join(file);
            copy_into(&source, &self.source_dir).with_context(|| {
                format!("copying additional file '{}' for {}", file, self.name())
            })?;
        }
        Ok(())
    }

    /// Configure and build every declared target for every architecture.
    pub fn build(&mut self) -> Result<Vec<TargetFailure>> {
        mkdir(&self.build_dir)?;
        println!(
            "[levelmake:build:{}] {} ({})",
            self.name(),
            self.builder.kind(),
            self.archs
                .iter()
                .map(|arch| arch.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        self.builder.configure(
            &self.build_dir,
            &self.script_path,
            &self.descriptor.prebuild_params,
        )?;
        for target in &self.descriptor.targets {
            self.builder.build_target(target);
        }

        self.state = ElementState::Built;
        Ok(self.builder.failures().to_vec())
    }

    /// Copy headers and deliverables into `tree`.
    ///
    /// # Panics
    ///
    /// A deliverable that is neither `.lib` nor `.dll` is a broken level
    /// document and panics before anything is copied.
    pub fn gather(&mut self, tree: &InstallTree) -> Result<()> {
        let deliverables = self.classified_deliverables();

        for (header, sub_dir) in &self.descriptor.headers {
            let source = self.source_dir.join(header);
            let dest_dir = header_dest(tree, sub_dir);
            mkdir(&dest_dir)?;
            copy_into(&source, &dest_dir)
                .with_context(|| format!("gathering header '{}' of {}", header, self.name()))?;
        }

        for (deliverable, kind) in deliverables {
            for arch in &self.archs {
                let source = self.build_dir.join(arch.as_str()).join(deliverable);
                let dest_dir = deliverable_dest(tree, kind, *arch);
                mkdir(dest_dir)?;
                copy_into(&source, dest_dir).with_context(|| {
                    format!(
                        "gathering deliverable '{}' of {} for {arch}",
                        deliverable,
                        self.name()
                    )
                })?;
            }
        }

        if self.verbose {
            println!(
                "[levelmake:gather:{}] {} header(s), {} deliverable(s) into {}",
                self.name(),
                self.descriptor.headers.len(),
                self.descriptor.deliverables.len(),
                tree.root.display()
            );
        }
        self.state = ElementState::Gathered;
        Ok(())
    }

    /// Remove what [`Element::gather`] put into `tree`. Returns the number of
    /// files removed; an absent tree removes nothing.
    pub fn uninstall(&mut self, tree: &InstallTree) -> Result<usize> {
        let deliverables = self.classified_deliverables();
        if !tree.exists() {
            self.state = ElementState::Uninstalled;
            return Ok(0);
        }

        let mut removed = 0;
        for (header, sub_dir) in &self.descriptor.headers {
            let dest_dir = header_dest(tree, sub_dir);
            removed += remove_if_present(&dest_dir.join(file_name(header)?))?;
            prune_empty_dirs(&dest_dir, &tree.include)?;
        }

        for (deliverable, kind) in deliverables {
            for arch in &self.archs {
                let dest_dir = deliverable_dest(tree, kind, *arch);
                removed += remove_if_present(&dest_dir.join(file_name(deliverable)?))?;
            }
        }

        if self.verbose {
            println!(
                "[levelmake:uninstall:{}] removed {removed} file(s) from {}",
                self.name(),
                tree.root.display()
            );
        }
        self.state = ElementState::Uninstalled;
        Ok(removed)
    }

    fn classified_deliverables(&self) -> Vec<(&str, DeliverableKind)> {
        self.descriptor
            .deliverables
            .iter()
            .map(|deliverable| match DeliverableKind::of(deliverable) {
                Some(kind) => (deliverable.as_str(), kind),
                None => panic!(
                    "deliverable '{}' of {} must be a .lib or .dll",
                    deliverable, self.descriptor.name
                ),
            })
            .collect()
    }

    fn git(&self) -> ProcessRunner {
        ProcessRunner::new(&self.git)
            .capture()
            .current_dir(&self.source_dir)
    }

    fn start(&self, runner: ProcessRunner) -> RunningProcess {
        if self.verbose {
            println!("[levelmake:sync:{}] {}", self.name(), runner.display());
        }
        let mut process = runner.run();
        if self.verbose {
            for line in process.lines() {
                println!("    {line}");
            }
        }
        process
    }

    fn run_git(&self, step: &str, runner: ProcessRunner) -> Result<()> {
        let mut process = self.start(runner);
        if process.ok() {
            return Ok(());
        }
        if !self.verbose {
            for line in process.lines() {
                eprintln!("    {line}");
            }
        }
        eprintln!("FATAL: git {step} command failed for {}", self.name());
        Err(Fatal::StepFailed {
            element: self.name().to_string(),
            tool: "git".to_string(),
            step: step.to_string(),
            code: process.rc(),
        }
        .into())
    }
}

fn header_dest(tree: &InstallTree, sub_dir: &str) -> PathBuf {
    if sub_dir == "." {
        tree.include.clone()
    } else {
        tree.include.join(sub_dir)
    }
}

fn deliverable_dest(tree: &InstallTree, kind: DeliverableKind, arch: Arch) -> &Path {
    match kind {
        DeliverableKind::Library => tree.lib_dir(arch),
        DeliverableKind::SharedLibrary => tree.bin_dir(arch),
    }
}

fn file_name(path: &str) -> Result<&std::ffi::OsStr> {
    match Path::new(path).file_name() {
        Some(name) => Ok(name),
        None => bail!("'{}' does not name a file", path),
    }
}

/// Copy `source` into `dest_dir`, keeping its file name.
fn copy_into(source: &Path, dest_dir: &Path) -> Result<()> {
    let name = source
        .file_name()
        .with_context(|| format!("'{}' does not name a file", source.display()))?;
    let dest = dest_dir.join(name);
    fs::copy(source, &dest).with_context(|| {
        format!("copying '{}' to '{}'", source.display(), dest.display())
    })?;
    Ok(())
}

fn remove_if_present(path: &Path) -> Result<usize> {
    match fs::remove_file(path) {
        Ok(()) => Ok(1),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(err) => Err(err).with_context(|| format!("removing '{}'", path.display())),
    }
}

/// Returns whether `dir` was removed.
fn remove_dir_if_empty(dir: &Path) -> Result<bool> {
    let Ok(mut entries) = fs::read_dir(dir) else {
        return Ok(false);
    };
    if entries.next().is_some() {
        return Ok(false);
    }
    fs::remove_dir(dir).with_context(|| format!("removing empty '{}'", dir.display()))?;
    Ok(true)
}

/// Remove `dir` and then each parent below `stop` for as long as they are empty.
fn prune_empty_dirs(dir: &Path, stop: &Path) -> Result<()> {
    let mut current = dir;
    while current != stop && current.starts_with(stop) {
        if !remove_dir_if_empty(current)? {
            break;
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::level::parse_level;
    use crate::testutil::{process_lock, FakeOptions, FakeTools};
    use tempfile::TempDir;

    struct Fixture {
        temp: TempDir,
        layout: StagingLayout,
        tools: FakeTools,
    }

    impl Fixture {
        fn new(options: FakeOptions) -> Self {
            let temp = TempDir::new().unwrap();
            let tools = FakeTools::install(&temp.path().join("tools"), &options);
            let layout = StagingLayout::new(
                temp.path(),
                Some(temp.path().join("prefix")),
                false,
                Arch::DEFAULT_BUILD.to_vec(),
            );
            layout.create_build_dirs().unwrap();
            Self {
                temp,
                layout,
                tools,
            }
        }

        fn element(&self, yaml: &str) -> Element {
            let descriptor = parse_level("00-base.yaml", 0, yaml).unwrap().remove(0);
            Element::new(descriptor, &self.layout, &self.tools.toolchain(), false)
        }

        fn prefix(&self) -> PathBuf {
            self.temp.path().join("prefix")
        }
    }

    const FOO: &str = "\
foo:
  source: https://example/foo.git
  patches: [one.patch, two.patch]
";

    #[test]
    fn first_sync_clones_then_applies_patches() {
        let _guard = process_lock();
        let fixture = Fixture::new(FakeOptions::default());
        let mut foo = fixture.element(FOO);

        foo.sync().unwrap();

        assert_eq!(
            fixture.tools.calls(),
            [
                "git clone https://example/foo.git foo",
                "git submodule update --init --recursive",
                "git status",
                "git apply one.patch",
                "git apply two.patch",
            ]
        );
        assert_eq!(foo.state(), ElementState::Synced);
        assert!(foo.source_dir().join(".git").is_dir());
    }

    #[test]
    fn resync_reverts_patches_pulls_and_reapplies() {
        let _guard = process_lock();
        let fixture = Fixture::new(FakeOptions::default());
        let mut foo = fixture.element(FOO);
        foo.sync().unwrap();
        let readme = fs::read_to_string(foo.source_dir().join("README")).unwrap();
        fixture.tools.clear();

        foo.sync().unwrap();
        foo.sync().unwrap();

        let once = [
            "git apply -R two.patch",
            "git apply -R one.patch",
            "git pull",
            "git submodule update --init --recursive",
            "git status",
            "git apply one.patch",
            "git apply two.patch",
        ];
        let expected: Vec<&str> = once.iter().chain(once.iter()).copied().collect();
        assert_eq!(fixture.tools.calls(), expected);
        assert_eq!(
            fs::read_to_string(foo.source_dir().join("README")).unwrap(),
            readme
        );
    }

    #[test]
    fn clone_failure_propagates_tool_code() {
        let _guard = process_lock();
        let fixture = Fixture::new(FakeOptions {
            clone_exit: 128,
            ..FakeOptions::default()
        });
        let mut foo = fixture.element(FOO);

        let err = foo.sync().unwrap_err();
        assert_eq!(crate::error::exit_code(&err), 128);
        assert_eq!(foo.state(), ElementState::Unsynced);
        assert_eq!(fixture.tools.calls().len(), 1);
    }

    #[test]
    fn clone_without_checkout_is_fatal() {
        let _guard = process_lock();
        let fixture = Fixture::new(FakeOptions {
            clone_creates_checkout: false,
            ..FakeOptions::default()
        });
        let mut foo = fixture.element(FOO);

        let err = foo.sync().unwrap_err();
        assert!(err.to_string().contains("could not be cloned"));
        assert_eq!(crate::error::exit_code(&err), crate::error::EXIT_GENERIC);
    }

    #[test]
    fn missing_git_reports_tool_not_found() {
        let _guard = process_lock();
        let fixture = Fixture::new(FakeOptions::default());
        let descriptor = parse_level("00-base.yaml", 0, FOO).unwrap().remove(0);
        let toolchain = Toolchain {
            git: PathBuf::from("definitely_not_a_real_git_12345"),
            ..fixture.tools.toolchain()
        };
        let mut foo = Element::new(descriptor, &fixture.layout, &toolchain, false);

        let err = foo.sync().unwrap_err();
        assert_eq!(
            crate::error::exit_code(&err),
            crate::process::TOOL_NOT_FOUND
        );
    }

    #[test]
    fn element_without_remote_skips_version_control() {
        let _guard = process_lock();
        let fixture = Fixture::new(FakeOptions::default());
        let mut local = fixture.element("local:\n  builder: none\n");

        local.sync().unwrap();
        assert!(fixture.tools.calls().is_empty());
        assert_eq!(local.state(), ElementState::Synced);
    }

    #[test]
    fn additional_files_are_copied_after_sync() {
        let _guard = process_lock();
        let fixture = Fixture::new(FakeOptions::default());
        fs::create_dir_all(fixture.temp.path().join("extras")).unwrap();
        fs::write(
            fixture.temp.path().join("extras/CMakeLists.txt"),
            "project(foo)\n",
        )
        .unwrap();
        let mut foo = fixture.element(
            "foo:\n  source: https://example/foo.git\n  files: [extras/CMakeLists.txt]\n",
        );

        foo.sync().unwrap();
        assert_eq!(
            fs::read_to_string(foo.source_dir().join("CMakeLists.txt")).unwrap(),
            "project(foo)\n"
        );
    }

    #[test]
    fn build_configures_and_builds_each_architecture() {
        let _guard = process_lock();
        let fixture = Fixture::new(FakeOptions::default());
        let mut foo = fixture.element(
            "foo:\n  source: https://example/foo.git\n  targets: [ALL_BUILD]\n  script_path: cmake\n",
        );

        let failures = foo.build().unwrap();

        assert!(failures.is_empty());
        assert_eq!(
            fixture.tools.calls(),
            [
                "cmake configure cmake Win32 Win32",
                "cmake configure cmake x64 x64",
                "cmake build ALL_BUILD Win32",
                "cmake build ALL_BUILD x64",
            ]
        );
        assert_eq!(foo.script_path(), foo.source_dir().join("cmake"));
        assert_eq!(foo.state(), ElementState::Built);
    }

    fn stage_outputs(foo: &Element, names: &[&str]) {
        for arch in Arch::DEFAULT_BUILD {
            let dir = foo.build_dir().join(arch.as_str());
            fs::create_dir_all(&dir).unwrap();
            for name in names {
                fs::write(dir.join(name), format!("{name} for {arch}")).unwrap();
            }
        }
    }

    #[test]
    fn gather_routes_lib_to_lib_dirs_only() {
        let fixture = Fixture::new(FakeOptions::default());
        let mut foo = fixture.element("foo:\n  deliverables: [foo.lib]\n");
        stage_outputs(&foo, &["foo.lib"]);
        let tree = InstallTree::new(&fixture.prefix());

        foo.gather(&tree).unwrap();

        for arch in Arch::DEFAULT_BUILD {
            let lib = tree.lib_dir(arch).join("foo.lib");
            assert_eq!(fs::read_to_string(lib).unwrap(), format!("foo.lib for {arch}"));
            assert!(!tree.bin_dir(arch).join("foo.lib").exists());
        }
        assert!(!tree.lib_dir(Arch::Arm64).join("foo.lib").exists());
        assert_eq!(foo.state(), ElementState::Gathered);
    }

    #[test]
    fn gather_routes_dll_to_bin_dirs_only() {
        let fixture = Fixture::new(FakeOptions::default());
        let mut foo = fixture.element("foo:\n  deliverables: [foo.dll]\n");
        stage_outputs(&foo, &["foo.dll"]);
        let tree = InstallTree::new(&fixture.prefix());

        foo.gather(&tree).unwrap();

        for arch in Arch::DEFAULT_BUILD {
            assert!(tree.bin_dir(arch).join("foo.dll").is_file());
            assert!(!tree.lib_dir(arch).join("foo.dll").exists());
        }
    }

    #[test]
    #[should_panic(expected = "must be a .lib or .dll")]
    fn gather_rejects_unknown_deliverable_extension() {
        let fixture = Fixture::new(FakeOptions::default());
        let mut foo = fixture.element("foo:\n  deliverables: [foo.exe]\n");
        let tree = InstallTree::new(&fixture.prefix());

        let _ = foo.gather(&tree);
    }

    #[test]
    fn gather_places_headers_by_mapping() {
        let fixture = Fixture::new(FakeOptions::default());
        let mut foo = fixture.element(
            "foo:\n  headers:\n    include/foo.h: .\n    include/detail/impl.h: foo/detail\n",
        );
        let include = foo.source_dir().join("include");
        fs::create_dir_all(include.join("detail")).unwrap();
        fs::write(include.join("foo.h"), "// foo").unwrap();
        fs::write(include.join("detail/impl.h"), "// impl").unwrap();
        let tree = InstallTree::new(&fixture.prefix());

        foo.gather(&tree).unwrap();

        assert!(tree.include.join("foo.h").is_file());
        assert_eq!(
            fs::read_to_string(tree.include.join("foo/detail/impl.h")).unwrap(),
            "// impl"
        );
    }

    #[test]
    fn missing_deliverable_is_an_error() {
        let fixture = Fixture::new(FakeOptions::default());
        let mut foo = fixture.element("foo:\n  deliverables: [foo.lib]\n");
        let tree = InstallTree::new(&fixture.prefix());

        let err = foo.gather(&tree).unwrap_err();
        assert!(format!("{err:#}").contains("foo.lib"));
    }

    #[test]
    fn uninstall_removes_what_gather_placed() {
        let fixture = Fixture::new(FakeOptions::default());
        let mut foo = fixture.element(
            "foo:\n  headers:\n    foo.h: foo/detail\n  deliverables: [foo.lib, foo.dll]\n",
        );
        fs::create_dir_all(foo.source_dir()).unwrap();
        fs::write(foo.source_dir().join("foo.h"), "// foo").unwrap();
        stage_outputs(&foo, &["foo.lib", "foo.dll"]);
        let tree = InstallTree::new(&fixture.prefix());
        foo.gather(&tree).unwrap();

        let removed = foo.uninstall(&tree).unwrap();

        assert_eq!(removed, 5);
        assert!(!tree.include.join("foo").exists());
        assert!(!tree.lib_dir(Arch::X64).join("foo.lib").exists());
        assert!(!tree.bin_dir(Arch::Win32).join("foo.dll").exists());
        assert!(tree.include.is_dir());
        assert_eq!(foo.state(), ElementState::Uninstalled);
    }

    #[test]
    fn uninstall_keeps_header_dirs_still_in_use() {
        let fixture = Fixture::new(FakeOptions::default());
        let mut foo = fixture.element("foo:\n  headers:\n    foo.h: shared/foo\n");
        fs::create_dir_all(foo.source_dir()).unwrap();
        fs::write(foo.source_dir().join("foo.h"), "// foo").unwrap();
        let tree = InstallTree::new(&fixture.prefix());
        foo.gather(&tree).unwrap();
        fs::write(tree.include.join("shared/other.h"), "// other").unwrap();

        assert_eq!(foo.uninstall(&tree).unwrap(), 1);
        assert!(!tree.include.join("shared/foo").exists());
        assert!(tree.include.join("shared/other.h").is_file());
    }

    #[test]
    fn states_display_by_name() {
        assert_eq!(ElementState::Unsynced.to_string(), "Unsynced");
        assert_eq!(ElementState::Gathered.to_string(), "Gathered");
        assert_eq!(ElementState::Uninstalled.to_string(), "Uninstalled");
    }

    #[test]
    fn uninstall_without_install_tree_is_a_no_op() {
        let fixture = Fixture::new(FakeOptions::default());
        let mut foo = fixture.element("foo:\n  deliverables: [foo.lib]\n");
        let tree = InstallTree::new(&fixture.temp.path().join("missing-prefix"));

        assert_eq!(foo.uninstall(&tree).unwrap(), 0);
        assert!(!fixture.temp.path().join("missing-prefix").exists());
    }

    #[test]
    fn patch_round_trip_restores_the_tree() {
        let _guard = process_lock();
        if which::which("git").is_err() {
            eprintln!("git not on PATH; skipping");
            return;
        }
        let fixture = Fixture::new(FakeOptions::default());
        let patches = fixture.temp.path().join("patches");
        fs::create_dir_all(&patches).unwrap();
        fs::write(
            patches.join("greeting.patch"),
            "--- a/hello.txt\n+++ b/hello.txt\n@@ -1 +1 @@\n-hello\n+hello, patched\n",
        )
        .unwrap();

        let descriptor = parse_level(
            "00-base.yaml",
            0,
            "foo:\n  source: https://example/foo.git\n  patches: [greeting.patch]\n",
        )
        .unwrap()
        .remove(0);
        let toolchain = Toolchain {
            git: PathBuf::from("git"),
            ..fixture.tools.toolchain()
        };
        let foo = Element::new(descriptor, &fixture.layout, &toolchain, false);
        fs::create_dir_all(foo.source_dir()).unwrap();
        let init = ProcessRunner::new("git")
            .arg("init")
            .capture()
            .current_dir(foo.source_dir())
            .run()
            .rc();
        assert_eq!(init, 0);
        let hello = foo.source_dir().join("hello.txt");
        fs::write(&hello, "hello\n").unwrap();

        foo.apply_patches_forward();
        assert_eq!(fs::read_to_string(&hello).unwrap(), "hello, patched\n");

        foo.revert_patches();
        assert_eq!(fs::read_to_string(&hello).unwrap(), "hello\n");
    }
}
