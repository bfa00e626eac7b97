//! Native build-tool driver for one element.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::config::Toolchain;
use crate::error::Fatal;
use crate::layout::{mkdir, Arch};
use crate::level::BuilderKind;
use crate::process::{ProcessRunner, RunningProcess};

pub const BUILD_CONFIG: &str = "Release";

/// A build target that returned non-zero. Recorded, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFailure {
    pub element: String,
    pub arch: Arch,
    pub target: String,
    pub code: i32,
}

/// Configures and builds one element for every architecture of the run.
#[derive(Debug)]
pub struct ElementBuilder {
    element: String,
    kind: BuilderKind,
    toolchain: Toolchain,
    archs: Vec<Arch>,
    dirs: BTreeMap<Arch, PathBuf>,
    last_rc: i32,
    failures: Vec<TargetFailure>,
    verbose: bool,
}

impl ElementBuilder {
    pub fn new(
        element: &str,
        kind: BuilderKind,
        toolchain: Toolchain,
        archs: Vec<Arch>,
        verbose: bool,
    ) -> Self {
        Self {
            element: element.to_string(),
            kind,
            toolchain,
            archs,
            dirs: BTreeMap::new(),
            last_rc: 0,
            failures: Vec::new(),
            verbose,
        }
    }

    pub fn kind(&self) -> BuilderKind {
        self.kind
    }

    /// Per-architecture build directories configured so far.
    pub fn configured_dirs(&self) -> &BTreeMap<Arch, PathBuf> {
        &self.dirs
    }

    pub fn last_rc(&self) -> i32 {
        self.last_rc
    }

    pub fn failures(&self) -> &[TargetFailure] {
        &self.failures
    }

    /// Configure every architecture under `build_dir`, pointing the tool at
    /// `script_path`. The first failing configure is fatal.
    pub fn configure(
        &mut self,
        build_dir: &Path,
        script_path: &Path,
        params: &[String],
    ) -> Result<()> {
        if self.kind == BuilderKind::None {
            return Ok(());
        }

        for arch in self.archs.clone() {
            let arch_dir = build_dir.join(arch.as_str());
            mkdir(&arch_dir)?;

            let mut runner = self
                .tool(arch)
                .arg(script_path)
                .args(["-A", arch.as_str()])
                .current_dir(&arch_dir);
            if let Some(generator) = &self.toolchain.generator {
                runner = runner.arg("-G").arg(generator);
            }
            if let Some(compiler) = &self.toolchain.compiler {
                runner = runner.arg(format!("-DCMAKE_CXX_COMPILER={compiler}"));
            }
            runner = runner.args(params);

            let mut process = self.start("configure", arch, &runner);
            self.last_rc = process.rc();
            if !process.ok() {
                report_failure(&mut process);
                eprintln!(
                    "ERROR: {} configure failed for {} ({arch})",
                    self.kind, self.element
                );
                return Err(Fatal::StepFailed {
                    element: self.element.clone(),
                    tool: self.kind.to_string(),
                    step: format!("configure ({arch})"),
                    code: self.last_rc,
                }
                .into());
            }
            self.dirs.insert(arch, arch_dir);
        }
        Ok(())
    }

    /// Build one target in every configured architecture. Failures are
    /// recorded and the remaining architectures still run.
    pub fn build_target(&mut self, target: &str) {
        let dirs: Vec<(Arch, PathBuf)> = self
            .dirs
            .iter()
            .map(|(arch, dir)| (*arch, dir.clone()))
            .collect();

        for (arch, dir) in dirs {
            let runner = self
                .tool(arch)
                .args(["--build", ".", "--config", BUILD_CONFIG, "-t", target])
                .current_dir(&dir);
            let mut process = self.start("build", arch, &runner);
            self.last_rc = process.rc();
            if !process.ok() {
                report_failure(&mut process);
                eprintln!(
                    "WARNING: target {target} of {} failed for {arch} (exit code {})",
                    self.element, self.last_rc
                );
                self.failures.push(TargetFailure {
                    element: self.element.clone(),
                    arch,
                    target: target.to_string(),
                    code: self.last_rc,
                });
            }
        }
    }

    fn tool(&self, arch: Arch) -> ProcessRunner {
        let runner = match self.toolchain.env_scripts.get(&arch) {
            Some(script) => {
                ProcessRunner::new(with_env_script(script, &self.toolchain.cmake)).through_shell()
            }
            None => ProcessRunner::new(&self.toolchain.cmake),
        };
        runner.capture()
    }

    fn start(&self, step: &str, arch: Arch, runner: &ProcessRunner) -> RunningProcess {
        if self.verbose {
            println!(
                "[levelmake:{step}:{}:{arch}] {}",
                self.element,
                runner.display()
            );
        }
        let mut process = runner.run();
        if self.verbose {
            for line in process.lines() {
                println!("    {line}");
            }
        }
        process
    }
}

/// Command prefix that loads an environment-setup script before the tool.
fn with_env_script(script: &Path, tool: &Path) -> String {
    if cfg!(windows) {
        format!(
            "call \"{}\" >nul && \"{}\"",
            script.display(),
            tool.display()
        )
    } else {
        format!(". '{}' && '{}'", script.display(), tool.display())
    }
}

fn report_failure(process: &mut RunningProcess) {
    for line in process.lines() {
        eprintln!("    {line}");
    }
}
