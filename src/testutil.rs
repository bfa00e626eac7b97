//! Fake host tools for lifecycle tests.
//!
//! The fakes are small shell scripts that append one line per invocation to
//! a log file, so tests can assert on the exact command sequence.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::config::Toolchain;

static PROCESS_LOCK: Mutex<()> = Mutex::new(());

/// Serializes tests that write executables or spawn children, so no child
/// inherits a script that is still open for writing.
pub(crate) fn process_lock() -> MutexGuard<'static, ()> {
    PROCESS_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone)]
pub(crate) struct FakeOptions {
    pub clone_exit: i32,
    /// When false, clone "succeeds" without leaving `.git` behind.
    pub clone_creates_checkout: bool,
    pub configure_exit: i32,
    /// Target name that makes the build step fail with code 2.
    pub failing_target: Option<String>,
    /// Files each build step creates in its working directory.
    pub build_outputs: Vec<String>,
}

impl Default for FakeOptions {
    fn default() -> Self {
        Self {
            clone_exit: 0,
            clone_creates_checkout: true,
            configure_exit: 0,
            failing_target: None,
            build_outputs: Vec::new(),
        }
    }
}

pub(crate) struct FakeTools {
    pub git: PathBuf,
    pub cmake: PathBuf,
    pub log: PathBuf,
}

impl FakeTools {
    pub fn install(dir: &Path, options: &FakeOptions) -> Self {
        fs::create_dir_all(dir).unwrap();
        let log = dir.join("calls.log");
        let git = dir.join("fake-git");
        let cmake = dir.join("fake-cmake");

        let clone_body = if options.clone_exit != 0 {
            format!("exit {}", options.clone_exit)
        } else if options.clone_creates_checkout {
            "mkdir -p \"$3/.git\" && echo synced > \"$3/README\"".to_string()
        } else {
            "mkdir -p \"$3\"".to_string()
        };
        write_script(
            &git,
            &format!(
                r#"#!/bin/sh
LOG='{log}'
case "$1" in
  clone)
    echo "git clone $2 $(basename "$3")" >> "$LOG"
    {clone_body}
    ;;
  apply)
    if [ "$2" = "-R" ]; then
      echo "git apply -R $(basename "$3")" >> "$LOG"
    else
      echo "git apply $(basename "$2")" >> "$LOG"
    fi
    ;;
  *)
    echo "git $*" >> "$LOG"
    ;;
esac
exit 0
"#,
                log = log.display(),
            ),
        );

        let failing = options.failing_target.clone().unwrap_or_default();
        let outputs = options.build_outputs.join(" ");
        write_script(
            &cmake,
            &format!(
                r#"#!/bin/sh
LOG='{log}'
if [ "$1" = "--build" ]; then
  echo "cmake build $6 $(basename "$(pwd)")" >> "$LOG"
  if [ -n "{failing}" ] && [ "$6" = "{failing}" ]; then
    exit 2
  fi
  for f in {outputs}; do
    touch "$f"
  done
  exit 0
fi
echo "cmake configure $(basename "$1") $3 $(basename "$(pwd)")" >> "$LOG"
exit {configure_exit}
"#,
                log = log.display(),
                configure_exit = options.configure_exit,
            ),
        );

        Self { git, cmake, log }
    }

    pub fn toolchain(&self) -> Toolchain {
        Toolchain {
            git: self.git.clone(),
            cmake: self.cmake.clone(),
            ..Toolchain::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn clear(&self) {
        let _ = fs::remove_file(&self.log);
    }

    /// `configvars.toml` body pointing at these fakes.
    pub fn config_toml(&self, prefix: &Path) -> String {
        format!(
            "prefix = '{}'\ngit = '{}'\ncmake = '{}'\n",
            prefix.display(),
            self.git.display(),
            self.cmake.display()
        )
    }
}

fn write_script(path: &Path, body: &str) {
    fs::write(path, body).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}
