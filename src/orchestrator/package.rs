//! Installer generation from the packaging tree.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

use crate::error::Fatal;
use crate::layout::InstallTree;
use crate::process::ProcessRunner;

pub const SCRIPT_EXTENSION: &str = "nsi";

/// Installer file name, written next to the packaging tree.
pub fn installer_name(package_name: &str) -> String {
    format!("{package_name}-setup.exe")
}

/// Files under the packaging tree, relative to its root, in a stable order.
fn packaged_files(tree: &InstallTree) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(&tree.root)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let rel = entry.path().strip_prefix(&tree.root).ok()?.to_path_buf();
            let is_script = rel.components().count() == 1
                && rel.extension().and_then(|ext| ext.to_str()) == Some(SCRIPT_EXTENSION);
            (!is_script).then_some(rel)
        })
        .collect();

    files.sort_by(|a, b| a.to_string_lossy().cmp(&b.to_string_lossy()));
    files
}

fn windows_path(path: &Path) -> String {
    path.to_string_lossy().replace('/', "\\")
}

/// Render the installer script for everything currently in `tree`.
///
/// Paths in `File` lines are relative to the script, which lives at the
/// tree root. The installer is written one directory up, beside the tree.
pub fn installer_script(tree: &InstallTree, package_name: &str, prefix: &Path) -> String {
    let files = packaged_files(tree);
    let uninstaller = format!("uninstall-{package_name}.exe");

    let mut script = String::new();
    script.push_str("; Generated by levelmake. Changes are overwritten on the next package run.\n");
    script.push_str(&format!("Name \"{package_name}\"\n"));
    script.push_str(&format!(
        "OutFile \"..\\{}\"\n",
        installer_name(package_name)
    ));
    script.push_str(&format!("InstallDir \"{}\"\n", windows_path(prefix)));
    script.push_str("RequestExecutionLevel admin\n\n");

    script.push_str("Section \"Install\"\n");
    let mut out_dir: Option<PathBuf> = None;
    for file in &files {
        let parent = file.parent().map(Path::to_path_buf).unwrap_or_default();
        if out_dir.as_ref() != Some(&parent) {
            if parent.as_os_str().is_empty() {
                script.push_str("  SetOutPath \"$INSTDIR\"\n");
            } else {
                script.push_str(&format!(
                    "  SetOutPath \"$INSTDIR\\{}\"\n",
                    windows_path(&parent)
                ));
            }
            out_dir = Some(parent);
        }
        script.push_str(&format!("  File \"{}\"\n", windows_path(file)));
    }
    script.push_str(&format!("  WriteUninstaller \"$INSTDIR\\{uninstaller}\"\n"));
    script.push_str("SectionEnd\n\n");

    script.push_str("Section \"Uninstall\"\n");
    for file in &files {
        script.push_str(&format!("  Delete \"$INSTDIR\\{}\"\n", windows_path(file)));
    }
    script.push_str(&format!("  Delete \"$INSTDIR\\{uninstaller}\"\n"));
    script.push_str("SectionEnd\n");
    script
}

/// Write `<tree>/<package_name>.nsi` and return its path.
pub fn write_installer_script(
    tree: &InstallTree,
    package_name: &str,
    prefix: &Path,
) -> Result<PathBuf> {
    let script = installer_script(tree, package_name, prefix);
    let path = tree
        .root
        .join(format!("{package_name}.{SCRIPT_EXTENSION}"));
    fs::write(&path, script)
        .with_context(|| format!("writing installer script '{}'", path.display()))?;
    Ok(path)
}

/// Run the packaging tool on `script`. A failure is fatal with the tool's code.
pub fn run_packager(
    make_nsis: &Path,
    script: &Path,
    package_name: &str,
    verbose: bool,
) -> Result<()> {
    let work_dir = script.parent().unwrap_or(Path::new("."));
    let runner = ProcessRunner::new(make_nsis)
        .arg(script)
        .capture()
        .current_dir(work_dir);
    if verbose {
        println!("[levelmake:package] {}", runner.display());
    }

    let mut process = runner.run();
    let ok = process.ok();
    if verbose || !ok {
        for line in process.lines() {
            if ok {
                println!("    {line}");
            } else {
                eprintln!("    {line}");
            }
        }
    }
    if !ok {
        eprintln!("FATAL: packaging failed for {package_name}");
        return Err(Fatal::StepFailed {
            element: package_name.to_string(),
            tool: "makensis".to_string(),
            step: "package".to_string(),
            code: process.rc(),
        }
        .into());
    }
    Ok(())
}
