//! Preflight checks for host tools.
//!
//! Validates that the tools a run shells out to can be found before any
//! element is touched, so a missing tool fails fast with one clear listing
//! instead of midway through a level.
//!
//! # Example
//!
//! ```rust
//! use levelmake::preflight::{check_required_tools, tool_exists};
//! use std::path::Path;
//!
//! if !tool_exists(Path::new("makensis")) {
//!     println!("packaging is unavailable");
//! }
//!
//! let tools = [(Path::new("git"), "Git for Windows"), (Path::new("cmake"), "CMake")];
//! if let Err(e) = check_required_tools(&tools) {
//!     eprintln!("{e}");
//! }
//! ```

use std::path::Path;

use anyhow::Result;

use crate::config::Toolchain;
use crate::error::Fatal;

/// Check if a tool can be run.
///
/// Bare names are looked up on `PATH`; paths with a directory component must
/// point at an executable file.
pub fn tool_exists(tool: &Path) -> bool {
    which::which(tool).is_ok()
}

/// Check that specific tools are available.
///
/// Each tuple is (tool, where to get it). Every missing tool is reported,
/// not only the first.
pub fn check_required_tools(tools: &[(&Path, &str)]) -> Result<()> {
    let missing: Vec<String> = tools
        .iter()
        .filter(|(tool, _)| !tool_exists(tool))
        .map(|(tool, hint)| format!("  {} (install: {})", tool.display(), hint))
        .collect();

    if !missing.is_empty() {
        return Err(Fatal::ToolsMissing {
            listing: missing.join("\n"),
        }
        .into());
    }

    Ok(())
}

/// Tools every building run needs.
pub fn check_toolchain(toolchain: &Toolchain) -> Result<()> {
    check_required_tools(&[
        (toolchain.git.as_path(), "Git for Windows"),
        (toolchain.cmake.as_path(), "CMake"),
    ])
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::exit_code;
    use crate::process::TOOL_NOT_FOUND;

    #[test]
    fn test_tool_exists() {
        assert!(tool_exists(Path::new("sh")));
        assert!(!tool_exists(Path::new("definitely_not_a_real_command_12345")));
    }

    #[test]
    fn test_check_required_tools_success() {
        let tools = [(Path::new("sh"), "coreutils"), (Path::new("ls"), "coreutils")];
        assert!(check_required_tools(&tools).is_ok());
    }

    #[test]
    fn test_check_required_tools_lists_every_missing_tool() {
        let tools = [
            (Path::new("nonexistent_command_xyz"), "fake-package"),
            (Path::new("sh"), "coreutils"),
            (Path::new("/no/such/cmake"), "CMake"),
        ];
        let err = check_required_tools(&tools).unwrap_err();

        assert_eq!(exit_code(&err), TOOL_NOT_FOUND);
        let message = err.to_string();
        assert!(message.contains("nonexistent_command_xyz (install: fake-package)"));
        assert!(message.contains("/no/such/cmake (install: CMake)"));
        assert!(!message.contains("coreutils"));
    }
}
