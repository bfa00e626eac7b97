//! Fatal conditions and the process exit codes they map to.
//!
//! Everything fallible in this crate returns `anyhow::Result`. Conditions
//! that must end the run with a specific exit code are raised as a
//! [`Fatal`] inside the `anyhow::Error`; [`exit_code`] recovers the code
//! from anywhere in the context chain.

use std::io;
use std::path::PathBuf;

use crate::process::TOOL_NOT_FOUND;

/// Exit code for errors that carry no more specific code.
pub const EXIT_GENERIC: i32 = 1;
/// `configvars.toml` is missing; the configure step has not been run.
pub const EXIT_NOT_CONFIGURED: i32 = 3;
/// A staging directory could not be created.
pub const EXIT_CREATE_DIR: i32 = 4;
/// Another run holds the working-directory lock.
pub const EXIT_BUSY: i32 = 5;
/// A level document could not be parsed or is structurally invalid.
pub const EXIT_LEVEL_INVALID: i32 = 115;
/// A level document parsed to nothing.
pub const EXIT_LEVEL_EMPTY: i32 = 116;

#[derive(Debug, thiserror::Error)]
pub enum Fatal {
    /// A required lifecycle step ran its tool and the tool failed.
    #[error("{tool} {step} command failed for {element} (exit code {code})")]
    StepFailed {
        element: String,
        tool: String,
        step: String,
        code: i32,
    },

    /// Clone reported success but left no usable checkout behind.
    #[error("the project source for {element} could not be cloned into {}", path.display())]
    CloneMissing { element: String, path: PathBuf },

    #[error("the directory {} could not be created", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("loading {file} failed: {message}")]
    LevelInvalid { file: String, message: String },

    #[error("loading {file} failed: empty file")]
    LevelEmpty { file: String },

    #[error("no configuration found at {}; run the configure step first", path.display())]
    NotConfigured { path: PathBuf },

    #[error("another run holds {}", path.display())]
    Busy { path: PathBuf },

    #[error("missing required host tools:\n{listing}")]
    ToolsMissing { listing: String },
}

impl Fatal {
    pub fn exit_code(&self) -> i32 {
        match self {
            Fatal::StepFailed { code, .. } => nonzero(*code),
            Fatal::CloneMissing { .. } => EXIT_GENERIC,
            Fatal::CreateDir { .. } => EXIT_CREATE_DIR,
            Fatal::LevelInvalid { .. } => EXIT_LEVEL_INVALID,
            Fatal::LevelEmpty { .. } => EXIT_LEVEL_EMPTY,
            Fatal::NotConfigured { .. } => EXIT_NOT_CONFIGURED,
            Fatal::Busy { .. } => EXIT_BUSY,
            Fatal::ToolsMissing { .. } => TOOL_NOT_FOUND,
        }
    }
}

/// A failing step must never turn into a successful exit.
fn nonzero(code: i32) -> i32 {
    if code == 0 {
        EXIT_GENERIC
    } else {
        code
    }
}

/// Exit code for an error returned from a run.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<Fatal>())
        .map(Fatal::exit_code)
        .unwrap_or(EXIT_GENERIC)
}
