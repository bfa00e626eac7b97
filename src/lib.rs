//! Level-ordered build orchestration for native Windows dependencies.
//!
//! This crate replaces a make/autoconf driver on hosts that have neither.
//! Buildable elements are declared in YAML level documents; each element is
//! synchronized from its git remote, patched, configured and built with the
//! native build tool for every target architecture, and finally gathered
//! into an install prefix or a packaging tree.
//!
//! - **Levels** - Level documents and element descriptors
//! - **Layout** - Build, install and packaging directory trees
//! - **Element** - Per-element lifecycle (sync, build, gather, uninstall)
//! - **Orchestrator** - Verb resolution and the run loop
//! - **Preflight checks** - Host tool validation before builds
//!
//! # Architecture
//!
//! ```text
//! levelmake (binary)
//!     │
//!     └── Orchestrator ── resolve_order(verbs)
//!             │
//!             ├── level::load_levels ──► ElementDescriptor (per level, in order)
//!             ├── StagingLayout ───────► build/, <prefix>/, build/nsis/
//!             └── Element
//!                    ├── sync ─────► git clone/pull, patches, files
//!                    ├── build ────► ElementBuilder ─► cmake per arch
//!                    ├── gather ───► InstallTree
//!                    └── uninstall
//!
//! ProcessRunner sits under every external tool call.
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use levelmake::{Orchestrator, Verb};
//!
//! # fn main() -> anyhow::Result<()> {
//! let root = std::env::current_dir()?;
//! let mut run = Orchestrator::new(root, false);
//! run.run(&[Verb::All, Verb::Install])?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod element;
pub mod error;
pub mod layout;
pub mod level;
pub mod orchestrator;
pub mod preflight;
pub mod process;

#[cfg(all(test, unix))]
mod testutil;

pub use config::{MakerConfig, Toolchain};
pub use element::{Element, ElementBuilder, ElementState, TargetFailure};
pub use error::{exit_code, Fatal};
pub use layout::{Arch, InstallTree, StagingLayout};
pub use level::{load_levels, BuilderKind, ElementDescriptor};
pub use orchestrator::{resolve_order, Orchestrator, Verb};
pub use process::{ProcessRunner, RunningProcess};
