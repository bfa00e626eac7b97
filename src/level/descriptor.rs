//! One element's declared metadata.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use serde::Deserialize;

/// Native build tool that drives an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuilderKind {
    #[default]
    Cmake,
    /// Nothing to build; headers or prebuilt deliverables only.
    None,
}

impl FromStr for BuilderKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cmake" => Ok(BuilderKind::Cmake),
            "none" => Ok(BuilderKind::None),
            other => bail!("unsupported builder '{}' (expected 'cmake' or 'none')", other),
        }
    }
}

impl fmt::Display for BuilderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuilderKind::Cmake => write!(f, "cmake"),
            BuilderKind::None => write!(f, "none"),
        }
    }
}

/// Where a deliverable is staged, decided by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliverableKind {
    /// Static or import library (`.lib`) → `lib/<arch>`.
    Library,
    /// Shared library (`.dll`) → `bin/<arch>`.
    SharedLibrary,
}

impl DeliverableKind {
    pub fn of(file_name: &str) -> Option<Self> {
        let (_, ext) = file_name.rsplit_once('.')?;
        if ext.eq_ignore_ascii_case("lib") {
            Some(DeliverableKind::Library)
        } else if ext.eq_ignore_ascii_case("dll") {
            Some(DeliverableKind::SharedLibrary)
        } else {
            None
        }
    }
}

/// Parsed element, immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDescriptor {
    pub name: String,
    pub level: usize,
    pub source: String,
    pub patches: Vec<String>,
    pub files: Vec<String>,
    pub builder: BuilderKind,
    pub targets: Vec<String>,
    /// Source header path → sub-directory under the include root (`.` for none).
    pub headers: BTreeMap<String, String>,
    pub deliverables: Vec<String>,
    pub prebuild_params: Vec<String>,
    pub script_path: Option<String>,
}

impl ElementDescriptor {
    /// Level 0 depends on no other level.
    pub fn is_base_level(&self) -> bool {
        self.level == 0
    }

    pub fn has_remote(&self) -> bool {
        !self.source.trim().is_empty()
    }

    pub(crate) fn from_body(name: String, level: usize, body: ElementBody) -> Result<Self> {
        let builder = match body.builder.as_deref() {
            Some(raw) => raw.parse()?,
            None => BuilderKind::default(),
        };
        Ok(Self {
            name,
            level,
            source: body.source,
            patches: body.patches,
            files: body.files,
            builder,
            targets: body.targets,
            headers: body.headers,
            deliverables: body.deliverables,
            prebuild_params: body.prebuild_params.into_vec(),
            script_path: body.script_path,
        })
    }
}

/// Element body as written in a level document.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ElementBody {
    files: Vec<String>,
    patches: Vec<String>,
    source: String,
    targets: Vec<String>,
    headers: BTreeMap<String, String>,
    deliverables: Vec<String>,
    builder: Option<String>,
    prebuild_params: Params,
    script_path: Option<String>,
}

/// `prebuild_params` may be one string or a list of arguments.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Params {
    Line(String),
    List(Vec<String>),
}

impl Default for Params {
    fn default() -> Self {
        Params::List(Vec::new())
    }
}

impl Params {
    fn into_vec(self) -> Vec<String> {
        match self {
            Params::Line(line) => line.split_whitespace().map(str::to_string).collect(),
            Params::List(list) => list,
        }
    }
}
