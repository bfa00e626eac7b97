//! Level documents.
//!
//! Every `*.yaml` file in the working directory is one level. Files are read
//! in lexical order and each element gets the zero-based rank of its file as
//! its level. Elements come out in file order, then in the order they are
//! written inside the file. That order is the construction order for every
//! later phase; nothing else reorders elements across levels.

mod descriptor;

pub use descriptor::{BuilderKind, DeliverableKind, ElementDescriptor};

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_yaml::Value;

use crate::error::Fatal;
use descriptor::ElementBody;

pub const LEVEL_EXTENSION: &str = "yaml";

/// Level documents under `dir`, sorted by file name.
pub fn level_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("reading level directory '{}'", dir.display()))?;

    let mut documents = Vec::new();
    for entry in entries {
        let entry = entry
            .with_context(|| format!("reading entry under level directory '{}'", dir.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some(LEVEL_EXTENSION) {
            continue;
        }
        documents.push(path);
    }

    documents.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(documents)
}

/// Load every element declared by the level documents under `dir`.
pub fn load_levels(dir: &Path) -> Result<Vec<ElementDescriptor>> {
    let mut elements: Vec<ElementDescriptor> = Vec::new();
    let mut seen = BTreeSet::new();

    for (level, path) in level_documents(dir)?.into_iter().enumerate() {
        let file = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading level document '{}'", path.display()))?;

        for element in parse_level(&file, level, &text)? {
            if !seen.insert(element.name.clone()) {
                return Err(Fatal::LevelInvalid {
                    file,
                    message: format!("element '{}' is already declared", element.name),
                }
                .into());
            }
            elements.push(element);
        }
    }

    Ok(elements)
}

/// Parse one level document.
pub fn parse_level(file: &str, level: usize, text: &str) -> Result<Vec<ElementDescriptor>> {
    let invalid = |message: String| Fatal::LevelInvalid {
        file: file.to_string(),
        message,
    };

    if text.trim().is_empty() {
        return Err(Fatal::LevelEmpty {
            file: file.to_string(),
        }
        .into());
    }
    let document: Value = serde_yaml::from_str(text).map_err(|err| invalid(err.to_string()))?;
    if is_falsy(&document) {
        return Err(Fatal::LevelEmpty {
            file: file.to_string(),
        }
        .into());
    }
    let Value::Mapping(mapping) = document else {
        return Err(invalid("expected a mapping of element names".to_string()).into());
    };

    let mut elements = Vec::with_capacity(mapping.len());
    for (key, body) in mapping {
        let name = match key {
            Value::String(name) => name,
            Value::Number(number) => number.to_string(),
            other => {
                return Err(invalid(format!("element name {other:?} is not a string")).into())
            }
        };
        let body: ElementBody = if body.is_null() {
            ElementBody::default()
        } else {
            serde_yaml::from_value(body)
                .map_err(|err| invalid(format!("element '{name}': {err}")))?
        };
        let element = ElementDescriptor::from_body(name.clone(), level, body)
            .map_err(|err| invalid(format!("element '{name}': {err}")))?;
        elements.push(element);
    }
    Ok(elements)
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Sequence(seq) => seq.is_empty(),
        Value::Mapping(map) => map.is_empty(),
        Value::Number(_) | Value::Tagged(_) => false,
    }
}
