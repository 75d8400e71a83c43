//! The project-level mapping from resource type to compiler definition.
//!
//! `spec.md` §3/§6: `pipeline.json` is a JSON object keyed by resource
//! type string, whose values name the compiler executable to spawn (plus
//! optional arguments). The engine only requires that each entry be
//! spawnable; it does not interpret the executable's behaviour.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Description of a single resource type's compiler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerDef {
    /// Path (relative to `processors/`, or absolute) of the executable.
    pub executable: String,
    /// Extra arguments passed before `--persistent`.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Resource type → compiler mapping, as read from `pipeline.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineDefinition(BTreeMap<String, CompilerDef>);

impl PipelineDefinition {
    /// Loads a pipeline definition from disk. A missing file is treated
    /// as an empty pipeline, matching `Project::create`'s lenient load.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = std::fs::read(path).map_err(|e| Error::Io(path.to_path_buf(), e))?;
        serde_json::from_slice(&bytes).map_err(|e| Error::Format(path.to_path_buf(), e))
    }

    /// Saves the pipeline definition to disk as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes =
            serde_json::to_vec_pretty(&self.0).map_err(|e| Error::Format(path.to_path_buf(), e))?;
        std::fs::write(path, bytes).map_err(|e| Error::Io(path.to_path_buf(), e))
    }

    /// Looks up the compiler registered for `resource_type`.
    pub fn compiler_for(&self, resource_type: &str) -> Option<&CompilerDef> {
        self.0.get(resource_type)
    }

    /// Iterates over all `(resource_type, compiler)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &CompilerDef)> {
        self.0.iter()
    }

    /// Inserts or replaces the compiler registered for `resource_type`.
    pub fn insert(&mut self, resource_type: impl Into<String>, def: CompilerDef) {
        self.0.insert(resource_type.into(), def);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}
