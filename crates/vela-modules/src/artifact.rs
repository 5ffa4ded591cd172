//! Located artifacts
//!
//! An [`ArtifactResult`] is what the artifact locator hands back for a
//! (name, version) pair. Resolution only reads it.

use serde::{Deserialize, Serialize};

/// How an artifact declares one of its dependencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportType {
    #[default]
    Normal,
    Optional,
    Export,
}

impl ImportType {
    pub fn is_optional(self) -> bool {
        self == ImportType::Optional
    }

    pub fn is_export(self) -> bool {
        self == ImportType::Export
    }
}

/// Dependency coordinates recorded in an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDependency {
    pub name: String,
    pub version: String,
    #[serde(default, rename = "type")]
    pub import_type: ImportType,
}

impl ArtifactDependency {
    pub fn new(name: impl Into<String>, version: impl Into<String>, import_type: ImportType) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            import_type,
        }
    }
}

/// A located, versioned binary unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactResult {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub dependencies: Vec<ArtifactDependency>,
}

impl ArtifactResult {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            dependencies: Vec::new(),
        }
    }

    /// Add a dependency (builder style)
    pub fn with_dependency(
        mut self,
        name: impl Into<String>,
        version: impl Into<String>,
        import_type: ImportType,
    ) -> Self {
        self.dependencies
            .push(ArtifactDependency::new(name, version, import_type));
        self
    }
}
