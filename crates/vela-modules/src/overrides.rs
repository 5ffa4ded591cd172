//! Dependency overrides
//!
//! A project can rewrite the dependencies a compiled artifact declares,
//! for example to swap a broken dependency or pin a version. Overrides are
//! read from a TOML ruleset:
//!
//! ```toml
//! [[artifact]]
//! module = "acme.net"
//! version = "2.0"
//! dependencies = [{ module = "acme.io", version = "1.5", export = true }]
//! remove = ["acme.legacy"]
//!
//! [set]
//! "acme.io" = "1.6"
//! ```

use crate::artifact::ArtifactResult;
use crate::module::{ModuleId, ModuleImport};
use crate::platform::{self, RuntimePlatform};
use crate::registry::ModuleRegistry;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading an overrides ruleset
#[derive(Debug, Error)]
pub enum OverridesError {
    /// Failed to read overrides file
    #[error("Failed to read overrides file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse overrides: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid overrides: {0}")]
    ValidationError(String),
}

/// One declared dependency, as seen by an overrides ruleset
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyInfo {
    pub name: String,
    pub version: String,
    pub optional: bool,
    pub export: bool,
}

impl DependencyInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>, optional: bool, export: bool) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            optional,
            export,
        }
    }
}

/// A module's declared dependencies
pub type DependencySet = BTreeSet<DependencyInfo>;

/// Externally configured dependency rewrites
pub trait OverridesRuleset {
    /// Whether the ruleset has an entry for this artifact
    fn has_overrides(&self, name: &str, version: &str) -> bool;

    /// Compute the dependency set that replaces `current`
    fn apply_overrides(&self, name: &str, version: &str, current: &DependencySet) -> DependencySet;
}

impl<T: OverridesRuleset + ?Sized> OverridesRuleset for &T {
    fn has_overrides(&self, name: &str, version: &str) -> bool {
        (**self).has_overrides(name, version)
    }

    fn apply_overrides(&self, name: &str, version: &str, current: &DependencySet) -> DependencySet {
        (**self).apply_overrides(name, version, current)
    }
}

/// Dependency entry in an overrides file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverrideDependency {
    pub module: String,
    pub version: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub export: bool,
}

impl OverrideDependency {
    fn to_info(&self) -> DependencyInfo {
        DependencyInfo::new(&self.module, &self.version, self.optional, self.export)
    }
}

/// Rewrite rules for one artifact
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactOverride {
    /// Module name the rule applies to
    pub module: String,

    /// Version the rule applies to (every version when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Wholesale replacement of the declared dependencies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<OverrideDependency>>,

    /// Dependencies added to the declared ones
    #[serde(default)]
    pub add: Vec<OverrideDependency>,

    /// Module names removed from the declared dependencies
    #[serde(default)]
    pub remove: Vec<String>,
}

/// Overrides ruleset read from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Overrides {
    #[serde(default, rename = "artifact")]
    pub artifacts: Vec<ArtifactOverride>,

    /// Global version pins (module name → version)
    #[serde(default)]
    pub set: BTreeMap<String, String>,
}

impl Overrides {
    /// Parse overrides from a file
    pub fn from_file(path: &Path) -> Result<Self, OverridesError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse overrides from a string
    pub fn from_str(content: &str) -> Result<Self, OverridesError> {
        let overrides: Overrides = toml::from_str(content)?;
        overrides.validate()?;
        Ok(overrides)
    }

    /// Validate the ruleset
    pub fn validate(&self) -> Result<(), OverridesError> {
        let mut seen = HashSet::new();
        for rule in &self.artifacts {
            if rule.module.is_empty() {
                return Err(OverridesError::ValidationError(
                    "Override module name cannot be empty".to_string(),
                ));
            }
            if !seen.insert((rule.module.as_str(), rule.version.as_deref())) {
                return Err(OverridesError::ValidationError(format!(
                    "Duplicate override for '{}'{}",
                    rule.module,
                    rule.version
                        .as_deref()
                        .map(|v| format!(" version '{}'", v))
                        .unwrap_or_default()
                )));
            }
            let entries = rule.dependencies.iter().flatten().chain(&rule.add);
            for dep in entries {
                if dep.module.is_empty() || dep.version.is_empty() {
                    return Err(OverridesError::ValidationError(format!(
                        "Override for '{}' has a dependency without module or version",
                        rule.module
                    )));
                }
            }
        }

        for (module, version) in &self.set {
            if version.is_empty() {
                return Err(OverridesError::ValidationError(format!(
                    "Version pin for '{}' is empty",
                    module
                )));
            }
        }

        Ok(())
    }

    /// Find the rule for an artifact. Exact version matches win over
    /// version-less rules.
    pub fn lookup(&self, name: &str, version: &str) -> Option<&ArtifactOverride> {
        self.artifacts
            .iter()
            .find(|r| r.module == name && r.version.as_deref() == Some(version))
            .or_else(|| {
                self.artifacts
                    .iter()
                    .find(|r| r.module == name && r.version.is_none())
            })
    }
}

impl OverridesRuleset for Overrides {
    fn has_overrides(&self, name: &str, version: &str) -> bool {
        self.lookup(name, version).is_some()
    }

    fn apply_overrides(&self, name: &str, version: &str, current: &DependencySet) -> DependencySet {
        let mut deps = match self.lookup(name, version) {
            Some(rule) => {
                let mut deps: DependencySet = match &rule.dependencies {
                    Some(replacement) => replacement.iter().map(OverrideDependency::to_info).collect(),
                    None => current.clone(),
                };
                deps.retain(|d| !rule.remove.contains(&d.name));
                deps.extend(rule.add.iter().map(OverrideDependency::to_info));
                deps
            }
            None => current.clone(),
        };

        if !self.set.is_empty() {
            deps = deps
                .into_iter()
                .map(|mut d| {
                    if let Some(pinned) = self.set.get(&d.name) {
                        d.version = pinned.clone();
                    }
                    d
                })
                .collect();
        }

        deps
    }
}

/// Rewrite a resolved module's edges with the ruleset entry for its artifact.
///
/// The module's whole edge list is replaced; edges to modules missing from
/// the new set disappear. Returns `false` when no entry matches.
pub fn apply_module_overrides(
    registry: &mut ModuleRegistry,
    platform: &dyn RuntimePlatform,
    ruleset: &dyn OverridesRuleset,
    module: ModuleId,
    artifact: &ArtifactResult,
) -> bool {
    if !ruleset.has_overrides(&artifact.name, &artifact.version) {
        return false;
    }

    let current: DependencySet = registry
        .get(module)
        .imports()
        .iter()
        .map(|i| {
            let dep = registry.get(i.module);
            DependencyInfo::new(dep.name_as_string(), dep.version(), i.optional, i.export)
        })
        .collect();

    let rewritten = ruleset.apply_overrides(&artifact.name, &artifact.version, &current);

    let mut imports: Vec<ModuleImport> = Vec::with_capacity(rewritten.len());
    for dep in &rewritten {
        let id = platform::get_or_create_module(registry, platform, &dep.name, &dep.version);
        if imports.iter().all(|i| i.module != id) {
            // Backend is bound once the dependency itself is resolved
            imports.push(ModuleImport::new(id, dep.optional, dep.export, None));
        }
    }

    tracing::debug!(
        module = %artifact.name,
        version = %artifact.version,
        before = current.len(),
        after = imports.len(),
        "dependency overrides applied"
    );
    registry.get_mut(module).override_imports(imports);
    true
}
