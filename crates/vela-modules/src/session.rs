//! Resolution sessions
//!
//! A [`ResolutionPlan`] describes one compilation: the modules compiled from
//! source with their import declarations, and the artifacts a locator would
//! find on the repository path. Running the plan walks every import edge
//! depth-first through a [`ResolutionEngine`] and returns the resulting
//! module graph together with everything reported along the way.
//!
//! ```toml
//! [[source]]
//! name = "app"
//! version = "1.0"
//! imports = [{ module = "lib", version = "1.0" }]
//!
//! [[artifact]]
//! name = "lib"
//! version = "1.0"
//! binary-version = { major = 3, minor = 2 }
//! dependencies = [{ name = "util", version = "2.1", type = "export" }]
//! ```

use crate::artifact::{ArtifactDependency, ArtifactResult, ImportType};
use crate::config::ToolchainConfig;
use crate::diagnostics::{CollectedDiagnostics, ResolutionIssue};
use crate::engine::{Resolution, ResolutionEngine, ResolveError, SourceRequest, SourceResolver};
use crate::loader::InMemoryDescriptors;
use crate::module::{BinaryVersion, DependencyTree, Module, ModuleId, ModuleImport};
use crate::overrides::Overrides;
use crate::registry::ModuleRegistry;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading a plan
#[derive(Debug, Error)]
pub enum PlanError {
    /// Failed to read plan file
    #[error("Failed to read plan file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse plan: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid plan: {0}")]
    ValidationError(String),
}

/// Import declared in a source module
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannedImport {
    pub module: String,
    pub version: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub export: bool,
}

/// Module compiled from source in this session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceModule {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub imports: Vec<PlannedImport>,
}

impl SourceModule {
    /// The artifact a locator reports for a module being compiled
    fn artifact(&self) -> ArtifactResult {
        let mut artifact = ArtifactResult::new(&self.name, &self.version);
        artifact.dependencies = self
            .imports
            .iter()
            .map(|i| {
                // No combined type exists; an optional re-export is recorded as export
                let import_type = if i.export {
                    ImportType::Export
                } else if i.optional {
                    ImportType::Optional
                } else {
                    ImportType::Normal
                };
                ArtifactDependency::new(&i.module, &i.version, import_type)
            })
            .collect();
        artifact
    }
}

/// Artifact on the repository path
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct PlannedArtifact {
    pub name: String,
    pub version: String,

    /// Format of the compiled descriptor; platform-native archives have none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary_version: Option<BinaryVersion>,

    #[serde(default)]
    pub dependencies: Vec<ArtifactDependency>,
}

impl PlannedArtifact {
    fn to_artifact(&self) -> ArtifactResult {
        ArtifactResult {
            name: self.name.clone(),
            version: self.version.clone(),
            dependencies: self.dependencies.clone(),
        }
    }
}

/// One compilation to resolve
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResolutionPlan {
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceModule>,

    #[serde(default, rename = "artifact")]
    pub artifacts: Vec<PlannedArtifact>,
}

/// Outcome of one import edge in a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeOutcome {
    pub importer: ModuleId,
    pub module: ModuleId,

    /// `None` when no artifact was found for the module
    pub resolution: Option<Resolution>,
}

/// Result of running a plan
#[derive(Debug)]
pub struct SessionReport {
    pub registry: ModuleRegistry,
    pub diagnostics: CollectedDiagnostics,
    pub outcomes: Vec<EdgeOutcome>,
}

impl SessionReport {
    /// Whether any error was reported
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }

    /// Look up a module by coordinates
    pub fn module(&self, name: &str, version: &str) -> Option<&Module> {
        self.registry.find(name, version).map(|id| self.registry.get(id))
    }
}

impl ResolutionPlan {
    /// Parse a plan from a file
    pub fn from_file(path: &Path) -> Result<Self, PlanError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse a plan from a string
    pub fn from_str(content: &str) -> Result<Self, PlanError> {
        let plan: ResolutionPlan = toml::from_str(content)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Validate the plan
    pub fn validate(&self) -> Result<(), PlanError> {
        let mut sources = HashSet::new();
        for source in &self.sources {
            if source.name.is_empty() || source.version.is_empty() {
                return Err(PlanError::ValidationError(
                    "Source module needs a name and a version".to_string(),
                ));
            }
            if !sources.insert(source.name.as_str()) {
                return Err(PlanError::ValidationError(format!(
                    "Source module '{}' declared twice",
                    source.name
                )));
            }
            for import in &source.imports {
                if import.module.is_empty() || import.version.is_empty() {
                    return Err(PlanError::ValidationError(format!(
                        "Source module '{}' has an import without module or version",
                        source.name
                    )));
                }
            }
        }

        let mut artifacts = HashSet::new();
        for artifact in &self.artifacts {
            if artifact.name.is_empty() || artifact.version.is_empty() {
                return Err(PlanError::ValidationError(
                    "Artifact needs a name and a version".to_string(),
                ));
            }
            if !artifacts.insert((artifact.name.as_str(), artifact.version.as_str())) {
                return Err(PlanError::ValidationError(format!(
                    "Artifact '{}/{}' declared twice",
                    artifact.name, artifact.version
                )));
            }
        }

        Ok(())
    }

    fn source(&self, name: &str, version: &str) -> Option<&SourceModule> {
        self.sources
            .iter()
            .find(|s| s.name == name && s.version == version)
    }

    fn artifact(&self, name: &str, version: &str) -> Option<&PlannedArtifact> {
        self.artifacts
            .iter()
            .find(|a| a.name == name && a.version == version)
    }

    fn descriptors(&self) -> InMemoryDescriptors {
        let mut descriptors = InMemoryDescriptors::new();
        for artifact in &self.artifacts {
            if let Some(binary_version) = artifact.binary_version {
                descriptors.insert(&artifact.name, &artifact.version, binary_version);
            }
        }
        descriptors
    }

    /// Resolve every source module and everything it reaches.
    ///
    /// Conflicts and incompatibilities end up in the report's diagnostics;
    /// only source resolution failures abort the run.
    pub fn run(
        &self,
        config: &ToolchainConfig,
        overrides: Option<&Overrides>,
    ) -> Result<SessionReport, ResolveError> {
        let mut registry = ModuleRegistry::new(&config.foundational.name, &config.foundational.version);
        let mut diagnostics = CollectedDiagnostics::new();
        let mut walker = PlanWalker {
            plan: self,
            outcomes: Vec::new(),
            loaded: FxHashSet::default(),
            compiled: FxHashSet::default(),
        };

        {
            let mut engine = ResolutionEngine::new(config, &mut registry, &mut diagnostics)
                .with_descriptor_loader(self.descriptors())
                .with_source_modules(self.sources.iter().map(|s| s.name.clone()));
            if let Some(overrides) = overrides {
                engine = engine.with_overrides(overrides);
            }

            let foundational = engine.registry().foundational_module();
            if let Some(artifact) = self.artifact(&config.foundational.name, &config.foundational.version) {
                let tree = DependencyTree::new(foundational);
                let import = ModuleImport::new(foundational, false, true, None);
                let resolution =
                    engine.resolve_module(&artifact.to_artifact(), foundational, import, &tree, true, &mut walker)?;
                walker.after_resolution(&mut engine, foundational, foundational, resolution, &tree, true)?;
            }

            for source in &self.sources {
                let id = engine.get_or_create_module(&source.name, &source.version);
                if engine.registry().get(id).is_available() {
                    continue;
                }
                tracing::info!(module = %source.name, version = %source.version, "resolving source module");
                // The root edge stands for the compilation request itself
                let tree = DependencyTree::new(id);
                let import = ModuleImport::new(id, false, false, None);
                engine.resolve_module(&source.artifact(), id, import, &tree, true, &mut walker)?;
            }

            engine.add_implicit_imports();
        }

        Ok(SessionReport {
            registry,
            diagnostics,
            outcomes: walker.outcomes,
        })
    }
}

/// Depth-first walk over a plan's import edges
struct PlanWalker<'p> {
    plan: &'p ResolutionPlan,
    outcomes: Vec<EdgeOutcome>,

    /// Binary modules whose edges have already been walked
    loaded: FxHashSet<ModuleId>,

    /// Source modules whose imports have all been resolved
    compiled: FxHashSet<ModuleId>,
}

impl PlanWalker<'_> {
    fn visit(
        &mut self,
        engine: &mut ResolutionEngine<'_>,
        importer: ModuleId,
        import: ModuleImport,
        tree: &DependencyTree,
        for_compiled_module: bool,
    ) -> Result<(), ResolveError> {
        let module = import.module;
        if self.loaded.contains(&module) || self.compiled.contains(&module) {
            return Ok(());
        }

        let (name, version, provided) = {
            let m = engine.registry().get(module);
            (
                m.name_as_string(),
                m.version().to_string(),
                m.is_from_platform() && m.is_available(),
            )
        };

        let plan = self.plan;
        let artifact = if engine.is_module_loaded_from_source(&name) {
            plan.source(&name, &version).map(SourceModule::artifact)
        } else {
            plan.artifact(&name, &version).map(PlannedArtifact::to_artifact)
        };
        let artifact = match artifact {
            Some(artifact) => artifact,
            None if provided => ArtifactResult::new(&name, &version),
            None => {
                tracing::debug!(module = %name, version = %version, "no artifact found");
                engine.attach_error_to_dependency_declaration(
                    &import,
                    tree,
                    ResolutionIssue::ModuleNotFound { name, version },
                );
                self.outcomes.push(EdgeOutcome {
                    importer,
                    module,
                    resolution: None,
                });
                return Ok(());
            }
        };

        let resolution = engine.resolve_module(&artifact, module, import, tree, for_compiled_module, &mut *self)?;
        self.after_resolution(engine, importer, module, resolution, tree, for_compiled_module)
    }

    fn after_resolution(
        &mut self,
        engine: &mut ResolutionEngine<'_>,
        importer: ModuleId,
        module: ModuleId,
        resolution: Resolution,
        tree: &DependencyTree,
        for_compiled_module: bool,
    ) -> Result<(), ResolveError> {
        let walk = matches!(resolution, Resolution::Compiled | Resolution::NativeArchive);
        if !matches!(resolution, Resolution::FromSource) {
            self.outcomes.push(EdgeOutcome {
                importer,
                module,
                resolution: Some(resolution),
            });
        }
        if !walk {
            return Ok(());
        }

        self.loaded.insert(module);
        let mut tree = tree.clone();
        if tree.last() != module {
            tree.push(module);
        }
        let imports = engine.registry().get(module).imports().to_vec();
        for child in imports {
            // Only re-exported dependencies end up on a compiled module's path
            self.visit(engine, module, child, &tree, for_compiled_module && child.export)?;
        }
        Ok(())
    }
}

impl SourceResolver for PlanWalker<'_> {
    fn resolve_from_source(
        &mut self,
        engine: &mut ResolutionEngine<'_>,
        request: SourceRequest<'_>,
    ) -> Result<(), ResolveError> {
        let (name, version) = {
            let m = engine.registry().get(request.module);
            (m.name_as_string(), m.version().to_string())
        };
        let plan = self.plan;
        let source = plan.source(&name, &version).ok_or_else(|| ResolveError::Source {
            module: format!("{}/{}", name, version),
            message: "no source module with this version".to_string(),
        })?;

        let importer = request.module;
        if importer != request.dependency_tree.root() {
            self.outcomes.push(EdgeOutcome {
                importer: request.dependency_tree.last(),
                module: importer,
                resolution: Some(Resolution::FromSource),
            });
        }

        let mut tree = request.dependency_tree.clone();
        if tree.last() != importer {
            tree.push(importer);
        }
        for declared in &source.imports {
            let dependency = engine.get_or_create_module(&declared.module, &declared.version);
            engine.add_module_dependency_definition(
                importer,
                ModuleImport::new(dependency, declared.optional, declared.export, None),
            );
            let import = engine
                .registry()
                .get(importer)
                .find_import(dependency)
                .copied()
                .unwrap_or_else(|| ModuleImport::new(dependency, declared.optional, declared.export, None));
            self.visit(engine, importer, import, &tree, true)?;
        }

        engine.registry_mut().get_mut(importer).mark_available();
        self.compiled.insert(importer);
        Ok(())
    }
}
