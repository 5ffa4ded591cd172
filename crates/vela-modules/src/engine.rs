//! Module resolution engine
//!
//! The module scanner calls [`ResolutionEngine::resolve_module`] once for
//! every import edge it discovers, with the artifact the locator found for
//! the imported module. The engine decides where the module comes from
//! (source being compiled, compiled artifact, platform-native archive or
//! the runtime itself), rejects version clashes, folds in dependency
//! overrides and checks the artifact format before making the module
//! available.

use crate::artifact::ArtifactResult;
use crate::compat::check_binary_version;
use crate::config::ToolchainConfig;
use crate::conflict::{detect_conflict, Conflict};
use crate::diagnostics::{DiagnosticSink, ResolutionIssue, WarningKind};
use crate::implicit::add_implicit_imports;
use crate::loader::{DescriptorLoader, InMemoryDescriptors};
use crate::module::{Backend, DependencyTree, ModuleId, ModuleImport};
use crate::overrides::{apply_module_overrides, OverridesRuleset};
use crate::platform::{self, HostPlatform, RuntimePlatform};
use crate::registry::ModuleRegistry;
use rustc_hash::FxHashSet;
use thiserror::Error;

/// Errors that abort resolution of the whole session
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Raised by the source resolver; passed through unchanged
    #[error("Failed to resolve module {module} from source: {message}")]
    Source { module: String, message: String },

    /// A module being resolved from source was reached again through its
    /// own imports
    #[error("Cyclic module imports while resolving from source: {}", .0.join(" -> "))]
    CyclicSourceResolution(Vec<String>),
}

/// Outcome of resolving one import edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Another version is already in the binary inputs; nothing was changed
    Skipped(Conflict),

    /// Handed to the source resolver
    FromSource,

    /// Provided by the runtime
    Platform,

    /// Loaded from a compiled module artifact
    Compiled,

    /// Loaded from an archive with no compiled descriptor
    NativeArchive,

    /// Nothing being compiled needs the module; left unloaded
    Deferred,
}

/// Edge handed to a [`SourceResolver`]
#[derive(Debug, Clone, Copy)]
pub struct SourceRequest<'a> {
    pub artifact: &'a ArtifactResult,
    pub module: ModuleId,
    pub import: ModuleImport,
    pub dependency_tree: &'a DependencyTree,
    pub for_compiled_module: bool,
}

/// Resolves modules that are compiled from source in this session.
///
/// Implementations may call back into the engine for the module's own
/// imports before returning.
pub trait SourceResolver {
    fn resolve_from_source(
        &mut self,
        engine: &mut ResolutionEngine<'_>,
        request: SourceRequest<'_>,
    ) -> Result<(), ResolveError>;
}

/// Per-session resolution engine
pub struct ResolutionEngine<'a> {
    config: &'a ToolchainConfig,
    registry: &'a mut ModuleRegistry,
    sink: &'a mut dyn DiagnosticSink,
    platform: Box<dyn RuntimePlatform + 'a>,
    descriptors: Box<dyn DescriptorLoader + 'a>,
    overrides: Option<Box<dyn OverridesRuleset + 'a>>,
    source_modules: FxHashSet<String>,
    in_progress: Vec<ModuleId>,
}

impl<'a> ResolutionEngine<'a> {
    /// Create an engine with the platform described by `config`, no
    /// overrides and no known compiled descriptors
    pub fn new(
        config: &'a ToolchainConfig,
        registry: &'a mut ModuleRegistry,
        sink: &'a mut dyn DiagnosticSink,
    ) -> Self {
        Self {
            config,
            registry,
            sink,
            platform: Box::new(HostPlatform::from_config(&config.platform)),
            descriptors: Box::new(InMemoryDescriptors::new()),
            overrides: None,
            source_modules: FxHashSet::default(),
            in_progress: Vec::new(),
        }
    }

    /// Set the runtime platform
    pub fn with_platform(mut self, platform: impl RuntimePlatform + 'a) -> Self {
        self.platform = Box::new(platform);
        self
    }

    /// Set the compiled descriptor loader
    pub fn with_descriptor_loader(mut self, loader: impl DescriptorLoader + 'a) -> Self {
        self.descriptors = Box::new(loader);
        self
    }

    /// Set the project's overrides ruleset
    pub fn with_overrides(mut self, overrides: impl OverridesRuleset + 'a) -> Self {
        self.overrides = Some(Box::new(overrides));
        self
    }

    /// Names of the modules compiled from source in this session
    pub fn with_source_modules<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_modules.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &*self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ModuleRegistry {
        &mut *self.registry
    }

    pub fn config(&self) -> &ToolchainConfig {
        self.config
    }

    pub fn platform(&self) -> &dyn RuntimePlatform {
        self.platform.as_ref()
    }

    /// Whether `name` is compiled from source in this session
    pub fn is_module_loaded_from_source(&self, name: &str) -> bool {
        self.source_modules.contains(name)
    }

    /// Archive formats the locator searches, compiled format first
    pub fn searched_artifact_extensions(&self) -> &[String] {
        &self.config.toolchain.artifact_extensions
    }

    pub fn supports_backend(&self, backend: Backend) -> bool {
        backend == Backend::Host
    }

    /// Get-or-create a module by (name, version)
    pub fn get_or_create_module(&mut self, name: &str, version: &str) -> ModuleId {
        platform::get_or_create_module(self.registry, self.platform.as_ref(), name, version)
    }

    /// Whether an existing module version satisfies a requested one
    pub fn versions_match(&self, name: &str, requested: Option<&str>, current: Option<&str>) -> bool {
        platform::versions_match(self.platform.as_ref(), name, requested, current)
    }

    /// Record an import declaration `importer → import.module`.
    ///
    /// Warns when the declaration asks for a platform module below the
    /// runtime's version. Returns `false` if the edge already existed.
    pub fn add_module_dependency_definition(&mut self, importer: ModuleId, import: ModuleImport) -> bool {
        if !self.registry.get_mut(importer).add_import(import) {
            return false;
        }
        let imported = self.registry.get(import.module);
        if let Some(issue) = platform::check_platform_import(self.platform.as_ref(), imported) {
            tracing::warn!(module = %imported.coordinates(), "import of older platform version");
            self.sink
                .add_warning_to_import(importer, &import, WarningKind::ImportsOtherPlatform, issue);
        }
        true
    }

    /// Attach an error to the declaration at the root of `dependency_tree`.
    ///
    /// Errors on platform module imports can only mean the runtime lacks
    /// the requested version, so they are reported as such.
    pub fn attach_error_to_dependency_declaration(
        &mut self,
        import: &ModuleImport,
        dependency_tree: &DependencyTree,
        issue: ResolutionIssue,
    ) {
        let imported = self.registry.get(import.module);
        let issue = platform::platform_version_unavailable(self.platform.as_ref(), imported)
            .unwrap_or(issue);
        self.sink
            .attach_error_to_dependency_declaration(import, dependency_tree, issue);
    }

    /// Give every non-platform module an edge to the foundational module
    pub fn add_implicit_imports(&mut self) -> usize {
        let added = add_implicit_imports(self.registry);
        tracing::debug!(added, "implicit imports added");
        added
    }

    /// Resolve one import edge.
    ///
    /// `module` is the imported module and `artifact` what the locator found
    /// for it. `for_compiled_module` is set when a module being compiled
    /// needs it on its build path. Conflicts and incompatibilities are
    /// reported to the sink; only source resolution failures are returned.
    #[tracing::instrument(skip_all, fields(module = %artifact.name, version = %artifact.version))]
    pub fn resolve_module(
        &mut self,
        artifact: &ArtifactResult,
        module: ModuleId,
        import: ModuleImport,
        dependency_tree: &DependencyTree,
        for_compiled_module: bool,
        source: &mut dyn SourceResolver,
    ) -> Result<Resolution, ResolveError> {
        let name = self.registry.get(module).name_as_string();
        let from_source = self.is_module_loaded_from_source(&name);
        let is_foundational = module == self.registry.foundational_module();

        if !from_source
            && platform::setup_if_platform_module(self.platform.as_ref(), self.registry.get_mut(module))
        {
            tracing::debug!("provided by runtime");
            return Ok(Resolution::Platform);
        }

        if from_source || for_compiled_module {
            if let Some(conflict) = detect_conflict(&*self.registry, module) {
                self.report_conflict(&conflict, dependency_tree);
                return Ok(Resolution::Skipped(conflict));
            }
        }

        if from_source {
            return self.delegate_to_source(artifact, module, import, dependency_tree, for_compiled_module, source);
        }

        if !(for_compiled_module
            || is_foundational
            || self.config.toolchain.load_transitive_dependencies)
        {
            tracing::debug!("not needed for compilation");
            return Ok(Resolution::Deferred);
        }

        self.registry.add_binary_input(module, artifact.clone());
        self.registry.get_mut(module).mark_from_binary();

        let mut resolution = Resolution::Compiled;
        if !self.registry.get(module).is_default() {
            let descriptor = self
                .descriptors
                .load_compiled_module(self.registry.get(module), artifact);
            match descriptor {
                Some(descriptor) => {
                    self.registry
                        .get_mut(module)
                        .set_binary_version(descriptor.binary_version);
                    self.declare_artifact_imports(artifact, module, None);
                }
                None => {
                    self.load_native_archive(artifact, module);
                    resolution = Resolution::NativeArchive;
                }
            }
        }

        let loaded = self.registry.get(module);
        if !loaded.is_from_platform() && !loaded.is_default() {
            if let Some(overrides) = self.overrides.as_deref() {
                apply_module_overrides(
                    self.registry,
                    self.platform.as_ref(),
                    overrides,
                    module,
                    artifact,
                );
            }

            let found = self.registry.get(module).binary_version();
            if let Some(issue) = check_binary_version(found, self.config.supported_binary_version()) {
                tracing::warn!(%issue, "incompatible binary module");
                self.attach_error_to_dependency_declaration(&import, dependency_tree, issue);
            }
        }

        // Still made available after a format error so later phases can
        // report what they find in it.
        self.registry.get_mut(module).mark_available();
        tracing::debug!(?resolution, "module available");
        Ok(resolution)
    }

    fn report_conflict(&mut self, conflict: &Conflict, dependency_tree: &DependencyTree) {
        let root = dependency_tree.root();
        let issue = conflict.clone().into_issue();
        tracing::warn!(%issue, "module version conflict");
        if conflict.is_fatal() {
            self.sink.add_error_to_module(root, issue);
        } else {
            self.sink
                .add_warning_to_module(root, WarningKind::SimilarModule, issue);
        }
    }

    fn delegate_to_source(
        &mut self,
        artifact: &ArtifactResult,
        module: ModuleId,
        import: ModuleImport,
        dependency_tree: &DependencyTree,
        for_compiled_module: bool,
        source: &mut dyn SourceResolver,
    ) -> Result<Resolution, ResolveError> {
        if let Some(start) = self.in_progress.iter().position(|m| *m == module) {
            let mut chain: Vec<String> = self.in_progress[start..]
                .iter()
                .map(|m| self.registry.get(*m).coordinates())
                .collect();
            chain.push(self.registry.get(module).coordinates());
            return Err(ResolveError::CyclicSourceResolution(chain));
        }

        tracing::debug!("delegating to source resolver");
        self.in_progress.push(module);
        let request = SourceRequest {
            artifact,
            module,
            import,
            dependency_tree,
            for_compiled_module,
        };
        let result = source.resolve_from_source(self, request);
        self.in_progress.pop();
        result.map(|()| Resolution::FromSource)
    }

    /// Classify `module` as platform-native and take its dependencies from
    /// the archive's own metadata
    fn load_native_archive(&mut self, artifact: &ArtifactResult, module: ModuleId) {
        {
            let m = self.registry.get_mut(module);
            m.mark_from_platform();
            m.restrict_to_backend(Backend::Host);
        }
        self.declare_artifact_imports(artifact, module, Some(Backend::Host));
        tracing::debug!(dependencies = artifact.dependencies.len(), "loaded platform-native archive");
    }

    /// Add an edge for every dependency the artifact records, keeping any
    /// edge that already exists
    fn declare_artifact_imports(&mut self, artifact: &ArtifactResult, module: ModuleId, backend: Option<Backend>) {
        for dep in &artifact.dependencies {
            let dependency = self.get_or_create_module(&dep.name, &dep.version);
            let import = ModuleImport::new(
                dependency,
                dep.import_type.is_optional(),
                dep.import_type.is_export(),
                backend,
            );
            self.registry.get_mut(module).add_import(import);
        }
    }
}
