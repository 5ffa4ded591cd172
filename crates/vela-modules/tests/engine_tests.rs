//! Integration tests for the resolution engine

use vela_modules::{
    ArtifactResult, Backend, BinaryVersion, CollectedDiagnostics, DependencyTree, DiagnosticTarget,
    ImportType, InMemoryDescriptors, ModuleId, ModuleImport, ModuleRegistry, Resolution,
    ResolutionEngine, ResolutionIssue, ResolveError, Severity, SourceRequest, SourceResolver,
    ToolchainConfig, WarningKind, SUPPORTED_BINARY_VERSION,
};

/// Fails the test if the engine ever hands an edge to source resolution
struct NoSource;

impl SourceResolver for NoSource {
    fn resolve_from_source(
        &mut self,
        _engine: &mut ResolutionEngine<'_>,
        request: SourceRequest<'_>,
    ) -> Result<(), ResolveError> {
        panic!("unexpected source resolution of {}", request.artifact.name);
    }
}

fn new_registry(config: &ToolchainConfig) -> ModuleRegistry {
    ModuleRegistry::new(&config.foundational.name, &config.foundational.version)
}

fn compiled(modules: &[(&str, &str)]) -> InMemoryDescriptors {
    let mut descriptors = InMemoryDescriptors::new();
    for (name, version) in modules {
        descriptors.insert(*name, *version, SUPPORTED_BINARY_VERSION);
    }
    descriptors
}

fn import_of(module: ModuleId) -> ModuleImport {
    ModuleImport::new(module, false, false, None)
}

#[test]
fn test_second_version_is_rejected() {
    let config = ToolchainConfig::default();
    let mut registry = new_registry(&config);
    let mut sink = CollectedDiagnostics::new();

    let (app, lib2, resolution) = {
        let mut engine = ResolutionEngine::new(&config, &mut registry, &mut sink)
            .with_descriptor_loader(compiled(&[("lib", "1.0"), ("lib", "2.0")]));
        let app = engine.get_or_create_module("app", "1.0");
        let tree = DependencyTree::new(app);

        let lib1 = engine.get_or_create_module("lib", "1.0");
        let first = engine
            .resolve_module(&ArtifactResult::new("lib", "1.0"), lib1, import_of(lib1), &tree, true, &mut NoSource)
            .unwrap();
        assert_eq!(first, Resolution::Compiled);

        let lib2 = engine.get_or_create_module("lib", "2.0");
        let resolution = engine
            .resolve_module(&ArtifactResult::new("lib", "2.0"), lib2, import_of(lib2), &tree, true, &mut NoSource)
            .unwrap();
        (app, lib2, resolution)
    };

    assert!(matches!(resolution, Resolution::Skipped(ref c) if c.is_fatal()));
    assert_eq!(sink.len(), 1);
    let diagnostic = sink.iter().next().unwrap();
    assert_eq!(diagnostic.severity, Severity::Error);
    assert_eq!(diagnostic.target, DiagnosticTarget::Module(app));
    assert_eq!(
        diagnostic.issue,
        ResolutionIssue::VersionConflict {
            name: "lib".to_string(),
            first: "1.0".to_string(),
            second: "2.0".to_string(),
        }
    );

    assert!(!registry.get(lib2).is_available());
    assert!(!registry.is_binary_input(lib2));
    assert_eq!(registry.binary_inputs().count(), 1);
}

#[test]
fn test_conflict_versions_are_ordered() {
    let config = ToolchainConfig::default();
    let mut registry = new_registry(&config);
    let mut sink = CollectedDiagnostics::new();

    {
        let mut engine = ResolutionEngine::new(&config, &mut registry, &mut sink)
            .with_descriptor_loader(compiled(&[("lib", "10.0"), ("lib", "9.0")]));
        let app = engine.get_or_create_module("app", "1.0");
        let tree = DependencyTree::new(app);

        let newer = engine.get_or_create_module("lib", "10.0");
        engine
            .resolve_module(&ArtifactResult::new("lib", "10.0"), newer, import_of(newer), &tree, true, &mut NoSource)
            .unwrap();
        let older = engine.get_or_create_module("lib", "9.0");
        engine
            .resolve_module(&ArtifactResult::new("lib", "9.0"), older, import_of(older), &tree, true, &mut NoSource)
            .unwrap();
    }

    let message = sink.iter().next().unwrap().issue.to_string();
    assert!(message.contains("version '9.0' and version '10.0'"));
}

#[test]
fn test_third_version_conflicts_once() {
    let mut config = ToolchainConfig::default();
    config.toolchain.load_transitive_dependencies = true;
    let mut registry = new_registry(&config);
    let mut sink = CollectedDiagnostics::new();

    let (app, lib3) = {
        let mut engine = ResolutionEngine::new(&config, &mut registry, &mut sink)
            .with_descriptor_loader(compiled(&[("lib", "1.0"), ("lib", "2.0"), ("lib", "3.0")]));
        let app = engine.get_or_create_module("app", "1.0");
        let tree = DependencyTree::new(app);

        // not needed by the compilation, so no conflict check, but still loaded
        for version in ["1.0", "2.0"] {
            let lib = engine.get_or_create_module("lib", version);
            let resolution = engine
                .resolve_module(&ArtifactResult::new("lib", version), lib, import_of(lib), &tree, false, &mut NoSource)
                .unwrap();
            assert_eq!(resolution, Resolution::Compiled);
        }

        let lib3 = engine.get_or_create_module("lib", "3.0");
        let resolution = engine
            .resolve_module(&ArtifactResult::new("lib", "3.0"), lib3, import_of(lib3), &tree, true, &mut NoSource)
            .unwrap();
        assert!(matches!(resolution, Resolution::Skipped(_)));
        (app, lib3)
    };

    assert_eq!(sink.len(), 1);
    let diagnostic = sink.iter().next().unwrap();
    assert_eq!(diagnostic.target, DiagnosticTarget::Module(app));
    assert_eq!(
        diagnostic.issue,
        ResolutionIssue::VersionConflict {
            name: "lib".to_string(),
            first: "1.0".to_string(),
            second: "3.0".to_string(),
        }
    );
    assert!(!registry.get(lib3).is_available());
    assert_eq!(registry.binary_inputs().count(), 2);
}

#[test]
fn test_similar_module_warns_once() {
    let config = ToolchainConfig::default();
    let mut registry = new_registry(&config);
    let mut sink = CollectedDiagnostics::new();

    let (app, dotted) = {
        let mut engine = ResolutionEngine::new(&config, &mut registry, &mut sink)
            .with_descriptor_loader(compiled(&[("org.acme:net-io", "1.0"), ("org.acme.net.io", "2.0")]));
        let app = engine.get_or_create_module("app", "1.0");
        let tree = DependencyTree::new(app);

        let coloned = engine.get_or_create_module("org.acme:net-io", "1.0");
        engine
            .resolve_module(
                &ArtifactResult::new("org.acme:net-io", "1.0"),
                coloned,
                import_of(coloned),
                &tree,
                true,
                &mut NoSource,
            )
            .unwrap();

        let dotted = engine.get_or_create_module("org.acme.net.io", "2.0");
        let resolution = engine
            .resolve_module(
                &ArtifactResult::new("org.acme.net.io", "2.0"),
                dotted,
                import_of(dotted),
                &tree,
                true,
                &mut NoSource,
            )
            .unwrap();
        assert!(matches!(resolution, Resolution::Skipped(ref c) if !c.is_fatal()));
        (app, dotted)
    };

    assert!(!sink.has_errors());
    assert_eq!(sink.warnings().count(), 1);
    let warning = sink.warnings().next().unwrap();
    assert_eq!(warning.severity, Severity::Warning(WarningKind::SimilarModule));
    assert_eq!(warning.target, DiagnosticTarget::Module(app));
    assert_eq!(
        warning.issue,
        ResolutionIssue::SimilarModuleVersionConflict {
            first: "org.acme.net.io/2.0".to_string(),
            second: "org.acme:net-io/1.0".to_string(),
        }
    );
    assert!(!registry.get(dotted).is_available());
}

#[test]
fn test_incompatible_binary_version() {
    let config = ToolchainConfig::default();
    let mut registry = new_registry(&config);
    let mut sink = CollectedDiagnostics::new();
    let descriptors = InMemoryDescriptors::new().with_descriptor("lib", "1.0", BinaryVersion::new(3, 1));

    let (app, lib) = {
        let mut engine =
            ResolutionEngine::new(&config, &mut registry, &mut sink).with_descriptor_loader(descriptors);
        let app = engine.get_or_create_module("app", "1.0");
        let middle = engine.get_or_create_module("middle", "1.0");
        let lib = engine.get_or_create_module("lib", "1.0");

        let mut tree = DependencyTree::new(app);
        tree.push(middle);
        let resolution = engine
            .resolve_module(&ArtifactResult::new("lib", "1.0"), lib, import_of(lib), &tree, true, &mut NoSource)
            .unwrap();
        assert_eq!(resolution, Resolution::Compiled);
        (app, lib)
    };

    assert_eq!(sink.len(), 1);
    let diagnostic = sink.iter().next().unwrap();
    assert_eq!(
        diagnostic.issue,
        ResolutionIssue::BinaryFormatIncompatible {
            found: BinaryVersion::new(3, 1),
            supported: BinaryVersion::new(3, 2),
        }
    );
    assert_eq!(
        diagnostic.target,
        DiagnosticTarget::Declaration {
            root: app,
            dependency: lib,
        }
    );

    let lib = registry.get(lib);
    assert!(lib.is_available());
    assert!(lib.is_from_binary());
    assert_eq!(lib.binary_version(), Some(BinaryVersion::new(3, 1)));
}

#[test]
fn test_unneeded_module_is_deferred() {
    let config = ToolchainConfig::default();
    let mut registry = new_registry(&config);
    let mut sink = CollectedDiagnostics::new();

    let lib = {
        let mut engine = ResolutionEngine::new(&config, &mut registry, &mut sink)
            .with_descriptor_loader(compiled(&[("lib", "1.0")]));
        let app = engine.get_or_create_module("app", "1.0");
        let lib = engine.get_or_create_module("lib", "1.0");
        let resolution = engine
            .resolve_module(
                &ArtifactResult::new("lib", "1.0"),
                lib,
                import_of(lib),
                &DependencyTree::new(app),
                false,
                &mut NoSource,
            )
            .unwrap();
        assert_eq!(resolution, Resolution::Deferred);
        lib
    };

    assert!(sink.is_empty());
    assert!(!registry.get(lib).is_available());
    assert!(!registry.is_binary_input(lib));
}

#[test]
fn test_load_transitive_dependencies() {
    let mut config = ToolchainConfig::default();
    config.toolchain.load_transitive_dependencies = true;
    let mut registry = new_registry(&config);
    let mut sink = CollectedDiagnostics::new();

    let lib = {
        let mut engine = ResolutionEngine::new(&config, &mut registry, &mut sink)
            .with_descriptor_loader(compiled(&[("lib", "1.0")]));
        let app = engine.get_or_create_module("app", "1.0");
        let lib = engine.get_or_create_module("lib", "1.0");
        let resolution = engine
            .resolve_module(
                &ArtifactResult::new("lib", "1.0"),
                lib,
                import_of(lib),
                &DependencyTree::new(app),
                false,
                &mut NoSource,
            )
            .unwrap();
        assert_eq!(resolution, Resolution::Compiled);
        lib
    };

    assert!(registry.get(lib).is_available());
    assert!(registry.is_binary_input(lib));
}

#[test]
fn test_foundational_module_always_loaded() {
    let config = ToolchainConfig::default();
    let mut registry = new_registry(&config);
    let mut sink = CollectedDiagnostics::new();
    let foundational = registry.foundational_module();

    {
        let mut engine = ResolutionEngine::new(&config, &mut registry, &mut sink)
            .with_descriptor_loader(compiled(&[("vela.lang", "1.0.0")]));
        let resolution = engine
            .resolve_module(
                &ArtifactResult::new("vela.lang", "1.0.0"),
                foundational,
                import_of(foundational),
                &DependencyTree::new(foundational),
                false,
                &mut NoSource,
            )
            .unwrap();
        assert_eq!(resolution, Resolution::Compiled);
    }

    assert!(registry.get(foundational).is_available());
}

#[test]
fn test_native_archive_dependencies() {
    let config = ToolchainConfig::default();
    let mut registry = new_registry(&config);
    let mut sink = CollectedDiagnostics::new();
    let artifact = ArtifactResult::new("netty", "4.1")
        .with_dependency("buffer", "4.1", ImportType::Export)
        .with_dependency("compression", "1.0", ImportType::Optional);

    let netty = {
        let mut engine = ResolutionEngine::new(&config, &mut registry, &mut sink);
        let app = engine.get_or_create_module("app", "1.0");
        let netty = engine.get_or_create_module("netty", "4.1");
        let resolution = engine
            .resolve_module(&artifact, netty, import_of(netty), &DependencyTree::new(app), true, &mut NoSource)
            .unwrap();
        assert_eq!(resolution, Resolution::NativeArchive);
        netty
    };

    assert!(sink.is_empty());
    let module = registry.get(netty);
    assert!(module.is_available());
    assert!(module.is_from_platform());
    assert_eq!(module.backend(), Some(Backend::Host));
    assert_eq!(module.binary_version(), None);

    let imports = module.imports();
    assert_eq!(imports.len(), 2);
    assert_eq!(registry.get(imports[0].module).coordinates(), "buffer/4.1");
    assert!(imports[0].export);
    assert!(!imports[0].optional);
    assert_eq!(imports[0].backend, Some(Backend::Host));
    assert_eq!(registry.get(imports[1].module).coordinates(), "compression/1.0");
    assert!(imports[1].optional);
}

#[test]
fn test_compiled_module_declares_artifact_imports() {
    let config = ToolchainConfig::default();
    let mut registry = new_registry(&config);
    let mut sink = CollectedDiagnostics::new();
    let artifact = ArtifactResult::new("lib", "1.0").with_dependency("util", "2.0", ImportType::Normal);

    let lib = {
        let mut engine = ResolutionEngine::new(&config, &mut registry, &mut sink)
            .with_descriptor_loader(compiled(&[("lib", "1.0")]));
        let app = engine.get_or_create_module("app", "1.0");
        let lib = engine.get_or_create_module("lib", "1.0");
        engine
            .resolve_module(&artifact, lib, import_of(lib), &DependencyTree::new(app), true, &mut NoSource)
            .unwrap();
        lib
    };

    let module = registry.get(lib);
    assert!(!module.is_from_platform());
    assert_eq!(module.imports().len(), 1);
    assert_eq!(module.imports()[0].backend, None);
    // dependencies are only declared, not resolved
    assert!(!registry.get(module.imports()[0].module).is_available());
}

#[test]
fn test_default_module_skips_descriptor() {
    let config = ToolchainConfig::default();
    let mut registry = new_registry(&config);
    let mut sink = CollectedDiagnostics::new();
    let default = registry.default_module();

    {
        let mut engine = ResolutionEngine::new(&config, &mut registry, &mut sink);
        let resolution = engine
            .resolve_module(
                &ArtifactResult::new("default", "unversioned"),
                default,
                import_of(default),
                &DependencyTree::new(default),
                true,
                &mut NoSource,
            )
            .unwrap();
        assert_eq!(resolution, Resolution::Compiled);
    }

    let module = registry.get(default);
    assert!(module.is_available());
    assert!(!module.is_from_platform());
    assert!(sink.is_empty());
}

struct ImportingSource {
    requests: Vec<ModuleId>,
}

impl SourceResolver for ImportingSource {
    fn resolve_from_source(
        &mut self,
        engine: &mut ResolutionEngine<'_>,
        request: SourceRequest<'_>,
    ) -> Result<(), ResolveError> {
        self.requests.push(request.module);

        let lib = engine.get_or_create_module("lib", "1.0");
        let import = import_of(lib);
        engine.add_module_dependency_definition(request.module, import);
        let mut tree = request.dependency_tree.clone();
        tree.push(request.module);
        engine.resolve_module(&ArtifactResult::new("lib", "1.0"), lib, import, &tree, true, self)?;

        engine.registry_mut().get_mut(request.module).mark_available();
        Ok(())
    }
}

#[test]
fn test_source_module_delegated() {
    let config = ToolchainConfig::default();
    let mut registry = new_registry(&config);
    let mut sink = CollectedDiagnostics::new();
    let mut source = ImportingSource { requests: Vec::new() };

    let (util, lib) = {
        let mut engine = ResolutionEngine::new(&config, &mut registry, &mut sink)
            .with_descriptor_loader(compiled(&[("lib", "1.0")]))
            .with_source_modules(["util"]);
        let app = engine.get_or_create_module("app", "1.0");
        let util = engine.get_or_create_module("util", "1.0");
        let resolution = engine
            .resolve_module(
                &ArtifactResult::new("util", "1.0"),
                util,
                import_of(util),
                &DependencyTree::new(app),
                false,
                &mut source,
            )
            .unwrap();
        assert_eq!(resolution, Resolution::FromSource);
        let lib = engine.registry().find("lib", "1.0").unwrap();
        (util, lib)
    };

    assert_eq!(source.requests, vec![util]);
    assert!(registry.get(util).is_available());
    assert!(!registry.get(util).is_from_binary());
    assert!(registry.get(lib).is_available());
    assert!(sink.is_empty());
}

struct FailingSource;

impl SourceResolver for FailingSource {
    fn resolve_from_source(
        &mut self,
        _engine: &mut ResolutionEngine<'_>,
        request: SourceRequest<'_>,
    ) -> Result<(), ResolveError> {
        Err(ResolveError::Source {
            module: request.artifact.name.clone(),
            message: "syntax error".to_string(),
        })
    }
}

#[test]
fn test_source_error_propagates() {
    let config = ToolchainConfig::default();
    let mut registry = new_registry(&config);
    let mut sink = CollectedDiagnostics::new();

    let mut engine =
        ResolutionEngine::new(&config, &mut registry, &mut sink).with_source_modules(["util"]);
    let util = engine.get_or_create_module("util", "1.0");
    let result = engine.resolve_module(
        &ArtifactResult::new("util", "1.0"),
        util,
        import_of(util),
        &DependencyTree::new(util),
        true,
        &mut FailingSource,
    );

    match result {
        Err(ResolveError::Source { module, message }) => {
            assert_eq!(module, "util");
            assert_eq!(message, "syntax error");
        }
        other => panic!("expected source error, got {:?}", other),
    }
}

/// Resolves the requested module again from inside its own resolution
struct SelfImportingSource;

impl SourceResolver for SelfImportingSource {
    fn resolve_from_source(
        &mut self,
        engine: &mut ResolutionEngine<'_>,
        request: SourceRequest<'_>,
    ) -> Result<(), ResolveError> {
        engine.resolve_module(
            request.artifact,
            request.module,
            request.import,
            request.dependency_tree,
            true,
            self,
        )?;
        Ok(())
    }
}

#[test]
fn test_source_cycle_is_an_error() {
    let config = ToolchainConfig::default();
    let mut registry = new_registry(&config);
    let mut sink = CollectedDiagnostics::new();

    let mut engine =
        ResolutionEngine::new(&config, &mut registry, &mut sink).with_source_modules(["a"]);
    let a = engine.get_or_create_module("a", "1.0");
    let result = engine.resolve_module(
        &ArtifactResult::new("a", "1.0"),
        a,
        import_of(a),
        &DependencyTree::new(a),
        true,
        &mut SelfImportingSource,
    );

    match result {
        Err(ResolveError::CyclicSourceResolution(chain)) => {
            assert_eq!(chain, vec!["a/1.0".to_string(), "a/1.0".to_string()]);
        }
        other => panic!("expected cycle error, got {:?}", other),
    }
}

#[test]
fn test_conflict_checked_before_source() {
    let config = ToolchainConfig::default();
    let mut registry = new_registry(&config);
    let mut sink = CollectedDiagnostics::new();

    {
        let mut engine = ResolutionEngine::new(&config, &mut registry, &mut sink)
            .with_descriptor_loader(compiled(&[("lib", "1.0")]))
            .with_source_modules(["lib"]);
        let app = engine.get_or_create_module("app", "1.0");
        let tree = DependencyTree::new(app);

        // an older build of the module was already pulled in as a binary
        let old = engine.get_or_create_module("lib", "1.0");
        engine.registry_mut().add_binary_input(old, ArtifactResult::new("lib", "1.0"));

        let new = engine.get_or_create_module("lib", "2.0");
        let resolution = engine
            .resolve_module(&ArtifactResult::new("lib", "2.0"), new, import_of(new), &tree, false, &mut FailingSource)
            .unwrap();
        assert!(matches!(resolution, Resolution::Skipped(_)));
    }

    assert_eq!(sink.errors().count(), 1);
}

#[test]
fn test_toolchain_queries() {
    let config = ToolchainConfig::default();
    let mut registry = new_registry(&config);
    let mut sink = CollectedDiagnostics::new();
    let engine = ResolutionEngine::new(&config, &mut registry, &mut sink);

    assert_eq!(engine.searched_artifact_extensions(), ["vmod".to_string(), "nar".to_string()]);
    assert!(engine.supports_backend(Backend::Host));
    assert!(!engine.supports_backend(Backend::Script));
    assert!(engine.versions_match("lib", None, Some("1.0")));
    assert!(!engine.versions_match("lib", Some("1.0"), Some("2.0")));
}
