//! Vela Module Resolution Library
//!
//! This crate decides, for every import edge a compilation discovers,
//! where the imported module comes from and whether it may be used:
//! - Module registry keyed by (name, version)
//! - Version conflict and similar-module detection
//! - Platform (runtime-provided) module handling
//! - Dependency overrides read from TOML
//! - Compiled artifact format checks
//! - Implicit imports of the foundational module
//! - Resolution sessions driven from a TOML plan

pub mod artifact;
pub mod compat;
pub mod config;
pub mod conflict;
pub mod diagnostics;
pub mod engine;
pub mod implicit;
pub mod loader;
pub mod module;
pub mod overrides;
pub mod platform;
pub mod registry;
pub mod session;
pub mod version;

pub use artifact::{ArtifactDependency, ArtifactResult, ImportType};
pub use config::{ConfigError, ToolchainConfig, SUPPORTED_BINARY_VERSION};
pub use conflict::{detect_conflict, Conflict};
pub use diagnostics::{
    CollectedDiagnostics, Diagnostic, DiagnosticSink, DiagnosticTarget, ResolutionIssue, Severity,
    WarningKind,
};
pub use engine::{Resolution, ResolutionEngine, ResolveError, SourceRequest, SourceResolver};
pub use loader::{DescriptorLoader, InMemoryDescriptors, ModuleDescriptor};
pub use module::{Backend, BinaryVersion, DependencyTree, Module, ModuleId, ModuleImport};
pub use overrides::{DependencyInfo, DependencySet, Overrides, OverridesError, OverridesRuleset};
pub use platform::{HostPlatform, RuntimePlatform};
pub use registry::{ModuleRegistry, SharedModuleRegistry};
pub use session::{EdgeOutcome, PlanError, ResolutionPlan, SessionReport};
pub use version::compare_versions;
