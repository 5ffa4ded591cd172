//! Resolution diagnostics
//!
//! Problems found while resolving are reported to a [`DiagnosticSink`]
//! rather than returned as errors, so one failing edge never disturbs the
//! state established by its siblings.

use crate::module::{BinaryVersion, DependencyTree, ModuleId, ModuleImport};
use std::fmt;
use thiserror::Error;

/// A problem found during module resolution
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionIssue {
    /// Two versions of the same module would end up in the binary inputs
    #[error("source code imports two different versions of module '{name}': version '{first}' and version '{second}'")]
    VersionConflict {
        name: String,
        first: String,
        second: String,
    },

    /// Two differently spelled but similar modules with different versions
    #[error("source code imports two different versions of similar modules '{first}' and '{second}'")]
    SimilarModuleVersionConflict { first: String, second: String },

    /// Compiled artifact format does not match the toolchain
    #[error(
        "This module was compiled for an incompatible version of the Vela compiler ({found}).\n\
         This compiler supports {supported}.\n\
         Please try to recompile your module using a compatible compiler."
    )]
    BinaryFormatIncompatible {
        found: BinaryVersion,
        supported: BinaryVersion,
    },

    /// A platform module is imported at a lower version than the runtime's
    #[error(
        "You import platform version '{requested}', which is provided by the platform version '{current}' \
         you are running on, but we cannot check that you are not using any APIs newer than '{requested}'. \
         Upgrade your import to '{current}' if you depend on them."
    )]
    PlatformVersionLower { requested: String, current: String },

    /// A platform module version the runtime does not provide
    #[error("imported module '{name}' depends on platform version '{version}' and you are running platform {current}")]
    PlatformVersionUnavailable {
        name: String,
        version: String,
        current: String,
    },

    /// No artifact could be located for a dependency
    #[error("cannot find module artifact '{name}/{version}'")]
    ModuleNotFound { name: String, version: String },
}

/// Category of an advisory warning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningKind {
    SimilarModule,
    ImportsOtherPlatform,
}

impl WarningKind {
    pub fn name(self) -> &'static str {
        match self {
            WarningKind::SimilarModule => "similar-module",
            WarningKind::ImportsOtherPlatform => "imports-other-platform",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning(WarningKind),
}

/// Where a diagnostic is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticTarget {
    /// The module descriptor of a module
    Module(ModuleId),

    /// The declaration at `root` that (transitively) pulled in `dependency`
    Declaration { root: ModuleId, dependency: ModuleId },

    /// The import declaration `importer → dependency`
    Import {
        importer: ModuleId,
        dependency: ModuleId,
    },
}

/// A reported issue with its severity and attribution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub target: DiagnosticTarget,
    pub issue: ResolutionIssue,
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            Severity::Error => write!(f, "error: {}", self.issue),
            Severity::Warning(kind) => write!(f, "warning[{}]: {}", kind.name(), self.issue),
        }
    }
}

/// Receiver of resolution diagnostics
pub trait DiagnosticSink {
    /// Attach an error to a module's descriptor
    fn add_error_to_module(&mut self, module: ModuleId, issue: ResolutionIssue);

    /// Attach an advisory warning to a module's descriptor
    fn add_warning_to_module(&mut self, module: ModuleId, kind: WarningKind, issue: ResolutionIssue);

    /// Attach an error to the declaration at the root of `dependency_tree`
    /// that led to `import`
    fn attach_error_to_dependency_declaration(
        &mut self,
        import: &ModuleImport,
        dependency_tree: &DependencyTree,
        issue: ResolutionIssue,
    );

    /// Attach an advisory warning to an import declaration
    fn add_warning_to_import(
        &mut self,
        importer: ModuleId,
        import: &ModuleImport,
        kind: WarningKind,
        issue: ResolutionIssue,
    );
}

/// Sink that keeps every diagnostic in report order
#[derive(Debug, Default, Clone)]
pub struct CollectedDiagnostics {
    diagnostics: Vec<Diagnostic>,
}

impl CollectedDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    fn push(&mut self, severity: Severity, target: DiagnosticTarget, issue: ResolutionIssue) {
        self.diagnostics.push(Diagnostic {
            severity,
            target,
            issue,
        });
    }
}

impl DiagnosticSink for CollectedDiagnostics {
    fn add_error_to_module(&mut self, module: ModuleId, issue: ResolutionIssue) {
        self.push(Severity::Error, DiagnosticTarget::Module(module), issue);
    }

    fn add_warning_to_module(&mut self, module: ModuleId, kind: WarningKind, issue: ResolutionIssue) {
        self.push(Severity::Warning(kind), DiagnosticTarget::Module(module), issue);
    }

    fn attach_error_to_dependency_declaration(
        &mut self,
        import: &ModuleImport,
        dependency_tree: &DependencyTree,
        issue: ResolutionIssue,
    ) {
        let target = DiagnosticTarget::Declaration {
            root: dependency_tree.root(),
            dependency: import.module,
        };
        self.push(Severity::Error, target, issue);
    }

    fn add_warning_to_import(
        &mut self,
        importer: ModuleId,
        import: &ModuleImport,
        kind: WarningKind,
        issue: ResolutionIssue,
    ) {
        let target = DiagnosticTarget::Import {
            importer,
            dependency: import.module,
        };
        self.push(Severity::Warning(kind), target, issue);
    }
}
