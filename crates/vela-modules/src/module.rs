//! Module graph data model
//!
//! Modules are interned by the [`ModuleRegistry`](crate::registry::ModuleRegistry)
//! and referred to by [`ModuleId`]. Edges between modules are
//! [`ModuleImport`]s stored on the importing module.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable handle to a module interned in a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub(crate) u32);

impl ModuleId {
    /// Index of the module in its registry
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Code generation backend a module or import is restricted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// The host runtime (platform-native modules)
    Host,

    /// The portable script backend
    Script,
}

impl Backend {
    pub fn name(self) -> &'static str {
        match self {
            Backend::Host => "host",
            Backend::Script => "script",
        }
    }
}

/// Compiled-artifact format version (major, minor)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BinaryVersion {
    pub major: u32,
    pub minor: u32,
}

impl BinaryVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for BinaryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// A directed dependency edge (importer → `module`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleImport {
    /// The imported module
    pub module: ModuleId,

    /// Whether the dependency may be absent at run time
    pub optional: bool,

    /// Whether the dependency is re-exported to importers
    pub export: bool,

    /// Backend the import is restricted to, if any
    pub backend: Option<Backend>,
}

impl ModuleImport {
    pub fn new(module: ModuleId, optional: bool, export: bool, backend: Option<Backend>) -> Self {
        Self {
            module,
            optional,
            export,
            backend,
        }
    }
}

/// A named, versioned module
///
/// Status flags only ever go from `false` to `true`.
#[derive(Debug, Clone)]
pub struct Module {
    id: ModuleId,
    name: Vec<String>,
    version: String,
    is_default: bool,
    available: bool,
    from_platform: bool,
    from_binary: bool,
    binary_version: Option<BinaryVersion>,
    backend: Option<Backend>,
    imports: Vec<ModuleImport>,
}

impl Module {
    pub(crate) fn new(id: ModuleId, name: Vec<String>, version: String, is_default: bool) -> Self {
        Self {
            id,
            name,
            version,
            is_default,
            available: false,
            from_platform: false,
            from_binary: false,
            binary_version: None,
            backend: None,
            imports: Vec::new(),
        }
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// Dotted name segments
    pub fn name(&self) -> &[String] {
        &self.name
    }

    /// Dotted name (`acme.net`)
    pub fn name_as_string(&self) -> String {
        self.name.join(".")
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// `name/version`
    pub fn coordinates(&self) -> String {
        make_module_name(&self.name_as_string(), &self.version)
    }

    /// Whether this is the anonymous module holding loose files
    pub fn is_default(&self) -> bool {
        self.is_default
    }

    /// Whether downstream phases may use this module
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Whether the module is native to the host platform
    pub fn is_from_platform(&self) -> bool {
        self.from_platform
    }

    /// Whether the module was loaded from a binary artifact
    pub fn is_from_binary(&self) -> bool {
        self.from_binary
    }

    pub fn binary_version(&self) -> Option<BinaryVersion> {
        self.binary_version
    }

    /// Backend the module is restricted to, if any
    pub fn backend(&self) -> Option<Backend> {
        self.backend
    }

    pub fn imports(&self) -> &[ModuleImport] {
        &self.imports
    }

    /// Find the edge from this module to `dependency`, if one exists
    pub fn find_import(&self, dependency: ModuleId) -> Option<&ModuleImport> {
        self.imports.iter().find(|i| i.module == dependency)
    }

    pub fn mark_available(&mut self) {
        self.available = true;
    }

    pub fn mark_from_platform(&mut self) {
        self.from_platform = true;
    }

    pub fn mark_from_binary(&mut self) {
        self.from_binary = true;
    }

    pub fn set_binary_version(&mut self, version: BinaryVersion) {
        self.binary_version = Some(version);
    }

    pub fn restrict_to_backend(&mut self, backend: Backend) {
        self.backend = Some(backend);
    }

    /// Add an edge unless one to the same dependency already exists.
    /// Returns whether an edge was added.
    pub fn add_import(&mut self, import: ModuleImport) -> bool {
        if self.find_import(import.module).is_some() {
            return false;
        }
        self.imports.push(import);
        true
    }

    /// Replace the whole edge list
    pub fn override_imports(&mut self, imports: Vec<ModuleImport>) {
        self.imports = imports;
    }
}

/// Render `name/version`
pub fn make_module_name(name: &str, version: &str) -> String {
    format!("{}/{}", name, version)
}

/// Split a dotted module name into its segments
pub fn split_module_name(name: &str) -> Vec<String> {
    name.split('.').map(str::to_string).collect()
}

/// Path of modules traversed to reach the module under resolution
///
/// The first element is where diagnostics are attributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyTree {
    path: Vec<ModuleId>,
}

impl DependencyTree {
    /// Start a tree at `root`
    pub fn new(root: ModuleId) -> Self {
        Self { path: vec![root] }
    }

    pub fn root(&self) -> ModuleId {
        self.path[0]
    }

    /// Innermost module of the path
    pub fn last(&self) -> ModuleId {
        self.path[self.path.len() - 1]
    }

    pub fn push(&mut self, module: ModuleId) {
        self.path.push(module);
    }

    /// Remove the innermost module. The root is never removed.
    pub fn pop(&mut self) -> Option<ModuleId> {
        if self.path.len() > 1 {
            self.path.pop()
        } else {
            None
        }
    }

    pub fn contains(&self, module: ModuleId) -> bool {
        self.path.contains(&module)
    }

    pub fn iter(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.path.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}
