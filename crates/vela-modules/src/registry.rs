//! Module registry
//!
//! Interns modules by (name, version) for one compilation session and
//! records which of them were put into the build's binary inputs.

use crate::artifact::ArtifactResult;
use crate::module::{split_module_name, Module, ModuleId};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

/// Name of the anonymous module that holds loose files
pub const DEFAULT_MODULE_NAME: &str = "default";

/// Version of the default module
pub const DEFAULT_MODULE_VERSION: &str = "unversioned";

/// Registry guarded by a single lock, for hosts that resolve in parallel
pub type SharedModuleRegistry = Arc<Mutex<ModuleRegistry>>;

/// Normalize a module name for similarity checks
///
/// `org.acme:net-io` and `org.acme.net.io` normalize to the same name.
pub fn normalize_module_name(name: &str) -> String {
    name.chars()
        .map(|c| if c == ':' || c == '-' { '.' } else { c })
        .collect()
}

/// Interning registry of every module referenced in a session
#[derive(Debug)]
pub struct ModuleRegistry {
    modules: Vec<Module>,
    by_coordinates: FxHashMap<(String, String), ModuleId>,
    by_normalized_name: FxHashMap<String, Vec<ModuleId>>,
    binary_inputs: Vec<(ModuleId, ArtifactResult)>,
    in_binary_inputs: FxHashSet<ModuleId>,
    foundational: ModuleId,
    default_module: ModuleId,
}

impl ModuleRegistry {
    /// Create a registry holding the foundational and default modules
    pub fn new(foundational_name: &str, foundational_version: &str) -> Self {
        let mut registry = Self {
            modules: Vec::new(),
            by_coordinates: FxHashMap::default(),
            by_normalized_name: FxHashMap::default(),
            binary_inputs: Vec::new(),
            in_binary_inputs: FxHashSet::default(),
            foundational: ModuleId(0),
            default_module: ModuleId(0),
        };
        registry.foundational = registry.insert(foundational_name, foundational_version, false);
        registry.default_module =
            registry.insert(DEFAULT_MODULE_NAME, DEFAULT_MODULE_VERSION, true);
        registry
    }

    /// Wrap the registry in a shared lock
    pub fn into_shared(self) -> SharedModuleRegistry {
        Arc::new(Mutex::new(self))
    }

    /// Get the module for (name, version), creating it on first reference.
    /// The flag is `true` when the module was created by this call.
    pub fn intern(&mut self, name: &str, version: &str) -> (ModuleId, bool) {
        if let Some(id) = self.find(name, version) {
            return (id, false);
        }
        (self.insert(name, version, false), true)
    }

    /// Get the module for (name, version), creating it on first reference
    pub fn get_or_create_module(&mut self, name: &str, version: &str) -> ModuleId {
        self.intern(name, version).0
    }

    fn insert(&mut self, name: &str, version: &str, is_default: bool) -> ModuleId {
        let id = ModuleId(self.modules.len() as u32);
        self.modules.push(Module::new(
            id,
            split_module_name(name),
            version.to_string(),
            is_default,
        ));
        self.by_coordinates
            .insert((name.to_string(), version.to_string()), id);
        self.by_normalized_name
            .entry(normalize_module_name(name))
            .or_default()
            .push(id);
        id
    }

    /// Look up an already interned module
    pub fn find(&self, name: &str, version: &str) -> Option<ModuleId> {
        self.by_coordinates
            .get(&(name.to_string(), version.to_string()))
            .copied()
    }

    pub fn get(&self, id: ModuleId) -> &Module {
        &self.modules[id.index()]
    }

    pub fn get_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id.index()]
    }

    /// All modules, in creation order
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }

    pub fn module_ids(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.modules.iter().map(Module::id)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// The base module every non-platform module depends on
    pub fn foundational_module(&self) -> ModuleId {
        self.foundational
    }

    pub fn default_module(&self) -> ModuleId {
        self.default_module
    }

    /// Modules whose normalized name equals `normalized`, in creation order
    pub fn similar_modules(&self, normalized: &str) -> &[ModuleId] {
        self.by_normalized_name
            .get(normalized)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Register a module and its artifact into the build's binary inputs.
    /// Returns `false` if the module was already registered.
    pub fn add_binary_input(&mut self, id: ModuleId, artifact: ArtifactResult) -> bool {
        if !self.in_binary_inputs.insert(id) {
            return false;
        }
        self.binary_inputs.push((id, artifact));
        true
    }

    pub fn is_binary_input(&self, id: ModuleId) -> bool {
        self.in_binary_inputs.contains(&id)
    }

    /// Registered binary inputs, in registration order
    pub fn binary_inputs(&self) -> impl Iterator<Item = (ModuleId, &ArtifactResult)> {
        self.binary_inputs.iter().map(|(id, a)| (*id, a))
    }

    /// Artifact a module was registered with, if any
    pub fn artifact(&self, id: ModuleId) -> Option<&ArtifactResult> {
        self.binary_inputs
            .iter()
            .find(|(m, _)| *m == id)
            .map(|(_, a)| a)
    }
}
