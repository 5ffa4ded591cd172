//! Compiled module descriptors
//!
//! A compiled Vela module carries a descriptor recording the format it was
//! written in. Archives without one are platform-native.

use crate::artifact::ArtifactResult;
use crate::module::{BinaryVersion, Module};
use rustc_hash::FxHashMap;

/// Descriptor found inside a compiled module artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleDescriptor {
    pub binary_version: BinaryVersion,
}

/// Reads module descriptors out of located artifacts
pub trait DescriptorLoader {
    /// Load the compiled descriptor for `module` from `artifact`, or `None`
    /// if the artifact has none
    fn load_compiled_module(&self, module: &Module, artifact: &ArtifactResult) -> Option<ModuleDescriptor>;
}

impl<T: DescriptorLoader + ?Sized> DescriptorLoader for &T {
    fn load_compiled_module(&self, module: &Module, artifact: &ArtifactResult) -> Option<ModuleDescriptor> {
        (**self).load_compiled_module(module, artifact)
    }
}

/// Descriptors known up front, keyed by (name, version)
#[derive(Debug, Default, Clone)]
pub struct InMemoryDescriptors {
    descriptors: FxHashMap<(String, String), ModuleDescriptor>,
}

impl InMemoryDescriptors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, version: impl Into<String>, binary_version: BinaryVersion) {
        self.descriptors
            .insert((name.into(), version.into()), ModuleDescriptor { binary_version });
    }

    /// Record a descriptor (builder style)
    pub fn with_descriptor(
        mut self,
        name: impl Into<String>,
        version: impl Into<String>,
        binary_version: BinaryVersion,
    ) -> Self {
        self.insert(name, version, binary_version);
        self
    }
}

impl DescriptorLoader for InMemoryDescriptors {
    fn load_compiled_module(&self, _module: &Module, artifact: &ArtifactResult) -> Option<ModuleDescriptor> {
        self.descriptors
            .get(&(artifact.name.clone(), artifact.version.clone()))
            .copied()
    }
}
