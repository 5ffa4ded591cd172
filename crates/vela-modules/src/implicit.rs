//! Implicit imports of the foundational module

use crate::module::ModuleImport;
use crate::registry::ModuleRegistry;

/// Give every module an edge to the foundational module.
///
/// Platform-native modules and the foundational module itself are left
/// alone. Existing edges are kept as they are, so running this again adds
/// nothing. Returns the number of edges added.
pub fn add_implicit_imports(registry: &mut ModuleRegistry) -> usize {
    let foundational = registry.foundational_module();
    let targets: Vec<_> = registry
        .modules()
        .filter(|m| m.id() != foundational && !m.is_from_platform())
        .filter(|m| m.find_import(foundational).is_none())
        .map(|m| m.id())
        .collect();

    for id in &targets {
        registry
            .get_mut(*id)
            .add_import(ModuleImport::new(foundational, false, true, None));
        tracing::trace!(module = %registry.get(*id).coordinates(), "implicit foundational import added");
    }

    targets.len()
}
