//! Host platform modules
//!
//! Some module names are supplied by the host runtime itself. Whether a
//! requested version is usable is a capability question: a newer runtime
//! still provides the older versions it is compatible with.

use crate::config::PlatformConfig;
use crate::diagnostics::ResolutionIssue;
use crate::module::{Backend, Module, ModuleId};
use crate::registry::ModuleRegistry;
use crate::version::compare_versions;
use rustc_hash::FxHashSet;
use std::cmp::Ordering;

/// Queries answered by the host runtime
pub trait RuntimePlatform {
    /// Whether `name` is one of the runtime's builtin modules
    fn is_platform_module(&self, name: &str) -> bool;

    /// Whether the runtime can satisfy an import of `version`
    fn provides_version(&self, version: &str) -> bool;

    /// Whether `version` is strictly lower than the runtime's own
    fn is_lower_version(&self, version: &str) -> bool;

    /// The runtime's reported version
    fn current_version(&self) -> &str;
}

/// Runtime description taken from the toolchain configuration
#[derive(Debug, Clone)]
pub struct HostPlatform {
    version: String,
    oldest_provided: String,
    modules: FxHashSet<String>,
}

impl HostPlatform {
    pub fn new(version: impl Into<String>, oldest_provided: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            oldest_provided: oldest_provided.into(),
            modules: FxHashSet::default(),
        }
    }

    pub fn from_config(config: &PlatformConfig) -> Self {
        let mut platform = Self::new(&config.version, &config.oldest_provided);
        platform.modules.extend(config.modules.iter().cloned());
        platform
    }

    /// Register a builtin module name (builder style)
    pub fn with_module(mut self, name: impl Into<String>) -> Self {
        self.modules.insert(name.into());
        self
    }
}

impl RuntimePlatform for HostPlatform {
    fn is_platform_module(&self, name: &str) -> bool {
        self.modules.contains(name)
    }

    fn provides_version(&self, version: &str) -> bool {
        compare_versions(&self.oldest_provided, version) != Ordering::Greater
            && compare_versions(version, &self.version) != Ordering::Greater
    }

    fn is_lower_version(&self, version: &str) -> bool {
        compare_versions(version, &self.version) == Ordering::Less
    }

    fn current_version(&self) -> &str {
        &self.version
    }
}

/// Make a freshly referenced platform module usable right away.
///
/// Returns `true` when the runtime provides the requested version; the
/// module is then available, platform-origin and host-restricted.
pub fn setup_if_platform_module(platform: &dyn RuntimePlatform, module: &mut Module) -> bool {
    if !platform.is_platform_module(&module.name_as_string())
        || !platform.provides_version(module.version())
    {
        return false;
    }
    module.mark_available();
    module.mark_from_platform();
    module.restrict_to_backend(Backend::Host);
    true
}

/// Get-or-create a module, setting it up as a platform module when it is
/// created
pub fn get_or_create_module(
    registry: &mut ModuleRegistry,
    platform: &dyn RuntimePlatform,
    name: &str,
    version: &str,
) -> ModuleId {
    let (id, created) = registry.intern(name, version);
    if created && setup_if_platform_module(platform, registry.get_mut(id)) {
        tracing::debug!(module = name, version, "platform module provided by runtime");
    }
    id
}

/// Advisory for an import of a platform module below the runtime's version
pub fn check_platform_import(platform: &dyn RuntimePlatform, imported: &Module) -> Option<ResolutionIssue> {
    if !platform.is_platform_module(&imported.name_as_string())
        || !platform.is_lower_version(imported.version())
    {
        return None;
    }
    Some(ResolutionIssue::PlatformVersionLower {
        requested: imported.version().to_string(),
        current: platform.current_version().to_string(),
    })
}

/// Error to report instead of a generic one when a declaration names a
/// platform module
pub fn platform_version_unavailable(
    platform: &dyn RuntimePlatform,
    imported: &Module,
) -> Option<ResolutionIssue> {
    let name = imported.name_as_string();
    if !platform.is_platform_module(&name) {
        return None;
    }
    Some(ResolutionIssue::PlatformVersionUnavailable {
        name,
        version: imported.version().to_string(),
        current: platform.current_version().to_string(),
    })
}

/// Whether an existing module version satisfies a requested one.
///
/// Missing versions match anything. Platform modules match whenever the
/// runtime provides both versions.
pub fn versions_match(
    platform: &dyn RuntimePlatform,
    name: &str,
    requested: Option<&str>,
    current: Option<&str>,
) -> bool {
    match (requested, current) {
        (Some(requested), Some(current)) => {
            if platform.is_platform_module(name)
                && platform.provides_version(requested)
                && platform.provides_version(current)
            {
                return true;
            }
            requested == current
        }
        _ => true,
    }
}
