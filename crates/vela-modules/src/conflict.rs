//! Version conflict detection
//!
//! Everything in the binary inputs shares one link space, so a module may
//! only appear there in one version.

use crate::diagnostics::ResolutionIssue;
use crate::module::{make_module_name, ModuleId};
use crate::registry::{normalize_module_name, ModuleRegistry};
use crate::version::{compare_versions, order_versions};
use std::cmp::Ordering;

/// A clash between a candidate module and one already in the binary inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    /// Same name, different version. Fatal for the edge.
    SameModule {
        existing: ModuleId,
        name: String,
        /// Both versions, lowest first
        versions: [String; 2],
    },

    /// Names normalize to the same thing, versions differ. Advisory.
    SimilarModule {
        existing: ModuleId,
        /// Both `name/version` coordinates, ordered by name then version
        first: String,
        second: String,
    },
}

impl Conflict {
    pub fn existing(&self) -> ModuleId {
        match self {
            Conflict::SameModule { existing, .. } | Conflict::SimilarModule { existing, .. } => {
                *existing
            }
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Conflict::SameModule { .. })
    }

    pub fn into_issue(self) -> ResolutionIssue {
        match self {
            Conflict::SameModule { name, versions, .. } => {
                let [first, second] = versions;
                ResolutionIssue::VersionConflict {
                    name,
                    first,
                    second,
                }
            }
            Conflict::SimilarModule { first, second, .. } => {
                ResolutionIssue::SimilarModuleVersionConflict { first, second }
            }
        }
    }
}

/// Check `candidate` against every module already in the binary inputs.
///
/// Modules are scanned in creation order and the first clash wins, so the
/// verdict only depends on the registry contents.
pub fn detect_conflict(registry: &ModuleRegistry, candidate: ModuleId) -> Option<Conflict> {
    let module = registry.get(candidate);
    let name = module.name_as_string();
    let version = module.version();

    for &loaded_id in registry.similar_modules(&normalize_module_name(&name)) {
        if loaded_id == candidate || !registry.is_binary_input(loaded_id) {
            continue;
        }
        let loaded = registry.get(loaded_id);
        if loaded.version() == version {
            continue;
        }

        let loaded_name = loaded.name_as_string();
        if loaded_name == name {
            let [first, second] = order_versions(version, loaded.version());
            return Some(Conflict::SameModule {
                existing: loaded_id,
                name,
                versions: [first.to_string(), second.to_string()],
            });
        }

        let loaded_first = match loaded_name.cmp(&name) {
            Ordering::Equal => compare_versions(loaded.version(), version) == Ordering::Less,
            ord => ord == Ordering::Less,
        };
        let loaded_coordinates = make_module_name(&loaded_name, loaded.version());
        let candidate_coordinates = make_module_name(&name, version);
        let (first, second) = if loaded_first {
            (loaded_coordinates, candidate_coordinates)
        } else {
            (candidate_coordinates, loaded_coordinates)
        };
        return Some(Conflict::SimilarModule {
            existing: loaded_id,
            first,
            second,
        });
    }

    None
}
