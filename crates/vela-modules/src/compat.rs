//! Compiled-artifact format compatibility

use crate::diagnostics::ResolutionIssue;
use crate::module::BinaryVersion;

/// Whether an artifact in format `found` can be read by a toolchain that
/// supports `supported`. Both components must match exactly.
pub fn is_binary_version_supported(found: BinaryVersion, supported: BinaryVersion) -> bool {
    found.major == supported.major && found.minor == supported.minor
}

/// Issue to report for a module recorded in format `found`, if any.
/// Modules with no recorded format are not checked.
pub fn check_binary_version(
    found: Option<BinaryVersion>,
    supported: BinaryVersion,
) -> Option<ResolutionIssue> {
    let found = found?;
    if is_binary_version_supported(found, supported) {
        return None;
    }
    Some(ResolutionIssue::BinaryFormatIncompatible { found, supported })
}
