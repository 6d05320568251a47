//! Built-in validation checks.
//!
//! Each check consumes the engine contract: it reads the package through
//! [`PackageData`](crate::dispatch::PackageData), records findings on the
//! [`ErrorBundle`](crate::bundle::ErrorBundle), and shares intermediate
//! artifacts through the bundle's resource table rather than by calling
//! other checks directly.

mod blacklist;
mod chromemanifest;
mod layout;
mod subpackages;

pub use blacklist::{LIBRARY_DIGESTS_RESOURCE, test_blacklisted_files, test_library_blacklist};
pub use chromemanifest::{MANIFEST_RESOURCE, OVERLAYS_RESOURCE, test_chrome_manifest};
pub use layout::test_dictionary_layout;
pub use subpackages::test_subpackages;

use crate::detect::PackageType;
use crate::dispatch::CheckRegistry;

/// Registers the built-in checks in their canonical tiers.
pub fn register_builtin_checks(registry: &mut CheckRegistry) {
    registry.register(1, test_chrome_manifest);
    registry.register(1, test_blacklisted_files);
    registry.register(1, test_library_blacklist);
    registry.register_for_types(1, &[PackageType::Dictionary], test_dictionary_layout);
    registry.register(2, test_subpackages);
}
