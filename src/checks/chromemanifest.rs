//! Chrome manifest priming check.
//!
//! Parses `chrome.manifest` once and publishes the result through the
//! bundle's resource table so later checks can query registrations and the
//! accepted overlay set without re-parsing. The parsed manifest is saved
//! pushable so nested-package checks still see the top-level manifest.

use crate::bundle::ErrorBundle;
use crate::dispatch::{CheckRegistry, PackageData};
use crate::manifest::ChromeManifest;

/// Resource name of the parsed [`ChromeManifest`].
pub const MANIFEST_RESOURCE: &str = "chrome.manifest";
/// Resource name of the accepted overlay URI set (`Vec<String>`).
pub const OVERLAYS_RESOURCE: &str = "overlay_tags";

/// Parses and caches the package's chrome manifest.
pub fn test_chrome_manifest(
    bundle: &mut ErrorBundle,
    package: &mut PackageData<'_>,
    _registry: &CheckRegistry,
) {
    if !package.contents.iter().any(|entry| entry == MANIFEST_RESOURCE) {
        return;
    }
    if bundle.has_resource(MANIFEST_RESOURCE) {
        return;
    }

    let Ok(bytes) = package.archive.read(MANIFEST_RESOURCE) else {
        bundle
            .error(
                ["testcases_chromemanifest", "test_chrome_manifest", "unreadable"],
                "chrome.manifest could not be read.",
            )
            .file(MANIFEST_RESOURCE)
            .emit();
        return;
    };

    let manifest = ChromeManifest::parse(&String::from_utf8_lossy(&bytes));
    bundle.save_resource(OVERLAYS_RESOURCE, manifest.overlays().to_vec(), false);
    bundle.save_resource(MANIFEST_RESOURCE, manifest, true);
}
