//! Nested package recursion.
//!
//! Packages can contain further packages: a multi-extension XPI holds
//! inner XPIs, themes ship jars. Each nested archive gets its own scoped
//! validation pass, with the bundle's state stack isolating its messages
//! and resources from the parent's. Inner XPIs of a multi-extension
//! package must stand alone as extensions and get the full package pass,
//! install.rdf and type detection included; every other nested archive is
//! a subpackage and only re-runs the tiers.

use crate::archive::open_nested;
use crate::bundle::ErrorBundle;
use crate::detect::PackageType;
use crate::dispatch::{CheckRegistry, PackageData};
use crate::runner::validate_nested_extension;

/// Validates every nested `.xpi` and `.jar` archive in the package.
pub fn test_subpackages(
    bundle: &mut ErrorBundle,
    package: &mut PackageData<'_>,
    registry: &CheckRegistry,
) {
    let parent_type = bundle.detected_type();
    let nested: Vec<String> = package
        .contents
        .iter()
        .filter(|entry| entry.ends_with(".xpi") || entry.ends_with(".jar"))
        .cloned()
        .collect();

    for entry in nested {
        let Ok(bytes) = package.archive.read(&entry) else {
            bundle
                .error(
                    ["testcases_content", "test_packed_packages", "jar_subpackage_corrupt"],
                    format!("Subpackage {entry} could not be extracted."),
                )
                .file(entry.clone())
                .emit();
            continue;
        };
        let mut archive = match open_nested(bytes) {
            Ok(archive) => archive,
            Err(err) => {
                bundle
                    .error(
                        ["testcases_content", "test_packed_packages", "jar_subpackage_corrupt"],
                        format!("Subpackage {entry} is corrupt: {err}"),
                    )
                    .file(entry.clone())
                    .emit();
                continue;
            }
        };

        bundle.push_state(&entry);
        let mut subpackage = PackageData::new(&mut archive, entry.as_str());
        if parent_type == PackageType::Multi && entry.ends_with(".xpi") {
            validate_nested_extension(bundle, &mut subpackage, registry);
        } else {
            bundle.set_type(PackageType::Subpackage);
            registry.run_tiers(bundle, &mut subpackage);
        }
        bundle.pop_state();
    }
}
