//! File blacklist checks.
//!
//! Two independent rules: native or executable file extensions are flagged
//! as warnings, and files whose SHA-256 digest matches a known JavaScript
//! library are flagged as notices. The digest set is supplied by the
//! caller through the `library_digests` resource so the known-library
//! list can be updated without a rebuild.

use sha2::{Digest, Sha256};

use crate::bundle::ErrorBundle;
use crate::dispatch::{CheckRegistry, PackageData};

/// Resource name of the known-library digest list (`Vec<String>`,
/// lower-case hex SHA-256).
pub const LIBRARY_DIGESTS_RESOURCE: &str = "library_digests";

/// File extensions that are never acceptable in an extension package.
const BLACKLISTED_EXTENSIONS: [&str; 7] = ["dll", "exe", "dylib", "so", "sh", "class", "swf"];

/// Warns about files with blacklisted extensions.
pub fn test_blacklisted_files(
    bundle: &mut ErrorBundle,
    package: &mut PackageData<'_>,
    _registry: &CheckRegistry,
) {
    for entry in &package.contents {
        let Some((_, extension)) = entry.rsplit_once('.') else {
            continue;
        };
        let extension = extension.to_ascii_lowercase();
        if BLACKLISTED_EXTENSIONS.contains(&extension.as_str()) {
            bundle
                .warning(
                    [
                        "testcases_packagelayout",
                        "test_blacklisted_files",
                        "disallowed_extension",
                    ],
                    format!("File '{entry}' is using a blacklisted file extension ({extension})"),
                )
                .file(entry.clone())
                .emit();
        }
    }
}

/// Flags files whose digest matches a known JS library.
pub fn test_library_blacklist(
    bundle: &mut ErrorBundle,
    package: &mut PackageData<'_>,
    _registry: &CheckRegistry,
) {
    let Some(digests) = bundle.resource::<Vec<String>>(LIBRARY_DIGESTS_RESOURCE) else {
        return;
    };

    let entries: Vec<String> = package
        .contents
        .iter()
        .filter(|entry| !entry.ends_with('/'))
        .cloned()
        .collect();
    for entry in entries {
        let Ok(bytes) = package.archive.read(&entry) else {
            continue;
        };
        let digest = format!("{:x}", Sha256::digest(&bytes));
        if digests.contains(&digest) {
            bundle
                .notice(
                    [
                        "testcases_library_blacklist",
                        "test_library_blacklist",
                        "blacklisted_js_library",
                    ],
                    "JS library detected",
                )
                .description(vec![
                    "JavaScript libraries are discouraged for simple add-ons, \
                     but are generally accepted"
                        .to_owned(),
                    format!("File {entry} is a known JS library"),
                ])
                .file(entry)
                .emit();
        }
    }
}
