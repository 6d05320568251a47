//! Dictionary package layout rules.
//!
//! Dictionaries have an unusually strict structure: a handful of mandatory
//! files, a short whitelist, and nothing else. Patterns use shell-style
//! globbing against `/`-separated in-archive paths.

use glob::Pattern;

use crate::bundle::ErrorBundle;
use crate::dispatch::{CheckRegistry, PackageData};

const MANDATORY_PATTERNS: [&str; 4] = [
    "install.rdf",
    "dictionaries/",
    "dictionaries/*.aff",
    "dictionaries/*.dic",
];

const WHITELISTED_PATTERNS: [&str; 4] = ["install.js", "__MACOSX/*", "chrome.manifest", "chrome/*"];

const WHITELISTED_EXTENSIONS: [&str; 1] = ["txt"];

fn matches(pattern: &str, entry: &str) -> bool {
    Pattern::new(pattern).is_ok_and(|pattern| pattern.matches(entry))
}

/// Checks that a dictionary package contains its mandatory components and
/// nothing extraneous.
pub fn test_dictionary_layout(
    bundle: &mut ErrorBundle,
    package: &mut PackageData<'_>,
    _registry: &CheckRegistry,
) {
    let mut missing: Vec<&str> = MANDATORY_PATTERNS.to_vec();

    for entry in &package.contents {
        if let Some(position) = missing.iter().position(|pattern| matches(pattern, entry)) {
            missing.remove(position);
            continue;
        }
        if MANDATORY_PATTERNS
            .iter()
            .any(|pattern| matches(pattern, entry))
        {
            // Mandatory pattern already satisfied by an earlier entry.
            continue;
        }
        if WHITELISTED_PATTERNS
            .iter()
            .any(|pattern| matches(pattern, entry))
        {
            continue;
        }
        if entry.ends_with('/') {
            continue;
        }
        if entry
            .rsplit_once('.')
            .is_some_and(|(_, ext)| WHITELISTED_EXTENSIONS.contains(&ext))
        {
            continue;
        }

        bundle
            .error(
                [
                    "testcases_packagelayout",
                    "test_dictionary_layout",
                    "unknown_file",
                ],
                format!("Unknown file found in dictionary ({entry})"),
            )
            .file(entry.clone())
            .emit();
    }

    for pattern in missing {
        bundle
            .error(
                [
                    "testcases_packagelayout",
                    "test_dictionary_layout",
                    "missing_mandatory",
                ],
                format!("Dictionary is missing a mandatory component ({pattern})"),
            )
            .emit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemoryArchive;

    fn run(entries: &[&str]) -> ErrorBundle {
        let mut bundle = ErrorBundle::new(true);
        let mut archive = MemoryArchive::new();
        for entry in entries {
            archive.insert(*entry, Vec::new());
        }
        let mut package = PackageData::new(&mut archive, "dict.xpi");
        test_dictionary_layout(&mut bundle, &mut package, &CheckRegistry::new());
        bundle
    }

    const CONFORMING: [&str; 4] = [
        "install.rdf",
        "dictionaries/",
        "dictionaries/en-GB.aff",
        "dictionaries/en-GB.dic",
    ];

    #[test]
    fn conforming_dictionary_passes() {
        let bundle = run(&CONFORMING);
        assert!(!bundle.failed(true));
    }

    #[test]
    fn whitelisted_extras_are_tolerated() {
        let bundle = run(&[
            "install.rdf",
            "dictionaries/",
            "dictionaries/en-GB.aff",
            "dictionaries/en-GB.dic",
            "install.js",
            "chrome.manifest",
            "chrome/icon.png",
            "__MACOSX/junk",
            "README.txt",
            "extras/",
        ]);
        assert!(!bundle.failed(true));
    }

    #[test]
    fn unknown_file_is_an_error() {
        let mut entries = CONFORMING.to_vec();
        entries.push("content/sneaky.js");
        let bundle = run(&entries);
        assert_eq!(bundle.errors().len(), 1);
        let error = bundle.errors().first().expect("error recorded");
        assert!(error.message.contains("content/sneaky.js"));
    }

    #[test]
    fn missing_mandatory_component_is_an_error() {
        let bundle = run(&["install.rdf", "dictionaries/", "dictionaries/en-GB.aff"]);
        assert_eq!(bundle.errors().len(), 1);
        let error = bundle.errors().first().expect("error recorded");
        assert!(error.message.contains("dictionaries/*.dic"));
    }

    #[test]
    fn duplicate_mandatory_matches_do_not_error() {
        let mut entries = CONFORMING.to_vec();
        entries.push("dictionaries/en-US.dic");
        entries.push("dictionaries/en-US.aff");
        let bundle = run(&entries);
        assert!(!bundle.failed(true));
    }
}
