//! End-to-end validation runs: a package on disk, the built-in checks, and
//! the rendered report.

mod support;

use std::path::Path;

use xpivet::checks::{LIBRARY_DIGESTS_RESOURCE, MANIFEST_RESOURCE};
use xpivet::detect::InstallRdf;
use xpivet::runner::InstallRdfParser;
use xpivet::{CheckRegistry, ErrorBundle, PackageType, Report, Validator};

/// Install-manifest stub declaring a fixed `<em:type>`.
struct StubRdf(Option<&'static str>);

impl InstallRdf for StubRdf {
    fn object_for(&self, predicate: &str) -> Option<String> {
        (predicate == "type")
            .then(|| self.0.map(str::to_owned))
            .flatten()
    }
}

struct StubParser(Option<&'static str>);

impl InstallRdfParser for StubParser {
    fn parse(&self, _bytes: &[u8]) -> Option<Box<dyn InstallRdf>> {
        Some(Box::new(StubRdf(self.0)))
    }
}

fn validator_declaring(em_type: Option<&'static str>) -> Validator {
    Validator::new(CheckRegistry::with_builtin_checks())
        .with_install_rdf_parser(Box::new(StubParser(em_type)))
}

fn validate(validator: &Validator, bundle: &mut ErrorBundle, path: &Path) -> Report {
    validator.validate_path(bundle, path);
    Report::from_bundle(bundle, true)
}

#[test]
fn nested_findings_surface_with_the_inner_archive_prefixed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let inner = support::zip_bytes(&[("components/helper.dll", b"MZ")]);
    let path = support::write_package(
        dir.path(),
        "addon.xpi",
        &[
            ("install.rdf", b"<RDF/>".as_slice()),
            ("chrome.manifest", b"content addonpkg chrome/content\n".as_slice()),
            ("inner.jar", inner.as_slice()),
        ],
    );

    let validator = validator_declaring(Some("2"));
    let mut bundle = ErrorBundle::new(true);
    let report = validate(&validator, &mut bundle, &path);

    assert_eq!(bundle.detected_type(), PackageType::Extension);
    // The blacklisted .dll was found inside inner.jar at tier 1 of the
    // nested pass and replayed into the parent with the archive prefixed.
    let nested_warning = bundle
        .warnings()
        .iter()
        .find(|message| message.file.to_string() == "inner.jar > components/helper.dll")
        .expect("nested warning replayed");
    assert_eq!(nested_warning.tier, 1);

    // The outer manifest survived the nested pass via the pushable table.
    assert!(bundle.has_resource(MANIFEST_RESOURCE));

    assert!(!report.success);
    assert!(!report.unfinished);
}

#[test]
fn multi_package_inner_extensions_are_type_checked() {
    let dir = tempfile::tempdir().expect("tempdir");
    let inner = support::zip_bytes(&[("install.rdf", b"<RDF/>".as_slice())]);
    let path = support::write_package(
        dir.path(),
        "addon.xpi",
        &[
            ("install.rdf", b"<RDF/>".as_slice()),
            ("inner.xpi", inner.as_slice()),
        ],
    );

    // The stub declares <em:type> 32 everywhere, so the inner package
    // detects as another multi-extension container instead of the
    // extension a multi package must hold.
    let validator = validator_declaring(Some("32"));
    let mut bundle = ErrorBundle::new(true);
    let report = validate(&validator, &mut bundle, &path);

    assert_eq!(bundle.detected_type(), PackageType::Multi);
    let mismatch = bundle
        .warnings()
        .iter()
        .find(|message| message.id == ["main", "test_package", "extension_type_mismatch"])
        .expect("nested mismatch replayed");
    assert!(mismatch.file.to_string().starts_with("inner.xpi"));
    assert!(report.rejected);
}

#[test]
fn conforming_dictionary_passes_end_to_end() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = support::write_package(
        dir.path(),
        "words.xpi",
        &[
            ("install.rdf", b"<RDF/>".as_slice()),
            ("dictionaries/", b"".as_slice()),
            ("dictionaries/en-GB.aff", b"aff".as_slice()),
            ("dictionaries/en-GB.dic", b"dic".as_slice()),
            ("README.txt", b"notes".as_slice()),
        ],
    );

    // No <em:type>: detection falls through to the dictionaries/ probe.
    let validator = validator_declaring(None);
    let mut bundle = ErrorBundle::new(true);
    let report = validate(&validator, &mut bundle, &path);

    assert_eq!(bundle.detected_type(), PackageType::Dictionary);
    assert!(report.success);
    assert!(report.errors == 0 && report.warnings == 0);
    assert!(report.render_summary().contains("Validation succeeded!"));
}

#[test]
fn known_library_digests_flow_from_the_resource_table() {
    let dir = tempfile::tempdir().expect("tempdir");
    let payload = b"/* a well-known library */".as_slice();
    let digest = format!("{:x}", {
        use sha2::Digest as _;
        sha2::Sha256::digest(payload)
    });
    let path = support::write_package(
        dir.path(),
        "addon.xpi",
        &[
            ("install.rdf", b"<RDF/>".as_slice()),
            ("content/jquery.js", payload),
        ],
    );

    let validator = validator_declaring(Some("2"));
    let mut bundle = ErrorBundle::new(true);
    bundle.save_resource(LIBRARY_DIGESTS_RESOURCE, vec![digest], true);
    let report = validate(&validator, &mut bundle, &path);

    let notice = bundle.notices().first().expect("library notice");
    assert_eq!(notice.file.to_string(), "content/jquery.js");
    assert!(report.success);
}

#[test]
fn undetermined_runs_stop_at_the_failing_tier() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = support::write_package(
        dir.path(),
        "addon.xpi",
        &[("install.rdf", b"<RDF/>".as_slice())],
    );

    let mut registry = CheckRegistry::new();
    registry.register(1, |bundle: &mut ErrorBundle, _, _| {
        bundle.error(["fixture", "broken"], "tier one failure").emit();
    });
    registry.register(2, |bundle: &mut ErrorBundle, _, _| {
        bundle.notice(["fixture", "later"], "should never run").emit();
    });
    let validator =
        Validator::new(registry).with_install_rdf_parser(Box::new(StubParser(Some("2"))));

    let mut bundle = ErrorBundle::new(false);
    let report = validate(&validator, &mut bundle, &path);

    assert!(report.unfinished);
    assert!(bundle.notices().is_empty());
    assert!(
        report
            .render_summary()
            .contains("terminated before completion")
    );
}

#[test]
fn json_report_round_trips_the_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = support::write_package(
        dir.path(),
        "addon.xpi",
        &[
            ("install.rdf", b"<RDF/>".as_slice()),
            ("scripts/run.sh", b"#!/bin/sh".as_slice()),
        ],
    );

    let validator = validator_declaring(Some("2"));
    let mut bundle = ErrorBundle::new(true);
    let report = validate(&validator, &mut bundle, &path);

    let json = report.to_json().expect("report serializes");
    let value: serde_json::Value = serde_json::from_str(&json).expect("report parses");
    assert_eq!(value["detected_type"], "extension");
    assert_eq!(value["success"], false);
    assert_eq!(value["warnings"], 1);
    let tree = &value["message_tree"]["children"]["testcases_packagelayout"];
    assert_eq!(tree["warnings"], 1);
}
