//! The validation driver.
//!
//! [`Validator`] owns the check registry and the optional external
//! collaborators (an install-manifest parser and an OpenSearch detector),
//! opens the package, establishes its type, and hands control to the tier
//! dispatcher. Every finding lands on the caller's [`ErrorBundle`]; the
//! driver itself only returns early, never an error.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use std::rc::Rc;

use crate::archive::XpiArchive;
use crate::bundle::ErrorBundle;
use crate::detect::{InstallRdf, PackageType, detect_type};
use crate::dispatch::{CheckRegistry, PackageData};

/// Resource flag: the package shipped an `install.rdf`.
pub const HAS_INSTALL_RDF_RESOURCE: &str = "has_install_rdf";
/// Resource holding the parsed install manifest (`Box<dyn InstallRdf>`).
pub const INSTALL_RDF_RESOURCE: &str = "install_rdf";
/// Resource holding the shared install-manifest parser
/// (`Rc<dyn InstallRdfParser>`), so nested package scopes can parse
/// their own manifests.
pub const INSTALL_RDF_PARSER_RESOURCE: &str = "install_rdf_parser";

/// Parses `install.rdf` bytes into a queryable manifest. Supplied by an
/// external collaborator; the engine carries no RDF parser of its own.
#[cfg_attr(test, mockall::automock)]
pub trait InstallRdfParser {
    /// Parses the manifest, or `None` when the document is malformed.
    fn parse(&self, bytes: &[u8]) -> Option<Box<dyn InstallRdf>>;
}

/// Outcome of OpenSearch provider detection.
#[derive(Debug)]
pub enum OpensearchOutcome {
    /// The document is a well-formed OpenSearch provider.
    Confirmed,
    /// The document failed detection. A `decided` failure is final and
    /// rejects the package.
    Failed {
        /// Human-readable failure reason.
        reason: String,
        /// Whether the failure is a final verdict.
        decided: bool,
    },
}

/// Inspects a standalone XML document for OpenSearch provider structure.
/// Supplied by an external collaborator.
#[cfg_attr(test, mockall::automock)]
pub trait OpensearchDetector {
    /// Classifies the document.
    fn detect(&self, bytes: &[u8]) -> OpensearchOutcome;
}

/// Drives a full validation run.
pub struct Validator {
    registry: CheckRegistry,
    expected: Option<PackageType>,
    install_rdf_parser: Option<Rc<dyn InstallRdfParser>>,
    opensearch_detector: Option<Box<dyn OpensearchDetector>>,
}

impl Validator {
    /// Creates a validator over a check registry with no expectation and
    /// no collaborators.
    #[must_use]
    pub fn new(registry: CheckRegistry) -> Self {
        Self {
            registry,
            expected: None,
            install_rdf_parser: None,
            opensearch_detector: None,
        }
    }

    /// Declares the package type the caller expects; a mismatch rejects.
    #[must_use]
    pub fn expecting(mut self, expected: PackageType) -> Self {
        self.expected = Some(expected);
        self
    }

    /// Supplies the install-manifest parser collaborator.
    #[must_use]
    pub fn with_install_rdf_parser(mut self, parser: Box<dyn InstallRdfParser>) -> Self {
        self.install_rdf_parser = Some(Rc::from(parser));
        self
    }

    /// Supplies the OpenSearch detector collaborator.
    #[must_use]
    pub fn with_opensearch_detector(mut self, detector: Box<dyn OpensearchDetector>) -> Self {
        self.opensearch_detector = Some(detector);
        self
    }

    /// The registry this validator dispatches through.
    #[must_use]
    pub const fn registry(&self) -> &CheckRegistry {
        &self.registry
    }

    /// Validates the package at a filesystem path.
    pub fn validate_path(&self, bundle: &mut ErrorBundle, path: &Path) {
        if !path.is_file() {
            bundle.set_reject(true);
            bundle
                .error(
                    ["main", "prepare_package", "not_found"],
                    "The package could not be found.",
                )
                .emit();
            return;
        }

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        if extension == "xml" {
            match std::fs::read(path) {
                Ok(bytes) => self.validate_search(bundle, &bytes),
                Err(err) => {
                    bundle.set_reject(true);
                    bundle
                        .error(
                            ["main", "prepare_package", "not_found"],
                            format!("The package could not be read: {err}"),
                        )
                        .emit();
                }
            }
            return;
        }

        if extension != "xpi" && extension != "jar" {
            // Still attempt to open it: the container may be a plain zip
            // under a misleading name, and its contents are worth a look.
            bundle.set_reject(true);
            bundle
                .error(
                    ["main", "prepare_package", "unrecognized"],
                    "The package is not of a recognized type.",
                )
                .emit();
        }

        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) => {
                bundle.set_reject(true);
                bundle
                    .error(
                        ["main", "test_package", "unopenable"],
                        format!("The package could not be opened: {err}"),
                    )
                    .emit();
                return;
            }
        };
        self.validate_package(bundle, file, &name);
    }

    /// Validates an already-open package container.
    pub fn validate_package<R: Read + Seek>(
        &self,
        bundle: &mut ErrorBundle,
        source: R,
        name: &str,
    ) {
        let mut archive = match XpiArchive::open(source) {
            Ok(archive) => archive,
            Err(err) => {
                bundle
                    .error(
                        ["main", "test_package", "unopenable"],
                        format!("The XPI could not be opened: {err}"),
                    )
                    .emit();
                return;
            }
        };

        if let Some(reason) = archive.integrity_failure() {
            bundle.set_reject(true);
            bundle
                .error(
                    ["main", "test_package", "corrupt"],
                    format!("The package is corrupt: {reason}"),
                )
                .emit();
            return;
        }

        let mut package = PackageData::new(&mut archive, name);

        // A .jar container is assumed to be a theme. The assumption error
        // and any later detection mismatch are reported independently.
        if package.extension == "jar"
            && !matches!(self.expected, None | Some(PackageType::Theme))
        {
            bundle
                .error(
                    ["main", "test_package", "unexpected_type"],
                    "The package is a theme archive, which was not expected here.",
                )
                .emit();
        }

        if let Some(parser) = &self.install_rdf_parser {
            bundle.save_resource(INSTALL_RDF_PARSER_RESOURCE, Rc::clone(parser), true);
        }
        establish_type(
            bundle,
            &mut package,
            self.install_rdf_parser.as_deref(),
            self.expected,
        );

        self.registry.run_tiers(bundle, &mut package);
    }

    /// Validates a standalone XML document as an OpenSearch provider.
    pub fn validate_search(&self, bundle: &mut ErrorBundle, bytes: &[u8]) {
        if !matches!(self.expected, None | Some(PackageType::Search)) {
            bundle.set_reject(true);
            bundle
                .warning(
                    ["main", "test_search", "extension"],
                    "A search provider was found where another package type \
                     was expected.",
                )
                .emit();
            return;
        }

        let Some(detector) = self.opensearch_detector.as_ref() else {
            bundle.set_reject(true);
            bundle
                .error(
                    ["main", "test_search", "unavailable"],
                    "OpenSearch providers cannot be validated without a detector.",
                )
                .emit();
            return;
        };

        match detector.detect(bytes) {
            OpensearchOutcome::Confirmed => {
                bundle.set_type(PackageType::Search);
                bundle
                    .notice(
                        ["main", "test_search", "confirmed"],
                        "OpenSearch provider confirmed.",
                    )
                    .emit();
            }
            OpensearchOutcome::Failed { reason, decided } => {
                bundle
                    .error(["main", "test_search", "failure"], format!("OpenSearch: {reason}"))
                    .emit();
                if decided {
                    bundle.set_reject(true);
                }
            }
        }
    }
}

/// Runs the full package pass against a nested archive that must stand
/// alone as an extension: install.rdf parsing, type detection, the
/// extension expectation, then every tier.
///
/// Callers push a bundle state frame for the nested entry first. The
/// parser comes from the shared resource that
/// [`Validator::validate_package`] saves, so nested scopes parse their
/// manifests with the same collaborator as the outer package.
pub fn validate_nested_extension(
    bundle: &mut ErrorBundle,
    package: &mut PackageData<'_>,
    registry: &CheckRegistry,
) {
    let parser = bundle.resource::<Rc<dyn InstallRdfParser>>(INSTALL_RDF_PARSER_RESOURCE);
    establish_type(
        bundle,
        package,
        parser.as_deref().map(|parser| &**parser),
        Some(PackageType::Extension),
    );
    registry.run_tiers(bundle, package);
}

/// Parses the install manifest when a parser is available, runs type
/// detection, and compares the result against the caller's expectation.
/// A mismatch rejects the package with a warning.
fn establish_type(
    bundle: &mut ErrorBundle,
    package: &mut PackageData<'_>,
    parser: Option<&dyn InstallRdfParser>,
    expected: Option<PackageType>,
) {
    let install_rdf = parser.and_then(|parser| parse_install_rdf(bundle, package, parser));
    let detected = detect_type(
        bundle,
        install_rdf.as_deref(),
        &package.contents,
        &package.extension,
    );
    if let Some(install_rdf) = install_rdf {
        bundle.save_resource(INSTALL_RDF_RESOURCE, install_rdf, true);
    }
    match detected {
        Some(found) => {
            bundle.set_type(found);
            if let Some(expected) = expected
                && expected != found
            {
                bundle.set_reject(true);
                bundle
                    .warning(
                        ["main", "test_package", "extension_type_mismatch"],
                        format!(
                            "The package was expected to be a {expected} \
                             but was detected as a {found}."
                        ),
                    )
                    .emit();
            }
        }
        None => {
            bundle
                .error(
                    ["main", "test_package", "undeterminable_type"],
                    "The type of the package could not be determined.",
                )
                .emit();
        }
    }
}

fn parse_install_rdf(
    bundle: &mut ErrorBundle,
    package: &mut PackageData<'_>,
    parser: &dyn InstallRdfParser,
) -> Option<Box<dyn InstallRdf>> {
    if !package.contents.iter().any(|entry| entry == "install.rdf") {
        return None;
    }
    let Ok(bytes) = package.archive.read("install.rdf") else {
        bundle
            .error(
                ["main", "test_package", "cannot_parse_installrdf"],
                "install.rdf could not be read.",
            )
            .file("install.rdf")
            .emit();
        return None;
    };
    let Some(install_rdf) = parser.parse(&bytes) else {
        bundle
            .error(
                ["main", "test_package", "cannot_parse_installrdf"],
                "Could not parse install.rdf.",
            )
            .file("install.rdf")
            .emit();
        return None;
    };
    bundle.save_resource(HAS_INSTALL_RDF_RESOURCE, true, true);
    Some(install_rdf)
}
