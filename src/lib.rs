//! Static validation engine for browser extension packages.
//!
//! The engine opens a zip-format package, establishes its type, and runs
//! registered checks in ascending tiers, collecting every finding on a
//! shared [`ErrorBundle`]. Chrome registration data is parsed and resolved
//! by [`manifest::ChromeManifest`]; nested packages are validated
//! recursively with scoped state. Parsing of `install.rdf` and OpenSearch
//! documents is delegated to external collaborators behind traits.
//!
//! Typical use:
//!
//! ```no_run
//! use xpivet::{CheckRegistry, ErrorBundle, Report, Validator};
//!
//! let validator = Validator::new(CheckRegistry::with_builtin_checks());
//! let mut bundle = ErrorBundle::new(true);
//! validator.validate_path(&mut bundle, std::path::Path::new("addon.xpi"));
//! let report = Report::from_bundle(&bundle, true);
//! println!("{}", report.render_summary());
//! ```

pub mod archive;
pub mod bundle;
pub mod checks;
pub mod context;
pub mod detect;
pub mod dispatch;
pub mod error;
pub mod manifest;
pub mod report;
pub mod runner;
pub mod uri;

pub use archive::{ArchiveReader, MemoryArchive, XpiArchive};
pub use bundle::{Description, ErrorBundle, FileTrace, Message, Severity};
pub use detect::{InstallRdf, PackageType};
pub use dispatch::{CheckRegistry, PackageData};
pub use error::{Result, ValidationError};
pub use manifest::ChromeManifest;
pub use report::Report;
pub use runner::{InstallRdfParser, OpensearchDetector, OpensearchOutcome, Validator};
