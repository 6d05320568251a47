//! Package type detection.
//!
//! The detected type gates which checks run and how the layout rules are
//! applied. Detection prefers the `<em:type>` declaration in
//! `install.rdf`, falls back to a `dictionaries/` folder probe, and
//! finally to the package's file extension. The install-manifest reader is
//! an external collaborator behind the [`InstallRdf`] trait; this module
//! never parses RDF itself.

use serde::Serialize;

use crate::bundle::ErrorBundle;

/// The kind of package under validation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageType {
    /// Type not yet determined.
    #[default]
    Unknown,
    /// A regular extension.
    Extension,
    /// A theme package.
    Theme,
    /// A spell-checking dictionary.
    Dictionary,
    /// A language pack.
    Langpack,
    /// An OpenSearch search provider.
    Search,
    /// A container of multiple extensions.
    Multi,
    /// A nested package inside another package.
    Subpackage,
}

impl PackageType {
    /// Human-readable label for summaries.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Extension => "Extension",
            Self::Theme => "Theme",
            Self::Dictionary => "Dictionary",
            Self::Langpack => "Language Pack",
            Self::Search => "Search Provider",
            Self::Multi => "Multi-Extension",
            Self::Subpackage => "Subpackage",
        }
    }
}

impl std::fmt::Display for PackageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Read access to a parsed `install.rdf`, supplied by an external
/// collaborator. `object_for` looks up the object of the first statement
/// whose predicate has the given `em-rdf` local name.
#[cfg_attr(test, mockall::automock)]
pub trait InstallRdf {
    /// Returns the object value for an `em:` predicate local name, such as
    /// `type` or `targetApplication`.
    fn object_for(&self, predicate: &str) -> Option<String>;
}

/// Maps a declared `<em:type>` value onto the normalized type system.
fn translate_em_type(value: &str) -> Option<PackageType> {
    match value {
        "2" => Some(PackageType::Extension),
        "4" => Some(PackageType::Theme),
        "8" => Some(PackageType::Langpack),
        "32" => Some(PackageType::Multi),
        _ => None,
    }
}

/// Guesses a type from the package's file extension alone.
fn type_from_extension(extension: &str) -> Option<PackageType> {
    match extension {
        "jar" => Some(PackageType::Theme),
        "xpi" => Some(PackageType::Extension),
        _ => None,
    }
}

/// Determines the package type from `install.rdf`, the entry listing, and
/// the file extension, recording notices and errors along the way.
///
/// Returns `None` when no determination could be made; the caller reports
/// that as its own error.
pub fn detect_type(
    bundle: &mut ErrorBundle,
    install_rdf: Option<&dyn InstallRdf>,
    contents: &[String],
    extension: &str,
) -> Option<PackageType> {
    let Some(install_rdf) = install_rdf else {
        bundle
            .notice(
                ["typedetection", "detect_type", "missing_install_rdf"],
                "install.rdf was not found.",
            )
            .description(
                "The type should be determined by install.rdf if present. \
                 If it isn't, we still need to know the type.",
            )
            .emit();

        // Without a manifest the only safe assumption is a dictionary
        // shipped as a bare .xpi.
        return (extension == "xpi").then_some(PackageType::Dictionary);
    };

    if let Some(declared) = install_rdf.object_for("type") {
        return match translate_em_type(&declared) {
            Some(found) => Some(found),
            None => {
                bundle
                    .error(
                        ["typedetection", "detect_type", "invalid_em_type"],
                        "Invalid <em:type> value.",
                    )
                    .description(
                        "The only valid values for <em:type> are 2, 4, 8, and 32. \
                         Any other values are either invalid or deprecated.",
                    )
                    .file("install.rdf")
                    .emit();
                None
            }
        };
    }

    bundle
        .notice(
            ["typedetection", "detect_type", "no_em_type"],
            "No <em:type> element found in install.rdf",
        )
        .description(
            "It isn't always required, but it is the most reliable method \
             for determining addon type.",
        )
        .file("install.rdf")
        .emit();

    // Dictionaries frequently omit <em:type>; a dictionaries/ folder is a
    // strong enough signal because the dictionary layout rules are strict.
    if contents
        .iter()
        .any(|entry| entry.starts_with("dictionaries"))
    {
        return Some(PackageType::Dictionary);
    }

    type_from_extension(extension)
}
