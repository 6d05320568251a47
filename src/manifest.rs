//! Chrome manifest parsing and resolution.
//!
//! A `chrome.manifest` file is a line-oriented triple store: each
//! non-comment line holds a subject, a predicate, and an object separated
//! by whitespace. This module parses the triples, computes which overlay
//! declarations are trustworthy, and resolves logical `chrome://` URIs to
//! physical in-archive paths.

use crate::context::ContextGenerator;
use crate::uri::{package_and_path, url_join};

/// Packages that may legitimately be overlaid without further
/// justification.
const TRUSTED_OVERLAY_PACKAGES: [&str; 7] = [
    "global",
    "mozapps",
    "browser",
    "navigator",
    "messager",
    "firebug",
    "addons",
];

/// One parsed manifest line. Immutable once parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Triple {
    /// First token of the line.
    pub subject: String,
    /// Second token of the line.
    pub predicate: String,
    /// Remainder of the line; may be empty.
    pub object: String,
    /// 1-based source line number.
    pub line: u32,
}

/// An overlay declaration: `source` is merged into `target` at load time.
#[derive(Clone, Debug, PartialEq, Eq)]
struct OverlayEdge {
    target: String,
    source: String,
}

/// A parsed `chrome.manifest` file with overlay trust analysis.
#[derive(Clone, Debug)]
pub struct ChromeManifest {
    triples: Vec<Triple>,
    overlays: Vec<String>,
    context: ContextGenerator,
}

impl ChromeManifest {
    /// Parses manifest text into a queryable triple store.
    ///
    /// Blank lines, comment lines, and lines with fewer than two tokens
    /// are skipped; malformed lines never produce an error.
    ///
    /// # Examples
    ///
    /// ```
    /// use xpivet::manifest::ChromeManifest;
    ///
    /// let manifest = ChromeManifest::parse("content regular chrome/content\n# comment");
    /// assert_eq!(manifest.triples(None, None, None).count(), 1);
    /// ```
    #[must_use]
    pub fn parse(data: &str) -> Self {
        let triples = data
            .lines()
            .enumerate()
            .filter_map(|(index, raw)| {
                parse_line(raw, u32::try_from(index + 1).unwrap_or(u32::MAX))
            })
            .collect();
        let mut manifest = Self {
            triples,
            overlays: Vec::new(),
            context: ContextGenerator::new(data),
        };
        manifest.overlays = manifest.accepted_overlays();
        manifest
    }

    /// Returns the triples matching the given filters, in source order.
    ///
    /// Omitted filters match everything.
    pub fn triples<'a, 'f>(
        &'a self,
        subject: Option<&'f str>,
        predicate: Option<&'f str>,
        object: Option<&'f str>,
    ) -> impl Iterator<Item = &'a Triple> + use<'a, 'f> {
        self.triples.iter().filter(move |triple| {
            subject.is_none_or(|s| triple.subject == s)
                && predicate.is_none_or(|p| triple.predicate == p)
                && object.is_none_or(|o| triple.object == o)
        })
    }

    /// Returns the first triple matching the given filters.
    #[must_use]
    pub fn first(
        &self,
        subject: Option<&str>,
        predicate: Option<&str>,
        object: Option<&str>,
    ) -> Option<&Triple> {
        self.triples(subject, predicate, object).next()
    }

    /// The sorted set of overlay source URIs that are both resolvable and
    /// accepted by the trust closure.
    #[must_use]
    pub fn overlays(&self) -> &[String] {
        &self.overlays
    }

    /// Borrow the context generator for attaching manifest-line snippets
    /// to messages.
    #[must_use]
    pub const fn context(&self) -> &ContextGenerator {
        &self.context
    }

    /// Resolves a chrome URI to a physical in-archive path.
    ///
    /// A reference that does not name a registered `content` or `skin`
    /// package resolves to `None`; resolution failure is a normal checked
    /// condition, never an error.
    ///
    /// A bare-authority reference such as `chrome://pkg/content/` also
    /// resolves to `None`: historically the resolver computed the
    /// `pkg.xul`/`pkg.css` shorthand and then discarded it, and checks
    /// depend on that behaviour, so it is preserved here verbatim.
    ///
    /// # Examples
    ///
    /// ```
    /// use xpivet::manifest::ChromeManifest;
    ///
    /// let manifest = ChromeManifest::parse("content regular chrome/content");
    /// assert_eq!(
    ///     manifest.resolve("chrome://regular/content/overlay.xul", None),
    ///     Some("chrome/content/overlay.xul".into())
    /// );
    /// assert_eq!(manifest.resolve("chrome://regular/content/", None), None);
    /// ```
    #[must_use]
    pub fn resolve(&self, uri: &str, base: Option<&str>) -> Option<String> {
        let (package, path) = package_and_path(uri, base);
        let (chrome_type, inner) = match_chrome_path(&path)?;

        let triple = self.first(Some(chrome_type), Some(&package), None)?;
        let base_path = triple
            .object
            .split_whitespace()
            .next()
            .unwrap_or_default();

        let Some(inner) = inner else {
            // Shorthand: chrome://pkg/content/ names pkg.xul (pkg.css for
            // skins), but bare references have never resolved here and
            // callers rely on that. See the method docs.
            let _shorthand = match chrome_type {
                "content" => format!("{}{package}.xul", triple.object),
                _ => format!("{}{package}.css", triple.object),
            };
            return None;
        };

        if let Some(stripped) = inner.strip_prefix('/')
            && base_path.ends_with('/')
        {
            return Some(format!("{base_path}{stripped}"));
        }
        Some(format!("{base_path}{inner}"))
    }

    /// Joins and decomposes a URI without consulting the triple store.
    #[must_use]
    pub fn package_and_path(&self, uri: &str, base: Option<&str>) -> (String, String) {
        package_and_path(uri, base)
    }

    /// Joins a reference against a base URI.
    #[must_use]
    pub fn join(&self, base: &str, reference: &str) -> String {
        url_join(base, reference)
    }

    /// Computes the least fixed point of the overlay trust relation.
    ///
    /// An edge is accepted when its target package is trusted outright,
    /// or when its target is the source of an already-accepted edge.
    /// Iterates until a scan promotes nothing; recursion would make the
    /// depth proportional to chain length.
    fn accepted_overlays(&self) -> Vec<String> {
        let mut pending: Vec<OverlayEdge> = self
            .triples(Some("overlay"), None, None)
            .filter_map(|triple| {
                let source = triple.object.split_whitespace().next()?;
                Some(OverlayEdge {
                    target: triple.predicate.clone(),
                    source: source.to_owned(),
                })
            })
            .collect();

        let mut accepted_sources: Vec<String> = Vec::new();
        loop {
            let (promoted, rest): (Vec<OverlayEdge>, Vec<OverlayEdge>) =
                pending.into_iter().partition(|edge| {
                    let (package, _) = package_and_path(&edge.target, None);
                    TRUSTED_OVERLAY_PACKAGES.contains(&package.as_str())
                        || accepted_sources.iter().any(|uri| uri == &edge.target)
                });
            if promoted.is_empty() {
                break;
            }
            accepted_sources.extend(promoted.into_iter().map(|edge| edge.source));
            pending = rest;
        }

        let mut overlays: Vec<String> = accepted_sources
            .into_iter()
            .filter(|uri| self.resolve(uri, None).is_some())
            .collect();
        overlays.sort();
        overlays.dedup();
        overlays
    }
}

/// Splits a manifest line into a triple, or `None` for blank, comment,
/// and under-length lines.
fn parse_line(raw: &str, line: u32) -> Option<Triple> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let (subject, rest) = split_token(trimmed);
    let (predicate, object) = split_token(rest);
    if predicate.is_empty() {
        return None;
    }
    Some(Triple {
        subject: subject.to_owned(),
        predicate: predicate.to_owned(),
        object: object.to_owned(),
        line,
    })
}

/// Splits off the first whitespace-delimited token, trimming the remainder's
/// leading whitespace so runs of spaces or tabs collapse.
fn split_token(text: &str) -> (&str, &str) {
    match text.find(char::is_whitespace) {
        Some(pos) => (&text[..pos], text[pos..].trim_start()),
        None => (text, ""),
    }
}

/// Matches a chrome path against `^/?(content|skin)(/.+)?$`, returning the
/// chrome type and the optional trailing path (with its leading slash).
fn match_chrome_path(path: &str) -> Option<(&'static str, Option<&str>)> {
    let bare = path.strip_prefix('/').unwrap_or(path);
    for chrome_type in ["content", "skin"] {
        let Some(rest) = bare.strip_prefix(chrome_type) else {
            continue;
        };
        if rest.is_empty() || rest == "/" {
            return Some((chrome_type, None));
        }
        if rest.starts_with('/') {
            return Some((chrome_type, Some(rest)));
        }
    }
    None
}
