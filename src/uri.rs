//! Chrome URI decomposition and relative reference resolution.
//!
//! Manifests reference resources through `chrome://package/type/path`
//! URIs, occasionally nested inside `jar:archive.jar!/path` compound
//! references. This module joins relative references against a base URI
//! with RFC 3986 merge semantics, extended so that the portion of a `jar:`
//! URI before the `!` separator behaves as the scheme and authority for
//! joining purposes and the portion after it as the path.

/// A URI split into the piece that never participates in path merging
/// (scheme plus authority, or the `jar:...!` prefix) and the path that
/// does.
#[derive(Clone, Debug, PartialEq, Eq)]
struct SplitUri<'a> {
    /// `chrome://browser` or `jar:chrome.jar!`; empty for bare paths.
    prefix: &'a str,
    /// Scheme name without separators; empty when absent.
    scheme: &'a str,
    /// Everything after the prefix.
    path: &'a str,
}

fn split_uri(uri: &str) -> SplitUri<'_> {
    if let Some(bang) = uri.find("!/")
        && uri.starts_with("jar:")
    {
        let (prefix, path) = uri.split_at(bang + 1);
        return SplitUri {
            prefix,
            scheme: "jar",
            path,
        };
    }
    if let Some(pos) = uri.find("://") {
        let scheme = &uri[..pos];
        let rest = &uri[pos + 3..];
        let authority_len = rest.find('/').unwrap_or(rest.len());
        let prefix_len = pos + 3 + authority_len;
        return SplitUri {
            prefix: &uri[..prefix_len],
            scheme,
            path: &uri[prefix_len..],
        };
    }
    SplitUri {
        prefix: "",
        scheme: "",
        path: uri,
    }
}

/// Extracts the scheme of a reference, if it carries one.
fn scheme_of(uri: &str) -> Option<&str> {
    let colon = uri.find(':')?;
    let candidate = &uri[..colon];
    if candidate.is_empty()
        || !candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
    {
        return None;
    }
    // A colon inside the first path segment is not a scheme separator.
    match uri.find('/') {
        Some(slash) if slash < colon => None,
        _ => Some(candidate),
    }
}

/// Joins a possibly relative reference against a base URI.
///
/// Mirrors RFC 3986 relative resolution for the subset of URIs seen in
/// chrome manifests: a reference with its own (different) scheme or with
/// an authority wins outright, an absolute path replaces the base path,
/// and a relative path merges with the base path with `.` and `..`
/// segment processing.
///
/// # Examples
///
/// ```
/// use xpivet::uri::url_join;
///
/// let base = "chrome://regular/content/first/overlay.xul";
/// assert_eq!(
///     url_join(base, "../second/overlay2.xul"),
///     "chrome://regular/content/second/overlay2.xul"
/// );
/// ```
#[must_use]
pub fn url_join(base: &str, reference: &str) -> String {
    if base.is_empty() {
        return reference.to_owned();
    }
    if reference.is_empty() {
        return base.to_owned();
    }

    let split_base = split_uri(base);
    if let Some(scheme) = scheme_of(reference)
        && scheme != split_base.scheme
    {
        return reference.to_owned();
    }
    // Strip a redundant same-scheme prefix so the authority test below
    // sees the remainder.
    let reference = reference
        .strip_prefix(split_base.scheme)
        .and_then(|rest| rest.strip_prefix(':'))
        .unwrap_or(reference);

    if let Some(with_authority) = reference.strip_prefix("//") {
        return format!("{}://{}", split_base.scheme, with_authority);
    }
    if reference.starts_with('/') {
        return format!("{}{}", split_base.prefix, reference);
    }

    let merged = merge_paths(split_base.path, reference);
    format!("{}{}", split_base.prefix, merged)
}

/// Merges a relative path into a base path, resolving `.` and `..`.
fn merge_paths(base_path: &str, reference: &str) -> String {
    let mut segments: Vec<&str> = base_path.split('/').collect();
    segments.pop();
    segments.extend(reference.split('/'));

    let mut resolved: Vec<&str> = Vec::with_capacity(segments.len());
    for segment in &segments {
        match *segment {
            "." => {}
            ".." => {
                if matches!(resolved.last(), Some(&last) if !last.is_empty() && last != "..") {
                    resolved.pop();
                } else {
                    resolved.push(segment);
                }
            }
            other => resolved.push(other),
        }
    }
    // A trailing `.` or `..` still names a directory.
    if matches!(segments.last(), Some(&".") | Some(&"..")) {
        resolved.push("");
    }
    resolved.join("/")
}

/// Decomposes a URI into its authority and path, joining against `base`
/// first when one is supplied. Performs no trust checking.
///
/// # Examples
///
/// ```
/// use xpivet::uri::package_and_path;
///
/// let (package, path) = package_and_path("chrome://regular/content/", None);
/// assert_eq!(package, "regular");
/// assert_eq!(path, "/content/");
/// ```
#[must_use]
pub fn package_and_path(uri: &str, base: Option<&str>) -> (String, String) {
    let joined = match base {
        Some(base) => url_join(base, uri),
        None => uri.to_owned(),
    };
    let split = split_uri(&joined);
    let authority = split
        .prefix
        .find("://")
        .map(|pos| &split.prefix[pos + 3..])
        .unwrap_or_default();
    (authority.to_owned(), split.path.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::sibling(
        "chrome://regular/content/overlay.xul",
        "overlay2.xul",
        "chrome://regular/content/overlay2.xul"
    )]
    #[case::parent(
        "chrome://regular/content/first/overlay.xul",
        "../second/overlay2.xul",
        "chrome://regular/content/second/overlay2.xul"
    )]
    #[case::absolute_path(
        "chrome://regular/content/overlay.xul",
        "/skin/main.css",
        "chrome://regular/skin/main.css"
    )]
    #[case::current_dir(
        "chrome://regular/content/a/b.xul",
        "./c.xul",
        "chrome://regular/content/a/c.xul"
    )]
    fn joins_relative_references(#[case] base: &str, #[case] reference: &str, #[case] expected: &str) {
        assert_eq!(url_join(base, reference), expected);
    }

    #[test]
    fn different_scheme_wins_outright() {
        assert_eq!(
            url_join("chrome://regular/content/a.xul", "https://example.com/x"),
            "https://example.com/x"
        );
    }

    #[test]
    fn empty_reference_returns_base() {
        assert_eq!(url_join("chrome://a/b", ""), "chrome://a/b");
    }

    #[test]
    fn empty_base_returns_reference() {
        assert_eq!(url_join("", "chrome://a/b"), "chrome://a/b");
    }

    #[test]
    fn jar_base_merges_after_the_separator() {
        assert_eq!(
            url_join("jar:chrome.jar!/chrome/content/overlay.xul", "overlay2.xul"),
            "jar:chrome.jar!/chrome/content/overlay2.xul"
        );
    }

    #[rstest]
    #[case::regular("chrome://regular/content/", "regular", "/content/")]
    #[case::deep("chrome://browser/content/browser.xul", "browser", "/content/browser.xul")]
    #[case::jarred("jar:chrome.jar!/chrome/content/", "", "/chrome/content/")]
    fn decomposes_into_package_and_path(
        #[case] uri: &str,
        #[case] package: &str,
        #[case] path: &str,
    ) {
        assert_eq!(
            package_and_path(uri, None),
            (package.to_owned(), path.to_owned())
        );
    }

    #[test]
    fn decomposition_applies_the_base() {
        let (package, path) =
            package_and_path("other.xul", Some("chrome://regular/content/main.xul"));
        assert_eq!(package, "regular");
        assert_eq!(path, "/content/other.xul");
    }
}
