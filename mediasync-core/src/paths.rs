//! Path namespace helpers.
//!
//! Source base paths and import paths are opaque URLs owned by the
//! importer adapters. The engine never interprets them beyond hierarchy
//! containment checks and composing display URLs for browsing surfaces.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Percent-encode everything but RFC 3986 unreserved characters.
const IDENTIFIER_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn with_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

/// The path-hierarchy operator: whether `path` equals `base` or is a
/// descendant of it. Empty operands never match.
#[must_use]
pub fn is_within_base(base: &str, path: &str) -> bool {
    if base.is_empty() || path.is_empty() {
        return false;
    }
    let base = with_trailing_slash(base);
    let path = with_trailing_slash(path);
    path.starts_with(&base)
}

/// Filter segment of the source browser URL namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceBrowseFilter {
    All,
    Active,
    Inactive,
}

impl SourceBrowseFilter {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SourceBrowseFilter::All => "all",
            SourceBrowseFilter::Active => "active",
            SourceBrowseFilter::Inactive => "inactive",
        }
    }
}

/// Composes the display URL of a source for the browser view:
/// `import://{all|active|inactive}/{percent-encoded identifier}/`.
#[must_use]
pub fn source_browse_url(filter: SourceBrowseFilter, identifier: &str) -> String {
    format!(
        "import://{}/{}/",
        filter.as_str(),
        utf8_percent_encode(identifier, IDENTIFIER_ENCODE)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_containment() {
        assert!(is_within_base("src://uuid-A/", "src://uuid-A/"));
        assert!(is_within_base("src://uuid-A", "src://uuid-A/movies/"));
        assert!(is_within_base("src://uuid-A/", "src://uuid-A/movies/m1"));
        assert!(!is_within_base("src://uuid-A/", "src://uuid-B/movies/"));
        // no partial-segment matches
        assert!(!is_within_base("src://uuid-A/", "src://uuid-AB/"));
        assert!(!is_within_base("", "src://uuid-A/"));
        assert!(!is_within_base("src://uuid-A/", ""));
    }

    #[test]
    fn test_browse_url_encodes_identifier() {
        let url = source_browse_url(SourceBrowseFilter::Active, "uuid A/1");
        assert_eq!(url, "import://active/uuid%20A%2F1/");
    }

    #[test]
    fn test_browse_url_filters() {
        assert!(source_browse_url(SourceBrowseFilter::All, "x").starts_with("import://all/"));
        assert!(
            source_browse_url(SourceBrowseFilter::Inactive, "x").starts_with("import://inactive/")
        );
    }
}
