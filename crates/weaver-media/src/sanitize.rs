//! Scheme allow-listing for stored references.
//!
//! A reference whose scheme isn't allowed is swapped for an inert
//! placeholder rather than reported as an error.

use url::Url;

/// Inert reference used in place of a rejected one.
pub const NEUTRAL_REF: &str = "//:0";

/// Schemes a media link may point at.
pub const LINK_SCHEMES: &[&str] = &["http", "https"];

/// Schemes an image source may use. `data:` allows inline previews.
pub const IMAGE_SCHEMES: &[&str] = &["http", "https", "data"];

/// Check whether `reference` uses one of `schemes`.
///
/// Scheme-less references resolve against the hosting page and are allowed.
pub fn is_allowed(reference: &str, schemes: &[&str]) -> bool {
    match Url::parse(reference.trim()) {
        Ok(url) => schemes.contains(&url.scheme()),
        Err(url::ParseError::RelativeUrlWithoutBase) => true,
        Err(_) => false,
    }
}

/// Sanitize a link target.
pub fn sanitize_link(reference: &str) -> String {
    sanitize_with(reference, LINK_SCHEMES)
}

/// Sanitize an image source.
pub fn sanitize_src(reference: &str) -> String {
    sanitize_with(reference, IMAGE_SCHEMES)
}

fn sanitize_with(reference: &str, schemes: &[&str]) -> String {
    if is_allowed(reference, schemes) {
        reference.to_owned()
    } else {
        tracing::debug!(reference, "rejected media reference scheme");
        NEUTRAL_REF.to_owned()
    }
}
