//! Effective-URL resolution for registered files.
//!
//! A file's locator is resolved at admission time: absolute URLs pass through
//! unchanged, relative ones get the configured `base_url` and `path` prefixes.

use url::Url;

/// Appends a trailing `/` to a non-empty URL fragment that lacks one.
pub fn ensure_trailing_slash(value: &str) -> String {
    if value.is_empty() || value.ends_with('/') {
        value.to_string()
    } else {
        format!("{}/", value)
    }
}

/// Resolves the URL handed to the transport for one file.
///
/// `base_url` and `path` are expected to be trailing-slash normalized already
/// (the loader's setters and `LoaderConfig::normalized` take care of that).
pub fn resolve(base_url: &str, path: &str, url: &str) -> String {
    // An absolute locator ignores the configured prefixes.
    if Url::parse(url).is_ok() {
        return url.to_string();
    }
    format!("{}{}{}", base_url, path, url)
}
