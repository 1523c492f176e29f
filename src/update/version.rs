use crate::models::Version;

/// Marker that precedes the version in a release tag URL.
const TAG_MARKER: &str = "/v";

/// True when the two versions differ in any way. No normalisation is done.
pub fn is_update_available(latest: &Version, installed: &Version) -> bool {
    latest.as_str() != installed.as_str()
}

/// Extract the version from the final URL of the "latest release" redirect,
/// e.g. `.../releases/tag/v1.4.4.9` yields `1.4.4.9`.
pub fn parse_redirect_url(url: &str) -> Option<Version> {
    let (_, token) = url.rsplit_once(TAG_MARKER)?;
    Version::new(token.trim_end_matches('/'))
}

/// Extract the version from the first line of a server log.
///
/// The token is the text before the first `+`, cut at the first `|`.
pub fn parse_log_line(line: &str) -> Option<Version> {
    let line = line.trim_end_matches(['\r', '\n']);
    let head = line.split('+').next()?;
    let token = head.split('|').next()?;
    Version::new(token)
}
