// Place identifier derivation from listing URLs.

use std::fmt;

use serde::Serialize;
use tracing::warn;

/// Identifier used when a URL carries no place segment.
pub const FALLBACK_PLACE: &str = "reviews";

/// Postgres truncates identifiers past 63 bytes; cut here so the table
/// name and the snapshot filename stay identical.
const MAX_IDENT_BYTES: usize = 63;

/// Normalized place token: lowercase, `[alnum_]` only. Used both as the
/// snapshot file stem and as the table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PlaceId(String);

impl PlaceId {
    /// Derive from a listing URL: the path segment after `place/`,
    /// percent-decoded, with separators folded to `_`.
    /// "https://www.google.com/maps/place/MERCADO+BACELAR/@-25.49,..." → "mercado_bacelar"
    pub fn from_url(url: &str) -> Self {
        match extract_place_segment(url).and_then(|raw| normalize(&raw)) {
            Some(id) => Self(id),
            None => {
                warn!(url, fallback = FALLBACK_PLACE, "No place name in URL");
                Self(FALLBACK_PLACE.to_string())
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn extract_place_segment(url: &str) -> Option<String> {
    let idx = url.find("place/")?;
    let rest = &url[idx + "place/".len()..];
    let segment = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    if segment.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    Some(decoded)
}

fn normalize(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars().flat_map(char::to_lowercase) {
        let c = if c.is_alphanumeric() { c } else { '_' };
        if out.len() + c.len_utf8() > MAX_IDENT_BYTES {
            break;
        }
        out.push(c);
    }
    if out.chars().all(|c| c == '_') {
        return None;
    }
    Some(out)
}
