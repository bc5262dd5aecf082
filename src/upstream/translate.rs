//! Helpers for turning upstream wire fields into canonical package fields.
//!
//! Feeds are inconsistent about these fields, so every helper here is total:
//! bad input degrades to an empty or absent value.

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use url::Url;

const AUTHOR_SEPARATORS: &[char] = &[',', ';', '\t', '\n', '\r'];
const TAG_SEPARATOR: char = ' ';

/// Year feeds use as the published date of unlisted packages.
const UNLISTED_YEAR: i32 = 1900;

/// Split a delimited author string into names.
pub fn parse_authors(authors: Option<&str>) -> Vec<String> {
    authors
        .unwrap_or_default()
        .split(AUTHOR_SEPARATORS)
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect()
}

/// Flatten tag strings, each of which may hold several space-separated tags.
pub fn parse_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .flat_map(|t| {
            t.as_ref()
                .split(TAG_SEPARATOR)
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Absolute URL, or `None` for anything that does not parse.
pub fn parse_url(url: Option<&str>) -> Option<Url> {
    Url::parse(url?.trim()).ok()
}

/// Parse RFC 3339 timestamps, and zone-less OData timestamps as UTC.
pub fn parse_published(published: Option<&str>) -> DateTime<Utc> {
    let Some(text) = published.map(str::trim).filter(|s| !s.is_empty()) else {
        return DateTime::<Utc>::UNIX_EPOCH;
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return dt.with_timezone(&Utc);
    }

    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Explicit flag if the feed sent one, otherwise infer from the published date.
pub fn is_listed(listed: Option<bool>, published: &DateTime<Utc>) -> bool {
    listed.unwrap_or(published.year() != UNLISTED_YEAR)
}

/// Empty or whitespace-only strings become `None`.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
