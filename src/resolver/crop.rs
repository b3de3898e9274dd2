use std::ops::Range;

use regex::RegexBuilder;

use crate::model::Page;

use super::ResolveError;

pub const TABLE_OF_CONTENTS_BANNER: &str = "TABLE OF CONTENTS";

pub fn page_range_text(pages: &[Page], start: usize, end: usize) -> String {
    pages
        .iter()
        .skip(start)
        .take((end + 1).saturating_sub(start))
        .map(|page| page.text.as_str())
        .collect()
}

/// Byte range of the first occurrence of `header`.
///
/// An exact match wins; otherwise the header is matched case-insensitively with any run of
/// whitespace between its words, which covers titles wrapped across lines.
pub fn find_header(haystack: &str, header: &str) -> Option<Range<usize>> {
    let header = header.trim();
    if header.is_empty() {
        return None;
    }

    if let Some(position) = haystack.find(header) {
        return Some(position..position + header.len());
    }

    let pattern = header
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<String>>()
        .join(r"\s+");
    let regex = RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .ok()?;

    regex.find(haystack).map(|found| found.range())
}

/// Text from the header's first occurrence up to the earliest exact occurrence of any of
/// `next_headers` after it.
///
/// Only the section's own header gets the relaxed match; the boundary headers must appear
/// verbatim, so body prose that happens to repeat a heading's words does not end the crop.
pub fn crop_text(text: &str, header: &str, next_headers: &[&str]) -> Option<String> {
    let header_match = find_header(text, header)?;
    let tail = &text[header_match.end..];

    let end = next_headers
        .iter()
        .map(|next| next.trim())
        .filter(|next| !next.is_empty())
        .filter_map(|next| tail.find(next))
        .min()
        .map(|offset| header_match.end + offset)
        .unwrap_or(text.len());

    Some(text[header_match.start..end].replace(TABLE_OF_CONTENTS_BANNER, ""))
}

pub fn crop_section(
    pages: &[Page],
    start: usize,
    end: usize,
    header: &str,
    next_headers: &[&str],
) -> Result<String, ResolveError> {
    let text = page_range_text(pages, start, end);
    crop_text(&text, header, next_headers).ok_or_else(|| ResolveError::HeaderNotFound {
        header: header.to_string(),
        start,
        end,
    })
}
