use crate::model::TocEntry;

use super::page_resolver::{PageResolution, StartPage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
    pub clamped: bool,
}

/// Position of the first entry after `index` whose start page was actually resolved.
pub fn next_resolved(starts: &[StartPage], index: usize) -> Option<usize> {
    starts
        .iter()
        .enumerate()
        .skip(index + 1)
        .find(|(_, start)| start.resolution != PageResolution::Unresolved)
        .map(|(position, _)| position)
}

/// Derives inclusive page ranges from ordered start pages.
///
/// `starts[i]` belongs to `entries[i]`. Each range ends relative to the next entry with a
/// resolved start; unresolved entries only carry placeholder starts and never bound a
/// neighbour. A subsection followed by another subsection shares its last page with it; one
/// followed by a top-level entry ends on the page before, unless `top_level_starts_new_page`
/// is off.
pub fn build_ranges(
    entries: &[TocEntry],
    starts: &[StartPage],
    last_page: usize,
    top_level_starts_new_page: bool,
) -> Vec<PageRange> {
    entries
        .iter()
        .zip(starts)
        .enumerate()
        .map(|(index, (_, current))| {
            let start = current.page;
            let next = next_resolved(starts, index)
                .and_then(|position| entries.get(position).zip(starts.get(position)));

            let raw_end = match next {
                None => Some(last_page),
                Some((next_entry, next_start))
                    if top_level_starts_new_page && next_entry.is_top_level() =>
                {
                    next_start.page.checked_sub(1)
                }
                Some((_, next_start)) => Some(next_start.page),
            };

            match raw_end {
                Some(end) if end >= start => PageRange {
                    start,
                    end: end.min(last_page).max(start),
                    clamped: false,
                },
                _ => PageRange {
                    start,
                    end: start,
                    clamped: true,
                },
            }
        })
        .collect()
}
