use std::collections::BTreeSet;

use crate::model::TocEntry;

use super::link_index::LinkIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMethod {
    /// Smallest candidate at or after the previous section's start.
    Monotonic,
    /// Every candidate precedes the previous start; the largest one was taken.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageResolution {
    Resolved {
        page: usize,
        method: ResolutionMethod,
    },
    Unresolved,
}

/// Start page assigned to one ToC entry after the monotonic fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartPage {
    pub page: usize,
    pub resolution: PageResolution,
}

pub fn select_candidate(candidates: &BTreeSet<usize>, previous: Option<usize>) -> PageResolution {
    let lower_bound = previous.unwrap_or(0);

    if let Some(page) = candidates.range(lower_bound..).next() {
        return PageResolution::Resolved {
            page: *page,
            method: ResolutionMethod::Monotonic,
        };
    }

    match candidates.iter().next_back() {
        Some(page) => PageResolution::Resolved {
            page: *page,
            method: ResolutionMethod::Fallback,
        },
        None => PageResolution::Unresolved,
    }
}

/// Looks the entry up by its header first, then by its printed page label, since ToC
/// pages link either the title or the page number.
pub fn resolve_entry(index: &LinkIndex, entry: &TocEntry, previous: Option<usize>) -> PageResolution {
    let candidates = index
        .candidates(&entry.subsection_header)
        .or_else(|| index.candidates(&entry.printed_page_label));

    match candidates {
        Some(candidates) => select_candidate(candidates, previous),
        None => PageResolution::Unresolved,
    }
}

/// Resolves every entry in order. Each step only sees the previous resolved start, so
/// the result is non-decreasing: fallbacks are held at the previous start and unresolved
/// entries borrow it without advancing it.
pub fn resolve_starts(index: &LinkIndex, entries: &[TocEntry]) -> Vec<StartPage> {
    let (starts, _) = entries.iter().fold(
        (Vec::with_capacity(entries.len()), None::<usize>),
        |(mut starts, previous), entry| {
            let resolution = resolve_entry(index, entry, previous);
            let (page, next_previous) = match resolution {
                PageResolution::Resolved { page, .. } => {
                    let page = previous.map_or(page, |previous| page.max(previous));
                    (page, Some(page))
                }
                PageResolution::Unresolved => (previous.unwrap_or(0), previous),
            };

            starts.push(StartPage { page, resolution });
            (starts, next_previous)
        },
    );

    starts
}
