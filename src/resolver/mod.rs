use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{CanonicalLabel, Page, ResolvedSection, SectionIssue, SectionWarning, TocEntry};

mod crop;
mod label;
mod link_index;
mod page_resolver;
mod ranges;
#[cfg(test)]
mod tests;

use crop::crop_section;
use link_index::LinkIndex;
use page_resolver::{PageResolution, ResolutionMethod, resolve_starts};
use ranges::{build_ranges, next_resolved};

pub use label::{DEFAULT_LABEL_THRESHOLD, classify_label};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no link candidates for '{anchor}' (printed page label '{printed_page_label}')")]
    UnresolvedPage {
        anchor: String,
        printed_page_label: String,
    },
    #[error("header '{header}' not found in pages {start}..={end}")]
    HeaderNotFound {
        header: String,
        start: usize,
        end: usize,
    },
    #[error("document has no pages")]
    EmptyDocument,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    pub top_level_starts_new_page: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            top_level_starts_new_page: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DocumentResolution {
    pub sections: Vec<ResolvedSection>,
    pub warnings: Vec<SectionWarning>,
}

/// Resolves page ranges and cropped text for every ToC entry of one document.
///
/// Labels are left as `Unknown`; classification is a separate stage. Per-entry problems are
/// recorded on the section and in `warnings`; only an empty document is an error.
pub fn resolve_document(
    pages: &[Page],
    entries: &[TocEntry],
    options: &ResolveOptions,
) -> Result<DocumentResolution, ResolveError> {
    let last_page = pages
        .len()
        .checked_sub(1)
        .ok_or(ResolveError::EmptyDocument)?;

    let index = LinkIndex::build(pages);
    if index.is_empty() {
        warn!(pages = pages.len(), "document has no hyperlinks; every entry will be unresolved");
    } else {
        debug!(anchors = index.len(), pages = pages.len(), "built link index");
    }

    let starts = resolve_starts(&index, entries);
    let ranges = build_ranges(
        entries,
        &starts,
        last_page,
        options.top_level_starts_new_page,
    );

    let mut resolution = DocumentResolution::default();

    for (position, ((entry, start), range)) in entries.iter().zip(&starts).zip(&ranges).enumerate() {
        let mut issues = Vec::<SectionIssue>::new();
        let mut record = |issue: SectionIssue, detail: String| {
            warn!(
                order_index = entry.order_index,
                subsection = %entry.subsection_header,
                issue = issue.as_str(),
                detail = %detail,
                "section resolved with best-effort values"
            );
            issues.push(issue);
            resolution.warnings.push(SectionWarning {
                order_index: entry.order_index,
                subsection_header: entry.subsection_header.clone(),
                issue,
                detail,
            });
        };

        match start.resolution {
            PageResolution::Unresolved => {
                let error = ResolveError::UnresolvedPage {
                    anchor: entry.subsection_header.clone(),
                    printed_page_label: entry.printed_page_label.clone(),
                };
                record(SectionIssue::UnresolvedPage, error.to_string());
            }
            PageResolution::Resolved {
                page,
                method: ResolutionMethod::Fallback,
            } => {
                record(
                    SectionIssue::FallbackCandidate,
                    format!(
                        "all link candidates precede the previous section; candidate {} held at {}",
                        page, start.page
                    ),
                );
            }
            PageResolution::Resolved { .. } => {}
        }

        if range.clamped {
            record(
                SectionIssue::ClampedRange,
                format!("end page clamped to start page {}", range.start),
            );
        }

        // Unresolved followers may still sit inside this range, so each of them up to the
        // next resolved entry can end the crop.
        let boundary = next_resolved(&starts, position).map_or(entries.len(), |next| next + 1);
        let next_headers = entries
            .iter()
            .take(boundary)
            .skip(position + 1)
            .map(|next| next.subsection_header.as_str())
            .collect::<Vec<&str>>();
        let text = match crop_section(
            pages,
            range.start,
            range.end,
            &entry.subsection_header,
            &next_headers,
        ) {
            Ok(text) => text,
            Err(error) => {
                record(SectionIssue::HeaderNotFound, error.to_string());
                String::new()
            }
        };

        resolution.sections.push(ResolvedSection {
            order_index: entry.order_index,
            section_header: entry.section_header.clone(),
            subsection_header: entry.subsection_header.clone(),
            printed_page_label: entry.printed_page_label.clone(),
            true_page_start: range.start,
            true_page_end: range.end,
            text,
            label: CanonicalLabel::Unknown,
            issues,
        });
    }

    Ok(resolution)
}
