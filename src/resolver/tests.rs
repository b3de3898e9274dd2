use std::collections::BTreeSet;

use super::crop::{crop_text, find_header, page_range_text};
use super::page_resolver::{StartPage, resolve_entry, select_candidate};
use super::ranges::PageRange;
use super::*;
use crate::model::PageLink;

fn entry(order_index: usize, section: &str, subsection: &str, label: &str) -> TocEntry {
    TocEntry {
        order_index,
        section_header: section.to_string(),
        subsection_header: subsection.to_string(),
        printed_page_label: label.to_string(),
    }
}

fn page(true_index: usize, text: &str, links: &[(&str, usize)]) -> Page {
    Page {
        true_index,
        text: text.to_string(),
        links: links
            .iter()
            .map(|(anchor_text, target)| PageLink {
                anchor_text: anchor_text.to_string(),
                target: *target,
            })
            .collect(),
    }
}

fn candidates(pages: &[usize]) -> BTreeSet<usize> {
    pages.iter().copied().collect()
}

fn resolved(pages: &[usize]) -> Vec<StartPage> {
    pages
        .iter()
        .map(|&page| StartPage {
            page,
            resolution: PageResolution::Resolved {
                page,
                method: ResolutionMethod::Monotonic,
            },
        })
        .collect()
}

/// A 12-page proxy: ToC on page 1, SUMMARY on 3-4, THE MERGER on 6-8, APPENDIX on 10-11.
fn sample_document() -> (Vec<Page>, Vec<TocEntry>) {
    let toc_links = [
        ("SUMMARY", 3),
        ("The Parties", 3),
        ("Appraisal Rights", 4),
        ("THE MERGER", 6),
        ("Background of the Merger", 7),
        ("Termination of the Merger Agreement", 8),
        ("APPENDIX", 10),
    ];

    let pages = vec![
        page(0, "Cover page\n", &[]),
        page(1, "TABLE OF CONTENTS\nSUMMARY 1\nThe Parties 1\n", &toc_links),
        page(2, "Letter to stockholders\n", &[]),
        page(
            3,
            "SUMMARY\nThis summary highlights.\nThe Parties\nAcme Corp and Widget Inc.\n",
            &[],
        ),
        page(4, "Appraisal Rights\nHolders may demand appraisal.\n", &[("Appraisal Rights", 9)]),
        page(5, "Intentionally blank\n", &[]),
        page(6, "TABLE OF CONTENTS\nTHE MERGER\nGeneral description.\n", &[]),
        page(7, "Background of the Merger\nNegotiations began.\n", &[]),
        page(
            8,
            "Termination of the Merger Agreement\nEither party may terminate.\n",
            &[],
        ),
        page(9, "Appraisal Rights\nStatutory text.\n", &[]),
        page(10, "APPENDIX\nAgreement and Plan of Merger\n", &[]),
        page(11, "Signature page\n", &[]),
    ];

    let entries = vec![
        entry(0, "SUMMARY", "SUMMARY", "1"),
        entry(1, "SUMMARY", "The Parties", "1"),
        entry(2, "SUMMARY", "Appraisal Rights", "2"),
        entry(3, "THE MERGER", "THE MERGER", "4"),
        entry(4, "THE MERGER", "Background of the Merger", "5"),
        entry(5, "THE MERGER", "Termination of the Merger Agreement", "6"),
        entry(6, "APPENDIX", "APPENDIX", "A-1"),
    ];

    (pages, entries)
}

#[test]
fn link_index_sorts_and_deduplicates_candidates() {
    let pages = vec![
        page(0, "", &[("Appraisal Rights", 21), (" Appraisal Rights ", 3)]),
        page(1, "", &[("Appraisal\nRights", 21), ("", 5)]),
    ];

    let index = LinkIndex::build(&pages);
    assert_eq!(index.len(), 1);
    let found = index.candidates("Appraisal Rights").expect("candidates");
    assert_eq!(found.iter().copied().collect::<Vec<usize>>(), vec![3, 21]);
    assert!(index.candidates("").is_none());
}

#[test]
fn empty_link_set_yields_empty_index() {
    let index = LinkIndex::build(&[page(0, "text", &[])]);
    assert!(index.is_empty());
    assert!(index.candidates("SUMMARY").is_none());
}

#[test]
fn first_entry_takes_its_only_candidate() {
    let resolution = select_candidate(&candidates(&[7]), None);
    assert_eq!(
        resolution,
        PageResolution::Resolved {
            page: 7,
            method: ResolutionMethod::Monotonic
        }
    );
}

#[test]
fn reused_anchor_picks_smallest_candidate_after_previous() {
    let resolution = select_candidate(&candidates(&[3, 21]), Some(15));
    assert_eq!(
        resolution,
        PageResolution::Resolved {
            page: 21,
            method: ResolutionMethod::Monotonic
        }
    );
}

#[test]
fn candidate_equal_to_previous_is_accepted() {
    let resolution = select_candidate(&candidates(&[4, 9]), Some(9));
    assert_eq!(
        resolution,
        PageResolution::Resolved {
            page: 9,
            method: ResolutionMethod::Monotonic
        }
    );
}

#[test]
fn stale_anchor_falls_back_to_largest_candidate() {
    let resolution = select_candidate(&candidates(&[2, 5]), Some(12));
    assert_eq!(
        resolution,
        PageResolution::Resolved {
            page: 5,
            method: ResolutionMethod::Fallback
        }
    );
}

#[test]
fn entry_without_links_is_unresolved() {
    let index = LinkIndex::build(&[page(0, "", &[("SUMMARY", 3)])]);
    let appendix = entry(0, "ANNEX A", "ANNEX A", "A-1");
    assert_eq!(resolve_entry(&index, &appendix, None), PageResolution::Unresolved);
}

#[test]
fn printed_page_label_is_used_when_header_is_not_linked() {
    let index = LinkIndex::build(&[page(1, "", &[("A-8", 40)])]);
    let appendix = entry(0, "ANNEX B", "ANNEX B", "A-8");
    assert_eq!(
        resolve_entry(&index, &appendix, Some(12)),
        PageResolution::Resolved {
            page: 40,
            method: ResolutionMethod::Monotonic
        }
    );
}

#[test]
fn resolved_starts_are_non_decreasing() {
    let pages = vec![page(
        0,
        "",
        &[
            ("SUMMARY", 7),
            ("Appraisal Rights", 3),
            ("Appraisal Rights", 21),
            ("Stale Reference", 2),
            ("THE MERGER", 25),
        ],
    )];
    let entries = vec![
        entry(0, "SUMMARY", "SUMMARY", "1"),
        entry(1, "SUMMARY", "Appraisal Rights", "3"),
        entry(2, "SUMMARY", "Stale Reference", "4"),
        entry(3, "SUMMARY", "Unlinked Subsection", "5"),
        entry(4, "THE MERGER", "THE MERGER", "9"),
    ];

    let index = LinkIndex::build(&pages);
    let starts = resolve_starts(&index, &entries);
    let pages_only = starts.iter().map(|start| start.page).collect::<Vec<usize>>();

    assert_eq!(pages_only, vec![7, 21, 21, 21, 25]);
    assert!(pages_only.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(
        starts[2].resolution,
        PageResolution::Resolved {
            page: 2,
            method: ResolutionMethod::Fallback
        }
    );
    assert_eq!(starts[3].resolution, PageResolution::Unresolved);
}

#[test]
fn unresolved_first_entry_uses_page_zero_placeholder() {
    let index = LinkIndex::build(&[page(0, "", &[("THE MERGER", 5)])]);
    let entries = vec![
        entry(0, "SUMMARY", "SUMMARY", "1"),
        entry(1, "THE MERGER", "THE MERGER", "4"),
    ];

    let starts = resolve_starts(&index, &entries);
    assert_eq!(starts[0].page, 0);
    assert_eq!(starts[0].resolution, PageResolution::Unresolved);
    assert_eq!(starts[1].page, 5);
}

#[test]
fn range_ends_follow_section_boundary_rules() {
    let entries = vec![
        entry(0, "SUMMARY", "SUMMARY", "1"),
        entry(1, "SUMMARY", "The Merger", "2"),
        entry(2, "QUESTIONS AND ANSWERS", "QUESTIONS AND ANSWERS", "3"),
    ];

    let ranges = build_ranges(&entries, &resolved(&[7, 7, 9]), 20, true);
    let ends = ranges.iter().map(|range| range.end).collect::<Vec<usize>>();
    assert_eq!(ends, vec![7, 8, 20]);
    assert!(ranges.iter().all(|range| !range.clamped));

    let shared_page = build_ranges(&entries, &resolved(&[7, 7, 9]), 20, false);
    let ends = shared_page
        .iter()
        .map(|range| range.end)
        .collect::<Vec<usize>>();
    assert_eq!(ends, vec![7, 9, 20]);
}

#[test]
fn last_entry_ends_on_final_page() {
    let entries = vec![
        entry(0, "SUMMARY", "SUMMARY", "1"),
        entry(1, "ANNEX A", "ANNEX A", "A-1"),
    ];

    let ranges = build_ranges(&entries, &resolved(&[2, 30]), 41, true);
    assert_eq!(ranges[1], PageRange { start: 30, end: 41, clamped: false });
}

#[test]
fn top_level_entry_on_same_page_clamps_previous_range() {
    let entries = vec![
        entry(0, "SUMMARY", "SUMMARY", "1"),
        entry(1, "RISK FACTORS", "RISK FACTORS", "1"),
    ];

    let ranges = build_ranges(&entries, &resolved(&[4, 4]), 10, true);
    assert_eq!(ranges[0], PageRange { start: 4, end: 4, clamped: true });

    let from_page_zero = build_ranges(&entries, &resolved(&[0, 0]), 10, true);
    assert!(from_page_zero[0].clamped);
    assert_eq!(from_page_zero[0].end, 0);
}

#[test]
fn unresolved_entries_do_not_bound_their_neighbours() {
    let entries = vec![
        entry(0, "THE MERGER", "Alpha", "2"),
        entry(1, "THE MERGER", "Beta", "3"),
        entry(2, "THE MERGER", "Gamma", "5"),
        entry(3, "ANNEX A", "ANNEX A", "A-1"),
    ];
    let mut starts = resolved(&[1, 1, 4, 9]);
    starts[1].resolution = PageResolution::Unresolved;

    let ranges = build_ranges(&entries, &starts, 12, true);
    let spans = ranges
        .iter()
        .map(|range| (range.start, range.end))
        .collect::<Vec<(usize, usize)>>();
    assert_eq!(spans, vec![(1, 4), (1, 4), (4, 8), (9, 12)]);
    assert!(ranges.iter().all(|range| !range.clamped));
}

#[test]
fn page_range_text_concatenates_in_order() {
    let pages = vec![page(0, "a", &[]), page(1, "b", &[]), page(2, "c", &[])];
    assert_eq!(page_range_text(&pages, 1, 2), "bc");
    assert_eq!(page_range_text(&pages, 2, 9), "c");
    assert_eq!(page_range_text(&pages, 5, 6), "");
}

#[test]
fn find_header_prefers_exact_then_relaxed_match() {
    let text = "intro The MERGER\nAgreement body The Merger Agreement";
    assert_eq!(find_header(text, "The Merger Agreement"), Some(32..52));
    assert_eq!(find_header("x the merger\n agreement", "The Merger Agreement"), Some(2..23));
    assert_eq!(find_header("anything", "   "), None);
    assert_eq!(find_header("anything", "Missing (Header)"), None);
}

#[test]
fn crop_is_bounded_by_unique_markers() {
    let text = "preamble <<A>> alpha body <<B>> beta body <<C>> gamma body";

    assert_eq!(
        crop_text(text, "<<A>>", &["<<B>>"]).as_deref(),
        Some("<<A>> alpha body ")
    );
    assert_eq!(
        crop_text(text, "<<B>>", &["<<C>>"]).as_deref(),
        Some("<<B>> beta body ")
    );
    assert_eq!(
        crop_text(text, "<<C>>", &[]).as_deref(),
        Some("<<C>> gamma body")
    );
}

#[test]
fn next_header_is_only_searched_after_the_current_header() {
    let text = "Termination mentioned early. Fees\nbody text\nTermination\nfinal";
    assert_eq!(
        crop_text(text, "Fees", &["Termination"]).as_deref(),
        Some("Fees\nbody text\n")
    );
}

#[test]
fn next_header_must_match_exactly() {
    let text = "SUMMARY\nThe parties agreed to the merger on these terms.\nMore summary.\n";
    assert_eq!(
        crop_text(text, "SUMMARY", &["THE MERGER"]).as_deref(),
        Some(text)
    );
}

#[test]
fn earliest_of_several_next_headers_ends_the_crop() {
    let text = "Alpha\nalpha body\nBeta\nbeta body\nGamma\n";
    assert_eq!(
        crop_text(text, "Alpha", &["Gamma", "Beta"]).as_deref(),
        Some("Alpha\nalpha body\n")
    );
    assert_eq!(
        crop_text(text, "Alpha", &["Missing", "Gamma"]).as_deref(),
        Some("Alpha\nalpha body\nBeta\nbeta body\n")
    );
}

#[test]
fn crop_runs_to_end_when_next_header_is_absent() {
    let text = "Fees\nall the fees";
    assert_eq!(
        crop_text(text, "Fees", &["Missing"]).as_deref(),
        Some("Fees\nall the fees")
    );
}

#[test]
fn crop_strips_table_of_contents_banners() {
    let text = "Fees\nTABLE OF CONTENTS\nmore fees\nTaxes";
    assert_eq!(
        crop_text(text, "Fees", &["Taxes"]).as_deref(),
        Some("Fees\n\nmore fees\n")
    );
}

#[test]
fn missing_header_is_reported() {
    let pages = vec![page(0, "no headers here", &[])];
    let error = crop_section(&pages, 0, 0, "Fees", &[]).expect_err("header is absent");
    assert_eq!(
        error,
        ResolveError::HeaderNotFound {
            header: "Fees".to_string(),
            start: 0,
            end: 0
        }
    );
}

#[test]
fn classify_label_matches_close_outputs() {
    assert_eq!(classify_label("Terminate", DEFAULT_LABEL_THRESHOLD), CanonicalLabel::Termination);
    assert_eq!(classify_label(" TERMINATION\n", DEFAULT_LABEL_THRESHOLD), CanonicalLabel::Termination);
    assert_eq!(
        classify_label("Confidential", DEFAULT_LABEL_THRESHOLD),
        CanonicalLabel::Confidentiality
    );
    assert_eq!(
        classify_label("Indemnification.", DEFAULT_LABEL_THRESHOLD),
        CanonicalLabel::Indemnification
    );
}

#[test]
fn classify_label_defaults_to_unknown() {
    assert_eq!(classify_label("banana", DEFAULT_LABEL_THRESHOLD), CanonicalLabel::Unknown);
    assert_eq!(classify_label("Other", DEFAULT_LABEL_THRESHOLD), CanonicalLabel::Unknown);
    assert_eq!(classify_label("", DEFAULT_LABEL_THRESHOLD), CanonicalLabel::Unknown);
    assert_eq!(classify_label("Terminate", 0.95), CanonicalLabel::Unknown);
}

#[test]
fn resolve_document_builds_ranges_and_text() {
    let (pages, entries) = sample_document();
    let resolution =
        resolve_document(&pages, &entries, &ResolveOptions::default()).expect("resolution");

    let ranges = resolution
        .sections
        .iter()
        .map(|section| (section.true_page_start, section.true_page_end))
        .collect::<Vec<(usize, usize)>>();
    assert_eq!(
        ranges,
        vec![(3, 3), (3, 4), (4, 5), (6, 7), (7, 8), (8, 9), (10, 11)]
    );

    let parties = &resolution.sections[1];
    assert_eq!(parties.text, "The Parties\nAcme Corp and Widget Inc.\n");
    assert!(parties.issues.is_empty());

    let merger = &resolution.sections[3];
    assert_eq!(merger.text, "THE MERGER\nGeneral description.\n");

    let termination = &resolution.sections[5];
    assert_eq!(
        termination.text,
        "Termination of the Merger Agreement\nEither party may terminate.\nAppraisal Rights\nStatutory text.\n"
    );

    assert!(resolution.warnings.is_empty());
    assert!(resolution.sections.iter().all(|section| section.label == CanonicalLabel::Unknown));
}

#[test]
fn resolve_document_is_idempotent() {
    let (pages, entries) = sample_document();
    let options = ResolveOptions::default();

    let first = resolve_document(&pages, &entries, &options).expect("first run");
    let second = resolve_document(&pages, &entries, &options).expect("second run");
    assert_eq!(first.sections, second.sections);
}

#[test]
fn resolve_document_records_recoverable_problems() {
    let (pages, mut entries) = sample_document();
    entries.insert(3, entry(3, "SUMMARY", "Unlinked Heading", "3"));
    for (order_index, entry) in entries.iter_mut().enumerate() {
        entry.order_index = order_index;
    }

    let resolution =
        resolve_document(&pages, &entries, &ResolveOptions::default()).expect("resolution");

    let unlinked = &resolution.sections[3];
    assert_eq!(unlinked.true_page_start, 4);
    assert!(unlinked.issues.contains(&SectionIssue::UnresolvedPage));
    assert!(unlinked.issues.contains(&SectionIssue::HeaderNotFound));
    assert!(unlinked.text.is_empty());
    assert!(unlinked.is_low_confidence());

    let issues = resolution
        .warnings
        .iter()
        .map(|warning| warning.issue)
        .collect::<Vec<SectionIssue>>();
    assert_eq!(
        issues,
        vec![SectionIssue::UnresolvedPage, SectionIssue::HeaderNotFound]
    );

    assert!(
        resolution
            .sections
            .windows(2)
            .all(|pair| pair[0].true_page_start <= pair[1].true_page_start)
    );
    assert!(
        resolution
            .sections
            .iter()
            .all(|section| section.true_page_end >= section.true_page_start)
    );
}

#[test]
fn lowercase_heading_words_do_not_truncate_the_previous_section() {
    let pages = vec![
        page(
            0,
            "SUMMARY\nThe parties agreed to the merger on these terms.\nMore summary.\n",
            &[("SUMMARY", 0), ("THE MERGER", 1)],
        ),
        page(1, "THE MERGER\nBody.\n", &[]),
    ];
    let entries = vec![
        entry(0, "SUMMARY", "SUMMARY", "1"),
        entry(1, "THE MERGER", "THE MERGER", "2"),
    ];

    let resolution =
        resolve_document(&pages, &entries, &ResolveOptions::default()).expect("resolution");
    let summary = &resolution.sections[0];
    assert_eq!((summary.true_page_start, summary.true_page_end), (0, 0));
    assert_eq!(summary.text, pages[0].text);
    assert!(summary.issues.is_empty());
}

#[test]
fn resolved_section_keeps_pages_past_an_unresolved_follower() {
    let pages = vec![
        page(0, "TABLE OF CONTENTS\n", &[("Alpha", 1), ("Gamma", 4)]),
        page(1, "Alpha\nalpha p1\n", &[]),
        page(2, "alpha p2\n", &[]),
        page(3, "alpha p3\n", &[]),
        page(4, "Gamma\ngamma body\n", &[]),
    ];
    let entries = vec![
        entry(0, "PART ONE", "Alpha", "1"),
        entry(1, "PART ONE", "Beta", "2"),
        entry(2, "PART ONE", "Gamma", "4"),
    ];

    let resolution =
        resolve_document(&pages, &entries, &ResolveOptions::default()).expect("resolution");

    let alpha = &resolution.sections[0];
    assert_eq!((alpha.true_page_start, alpha.true_page_end), (1, 4));
    assert_eq!(alpha.text, "Alpha\nalpha p1\nalpha p2\nalpha p3\n");
    assert!(alpha.issues.is_empty());

    let beta = &resolution.sections[1];
    assert_eq!((beta.true_page_start, beta.true_page_end), (1, 4));
    assert_eq!(
        beta.issues,
        vec![SectionIssue::UnresolvedPage, SectionIssue::HeaderNotFound]
    );

    let gamma = &resolution.sections[2];
    assert_eq!(gamma.text, "Gamma\ngamma body\n");
}

#[test]
fn unlinked_follower_found_in_text_still_ends_the_crop() {
    let pages = vec![
        page(0, "TABLE OF CONTENTS\n", &[("Alpha", 1), ("Gamma", 3)]),
        page(1, "Alpha\nalpha body\n", &[]),
        page(2, "Beta\nbeta body\n", &[]),
        page(3, "Gamma\n", &[]),
    ];
    let entries = vec![
        entry(0, "PART ONE", "Alpha", "1"),
        entry(1, "PART ONE", "Beta", "2"),
        entry(2, "PART ONE", "Gamma", "3"),
    ];

    let resolution =
        resolve_document(&pages, &entries, &ResolveOptions::default()).expect("resolution");
    assert_eq!(resolution.sections[0].text, "Alpha\nalpha body\n");
    assert_eq!(resolution.sections[1].text, "Beta\nbeta body\n");
    assert_eq!(
        resolution.sections[1].issues,
        vec![SectionIssue::UnresolvedPage]
    );
}

#[test]
fn resolve_document_rejects_empty_documents() {
    let entries = vec![entry(0, "SUMMARY", "SUMMARY", "1")];
    let error = resolve_document(&[], &entries, &ResolveOptions::default())
        .expect_err("no pages");
    assert_eq!(error, ResolveError::EmptyDocument);
}
