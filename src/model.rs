use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    pub anchor_text: String,
    pub target: usize,
}

/// One physical page of a decoded PDF. `true_index` is 0-based and contiguous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub true_index: usize,
    pub text: String,
    pub links: Vec<PageLink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub order_index: usize,
    pub section_header: String,
    pub subsection_header: String,
    pub printed_page_label: String,
}

impl TocEntry {
    /// A section's own entry, as opposed to one of its subsections.
    pub fn is_top_level(&self) -> bool {
        self.subsection_header == self.section_header
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanonicalLabel {
    Termination,
    Indemnification,
    Confidentiality,
    Unknown,
}

impl CanonicalLabel {
    pub const ALL: [CanonicalLabel; 4] = [
        CanonicalLabel::Termination,
        CanonicalLabel::Indemnification,
        CanonicalLabel::Confidentiality,
        CanonicalLabel::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalLabel::Termination => "Termination",
            CanonicalLabel::Indemnification => "Indemnification",
            CanonicalLabel::Confidentiality => "Confidentiality",
            CanonicalLabel::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for CanonicalLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a section was emitted with best-effort values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionIssue {
    UnresolvedPage,
    FallbackCandidate,
    ClampedRange,
    HeaderNotFound,
}

impl SectionIssue {
    pub fn as_str(self) -> &'static str {
        match self {
            SectionIssue::UnresolvedPage => "unresolved_page",
            SectionIssue::FallbackCandidate => "fallback_candidate",
            SectionIssue::ClampedRange => "clamped_range",
            SectionIssue::HeaderNotFound => "header_not_found",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSection {
    pub order_index: usize,
    pub section_header: String,
    pub subsection_header: String,
    pub printed_page_label: String,
    pub true_page_start: usize,
    pub true_page_end: usize,
    pub text: String,
    pub label: CanonicalLabel,
    pub issues: Vec<SectionIssue>,
}

impl ResolvedSection {
    pub fn is_low_confidence(&self) -> bool {
        !self.issues.is_empty()
    }
}

pub const SECTION_COLUMNS: [&str; 8] = [
    "Document Name",
    "Section Header",
    "Subsection Header",
    "Page Number Start",
    "True Page Number Start",
    "True Page Number End",
    "Subsection Text",
    "Subsection Label",
];

/// One CSV row per resolved section; serialized headers match `SECTION_COLUMNS`.
#[derive(Debug, Clone, Serialize)]
pub struct SectionRow<'a> {
    #[serde(rename = "Document Name")]
    pub document_name: &'a str,
    #[serde(rename = "Section Header")]
    pub section_header: &'a str,
    #[serde(rename = "Subsection Header")]
    pub subsection_header: &'a str,
    #[serde(rename = "Page Number Start")]
    pub printed_page_label: &'a str,
    #[serde(rename = "True Page Number Start")]
    pub true_page_start: usize,
    #[serde(rename = "True Page Number End")]
    pub true_page_end: usize,
    #[serde(rename = "Subsection Text")]
    pub text: &'a str,
    #[serde(rename = "Subsection Label")]
    pub label: &'a str,
}

impl<'a> SectionRow<'a> {
    pub fn new(document_name: &'a str, section: &'a ResolvedSection) -> Self {
        Self {
            document_name,
            section_header: &section.section_header,
            subsection_header: &section.subsection_header,
            printed_page_label: &section.printed_page_label,
            true_page_start: section.true_page_start,
            true_page_end: section.true_page_end,
            text: &section.text,
            label: section.label.as_str(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionWarning {
    pub order_index: usize,
    pub subsection_header: String,
    pub issue: SectionIssue,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentOutcome {
    pub document_name: String,
    pub status: String,
    pub output_path: Option<String>,
    pub page_count: usize,
    pub toc_entry_count: usize,
    pub section_count: usize,
    pub low_confidence_count: usize,
    pub failure_reason: Option<String>,
    pub warnings: Vec<SectionWarning>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractCounts {
    pub pdf_count: usize,
    pub completed_count: usize,
    pub failed_count: usize,
    pub sections_total: usize,
    pub low_confidence_total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub input_dir: String,
    pub output_dir: String,
    pub model: Option<String>,
    pub counts: ExtractCounts,
    pub documents: Vec<DocumentOutcome>,
}
