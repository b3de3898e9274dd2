use thiserror::Error;
use tracing::{debug, info, warn};

use crate::inference::{
    InferenceError, LabelInference, MalformedTocError, RetryPolicy, TocInference,
    parse_toc_mapping,
};
use crate::model::{CanonicalLabel, Page, ResolvedSection, SectionWarning};
use crate::pdf::link_dense_text;
use crate::resolver::{
    DEFAULT_LABEL_THRESHOLD, ResolveError, ResolveOptions, classify_label, resolve_document,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineOptions {
    pub links_per_page_threshold: usize,
    pub label_threshold: f64,
    pub resolve: ResolveOptions,
    pub retry: RetryPolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            links_per_page_threshold: 5,
            label_threshold: DEFAULT_LABEL_THRESHOLD,
            resolve: ResolveOptions::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Failures that end processing of one document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("ToC inference failed: {0}")]
    TocInference(#[source] InferenceError),
    #[error("malformed ToC mapping: {0}")]
    MalformedToc(#[from] MalformedTocError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("label inference failed for '{subsection}': {source}")]
    LabelInference {
        subsection: String,
        #[source]
        source: InferenceError,
    },
}

#[derive(Debug, Clone, Default)]
pub struct DocumentReport {
    pub toc_entry_count: usize,
    pub sections: Vec<ResolvedSection>,
    pub warnings: Vec<SectionWarning>,
}

impl DocumentReport {
    pub fn low_confidence_count(&self) -> usize {
        self.sections
            .iter()
            .filter(|section| section.is_low_confidence())
            .count()
    }
}

/// Runs ToC inference, resolution and (optionally) labeling for one decoded document.
pub fn process_pages(
    pages: &[Page],
    toc: &dyn TocInference,
    labels: Option<&dyn LabelInference>,
    options: &PipelineOptions,
) -> Result<DocumentReport, DocumentError> {
    if pages.is_empty() {
        return Err(ResolveError::EmptyDocument.into());
    }

    let mut toc_text = link_dense_text(pages, options.links_per_page_threshold);
    if toc_text.trim().is_empty() {
        warn!(
            threshold = options.links_per_page_threshold,
            "no page exceeds the link threshold; sending the whole document to ToC inference"
        );
        toc_text = pages.iter().map(|page| page.text.as_str()).collect();
    }

    let raw_toc = options
        .retry
        .run("toc_inference", || toc.infer_toc(&toc_text))
        .map_err(DocumentError::TocInference)?;
    let entries = parse_toc_mapping(&raw_toc)?;
    info!(entries = entries.len(), "parsed ToC mapping");

    let resolution = resolve_document(pages, &entries, &options.resolve)?;
    let mut report = DocumentReport {
        toc_entry_count: entries.len(),
        sections: resolution.sections,
        warnings: resolution.warnings,
    };

    if let Some(labels) = labels {
        label_sections(&mut report.sections, labels, options)?;
    }

    Ok(report)
}

pub fn label_sections(
    sections: &mut [ResolvedSection],
    labels: &dyn LabelInference,
    options: &PipelineOptions,
) -> Result<(), DocumentError> {
    for section in sections.iter_mut() {
        if section.text.trim().is_empty() {
            section.label = CanonicalLabel::Unknown;
            continue;
        }

        let raw = options
            .retry
            .run("label_inference", || labels.infer_label(&section.text))
            .map_err(|source| DocumentError::LabelInference {
                subsection: section.subsection_header.clone(),
                source,
            })?;

        section.label = classify_label(&raw, options.label_threshold);
        debug!(
            subsection = %section.subsection_header,
            raw = %raw.trim(),
            label = %section.label,
            "classified section"
        );
    }

    Ok(())
}
