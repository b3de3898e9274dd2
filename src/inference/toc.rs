use serde_json::Value;
use thiserror::Error;

use crate::model::TocEntry;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedTocError {
    #[error("ToC mapping is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("ToC mapping must be a JSON object of section objects")]
    NotAnObject,
    #[error("section '{0}' does not map to an object of subsections")]
    SectionNotObject(String),
    #[error("subsection '{subsection}' of section '{section}' has no usable page label")]
    InvalidPageLabel { section: String, subsection: String },
    #[error("ToC mapping contains a blank section or subsection header")]
    BlankHeader,
    #[error("ToC mapping has no entries")]
    Empty,
}

/// Flattens `{section: {subsection: page_label}}` into ordered ToC entries.
///
/// JSON object order is document order. A section's own entry is moved in front of its
/// subsections when the mapping lists it elsewhere.
pub fn parse_toc_mapping(raw: &str) -> Result<Vec<TocEntry>, MalformedTocError> {
    let value: Value = serde_json::from_str(strip_code_fence(raw))
        .map_err(|error| MalformedTocError::InvalidJson(error.to_string()))?;
    let sections = value.as_object().ok_or(MalformedTocError::NotAnObject)?;

    let mut entries = Vec::<TocEntry>::new();

    for (section, subsections) in sections {
        let section_header = section.trim();
        if section_header.is_empty() {
            return Err(MalformedTocError::BlankHeader);
        }

        let subsections = subsections
            .as_object()
            .ok_or_else(|| MalformedTocError::SectionNotObject(section_header.to_string()))?;

        let mut section_entries = Vec::<TocEntry>::with_capacity(subsections.len());
        for (subsection, page_label) in subsections {
            let subsection_header = subsection.trim();
            if subsection_header.is_empty() {
                return Err(MalformedTocError::BlankHeader);
            }

            let printed_page_label = page_label_text(page_label).ok_or_else(|| {
                MalformedTocError::InvalidPageLabel {
                    section: section_header.to_string(),
                    subsection: subsection_header.to_string(),
                }
            })?;

            let entry = TocEntry {
                order_index: 0,
                section_header: section_header.to_string(),
                subsection_header: subsection_header.to_string(),
                printed_page_label,
            };
            if entry.is_top_level() {
                section_entries.insert(0, entry);
            } else {
                section_entries.push(entry);
            }
        }

        entries.extend(section_entries);
    }

    if entries.is_empty() {
        return Err(MalformedTocError::Empty);
    }

    for (order_index, entry) in entries.iter_mut().enumerate() {
        entry.order_index = order_index;
    }

    Ok(entries)
}

fn page_label_text(value: &Value) -> Option<String> {
    let label = match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };

    if label.is_empty() { None } else { Some(label) }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
