use thiserror::Error;

mod openai;
mod retry;
mod toc;

pub use openai::{OpenAiClient, OpenAiConfig};
pub use retry::{RetryPolicy, Retryable};
pub use toc::{MalformedTocError, parse_toc_mapping};

pub const DEFAULT_MODEL: &str = "gpt-4-0125-preview";
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Roughly 4 characters per token against a 128k-token context, leaving room for the prompt.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 384_000;

pub const TABLE_OF_CONTENTS_PROMPT: &str = r#"
The text below was extracted from a PDF document. Find its table of contents, including every
top-level section and any appendixes, and answer with a single JSON object.

Each key of the object is the name of a top-level section or appendix exactly as it appears in
the table of contents. Each value is an object whose keys are the subsections of that section
and whose values are the page numbers listed for them. Top-level section names are written in
capital letters. Page numbers are either plain numbers or labels such as A-1 or B-2 for
appendixes and other special sections.

Rules:
- Copy section and subsection names literally. If a name wraps over several lines, join the
  lines with a single space.
- Always include the top-level section itself as the first key of its own object.
- Appendix subsections may only be listed later in the document; include them.
- If a mapping is ambiguous, give your best guess.
- Use double quotes for every property name and every page number.

Example: "SUMMARY" on page 3 with subsection "Prologue" on page 4, "CHAPTER 1: INTRODUCTION"
on page 7 and "ADDITIONAL RESOURCES" on page A-1 become:

{
  "SUMMARY": {"SUMMARY": "3", "Prologue": "4"},
  "CHAPTER 1: INTRODUCTION": {"CHAPTER 1: INTRODUCTION": "7"},
  "ADDITIONAL RESOURCES": {"ADDITIONAL RESOURCES": "A-1"}
}

Document:

"#;

pub const SECTION_CLASSIFICATION_PROMPT: &str = r#"
Read the following section of a merger document and decide whether it is about Termination,
Indemnification, Confidentiality, or something else. Answer with a single label.

Section:

"#;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InferenceError {
    #[error("inference service rate limited the request: {0}")]
    RateLimited(String),
    #[error("inference service unavailable: {0}")]
    Unavailable(String),
    #[error("inference service rejected the credentials: {0}")]
    Unauthorized(String),
    #[error("inference request is misconfigured: {0}")]
    Misconfigured(String),
    #[error("inference service returned an unusable response: {0}")]
    InvalidResponse(String),
}

impl Retryable for InferenceError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            InferenceError::RateLimited(_) | InferenceError::Unavailable(_)
        )
    }
}

/// Produces the raw section → subsection → page-label JSON for a document.
pub trait TocInference: Send + Sync {
    fn infer_toc(&self, document_text: &str) -> Result<String, InferenceError>;
}

/// Produces a short free-form label for one subsection's text.
pub trait LabelInference: Send + Sync {
    fn infer_label(&self, section_text: &str) -> Result<String, InferenceError>;
}
