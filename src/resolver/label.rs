use strsim::normalized_levenshtein;

use crate::model::CanonicalLabel;

pub const DEFAULT_LABEL_THRESHOLD: f64 = 0.6;

/// Maps raw classifier output onto the closest canonical label, or `Unknown` when nothing
/// scores at least `threshold`. Ties go to the earlier label in `CanonicalLabel::ALL`.
pub fn classify_label(raw: &str, threshold: f64) -> CanonicalLabel {
    let normalized = raw.trim().to_lowercase();
    if normalized.is_empty() {
        return CanonicalLabel::Unknown;
    }

    let mut best: Option<(CanonicalLabel, f64)> = None;
    for label in CanonicalLabel::ALL {
        let score = normalized_levenshtein(&normalized, &label.as_str().to_lowercase());
        if score < threshold {
            continue;
        }
        if best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((label, score));
        }
    }

    best.map(|(label, _)| label)
        .unwrap_or(CanonicalLabel::Unknown)
}
