use std::collections::{BTreeSet, HashMap};

use crate::model::Page;
use crate::util::normalize_whitespace;

/// Reverse index from hyperlink anchor text to every page that text links to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkIndex {
    candidates: HashMap<String, BTreeSet<usize>>,
}

impl LinkIndex {
    pub fn build(pages: &[Page]) -> Self {
        let mut candidates = HashMap::<String, BTreeSet<usize>>::new();

        for page in pages {
            for link in &page.links {
                let anchor = normalize_anchor(&link.anchor_text);
                if anchor.is_empty() {
                    continue;
                }
                candidates.entry(anchor).or_default().insert(link.target);
            }
        }

        Self { candidates }
    }

    pub fn candidates(&self, anchor_text: &str) -> Option<&BTreeSet<usize>> {
        self.candidates
            .get(&normalize_anchor(anchor_text))
            .filter(|pages| !pages.is_empty())
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

pub fn normalize_anchor(text: &str) -> String {
    normalize_whitespace(text)
}
