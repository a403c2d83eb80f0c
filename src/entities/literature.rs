use std::collections::HashSet;

use reqwest::Url;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::entities::content::ContentSource;
use crate::entities::mutant::IdentifierExtractor;

/// Observer notified with one human-readable line per pipeline step.
pub type ProgressFn<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// A literature citation proposed by the gene analysis model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Reference {
    /// Functional relevance of the literature to the gene or variant
    pub functional_relevance: String,
    /// Mutation and variant identifiers associated with the literature (rsIDs, p./c. notation, V600E style)
    #[serde(default)]
    pub identifiers: Vec<String>,
    /// URL of the literature; only PubMed or DOI URLs
    pub locator: String,
}

impl Reference {
    fn with_identifiers(self, identifiers: Vec<String>) -> Self {
        Self {
            identifiers,
            ..self
        }
    }
}

fn is_valid_locator(locator: &str) -> bool {
    let Ok(url) = Url::parse(locator) else {
        return false;
    };
    matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty())
}

/// Drops references whose locator is not an absolute http(s) URL, keeping order.
pub fn validate(refs: Vec<Reference>) -> Vec<Reference> {
    refs.into_iter()
        .filter(|reference| {
            let ok = is_valid_locator(&reference.locator);
            if !ok {
                warn!(locator = %reference.locator, "Dropping reference with invalid locator");
            }
            ok
        })
        .collect()
}

/// Union of `original` and `extracted`; `original` entries keep their positions.
pub fn merge_identifiers(original: &[String], extracted: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(original.len() + extracted.len());
    let mut merged = Vec::with_capacity(original.len() + extracted.len());
    for id in original.iter().cloned().chain(extracted) {
        if seen.insert(id.clone()) {
            merged.push(id);
        }
    }
    merged
}

/// Resolves each reference's paper and folds extracted identifiers into it.
///
/// References are processed one at a time in input order; the output has the
/// same length and order. A reference whose content cannot be resolved is
/// passed through unchanged.
pub async fn enhance(
    refs: Vec<Reference>,
    content: &dyn ContentSource,
    extractor: &IdentifierExtractor,
    on_progress: Option<ProgressFn<'_>>,
) -> Vec<Reference> {
    let total = refs.len();
    let notify = |message: String| {
        if let Some(cb) = on_progress {
            cb(&message);
        }
    };

    info!(count = total, "Enhancing literature references");
    let mut enhanced = Vec::with_capacity(total);
    for (idx, reference) in refs.into_iter().enumerate() {
        let position = idx + 1;
        notify(format!(
            "Fetching paper {position}/{total}: {}",
            reference.locator
        ));

        let Some(text) = content.resolve(&reference.locator).await else {
            enhanced.push(reference);
            continue;
        };

        notify(format!("Extracting mutants from paper {position}/{total}"));
        let extracted = extractor.extract(&text).await;
        let identifiers = merge_identifiers(&reference.identifiers, extracted);
        enhanced.push(reference.with_identifiers(identifiers));
    }
    enhanced
}
