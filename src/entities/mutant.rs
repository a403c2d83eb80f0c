use std::sync::Arc;

use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{info, warn};

use crate::generation::{self, StructuredGenerator};
use crate::utils::text::truncate_chars;

/// Texts shorter than this are not worth a model call.
pub(crate) const MIN_EXTRACTION_CHARS: usize = 10;
/// Extraction input bound; mutation mentions concentrate in the abstract.
pub(crate) const MAX_EXTRACTION_CHARS: usize = 2000;

const EXTRACTION_INSTRUCTIONS: &str = "Extract mutation and variant mentions from biomedical text.\n\
Identify all genetic mutations, variants, and SNPs mentioned in the text. \
Include rs numbers, protein mutations (p. notation), DNA mutations (c. notation), \
and simple mutation names (e.g., V600E). Return only identifiers that appear in the text.";

#[derive(Debug, Deserialize, JsonSchema)]
struct MutantExtraction {
    /// List of all mutation identifiers found: rs numbers (rs116515942), protein mutations
    /// (p.Gly12Asp), DNA mutations (c.35G>A), simple mutations (V600E), gene variants, SNPs
    #[serde(default)]
    mutants: Vec<String>,
}

/// Mines mutation / variant identifiers from paper text with one structured generation call.
#[derive(Clone)]
pub struct IdentifierExtractor {
    generator: Arc<dyn StructuredGenerator>,
}

impl IdentifierExtractor {
    pub fn new(generator: Arc<dyn StructuredGenerator>) -> Self {
        Self { generator }
    }

    /// Returns the identifiers mentioned in `text`, or an empty list on any failure.
    pub async fn extract(&self, text: &str) -> Vec<String> {
        if text.chars().count() < MIN_EXTRACTION_CHARS {
            return Vec::new();
        }

        let sample = truncate_chars(text, MAX_EXTRACTION_CHARS);
        let result = generation::generate::<MutantExtraction>(
            self.generator.as_ref(),
            EXTRACTION_INSTRUCTIONS,
            &sample,
        )
        .await;

        match result {
            Ok(extraction) => {
                let mutants: Vec<String> = extraction
                    .mutants
                    .into_iter()
                    .map(|m| m.trim().to_string())
                    .filter(|m| !m.is_empty())
                    .collect();
                info!(count = mutants.len(), "Extracted mutants from text");
                mutants
            }
            Err(err) => {
                warn!(error = %err, "Mutant extraction failed");
                Vec::new()
            }
        }
    }
}
