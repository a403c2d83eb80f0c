use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::DeepGeneError;
use crate::sources::mygene::MyGeneClient;
use crate::transform;

/// Deterministic gene annotation from MyGene.info, embedded as model context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneMetadata {
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "GoTerms::is_empty")]
    pub go_terms: GoTerms,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pathways: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mim_diseases: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generif: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrez_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ensembl_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genomic_location: Option<String>,
    pub source: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GoTerms {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub biological_process: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub molecular_function: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cellular_component: Vec<String>,
}

impl GoTerms {
    pub fn is_empty(&self) -> bool {
        self.biological_process.is_empty()
            && self.molecular_function.is_empty()
            && self.cellular_component.is_empty()
    }
}

impl GeneMetadata {
    #[cfg(test)]
    pub(crate) fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: None,
            summary: None,
            go_terms: GoTerms::default(),
            pathways: Vec::new(),
            mim_diseases: Vec::new(),
            generif: Vec::new(),
            entrez_id: None,
            ensembl_id: None,
            genomic_location: None,
            source: transform::gene::MYGENE_SOURCE.to_string(),
        }
    }

    /// Renders the block handed to the gene-analysis prompt.
    pub fn prompt_context(&self) -> String {
        let mut lines: Vec<String> = vec![
            "GENE DATABASE INFORMATION (MyGene.info):".into(),
            String::new(),
        ];

        lines.push(format!("Gene: {}", self.symbol));
        if let Some(name) = self.name.as_deref().filter(|v| !v.is_empty()) {
            lines.push(format!("Full Name: {name}"));
        }
        if let Some(id) = self.entrez_id {
            lines.push(format!("NCBI Gene ID: {id}"));
        }
        if let Some(id) = self.ensembl_id.as_deref().filter(|v| !v.is_empty()) {
            lines.push(format!("Ensembl ID: {id}"));
        }
        if let Some(location) = self.genomic_location.as_deref() {
            lines.push(format!("Genomic Location: {location}"));
        }
        lines.push(String::new());

        if let Some(summary) = self.summary.as_deref().filter(|v| !v.is_empty()) {
            lines.push("Summary:".into());
            lines.push(format!("  {summary}"));
            lines.push(String::new());
        }

        push_section(
            &mut lines,
            "Biological Processes (Gene Ontology):",
            &self.go_terms.biological_process,
            5,
        );
        push_section(
            &mut lines,
            "Molecular Functions (Gene Ontology):",
            &self.go_terms.molecular_function,
            5,
        );
        push_section(
            &mut lines,
            "Cellular Components (Gene Ontology):",
            &self.go_terms.cellular_component,
            5,
        );
        push_section(&mut lines, "Known Pathways:", &self.pathways, 8);
        push_section(
            &mut lines,
            "Disease Associations (OMIM):",
            &self.mim_diseases,
            usize::MAX,
        );
        push_section(&mut lines, "Recent Research (GeneRIF):", &self.generif, 3);

        lines.join("\n")
    }
}

fn push_section(lines: &mut Vec<String>, heading: &str, items: &[String], limit: usize) {
    if items.is_empty() {
        return;
    }
    lines.push(heading.to_string());
    lines.extend(items.iter().take(limit).map(|item| format!("  - {item}")));
    lines.push(String::new());
}

/// Best-effort lookup: any upstream failure is logged and treated as absent.
pub(crate) async fn lookup(client: &MyGeneClient, symbol: &str) -> Option<GeneMetadata> {
    match client.fetch(symbol).await {
        Ok(Some(resp)) => {
            info!(symbol, "Gene metadata retrieved from MyGene.info");
            Some(transform::gene::from_mygene(resp, symbol))
        }
        Ok(None) => {
            warn!(symbol, "No MyGene.info record for gene symbol");
            None
        }
        Err(err) => {
            warn!(symbol, error = %err, "MyGene.info lookup failed");
            None
        }
    }
}

/// Strict lookup used by the `gene` command.
pub(crate) async fn fetch(
    client: &MyGeneClient,
    symbol: &str,
) -> Result<GeneMetadata, DeepGeneError> {
    let symbol = symbol.trim();
    match client.fetch(symbol).await? {
        Some(resp) => Ok(transform::gene::from_mygene(resp, symbol)),
        None => Err(DeepGeneError::NotFound {
            entity: "gene".into(),
            id: symbol.to_string(),
            suggestion: format!(
                "Check the HGNC symbol spelling. Try: deepgene gene {}",
                symbol.to_ascii_uppercase()
            ),
        }),
    }
}
