use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::entities::content::{ContentResolver, ContentSource};
use crate::entities::gene::{self, GeneMetadata};
use crate::entities::literature::{self, ProgressFn, Reference};
use crate::entities::mutant::IdentifierExtractor;
use crate::error::DeepGeneError;
use crate::generation::{self, StructuredGenerator};
use crate::sources::gemini::GeminiClient;
use crate::sources::mygene::MyGeneClient;

const GENE_ANALYSIS_INSTRUCTIONS: &str = "\
Analyze the given gene and rsID (reference SNP identifier).

CRITICAL INSTRUCTIONS:
- Even if the specific rsID is unknown or poorly documented, you MUST provide comprehensive information about the gene itself
- Include the gene's biological functions, associated diseases, and other well-known SNPs on this gene
- If you don't have information about the specific rsID, focus on the gene and list other documented SNPs
- ALWAYS provide gene function and disease information if the gene is known
- Include related SNPs on the same gene with their phenotypes

RESPONSE REQUIREMENTS:
1. function: List the gene's biological functions (REQUIRED - never leave empty for known genes)
2. diseases: List diseases/conditions associated with the gene (provide if known)
3. snps: List other known SNPs on this gene with their phenotypes (include the queried rsID if documented, plus other major SNPs on the gene)
4. literature: ONLY include entries with valid PubMed URLs or DOI URLs. Return empty list if no valid references.

Remember: Unknown rsID does not mean unknown gene. Provide detailed gene-level information even when the specific rsID lacks documentation.";

/// A SNP reported by the gene analysis model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SnpRecord {
    /// Reference SNP identifier, e.g. rs116515942
    pub id: String,
    /// Genes associated with the SNP
    #[serde(default)]
    pub genes: Vec<String>,
    /// Phenotypes associated with the SNP
    #[serde(default)]
    pub phenotypes: Vec<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct GeneAnalysis {
    /// Biological function of the gene (REQUIRED - provide detailed list even if rsID is unknown)
    function: Vec<String>,
    /// Associated diseases or conditions (provide comprehensive list if gene is known)
    diseases: Vec<String>,
    /// Known SNPs on this gene with their phenotypes - include queried rsID if documented, plus other major SNPs
    snps: Vec<SnpRecord>,
    /// Literature references with valid PubMed/DOI URLs and functional relevance
    #[serde(default)]
    literature: Vec<Reference>,
}

/// Final report for one rsID lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneAnalysisResult {
    pub rsid: String,
    pub annotation: String,
    pub positional_gene: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gene_data: Option<GeneMetadata>,
    pub function: Vec<String>,
    pub diseases: Vec<String>,
    pub snps: Vec<SnpRecord>,
    pub literature: Vec<Reference>,
}

/// Collaborators shared by every lookup in a session.
///
/// Built once at start-up and passed by reference; tests substitute the
/// generator and content source.
#[derive(Clone)]
pub struct ResearchContext {
    generator: Arc<dyn StructuredGenerator>,
    content: Arc<dyn ContentSource>,
    extractor: IdentifierExtractor,
    genes: Arc<MyGeneClient>,
}

impl ResearchContext {
    /// Production wiring: Gemini for generation, PubMed/web for content, MyGene for metadata.
    pub fn from_env() -> Result<Self, DeepGeneError> {
        let generator: Arc<dyn StructuredGenerator> = Arc::new(GeminiClient::from_env()?);
        Ok(Self::with_parts(
            generator,
            Arc::new(ContentResolver::new()?),
            MyGeneClient::new()?,
        ))
    }

    pub(crate) fn with_parts(
        generator: Arc<dyn StructuredGenerator>,
        content: Arc<dyn ContentSource>,
        genes: MyGeneClient,
    ) -> Self {
        Self {
            extractor: IdentifierExtractor::new(generator.clone()),
            generator,
            content,
            genes: Arc::new(genes),
        }
    }

    pub fn content(&self) -> &dyn ContentSource {
        self.content.as_ref()
    }

    pub fn extractor(&self) -> &IdentifierExtractor {
        &self.extractor
    }

    pub(crate) fn genes(&self) -> &MyGeneClient {
        self.genes.as_ref()
    }

    /// Best-effort gene metadata; absent on not-found or upstream failure.
    pub async fn gene_metadata(&self, symbol: &str) -> Option<GeneMetadata> {
        gene::lookup(self.genes(), symbol).await
    }
}

fn build_prompt(
    rsid: &str,
    annotation: &str,
    positional_gene: &str,
    gene_data: Option<&GeneMetadata>,
) -> String {
    let gene_context = gene_data
        .map(GeneMetadata::prompt_context)
        .unwrap_or_else(|| {
            "No gene database information available; provide comprehensive information from your knowledge.".to_string()
        });
    format!(
        "Reference SNP ID: {rsid}\nGenomic annotation: {annotation}\nPositional gene: {positional_gene}\n\n{gene_context}"
    )
}

/// Runs the gene analysis for one rsID and enriches its literature.
///
/// Failure of the analysis call itself is returned as an error; everything
/// inside literature enhancement degrades to "no new identifiers".
pub async fn run_lookup(
    ctx: &ResearchContext,
    rsid: &str,
    annotation: &str,
    positional_gene: &str,
    gene_data: Option<GeneMetadata>,
    on_progress: Option<ProgressFn<'_>>,
) -> Result<GeneAnalysisResult, DeepGeneError> {
    let rsid = rsid.trim();
    if rsid.is_empty() {
        return Err(DeepGeneError::InvalidArgument(
            "rsID is required. Example: deepgene lookup rs116515942 intronic \"CTNND2 (delta catenin-2)\"".into(),
        ));
    }

    let prompt = build_prompt(rsid, annotation, positional_gene, gene_data.as_ref());
    let analysis: GeneAnalysis = generation::generate(
        ctx.generator.as_ref(),
        GENE_ANALYSIS_INSTRUCTIONS,
        &prompt,
    )
    .await?;

    let proposed = analysis.literature.len();
    let mut references = literature::validate(analysis.literature);
    info!(
        rsid,
        proposed,
        valid = references.len(),
        "Gene analysis returned literature"
    );
    if !references.is_empty() {
        references = literature::enhance(
            references,
            ctx.content(),
            ctx.extractor(),
            on_progress,
        )
        .await;
    }

    Ok(GeneAnalysisResult {
        rsid: rsid.to_string(),
        annotation: annotation.to_string(),
        positional_gene: positional_gene.to_string(),
        gene_data,
        function: analysis.function,
        diseases: analysis.diseases,
        snps: analysis.snps,
        literature: references,
    })
}
