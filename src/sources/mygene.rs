use std::borrow::Cow;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::DeepGeneError;
use crate::sources::is_valid_gene_symbol;
use crate::utils::serde::OneOrMany;

pub(crate) const MYGENE_BASE: &str = "https://mygene.info/v3";
pub(crate) const MYGENE_BASE_ENV: &str = "DEEPGENE_MYGENE_BASE";
const MYGENE_API: &str = "mygene.info";
const MYGENE_GENE_FIELDS: &str = "symbol,name,summary,go.BP,go.MF,go.CC,pathway.reactome,pathway.wikipathways,pathway.kegg,MIM,generif,genomic_pos,entrezgene,ensembl.gene";

pub struct MyGeneClient {
    client: reqwest_middleware::ClientWithMiddleware,
    base: Cow<'static, str>,
}

impl MyGeneClient {
    pub fn new() -> Result<Self, DeepGeneError> {
        Ok(Self {
            client: crate::sources::shared_client()?,
            base: crate::sources::env_base(MYGENE_BASE, MYGENE_BASE_ENV),
        })
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(base: String) -> Result<Self, DeepGeneError> {
        Ok(Self {
            client: crate::sources::test_client()?,
            base: Cow::Owned(base),
        })
    }

    pub(crate) fn base(&self) -> &str {
        self.base.as_ref()
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base.as_ref().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        req: reqwest_middleware::RequestBuilder,
    ) -> Result<T, DeepGeneError> {
        let resp = req.send().await?;
        let status = resp.status();
        let content_type = resp.headers().get(reqwest::header::CONTENT_TYPE).cloned();
        let bytes = crate::sources::read_limited_body(resp, MYGENE_API).await?;
        if !status.is_success() {
            let excerpt = crate::sources::body_excerpt(&bytes);
            return Err(DeepGeneError::Api {
                api: MYGENE_API.to_string(),
                message: format!("HTTP {status}: {excerpt}"),
            });
        }
        crate::sources::ensure_json_content_type(MYGENE_API, content_type.as_ref(), &bytes)?;
        serde_json::from_slice(&bytes).map_err(|source| DeepGeneError::ApiJson {
            api: MYGENE_API.to_string(),
            source,
        })
    }

    /// Resolves a human gene symbol to its Entrez gene id.
    pub async fn entrez_id(&self, symbol: &str) -> Result<Option<String>, DeepGeneError> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(DeepGeneError::InvalidArgument(
                "Gene symbol is required. Example: deepgene gene CTNND2".into(),
            ));
        }
        if symbol.len() > 128 {
            return Err(DeepGeneError::InvalidArgument(
                "Gene symbol is too long. Example: deepgene gene CTNND2".into(),
            ));
        }
        if !is_valid_gene_symbol(symbol) {
            return Err(DeepGeneError::InvalidArgument(
                "Gene symbol must contain only letters, numbers, '_', '-' or '.'. Example: deepgene gene CTNND2".into(),
            ));
        }

        let q = format!(
            "symbol:\"{}\"",
            crate::utils::query::escape_lucene_value(symbol)
        );
        let resp: MyGeneQueryResponse = self
            .get_json(self.client.get(self.endpoint("query")).query(&[
                ("q", q.as_str()),
                ("species", "human"),
                ("fields", "entrezgene"),
                ("size", "1"),
            ]))
            .await?;

        Ok(resp
            .hits
            .into_iter()
            .next()
            .and_then(|hit| hit.entrezgene)
            .map(|id| id.as_string())
            .filter(|id| !id.trim().is_empty()))
    }

    /// Fetches the annotation fields used for prompt context.
    pub async fn gene(&self, entrez_id: &str) -> Result<MyGeneGeneResponse, DeepGeneError> {
        let entrez_id = entrez_id.trim();
        if entrez_id.is_empty() || !entrez_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(DeepGeneError::InvalidArgument(format!(
                "Entrez gene id must be numeric, got '{entrez_id}'"
            )));
        }
        let url = self.endpoint(&format!("gene/{entrez_id}"));
        self.get_json(
            self.client
                .get(&url)
                .query(&[("fields", MYGENE_GENE_FIELDS)]),
        )
        .await
    }

    /// Two-step lookup: symbol query, then the gene document for the first hit.
    pub async fn fetch(&self, symbol: &str) -> Result<Option<MyGeneGeneResponse>, DeepGeneError> {
        let Some(entrez_id) = self.entrez_id(symbol).await? else {
            return Ok(None);
        };
        self.gene(&entrez_id).await.map(Some)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct MyGeneQueryResponse {
    #[serde(default)]
    hits: Vec<MyGeneQueryHit>,
}

#[derive(Debug, Clone, Deserialize)]
struct MyGeneQueryHit {
    entrezgene: Option<StringOrU64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MyGeneGeneResponse {
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub summary: Option<String>,
    pub go: Option<GoAnnotations>,
    pub pathway: Option<PathwayAnnotations>,
    #[serde(rename = "MIM", default)]
    pub mim: OneOrMany<MimValue>,
    #[serde(default)]
    pub generif: OneOrMany<GeneRif>,
    pub entrezgene: Option<StringOrU64>,
    pub ensembl: Option<EnsemblField>,
    pub genomic_pos: Option<GenomicPosField>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StringOrU64 {
    String(String),
    Number(u64),
}

impl StringOrU64 {
    pub fn as_string(&self) -> String {
        match self {
            StringOrU64::String(s) => s.clone(),
            StringOrU64::Number(n) => n.to_string(),
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            StringOrU64::String(s) => s.trim().parse().ok(),
            StringOrU64::Number(n) => Some(*n),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GoAnnotations {
    #[serde(rename = "BP", default)]
    pub bp: OneOrMany<GoTerm>,
    #[serde(rename = "MF", default)]
    pub mf: OneOrMany<GoTerm>,
    #[serde(rename = "CC", default)]
    pub cc: OneOrMany<GoTerm>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GoTerm {
    pub term: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PathwayAnnotations {
    #[serde(default)]
    pub reactome: OneOrMany<PathwayEntry>,
    #[serde(default)]
    pub wikipathways: OneOrMany<PathwayEntry>,
    #[serde(default)]
    pub kegg: OneOrMany<PathwayEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathwayEntry {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// OMIM cross-reference: MyGene returns bare ids, some mirrors return `{MIM, name}` records.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MimValue {
    Entry(MimEntry),
    Id(StringOrU64),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MimEntry {
    #[serde(rename = "MIM")]
    pub mim: Option<StringOrU64>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneRif {
    pub pubmed: Option<StringOrU64>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnsemblInfo {
    pub gene: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum EnsemblField {
    Single(EnsemblInfo),
    Multiple(Vec<EnsemblInfo>),
}

impl EnsemblField {
    fn first(&self) -> Option<&EnsemblInfo> {
        match self {
            EnsemblField::Single(v) => Some(v),
            EnsemblField::Multiple(v) => v.first(),
        }
    }

    pub fn gene(&self) -> Option<&String> {
        self.first().and_then(|v| v.gene.as_ref())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenomicPos {
    pub chr: Option<String>,
    pub start: Option<i64>,
    pub end: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum GenomicPosField {
    Single(GenomicPos),
    Multiple(Vec<GenomicPos>),
}

impl GenomicPosField {
    pub fn first(&self) -> Option<&GenomicPos> {
        match self {
            GenomicPosField::Single(v) => Some(v),
            GenomicPosField::Multiple(v) => v.first(),
        }
    }
}
