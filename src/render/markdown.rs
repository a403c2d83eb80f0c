use std::sync::OnceLock;

use minijinja::{Environment, context};

use crate::entities::analysis::GeneAnalysisResult;
use crate::entities::gene::GeneMetadata;
use crate::error::DeepGeneError;

static ENV: OnceLock<Environment<'static>> = OnceLock::new();

fn env() -> Result<&'static Environment<'static>, DeepGeneError> {
    if let Some(env) = ENV.get() {
        return Ok(env);
    }

    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_filter("truncate", |s: String, max_chars: usize| -> String {
        if s.chars().count() <= max_chars {
            return s;
        }
        let mut out = crate::utils::text::truncate_chars(&s, max_chars);
        out.push_str("...");
        out
    });
    env.add_template("report.md.j2", include_str!("../../templates/report.md.j2"))?;
    env.add_template("gene.md.j2", include_str!("../../templates/gene.md.j2"))?;

    let _ = ENV.set(env);
    ENV.get().ok_or_else(|| DeepGeneError::Api {
        api: "render".into(),
        message: "Template environment initialization race".into(),
    })
}

fn append_evidence_urls(mut body: String, urls: Vec<(&str, String)>) -> String {
    let links = urls
        .into_iter()
        .filter_map(|(label, url)| {
            let label = label.trim();
            let url = url.trim();
            if label.is_empty() || url.is_empty() {
                return None;
            }
            Some(format!("[{label}]({url})"))
        })
        .collect::<Vec<_>>();
    if links.is_empty() {
        return body;
    }
    if !body.ends_with('\n') {
        body.push('\n');
    }
    body.push('\n');
    body.push_str(&links.join(" | "));
    body.push('\n');
    body
}

fn quote_arg(value: &str) -> String {
    let v = value.trim();
    if v.is_empty() {
        return String::new();
    }
    if v.chars().any(|c| c.is_whitespace()) {
        return format!("\"{}\"", v.replace('\"', "\\\""));
    }
    v.to_string()
}

fn format_related(related: Vec<String>) -> String {
    related
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(|v| format!("`{v}`"))
        .collect::<Vec<_>>()
        .join(" | ")
}

fn with_related(mut body: String, related: Vec<String>) -> String {
    let related = format_related(related);
    if related.is_empty() {
        return body;
    }
    if !body.ends_with('\n') {
        body.push('\n');
    }
    body.push_str("\nSee also: ");
    body.push_str(&related);
    body.push('\n');
    body
}

fn gene_evidence_urls(gene: &GeneMetadata) -> Vec<(&'static str, String)> {
    let mut urls = Vec::new();
    if let Some(id) = gene.entrez_id {
        urls.push(("NCBI Gene", format!("https://www.ncbi.nlm.nih.gov/gene/{id}")));
    }
    if let Some(id) = gene.ensembl_id.as_deref() {
        urls.push(("Ensembl", format!("https://www.ensembl.org/id/{id}")));
    }
    urls
}

fn report_related(result: &GeneAnalysisResult) -> Vec<String> {
    let mut related = Vec::new();
    let symbol = crate::utils::symbol::extract_gene_symbol(&result.positional_gene);
    if !symbol.is_empty() {
        related.push(format!("deepgene gene {}", quote_arg(&symbol)));
    }
    if let Some(first) = result.literature.first() {
        related.push(format!("deepgene fetch {}", quote_arg(&first.locator)));
    }
    related
}

/// Renders the full research report for one rsID lookup.
pub fn report_markdown(result: &GeneAnalysisResult) -> Result<String, DeepGeneError> {
    let tmpl = env()?.get_template("report.md.j2")?;
    let body = tmpl.render(context! {
        rsid => &result.rsid,
        annotation => &result.annotation,
        positional_gene => &result.positional_gene,
        gene => &result.gene_data,
        function => &result.function,
        diseases => &result.diseases,
        snps => &result.snps,
        literature => &result.literature,
    })?;

    let mut urls = vec![(
        "dbSNP",
        format!("https://www.ncbi.nlm.nih.gov/snp/{}", result.rsid),
    )];
    if let Some(gene) = result.gene_data.as_ref() {
        urls.extend(gene_evidence_urls(gene));
    }
    let body = append_evidence_urls(body, urls);
    let body = with_related(body, report_related(result));
    Ok(format!(
        "{body}\n_Generated {} by deepgene {}_\n",
        time::OffsetDateTime::now_utc().date(),
        env!("CARGO_PKG_VERSION")
    ))
}

/// Renders the gene metadata view used by `deepgene gene`.
pub fn gene_markdown(gene: &GeneMetadata) -> Result<String, DeepGeneError> {
    let tmpl = env()?.get_template("gene.md.j2")?;
    let body = tmpl.render(context! {
        symbol => &gene.symbol,
        name => &gene.name,
        summary => &gene.summary,
        entrez_id => &gene.entrez_id,
        ensembl_id => &gene.ensembl_id,
        genomic_location => &gene.genomic_location,
        go_terms => &gene.go_terms,
        pathways => &gene.pathways,
        mim_diseases => &gene.mim_diseases,
        generif => &gene.generif,
        source => &gene.source,
    })?;
    Ok(append_evidence_urls(body, gene_evidence_urls(gene)))
}
