use std::io::Write;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;

use crate::entities::analysis::{self, ResearchContext};
use crate::entities::content::{ContentResolver, ContentSource};
use crate::entities::gene;
use crate::entities::literature::ProgressFn;
use crate::entities::mutant::IdentifierExtractor;
use crate::render;
use crate::sources::gemini::GeminiClient;
use crate::sources::mygene::MyGeneClient;
use crate::utils::symbol::extract_gene_symbol;

pub mod health;
pub mod shell;

const AFTER_HELP: &str = "\
EXAMPLES:
  deepgene lookup rs116515942 intronic \"CTNND2 (delta catenin-2)\"
  deepgene lookup rs7903146 intronic TCF7L2 --no-gene-data
  deepgene gene CTNND2
  deepgene fetch https://pubmed.ncbi.nlm.nih.gov/26366551/
  deepgene shell

ENVIRONMENT:
  GOOGLE_API_KEY          Gemini API key (required for lookup, mutants, shell)
  DEEPGENE_GEMINI_MODEL   Gemini model name (default gemini-2.5-flash)
  NCBI_API_KEY            Optional NCBI key for faster PubMed access
  RUST_LOG                Log filter (default warn)";

#[derive(Parser, Debug)]
#[command(
    name = "deepgene",
    version,
    about = "AI-assisted genetic variant research: gene context, literature and mutants",
    after_help = AFTER_HELP
)]
pub struct Cli {
    /// Print JSON instead of Markdown
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Research one variant: gene metadata, AI analysis and literature mutants
    Lookup {
        /// Reference SNP id, e.g. rs116515942
        rsid: String,
        /// Genomic annotation, e.g. intronic
        annotation: String,
        /// Positional gene, e.g. "CTNND2 (delta catenin-2)"
        #[arg(required = true, num_args = 1..)]
        positional_gene: Vec<String>,
        /// Skip the MyGene.info lookup and rely on the model alone
        #[arg(long)]
        no_gene_data: bool,
    },
    /// Show MyGene.info metadata for a gene symbol
    Gene {
        /// HGNC gene symbol, e.g. CTNND2
        symbol: String,
    },
    /// Resolve a literature URL to abstract text
    Fetch {
        /// PubMed, DOI or journal URL
        url: String,
    },
    /// Extract mutation identifiers from free text
    Mutants {
        /// Text to analyze
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Check connectivity to upstream APIs
    Health,
    /// Interactive research shell
    Shell,
}

fn stderr_progress(message: &str) {
    let _ = writeln!(std::io::stderr(), "  {message}");
}

/// Gene context, analysis and rendering for one variant.
pub(crate) async fn lookup_report(
    ctx: &ResearchContext,
    rsid: &str,
    annotation: &str,
    positional_gene: &str,
    with_gene_data: bool,
    json: bool,
) -> anyhow::Result<String> {
    let progress: ProgressFn<'_> = &stderr_progress;

    let symbol = extract_gene_symbol(positional_gene);
    let gene_data = if with_gene_data && !symbol.is_empty() {
        progress(&format!("Fetching gene data for {symbol} from MyGene.info..."));
        let data = ctx.gene_metadata(&symbol).await;
        if data.is_none() {
            progress("No gene database record found; using AI analysis only");
        }
        data
    } else {
        None
    };

    progress(&format!("Analyzing {} with AI...", rsid.trim()));
    let result = analysis::run_lookup(
        ctx,
        rsid,
        annotation,
        positional_gene,
        gene_data,
        Some(progress),
    )
    .await?;

    if json {
        return Ok(render::json::to_pretty(&result)?);
    }
    Ok(render::markdown::report_markdown(&result)?)
}

pub(crate) async fn gene_report(
    client: &MyGeneClient,
    symbol: &str,
    json: bool,
) -> anyhow::Result<String> {
    let metadata = gene::fetch(client, symbol).await?;
    if json {
        return Ok(render::json::to_pretty(&metadata)?);
    }
    Ok(render::markdown::gene_markdown(&metadata)?)
}

pub(crate) async fn fetch_report(
    content: &dyn ContentSource,
    url: &str,
    json: bool,
) -> anyhow::Result<String> {
    let url = url.trim();
    let text = content.resolve(url).await;
    if json {
        return Ok(render::json::to_pretty(&json!({
            "locator": url,
            "content": text,
        }))?);
    }
    Ok(match text {
        Some(text) => format!("# Content: {url}\n\n{text}\n"),
        None => format!("No content could be resolved for {url}\n"),
    })
}

async fn mutants_report(
    extractor: &IdentifierExtractor,
    text: &str,
    json: bool,
) -> anyhow::Result<String> {
    let mutants = extractor.extract(text).await;
    if json {
        return Ok(render::json::to_pretty(&json!({ "mutants": mutants }))?);
    }
    let mut out = String::from("# Extracted Mutants\n\n");
    if mutants.is_empty() {
        out.push_str("None\n");
    }
    for mutant in &mutants {
        out.push_str(&format!("- {mutant}\n"));
    }
    Ok(out)
}

/// Executes a parsed command and returns its rendered output.
///
/// # Errors
///
/// Returns an error when configuration is missing, an upstream call fails
/// for a command that cannot degrade, or rendering fails.
pub async fn run(cli: Cli) -> anyhow::Result<String> {
    let json = cli.json;
    match cli.command {
        Commands::Lookup {
            rsid,
            annotation,
            positional_gene,
            no_gene_data,
        } => {
            let ctx = ResearchContext::from_env()?;
            lookup_report(
                &ctx,
                &rsid,
                &annotation,
                &positional_gene.join(" "),
                !no_gene_data,
                json,
            )
            .await
        }
        Commands::Gene { symbol } => {
            let client = MyGeneClient::new()?;
            gene_report(&client, &symbol, json).await
        }
        Commands::Fetch { url } => {
            let resolver = ContentResolver::new()?;
            fetch_report(&resolver, &url, json).await
        }
        Commands::Mutants { text } => {
            let extractor = IdentifierExtractor::new(Arc::new(GeminiClient::from_env()?));
            mutants_report(&extractor, &text.join(" "), json).await
        }
        Commands::Health => {
            let report = health::check().await?;
            if json {
                return Ok(render::json::to_pretty(&report)?);
            }
            Ok(report.to_markdown())
        }
        Commands::Shell => {
            shell::run(json).await?;
            Ok(String::new())
        }
    }
}
