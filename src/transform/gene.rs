use crate::entities::gene::{GeneMetadata, GoTerms};
use crate::sources::mygene::{
    GeneRif, GoTerm, MimValue, MyGeneGeneResponse, PathwayAnnotations, PathwayEntry,
};
use crate::utils::serde::OneOrMany;
use crate::utils::text::{group_thousands, truncate_chars};

pub(crate) const MYGENE_SOURCE: &str = "mygene.info";

const GO_TERMS_PER_CATEGORY: usize = 10;
const MAX_MIM_ENTRIES: usize = 5;
const MAX_GENERIF_ENTRIES: usize = 5;
const GENERIF_TEXT_CHARS: usize = 100;

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn go_terms(terms: &OneOrMany<GoTerm>) -> Vec<String> {
    terms
        .iter()
        .take(GO_TERMS_PER_CATEGORY)
        .filter_map(|t| t.term.as_deref())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn push_pathways(out: &mut Vec<String>, entries: &OneOrMany<PathwayEntry>, source: &str) {
    for entry in entries.iter() {
        let Some(name) = entry.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) else {
            continue;
        };
        out.push(format!("{name} ({source})"));
    }
}

fn pathways(annotations: Option<&PathwayAnnotations>) -> Vec<String> {
    let Some(annotations) = annotations else {
        return Vec::new();
    };
    let mut out = Vec::new();
    push_pathways(&mut out, &annotations.reactome, "Reactome");
    push_pathways(&mut out, &annotations.wikipathways, "Wikipathways");
    push_pathways(&mut out, &annotations.kegg, "Kegg");
    out
}

fn mim_label(value: &MimValue) -> Option<String> {
    let (id, name) = match value {
        MimValue::Id(id) => (Some(id.as_string()), None),
        MimValue::Entry(entry) => (
            entry.mim.as_ref().map(|m| m.as_string()),
            entry.name.clone(),
        ),
    };
    let id = non_empty(id);
    let name = non_empty(name);
    match (id, name) {
        (Some(id), Some(name)) => Some(format!("MIM:{id} - {name}")),
        (Some(id), None) => Some(format!("MIM:{id}")),
        (None, Some(name)) => Some(name),
        (None, None) => None,
    }
}

fn generif_label(rif: &GeneRif) -> Option<String> {
    let pmid = non_empty(rif.pubmed.as_ref().map(|p| p.as_string()))?;
    let text = rif.text.as_deref().filter(|t| !t.is_empty())?;
    Some(format!(
        "PMID:{pmid}: {}...",
        truncate_chars(text, GENERIF_TEXT_CHARS)
    ))
}

fn genomic_location(resp: &MyGeneGeneResponse) -> Option<String> {
    let pos = resp.genomic_pos.as_ref()?.first()?;
    let chr = pos.chr.as_deref().map(str::trim).filter(|c| !c.is_empty())?;
    let start = pos.start.filter(|v| *v != 0)?;
    let end = pos.end.filter(|v| *v != 0)?;
    Some(format!(
        "chr{chr}:{}-{}",
        group_thousands(start),
        group_thousands(end)
    ))
}

/// Maps a MyGene gene document onto [`GeneMetadata`]; `queried_symbol` is used
/// when the document omits its own symbol.
pub fn from_mygene(resp: MyGeneGeneResponse, queried_symbol: &str) -> GeneMetadata {
    let go = resp.go.as_ref().map(|go| GoTerms {
        biological_process: go_terms(&go.bp),
        molecular_function: go_terms(&go.mf),
        cellular_component: go_terms(&go.cc),
    });
    let mim_diseases = resp
        .mim
        .iter()
        .take(MAX_MIM_ENTRIES)
        .filter_map(mim_label)
        .collect();
    let generif = resp
        .generif
        .iter()
        .take(MAX_GENERIF_ENTRIES)
        .filter_map(generif_label)
        .collect();

    GeneMetadata {
        symbol: non_empty(resp.symbol.clone()).unwrap_or_else(|| queried_symbol.trim().to_string()),
        name: non_empty(resp.name.clone()),
        summary: non_empty(resp.summary.clone()),
        go_terms: go.unwrap_or_default(),
        pathways: pathways(resp.pathway.as_ref()),
        mim_diseases,
        generif,
        entrez_id: resp.entrezgene.as_ref().and_then(|id| id.as_u64()),
        ensembl_id: resp.ensembl.as_ref().and_then(|e| e.gene()).cloned(),
        genomic_location: genomic_location(&resp),
        source: MYGENE_SOURCE.to_string(),
    }
}
