use serde::Serialize;

use crate::error::DeepGeneError;

pub fn to_pretty<T: Serialize>(value: &T) -> Result<String, DeepGeneError> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::to_pretty;
    use crate::entities::analysis::GeneAnalysisResult;
    use crate::entities::gene::GeneMetadata;
    use crate::entities::literature::Reference;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Demo<'a> {
        rsid: &'a str,
        score: f64,
    }

    #[test]
    fn to_pretty_serializes_with_indentation() {
        let payload = Demo {
            rsid: "rs116515942",
            score: 0.98,
        };
        let json = to_pretty(&payload).expect("json");
        assert!(json.contains('\n'));
        assert!(json.contains("\"rsid\": \"rs116515942\""));
        assert!(json.contains("\"score\": 0.98"));
    }

    #[test]
    fn json_render_gene_metadata_skips_empty_fields() {
        let mut gene = GeneMetadata::new("EGFR");
        gene.entrez_id = Some(1956);
        gene.pathways = vec!["EGFR signaling pathway (Reactome)".into()];

        let json = to_pretty(&gene).expect("gene json");
        assert!(json.contains("\"symbol\": \"EGFR\""));
        assert!(json.contains("\"entrez_id\": 1956"));
        assert!(json.contains("\"source\": \"mygene.info\""));
        assert!(!json.contains("\"summary\""));
        assert!(!json.contains("\"go_terms\""));
    }

    #[test]
    fn json_render_analysis_result() {
        let result = GeneAnalysisResult {
            rsid: "rs1".into(),
            annotation: "intronic".into(),
            positional_gene: "CTNND2".into(),
            gene_data: None,
            function: vec!["Cell adhesion".into()],
            diseases: Vec::new(),
            snps: Vec::new(),
            literature: vec![Reference {
                functional_relevance: "Study".into(),
                identifiers: vec!["V600E".into()],
                locator: "https://doi.org/10.1/x".into(),
            }],
        };

        let json = to_pretty(&result).expect("result json");
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["literature"][0]["identifiers"][0], "V600E");
        assert_eq!(value["diseases"], serde_json::json!([]));
        assert!(value.get("gene_data").is_none());
    }
}
