use std::sync::OnceLock;

use regex::Regex;

/// Extracts the gene symbol from a positional gene string.
///
/// The symbol is the first token before whitespace or `(`:
/// `"CTNND2 (delta catenin-2)"` gives `"CTNND2"`, `"WI2-2373I1.2"` is kept
/// as is, and blank input gives an empty string.
pub(crate) fn extract_gene_symbol(positional_gene: &str) -> String {
    static SPLIT_RE: OnceLock<Regex> = OnceLock::new();
    let re = SPLIT_RE.get_or_init(|| Regex::new(r"[\s(]").expect("valid symbol split regex"));

    let trimmed = positional_gene.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    re.splitn(trimmed, 2)
        .next()
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::extract_gene_symbol;

    #[test]
    fn extracts_symbol_before_description() {
        assert_eq!(extract_gene_symbol("CTNND2 (delta catenin-2)"), "CTNND2");
        assert_eq!(extract_gene_symbol("TP53 (tumor protein p53)"), "TP53");
        assert_eq!(extract_gene_symbol("BRCA1(breast cancer 1)"), "BRCA1");
    }

    #[test]
    fn keeps_bare_symbols_with_punctuation() {
        assert_eq!(extract_gene_symbol("FOXL3"), "FOXL3");
        assert_eq!(extract_gene_symbol("WI2-2373I1.2"), "WI2-2373I1.2");
        assert_eq!(extract_gene_symbol("  BRCA1  "), "BRCA1");
    }

    #[test]
    fn blank_or_description_only_input_yields_empty() {
        assert_eq!(extract_gene_symbol(""), "");
        assert_eq!(extract_gene_symbol("   "), "");
        assert_eq!(extract_gene_symbol("(no symbol)"), "");
    }
}
