use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::utils::text::{collapse_whitespace, truncate_chars};

/// Upper bound on resolved paper text handed to identifier extraction.
pub(crate) const MAX_CONTENT_CHARS: usize = 2000;
/// Scraped abstract candidates at or below this length are treated as navigation noise.
const MIN_SCRAPED_CHARS: usize = 100;
const MAX_PARAGRAPHS_INSPECTED: usize = 5;

/// Tag names tried for each abstract selector, in order.
const ABSTRACT_CONTAINERS: [&str; 3] = ["div", "section", "p"];
/// Class / id patterns denoting an abstract block, in priority order.
const ABSTRACT_PATTERNS: [&str; 4] = [".abstract", ".abstract-content", "#abstract", ".section.abstract"];
const ABSTRACT_META_SELECTOR: &str = "meta[name='dc.description']";

fn decode_html_entities(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

fn strip_inline_html_tags(value: &str) -> String {
    static HTML_TAG_RE: OnceLock<Regex> = OnceLock::new();
    let re = HTML_TAG_RE.get_or_init(|| Regex::new(r"(?is)<[^>]+>").expect("valid regex"));
    re.replace_all(value, "").to_string()
}

fn abstract_text_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<AbstractText(\s[^>]*[^/>])?>(.*?)</AbstractText>").expect("valid regex")
    })
}

fn label_attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\bLabel\s*=\s*"([^"]*)""#).expect("valid regex"))
}

/// Joins the `AbstractText` segments of an efetch record.
///
/// Labelled segments are prefixed with `"<LABEL>: "`. Returns `None` when the
/// record carries no abstract segments.
pub fn pubmed_abstract_from_efetch(xml: &str) -> Option<String> {
    let mut segments: Vec<String> = Vec::new();
    for caps in abstract_text_re().captures_iter(xml) {
        let label = caps
            .get(1)
            .and_then(|attrs| label_attr_re().captures(attrs.as_str()))
            .and_then(|c| c.get(1))
            .map(|m| decode_html_entities(m.as_str()).trim().to_string())
            .filter(|l| !l.is_empty());
        let body = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        let text = decode_html_entities(&strip_inline_html_tags(body))
            .trim()
            .to_string();

        segments.push(match label {
            Some(label) => format!("{label}: {text}"),
            None => text,
        });
    }

    if segments.is_empty() {
        return None;
    }
    Some(truncate_chars(&segments.join(" "), MAX_CONTENT_CHARS))
}

fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

fn long_enough(text: &str) -> bool {
    text.chars().count() > MIN_SCRAPED_CHARS
}

fn first_match<'a>(document: &'a Html, pattern: &str) -> Option<ElementRef<'a>> {
    ABSTRACT_CONTAINERS.iter().find_map(|tag| {
        let selector = Selector::parse(&format!("{tag}{pattern}")).ok()?;
        document.select(&selector).next()
    })
}

fn paragraph_marked_abstract(paragraph: ElementRef<'_>) -> bool {
    if paragraph.value().classes().any(|c| c == "abstract") {
        return true;
    }
    paragraph
        .parent()
        .and_then(ElementRef::wrap)
        .and_then(|parent| parent.value().attr("class"))
        .is_some_and(|class| class.contains("abstract"))
}

/// Extracts abstract-like text from an arbitrary article landing page.
///
/// Tries the abstract selectors in priority order, then the Dublin Core
/// description meta tag, then the first few paragraphs inside an abstract
/// container. Returns `None` when nothing qualifies.
pub fn abstract_from_html(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    for pattern in ABSTRACT_PATTERNS {
        let Some(element) = first_match(&document, pattern) else {
            continue;
        };
        let text = element_text(element);
        if long_enough(&text) {
            return Some(truncate_chars(&text, MAX_CONTENT_CHARS));
        }
    }

    let meta_content = Selector::parse(ABSTRACT_META_SELECTOR).ok().and_then(|selector| {
        document
            .select(&selector)
            .next()
            .and_then(|meta| meta.value().attr("content"))
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
    });
    if let Some(content) = meta_content {
        return Some(truncate_chars(&content, MAX_CONTENT_CHARS));
    }

    let paragraph = Selector::parse("p").ok()?;
    document
        .select(&paragraph)
        .take(MAX_PARAGRAPHS_INSPECTED)
        .find_map(|p| {
            let text = element_text(p);
            (long_enough(&text) && paragraph_marked_abstract(p))
                .then(|| truncate_chars(&text, MAX_CONTENT_CHARS))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_sentence(word: &str) -> String {
        format!("{word} ").repeat(30).trim().to_string()
    }

    #[test]
    fn efetch_joins_labeled_segments() {
        let xml = r#"<?xml version="1.0" ?>
<PubmedArticleSet><PubmedArticle><MedlineCitation><Article><Abstract>
<AbstractText Label="BACKGROUND" NlmCategory="BACKGROUND">Background info.</AbstractText>
<AbstractText Label="METHODS" NlmCategory="METHODS">Methods used.</AbstractText>
</Abstract></Article></MedlineCitation></PubmedArticle></PubmedArticleSet>"#;

        assert_eq!(
            pubmed_abstract_from_efetch(xml).as_deref(),
            Some("BACKGROUND: Background info. METHODS: Methods used.")
        );
    }

    #[test]
    fn efetch_keeps_unlabeled_segments_and_inline_markup_text() {
        let xml = "<Abstract><AbstractText>The <i>BRAF</i> V600E variant &amp; rs113488022.</AbstractText></Abstract>";
        assert_eq!(
            pubmed_abstract_from_efetch(xml).as_deref(),
            Some("The BRAF V600E variant & rs113488022.")
        );
    }

    #[test]
    fn efetch_without_segments_is_absent() {
        assert!(pubmed_abstract_from_efetch("<PubmedArticleSet></PubmedArticleSet>").is_none());
        assert!(pubmed_abstract_from_efetch("not xml at all").is_none());
    }

    #[test]
    fn efetch_ignores_self_closing_segments() {
        let xml = r#"<AbstractText Label="EMPTY"/><AbstractText>Real text.</AbstractText>"#;
        assert_eq!(pubmed_abstract_from_efetch(xml).as_deref(), Some("Real text."));
    }

    #[test]
    fn efetch_truncates_to_content_bound() {
        let xml = format!("<AbstractText>{}</AbstractText>", "A".repeat(3000));
        let text = pubmed_abstract_from_efetch(&xml).expect("abstract");
        assert_eq!(text.chars().count(), MAX_CONTENT_CHARS);
    }

    #[test]
    fn html_prefers_abstract_class_over_meta() {
        let body = long_sentence("variant");
        let html = format!(
            r#"<html><head><meta name="dc.description" content="meta text"></head>
<body><div class="abstract"><h2>Abstract</h2><p>{body}</p></div></body></html>"#
        );
        let text = abstract_from_html(&html).expect("abstract");
        assert!(text.starts_with("Abstract variant variant"));
        assert!(!text.contains("meta text"));
    }

    #[test]
    fn html_skips_short_match_and_tries_next_pattern() {
        let body = long_sentence("mutation");
        let html = format!(
            r#"<div class="abstract">Abstract</div><section id="abstract">{body}</section>"#
        );
        assert_eq!(abstract_from_html(&html), Some(body));
    }

    #[test]
    fn html_falls_back_to_dublin_core_meta_without_length_threshold() {
        let html = r#"<html><head><meta name="dc.description" content=" Short description. "></head><body><p>nothing</p></body></html>"#;
        assert_eq!(
            abstract_from_html(html).as_deref(),
            Some("Short description.")
        );
    }

    #[test]
    fn html_paragraph_fallback_requires_abstract_parent() {
        let body = long_sentence("allele");
        let html = format!(
            r#"<body><p>{body}</p><div class="article-abstract-body"><p>{body} marker</p></div></body>"#
        );
        let text = abstract_from_html(&html).expect("paragraph");
        assert!(text.ends_with("marker"));
    }

    #[test]
    fn html_paragraph_fallback_inspects_only_first_five() {
        let body = long_sentence("snp");
        let filler = "<p>filler</p>".repeat(5);
        let html = format!(r#"<body>{filler}<div class="x-abstract"><p>{body}</p></div></body>"#);
        assert!(abstract_from_html(&html).is_none());
    }

    #[test]
    fn html_truncates_long_abstract() {
        let html = format!(r#"<div class="abstract-content">{}</div>"#, "B".repeat(3000));
        let text = abstract_from_html(&html).expect("abstract");
        assert_eq!(text.chars().count(), MAX_CONTENT_CHARS);
    }

    #[test]
    fn html_without_candidates_is_absent() {
        assert!(abstract_from_html("<html><body><p>Cookie banner</p></body></html>").is_none());
        assert!(abstract_from_html("").is_none());
    }
}
