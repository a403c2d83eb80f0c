use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::DeepGeneError;
use crate::sources::eutils::EutilsClient;
use crate::sources::webpage::WebpageClient;
use crate::transform;

/// Turns a literature locator into bounded plain text.
///
/// Implementations never fail: every retrieval problem collapses to `None`.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn resolve(&self, locator: &str) -> Option<String>;
}

fn pmid_patterns() -> &'static [Regex; 4] {
    static PATTERNS: OnceLock<[Regex; 4]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"pubmed\.ncbi\.nlm\.nih\.gov/(\d+)").expect("valid regex"),
            Regex::new(r"ncbi\.nlm\.nih\.gov/pubmed/(\d+)").expect("valid regex"),
            Regex::new(r"ncbi\.nlm\.nih\.gov/m/pubmed/(\d+)").expect("valid regex"),
            Regex::new(r"/pubmed/(\d+)").expect("valid regex"),
        ]
    })
}

/// Extracts a PubMed id from a locator; canonical domain forms win over legacy ones.
pub fn extract_pmid(locator: &str) -> Option<String> {
    pmid_patterns().iter().find_map(|re| {
        re.captures(locator)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    })
}

/// PubMed efetch for PubMed locators, journal page scraping for everything else.
pub struct ContentResolver {
    eutils: EutilsClient,
    webpage: WebpageClient,
}

impl ContentResolver {
    pub fn new() -> Result<Self, DeepGeneError> {
        Ok(Self {
            eutils: EutilsClient::new()?,
            webpage: WebpageClient::new()?,
        })
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(eutils_base: String) -> Result<Self, DeepGeneError> {
        Ok(Self {
            eutils: EutilsClient::new_for_test(eutils_base, None)?,
            webpage: WebpageClient::new_for_test()?,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_timeout_for_test(
        eutils_base: String,
        timeout: std::time::Duration,
    ) -> Result<Self, DeepGeneError> {
        let client = crate::sources::test_client_with_timeout(timeout)?;
        Ok(Self {
            eutils: EutilsClient::with_client_for_test(client.clone(), eutils_base, None),
            webpage: WebpageClient::with_client_for_test(client),
        })
    }

    async fn pubmed_abstract(&self, pmid: &str) -> Option<String> {
        let xml = match self.eutils.efetch_abstract_xml(pmid).await {
            Ok(xml) => xml,
            Err(err) => {
                warn!(pmid, error = %err, "PubMed efetch failed");
                return None;
            }
        };
        let text = transform::article::pubmed_abstract_from_efetch(&xml);
        if text.is_none() {
            warn!(pmid, "No abstract found in PubMed record");
        }
        text
    }

    async fn scraped_abstract(&self, locator: &str) -> Option<String> {
        let html = match self.webpage.fetch_html(locator).await {
            Ok(html) => html,
            Err(err) => {
                warn!(locator, error = %err, "Article page fetch failed");
                return None;
            }
        };
        let text = transform::article::abstract_from_html(&html);
        if text.is_none() {
            warn!(locator, "Could not extract abstract from article page");
        }
        text
    }
}

#[async_trait]
impl ContentSource for ContentResolver {
    async fn resolve(&self, locator: &str) -> Option<String> {
        // A PubMed locator is answered by efetch alone; its page is never scraped.
        if let Some(pmid) = extract_pmid(locator) {
            debug!(pmid = %pmid, "Fetching PubMed abstract");
            return self.pubmed_abstract(&pmid).await;
        }

        debug!(locator, "Scraping article page");
        self.scraped_abstract(locator).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// Serves canned content per locator and records the resolve order.
    #[derive(Default)]
    pub(crate) struct StaticContent {
        pages: HashMap<String, String>,
        seen: Mutex<Vec<String>>,
    }

    impl StaticContent {
        pub(crate) fn with_page(mut self, locator: &str, text: &str) -> Self {
            self.pages.insert(locator.to_string(), text.to_string());
            self
        }

        pub(crate) fn seen(&self) -> Vec<String> {
            self.seen.lock().map(|s| s.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl ContentSource for StaticContent {
        async fn resolve(&self, locator: &str) -> Option<String> {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(locator.to_string());
            }
            self.pages.get(locator).cloned()
        }
    }
}
