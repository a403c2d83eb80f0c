use std::borrow::Cow;

use crate::error::DeepGeneError;

pub(crate) const EUTILS_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
pub(crate) const EUTILS_BASE_ENV: &str = "DEEPGENE_EUTILS_BASE";
const EUTILS_API: &str = "eutils";

/// NCBI E-utilities client restricted to PubMed abstract retrieval.
pub struct EutilsClient {
    client: reqwest_middleware::ClientWithMiddleware,
    base: Cow<'static, str>,
    api_key: Option<String>,
}

impl EutilsClient {
    pub fn new() -> Result<Self, DeepGeneError> {
        Ok(Self {
            client: crate::sources::literature_client()?,
            base: crate::sources::env_base(EUTILS_BASE, EUTILS_BASE_ENV),
            api_key: crate::sources::ncbi_api_key(),
        })
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(base: String, api_key: Option<String>) -> Result<Self, DeepGeneError> {
        Ok(Self::with_client_for_test(
            crate::sources::test_client()?,
            base,
            api_key,
        ))
    }

    #[cfg(test)]
    pub(crate) fn with_client_for_test(
        client: reqwest_middleware::ClientWithMiddleware,
        base: String,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            base: Cow::Owned(base),
            api_key,
        }
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

    /// Fetches the PubMed abstract record for `pmid` as raw efetch XML.
    pub async fn efetch_abstract_xml(&self, pmid: &str) -> Result<String, DeepGeneError> {
        let pmid = pmid.trim();
        if pmid.is_empty() || !pmid.chars().all(|c| c.is_ascii_digit()) {
            return Err(DeepGeneError::InvalidArgument(format!(
                "PMID must be numeric, got '{pmid}'"
            )));
        }

        let req = self.client.get(self.endpoint("efetch.fcgi")).query(&[
            ("db", "pubmed"),
            ("id", pmid),
            ("retmode", "xml"),
            ("rettype", "abstract"),
        ]);
        let req = crate::sources::append_ncbi_api_key(req, self.api_key.as_deref());
        crate::sources::get_text(req, EUTILS_API).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn efetch_sends_pubmed_abstract_params() {
        let server = MockServer::start().await;
        let client = EutilsClient::new_for_test(server.uri(), None).unwrap();

        Mock::given(method("GET"))
            .and(path("/efetch.fcgi"))
            .and(query_param("db", "pubmed"))
            .and(query_param("id", "12345678"))
            .and(query_param("retmode", "xml"))
            .and(query_param("rettype", "abstract"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<PubmedArticleSet></PubmedArticleSet>", "text/xml"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let xml = client.efetch_abstract_xml("12345678").await.unwrap();
        assert!(xml.contains("PubmedArticleSet"));
    }

    #[tokio::test]
    async fn efetch_appends_api_key_when_configured() {
        let server = MockServer::start().await;
        let client =
            EutilsClient::new_for_test(server.uri(), Some("secret-key".into())).unwrap();

        Mock::given(method("GET"))
            .and(path("/efetch.fcgi"))
            .and(query_param("api_key", "secret-key"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<xml/>"))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(client.efetch_abstract_xml("1").await.unwrap(), "<xml/>");
    }

    #[tokio::test]
    async fn efetch_maps_http_failure_to_api_error() {
        let server = MockServer::start().await;
        let client = EutilsClient::new_for_test(server.uri(), None).unwrap();

        Mock::given(method("GET"))
            .and(path("/efetch.fcgi"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client.efetch_abstract_xml("42").await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("eutils"));
        assert!(msg.contains("429"));
    }

    #[tokio::test]
    async fn efetch_rejects_non_numeric_pmid() {
        let client = EutilsClient::new_for_test("http://127.0.0.1".into(), None).unwrap();
        let err = client.efetch_abstract_xml("PMC123").await.unwrap_err();
        assert!(matches!(err, DeepGeneError::InvalidArgument(_)));
    }
}
