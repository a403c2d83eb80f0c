use crate::error::DeepGeneError;

const WEBPAGE_API: &str = "webpage";
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (compatible; DeepGene/1.0; Research Tool)";

/// Fetches arbitrary article landing pages for abstract scraping.
pub struct WebpageClient {
    client: reqwest_middleware::ClientWithMiddleware,
}

impl WebpageClient {
    pub fn new() -> Result<Self, DeepGeneError> {
        Ok(Self {
            client: crate::sources::literature_client()?,
        })
    }

    #[cfg(test)]
    pub(crate) fn new_for_test() -> Result<Self, DeepGeneError> {
        Ok(Self::with_client_for_test(crate::sources::test_client()?))
    }

    #[cfg(test)]
    pub(crate) fn with_client_for_test(client: reqwest_middleware::ClientWithMiddleware) -> Self {
        Self { client }
    }

    /// Returns the page body as text. Non-2xx statuses are errors.
    pub async fn fetch_html(&self, url: &str) -> Result<String, DeepGeneError> {
        let parsed = reqwest::Url::parse(url.trim()).map_err(|err| {
            DeepGeneError::InvalidArgument(format!("Invalid URL '{url}': {err}"))
        })?;
        let req = self
            .client
            .get(parsed)
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT);
        crate::sources::get_text(req, WEBPAGE_API).await
    }
}
