//! Source clients and shared HTTP utilities for gene metadata, literature, and generation APIs.

use std::borrow::Cow;
use std::sync::OnceLock;
use std::time::Duration;

use reqwest::header::HeaderValue;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use tracing::warn;

use crate::error::DeepGeneError;

pub(crate) mod eutils;
pub(crate) mod gemini;
pub(crate) mod mygene;
pub(crate) mod rate_limit;
pub(crate) mod webpage;

const ERROR_BODY_MAX_BYTES: usize = 2048;
pub(crate) const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;
/// Per-request bound for literature retrieval (efetch and journal pages).
pub(crate) const LITERATURE_TIMEOUT: Duration = Duration::from_secs(10);

static HTTP_CLIENT: OnceLock<ClientWithMiddleware> = OnceLock::new();
static LITERATURE_HTTP_CLIENT: OnceLock<ClientWithMiddleware> = OnceLock::new();
static GENERATION_HTTP_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

pub(crate) fn env_base(default: &'static str, env_var: &str) -> Cow<'static, str> {
    std::env::var(env_var)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(Cow::Owned)
        .unwrap_or_else(|| Cow::Borrowed(default))
}

pub(crate) fn env_value(env_var: &str) -> Option<String> {
    std::env::var(env_var)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub(crate) fn is_valid_gene_symbol(symbol: &str) -> bool {
    !symbol.is_empty()
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

pub(crate) fn ncbi_api_key() -> Option<String> {
    env_value("NCBI_API_KEY")
}

pub(crate) fn append_ncbi_api_key(req: RequestBuilder, api_key: Option<&str>) -> RequestBuilder {
    if let Some(key) = api_key {
        return req.query(&[("api_key", key)]);
    }
    req
}

/// Returns the shared metadata client with retry and rate-limit middleware.
///
/// - Retry: 3 attempts with exponential backoff for transient errors
/// - Pacing: minimum spacing per upstream, or per origin for other hosts
pub(crate) fn shared_client() -> Result<ClientWithMiddleware, DeepGeneError> {
    if let Some(client) = HTTP_CLIENT.get() {
        return Ok(client.clone());
    }

    let base_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(concat!("deepgene/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(DeepGeneError::HttpClientInit)?;

    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);

    let client = ClientBuilder::new(base_client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .with(rate_limit::PacingMiddleware::new())
        .build();

    match HTTP_CLIENT.set(client.clone()) {
        Ok(()) => Ok(client),
        Err(_) => HTTP_CLIENT.get().cloned().ok_or_else(|| DeepGeneError::Api {
            api: "http-client".into(),
            message: "Shared HTTP client initialization race".into(),
        }),
    }
}

/// Returns the shared literature client: 10 s bound, rate limited, never retried.
///
/// A failed literature step falls through to the next resolver strategy
/// instead of being attempted again.
pub(crate) fn literature_client() -> Result<ClientWithMiddleware, DeepGeneError> {
    if let Some(client) = LITERATURE_HTTP_CLIENT.get() {
        return Ok(client.clone());
    }

    let base_client = reqwest::Client::builder()
        .timeout(LITERATURE_TIMEOUT)
        .connect_timeout(LITERATURE_TIMEOUT)
        .user_agent(concat!("deepgene/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(DeepGeneError::HttpClientInit)?;

    let client = ClientBuilder::new(base_client)
        .with(rate_limit::PacingMiddleware::new())
        .build();

    match LITERATURE_HTTP_CLIENT.set(client.clone()) {
        Ok(()) => Ok(client),
        Err(_) => LITERATURE_HTTP_CLIENT
            .get()
            .cloned()
            .ok_or_else(|| DeepGeneError::Api {
                api: "http-client".into(),
                message: "Literature HTTP client initialization race".into(),
            }),
    }
}

/// Returns the shared generation client.
///
/// Only the connect phase is bounded: model calls may legitimately take
/// minutes and callers impose their own outer timeout if they need one.
pub(crate) fn generation_client() -> Result<reqwest::Client, DeepGeneError> {
    if let Some(client) = GENERATION_HTTP_CLIENT.get() {
        return Ok(client.clone());
    }

    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .user_agent(concat!("deepgene/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(DeepGeneError::HttpClientInit)?;

    match GENERATION_HTTP_CLIENT.set(client.clone()) {
        Ok(()) => Ok(client),
        Err(_) => GENERATION_HTTP_CLIENT
            .get()
            .cloned()
            .ok_or_else(|| DeepGeneError::Api {
                api: "http-client".into(),
                message: "Generation HTTP client initialization race".into(),
            }),
    }
}

/// Plain middleware client for wiremock-backed tests (no retry, no throttling).
#[cfg(test)]
pub(crate) fn test_client() -> Result<ClientWithMiddleware, DeepGeneError> {
    test_client_with_timeout(Duration::from_secs(10))
}

#[cfg(test)]
pub(crate) fn test_client_with_timeout(
    timeout: Duration,
) -> Result<ClientWithMiddleware, DeepGeneError> {
    let base = reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(5)))
        .user_agent(concat!("deepgene-test/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(DeepGeneError::HttpClientInit)?;
    Ok(ClientBuilder::new(base).build())
}

pub(crate) fn body_excerpt(bytes: &[u8]) -> String {
    let full = String::from_utf8_lossy(bytes);

    let truncated: &str = if full.len() > ERROR_BODY_MAX_BYTES {
        let mut end = ERROR_BODY_MAX_BYTES;
        while end > 0 && !full.is_char_boundary(end) {
            end -= 1;
        }
        &full[..end]
    } else {
        full.as_ref()
    };

    let mut s = truncated.trim().replace(['\n', '\r', '\t'], " ");
    if full.len() > ERROR_BODY_MAX_BYTES {
        s.push_str(" …");
    }
    s
}

pub(crate) fn ensure_json_content_type(
    api: &str,
    content_type: Option<&HeaderValue>,
    body: &[u8],
) -> Result<(), DeepGeneError> {
    let Some(content_type) = content_type else {
        return Ok(());
    };

    let raw = match content_type.to_str() {
        Ok(v) => v.trim(),
        Err(_) => {
            warn!(
                source = api,
                "Response content-type header was not valid UTF-8; attempting JSON parse"
            );
            return Ok(());
        }
    };
    if raw.is_empty() {
        return Ok(());
    }

    let media_type = raw
        .split(';')
        .next()
        .map(str::trim)
        .unwrap_or_default()
        .to_ascii_lowercase();
    let is_html = matches!(media_type.as_str(), "text/html" | "application/xhtml+xml");
    if is_html {
        return Err(DeepGeneError::Api {
            api: api.to_string(),
            message: format!(
                "Unexpected HTML response (content-type: {raw}): {}",
                body_excerpt(body)
            ),
        });
    }

    let is_json = media_type == "application/json"
        || media_type == "text/json"
        || media_type.ends_with("+json");
    if !is_json {
        warn!(
            source = api,
            content_type = raw,
            "Unexpected non-JSON content type; attempting JSON parse for compatibility"
        );
    }

    Ok(())
}

pub(crate) async fn read_limited_body(
    mut resp: reqwest::Response,
    api: &str,
) -> Result<Vec<u8>, DeepGeneError> {
    let mut body: Vec<u8> = Vec::new();

    while let Some(chunk) = resp.chunk().await? {
        let next_len = body.len().saturating_add(chunk.len());
        if next_len > DEFAULT_MAX_BODY_BYTES {
            return Err(DeepGeneError::Api {
                api: api.to_string(),
                message: format!("Response body exceeded {DEFAULT_MAX_BODY_BYTES} bytes"),
            });
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}

/// Sends `req` and returns the body text, mapping non-2xx statuses to [`DeepGeneError::Api`].
pub(crate) async fn get_text(req: RequestBuilder, api: &str) -> Result<String, DeepGeneError> {
    let resp = req.send().await?;
    let status = resp.status();
    let bytes = read_limited_body(resp, api).await?;
    if !status.is_success() {
        let excerpt = body_excerpt(&bytes);
        return Err(DeepGeneError::Api {
            api: api.to_string(),
            message: format!("HTTP {status}: {excerpt}"),
        });
    }
    Ok(String::from_utf8_lossy(&bytes).to_string())
}
