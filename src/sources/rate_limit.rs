use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use http::Extensions;
use reqwest::Url;
use reqwest_middleware::{Middleware, Next};
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};

use crate::sources::{eutils, mygene};

const MYGENE_SPACING: Duration = Duration::from_millis(100);
const ORIGIN_SPACING: Duration = Duration::from_millis(50);

/// Minimum spacing between requests sent to one upstream base URL.
#[derive(Clone, Debug)]
pub(crate) struct Pace {
    upstream: &'static str,
    base: Cow<'static, str>,
    spacing: Duration,
}

impl Pace {
    pub(crate) fn new(upstream: &'static str, base: Cow<'static, str>, spacing: Duration) -> Self {
        Self {
            upstream,
            base,
            spacing,
        }
    }
}

/// Hands out send slots per bucket: one bucket per known upstream, and one per
/// origin for journal pages and other unlisted hosts.
#[derive(Debug)]
pub(crate) struct Pacer {
    paces: Vec<Pace>,
    origin_spacing: Duration,
    next_free: Mutex<HashMap<String, Instant>>,
}

/// E-utilities allow 3 req/sec anonymously and 10 req/sec with NCBI_API_KEY.
fn eutils_spacing(has_ncbi_api_key: bool) -> Duration {
    if has_ncbi_api_key {
        Duration::from_millis(100)
    } else {
        Duration::from_millis(334)
    }
}

impl Pacer {
    fn from_env() -> Self {
        let has_ncbi_api_key = crate::sources::ncbi_api_key().is_some();
        Self::new(
            vec![
                Pace::new(
                    "eutils",
                    crate::sources::env_base(eutils::EUTILS_BASE, eutils::EUTILS_BASE_ENV),
                    eutils_spacing(has_ncbi_api_key),
                ),
                Pace::new(
                    "mygene",
                    crate::sources::env_base(mygene::MYGENE_BASE, mygene::MYGENE_BASE_ENV),
                    MYGENE_SPACING,
                ),
            ],
            ORIGIN_SPACING,
        )
    }

    pub(crate) fn new(paces: Vec<Pace>, origin_spacing: Duration) -> Self {
        Self {
            paces,
            origin_spacing,
            next_free: Mutex::new(HashMap::new()),
        }
    }

    fn bucket(&self, url: &Url) -> (String, Duration) {
        match self
            .paces
            .iter()
            .find(|pace| url.as_str().starts_with(pace.base.as_ref()))
        {
            Some(pace) => (pace.upstream.to_string(), pace.spacing),
            None => (url.origin().ascii_serialization(), self.origin_spacing),
        }
    }

    /// Claims the earliest free slot for `url` and books the next one.
    async fn reserve(&self, url: &Url) -> Instant {
        let (bucket, spacing) = self.bucket(url);
        let now = Instant::now();
        let mut next_free = self.next_free.lock().await;
        let slot = next_free
            .get(&bucket)
            .copied()
            .filter(|free| *free > now)
            .unwrap_or(now);
        next_free.insert(bucket, slot + spacing);
        slot
    }

    pub(crate) async fn pace(&self, url: &Url) {
        let slot = self.reserve(url).await;
        sleep_until(slot).await;
    }
}

fn global_pacer() -> Arc<Pacer> {
    static PACER: OnceLock<Arc<Pacer>> = OnceLock::new();
    PACER.get_or_init(|| Arc::new(Pacer::from_env())).clone()
}

/// Delays each outgoing request until its bucket's slot comes up.
#[derive(Clone, Debug)]
pub(crate) struct PacingMiddleware {
    pacer: Arc<Pacer>,
}

impl PacingMiddleware {
    pub(crate) fn new() -> Self {
        Self {
            pacer: global_pacer(),
        }
    }
}

#[async_trait::async_trait]
impl Middleware for PacingMiddleware {
    async fn handle(
        &self,
        req: reqwest::Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<reqwest::Response> {
        self.pacer.pace(req.url()).await;
        next.run(req, extensions).await
    }
}
