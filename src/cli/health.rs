use std::sync::OnceLock;
use std::time::{Duration, Instant};

use crate::error::DeepGeneError;
use crate::sources::eutils::EutilsClient;
use crate::sources::gemini::GeminiClient;
use crate::sources::mygene::MyGeneClient;

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthRow {
    pub api: String,
    pub status: String,
    pub latency: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthReport {
    pub healthy: usize,
    pub total: usize,
    pub rows: Vec<HealthRow>,
}

impl HealthReport {
    fn from_rows(rows: Vec<HealthRow>) -> Self {
        let healthy = rows.iter().filter(|r| r.status == "ok").count();
        let total = rows.iter().filter(|r| r.status != "skipped").count();
        Self {
            healthy,
            total,
            rows,
        }
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# DeepGene Health Check\n\n");
        out.push_str("| API | Status | Latency |\n");
        out.push_str("|-----|--------|---------|\n");
        for row in &self.rows {
            out.push_str(&format!(
                "| {} | {} | {} |\n",
                row.api, row.status, row.latency
            ));
        }
        out.push_str(&format!(
            "\nStatus: {}/{} APIs healthy\n",
            self.healthy, self.total
        ));
        out
    }
}

#[derive(Debug, Clone)]
struct HealthTarget {
    api: &'static str,
    url: String,
    header: Option<(&'static str, String)>,
}

impl HealthTarget {
    fn get(api: &'static str, url: String) -> Self {
        Self {
            api,
            url,
            header: None,
        }
    }
}

async fn check_one(client: reqwest::Client, target: HealthTarget) -> HealthRow {
    let start = Instant::now();
    let mut req = client
        .get(&target.url)
        .header(reqwest::header::ACCEPT, "application/json");
    if let Some((name, value)) = target.header.as_ref() {
        req = req.header(*name, value);
    }

    match req.send().await {
        Ok(resp) => {
            let status = resp.status();
            let elapsed = start.elapsed().as_millis();
            if status.is_success() {
                HealthRow {
                    api: target.api.to_string(),
                    status: "ok".into(),
                    latency: format!("{elapsed}ms"),
                }
            } else {
                HealthRow {
                    api: target.api.to_string(),
                    status: "error".into(),
                    latency: format!("{elapsed}ms (HTTP {})", status.as_u16()),
                }
            }
        }
        Err(err) => {
            let reason = if err.is_timeout() {
                "timeout"
            } else if err.is_connect() {
                "connect"
            } else {
                "error"
            };
            HealthRow {
                api: target.api.to_string(),
                status: "error".into(),
                latency: reason.into(),
            }
        }
    }
}

fn health_http_client() -> Result<reqwest::Client, DeepGeneError> {
    static HEALTH_HTTP_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

    if let Some(client) = HEALTH_HTTP_CLIENT.get() {
        return Ok(client.clone());
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .connect_timeout(Duration::from_secs(5))
        .user_agent(concat!("deepgene/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(DeepGeneError::HttpClientInit)?;

    match HEALTH_HTTP_CLIENT.set(client.clone()) {
        Ok(()) => Ok(client),
        Err(_) => HEALTH_HTTP_CLIENT
            .get()
            .cloned()
            .ok_or_else(|| DeepGeneError::Api {
                api: "health".into(),
                message: "Health HTTP client initialization race".into(),
            }),
    }
}

async fn check_targets(client: reqwest::Client, targets: Vec<HealthTarget>) -> Vec<HealthRow> {
    let handles = targets
        .into_iter()
        .map(|target| {
            let api = target.api;
            (api, tokio::spawn(check_one(client.clone(), target)))
        })
        .collect::<Vec<_>>();

    let mut rows = Vec::with_capacity(handles.len());
    for (api, handle) in handles {
        rows.push(handle.await.unwrap_or_else(|_| HealthRow {
            api: api.to_string(),
            status: "error".into(),
            latency: "aborted".into(),
        }));
    }
    rows
}

/// Runs connectivity checks for MyGene.info, PubMed E-utilities and, when a
/// key is configured, the Gemini endpoint.
///
/// # Errors
///
/// Returns an error when an HTTP client cannot be created.
pub async fn check() -> Result<HealthReport, DeepGeneError> {
    let client = health_http_client()?;
    let mygene = MyGeneClient::new()?;
    let eutils = EutilsClient::new()?;

    let mut targets = vec![
        HealthTarget::get(
            "MyGene",
            format!(
                "{}/query?q=symbol:CTNND2&species=human&size=1",
                mygene.base().trim_end_matches('/')
            ),
        ),
        HealthTarget::get(
            "PubMed E-utilities",
            format!(
                "{}/einfo.fcgi?db=pubmed&retmode=json",
                eutils.base().trim_end_matches('/')
            ),
        ),
    ];

    let gemini = GeminiClient::from_env().ok();
    if let Some(gemini) = gemini.as_ref() {
        targets.push(HealthTarget {
            api: "Gemini",
            url: format!(
                "{}/models/{}",
                gemini.base().trim_end_matches('/'),
                gemini.model()
            ),
            header: Some(("x-goog-api-key", gemini.api_key().to_string())),
        });
    }

    let mut rows = check_targets(client, targets).await;
    if gemini.is_none() {
        rows.push(HealthRow {
            api: "Gemini".into(),
            status: "skipped".into(),
            latency: "GOOGLE_API_KEY not set".into(),
        });
    }
    Ok(HealthReport::from_rows(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn check_targets_reports_status_per_api_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/einfo.fcgi"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/models/gemini-test"))
            .and(header("x-goog-api-key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let targets = vec![
            HealthTarget::get("MyGene", format!("{}/query?q=x", server.uri())),
            HealthTarget::get("PubMed E-utilities", format!("{}/einfo.fcgi", server.uri())),
            HealthTarget {
                api: "Gemini",
                url: format!("{}/models/gemini-test", server.uri()),
                header: Some(("x-goog-api-key", "secret".into())),
            },
            HealthTarget::get("Offline", "http://127.0.0.1:9/".into()),
        ];
        let rows = check_targets(reqwest::Client::new(), targets).await;

        let apis: Vec<&str> = rows.iter().map(|r| r.api.as_str()).collect();
        assert_eq!(apis, vec!["MyGene", "PubMed E-utilities", "Gemini", "Offline"]);
        assert_eq!(rows[0].status, "ok");
        assert_eq!(rows[1].status, "error");
        assert!(rows[1].latency.contains("HTTP 503"));
        assert_eq!(rows[2].status, "ok");
        assert_eq!(rows[3].status, "error");
    }

    #[test]
    fn report_excludes_skipped_rows_from_total() {
        let report = HealthReport::from_rows(vec![
            HealthRow {
                api: "MyGene".into(),
                status: "ok".into(),
                latency: "12ms".into(),
            },
            HealthRow {
                api: "Gemini".into(),
                status: "skipped".into(),
                latency: "GOOGLE_API_KEY not set".into(),
            },
        ]);
        assert_eq!((report.healthy, report.total), (1, 1));

        let md = report.to_markdown();
        assert!(md.starts_with("# DeepGene Health Check\n"));
        assert!(md.contains("| Gemini | skipped | GOOGLE_API_KEY not set |"));
        assert!(md.contains("Status: 1/1 APIs healthy"));
    }
}
