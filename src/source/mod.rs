use std::path::Path;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Serialize;

use crate::config::ResolvedServer;
use crate::core::{RawViolation, ViolationsPage};

pub const VIOLATIONS_ENDPOINT: &str = "/xray/api/v1/violations";

/// Query parameters for the one bounded page the tool requests. The
/// service is asked for severity ordering; the pipeline deliberately does
/// not re-sort on top of it.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub severities: Vec<String>,
    pub page_limit: u32,
}

#[derive(Debug, Serialize)]
struct ViolationsQuery<'a> {
    filters: Filters<'a>,
    pagination: Pagination,
}

#[derive(Debug, Serialize)]
struct Filters<'a> {
    severities: &'a [String],
    violation_type: &'static str,
}

#[derive(Debug, Serialize)]
struct Pagination {
    order_by: &'static str,
    limit: u32,
}

/// Reads violations from a local JSON document of shape `{"data": [...]}`.
pub fn from_file(path: &Path) -> Result<Vec<RawViolation>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read violations file: {}", path.display()))?;
    let page: ViolationsPage = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse violations file: {}", path.display()))?;
    Ok(page.data)
}

/// Fetches one page of security violations from the scanning service.
pub fn fetch(
    client: &Client,
    server: &ResolvedServer,
    req: &FetchRequest,
) -> Result<Vec<RawViolation>> {
    let url = format!("{}{VIOLATIONS_ENDPOINT}", server.url);
    let query = ViolationsQuery {
        filters: Filters {
            severities: &req.severities,
            violation_type: "security",
        },
        pagination: Pagination {
            order_by: "severity",
            limit: req.page_limit,
        },
    };

    let response = client
        .post(&url)
        .basic_auth(&server.username, Some(&server.password))
        .json(&query)
        .send()
        .with_context(|| format!("violations request failed: {url}"))?
        .error_for_status()
        .with_context(|| format!("violations request rejected: {url}"))?;

    let page: ViolationsPage = response
        .json()
        .with_context(|| format!("failed to decode violations response: {url}"))?;
    Ok(page.data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn temp_file(contents: &str) -> PathBuf {
        static SEQ: AtomicU64 = AtomicU64::new(0);
        let seq = SEQ.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!(
            "cvewatch-source-test-{}-{seq}.json",
            std::process::id()
        ));
        std::fs::write(&path, contents).expect("write");
        path
    }

    #[test]
    fn from_file_reads_the_data_array() {
        let path = temp_file(
            r#"{"data": [{"watch_name": "prod-policy", "issues": [{"cve": "CVE-1"}]}]}"#,
        );
        let violations = from_file(&path).expect("load");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].watch_name.as_deref(), Some("prod-policy"));
        assert_eq!(violations[0].issues[0].cve.as_deref(), Some("CVE-1"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn from_file_treats_a_missing_data_key_as_empty() {
        let path = temp_file(r#"{"total_violations": 0}"#);
        let violations = from_file(&path).expect("load");
        assert!(violations.is_empty());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn from_file_rejects_malformed_json() {
        let path = temp_file("{not json");
        assert!(from_file(&path).is_err());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn fetch_posts_the_fixed_filter_payload() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(VIOLATIONS_ENDPOINT)
                .header_exists("authorization")
                .json_body(serde_json::json!({
                    "filters": {
                        "severities": ["Critical"],
                        "violation_type": "security"
                    },
                    "pagination": {
                        "order_by": "severity",
                        "limit": 100
                    }
                }));
            then.status(200).json_body(serde_json::json!({
                "data": [
                    {
                        "watch_name": "prod-policy",
                        "impacted_artifact": {"component_id": "generic://app.jar"},
                        "issues": [{"cve": "CVE-2023-0001"}]
                    }
                ]
            }));
        });

        let resolved = ResolvedServer {
            url: server.base_url(),
            username: "svc".to_string(),
            password: "secret".to_string(),
        };
        let client = Client::new();
        let req = FetchRequest {
            severities: vec!["Critical".to_string()],
            page_limit: 100,
        };

        let violations = fetch(&client, &resolved, &req).expect("fetch");
        mock.assert();
        assert_eq!(violations.len(), 1);
        assert_eq!(
            violations[0].impacted_artifact.component_id.as_deref(),
            Some("generic://app.jar")
        );
    }

    #[test]
    fn fetch_surfaces_non_2xx_as_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(VIOLATIONS_ENDPOINT);
            then.status(500);
        });

        let resolved = ResolvedServer {
            url: server.base_url(),
            username: "svc".to_string(),
            password: "secret".to_string(),
        };
        let req = FetchRequest {
            severities: vec!["Critical".to_string()],
            page_limit: 100,
        };

        assert!(fetch(&Client::new(), &resolved, &req).is_err());
    }
}
