//! PostgREST client for the opportunity table.
//!
//! Blocking reqwest client (no Tokio runtime required). Listing pages
//! through the table until the reported total is reached; delete and count
//! are one request each. No retries: a failed maintenance run is re-invoked
//! by hand.

use log::debug;
use reqwest::blocking::{RequestBuilder, Response};
use url::Url;

use oppsweep_reconcile::store::{OP_COUNT, OP_DELETE, OP_LIST};
use oppsweep_reconcile::{Opportunity, OpportunityId, OpportunityStore, ReconcileError};

use crate::config::StoreConfig;

const USER_AGENT: &str = concat!("oppsweep/", env!("CARGO_PKG_VERSION"));
const SELECT_COLUMNS: &str = "id,name,deadline,is_active";
/// Rows requested per list page. The server may cap pages lower
/// (Supabase `max-rows`); paging follows what it actually returns.
const PAGE_SIZE: usize = 1000;

/// Store adapter (blocking). Constructed once per run and passed to the engine.
#[derive(Clone)]
pub struct StoreClient {
    http: reqwest::blocking::Client,
    table_url: Url,
    key: String,
}

impl StoreClient {
    pub fn new(config: &StoreConfig) -> Result<Self, ReconcileError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ReconcileError::Connection {
                operation: "create HTTP client",
                message: e.to_string(),
            })?;

        let mut table_url = config.url.clone();
        table_url
            .path_segments_mut()
            .map_err(|_| ReconcileError::Connection {
                operation: "create HTTP client",
                message: format!("store URL {} cannot carry a path", config.url),
            })?
            .pop_if_empty()
            .extend(["rest", "v1", config.table.as_str()]);

        Ok(Self {
            http,
            table_url,
            key: config.key.clone(),
        })
    }

    pub fn table_url(&self) -> &str {
        self.table_url.as_str()
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn send(&self, operation: &'static str, req: RequestBuilder) -> Result<Response, ReconcileError> {
        let response = req
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .send()
            .map_err(|e| ReconcileError::Connection {
                operation,
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        if response.status().is_success() {
            return Ok(response);
        }

        let body = response.text().unwrap_or_default();
        let detail = extract_postgrest_error(&body, status);

        // A rejected key means we never got as far as the query. PostgREST
        // also answers 401 for role permission failures; those carry a
        // SQLSTATE code and are query errors.
        if status == 401 && is_auth_failure(&body) {
            return Err(ReconcileError::Connection {
                operation,
                message: format!("credentials rejected (HTTP {}): {}", status, detail),
            });
        }

        Err(ReconcileError::Query {
            operation,
            status: Some(status),
            detail,
        })
    }

    /// One page of rows starting at `offset`, with the table total when the
    /// server reports it.
    fn list_page(&self, offset: usize) -> Result<(Vec<Opportunity>, Option<u64>), ReconcileError> {
        debug!(
            "GET {}?select={}&order=id.asc&offset={}&limit={}",
            self.table_url, SELECT_COLUMNS, offset, PAGE_SIZE
        );
        let req = self
            .http
            .get(self.table_url.clone())
            .query(&[("select", SELECT_COLUMNS), ("order", "id.asc")])
            .query(&[("offset", offset), ("limit", PAGE_SIZE)])
            .header("Prefer", "count=exact");
        let resp = self.send(OP_LIST, req)?;

        let total = resp
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total);

        let text = resp.text().map_err(|e| ReconcileError::Connection {
            operation: OP_LIST,
            message: format!("failed to read response body: {}", e),
        })?;
        let rows = serde_json::from_str(&text).map_err(|e| ReconcileError::Query {
            operation: OP_LIST,
            status: None,
            detail: format!(
                "unexpected response: {} (body: {})",
                e,
                snippet(&text),
            ),
        })?;
        Ok((rows, total))
    }
}

impl OpportunityStore for StoreClient {
    fn list_opportunities(&self) -> Result<Vec<Opportunity>, ReconcileError> {
        let mut rows: Vec<Opportunity> = Vec::new();
        loop {
            let (page, total) = self.list_page(rows.len())?;
            let page_len = page.len();
            rows.extend(page);

            match total {
                Some(total) if rows.len() as u64 >= total => break,
                Some(total) if page_len == 0 => {
                    return Err(ReconcileError::Query {
                        operation: OP_LIST,
                        status: None,
                        detail: format!(
                            "incomplete listing: received {} of {} rows",
                            rows.len(),
                            total
                        ),
                    });
                }
                Some(_) => {}
                None if page_len < PAGE_SIZE => break,
                None => {}
            }
        }
        debug!("listed {} rows", rows.len());
        Ok(rows)
    }

    fn delete_opportunities(&self, ids: &[OpportunityId]) -> Result<(), ReconcileError> {
        let filter = in_filter(ids);
        debug!("DELETE {}?id={} ({} ids)", self.table_url, filter, ids.len());
        let req = self
            .http
            .delete(self.table_url.clone())
            .query(&[("id", filter.as_str())])
            .header("Prefer", "return=minimal");
        self.send(OP_DELETE, req)?;
        Ok(())
    }

    fn count_opportunities(&self) -> Result<u64, ReconcileError> {
        debug!("HEAD {}?select=id (count=exact)", self.table_url);
        let req = self
            .http
            .head(self.table_url.clone())
            .query(&[("select", "id")])
            .header("Prefer", "count=exact");
        let resp = self.send(OP_COUNT, req)?;

        let header = resp
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        parse_content_range_total(header).ok_or_else(|| ReconcileError::Query {
            operation: OP_COUNT,
            status: None,
            detail: format!("missing or malformed Content-Range header {:?}", header),
        })
    }
}

// ── Free functions ──────────────────────────────────────────────────

/// PostgREST `in.(…)` operand. Text ids are double-quoted so commas,
/// dots or parentheses inside them cannot split the list.
pub fn in_filter(ids: &[OpportunityId]) -> String {
    let items: Vec<String> = ids
        .iter()
        .map(|id| match id {
            OpportunityId::Int(n) => n.to_string(),
            OpportunityId::Text(s) => {
                format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
            }
        })
        .collect();
    format!("in.({})", items.join(","))
}

/// Total from a `Content-Range` header: `0-24/3573` or `*/0`.
pub fn parse_content_range_total(header: &str) -> Option<u64> {
    let (_, total) = header.trim().rsplit_once('/')?;
    total.parse().ok()
}

/// Best-effort detail from a PostgREST error body:
/// `{"code": "...", "message": "...", "details": "...", "hint": "..."}`.
fn extract_postgrest_error(body: &str, status: u16) -> String {
    let json: serde_json::Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => {
            let trimmed = body.trim();
            return if trimmed.is_empty() {
                format!("HTTP {}", status)
            } else {
                snippet(trimmed)
            };
        }
    };

    let message = json["message"]
        .as_str()
        .or_else(|| json["error"].as_str())
        .or_else(|| json["msg"].as_str())
        .map(String::from)
        .unwrap_or_else(|| format!("HTTP {}", status));

    let mut extras = Vec::new();
    if let Some(code) = json["code"].as_str() {
        extras.push(format!("code {}", code));
    }
    for field in ["details", "hint"] {
        if let Some(v) = json[field].as_str().filter(|s| !s.is_empty()) {
            extras.push(format!("{}: {}", field, v));
        }
    }

    if extras.is_empty() {
        message
    } else {
        format!("{} ({})", message, extras.join("; "))
    }
}

/// Whether a 401 body describes a key problem rather than a role lacking
/// table privileges. Key problems come back without a code or with a
/// PostgREST JWT code (`PGRST3xx`).
fn is_auth_failure(body: &str) -> bool {
    let code = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| json["code"].as_str().map(String::from));
    match code {
        None => true,
        Some(code) => code.starts_with("PGRST3"),
    }
}

/// First 200 characters, for error messages.
fn snippet(text: &str) -> String {
    text.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use httpmock::Method::HEAD;

    fn client_for(server: &MockServer) -> StoreClient {
        let config = StoreConfig::new(&server.base_url(), "test-key", "funding_opportunities").unwrap();
        StoreClient::new(&config).unwrap()
    }

    // ── Unit tests ──────────────────────────────────────────────────

    #[test]
    fn test_in_filter() {
        assert_eq!(
            in_filter(&[OpportunityId::Int(1), OpportunityId::Int(42)]),
            "in.(1,42)"
        );
        assert_eq!(
            in_filter(&[OpportunityId::Text("a1b2".into()), OpportunityId::Text("x,\"y\"".into())]),
            "in.(\"a1b2\",\"x,\\\"y\\\"\")"
        );
    }

    #[test]
    fn test_parse_content_range_total() {
        assert_eq!(parse_content_range_total("0-24/3573"), Some(3573));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-9/*"), None);
        assert_eq!(parse_content_range_total(""), None);
    }

    #[test]
    fn test_extract_postgrest_error() {
        let body = r#"{"code":"42501","details":null,"hint":null,"message":"permission denied for table funding_opportunities"}"#;
        assert_eq!(
            extract_postgrest_error(body, 403),
            "permission denied for table funding_opportunities (code 42501)"
        );
        assert_eq!(extract_postgrest_error("", 502), "HTTP 502");
        assert_eq!(extract_postgrest_error("Bad Gateway", 502), "Bad Gateway");
    }

    #[test]
    fn test_table_url_trims_trailing_slash() {
        let config = StoreConfig::new("https://abcd.supabase.co/", "k", "funding_opportunities").unwrap();
        let client = StoreClient::new(&config).unwrap();
        assert_eq!(client.table_url(), "https://abcd.supabase.co/rest/v1/funding_opportunities");
    }

    #[test]
    fn test_table_name_is_path_encoded() {
        let config = StoreConfig::new("https://abcd.supabase.co/base/", "k", "grants?x=1#frag/2").unwrap();
        let client = StoreClient::new(&config).unwrap();
        assert_eq!(
            client.table_url(),
            "https://abcd.supabase.co/base/rest/v1/grants%3Fx=1%23frag%2F2"
        );
    }

    // ── httpmock tests ──────────────────────────────────────────────

    #[test]
    fn test_list_sends_projection_and_auth() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/rest/v1/funding_opportunities")
                .query_param("select", "id,name,deadline,is_active")
                .header("apikey", "test-key")
                .header("Authorization", "Bearer test-key");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(serde_json::json!([
                    {"id": 1, "name": "Seed Grant", "deadline": "2020-01-01", "is_active": true},
                    {"id": 2, "name": null, "deadline": null, "is_active": false}
                ]));
        });

        let rows = client_for(&server).list_opportunities().unwrap();

        mock.assert();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, OpportunityId::Int(1));
        assert_eq!(rows[1].is_active, Some(false));
    }

    #[test]
    fn test_list_rejects_non_array_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/rest/v1/funding_opportunities");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(serde_json::json!({"rows": []}));
        });

        let err = client_for(&server).list_opportunities().unwrap_err();
        assert!(matches!(err, ReconcileError::Query { status: None, .. }), "{err:?}");
        assert_eq!(err.operation(), OP_LIST);
    }

    #[test]
    fn test_list_bad_key_is_connection_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/rest/v1/funding_opportunities");
            then.status(401)
                .json_body(serde_json::json!({"message": "Invalid API key"}));
        });

        let err = client_for(&server).list_opportunities().unwrap_err();
        match err {
            ReconcileError::Connection { message, .. } => {
                assert!(message.contains("credentials rejected (HTTP 401)"), "{message}");
                assert!(message.contains("Invalid API key"), "{message}");
            }
            other => panic!("expected connection error, got {other:?}"),
        }
    }

    #[test]
    fn test_list_expired_jwt_is_connection_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/rest/v1/funding_opportunities");
            then.status(401).json_body(serde_json::json!({
                "code": "PGRST301",
                "message": "JWT expired"
            }));
        });

        let err = client_for(&server).list_opportunities().unwrap_err();
        assert!(matches!(err, ReconcileError::Connection { .. }), "{err:?}");
    }

    #[test]
    fn test_delete_role_without_privilege_is_query_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(DELETE).path("/rest/v1/funding_opportunities");
            then.status(401).json_body(serde_json::json!({
                "code": "42501",
                "details": null,
                "hint": null,
                "message": "permission denied for table funding_opportunities"
            }));
        });

        let err = client_for(&server)
            .delete_opportunities(&[OpportunityId::Int(1)])
            .unwrap_err();
        assert_eq!(
            err,
            ReconcileError::Query {
                operation: OP_DELETE,
                status: Some(401),
                detail: "permission denied for table funding_opportunities (code 42501)".into(),
            }
        );
    }

    #[test]
    fn test_list_follows_pages_to_reported_total() {
        let server = MockServer::start();
        // Server caps pages at two rows, below the requested limit.
        let first = server.mock(|when, then| {
            when.method(GET)
                .path("/rest/v1/funding_opportunities")
                .query_param("offset", "0")
                .query_param("limit", "1000")
                .query_param("order", "id.asc")
                .header("Prefer", "count=exact");
            then.status(206)
                .header("Content-Range", "0-1/3")
                .json_body(serde_json::json!([
                    {"id": 1, "deadline": "2020-01-01"},
                    {"id": 2, "is_active": false}
                ]));
        });
        let second = server.mock(|when, then| {
            when.method(GET)
                .path("/rest/v1/funding_opportunities")
                .query_param("offset", "2");
            then.status(206)
                .header("Content-Range", "2-2/3")
                .json_body(serde_json::json!([{"id": 3, "is_active": true}]));
        });

        let rows = client_for(&server).list_opportunities().unwrap();

        first.assert_calls(1);
        second.assert_calls(1);
        let ids: Vec<OpportunityId> = rows.into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![OpportunityId::Int(1), OpportunityId::Int(2), OpportunityId::Int(3)]);
    }

    #[test]
    fn test_list_short_of_total_is_query_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/rest/v1/funding_opportunities")
                .query_param("offset", "0");
            then.status(206)
                .header("Content-Range", "0-0/1500")
                .json_body(serde_json::json!([{"id": 1}]));
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/rest/v1/funding_opportunities")
                .query_param("offset", "1");
            then.status(200)
                .header("Content-Range", "*/1500")
                .json_body(serde_json::json!([]));
        });

        let err = client_for(&server).list_opportunities().unwrap_err();
        assert!(matches!(err, ReconcileError::Query { status: None, .. }), "{err:?}");
        assert!(err.to_string().contains("received 1 of 1500 rows"), "{err}");
    }

    #[test]
    fn test_list_missing_table_is_query_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/rest/v1/funding_opportunities");
            then.status(404).json_body(serde_json::json!({
                "code": "42P01",
                "details": null,
                "hint": null,
                "message": "relation \"public.funding_opportunities\" does not exist"
            }));
        });

        let err = client_for(&server).list_opportunities().unwrap_err();
        assert_eq!(
            err,
            ReconcileError::Query {
                operation: OP_LIST,
                status: Some(404),
                detail: "relation \"public.funding_opportunities\" does not exist (code 42P01)".into(),
            }
        );
    }

    #[test]
    fn test_unreachable_store_is_connection_error() {
        // Port 9 (discard) on localhost: nothing listens there in CI.
        let config = StoreConfig::new("http://127.0.0.1:9", "k", "funding_opportunities").unwrap();
        let client = StoreClient::new(&config).unwrap();
        let err = client.list_opportunities().unwrap_err();
        assert!(matches!(err, ReconcileError::Connection { .. }), "{err:?}");
    }

    #[test]
    fn test_delete_uses_single_in_filter() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(DELETE)
                .path("/rest/v1/funding_opportunities")
                .query_param("id", "in.(1,3,2)")
                .header("Prefer", "return=minimal")
                .header("apikey", "test-key");
            then.status(204);
        });

        client_for(&server)
            .delete_opportunities(&[OpportunityId::Int(1), OpportunityId::Int(3), OpportunityId::Int(2)])
            .unwrap();

        mock.assert_calls(1);
    }

    #[test]
    fn test_delete_permission_denied() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(DELETE).path("/rest/v1/funding_opportunities");
            then.status(403).json_body(serde_json::json!({
                "code": "42501",
                "message": "permission denied for table funding_opportunities",
                "hint": "grant delete to the role"
            }));
        });

        let err = client_for(&server)
            .delete_opportunities(&[OpportunityId::Int(1)])
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("delete opportunities: store rejected request (HTTP 403)"), "{msg}");
        assert!(msg.contains("hint: grant delete to the role"), "{msg}");
    }

    #[test]
    fn test_count_reads_content_range() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(HEAD)
                .path("/rest/v1/funding_opportunities")
                .header("Prefer", "count=exact");
            then.status(200).header("Content-Range", "0-11/12");
        });

        let count = client_for(&server).count_opportunities().unwrap();

        mock.assert();
        assert_eq!(count, 12);
    }

    #[test]
    fn test_count_without_header_is_query_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(HEAD).path("/rest/v1/funding_opportunities");
            then.status(200);
        });

        let err = client_for(&server).count_opportunities().unwrap_err();
        assert!(err.to_string().contains("Content-Range"), "{err}");
    }
}
