//! Salesforce REST client. Logs in over SOAP with username and password,
//! pages SOQL results through `nextRecordsUrl` and logs in again once when
//! the session expires.

use std::sync::LazyLock;

use async_trait::async_trait;
use fedbot_core::config::SalesforceConfig;
use fedbot_core::{CaseRecord, CaseSource, FedBotError, Result};
use regex::Regex;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::{records, soql};

static SESSION_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<sessionId>([^<]+)</sessionId>").expect("static regex"));
static SERVER_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<serverUrl>(https?://[^/<]+)[^<]*</serverUrl>").expect("static regex"));
static FAULT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<faultstring>([^<]*)</faultstring>").expect("static regex"));

/// An authenticated API session.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub session_id: String,
    /// Scheme + host of the org's API endpoint.
    pub instance_url: String,
}

/// One page of a SOQL query response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryPage {
    #[serde(default)]
    total_size: u64,
    done: bool,
    #[serde(default)]
    records: Vec<serde_json::Value>,
    #[serde(default)]
    next_records_url: Option<String>,
}

/// REST error body entry.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiError {
    message: String,
    #[serde(default)]
    error_code: String,
}

enum Fetch {
    Page(QueryPage),
    Expired,
}

/// Salesforce case source.
pub struct SalesforceClient {
    config: SalesforceConfig,
    client: reqwest::Client,
    session: RwLock<Option<Session>>,
}

impl SalesforceClient {
    pub fn new(config: SalesforceConfig, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            config,
            client,
            session: RwLock::new(None),
        })
    }

    fn login_url(&self) -> String {
        format!(
            "{}/services/Soap/u/{}",
            self.config.login_url.trim_end_matches('/'),
            self.config.api_version
        )
    }

    /// Log in and cache the session.
    pub async fn login(&self) -> Result<Session> {
        let body = login_envelope(
            &self.config.username,
            &format!("{}{}", self.config.password, self.config.security_token),
        );
        let response = self
            .client
            .post(self.login_url())
            .header("Content-Type", "text/xml; charset=UTF-8")
            .header("SOAPAction", "login")
            .body(body)
            .send()
            .await
            .map_err(|e| FedBotError::Auth(format!("Salesforce login request failed: {e}")))?;

        let status = response.status();
        let xml = response.text().await?;
        let session = parse_login_response(&xml).map_err(|e| match e {
            FedBotError::Auth(msg) => FedBotError::Auth(format!("{msg} (HTTP {status})")),
            other => other,
        })?;

        tracing::info!("🔑 Salesforce session established ({})", session.instance_url);
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    async fn session(&self) -> Result<Session> {
        if let Some(s) = self.session.read().await.as_ref() {
            return Ok(s.clone());
        }
        self.login().await
    }

    /// Base for case links.
    async fn link_base(&self) -> Result<String> {
        match &self.config.link_base {
            Some(base) if !base.is_empty() => Ok(base.clone()),
            _ => Ok(self.session().await?.instance_url),
        }
    }

    async fn fetch(&self, session: &Session, url: &str, soql: Option<&str>) -> Result<Fetch> {
        let mut req = self.client.get(url).bearer_auth(&session.session_id);
        if let Some(q) = soql {
            req = req.query(&[("q", q)]);
        }
        let response = req
            .send()
            .await
            .map_err(|e| FedBotError::CaseSource(format!("Salesforce query failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Ok(Fetch::Expired);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FedBotError::CaseSource(describe_api_error(status, &body)));
        }
        let page: QueryPage = response
            .json()
            .await
            .map_err(|e| FedBotError::CaseSource(format!("Invalid query response: {e}")))?;
        Ok(Fetch::Page(page))
    }

    /// GET with one re-login if the session has expired.
    async fn fetch_page(&self, path_or_url: &str, soql: Option<&str>) -> Result<QueryPage> {
        let session = self.session().await?;
        let url = absolute(&session.instance_url, path_or_url);
        if let Fetch::Page(page) = self.fetch(&session, &url, soql).await? {
            return Ok(page);
        }

        tracing::info!("🔑 Salesforce session expired, logging in again");
        let session = self.login().await?;
        let url = absolute(&session.instance_url, path_or_url);
        match self.fetch(&session, &url, soql).await? {
            Fetch::Page(page) => Ok(page),
            Fetch::Expired => Err(FedBotError::Auth("session rejected right after login".into())),
        }
    }

    /// Run a SOQL query and follow pagination to the end.
    pub async fn query_all(&self, soql: &str) -> Result<Vec<serde_json::Value>> {
        let path = format!("/services/data/v{}/query", self.config.api_version);
        let mut page = self.fetch_page(&path, Some(soql)).await?;
        let total = page.total_size;
        let mut records = std::mem::take(&mut page.records);

        while !page.done {
            let Some(next) = page.next_records_url.take() else {
                tracing::warn!("⚠️ Query page not done but no nextRecordsUrl; stopping");
                break;
            };
            page = self.fetch_page(&next, None).await?;
            records.append(&mut page.records);
        }

        tracing::debug!("📥 SOQL returned {}/{} records", records.len(), total);
        Ok(records)
    }
}

#[async_trait]
impl CaseSource for SalesforceClient {
    fn name(&self) -> &str {
        "salesforce"
    }

    async fn queue_cases(&self, queue_id: &str) -> Result<Vec<CaseRecord>> {
        let raw = self.query_all(&soql::queue_query(queue_id)).await?;
        let base = self.link_base().await?;
        Ok(records::parse_cases(&raw, &base))
    }

    async fn idle_cases(&self, owners: &[String], min_idle_days: f64) -> Result<Vec<CaseRecord>> {
        if owners.is_empty() {
            return Ok(Vec::new());
        }
        let raw = self.query_all(&soql::idle_query(owners, min_idle_days)).await?;
        let base = self.link_base().await?;
        Ok(records::parse_cases(&raw, &base))
    }
}

fn absolute(instance_url: &str, path_or_url: &str) -> String {
    if path_or_url.starts_with("http://") || path_or_url.starts_with("https://") {
        path_or_url.to_string()
    } else {
        format!("{}{}", instance_url.trim_end_matches('/'), path_or_url)
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// SOAP `login` request envelope.
pub fn login_envelope(username: &str, password_and_token: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8" ?>
<env:Envelope xmlns:xsd="http://www.w3.org/2001/XMLSchema"
    xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
    xmlns:env="http://schemas.xmlsoap.org/soap/envelope/"
    xmlns:urn="urn:partner.soap.sforce.com">
  <env:Header>
    <urn:CallOptions><urn:client>fedbot</urn:client></urn:CallOptions>
  </env:Header>
  <env:Body>
    <n1:login xmlns:n1="urn:partner.soap.sforce.com">
      <n1:username>{}</n1:username>
      <n1:password>{}</n1:password>
    </n1:login>
  </env:Body>
</env:Envelope>"#,
        xml_escape(username),
        xml_escape(password_and_token)
    )
}

/// Extract the session from a SOAP login response.
pub fn parse_login_response(xml: &str) -> Result<Session> {
    if let Some(fault) = FAULT.captures(xml).and_then(|c| c.get(1)) {
        return Err(FedBotError::Auth(format!("Salesforce login fault: {}", fault.as_str())));
    }
    let session_id = SESSION_ID
        .captures(xml)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| FedBotError::Auth("no sessionId in login response".into()))?;
    let instance_url = SERVER_URL
        .captures(xml)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| FedBotError::Auth("no serverUrl in login response".into()))?;
    Ok(Session {
        session_id,
        instance_url,
    })
}

fn describe_api_error(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<Vec<ApiError>>(body) {
        Ok(errors) if !errors.is_empty() => {
            let joined = errors
                .iter()
                .map(|e| format!("{}: {}", e.error_code, e.message))
                .collect::<Vec<_>>()
                .join("; ");
            format!("Salesforce API error {status}: {joined}")
        }
        _ => format!("Salesforce API error {status}: {body}"),
    }
}
