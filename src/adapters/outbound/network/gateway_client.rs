use crate::compliance::domain::{QueryFailure, Row, Scalar};
use crate::ports::outbound::{QueryResult, TargetConnector, TargetSession};
use crate::shared::error::AuditError;
use crate::shared::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv6Addr;
use std::time::Duration;

/// Default port of the query gateway
pub const DEFAULT_GATEWAY_PORT: u16 = 1433;

/// Timeout for opening and closing sessions
const SESSION_TIMEOUT: Duration = Duration::from_secs(15);

/// Connection parameters for a SQL Server instance behind the query gateway
#[derive(Clone, PartialEq)]
pub struct GatewaySettings {
    pub host: String,
    pub port: u16,
    pub instance: String,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Use `https`; plain `http` is only meant for lab gateways
    pub tls: bool,
}

// Keeps the password out of logs and panic messages
impl fmt::Debug for GatewaySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewaySettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("instance", &self.instance)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("tls", &self.tls)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct OpenSessionRequest<'a> {
    instance: &'a str,
    database: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenSessionResponse {
    session: String,
    #[serde(default)]
    concurrent_reads: bool,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    expression: &'a str,
    timeout_ms: u128,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    rows: Vec<Row>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    value: Option<Scalar>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// GatewayConnector adapter for SQL Server instances reached over HTTP
///
/// The gateway runs next to the instance and exposes read-only access:
/// `POST /v1/sessions` opens a session, `POST /v1/sessions/{id}/query` runs a
/// query, `GET /v1/sessions/{id}/lookup?path=` reads a registry value and
/// `DELETE /v1/sessions/{id}` releases the session. Every request carries
/// HTTP basic credentials.
pub struct GatewayConnector {
    client: reqwest::Client,
    settings: GatewaySettings,
    base_url: String,
}

impl GatewayConnector {
    /// Validates the settings and builds the HTTP client
    ///
    /// # Errors
    /// Returns `AuditError::Configuration` for missing or unsafe settings.
    pub fn new(settings: GatewaySettings) -> Result<Self> {
        Self::validate(&settings)?;

        let version = env!("CARGO_PKG_VERSION");
        let user_agent = format!("stig-audit/{}", version);
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(SESSION_TIMEOUT)
            .build()?;

        let scheme = if settings.tls { "https" } else { "http" };
        let host = url_host(&settings.host).unwrap_or_default();
        let base_url = format!("{}://{}:{}/v1", scheme, host, settings.port);

        Ok(Self {
            client,
            settings,
            base_url,
        })
    }

    fn validate(settings: &GatewaySettings) -> Result<()> {
        let required = [
            ("host", &settings.host),
            ("instance", &settings.instance),
            ("user", &settings.user),
            ("password", &settings.password),
            ("database", &settings.database),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(AuditError::configuration(
                    format!("connection.{} is required", name),
                    match name {
                        "password" => {
                            "Set connection.password or the STIG_AUDIT_PASSWORD environment \
                             variable"
                        }
                        _ => "Set it in the configuration file or on the command line",
                    },
                )
                .into());
            }
        }

        if url_host(&settings.host).is_none() {
            return Err(AuditError::configuration(
                format!("connection.host '{}' is not a plain host name", settings.host),
                "Give a host name, an IPv4 address or an IPv6 address (optionally in \
                 brackets) without scheme, port or path",
            )
            .into());
        }

        if settings.port == 0 {
            return Err(AuditError::configuration(
                "connection.port must be between 1 and 65535",
                format!("The gateway listens on {} by default", DEFAULT_GATEWAY_PORT),
            )
            .into());
        }
        Ok(())
    }

    fn connection_error(&self, details: impl Into<String>) -> anyhow::Error {
        AuditError::Connection {
            target: self.describe(),
            details: details.into(),
        }
        .into()
    }
}

/// Host as it goes into the URL, or `None` when it is not a bare host
///
/// IPv6 literals are accepted with or without brackets and always come back
/// bracketed.
fn url_host(host: &str) -> Option<String> {
    let unbracketed = host
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(host);
    if let Ok(address) = unbracketed.parse::<Ipv6Addr>() {
        return Some(format!("[{}]", address));
    }

    // Anything else is interpolated verbatim
    let plain = !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    plain.then(|| host.to_string())
}

#[async_trait]
impl TargetConnector for GatewayConnector {
    type Session = GatewaySession;

    fn describe(&self) -> String {
        format!(
            "{}:{}\\{} (database {})",
            self.settings.host, self.settings.port, self.settings.instance, self.settings.database
        )
    }

    async fn open(&self) -> Result<GatewaySession> {
        let response = self
            .client
            .post(format!("{}/sessions", self.base_url))
            .basic_auth(&self.settings.user, Some(&self.settings.password))
            .timeout(SESSION_TIMEOUT)
            .json(&OpenSessionRequest {
                instance: &self.settings.instance,
                database: &self.settings.database,
            })
            .send()
            .await
            .map_err(|e| self.connection_error(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(self.connection_error(format!(
                "gateway rejected the credentials for user '{}' ({})",
                self.settings.user, status
            )));
        }
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(self.connection_error(format!("gateway returned {}: {}", status, message)));
        }

        let opened: OpenSessionResponse = response
            .json()
            .await
            .map_err(|e| self.connection_error(format!("unexpected gateway response: {}", e)))?;

        Ok(GatewaySession {
            client: self.client.clone(),
            session_url: format!(
                "{}/sessions/{}",
                self.base_url,
                urlencoding::encode(&opened.session)
            ),
            user: self.settings.user.clone(),
            password: self.settings.password.clone(),
            concurrent_reads: opened.concurrent_reads,
        })
    }
}

/// One gateway session; reads go to `/v1/sessions/{id}`
pub struct GatewaySession {
    client: reqwest::Client,
    session_url: String,
    user: String,
    password: String,
    concurrent_reads: bool,
}

impl GatewaySession {
    fn read_failure(error: reqwest::Error, timeout: Duration) -> QueryFailure {
        if error.is_timeout() {
            QueryFailure::Timeout(timeout)
        } else {
            QueryFailure::Rejected(format!("gateway request failed: {}", error))
        }
    }
}

#[async_trait]
impl TargetSession for GatewaySession {
    async fn query(&self, expression: &str, timeout: Duration) -> QueryResult<Vec<Row>> {
        let response = self
            .client
            .post(format!("{}/query", self.session_url))
            .basic_auth(&self.user, Some(&self.password))
            .timeout(timeout)
            .json(&QueryRequest {
                expression,
                timeout_ms: timeout.as_millis(),
            })
            .send()
            .await
            .map_err(|e| Self::read_failure(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(failure_for_status(status, message, timeout));
        }

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| QueryFailure::Malformed(format!("unexpected query response: {}", e)))?;
        Ok(body.rows)
    }

    async fn lookup(&self, path: &str, timeout: Duration) -> QueryResult<Option<Scalar>> {
        let response = self
            .client
            .get(format!(
                "{}/lookup?path={}",
                self.session_url,
                urlencoding::encode(path)
            ))
            .basic_auth(&self.user, Some(&self.password))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Self::read_failure(e, timeout))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(failure_for_status(status, message, timeout));
        }

        let body: LookupResponse = response
            .json()
            .await
            .map_err(|e| QueryFailure::Malformed(format!("unexpected lookup response: {}", e)))?;
        Ok(body.value)
    }

    fn supports_concurrent_reads(&self) -> bool {
        self.concurrent_reads
    }

    async fn close(&self) -> Result<()> {
        let response = self
            .client
            .delete(&self.session_url)
            .basic_auth(&self.user, Some(&self.password))
            .timeout(SESSION_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            anyhow::bail!("gateway returned {} while closing the session", status);
        }
        Ok(())
    }
}

/// Maps a gateway error status to the kind of read failure it reports
fn failure_for_status(status: StatusCode, message: String, timeout: Duration) -> QueryFailure {
    match status {
        StatusCode::BAD_REQUEST => QueryFailure::Malformed(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => QueryFailure::Timeout(timeout),
        _ => QueryFailure::Rejected(format!("{} ({})", message, status)),
    }
}

/// The gateway's `{"error": ...}` message, or the raw body
async fn error_message(response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(parsed) => parsed.error,
        Err(_) if body.trim().is_empty() => "no details".to_string(),
        Err(_) => body.trim().to_string(),
    }
}
