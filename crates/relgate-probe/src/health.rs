//! Health gate — a single HTTP health probe with timeout classification.
//!
//! Healthy means: HTTP success status AND, when the body is JSON with
//! a `status` field, that field equals `"ok"`. Empty or non-JSON
//! bodies are tolerated. A timeout is a terminal classification, never
//! retried — the gate measures degraded behavior instead of masking it.

use std::time::Duration;

use http_body_util::BodyExt;
use tracing::debug;

/// Outcome of one health check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReading {
    pub ok: bool,
    /// Failure classification: `HTTP <code>`, `status=<value>`, the
    /// timeout message, or the transport error message.
    pub reason: Option<String>,
}

impl HealthReading {
    fn healthy() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    fn unhealthy(reason: String) -> Self {
        Self {
            ok: false,
            reason: Some(reason),
        }
    }
}

/// Health collaborator, injectable for tests.
pub trait HealthProbe {
    fn check(&self) -> impl Future<Output = HealthReading> + Send;
}

/// Production health gate: one GET against a health URL.
#[derive(Debug, Clone)]
pub struct HealthGate {
    url: String,
    timeout: Duration,
}

impl HealthGate {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

impl HealthProbe for HealthGate {
    async fn check(&self) -> HealthReading {
        let result = tokio::time::timeout(self.timeout, fetch_health(&self.url)).await;

        match result {
            Ok(Ok(reading)) => reading,
            Ok(Err(message)) => {
                debug!(url = %self.url, error = %message, "health check transport failure");
                HealthReading::unhealthy(message)
            }
            Err(_) => HealthReading::unhealthy(format!(
                "health check timed out after {}ms",
                self.timeout.as_millis()
            )),
        }
    }
}

/// Send the GET and classify status + body.
async fn fetch_health(url: &str) -> Result<HealthReading, String> {
    let uri: http::Uri = url.parse().map_err(|e| format!("invalid health url: {e}"))?;
    let host = uri.host().ok_or("health url has no host")?.to_string();
    let port = uri.port_u16().unwrap_or(80);
    let authority = format!("{host}:{port}");
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let stream = tokio::net::TcpStream::connect(&authority)
        .await
        .map_err(|e| e.to_string())?;

    let io = hyper_util::rt::TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| e.to_string())?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let req = http::Request::builder()
        .method("GET")
        .uri(&path)
        .header("host", &authority)
        .header("user-agent", "relgate-probe/0.1")
        .body(http_body_util::Empty::<bytes::Bytes>::new())
        .map_err(|e| e.to_string())?;

    let resp = sender.send_request(req).await.map_err(|e| e.to_string())?;
    let status = resp.status();

    if !status.is_success() {
        return Ok(HealthReading::unhealthy(format!(
            "HTTP {}",
            status.as_u16()
        )));
    }

    // Non-JSON and empty bodies are fine; only an explicit non-"ok"
    // status field makes a 2xx response unhealthy.
    let body = resp
        .into_body()
        .collect()
        .await
        .map_err(|e| e.to_string())?
        .to_bytes();
    let body_status = serde_json::from_slice::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("status").cloned());

    match body_status {
        None => Ok(HealthReading::healthy()),
        Some(serde_json::Value::String(s)) if s == "ok" => Ok(HealthReading::healthy()),
        Some(other) => {
            let rendered = match other {
                serde_json::Value::String(s) => s,
                v => v.to_string(),
            };
            Ok(HealthReading::unhealthy(format!("status={rendered}")))
        }
    }
}
