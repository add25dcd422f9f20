//! Invoker — the one coupling point to the transport layer.
//!
//! The scheduler never sees a transport error as an `Err`; every
//! outcome (success, failure, timeout) comes back as an
//! [`InvokeOutcome`] and is recorded as an attempt.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Per-call options passed through to the transport.
#[derive(Debug, Clone)]
pub struct InvokeOptions {
    pub timeout: Duration,
    pub correlation_id: String,
}

/// Result of a single invocation.
#[derive(Debug, Clone)]
pub struct InvokeOutcome {
    /// Whether the call succeeded.
    pub ok: bool,
    /// Transport-reported latency, if available. The scheduler falls
    /// back to wall-clock when absent.
    pub duration_ms: Option<f64>,
    /// Error message for failed calls.
    pub error: Option<String>,
}

/// Transport collaborator: one paced probe call.
pub trait Invoker {
    fn invoke(
        &self,
        target: &str,
        capability: &str,
        payload: &serde_json::Value,
        opts: &InvokeOptions,
    ) -> impl Future<Output = InvokeOutcome> + Send;
}

/// Production invoker: POST the payload as JSON to
/// `http://<target>/<capability>`. A 2xx response is a success; any
/// non-2xx status, connect failure, or timeout is a failed outcome.
#[derive(Debug, Clone, Default)]
pub struct HttpInvoker;

impl Invoker for HttpInvoker {
    async fn invoke(
        &self,
        target: &str,
        capability: &str,
        payload: &serde_json::Value,
        opts: &InvokeOptions,
    ) -> InvokeOutcome {
        let uri = format!("http://{target}/{capability}");
        let start = Instant::now();

        let result = tokio::time::timeout(
            opts.timeout,
            send_probe(target, &uri, payload, &opts.correlation_id),
        )
        .await;

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        match result {
            Ok(Ok(status)) if status.is_success() => InvokeOutcome {
                ok: true,
                duration_ms: Some(duration_ms),
                error: None,
            },
            Ok(Ok(status)) => {
                debug!(%uri, %status, "probe returned non-2xx");
                InvokeOutcome {
                    ok: false,
                    duration_ms: Some(duration_ms),
                    error: Some(format!("HTTP {}", status.as_u16())),
                }
            }
            Ok(Err(message)) => {
                debug!(%uri, error = %message, "probe transport failure");
                InvokeOutcome {
                    ok: false,
                    duration_ms: Some(duration_ms),
                    error: Some(message),
                }
            }
            Err(_) => InvokeOutcome {
                ok: false,
                duration_ms: Some(duration_ms),
                error: Some(format!("timeout after {}ms", opts.timeout.as_millis())),
            },
        }
    }
}

/// Connect, handshake, and send one POST. Returns the response status
/// or the transport error message.
async fn send_probe(
    target: &str,
    uri: &str,
    payload: &serde_json::Value,
    correlation_id: &str,
) -> Result<http::StatusCode, String> {
    let stream = tokio::net::TcpStream::connect(target)
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

    let body = serde_json::to_vec(payload).map_err(|e| e.to_string())?;
    let req = http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("host", target)
        .header("content-type", "application/json")
        .header("x-correlation-id", correlation_id)
        .header("user-agent", "relgate-probe/0.1")
        .body(http_body_util::Full::new(bytes::Bytes::from(body)))
        .map_err(|e| e.to_string())?;

    let resp = sender.send_request(req).await.map_err(|e| e.to_string())?;
    Ok(resp.status())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use hyper::service::service_fn;

    async fn spawn_server(status: u16) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let io = hyper_util::rt::TokioIo::new(stream);
                tokio::spawn(async move {
                    let service = service_fn(move |req: hyper::Request<hyper::body::Incoming>| async move {
                        let _ = req.into_body().collect().await;
                        Ok::<_, std::convert::Infallible>(
                            hyper::Response::builder()
                                .status(status)
                                .body(http_body_util::Full::new(bytes::Bytes::new()))
                                .unwrap(),
                        )
                    });
                    let _ = hyper::server::conn::http1::Builder::new()
                        .serve_connection(io, service)
                        .await;
                });
            }
        });
        addr.to_string()
    }

    fn opts() -> InvokeOptions {
        InvokeOptions {
            timeout: Duration::from_secs(2),
            correlation_id: "rel-1".to_string(),
        }
    }

    #[tokio::test]
    async fn ok_on_2xx() {
        let target = spawn_server(200).await;
        let outcome = HttpInvoker
            .invoke(&target, "probe", &serde_json::json!({}), &opts())
            .await;
        assert!(outcome.ok);
        assert!(outcome.duration_ms.is_some());
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn failure_carries_http_status() {
        let target = spawn_server(503).await;
        let outcome = HttpInvoker
            .invoke(&target, "probe", &serde_json::json!({}), &opts())
            .await;
        assert!(!outcome.ok);
        assert_eq!(outcome.error.as_deref(), Some("HTTP 503"));
    }

    #[tokio::test]
    async fn connect_failure_is_a_failed_outcome() {
        // Port 1 is essentially never listening.
        let outcome = HttpInvoker
            .invoke("127.0.0.1:1", "probe", &serde_json::json!({}), &opts())
            .await;
        assert!(!outcome.ok);
        assert!(outcome.error.is_some());
    }
}
