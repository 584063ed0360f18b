//! JSON-RPC over HTTP with Transmission's session-id handshake.
//!
//! # Design
//! - Every call is a `POST` of `{ "method", "arguments" }` to the RPC URL.
//! - A `409` carries a fresh `X-Transmission-Session-Id`; it is stored and the call retried once.
//! - The session id lives behind an async `RwLock` so concurrent calls share it.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{RpcError, RpcResult};

const SESSION_HEADER: &str = "X-Transmission-Session-Id";
const RPC_PATH: &str = "/transmission/rpc";

/// Minimal request surface the adapter needs; swapped for a scripted fake in tests.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Invoke `method` and return the response `arguments` object.
    async fn call(&self, method: &str, arguments: Value) -> RpcResult<Value>;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    result: String,
    #[serde(default)]
    arguments: Value,
}

/// reqwest-backed transport.
pub struct HttpRpcTransport {
    client: Client,
    url: String,
    credentials: Option<(String, String)>,
    session_id: RwLock<Option<String>>,
}

impl HttpRpcTransport {
    /// Build a transport for `host`. Scheme defaults to `http`; a bare host gets the standard
    /// `/transmission/rpc` path. An empty username disables basic auth.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(host: &str, username: &str, password: &str) -> RpcResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| RpcError::Build { source })?;
        let credentials =
            (!username.is_empty()).then(|| (username.to_string(), password.to_string()));
        Ok(Self {
            client,
            url: rpc_url(host),
            credentials,
            session_id: RwLock::new(None),
        })
    }

    async fn send(&self, method: &str, body: &Value) -> RpcResult<Response> {
        let mut request = self.client.post(&self.url).json(body);
        if let Some((username, password)) = &self.credentials {
            request = request.basic_auth(username, Some(password));
        }
        if let Some(session_id) = self.session_id.read().await.as_ref() {
            request = request.header(SESSION_HEADER, session_id);
        }
        request.send().await.map_err(|source| RpcError::Request {
            method: method.to_string(),
            source,
        })
    }
}

#[async_trait]
impl RpcTransport for HttpRpcTransport {
    async fn call(&self, method: &str, arguments: Value) -> RpcResult<Value> {
        let body = json!({ "method": method, "arguments": arguments });
        let mut response = self.send(method, &body).await?;
        if response.status() == StatusCode::CONFLICT {
            let session_id = response
                .headers()
                .get(SESSION_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
                .ok_or(RpcError::MissingSessionId)?;
            debug!(method, "transmission session id refreshed");
            *self.session_id.write().await = Some(session_id);
            response = self.send(method, &body).await?;
        }

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(RpcError::Unauthorized);
        }
        if !status.is_success() {
            return Err(RpcError::Status {
                method: method.to_string(),
                status: status.as_u16(),
            });
        }
        let text = response.text().await.map_err(|source| RpcError::Request {
            method: method.to_string(),
            source,
        })?;
        decode_envelope(method, &text)
    }
}

fn decode_envelope(method: &str, text: &str) -> RpcResult<Value> {
    let envelope: Envelope = serde_json::from_str(text).map_err(|source| RpcError::Decode {
        method: method.to_string(),
        source,
    })?;
    if envelope.result != "success" {
        return Err(RpcError::Rejected {
            method: method.to_string(),
            result: envelope.result,
        });
    }
    Ok(envelope.arguments)
}

fn rpc_url(host: &str) -> String {
    let trimmed = host.trim().trim_end_matches('/');
    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    let has_path = with_scheme
        .split_once("://")
        .is_some_and(|(_, rest)| rest.contains('/'));
    if has_path {
        with_scheme
    } else {
        format!("{with_scheme}{RPC_PATH}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_gets_scheme_and_rpc_path() {
        assert_eq!(rpc_url("nas:9091"), "http://nas:9091/transmission/rpc");
        assert_eq!(
            rpc_url("https://tr.example.org/custom/rpc/"),
            "https://tr.example.org/custom/rpc"
        );
    }

    #[test]
    fn envelope_result_other_than_success_is_rejected() -> anyhow::Result<()> {
        let arguments = decode_envelope("session-get", r#"{"result":"success","arguments":{"version":"4.0"}}"#)?;
        assert_eq!(arguments["version"], "4.0");

        let err = decode_envelope("torrent-add", r#"{"result":"invalid or corrupt torrent file"}"#)
            .expect_err("rejected");
        assert!(matches!(err, RpcError::Rejected { ref result, .. } if result.starts_with("invalid")));
        Ok(())
    }

    #[test]
    fn malformed_body_is_decode_error() {
        let err = decode_envelope("torrent-get", "<html>").expect_err("decode");
        assert!(matches!(err, RpcError::Decode { .. }));
    }
}
