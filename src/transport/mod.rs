//! Transport - HTTP boundary to the camera
//!
//! ## Responsibilities
//!
//! - One-shot JSON command/response exchanges (execute, status, state, info)
//! - Binary fetches (thumbnails) and progress-reporting downloads
//! - Live-preview stream establishment (motion-JPEG over multipart)
//!
//! Retry policy belongs to the caller; the transport reports failures and
//! does not retry on its own.

pub mod live;

pub use live::LiveView;

use std::sync::RwLock;

use bytes::Bytes;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::config::CameraConfig;
use crate::error::{Error, Result};

/// Progress events for a streaming download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadEvent {
    /// Response headers received; total size if the camera reported one
    Started { total_bytes: Option<u64> },
    /// A chunk was received
    Progress { written: u64, total_bytes: Option<u64> },
    /// Body fully received
    Finished { bytes: u64 },
}

/// Network boundary for the protocol client.
///
/// The client and the status poller run against this trait so tests can
/// script camera behavior without a device. Methods a scripted transport
/// does not exercise fall back to an unsupported-transport error.
#[allow(async_fn_in_trait)]
pub trait Transport: Send + Sync {
    /// POST a command body to the execute endpoint, JSON response expected
    async fn execute(&self, body: &Value) -> Result<Value>;

    /// POST a correlation id to the status endpoint (bounded-wait long poll)
    async fn status(&self, body: &Value) -> Result<Value>;

    /// POST a command whose response body is raw bytes (thumbnails)
    async fn execute_binary(&self, _body: &Value) -> Result<Bytes> {
        Err(Error::Transport("binary fetch not supported".to_string()))
    }

    /// GET the device information document
    async fn info(&self) -> Result<Value> {
        Err(Error::Transport("info not supported".to_string()))
    }

    /// POST the state endpoint (battery and session observations)
    async fn state(&self) -> Result<Value> {
        Err(Error::Transport("state not supported".to_string()))
    }

    /// POST a command and stream the binary response, reporting progress
    async fn download(
        &self,
        _body: &Value,
        _events: Option<mpsc::UnboundedSender<DownloadEvent>>,
    ) -> Result<Bytes> {
        Err(Error::Transport("download not supported".to_string()))
    }

    /// POST a command whose response is an unbounded frame stream
    async fn open_live_view(&self, _body: &Value) -> Result<LiveView> {
        Err(Error::Transport("live view not supported".to_string()))
    }
}

/// HTTP transport over reqwest
///
/// Two clients: command exchanges carry a per-request timeout, while the
/// streaming client only bounds connection establishment (a live preview
/// stays open until canceled).
pub struct HttpTransport {
    client: reqwest::Client,
    stream_client: reqwest::Client,
    base_url: RwLock<String>,
    port: u16,
}

impl HttpTransport {
    /// Create a transport for the configured camera
    pub fn new(config: &CameraConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .expect("Failed to create HTTP client");

        let stream_client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            stream_client,
            base_url: RwLock::new(config.base_url()),
            port: config.port,
        }
    }

    /// Point the transport at a different camera without reconnecting
    pub fn set_target_ip(&self, ip: &str) {
        let url = format!("http://{}:{}", ip, self.port);
        *self.base_url.write().expect("base_url lock poisoned") = url;
    }

    fn url(&self, path: &str) -> String {
        let base = self.base_url.read().expect("base_url lock poisoned");
        format!("{}{}", base, path)
    }

    /// Read a response body as JSON regardless of HTTP status.
    ///
    /// The camera reports command failures as 4xx with a JSON error
    /// payload; those belong to the protocol layer, not the transport.
    async fn json_body(resp: reqwest::Response) -> Result<Value> {
        let status = resp.status();
        let text = resp.text().await?;
        match serde_json::from_str(&text) {
            Ok(value) => Ok(value),
            Err(_) => Err(Error::Transport(format!(
                "non-JSON response (HTTP {}): {}",
                status.as_u16(),
                text.chars().take(120).collect::<String>()
            ))),
        }
    }
}

impl Transport for HttpTransport {
    async fn execute(&self, body: &Value) -> Result<Value> {
        let url = self.url("/osc/commands/execute");
        let resp = self.client.post(&url).json(body).send().await?;
        Self::json_body(resp).await
    }

    async fn status(&self, body: &Value) -> Result<Value> {
        let url = self.url("/osc/commands/status");
        let resp = self.client.post(&url).json(body).send().await?;
        Self::json_body(resp).await
    }

    async fn execute_binary(&self, body: &Value) -> Result<Bytes> {
        let url = self.url("/osc/commands/execute");
        let resp = self.client.post(&url).json(body).send().await?;

        if !resp.status().is_success() {
            // Error bodies come back as JSON even on binary commands
            return match Self::json_body(resp).await {
                Ok(value) => Err(protocol_from_body(value)),
                Err(e) => Err(e),
            };
        }

        Ok(resp.bytes().await?)
    }

    async fn info(&self) -> Result<Value> {
        let url = self.url("/osc/info");
        let resp = self.client.get(&url).send().await?;
        Self::json_body(resp).await
    }

    async fn state(&self) -> Result<Value> {
        let url = self.url("/osc/state");
        let resp = self.client.post(&url).send().await?;
        Self::json_body(resp).await
    }

    async fn download(
        &self,
        body: &Value,
        events: Option<mpsc::UnboundedSender<DownloadEvent>>,
    ) -> Result<Bytes> {
        let url = self.url("/osc/commands/execute");
        let resp = self.stream_client.post(&url).json(body).send().await?;

        if !resp.status().is_success() {
            return match Self::json_body(resp).await {
                Ok(value) => Err(protocol_from_body(value)),
                Err(e) => Err(e),
            };
        }

        let total_bytes = resp.content_length();
        if let Some(tx) = &events {
            let _ = tx.send(DownloadEvent::Started { total_bytes });
        }

        let mut written: u64 = 0;
        let mut buf = Vec::with_capacity(total_bytes.unwrap_or(0) as usize);
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            buf.extend_from_slice(&chunk);
            if let Some(tx) = &events {
                let _ = tx.send(DownloadEvent::Progress { written, total_bytes });
            }
        }

        if let Some(tx) = &events {
            let _ = tx.send(DownloadEvent::Finished { bytes: written });
        }

        tracing::debug!(bytes = written, "Download complete");

        Ok(Bytes::from(buf))
    }

    async fn open_live_view(&self, body: &Value) -> Result<LiveView> {
        let url = self.url("/osc/commands/execute");
        let resp = self.stream_client.post(&url).json(body).send().await?;

        if !resp.status().is_success() {
            return match Self::json_body(resp).await {
                Ok(value) => Err(protocol_from_body(value)),
                Err(e) => Err(e),
            };
        }

        tracing::debug!("Live preview stream established");

        Ok(LiveView::spawn(resp))
    }
}

/// Lift a JSON error payload returned on a binary endpoint into an error
fn protocol_from_body(value: Value) -> Error {
    let code = value
        .pointer("/error/code")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");
    let message = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    Error::from_protocol(code, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url_follows_target_ip() {
        let transport = HttpTransport::new(&CameraConfig::default());
        transport.set_target_ip("10.0.0.5");
        assert!(transport.url("/osc/info").starts_with("http://10.0.0.5:"));
    }

    #[test]
    fn test_protocol_from_body_maps_session_eviction() {
        let body = json!({"error": {"code": "sessionNotFound", "message": "gone"}});
        assert!(matches!(protocol_from_body(body), Error::SessionExpired));
    }

    #[test]
    fn test_protocol_from_body_without_payload() {
        match protocol_from_body(json!({})) {
            Error::Protocol { code, .. } => assert_eq!(code, "unknown"),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
