// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Email dispatch transport.
//
// Posts `{to, receipt}` to the backend's `/email/receipt` endpoint. Only an
// explicit `{"success": true}` body counts as delivered.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tillwerk_core::error::{Result, TillwerkError};
use tillwerk_core::types::{PrinterDevice, ReceiptDocument, TransportKind};

use super::{Payload, Transport};

#[derive(Serialize)]
struct EmailRequest<'a> {
    to: &'a str,
    receipt: &'a ReceiptDocument,
}

#[derive(Deserialize)]
struct EmailResponse {
    #[serde(default)]
    success: bool,
}

pub struct EmailTransport {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl EmailTransport {
    /// `base_url` is the backend root, e.g. `https://pos.example.com/api`.
    pub fn new(base_url: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TillwerkError::Http(format!("build client: {e}")))?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self) -> Option<String> {
        self.base_url
            .as_deref()
            .map(|base| format!("{}/email/receipt", base.trim_end_matches('/')))
    }
}

#[async_trait]
impl Transport for EmailTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Email
    }

    async fn attempt(&self, device: &PrinterDevice, payload: &Payload<'_>) -> Result<String> {
        let to = payload
            .document
            .destination
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| {
                TillwerkError::inapplicable(TransportKind::Email, "receipt has no email destination")
            })?;
        let url = self.endpoint().ok_or_else(|| {
            TillwerkError::inapplicable(TransportKind::Email, "no email backend configured")
        })?;
        debug!(printer_id = %device.id, %url, "email attempt");

        let response = self
            .client
            .post(&url)
            .json(&EmailRequest {
                to,
                receipt: payload.document,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TillwerkError::timeout(TransportKind::Email, e.to_string())
                } else {
                    TillwerkError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "email backend refused receipt");
            return Err(TillwerkError::rejected(
                TransportKind::Email,
                format!("backend answered {status}"),
            ));
        }

        let body: EmailResponse = response.json().await.map_err(|e| {
            TillwerkError::rejected(TransportKind::Email, format!("unreadable response: {e}"))
        })?;
        if !body.success {
            return Err(TillwerkError::rejected(
                TransportKind::Email,
                "backend reported failure",
            ));
        }
        Ok(format!("emailed to {to}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tillwerk_core::types::PrinterRole;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// One-shot HTTP stub: answers a single request with `status` and `body`,
    /// and hands back the request body it received.
    async fn stub_backend(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            let (header_end, content_length) = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                assert!(n > 0, "client closed before sending headers");
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&buf[..pos]).to_ascii_lowercase();
                    let len = head
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .map(|v| v.trim().parse::<usize>().unwrap())
                        .unwrap_or(0);
                    break (pos + 4, len);
                }
            };
            while buf.len() < header_end + content_length {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let reply = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&buf[header_end..]).into_owned()
        });
        (base, handle)
    }

    fn device() -> PrinterDevice {
        PrinterDevice::new("front", "Front", PrinterRole::Receipt)
    }

    fn addressed_doc() -> ReceiptDocument {
        let mut doc = ReceiptDocument::new("Table 1", 3.0);
        doc.destination = Some("guest@example.com".into());
        doc
    }

    #[tokio::test]
    async fn success_body_delivers() {
        let (base, server) = stub_backend("200 OK", r#"{"success":true}"#).await;
        let transport = EmailTransport::new(Some(base), Duration::from_secs(5)).unwrap();
        let doc = addressed_doc();

        let detail = transport
            .attempt(&device(), &Payload { document: &doc, bytes: &[] })
            .await
            .unwrap();
        assert_eq!(detail, "emailed to guest@example.com");

        let sent: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(sent["to"], "guest@example.com");
        assert_eq!(sent["receipt"]["header"], "Table 1");
    }

    #[tokio::test]
    async fn success_false_is_rejected() {
        let (base, _server) = stub_backend("200 OK", r#"{"success":false}"#).await;
        let transport = EmailTransport::new(Some(base), Duration::from_secs(5)).unwrap();
        let doc = addressed_doc();
        let err = transport
            .attempt(&device(), &Payload { document: &doc, bytes: &[] })
            .await
            .unwrap_err();
        assert!(matches!(err, TillwerkError::TransportRejected { .. }));
    }

    #[tokio::test]
    async fn server_error_is_rejected() {
        let (base, _server) = stub_backend("500 Internal Server Error", r#"{"success":true}"#).await;
        let transport = EmailTransport::new(Some(base), Duration::from_secs(5)).unwrap();
        let doc = addressed_doc();
        let err = transport
            .attempt(&device(), &Payload { document: &doc, bytes: &[] })
            .await
            .unwrap_err();
        assert!(matches!(err, TillwerkError::TransportRejected { .. }));
    }

    #[tokio::test]
    async fn missing_destination_is_inapplicable() {
        let transport =
            EmailTransport::new(Some("http://127.0.0.1:9".into()), Duration::from_secs(1)).unwrap();
        let doc = ReceiptDocument::new("Table 1", 3.0);
        let err = transport
            .attempt(&device(), &Payload { document: &doc, bytes: &[] })
            .await
            .unwrap_err();
        assert!(matches!(err, TillwerkError::TransportInapplicable { .. }));
    }
}
