//! HTTP side of the scanner contract: fetch the port list, submit a scan.
//!
//! Every call resolves to a [`ClientError`] on failure, split by where the
//! exchange broke down: the transport, the HTTP exchange, or the payload.
use std::future::Future;
use std::time::Duration;

use reqwest::{header::CONTENT_TYPE, Client, Response, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::types::{ErrorBody, ScanConfig, WriteAck, WriteRequest};

#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never completed: refused, reset, DNS, unreadable body.
    #[error("cannot reach scanner server: {0}")]
    Connectivity(#[source] reqwest::Error),
    /// The server answered, but not with a successful JSON response.
    #[error("server responded with {status}: {detail}")]
    Protocol { status: u16, detail: String },
    /// The body was JSON-typed but not the expected shape.
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The two calls the page makes. Implemented over HTTP by
/// [`HttpScannerApi`]; tests substitute their own.
pub trait ScannerApi {
    fn list_ports(&self) -> impl Future<Output = Result<Vec<String>, ClientError>> + Send;

    fn scan(
        &self,
        config: &ScanConfig,
    ) -> impl Future<Output = Result<Vec<String>, ClientError>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpScannerApi {
    http: Client,
    base: Url,
}

impl HttpScannerApi {
    pub fn new(base: Url) -> Result<Self, ClientError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(ClientError::Connectivity)?;
        Ok(Self { http, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        url.set_path(path);
        url
    }

    pub async fn write(&self, request: &WriteRequest) -> Result<WriteAck, ClientError> {
        let resp = self
            .http
            .post(self.endpoint("/api/write"))
            .json(request)
            .send()
            .await
            .map_err(ClientError::Connectivity)?;
        decode(resp).await
    }
}

impl ScannerApi for HttpScannerApi {
    async fn list_ports(&self) -> Result<Vec<String>, ClientError> {
        let resp = self
            .http
            .get(self.endpoint("/api/ports"))
            .send()
            .await
            .map_err(ClientError::Connectivity)?;
        decode(resp).await
    }

    async fn scan(&self, config: &ScanConfig) -> Result<Vec<String>, ClientError> {
        let resp = self
            .http
            .post(self.endpoint("/api/scan"))
            .json(config)
            .send()
            .await
            .map_err(ClientError::Connectivity)?;
        decode(resp).await
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    let status = resp.status();
    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let body = resp.bytes().await.map_err(ClientError::Connectivity)?;

    if !status.is_success() {
        return Err(ClientError::Protocol {
            status: status.as_u16(),
            detail: error_detail(&body),
        });
    }
    if !content_type.as_deref().is_some_and(is_json) {
        return Err(ClientError::Protocol {
            status: status.as_u16(),
            detail: format!(
                "unexpected content type {}",
                content_type.as_deref().unwrap_or("<none>")
            ),
        });
    }
    Ok(serde_json::from_slice(&body)?)
}

fn is_json(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

/// Prefer the server's `{"error": ...}` message, fall back to the raw body.
fn error_detail(body: &[u8]) -> String {
    if let Ok(err) = serde_json::from_slice::<ErrorBody>(body) {
        return err.error;
    }
    let text = String::from_utf8_lossy(body).trim().to_string();
    if text.is_empty() {
        "<empty body>".to_string()
    } else {
        text
    }
}
