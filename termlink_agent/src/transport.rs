//! HTTP capability the agent talks through, plus the reqwest-backed implementation.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, DATE};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use sha2::Sha256;
use tokio_util::io::ReaderStream;
use tracing::debug;
use url::Url;

use crate::config::AgentConfig;
use crate::endpoint::Endpoint;
use crate::error::TransportError;
use crate::types::RegisteredIdentity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Post,
    Patch,
}

/// A file handed to the transport for a multipart upload. The transport owns
/// the handle from here on and streams it; the handle closes once the body is
/// read to the end or the request is dropped.
#[derive(Debug)]
pub struct Upload {
    pub field: &'static str,
    pub file_name: String,
    pub file: tokio::fs::File,
}

#[derive(Debug)]
pub enum RequestBody {
    Json(Value),
    Multipart(Upload),
}

#[derive(Debug)]
pub struct ApiRequest {
    pub method: Method,
    pub endpoint: Endpoint,
    pub pk: Option<String>,
    pub body: RequestBody,
    // present iff the call must be signed
    pub identity: Option<RegisteredIdentity>,
}

impl ApiRequest {
    pub fn post(endpoint: Endpoint, body: RequestBody) -> Self {
        Self {
            method: Method::Post,
            endpoint,
            pk: None,
            body,
            identity: None,
        }
    }

    pub fn patch(endpoint: Endpoint, body: RequestBody) -> Self {
        Self {
            method: Method::Patch,
            ..Self::post(endpoint, body)
        }
    }

    pub fn with_pk(mut self, pk: impl Into<String>) -> Self {
        self.pk = Some(pk.into());
        self
    }

    pub fn authenticated(mut self, identity: RegisteredIdentity) -> Self {
        self.identity = Some(identity);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    // `Value::Null` when the body was empty
    pub body: Value,
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, req: ApiRequest) -> Result<ApiResponse, TransportError>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
    base: Url,
}

impl ReqwestTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let base = Url::parse(base_url).map_err(|e| {
            TransportError::InvalidRequest(format!("invalid endpoint {base_url}: {e}"))
        })?;
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()?;
        Ok(Self { client, base })
    }

    pub fn from_config(cfg: &AgentConfig) -> Result<Self, TransportError> {
        Self::new(&cfg.endpoint, cfg.request_timeout)
    }

    fn url(&self, endpoint: Endpoint, pk: Option<&str>) -> Result<Url, TransportError> {
        endpoint.url(&self.base, pk)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, req: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.url(req.endpoint, req.pk.as_deref())?;
        debug!(endpoint = %req.endpoint, method = ?req.method, %url, signed = req.identity.is_some(), "controller request");

        let mut rb = match req.method {
            Method::Post => self.client.post(url),
            Method::Patch => self.client.patch(url),
        };
        if let Some(id) = &req.identity {
            let date = http_date(Utc::now());
            let signature = sign(&id.access_key_secret, &date)?;
            rb = rb
                .header(DATE, &date)
                .header(AUTHORIZATION, format!("Sign {}:{}", id.access_key_id, signature));
        }
        rb = match req.body {
            RequestBody::Json(v) => rb.json(&v),
            RequestBody::Multipart(upload) => {
                let Upload {
                    field,
                    file_name,
                    file,
                } = upload;
                let len = file.metadata().await?.len();
                let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
                let part = Part::stream_with_length(body, len).file_name(file_name);
                rb.multipart(Form::new().part(field, part))
            }
        };

        let resp = rb.send().await?;
        let status = resp.status().as_u16();
        let bytes = resp.bytes().await?;
        let body = if bytes.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .map_err(|e| TransportError::Response(format!("status {status}: {e}")))?
        };
        debug!(status, "controller response");
        Ok(ApiResponse { status, body })
    }
}

// IMF-fixdate, as required for the Date header
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

pub fn sign(secret: &str, date: &str) -> Result<String, TransportError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| TransportError::InvalidRequest(format!("signing key: {e}")))?;
    mac.update(date.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}
