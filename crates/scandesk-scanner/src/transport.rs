//! Status and command transport to the scanning device.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use scandesk_core::models::{
    ColorMode, DeviceCredentials, DeviceEndpoint, OutputFormat, PaperSize, ScanOptions, StatusId,
};
use scandesk_core::AppError;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Raw status values keyed by status identifier, as reported by the device.
pub type RawStatus = HashMap<String, String>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid device address '{0}'")]
    InvalidAddress(String),

    #[error("Failed to build device client: {0}")]
    Client(String),

    #[error("Device did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Device unreachable: {0}")]
    Unreachable(String),

    #[error("Device returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Device rejected the request: {0}")]
    Rejected(String),

    #[error("Malformed device response: {0}")]
    Malformed(String),
}

impl From<TransportError> for AppError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::InvalidAddress(_) => AppError::InvalidInput(err.to_string()),
            other => AppError::Transport(other.to_string()),
        }
    }
}

/// Query and command surface of a scanning device.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// Fetch the raw values of `ids`. Identifiers the device does not report are absent.
    async fn query_status(&self, ids: &[StatusId]) -> Result<RawStatus, TransportError>;

    /// Push scan settings to the device ahead of a scan.
    async fn apply_scan_options(&self, options: &ScanOptions) -> Result<(), TransportError>;
}

/// Builds transports for an endpoint, so a session can be rebuilt after reconfiguration.
pub trait DeviceTransportFactory: Send + Sync {
    fn connect(&self, endpoint: &DeviceEndpoint) -> Result<Arc<dyn DeviceTransport>, TransportError>;
}

impl<F> DeviceTransportFactory for F
where
    F: Fn(&DeviceEndpoint) -> Result<Arc<dyn DeviceTransport>, TransportError> + Send + Sync,
{
    fn connect(&self, endpoint: &DeviceEndpoint) -> Result<Arc<dyn DeviceTransport>, TransportError> {
        self(endpoint)
    }
}

/// Device settings payload sent before a scan.
#[derive(Debug, Serialize)]
struct DeviceScanSettings {
    resolution: u32,
    color_mode: ColorMode,
    paper_size: PaperSize,
    format: OutputFormat,
    duplex: bool,
    brightness: i32,
    contrast: i32,
}

impl From<&ScanOptions> for DeviceScanSettings {
    fn from(options: &ScanOptions) -> Self {
        Self {
            resolution: options.resolution,
            color_mode: options.color_mode,
            paper_size: options.paper_size,
            format: options.format,
            duplex: options.duplex,
            brightness: options.brightness,
            contrast: options.contrast,
        }
    }
}

/// HTTP/JSON device transport.
///
/// `GET {base}/status?ids=device_status,scanner_status,paper_jam` answers with a JSON
/// object mapping each identifier to its code; `POST {base}/scan/settings` accepts the
/// scan settings.
#[derive(Clone)]
pub struct HttpDeviceTransport {
    http_client: Client,
    base_url: String,
    credentials: Option<DeviceCredentials>,
    timeout: Duration,
}

impl Debug for HttpDeviceTransport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("HttpDeviceTransport")
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpDeviceTransport {
    pub fn new(endpoint: &DeviceEndpoint, timeout: Duration) -> Result<Self, TransportError> {
        if endpoint.address.trim().is_empty() {
            return Err(TransportError::InvalidAddress(endpoint.address.clone()));
        }
        let base_url = endpoint.base_url();
        reqwest::Url::parse(&base_url)
            .map_err(|_| TransportError::InvalidAddress(endpoint.address.clone()))?;

        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
            credentials: endpoint.credentials.clone(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Some(credentials) => {
                request.basic_auth(&credentials.username, Some(&credentials.password))
            }
            None => request,
        }
    }

    fn request_error(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else {
            TransportError::Unreachable(err.to_string())
        }
    }
}

#[async_trait]
impl DeviceTransport for HttpDeviceTransport {
    async fn query_status(&self, ids: &[StatusId]) -> Result<RawStatus, TransportError> {
        let ids_param = ids
            .iter()
            .map(|id| id.as_str())
            .collect::<Vec<_>>()
            .join(",");

        let response = self
            .authorize(
                self.http_client
                    .get(format!("{}/status", self.base_url))
                    .query(&[("ids", ids_param.as_str())]),
            )
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TransportError::Malformed(e.to_string()))?;

        parse_status_body(&body, ids)
    }

    async fn apply_scan_options(&self, options: &ScanOptions) -> Result<(), TransportError> {
        let response = self
            .authorize(
                self.http_client
                    .post(format!("{}/scan/settings", self.base_url))
                    .json(&DeviceScanSettings::from(options)),
            )
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if status.is_client_error() && status != StatusCode::UNAUTHORIZED {
            Err(TransportError::Rejected(if body.is_empty() {
                status.to_string()
            } else {
                body
            }))
        } else {
            Err(TransportError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

/// Extract the requested identifiers from a status document.
///
/// Codes may be JSON strings or numbers; other value kinds are malformed.
fn parse_status_body(body: &serde_json::Value, ids: &[StatusId]) -> Result<RawStatus, TransportError> {
    let object = body
        .as_object()
        .ok_or_else(|| TransportError::Malformed("expected a JSON object".to_string()))?;

    let mut raw = RawStatus::new();
    for id in ids {
        let Some(value) = object.get(id.as_str()) else {
            continue;
        };
        let code = match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Null => continue,
            other => {
                return Err(TransportError::Malformed(format!(
                    "{} has unexpected value {}",
                    id.as_str(),
                    other
                )))
            }
        };
        raw.insert(id.as_str().to_string(), code);
    }
    Ok(raw)
}

/// Factory producing [`HttpDeviceTransport`]s with a fixed request timeout.
#[derive(Debug, Clone)]
pub struct HttpTransportFactory {
    timeout: Duration,
}

impl HttpTransportFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl DeviceTransportFactory for HttpTransportFactory {
    fn connect(&self, endpoint: &DeviceEndpoint) -> Result<Arc<dyn DeviceTransport>, TransportError> {
        Ok(Arc::new(HttpDeviceTransport::new(endpoint, self.timeout)?))
    }
}
