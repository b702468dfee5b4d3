//! Backend client: endpoint table, payloads and the transport seam.
//!
//! The backend has shipped two incompatible shapes for the device check:
//!
//! | Version  | Check endpoint            | Result field                 |
//! |----------|---------------------------|------------------------------|
//! | `Legacy` | `/check-adb`              | `output` (raw command text)  |
//! | `V1`     | `/api/android/check-adb`  | `messages` (parsed entries)  |
//!
//! Both are decoded into [`CheckAdbOutcome`] so handlers never see the
//! difference.

#[cfg(target_arch = "wasm32")]
mod fetch;

#[cfg(target_arch = "wasm32")]
pub use fetch::FetchTransport;

use serde::{Deserialize, Serialize};
use std::future::Future;

/// Errors raised below the application level: the request never produced a
/// usable response.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    /// The request could not be sent or the connection failed.
    #[error("network error: {0}")]
    Network(String),
    /// The response body was not the JSON we expected.
    #[error("invalid response (HTTP {status}): {reason}")]
    InvalidResponse { status: u16, reason: String },
    /// The request body could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Raw HTTP response as seen by the client.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Sends JSON POST requests.
///
/// Implemented by [`FetchTransport`] on the web; tests provide their own.
pub trait Transport {
    fn post_json(
        &self,
        url: &str,
        body: &str,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>>;
}

/// Backend API revision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiVersion {
    Legacy,
    #[default]
    V1,
}

/// Endpoint paths for one API revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoints {
    pub set_api_key: &'static str,
    pub check_adb: &'static str,
}

impl ApiVersion {
    pub const fn endpoints(self) -> Endpoints {
        match self {
            ApiVersion::Legacy => Endpoints {
                set_api_key: "/api/config/set-vt-key",
                check_adb: "/check-adb",
            },
            ApiVersion::V1 => Endpoints {
                set_api_key: "/api/config/set-vt-key",
                check_adb: "/api/android/check-adb",
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetApiKeyRequest<'a> {
    pub api_key: &'a str,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SetApiKeyResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of a device check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckAdbRequest {
    pub serial: Option<String>,
    pub fast: bool,
    pub verbose: bool,
}

impl Default for CheckAdbRequest {
    /// First attached device, full module set, verbose output.
    fn default() -> Self {
        Self {
            serial: None,
            fast: false,
            verbose: true,
        }
    }
}

/// One finding reported by the device check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDeviceMessage")]
pub struct DeviceMessage {
    /// Finding label, read from `category` or, failing that, `status`.
    pub category: String,
    pub message: String,
    /// Log line the finding was matched from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_message: Option<String>,
}

/// Wire form of [`DeviceMessage`]. Log entries carry `status`, parsed
/// findings carry `category`, some carry both.
#[derive(Deserialize)]
struct RawDeviceMessage {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    status: Option<String>,
    message: String,
    #[serde(default)]
    original_message: Option<String>,
}

impl TryFrom<RawDeviceMessage> for DeviceMessage {
    type Error = String;

    fn try_from(raw: RawDeviceMessage) -> Result<Self, Self::Error> {
        let category = raw
            .category
            .or(raw.status)
            .ok_or_else(|| "entry has neither `category` nor `status`".to_string())?;
        Ok(Self {
            category,
            message: raw.message,
            original_message: raw.original_message,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CheckAdbResponse {
    pub success: bool,
    #[serde(default)]
    pub messages: Option<Vec<DeviceMessage>>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Device check result independent of API revision.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckAdbOutcome {
    /// Parsed findings (possibly empty).
    Messages(Vec<DeviceMessage>),
    /// Raw command output from the legacy endpoint.
    Output(String),
    /// The backend reported `success = false`.
    Failed(String),
}

impl From<CheckAdbResponse> for CheckAdbOutcome {
    fn from(response: CheckAdbResponse) -> Self {
        if !response.success {
            return CheckAdbOutcome::Failed(response.error.unwrap_or_default());
        }
        match (response.messages, response.output) {
            (Some(messages), _) => CheckAdbOutcome::Messages(messages),
            (None, Some(output)) => CheckAdbOutcome::Output(output),
            (None, None) => CheckAdbOutcome::Messages(Vec::new()),
        }
    }
}

/// Typed client over a [`Transport`].
pub struct ApiClient<T> {
    transport: T,
    base_url: String,
    version: ApiVersion,
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T, base_url: impl Into<String>, version: ApiVersion) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            version,
        }
    }

    pub fn version(&self) -> ApiVersion {
        self.version
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends the VirusTotal key to the backend.
    pub async fn set_api_key(&self, api_key: &str) -> Result<SetApiKeyResponse, TransportError> {
        let url = self.url(self.version.endpoints().set_api_key);
        self.post(&url, &SetApiKeyRequest { api_key }).await
    }

    /// Runs an ADB check on the backend.
    pub async fn check_adb(
        &self,
        request: &CheckAdbRequest,
    ) -> Result<CheckAdbOutcome, TransportError> {
        let url = self.url(self.version.endpoints().check_adb);
        let response: CheckAdbResponse = self.post(&url, request).await?;
        Ok(response.into())
    }

    async fn post<B, R>(&self, url: &str, body: &B) -> Result<R, TransportError>
    where
        B: Serialize,
        R: serde::de::DeserializeOwned,
    {
        let body =
            serde_json::to_string(body).map_err(|e| TransportError::Serialization(e.to_string()))?;
        tracing::debug!("POST {} {}", url, body);

        let response = self.transport.post_json(url, &body).await?;
        if !(200..300).contains(&response.status) {
            tracing::warn!("POST {} returned HTTP {}", url, response.status);
        }

        // The backend reports application errors in the body, even on non-2xx.
        serde_json::from_str(&response.body).map_err(|e| TransportError::InvalidResponse {
            status: response.status,
            reason: e.to_string(),
        })
    }
}
