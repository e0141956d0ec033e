//! Scanner device state and connection settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};

/// Cached operational state of the scanning device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceState {
    Ready,
    Busy,
    Error,
    Offline,
    PaperJam,
}

impl DeviceState {
    /// Map a raw status code reported by the device.
    ///
    /// The mapping is total: unknown codes read as `Offline`.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "1" => DeviceState::Ready,
            "2" => DeviceState::Busy,
            "3" => DeviceState::Error,
            "4" => DeviceState::PaperJam,
            "5" => DeviceState::Offline,
            _ => DeviceState::Offline,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Ready => "READY",
            DeviceState::Busy => "BUSY",
            DeviceState::Error => "ERROR",
            DeviceState::Offline => "OFFLINE",
            DeviceState::PaperJam => "PAPER_JAM",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, DeviceState::Ready)
    }
}

impl Display for DeviceState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Status identifiers queried on every poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusId {
    Device,
    Scanner,
    PaperJam,
}

impl StatusId {
    pub const ALL: [StatusId; 3] = [StatusId::Device, StatusId::Scanner, StatusId::PaperJam];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusId::Device => "device_status",
            StatusId::Scanner => "scanner_status",
            StatusId::PaperJam => "paper_jam",
        }
    }
}

/// Last known state plus diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub state: DeviceState,
    /// When `state` was recorded; `None` before the first poll.
    pub observed_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl DeviceSnapshot {
    pub fn offline() -> Self {
        Self {
            state: DeviceState::Offline,
            observed_at: None,
            last_success_at: None,
            last_error: None,
        }
    }
}

impl Default for DeviceSnapshot {
    fn default() -> Self {
        Self::offline()
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCredentials {
    pub username: String,
    pub password: String,
}

impl Debug for DeviceCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DeviceCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Network address of the device and optional basic-auth credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEndpoint {
    /// Base URL or bare host; a bare host is reached over `http://`.
    pub address: String,
    pub credentials: Option<DeviceCredentials>,
}

impl DeviceEndpoint {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(DeviceCredentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> String {
        let address = self.address.trim().trim_end_matches('/');
        if address.starts_with("http://") || address.starts_with("https://") {
            address.to_string()
        } else {
            format!("http://{}", address)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_mapping_is_total() {
        assert_eq!(DeviceState::from_code("1"), DeviceState::Ready);
        assert_eq!(DeviceState::from_code("2"), DeviceState::Busy);
        assert_eq!(DeviceState::from_code("3"), DeviceState::Error);
        assert_eq!(DeviceState::from_code("4"), DeviceState::PaperJam);
        assert_eq!(DeviceState::from_code("5"), DeviceState::Offline);
        assert_eq!(DeviceState::from_code("9"), DeviceState::Offline);
        assert_eq!(DeviceState::from_code(""), DeviceState::Offline);
    }

    #[test]
    fn test_state_serializes_screaming() {
        let json = serde_json::to_string(&DeviceState::PaperJam).unwrap();
        assert_eq!(json, "\"PAPER_JAM\"");
    }

    #[test]
    fn test_base_url() {
        assert_eq!(DeviceEndpoint::new("10.0.0.5").base_url(), "http://10.0.0.5");
        assert_eq!(
            DeviceEndpoint::new("https://scanner.local/").base_url(),
            "https://scanner.local"
        );
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let endpoint = DeviceEndpoint::new("h").with_credentials("svc", "hunter2");
        let debug = format!("{:?}", endpoint);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("svc"));
    }
}
